//! Error Types for the Covenant API
//!
//! Defines the wire-level error envelope and the mapping from core error
//! kinds to HTTP status codes. Every error response has the shape:
//!
//! ```json
//! { "error": { "code": "CONFLICT", "message": "...", "details": {} },
//!   "request_id": "..." }
//! ```

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use covenant_core::{CoreError, StoreError, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes exposed on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Request validation failed (bad schema, bad version, bad payload).
    ValidationError,
    /// A contract document could not be parsed for diffing.
    BrokenContract,
    /// Request lacks valid authentication credentials.
    Unauthorized,
    /// Authenticated but not allowed to perform the operation.
    Forbidden,
    /// Referenced entity absent or soft-deleted.
    NotFound,
    /// Request conflicts with current state (duplicate fqn, pending
    /// proposal, stale base contract, version not increasing).
    Conflict,
    /// Per-key rate limit exhausted.
    RateLimitExceeded,
    /// Store or adapter failure.
    Internal,
}

impl ErrorCode {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationError | ErrorCode::BrokenContract => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::Forbidden => StatusCode::FORBIDDEN,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::ValidationError => "Request validation failed",
            ErrorCode::BrokenContract => "Contract schema could not be parsed",
            ErrorCode::Unauthorized => "Authentication required",
            ErrorCode::Forbidden => "Access forbidden",
            ErrorCode::NotFound => "Entity not found",
            ErrorCode::Conflict => "Operation conflicts with current state",
            ErrorCode::RateLimitExceeded => "Rate limit exceeded",
            ErrorCode::Internal => "Internal server error",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR
// ============================================================================

/// Inner error body.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct ErrorBody {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub details: Option<serde_json::Value>,
}

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[derive(utoipa::ToSchema)]
pub struct ApiError {
    pub error: ErrorBody,
    /// Filled in by the request-context middleware before the response
    /// leaves the server.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            error: ErrorBody {
                code,
                message: message.into(),
                details: None,
            },
            request_id: None,
        }
    }

    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.error.details = Some(details);
        self
    }

    pub fn status_code(&self) -> StatusCode {
        self.error.code.status_code()
    }

    pub fn code(&self) -> ErrorCode {
        self.error.code
    }

    // Convenience constructors for common errors.

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationError, message)
    }

    pub fn broken_contract(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BrokenContract, message)
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Unauthorized, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Forbidden, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Conflict, message)
    }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Self::new(
            ErrorCode::RateLimitExceeded,
            format!("Rate limit exceeded. Retry after {retry_after_secs} seconds"),
        )
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::Internal, message)
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.error.code, self.error.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM CORE ERRORS
// ============================================================================

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match &err {
            StoreError::NotFound { .. } => ApiError::not_found(err.to_string()),
            StoreError::Duplicate { .. } | StoreError::PendingProposalExists { .. } => {
                ApiError::conflict(err.to_string())
            }
            StoreError::Serialization { .. } => ApiError::validation(err.to_string()),
            StoreError::TransactionFailed { .. }
            | StoreError::TransactionClosed
            | StoreError::Backend { .. } => {
                tracing::error!(error = %err, "store failure");
                ApiError::internal("Storage operation failed")
            }
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Store(store) => store.into(),
            CoreError::Validation(v) => match &v {
                ValidationError::VersionNotIncreasing { .. }
                | ValidationError::VersionExists { .. } => ApiError::conflict(v.to_string()),
                _ => ApiError::validation(v.to_string()),
            },
            CoreError::Schema(schema) => ApiError::broken_contract(schema.to_string()),
            CoreError::Forbidden { reason } => ApiError::forbidden(reason),
            CoreError::Conflict { reason } => ApiError::conflict(reason),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::validation(format!("Invalid JSON: {err}"))
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use covenant_core::EntityType;
    use uuid::Uuid;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::ValidationError.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ErrorCode::Forbidden.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ErrorCode::NotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::Conflict.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::RateLimitExceeded.status_code(),
            StatusCode::TOO_MANY_REQUESTS
        );
        assert_eq!(
            ErrorCode::Internal.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_envelope_serialization() {
        let err = ApiError::conflict("Asset has a pending proposal");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["error"]["code"], "CONFLICT");
        assert_eq!(json["error"]["message"], "Asset has a pending proposal");
        assert!(json.get("request_id").is_none());
    }

    #[test]
    fn test_store_error_mapping() {
        let err: ApiError = StoreError::NotFound {
            entity_type: EntityType::Asset,
            id: Uuid::nil(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::NotFound);

        let err: ApiError = StoreError::PendingProposalExists {
            asset_id: Uuid::nil(),
        }
        .into();
        assert_eq!(err.code(), ErrorCode::Conflict);
    }

    #[test]
    fn test_version_conflict_maps_to_conflict() {
        let err: ApiError = CoreError::Validation(ValidationError::VersionNotIncreasing {
            current: "2.0.0".into(),
            proposed: "1.0.0".into(),
        })
        .into();
        assert_eq!(err.code(), ErrorCode::Conflict);
    }
}
