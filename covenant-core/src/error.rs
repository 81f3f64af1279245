//! Error types for Covenant operations

use crate::{EntityType, VersionError};
use thiserror::Error;
use uuid::Uuid;

/// Storage layer errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Entity not found: {entity_type:?} with id {id}")]
    NotFound { entity_type: EntityType, id: Uuid },

    #[error("Duplicate {entity_type:?}: {field} '{value}' already exists")]
    Duplicate {
        entity_type: EntityType,
        field: &'static str,
        value: String,
    },

    #[error("Asset {asset_id} already has a pending proposal")]
    PendingProposalExists { asset_id: Uuid },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Transaction already closed")]
    TransactionClosed,

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Backend error: {reason}")]
    Backend { reason: String },
}

/// Request validation errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Required field missing: {field}")]
    RequiredFieldMissing { field: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },

    #[error("Version {proposed} must be strictly greater than current {current}")]
    VersionNotIncreasing { current: String, proposed: String },

    #[error("Version {version} already exists for this asset")]
    VersionExists { version: String },

    #[error(transparent)]
    Version(#[from] VersionError),
}

/// Schema parse errors surfaced when the differ cannot interpret a
/// contract document. These map to the BrokenContract error kind at the
/// API boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Unresolved local $ref: {reference}")]
    UnresolvedRef { reference: String },

    #[error("Unknown schema type: {name}")]
    UnknownType { name: String },

    #[error("Schema node at {path} is not an object or boolean")]
    MalformedNode { path: String },

    #[error("Schema nesting exceeds maximum depth {max}")]
    DepthExceeded { max: usize },
}

/// Master error type for all core operations.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Forbidden: {reason}")]
    Forbidden { reason: String },

    #[error("Conflict: {reason}")]
    Conflict { reason: String },
}

impl CoreError {
    pub fn forbidden(reason: impl Into<String>) -> Self {
        CoreError::Forbidden {
            reason: reason.into(),
        }
    }

    pub fn conflict(reason: impl Into<String>) -> Self {
        CoreError::Conflict {
            reason: reason.into(),
        }
    }
}

impl From<VersionError> for CoreError {
    fn from(err: VersionError) -> Self {
        CoreError::Validation(ValidationError::Version(err))
    }
}

/// Result type alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::NotFound {
            entity_type: EntityType::Asset,
            id: Uuid::nil(),
        };
        let msg = err.to_string();
        assert!(msg.contains("Asset"));
        assert!(msg.contains("00000000"));
    }

    #[test]
    fn test_core_error_from_chain() {
        let err: CoreError = StoreError::TransactionClosed.into();
        assert!(matches!(err, CoreError::Store(StoreError::TransactionClosed)));

        let err: CoreError = VersionError::Malformed {
            input: "x".into(),
        }
        .into();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::Version(_))
        ));
    }
}
