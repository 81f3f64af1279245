//! Listing filters and pagination types shared by the store and the API.

use crate::{
    AssetId, AuditAction, AuditEventId, EntityType, ProposalStatus, RegistrationStatus,
    ResourceType, TeamId, Timestamp,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;

/// Offset pagination for entity listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct Page {
    pub limit: i64,
    pub offset: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: 50,
            offset: 0,
        }
    }
}

impl Page {
    /// Clamp to the server-side ceiling of 100 items per page.
    pub fn clamped(self) -> Self {
        Self {
            limit: self.limit.clamp(1, 100),
            offset: self.offset.max(0),
        }
    }
}

/// Filter predicates for asset listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssetFilter {
    pub owner_team_id: Option<TeamId>,
    pub resource_type: Option<ResourceType>,
    /// Substring match on the fully-qualified name.
    pub fqn_contains: Option<String>,
}

/// Filter predicates for proposal listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProposalFilter {
    pub asset_id: Option<AssetId>,
    pub status: Option<ProposalStatus>,
    pub proposed_by: Option<TeamId>,
}

/// Filter predicates for registration listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistrationFilter {
    pub asset_id: Option<AssetId>,
    pub consumer_team_id: Option<TeamId>,
    pub status: Option<RegistrationStatus>,
}

/// Filter predicates for audit queries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AuditFilter {
    pub entity_type: Option<EntityType>,
    pub entity_id: Option<Uuid>,
    pub actor_id: Option<Uuid>,
    pub action: Option<AuditAction>,
    pub since: Option<Timestamp>,
    pub until: Option<Timestamp>,
}

/// Keyset cursor over `(occurred_at, event_id)`.
///
/// Opaque wire form is `<rfc3339>|<uuid>`; offset pagination is not offered
/// for the audit log because it grows without bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuditCursor {
    pub occurred_at: Timestamp,
    pub event_id: AuditEventId,
}

impl AuditCursor {
    pub fn encode(&self) -> String {
        format!("{}|{}", self.occurred_at.to_rfc3339(), self.event_id)
    }
}

impl FromStr for AuditCursor {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (ts, id) = s
            .split_once('|')
            .ok_or_else(|| format!("malformed audit cursor: {s}"))?;
        let occurred_at = Timestamp::from_str(ts).map_err(|e| format!("bad cursor time: {e}"))?;
        let event_id = id.parse().map_err(|_| format!("bad cursor id: {id}"))?;
        Ok(Self {
            occurred_at,
            event_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::EntityIdType;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_page_clamping() {
        let page = Page {
            limit: 5000,
            offset: -3,
        }
        .clamped();
        assert_eq!(page.limit, 100);
        assert_eq!(page.offset, 0);
    }

    #[test]
    fn test_audit_cursor_round_trip() {
        let cursor = AuditCursor {
            occurred_at: Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap(),
            event_id: AuditEventId::now_v7(),
        };
        let encoded = cursor.encode();
        let parsed: AuditCursor = encoded.parse().unwrap();
        assert_eq!(parsed, cursor);
    }

    #[test]
    fn test_audit_cursor_rejects_garbage() {
        assert!("not-a-cursor".parse::<AuditCursor>().is_err());
        assert!("2024-01-01T00:00:00Z|nope".parse::<AuditCursor>().is_err());
    }
}
