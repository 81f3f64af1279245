//! Next-version suggestion from diff analysis.

use crate::change::Change;
use covenant_core::{ChangeType, SemVer, INITIAL_VERSION};
use serde::{Deserialize, Serialize};

/// A suggested next version with its rationale, returned alongside every
/// publish result so callers in `suggest` mode can decide for themselves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionSuggestion {
    pub suggested_version: String,
    pub current_version: Option<String>,
    pub change_type: ChangeType,
    pub reason: String,
    pub is_first_contract: bool,
    pub breaking_changes: Vec<Change>,
}

/// Compute the next version for a publish.
///
/// Lenient parsing keeps malformed stored versions from crashing the
/// suggestion flow; they are treated as `1.0.0`.
pub fn next_version(current: Option<&str>, is_compatible: bool, change_type: ChangeType) -> String {
    let Some(current) = current else {
        return INITIAL_VERSION.to_string();
    };
    let parsed = SemVer::parse_lenient(current);
    if !is_compatible {
        parsed.bump(ChangeType::Major).to_string()
    } else if matches!(change_type, ChangeType::Major | ChangeType::Minor) {
        parsed.bump(ChangeType::Minor).to_string()
    } else {
        parsed.bump(ChangeType::Patch).to_string()
    }
}

/// Build a [`VersionSuggestion`] from diff analysis of a proposed schema.
pub fn compute_version_suggestion(
    current_version: Option<&str>,
    change_type: ChangeType,
    is_compatible: bool,
    breaking_changes: Vec<Change>,
) -> VersionSuggestion {
    let Some(current) = current_version else {
        return VersionSuggestion {
            suggested_version: INITIAL_VERSION.to_string(),
            current_version: None,
            change_type: ChangeType::Patch,
            reason: "First contract for this asset".to_string(),
            is_first_contract: true,
            breaking_changes: Vec::new(),
        };
    };

    let (suggested, reason, actual_change_type) = if !is_compatible {
        (
            SemVer::parse_lenient(current).bump(ChangeType::Major).to_string(),
            "Breaking change detected - major version bump required",
            ChangeType::Major,
        )
    } else if matches!(change_type, ChangeType::Major | ChangeType::Minor) {
        (
            SemVer::parse_lenient(current).bump(ChangeType::Minor).to_string(),
            "Backward-compatible schema additions - minor version bump",
            ChangeType::Minor,
        )
    } else {
        (
            SemVer::parse_lenient(current).bump(ChangeType::Patch).to_string(),
            "No breaking schema changes - patch version bump",
            ChangeType::Patch,
        )
    };

    VersionSuggestion {
        suggested_version: suggested,
        current_version: Some(current.to_string()),
        change_type: actual_change_type,
        reason: reason.to_string(),
        is_first_contract: false,
        breaking_changes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_contract_gets_initial_version() {
        let s = compute_version_suggestion(None, ChangeType::Patch, true, Vec::new());
        assert_eq!(s.suggested_version, "1.0.0");
        assert!(s.is_first_contract);
        assert_eq!(s.change_type, ChangeType::Patch);
    }

    #[test]
    fn test_breaking_bumps_major() {
        let s = compute_version_suggestion(Some("1.4.2"), ChangeType::Major, false, Vec::new());
        assert_eq!(s.suggested_version, "2.0.0");
        assert_eq!(s.change_type, ChangeType::Major);
    }

    #[test]
    fn test_compatible_addition_bumps_minor() {
        let s = compute_version_suggestion(Some("1.4.2"), ChangeType::Minor, true, Vec::new());
        assert_eq!(s.suggested_version, "1.5.0");
        assert_eq!(s.change_type, ChangeType::Minor);
    }

    #[test]
    fn test_constraint_only_bumps_patch() {
        let s = compute_version_suggestion(Some("1.4.2"), ChangeType::Patch, true, Vec::new());
        assert_eq!(s.suggested_version, "1.4.3");
    }

    #[test]
    fn test_malformed_current_version_is_lenient() {
        let s = compute_version_suggestion(Some("not-a-version"), ChangeType::Patch, true, Vec::new());
        assert_eq!(s.suggested_version, "1.0.1");
    }

    #[test]
    fn test_next_version_matches_suggestion() {
        assert_eq!(next_version(None, true, ChangeType::Patch), "1.0.0");
        assert_eq!(next_version(Some("2.1.0"), false, ChangeType::Major), "3.0.0");
        assert_eq!(next_version(Some("2.1.0"), true, ChangeType::Minor), "2.2.0");
        assert_eq!(next_version(Some("2.1.0"), true, ChangeType::Patch), "2.1.1");
    }
}
