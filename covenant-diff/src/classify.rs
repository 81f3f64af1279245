//! Change classification under a compatibility mode.

use crate::change::{Change, ChangeKind};
use crate::diff::diff;
use crate::node::SchemaNode;
use covenant_core::{ChangeType, CompatibilityMode, SchemaError};
use serde_json::Value;

/// Whether a single change is breaking under the given mode.
///
/// This table is the system's contract with users. Backward compatibility
/// protects consumers reading data produced under the old contract;
/// forward protects consumers that have not yet upgraded; full is both;
/// none never blocks.
pub fn is_breaking(change: &Change, mode: CompatibilityMode) -> bool {
    use ChangeKind::*;
    use CompatibilityMode::*;

    match mode {
        None => false,
        Full => !matches!(
            change.kind,
            DefaultAdded | DefaultRemoved | DefaultChanged
        ),
        Backward => match change.kind {
            PropertyAdded => change.required,
            PropertyRemoved => true,
            RequiredAdded => true,
            RequiredRemoved => false,
            TypeWidened => false,
            TypeNarrowed => true,
            TypeChanged => true,
            EnumValuesAdded => false,
            EnumValuesRemoved => true,
            EnumValuesChanged => true,
            ConstraintTightened => true,
            ConstraintRelaxed => false,
            NullableAdded => false,
            NullableRemoved => true,
            DefaultAdded | DefaultRemoved | DefaultChanged => false,
        },
        Forward => match change.kind {
            PropertyAdded => true,
            PropertyRemoved => false,
            RequiredAdded => false,
            RequiredRemoved => true,
            TypeWidened => true,
            TypeNarrowed => false,
            TypeChanged => true,
            EnumValuesAdded => true,
            EnumValuesRemoved => false,
            EnumValuesChanged => true,
            ConstraintTightened => false,
            ConstraintRelaxed => true,
            NullableAdded => true,
            NullableRemoved => false,
            DefaultAdded | DefaultRemoved | DefaultChanged => false,
        },
    }
}

/// Fold a change list into `(severity, breaking changes)` under a mode.
///
/// Major if anything breaks; else minor if any non-breaking change is
/// structural; else patch.
pub fn classify(changes: &[Change], mode: CompatibilityMode) -> (ChangeType, Vec<Change>) {
    let breaking: Vec<Change> = changes
        .iter()
        .filter(|c| is_breaking(c, mode))
        .cloned()
        .collect();

    let severity = if !breaking.is_empty() {
        ChangeType::Major
    } else if changes.iter().any(|c| c.kind.is_structural()) {
        ChangeType::Minor
    } else {
        ChangeType::Patch
    };

    (severity, breaking)
}

/// The complete result of diffing two schema documents under a mode.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffReport {
    pub changes: Vec<Change>,
    pub change_type: ChangeType,
    pub breaking: Vec<Change>,
}

impl DiffReport {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn is_compatible(&self) -> bool {
        self.breaking.is_empty()
    }

    /// Breaking changes serialized for persistence on a proposal.
    pub fn breaking_as_values(&self) -> Vec<Value> {
        self.breaking.iter().map(Change::to_value).collect()
    }
}

/// Parse, diff and classify two raw schema documents in one step.
pub fn diff_schemas(
    old: &Value,
    new: &Value,
    mode: CompatibilityMode,
) -> Result<DiffReport, SchemaError> {
    let old_node = SchemaNode::parse(old)?;
    let new_node = SchemaNode::parse(new)?;
    let changes = diff(&old_node, &new_node);
    let (change_type, breaking) = classify(&changes, mode);
    Ok(DiffReport {
        changes,
        change_type,
        breaking,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn report(old: Value, new: Value, mode: CompatibilityMode) -> DiffReport {
        diff_schemas(&old, &new, mode).unwrap()
    }

    fn base() -> Value {
        json!({"type": "object", "properties": {"id": {"type": "integer"}}, "required": ["id"]})
    }

    fn with_optional_name() -> Value {
        json!({
            "type": "object",
            "properties": {"id": {"type": "integer"}, "name": {"type": "string"}},
            "required": ["id"]
        })
    }

    #[test]
    fn test_no_changes_is_patch() {
        let r = report(base(), base(), CompatibilityMode::Backward);
        assert!(!r.has_changes());
        assert_eq!(r.change_type, ChangeType::Patch);
        assert!(r.breaking.is_empty());
    }

    #[test]
    fn test_optional_addition_backward_is_minor() {
        let r = report(base(), with_optional_name(), CompatibilityMode::Backward);
        assert_eq!(r.change_type, ChangeType::Minor);
        assert!(r.is_compatible());
    }

    #[test]
    fn test_optional_addition_forward_is_major() {
        let r = report(base(), with_optional_name(), CompatibilityMode::Forward);
        assert_eq!(r.change_type, ChangeType::Major);
        assert_eq!(r.breaking.len(), 1);
    }

    #[test]
    fn test_required_addition_breaks_backward() {
        let new = json!({
            "type": "object",
            "properties": {"id": {"type": "integer"}, "name": {"type": "string"}},
            "required": ["id", "name"]
        });
        let r = report(base(), new, CompatibilityMode::Backward);
        assert_eq!(r.change_type, ChangeType::Major);
    }

    #[test]
    fn test_removal_breaks_backward_not_forward() {
        let r = report(with_optional_name(), base(), CompatibilityMode::Backward);
        assert_eq!(r.change_type, ChangeType::Major);
        assert!(r
            .breaking
            .iter()
            .any(|c| c.kind == ChangeKind::PropertyRemoved));

        let r = report(with_optional_name(), base(), CompatibilityMode::Forward);
        assert_eq!(r.change_type, ChangeType::Minor);
        assert!(r.is_compatible());
    }

    #[test]
    fn test_full_mode_rejects_both_directions() {
        let added = report(base(), with_optional_name(), CompatibilityMode::Full);
        assert_eq!(added.change_type, ChangeType::Major);

        let removed = report(with_optional_name(), base(), CompatibilityMode::Full);
        assert_eq!(removed.change_type, ChangeType::Major);
    }

    #[test]
    fn test_none_mode_allows_anything() {
        let old = json!({"type": "object", "properties": {"id": {"type": "integer"}}});
        let new = json!({"type": "object", "properties": {"name": {"type": "string"}}});
        let r = report(old, new, CompatibilityMode::None);
        assert!(r.is_compatible());
        assert!(r.breaking.is_empty());
        // Structural churn without breaking-ness is still a minor bump.
        assert_eq!(r.change_type, ChangeType::Minor);
    }

    #[test]
    fn test_type_change_breaks_every_checked_mode() {
        let old = json!({"type": "object", "properties": {"id": {"type": "integer"}}});
        let new = json!({"type": "object", "properties": {"id": {"type": "string"}}});
        for mode in [
            CompatibilityMode::Backward,
            CompatibilityMode::Forward,
            CompatibilityMode::Full,
        ] {
            let r = report(old.clone(), new.clone(), mode);
            assert_eq!(r.change_type, ChangeType::Major, "mode {mode:?}");
        }
    }

    #[test]
    fn test_enum_direction_by_mode() {
        let old = json!({"type": "object", "properties": {"s": {"type": "string", "enum": ["a", "b"]}}});
        let grown = json!({"type": "object", "properties": {"s": {"type": "string", "enum": ["a", "b", "c"]}}});

        assert!(report(old.clone(), grown.clone(), CompatibilityMode::Backward).is_compatible());
        assert!(!report(old.clone(), grown.clone(), CompatibilityMode::Forward).is_compatible());
        assert!(!report(grown.clone(), old.clone(), CompatibilityMode::Backward).is_compatible());
        assert!(report(grown, old, CompatibilityMode::Forward).is_compatible());
    }

    #[test]
    fn test_constraint_only_change_is_patch_when_compatible() {
        let old = json!({"type": "object", "properties": {"n": {"type": "string", "maxLength": 50}}});
        let new = json!({"type": "object", "properties": {"n": {"type": "string", "maxLength": 100}}});
        // Relaxation does not break backward; no structural changes.
        let r = report(old, new, CompatibilityMode::Backward);
        assert_eq!(r.change_type, ChangeType::Patch);
    }

    #[test]
    fn test_default_changes_never_break() {
        let old = json!({"type": "object", "properties": {"a": {"type": "boolean", "default": true}}});
        let new = json!({"type": "object", "properties": {"a": {"type": "boolean", "default": false}}});
        for mode in [
            CompatibilityMode::Backward,
            CompatibilityMode::Forward,
            CompatibilityMode::Full,
            CompatibilityMode::None,
        ] {
            let r = report(old.clone(), new.clone(), mode);
            assert!(r.is_compatible(), "mode {mode:?}");
            assert_eq!(r.change_type, ChangeType::Patch);
        }
    }

    #[test]
    fn test_non_major_implies_no_breaking() {
        let r = report(base(), with_optional_name(), CompatibilityMode::Backward);
        assert_ne!(r.change_type, ChangeType::Major);
        assert!(r.breaking.is_empty());
    }

    #[test]
    fn test_breaking_serialization_shape() {
        let old = json!({"type": "object", "properties": {"id": {"type": "integer"}}});
        let new = json!({"type": "object", "properties": {"id": {"type": "string"}}});
        let r = report(old, new, CompatibilityMode::Backward);
        let values = r.breaking_as_values();
        assert_eq!(values.len(), 1);
        assert_eq!(values[0]["kind"], "type_changed");
        assert_eq!(values[0]["path"], "$.properties.id");
    }
}
