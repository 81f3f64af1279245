//! Typed change records emitted by the differ.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// The atomic kinds of schema change the differ detects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    PropertyAdded,
    PropertyRemoved,
    TypeWidened,
    TypeNarrowed,
    TypeChanged,
    RequiredAdded,
    RequiredRemoved,
    EnumValuesAdded,
    EnumValuesRemoved,
    EnumValuesChanged,
    ConstraintTightened,
    ConstraintRelaxed,
    DefaultAdded,
    DefaultRemoved,
    DefaultChanged,
    NullableAdded,
    NullableRemoved,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeKind::PropertyAdded => "property_added",
            ChangeKind::PropertyRemoved => "property_removed",
            ChangeKind::TypeWidened => "type_widened",
            ChangeKind::TypeNarrowed => "type_narrowed",
            ChangeKind::TypeChanged => "type_changed",
            ChangeKind::RequiredAdded => "required_added",
            ChangeKind::RequiredRemoved => "required_removed",
            ChangeKind::EnumValuesAdded => "enum_values_added",
            ChangeKind::EnumValuesRemoved => "enum_values_removed",
            ChangeKind::EnumValuesChanged => "enum_values_changed",
            ChangeKind::ConstraintTightened => "constraint_tightened",
            ChangeKind::ConstraintRelaxed => "constraint_relaxed",
            ChangeKind::DefaultAdded => "default_added",
            ChangeKind::DefaultRemoved => "default_removed",
            ChangeKind::DefaultChanged => "default_changed",
            ChangeKind::NullableAdded => "nullable_added",
            ChangeKind::NullableRemoved => "nullable_removed",
        }
    }

    /// Structural changes bump the minor version even when non-breaking;
    /// constraint and default edits alone are a patch.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ChangeKind::PropertyAdded
                | ChangeKind::PropertyRemoved
                | ChangeKind::TypeWidened
                | ChangeKind::TypeNarrowed
                | ChangeKind::TypeChanged
                | ChangeKind::RequiredAdded
                | ChangeKind::RequiredRemoved
                | ChangeKind::EnumValuesAdded
                | ChangeKind::EnumValuesRemoved
                | ChangeKind::EnumValuesChanged
                | ChangeKind::NullableAdded
                | ChangeKind::NullableRemoved
        )
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One atomic schema change at a concrete path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub kind: ChangeKind,
    /// JSON-pointer-style path, e.g. `$.properties.id` or
    /// `$.properties.tags.items`.
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub old_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub new_value: Option<Value>,
    /// For `property_added`: whether the new property is required.
    /// Decides breaking-ness under backward compatibility.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub required: bool,
    pub message: String,
}

impl Change {
    pub fn new(kind: ChangeKind, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            path: path.into(),
            old_value: None,
            new_value: None,
            required: false,
            message: message.into(),
        }
    }

    pub fn with_values(mut self, old: Option<Value>, new: Option<Value>) -> Self {
        self.old_value = old;
        self.new_value = new;
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    /// Serialize for persistence on a proposal row.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_change_kind_wire_form() {
        let json = serde_json::to_string(&ChangeKind::PropertyAdded).unwrap();
        assert_eq!(json, "\"property_added\"");
        assert_eq!(ChangeKind::TypeWidened.as_str(), "type_widened");
    }

    #[test]
    fn test_change_serialization_omits_empty_fields() {
        let change = Change::new(ChangeKind::PropertyRemoved, "$.properties.x", "removed");
        let value = change.to_value();
        assert!(value.get("old_value").is_none());
        assert!(value.get("required").is_none());
        assert_eq!(value["kind"], "property_removed");
    }

    #[test]
    fn test_structural_partition() {
        assert!(ChangeKind::PropertyAdded.is_structural());
        assert!(ChangeKind::NullableRemoved.is_structural());
        assert!(!ChangeKind::ConstraintTightened.is_structural());
        assert!(!ChangeKind::DefaultChanged.is_structural());
    }
}
