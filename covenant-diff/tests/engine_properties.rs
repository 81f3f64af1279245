//! Property-based checks over the diff engine.

use covenant_core::{ChangeType, CompatibilityMode};
use covenant_diff::{classify, diff, diff_schemas, SchemaNode};
use proptest::prelude::*;
use serde_json::{json, Value};

/// Strategy over small schema documents: a handful of property names with
/// scalar types, optional constraints, and an optional required list.
fn arb_scalar_property() -> impl Strategy<Value = Value> {
    let type_name = prop_oneof![
        Just("string"),
        Just("integer"),
        Just("number"),
        Just("boolean"),
    ];
    (type_name, proptest::option::of(0u64..500)).prop_map(|(ty, max_len)| {
        let mut node = json!({"type": ty});
        if ty == "string" {
            if let Some(max) = max_len {
                node["maxLength"] = json!(max);
            }
        }
        node
    })
}

fn arb_schema() -> impl Strategy<Value = Value> {
    let names = proptest::sample::subsequence(
        vec!["id", "name", "email", "status", "score", "tags"],
        1..=6,
    );
    (names, proptest::collection::vec(arb_scalar_property(), 6)).prop_map(|(names, props)| {
        let mut properties = serde_json::Map::new();
        for (name, prop) in names.iter().zip(props) {
            properties.insert((*name).to_string(), prop);
        }
        let required: Vec<&str> = names.iter().take(1).copied().collect();
        json!({
            "type": "object",
            "properties": Value::Object(properties),
            "required": required
        })
    })
}

proptest! {
    /// diff(S, S) is empty and classifies as a clean patch in every mode.
    #[test]
    fn self_diff_is_empty(schema in arb_schema()) {
        let node = SchemaNode::parse(&schema).unwrap();
        let changes = diff(&node, &node);
        prop_assert!(changes.is_empty());

        for mode in [
            CompatibilityMode::Backward,
            CompatibilityMode::Forward,
            CompatibilityMode::Full,
            CompatibilityMode::None,
        ] {
            let (severity, breaking) = classify(&changes, mode);
            prop_assert_eq!(severity, ChangeType::Patch);
            prop_assert!(breaking.is_empty());
        }
    }

    /// Repeated diffs of the same pair yield identical ordered output.
    #[test]
    fn diff_is_deterministic(old in arb_schema(), new in arb_schema()) {
        let old_node = SchemaNode::parse(&old).unwrap();
        let new_node = SchemaNode::parse(&new).unwrap();
        let first = diff(&old_node, &new_node);
        let second = diff(&old_node, &new_node);
        prop_assert_eq!(first, second);
    }

    /// If severity is not major, the breaking list is empty.
    #[test]
    fn non_major_has_no_breaking(old in arb_schema(), new in arb_schema()) {
        for mode in [
            CompatibilityMode::Backward,
            CompatibilityMode::Forward,
            CompatibilityMode::Full,
            CompatibilityMode::None,
        ] {
            let report = diff_schemas(&old, &new, mode).unwrap();
            if report.change_type != ChangeType::Major {
                prop_assert!(report.breaking.is_empty());
            } else {
                prop_assert!(!report.breaking.is_empty());
            }
        }
    }

    /// Under `none` mode nothing ever breaks.
    #[test]
    fn none_mode_never_breaks(old in arb_schema(), new in arb_schema()) {
        let report = diff_schemas(&old, &new, CompatibilityMode::None).unwrap();
        prop_assert!(report.breaking.is_empty());
        prop_assert_ne!(report.change_type, ChangeType::Major);
    }

    /// Full mode breaks whenever backward or forward does.
    #[test]
    fn full_mode_is_strictest(old in arb_schema(), new in arb_schema()) {
        let backward = diff_schemas(&old, &new, CompatibilityMode::Backward).unwrap();
        let forward = diff_schemas(&old, &new, CompatibilityMode::Forward).unwrap();
        let full = diff_schemas(&old, &new, CompatibilityMode::Full).unwrap();
        prop_assert!(full.breaking.len() >= backward.breaking.len());
        prop_assert!(full.breaking.len() >= forward.breaking.len());
    }
}
