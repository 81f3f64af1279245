//! The schema differ.
//!
//! Walks two [`SchemaNode`] trees and emits an ordered list of typed
//! changes. The traversal is deterministic: per-node checks run in a fixed
//! order (types, nullability, enum, constraints, default, required,
//! properties, items) and properties are visited lexicographically.

use crate::change::{Change, ChangeKind};
use crate::node::{SchemaNode, SchemaType};
use serde_json::{json, Value};
use std::collections::BTreeSet;

/// Compare two schemas and return every atomic difference.
///
/// Containment checks win over symmetric `*_changed`: a widening is never
/// additionally reported as a change. Nested differences produce one
/// change per differing path; nothing is aggregated.
pub fn diff(old: &SchemaNode, new: &SchemaNode) -> Vec<Change> {
    let mut changes = Vec::new();
    diff_node("$", old, new, &mut changes);
    changes
}

fn diff_node(path: &str, old: &SchemaNode, new: &SchemaNode, out: &mut Vec<Change>) {
    diff_types(path, old, new, out);
    diff_nullable(path, old, new, out);
    diff_enum(path, old, new, out);
    diff_constraints(path, old, new, out);
    diff_default(path, old, new, out);
    diff_required(path, old, new, out);
    diff_properties(path, old, new, out);
    diff_items(path, old, new, out);
}

// ----------------------------------------------------------------------------
// Types
// ----------------------------------------------------------------------------

/// Whether every type in `b` is covered by some type in `a`.
fn covers(a: &BTreeSet<SchemaType>, b: &BTreeSet<SchemaType>) -> bool {
    b.iter().all(|tb| a.iter().any(|ta| ta.covers(*tb)))
}

fn types_value(types: &BTreeSet<SchemaType>) -> Value {
    Value::Array(types.iter().map(|t| json!(t.as_str())).collect())
}

fn diff_types(path: &str, old: &SchemaNode, new: &SchemaNode, out: &mut Vec<Change>) {
    // Null membership is reported via nullable_added/removed, never as a
    // type change.
    let old_types = old.value_types();
    let new_types = new.value_types();

    if old_types.is_empty() || new_types.is_empty() || old_types == new_types {
        return;
    }

    let new_covers_old = covers(&new_types, &old_types);
    let old_covers_new = covers(&old_types, &new_types);
    let (kind, message) = match (new_covers_old, old_covers_new) {
        // Mutually covering sets (e.g. integer|number vs number) permit the
        // same values; nothing to report.
        (true, true) => return,
        (true, false) => (
            ChangeKind::TypeWidened,
            format!("{path}: permitted types widened"),
        ),
        (false, true) => (
            ChangeKind::TypeNarrowed,
            format!("{path}: permitted types narrowed"),
        ),
        (false, false) => (
            ChangeKind::TypeChanged,
            format!("{path}: permitted types changed"),
        ),
    };

    out.push(
        Change::new(kind, path, message)
            .with_values(Some(types_value(&old_types)), Some(types_value(&new_types))),
    );
}

// ----------------------------------------------------------------------------
// Nullability
// ----------------------------------------------------------------------------

fn diff_nullable(path: &str, old: &SchemaNode, new: &SchemaNode, out: &mut Vec<Change>) {
    match (old.is_nullable(), new.is_nullable()) {
        (false, true) => out.push(
            Change::new(
                ChangeKind::NullableAdded,
                path,
                format!("{path}: now accepts null"),
            )
            .with_values(Some(json!(false)), Some(json!(true))),
        ),
        (true, false) => out.push(
            Change::new(
                ChangeKind::NullableRemoved,
                path,
                format!("{path}: no longer accepts null"),
            )
            .with_values(Some(json!(true)), Some(json!(false))),
        ),
        _ => {}
    }
}

// ----------------------------------------------------------------------------
// Enums
// ----------------------------------------------------------------------------

fn value_subset(a: &[Value], b: &[Value]) -> bool {
    a.iter().all(|v| b.contains(v))
}

fn diff_enum(path: &str, old: &SchemaNode, new: &SchemaNode, out: &mut Vec<Change>) {
    match (&old.enum_values, &new.enum_values) {
        (None, None) => {}
        // Introducing an enum constrains a previously open set of values;
        // dropping it opens the set back up.
        (None, Some(values)) => out.push(
            Change::new(
                ChangeKind::ConstraintTightened,
                path,
                format!("{path}: enum constraint added"),
            )
            .with_values(None, Some(Value::Array(values.clone()))),
        ),
        (Some(values), None) => out.push(
            Change::new(
                ChangeKind::ConstraintRelaxed,
                path,
                format!("{path}: enum constraint removed"),
            )
            .with_values(Some(Value::Array(values.clone())), None),
        ),
        (Some(old_values), Some(new_values)) => {
            let old_in_new = value_subset(old_values, new_values);
            let new_in_old = value_subset(new_values, old_values);
            let kind = match (old_in_new, new_in_old) {
                (true, true) => return,
                (true, false) => ChangeKind::EnumValuesAdded,
                (false, true) => ChangeKind::EnumValuesRemoved,
                (false, false) => ChangeKind::EnumValuesChanged,
            };
            out.push(
                Change::new(kind, path, format!("{path}: enum values {kind}"))
                    .with_values(
                        Some(Value::Array(old_values.clone())),
                        Some(Value::Array(new_values.clone())),
                    ),
            );
        }
    }
}

// ----------------------------------------------------------------------------
// Constraints
// ----------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq)]
enum Bound {
    Lower,
    Upper,
}

fn diff_numeric_constraint(
    path: &str,
    name: &str,
    bound: Bound,
    old: Option<f64>,
    new: Option<f64>,
    out: &mut Vec<Change>,
) {
    let kind = match (old, new) {
        (None, None) => return,
        (Some(a), Some(b)) if a == b => return,
        // A bound appearing, or moving inward, narrows the accepted values.
        (None, Some(_)) => ChangeKind::ConstraintTightened,
        (Some(_), None) => ChangeKind::ConstraintRelaxed,
        (Some(a), Some(b)) => {
            let tightened = match bound {
                Bound::Lower => b > a,
                Bound::Upper => b < a,
            };
            if tightened {
                ChangeKind::ConstraintTightened
            } else {
                ChangeKind::ConstraintRelaxed
            }
        }
    };
    out.push(
        Change::new(kind, path, format!("{path}: {name} {kind}"))
            .with_values(old.map(|v| json!(v)), new.map(|v| json!(v))),
    );
}

fn diff_length_constraint(
    path: &str,
    name: &str,
    bound: Bound,
    old: Option<u64>,
    new: Option<u64>,
    out: &mut Vec<Change>,
) {
    diff_numeric_constraint(
        path,
        name,
        bound,
        old.map(|v| v as f64),
        new.map(|v| v as f64),
        out,
    );
}

fn diff_constraints(path: &str, old: &SchemaNode, new: &SchemaNode, out: &mut Vec<Change>) {
    let oc = &old.constraints;
    let nc = &new.constraints;

    diff_numeric_constraint(path, "minimum", Bound::Lower, oc.minimum, nc.minimum, out);
    diff_numeric_constraint(path, "maximum", Bound::Upper, oc.maximum, nc.maximum, out);
    diff_numeric_constraint(
        path,
        "exclusiveMinimum",
        Bound::Lower,
        oc.exclusive_minimum,
        nc.exclusive_minimum,
        out,
    );
    diff_numeric_constraint(
        path,
        "exclusiveMaximum",
        Bound::Upper,
        oc.exclusive_maximum,
        nc.exclusive_maximum,
        out,
    );
    diff_length_constraint(path, "minLength", Bound::Lower, oc.min_length, nc.min_length, out);
    diff_length_constraint(path, "maxLength", Bound::Upper, oc.max_length, nc.max_length, out);

    // Pattern comparison is undecidable in general; conservatively, any
    // pattern change that is not identical counts as a tightening.
    match (&oc.pattern, &nc.pattern) {
        (None, None) => {}
        (Some(a), Some(b)) if a == b => {}
        (None, Some(p)) => out.push(
            Change::new(
                ChangeKind::ConstraintTightened,
                path,
                format!("{path}: pattern added"),
            )
            .with_values(None, Some(json!(p))),
        ),
        (Some(p), None) => out.push(
            Change::new(
                ChangeKind::ConstraintRelaxed,
                path,
                format!("{path}: pattern removed"),
            )
            .with_values(Some(json!(p)), None),
        ),
        (Some(a), Some(b)) => out.push(
            Change::new(
                ChangeKind::ConstraintTightened,
                path,
                format!("{path}: pattern changed"),
            )
            .with_values(Some(json!(a)), Some(json!(b))),
        ),
    }

    diff_length_constraint(path, "minItems", Bound::Lower, oc.min_items, nc.min_items, out);
    diff_length_constraint(path, "maxItems", Bound::Upper, oc.max_items, nc.max_items, out);
}

// ----------------------------------------------------------------------------
// Defaults
// ----------------------------------------------------------------------------

fn diff_default(path: &str, old: &SchemaNode, new: &SchemaNode, out: &mut Vec<Change>) {
    match (&old.default, &new.default) {
        (None, None) => {}
        (Some(a), Some(b)) if a == b => {}
        (None, Some(b)) => out.push(
            Change::new(
                ChangeKind::DefaultAdded,
                path,
                format!("{path}: default added"),
            )
            .with_values(None, Some(b.clone())),
        ),
        (Some(a), None) => out.push(
            Change::new(
                ChangeKind::DefaultRemoved,
                path,
                format!("{path}: default removed"),
            )
            .with_values(Some(a.clone()), None),
        ),
        (Some(a), Some(b)) => out.push(
            Change::new(
                ChangeKind::DefaultChanged,
                path,
                format!("{path}: default changed"),
            )
            .with_values(Some(a.clone()), Some(b.clone())),
        ),
    }
}

// ----------------------------------------------------------------------------
// Required
// ----------------------------------------------------------------------------

fn diff_required(path: &str, old: &SchemaNode, new: &SchemaNode, out: &mut Vec<Change>) {
    // Newly required names whose property did not exist before are covered
    // by property_added(required); names whose property vanished entirely
    // are covered by property_removed.
    for name in new.required.difference(&old.required) {
        if old.properties.contains_key(name) {
            out.push(Change::new(
                ChangeKind::RequiredAdded,
                format!("{path}.properties.{name}"),
                format!("property '{name}' is now required"),
            ));
        }
    }
    for name in old.required.difference(&new.required) {
        if new.properties.contains_key(name) {
            out.push(Change::new(
                ChangeKind::RequiredRemoved,
                format!("{path}.properties.{name}"),
                format!("property '{name}' is no longer required"),
            ));
        }
    }
}

// ----------------------------------------------------------------------------
// Properties & items
// ----------------------------------------------------------------------------

fn diff_properties(path: &str, old: &SchemaNode, new: &SchemaNode, out: &mut Vec<Change>) {
    let names: BTreeSet<&String> = old.properties.keys().chain(new.properties.keys()).collect();

    for name in names {
        let prop_path = format!("{path}.properties.{name}");
        match (old.properties.get(name), new.properties.get(name)) {
            (None, Some(_)) => {
                let required = new.required.contains(name);
                out.push(
                    Change::new(
                        ChangeKind::PropertyAdded,
                        &prop_path,
                        format!(
                            "property '{name}' added{}",
                            if required { " (required)" } else { "" }
                        ),
                    )
                    .with_required(required),
                );
            }
            (Some(_), None) => {
                out.push(Change::new(
                    ChangeKind::PropertyRemoved,
                    &prop_path,
                    format!("property '{name}' removed"),
                ));
            }
            (Some(old_prop), Some(new_prop)) => {
                diff_node(&prop_path, old_prop, new_prop, out);
            }
            (None, None) => unreachable!("name came from one of the two maps"),
        }
    }
}

fn diff_items(path: &str, old: &SchemaNode, new: &SchemaNode, out: &mut Vec<Change>) {
    let items_path = format!("{path}.items");
    match (&old.items, &new.items) {
        (None, None) => {}
        (Some(old_items), Some(new_items)) => {
            diff_node(&items_path, old_items, new_items, out);
        }
        // An item schema appearing constrains previously-free elements;
        // one disappearing frees them.
        (None, Some(_)) => out.push(Change::new(
            ChangeKind::ConstraintTightened,
            &items_path,
            format!("{items_path}: item schema added"),
        )),
        (Some(_), None) => out.push(Change::new(
            ChangeKind::ConstraintRelaxed,
            &items_path,
            format!("{items_path}: item schema removed"),
        )),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::SchemaNode;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> SchemaNode {
        SchemaNode::parse(&value).unwrap()
    }

    fn kinds(changes: &[Change]) -> Vec<ChangeKind> {
        changes.iter().map(|c| c.kind).collect()
    }

    #[test]
    fn test_identical_schemas_produce_no_changes() {
        let schema = parse(json!({
            "type": "object",
            "properties": {"id": {"type": "integer"}},
            "required": ["id"]
        }));
        assert!(diff(&schema, &schema).is_empty());
    }

    #[test]
    fn test_property_added_and_removed() {
        let old = parse(json!({"type": "object", "properties": {"id": {"type": "integer"}}}));
        let new = parse(json!({
            "type": "object",
            "properties": {"id": {"type": "integer"}, "name": {"type": "string"}}
        }));

        let added = diff(&old, &new);
        assert_eq!(kinds(&added), vec![ChangeKind::PropertyAdded]);
        assert_eq!(added[0].path, "$.properties.name");
        assert!(!added[0].required);

        let removed = diff(&new, &old);
        assert_eq!(kinds(&removed), vec![ChangeKind::PropertyRemoved]);
    }

    #[test]
    fn test_property_added_required_is_marked() {
        let old = parse(json!({"type": "object", "properties": {"id": {"type": "integer"}}}));
        let new = parse(json!({
            "type": "object",
            "properties": {"id": {"type": "integer"}, "name": {"type": "string"}},
            "required": ["name"]
        }));
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::PropertyAdded);
        assert!(changes[0].required);
    }

    #[test]
    fn test_required_added_on_existing_property() {
        let old = parse(json!({
            "type": "object",
            "properties": {"id": {"type": "integer"}, "name": {"type": "string"}},
            "required": ["id"]
        }));
        let new = parse(json!({
            "type": "object",
            "properties": {"id": {"type": "integer"}, "name": {"type": "string"}},
            "required": ["id", "name"]
        }));
        let changes = diff(&old, &new);
        assert_eq!(kinds(&changes), vec![ChangeKind::RequiredAdded]);
        assert_eq!(changes[0].path, "$.properties.name");

        let back = diff(&new, &old);
        assert_eq!(kinds(&back), vec![ChangeKind::RequiredRemoved]);
    }

    #[test]
    fn test_removed_required_property_reports_removal_only() {
        let old = parse(json!({
            "type": "object",
            "properties": {"id": {"type": "integer"}, "name": {"type": "string"}},
            "required": ["id", "name"]
        }));
        let new = parse(json!({
            "type": "object",
            "properties": {"id": {"type": "integer"}},
            "required": ["id"]
        }));
        let changes = diff(&old, &new);
        assert_eq!(kinds(&changes), vec![ChangeKind::PropertyRemoved]);
    }

    #[test]
    fn test_type_changed() {
        let old = parse(json!({"type": "object", "properties": {"id": {"type": "integer"}}}));
        let new = parse(json!({"type": "object", "properties": {"id": {"type": "string"}}}));
        let changes = diff(&old, &new);
        assert_eq!(kinds(&changes), vec![ChangeKind::TypeChanged]);
        assert_eq!(changes[0].path, "$.properties.id");
    }

    #[test]
    fn test_integer_to_number_is_widening() {
        let old = parse(json!({"type": "object", "properties": {"v": {"type": "integer"}}}));
        let new = parse(json!({"type": "object", "properties": {"v": {"type": "number"}}}));
        assert_eq!(kinds(&diff(&old, &new)), vec![ChangeKind::TypeWidened]);
        assert_eq!(kinds(&diff(&new, &old)), vec![ChangeKind::TypeNarrowed]);
    }

    #[test]
    fn test_type_union_containment() {
        let old = parse(json!({"type": "object", "properties": {"v": {"type": "string"}}}));
        let new = parse(json!({"type": "object", "properties": {"v": {"type": ["string", "integer"]}}}));
        assert_eq!(kinds(&diff(&old, &new)), vec![ChangeKind::TypeWidened]);
    }

    #[test]
    fn test_widening_not_also_reported_as_changed() {
        let old = parse(json!({"type": "object", "properties": {"v": {"type": "integer"}}}));
        let new = parse(json!({"type": "object", "properties": {"v": {"type": ["integer", "string"]}}}));
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::TypeWidened);
    }

    #[test]
    fn test_null_in_type_union_is_nullable_not_type_change() {
        let old = parse(json!({"type": "object", "properties": {"v": {"type": "string"}}}));
        let new = parse(json!({"type": "object", "properties": {"v": {"type": ["string", "null"]}}}));
        let changes = diff(&old, &new);
        assert_eq!(kinds(&changes), vec![ChangeKind::NullableAdded]);
    }

    #[test]
    fn test_nullable_flag_toggles() {
        let old = parse(json!({"type": "object", "properties": {"v": {"type": "string"}}}));
        let new = parse(json!({"type": "object", "properties": {"v": {"type": "string", "nullable": true}}}));
        assert_eq!(kinds(&diff(&old, &new)), vec![ChangeKind::NullableAdded]);
        assert_eq!(kinds(&diff(&new, &old)), vec![ChangeKind::NullableRemoved]);
    }

    #[test]
    fn test_enum_values_added_removed_changed() {
        let base = parse(json!({"type": "object", "properties": {"s": {"type": "string", "enum": ["a", "b"]}}}));
        let superset = parse(json!({"type": "object", "properties": {"s": {"type": "string", "enum": ["a", "b", "c"]}}}));
        let disjoint = parse(json!({"type": "object", "properties": {"s": {"type": "string", "enum": ["a", "x"]}}}));

        assert_eq!(kinds(&diff(&base, &superset)), vec![ChangeKind::EnumValuesAdded]);
        assert_eq!(kinds(&diff(&superset, &base)), vec![ChangeKind::EnumValuesRemoved]);
        assert_eq!(kinds(&diff(&base, &disjoint)), vec![ChangeKind::EnumValuesChanged]);
    }

    #[test]
    fn test_enum_order_is_irrelevant() {
        let a = parse(json!({"type": "object", "properties": {"s": {"type": "string", "enum": ["a", "b"]}}}));
        let b = parse(json!({"type": "object", "properties": {"s": {"type": "string", "enum": ["b", "a"]}}}));
        assert!(diff(&a, &b).is_empty());
    }

    #[test]
    fn test_max_length_direction() {
        let wide = parse(json!({"type": "object", "properties": {"n": {"type": "string", "maxLength": 100}}}));
        let narrow = parse(json!({"type": "object", "properties": {"n": {"type": "string", "maxLength": 50}}}));
        assert_eq!(kinds(&diff(&wide, &narrow)), vec![ChangeKind::ConstraintTightened]);
        assert_eq!(kinds(&diff(&narrow, &wide)), vec![ChangeKind::ConstraintRelaxed]);
    }

    #[test]
    fn test_min_length_added_is_tightened() {
        let old = parse(json!({"type": "object", "properties": {"n": {"type": "string"}}}));
        let new = parse(json!({"type": "object", "properties": {"n": {"type": "string", "minLength": 1}}}));
        assert_eq!(kinds(&diff(&old, &new)), vec![ChangeKind::ConstraintTightened]);
    }

    #[test]
    fn test_constraint_removed_is_relaxed() {
        let old = parse(json!({"type": "object", "properties": {"n": {"type": "string", "maxLength": 100}}}));
        let new = parse(json!({"type": "object", "properties": {"n": {"type": "string"}}}));
        assert_eq!(kinds(&diff(&old, &new)), vec![ChangeKind::ConstraintRelaxed]);
    }

    #[test]
    fn test_min_items_direction() {
        let old = parse(json!({"type": "object", "properties": {"t": {"type": "array", "items": {"type": "string"}, "minItems": 1}}}));
        let new = parse(json!({"type": "object", "properties": {"t": {"type": "array", "items": {"type": "string"}, "minItems": 5}}}));
        assert_eq!(kinds(&diff(&old, &new)), vec![ChangeKind::ConstraintTightened]);
        assert_eq!(kinds(&diff(&new, &old)), vec![ChangeKind::ConstraintRelaxed]);
    }

    #[test]
    fn test_pattern_change_is_conservatively_tightened() {
        let old = parse(json!({"type": "object", "properties": {"e": {"type": "string", "pattern": "^.*$"}}}));
        let new = parse(json!({"type": "object", "properties": {"e": {"type": "string", "pattern": "^[a-z]+@[a-z]+\\.[a-z]+$"}}}));
        assert_eq!(kinds(&diff(&old, &new)), vec![ChangeKind::ConstraintTightened]);
    }

    #[test]
    fn test_default_added_removed_changed() {
        let none = parse(json!({"type": "object", "properties": {"a": {"type": "boolean"}}}));
        let yes = parse(json!({"type": "object", "properties": {"a": {"type": "boolean", "default": true}}}));
        let no = parse(json!({"type": "object", "properties": {"a": {"type": "boolean", "default": false}}}));

        assert_eq!(kinds(&diff(&none, &yes)), vec![ChangeKind::DefaultAdded]);
        assert_eq!(kinds(&diff(&yes, &none)), vec![ChangeKind::DefaultRemoved]);
        assert_eq!(kinds(&diff(&yes, &no)), vec![ChangeKind::DefaultChanged]);
    }

    #[test]
    fn test_nested_property_path() {
        let old = parse(json!({
            "type": "object",
            "properties": {"address": {"type": "object", "properties": {"street": {"type": "string"}}}}
        }));
        let new = parse(json!({
            "type": "object",
            "properties": {"address": {"type": "object", "properties": {
                "street": {"type": "string"},
                "city": {"type": "string"}
            }}}
        }));
        let changes = diff(&old, &new);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].path, "$.properties.address.properties.city");
    }

    #[test]
    fn test_array_items_type_change_is_path_qualified() {
        let old = parse(json!({"type": "object", "properties": {"tags": {"type": "array", "items": {"type": "string"}}}}));
        let new = parse(json!({"type": "object", "properties": {"tags": {"type": "array", "items": {"type": "integer"}}}}));
        let changes = diff(&old, &new);
        assert_eq!(kinds(&changes), vec![ChangeKind::TypeChanged]);
        assert_eq!(changes[0].path, "$.properties.tags.items");
    }

    #[test]
    fn test_array_items_property_added() {
        let old = parse(json!({"type": "object", "properties": {"rows": {
            "type": "array",
            "items": {"type": "object", "properties": {"id": {"type": "integer"}}}
        }}}));
        let new = parse(json!({"type": "object", "properties": {"rows": {
            "type": "array",
            "items": {"type": "object", "properties": {"id": {"type": "integer"}, "name": {"type": "string"}}}
        }}}));
        let changes = diff(&old, &new);
        assert_eq!(kinds(&changes), vec![ChangeKind::PropertyAdded]);
        assert_eq!(changes[0].path, "$.properties.rows.items.properties.name");
    }

    #[test]
    fn test_output_order_is_deterministic() {
        let old = parse(json!({"type": "object", "properties": {
            "zebra": {"type": "string"},
            "apple": {"type": "string"}
        }}));
        let new = parse(json!({"type": "object", "properties": {
            "zebra": {"type": "integer"},
            "apple": {"type": "integer"},
            "mango": {"type": "string"}
        }}));

        let first = diff(&old, &new);
        let second = diff(&old, &new);
        assert_eq!(first, second);

        let paths: Vec<&str> = first.iter().map(|c| c.path.as_str()).collect();
        assert_eq!(
            paths,
            vec![
                "$.properties.apple",
                "$.properties.mango",
                "$.properties.zebra"
            ]
        );
    }

    #[test]
    fn test_refs_resolved_before_diffing() {
        let with_ref = parse(json!({
            "type": "object",
            "properties": {"email": {"$ref": "#/$defs/Email"}},
            "$defs": {"Email": {"type": "string", "format": "email"}}
        }));
        let inline = parse(json!({
            "type": "object",
            "properties": {"email": {"type": "string", "format": "email"}}
        }));
        assert!(diff(&with_ref, &inline).is_empty());
    }

    #[test]
    fn test_change_detected_through_ref() {
        let old = parse(json!({
            "type": "object",
            "properties": {"data": {"$ref": "#/$defs/Data"}},
            "$defs": {"Data": {"type": "string"}}
        }));
        let new = parse(json!({
            "type": "object",
            "properties": {"data": {"$ref": "#/$defs/Data"}},
            "$defs": {"Data": {"type": "integer"}}
        }));
        assert_eq!(kinds(&diff(&old, &new)), vec![ChangeKind::TypeChanged]);
    }

    #[test]
    fn test_deep_nesting_does_not_overflow() {
        fn nested(depth: usize) -> serde_json::Value {
            if depth == 0 {
                json!({"type": "string"})
            } else {
                json!({"type": "object", "properties": {"nested": nested(depth - 1)}})
            }
        }
        let old = parse(nested(60));
        let new = parse(nested(60));
        assert!(diff(&old, &new).is_empty());

        fn nested_array(depth: usize) -> serde_json::Value {
            if depth == 0 {
                json!({"type": "string"})
            } else {
                json!({"type": "array", "items": nested_array(depth - 1)})
            }
        }
        let old = parse(nested_array(60));
        let new = parse(nested_array(60));
        assert!(diff(&old, &new).is_empty());
    }

    #[test]
    fn test_changes_detected_within_depth_cap() {
        let old = parse(json!({
            "type": "object",
            "properties": {"l1": {"type": "object", "properties": {"l2": {"type": "object", "properties": {"l3": {"type": "string"}}}}}}
        }));
        let new = parse(json!({
            "type": "object",
            "properties": {"l1": {"type": "object", "properties": {"l2": {"type": "object", "properties": {"l3": {"type": "integer"}}}}}}
        }));
        assert_eq!(kinds(&diff(&old, &new)), vec![ChangeKind::TypeChanged]);
    }
}
