//! Canonical schema model.
//!
//! A [`SchemaNode`] is the language-neutral value form of a JSON-Schema
//! document that the differ walks. Nodes are parsed after local `$ref`
//! resolution; unknown keys are preserved verbatim but never diffed.

use covenant_core::SchemaError;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Maximum nesting depth tolerated during ref resolution and parsing.
/// Deeper schemas are cut off rather than overflowing the stack.
pub const MAX_DEPTH: usize = 50;

// ============================================================================
// SCHEMA TYPES
// ============================================================================

/// The permitted JSON types of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchemaType {
    String,
    Integer,
    Number,
    Boolean,
    Object,
    Array,
    Null,
}

impl SchemaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::String => "string",
            SchemaType::Integer => "integer",
            SchemaType::Number => "number",
            SchemaType::Boolean => "boolean",
            SchemaType::Object => "object",
            SchemaType::Array => "array",
            SchemaType::Null => "null",
        }
    }

    /// Whether a value permitted by `other` is always permitted by `self`.
    /// `number` covers `integer`; every type covers itself.
    pub fn covers(&self, other: SchemaType) -> bool {
        *self == other || (*self == SchemaType::Number && other == SchemaType::Integer)
    }
}

impl FromStr for SchemaType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(SchemaType::String),
            "integer" => Ok(SchemaType::Integer),
            "number" => Ok(SchemaType::Number),
            "boolean" => Ok(SchemaType::Boolean),
            "object" => Ok(SchemaType::Object),
            "array" => Ok(SchemaType::Array),
            "null" => Ok(SchemaType::Null),
            other => Err(SchemaError::UnknownType {
                name: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// CONSTRAINTS
// ============================================================================

/// Numeric, string and array bounds carried by a node.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Constraints {
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub pattern: Option<String>,
    pub min_items: Option<u64>,
    pub max_items: Option<u64>,
}

impl Constraints {
    pub fn is_empty(&self) -> bool {
        self == &Constraints::default()
    }
}

// ============================================================================
// SCHEMA NODE
// ============================================================================

/// One node of a schema document.
///
/// Tagged record rather than an inheritance hierarchy: the differ
/// dispatches on the permitted-type sets of the two sides.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SchemaNode {
    /// Permitted types. Empty means unconstrained. `null` membership is
    /// folded into [`SchemaNode::is_nullable`], not type comparison.
    pub types: BTreeSet<SchemaType>,
    /// Property name -> node. BTreeMap gives the lexicographic visit order
    /// the differ guarantees.
    pub properties: BTreeMap<String, SchemaNode>,
    pub required: BTreeSet<String>,
    /// Array element schema.
    pub items: Option<Box<SchemaNode>>,
    /// Closed set of scalar values, order-insensitive for comparison.
    pub enum_values: Option<Vec<Value>>,
    pub constraints: Constraints,
    pub nullable: bool,
    pub default: Option<Value>,
    pub format: Option<String>,
    pub description: Option<String>,
    /// Keys the model does not interpret, preserved verbatim.
    pub extra: BTreeMap<String, Value>,
}

impl SchemaNode {
    /// Effective nullability: the `nullable` flag or `null` among the
    /// permitted types.
    pub fn is_nullable(&self) -> bool {
        self.nullable || self.types.contains(&SchemaType::Null)
    }

    /// Permitted types with `null` stripped, for widening/narrowing checks.
    pub fn value_types(&self) -> BTreeSet<SchemaType> {
        self.types
            .iter()
            .copied()
            .filter(|t| *t != SchemaType::Null)
            .collect()
    }

    /// Parse a schema document, resolving local refs first.
    pub fn parse(document: &Value) -> Result<Self, SchemaError> {
        let resolved = resolve_refs(document)?;
        Self::parse_node(&resolved, 0)
    }

    fn parse_node(value: &Value, depth: usize) -> Result<Self, SchemaError> {
        if depth > MAX_DEPTH {
            // Cut the subtree off instead of recursing further; anything
            // below this depth compares as an opaque empty node.
            return Ok(SchemaNode::default());
        }

        let obj = match value {
            Value::Object(obj) => obj,
            // `true` / `false` schemas carry no structure to diff.
            Value::Bool(_) => return Ok(SchemaNode::default()),
            _ => {
                return Err(SchemaError::MalformedNode {
                    path: value.to_string(),
                })
            }
        };

        let mut node = SchemaNode::default();

        for (key, val) in obj {
            match key.as_str() {
                "type" => node.types = parse_types(val)?,
                "properties" => {
                    let props = val.as_object().ok_or_else(|| SchemaError::MalformedNode {
                        path: "properties".to_string(),
                    })?;
                    for (name, prop) in props {
                        node.properties
                            .insert(name.clone(), Self::parse_node(prop, depth + 1)?);
                    }
                }
                "required" => {
                    if let Some(names) = val.as_array() {
                        node.required = names
                            .iter()
                            .filter_map(|n| n.as_str().map(str::to_string))
                            .collect();
                    }
                }
                "items" => node.items = Some(Box::new(Self::parse_node(val, depth + 1)?)),
                "enum" => node.enum_values = val.as_array().cloned(),
                "nullable" => node.nullable = val.as_bool().unwrap_or(false),
                "default" => node.default = Some(val.clone()),
                "format" => node.format = val.as_str().map(str::to_string),
                "description" => node.description = val.as_str().map(str::to_string),
                "minimum" => node.constraints.minimum = val.as_f64(),
                "maximum" => node.constraints.maximum = val.as_f64(),
                "exclusiveMinimum" => node.constraints.exclusive_minimum = val.as_f64(),
                "exclusiveMaximum" => node.constraints.exclusive_maximum = val.as_f64(),
                "minLength" => node.constraints.min_length = val.as_u64(),
                "maxLength" => node.constraints.max_length = val.as_u64(),
                "pattern" => node.constraints.pattern = val.as_str().map(str::to_string),
                "minItems" => node.constraints.min_items = val.as_u64(),
                "maxItems" => node.constraints.max_items = val.as_u64(),
                // Definition tables were consumed by ref resolution.
                "$defs" | "definitions" => {}
                _ => {
                    node.extra.insert(key.clone(), val.clone());
                }
            }
        }

        Ok(node)
    }
}

fn parse_types(value: &Value) -> Result<BTreeSet<SchemaType>, SchemaError> {
    match value {
        Value::String(s) => Ok(BTreeSet::from([s.parse()?])),
        Value::Array(items) => {
            let mut set = BTreeSet::new();
            for item in items {
                let name = item.as_str().ok_or_else(|| SchemaError::MalformedNode {
                    path: "type".to_string(),
                })?;
                set.insert(name.parse()?);
            }
            Ok(set)
        }
        _ => Err(SchemaError::MalformedNode {
            path: "type".to_string(),
        }),
    }
}

// ============================================================================
// REF RESOLUTION
// ============================================================================

/// Resolve local `$ref` pointers (`#/$defs/...`, `#/definitions/...`)
/// against the document's own definition tables.
///
/// Circular references stop expanding at the point of re-entry and the
/// bare ref is left in place. External refs (not starting with `#`) pass
/// through untouched. Sibling keys next to a `$ref` are merged over the
/// referenced definition.
pub fn resolve_refs(document: &Value) -> Result<Value, SchemaError> {
    let defs = collect_defs(document);
    let mut in_flight = Vec::new();
    resolve_value(document, &defs, &mut in_flight, 0)
}

fn collect_defs(document: &Value) -> Map<String, Value> {
    let mut defs = Map::new();
    if let Some(obj) = document.as_object() {
        for table in ["$defs", "definitions"] {
            if let Some(Value::Object(entries)) = obj.get(table) {
                for (name, def) in entries {
                    defs.insert(name.clone(), def.clone());
                }
            }
        }
    }
    defs
}

fn resolve_value(
    value: &Value,
    defs: &Map<String, Value>,
    in_flight: &mut Vec<String>,
    depth: usize,
) -> Result<Value, SchemaError> {
    if depth > MAX_DEPTH {
        return Ok(value.clone());
    }

    let obj = match value {
        Value::Object(obj) => obj,
        Value::Array(items) => {
            let resolved: Result<Vec<_>, _> = items
                .iter()
                .map(|item| resolve_value(item, defs, in_flight, depth + 1))
                .collect();
            return Ok(Value::Array(resolved?));
        }
        other => return Ok(other.clone()),
    };

    if let Some(Value::String(reference)) = obj.get("$ref") {
        if !reference.starts_with('#') {
            // External ref: out of scope for local resolution.
            return Ok(value.clone());
        }
        let name = reference
            .rsplit('/')
            .next()
            .unwrap_or_default()
            .to_string();
        let target = defs
            .get(&name)
            .ok_or_else(|| SchemaError::UnresolvedRef {
                reference: reference.clone(),
            })?;

        if in_flight.contains(&name) {
            // Circular reference: leave the bare ref to break the cycle.
            return Ok(value.clone());
        }

        in_flight.push(name);
        let mut resolved = resolve_value(target, defs, in_flight, depth + 1)?;
        in_flight.pop();

        // Sibling keys override / extend the referenced definition.
        if let Value::Object(resolved_obj) = &mut resolved {
            for (key, val) in obj {
                if key.as_str() != "$ref" {
                    resolved_obj.insert(key.clone(), resolve_value(val, defs, in_flight, depth + 1)?);
                }
            }
        }
        return Ok(resolved);
    }

    let mut out = Map::with_capacity(obj.len());
    for (key, val) in obj {
        out.insert(key.clone(), resolve_value(val, defs, in_flight, depth + 1)?);
    }
    Ok(Value::Object(out))
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_basic_object() {
        let node = SchemaNode::parse(&json!({
            "type": "object",
            "properties": {
                "id": {"type": "integer"},
                "name": {"type": "string", "maxLength": 100}
            },
            "required": ["id"]
        }))
        .unwrap();

        assert!(node.types.contains(&SchemaType::Object));
        assert_eq!(node.properties.len(), 2);
        assert!(node.required.contains("id"));
        assert_eq!(
            node.properties["name"].constraints.max_length,
            Some(100)
        );
    }

    #[test]
    fn test_parse_type_union() {
        let node = SchemaNode::parse(&json!({"type": ["string", "null"]})).unwrap();
        assert!(node.is_nullable());
        assert_eq!(node.value_types(), BTreeSet::from([SchemaType::String]));
    }

    #[test]
    fn test_parse_unknown_type_fails() {
        let err = SchemaNode::parse(&json!({"type": "tuple"})).unwrap_err();
        assert!(matches!(err, SchemaError::UnknownType { .. }));
    }

    #[test]
    fn test_unknown_keys_preserved() {
        let node = SchemaNode::parse(&json!({
            "type": "string",
            "x-lineage": "upstream.orders"
        }))
        .unwrap();
        assert_eq!(node.extra["x-lineage"], json!("upstream.orders"));
    }

    #[test]
    fn test_number_covers_integer() {
        assert!(SchemaType::Number.covers(SchemaType::Integer));
        assert!(!SchemaType::Integer.covers(SchemaType::Number));
        assert!(SchemaType::String.covers(SchemaType::String));
    }

    #[test]
    fn test_resolve_simple_def() {
        let resolved = resolve_refs(&json!({
            "type": "object",
            "properties": {"user": {"$ref": "#/$defs/User"}},
            "$defs": {"User": {"type": "object", "properties": {"name": {"type": "string"}}}}
        }))
        .unwrap();
        assert_eq!(resolved["properties"]["user"]["type"], json!("object"));
        assert!(resolved["properties"]["user"]["properties"]["name"].is_object());
    }

    #[test]
    fn test_resolve_definitions_key() {
        let resolved = resolve_refs(&json!({
            "type": "object",
            "properties": {"user": {"$ref": "#/definitions/User"}},
            "definitions": {"User": {"type": "object"}}
        }))
        .unwrap();
        assert_eq!(resolved["properties"]["user"]["type"], json!("object"));
    }

    #[test]
    fn test_resolve_nested_refs() {
        let resolved = resolve_refs(&json!({
            "type": "object",
            "properties": {"user": {"$ref": "#/$defs/User"}},
            "$defs": {
                "User": {
                    "type": "object",
                    "properties": {"address": {"$ref": "#/$defs/Address"}}
                },
                "Address": {"type": "object", "properties": {"city": {"type": "string"}}}
            }
        }))
        .unwrap();
        let user = &resolved["properties"]["user"];
        assert_eq!(
            user["properties"]["address"]["properties"]["city"]["type"],
            json!("string")
        );
    }

    #[test]
    fn test_circular_refs_terminate() {
        let resolved = resolve_refs(&json!({
            "type": "object",
            "properties": {"node": {"$ref": "#/$defs/Node"}},
            "$defs": {
                "Node": {
                    "type": "object",
                    "properties": {
                        "value": {"type": "string"},
                        "next": {"$ref": "#/$defs/Node"}
                    }
                }
            }
        }));
        assert!(resolved.is_ok());
    }

    #[test]
    fn test_external_refs_preserved() {
        let resolved = resolve_refs(&json!({
            "type": "object",
            "properties": {"external": {"$ref": "https://example.com/schema.json"}}
        }))
        .unwrap();
        assert_eq!(
            resolved["properties"]["external"]["$ref"],
            json!("https://example.com/schema.json")
        );
    }

    #[test]
    fn test_unresolved_local_ref_fails() {
        let err = resolve_refs(&json!({
            "type": "object",
            "properties": {"x": {"$ref": "#/$defs/Missing"}}
        }))
        .unwrap_err();
        assert!(matches!(err, SchemaError::UnresolvedRef { .. }));
    }

    #[test]
    fn test_ref_sibling_keys_merge() {
        let resolved = resolve_refs(&json!({
            "type": "object",
            "properties": {
                "name": {"$ref": "#/$defs/String", "description": "User's name"}
            },
            "$defs": {"String": {"type": "string", "maxLength": 100}}
        }))
        .unwrap();
        let name = &resolved["properties"]["name"];
        assert_eq!(name["type"], json!("string"));
        assert_eq!(name["maxLength"], json!(100));
        assert_eq!(name["description"], json!("User's name"));
    }

    #[test]
    fn test_deeply_nested_parse_does_not_overflow() {
        fn nested(depth: usize) -> Value {
            if depth == 0 {
                json!({"type": "string"})
            } else {
                json!({"type": "object", "properties": {"nested": nested(depth - 1)}})
            }
        }
        let doc = nested(60);
        assert!(SchemaNode::parse(&doc).is_ok());
    }
}
