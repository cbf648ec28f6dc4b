use serde_json::Value;

use crate::pointer::encode_segment;

/// How a schema keyword holds its child schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    /// `allOf: [schema, ...]`
    Array,
    /// `properties: { name: schema }`
    ObjectMap,
    /// `not: schema`
    Single,
    /// `items: schema` or `items: [schema, ...]`
    SingleOrArray,
}

/// Schema keywords that embed child schemas structurally.
pub const CHILD_SCHEMA_RELATIONSHIPS: [(&str, ChildKind); 17] = [
    ("additionalProperties", ChildKind::Single),
    ("allOf", ChildKind::Array),
    ("anyOf", ChildKind::Array),
    ("contains", ChildKind::Single),
    ("dependentSchemas", ChildKind::ObjectMap),
    ("else", ChildKind::Single),
    ("if", ChildKind::Single),
    ("items", ChildKind::SingleOrArray),
    ("not", ChildKind::Single),
    ("oneOf", ChildKind::Array),
    ("patternProperties", ChildKind::ObjectMap),
    ("prefixItems", ChildKind::Array),
    ("properties", ChildKind::ObjectMap),
    ("propertyNames", ChildKind::Single),
    ("then", ChildKind::Single),
    ("unevaluatedItems", ChildKind::Single),
    ("unevaluatedProperties", ChildKind::Single),
];

/// Whether the object carries any child-bearing keyword.
pub fn has_child_schemas(schema: &serde_json::Map<String, Value>) -> bool {
    CHILD_SCHEMA_RELATIONSHIPS
        .iter()
        .any(|(keyword, _)| schema.contains_key(*keyword))
}

/// Pointers of every child schema embedded in `node`, in keyword table order.
pub fn child_schema_pointers(pointer: &str, node: &Value) -> Vec<String> {
    let Value::Object(schema) = node else {
        return Vec::new();
    };
    let mut children = Vec::new();
    for (keyword, kind) in CHILD_SCHEMA_RELATIONSHIPS {
        let Some(value) = schema.get(keyword) else {
            continue;
        };
        let base = format!("{pointer}/{}", encode_segment(keyword));
        match (kind, value) {
            (ChildKind::Array | ChildKind::SingleOrArray, Value::Array(items)) => {
                children.extend(
                    items
                        .iter()
                        .enumerate()
                        .filter(|(_, item)| item.is_object())
                        .map(|(index, _)| format!("{base}/{index}")),
                );
            }
            (ChildKind::ObjectMap, Value::Object(map)) => {
                children.extend(
                    map.iter()
                        .filter(|(_, item)| item.is_object())
                        .map(|(name, _)| format!("{base}/{}", encode_segment(name))),
                );
            }
            (ChildKind::Single | ChildKind::SingleOrArray, Value::Object(_)) => {
                children.push(base);
            }
            _ => {}
        }
    }
    children
}
