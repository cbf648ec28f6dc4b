//! Namespaced dependency collection over the schema-bearing parts of a document.
//!
//! Walks by structural path rather than by reference so enum transforms can
//! rewrite the document in the middle of a walk.

use std::collections::HashSet;

use indexmap::IndexSet;
use serde_json::{Map, Value, json};

use crate::config::EnumsMode;
use crate::graph::relationships::ChildKind;
use crate::naming::{component_name, unique_name};
use crate::pointer::{
    PathSegment, child_path, encode_segment, path_to_pointer, ref_to_name, ref_to_namespaced_key,
    resolve_ref, value_at, value_at_mut,
};

/// Child schema keywords a version understands, in walk order.
pub type SchemaShape = &'static [(&'static str, ChildKind)];

pub const SWAGGER_2_0_SHAPE: SchemaShape = &[
    ("items", ChildKind::Single),
    ("properties", ChildKind::ObjectMap),
    ("additionalProperties", ChildKind::Single),
    ("allOf", ChildKind::Array),
];

pub const OPENAPI_3_0_SHAPE: SchemaShape = &[
    ("items", ChildKind::Single),
    ("properties", ChildKind::ObjectMap),
    ("additionalProperties", ChildKind::Single),
    ("allOf", ChildKind::Array),
    ("anyOf", ChildKind::Array),
    ("not", ChildKind::Single),
    ("oneOf", ChildKind::Array),
];

pub const OPENAPI_3_1_SHAPE: SchemaShape = &[
    ("items", ChildKind::Single),
    ("properties", ChildKind::ObjectMap),
    ("additionalProperties", ChildKind::Single),
    ("allOf", ChildKind::Array),
    ("anyOf", ChildKind::Array),
    ("contains", ChildKind::Single),
    ("not", ChildKind::Single),
    ("oneOf", ChildKind::Array),
    ("prefixItems", ChildKind::Array),
    ("propertyNames", ChildKind::Single),
];

/// Collects namespaced `$ref` targets and applies enum transforms on the way.
pub struct Collector {
    shape: SchemaShape,
    enums: EnumsMode,
    /// Location of the named schema collection (`definitions` or `components/schemas`).
    schemas_path: Vec<PathSegment>,
    used_names: HashSet<String>,
    /// Names of schemas hoisted into the schema collection, not yet walked.
    pub hoisted: Vec<String>,
    /// Enum schemas inlined everywhere, to delete once the walk is done.
    pub schemas_to_delete: IndexSet<String>,
}

impl Collector {
    pub fn new(spec: &Value, shape: SchemaShape, schemas_path: &[&str], enums: EnumsMode) -> Self {
        let schemas_path: Vec<PathSegment> =
            schemas_path.iter().map(|s| PathSegment::from(*s)).collect();
        let used_names = value_at(spec, &schemas_path)
            .and_then(Value::as_object)
            .map(|schemas| schemas.keys().cloned().collect())
            .unwrap_or_default();
        Self {
            shape,
            enums,
            schemas_path,
            used_names,
            hoisted: Vec::new(),
            schemas_to_delete: IndexSet::new(),
        }
    }

    pub fn schemas_path(&self) -> &[PathSegment] {
        &self.schemas_path
    }

    fn schemas_pointer(&self) -> String {
        path_to_pointer(&self.schemas_path)
    }

    fn is_root_schema(&self, path: &[PathSegment]) -> bool {
        path.len() == self.schemas_path.len() + 1 && path.starts_with(&self.schemas_path)
    }

    /// Walk the schema at `path`, adding every namespaced ref to `dependencies`.
    pub fn schema(&mut self, spec: &mut Value, path: &[PathSegment], dependencies: &mut IndexSet<String>) {
        let Some(Value::Object(node)) = value_at(spec, path) else {
            return;
        };
        let has_enum = node.contains_key("enum");

        match self.enums {
            EnumsMode::Root if has_enum && !self.is_root_schema(path) => {
                if let Some(key) = self
                    .hoist_enum(spec, path)
                    .and_then(|reference| ref_to_namespaced_key(&reference))
                {
                    dependencies.insert(key);
                }
                return;
            }
            EnumsMode::Inline => self.inline_enum(spec, path),
            _ => {}
        }

        let Some(Value::Object(node)) = value_at(spec, path) else {
            return;
        };
        if let Some(key) = node
            .get("$ref")
            .and_then(Value::as_str)
            .and_then(ref_to_namespaced_key)
        {
            dependencies.insert(key);
        }
        let children = self.child_paths(path, node);
        for child in children {
            self.schema(spec, &child, dependencies);
        }
    }

    fn child_paths(&self, path: &[PathSegment], node: &Map<String, Value>) -> Vec<Vec<PathSegment>> {
        let mut children = Vec::new();
        for (keyword, kind) in self.shape {
            let Some(value) = node.get(*keyword) else {
                continue;
            };
            let base = child_path(path, *keyword);
            match (kind, value) {
                (ChildKind::Single | ChildKind::SingleOrArray, Value::Object(_)) => children.push(base),
                (ChildKind::Array | ChildKind::SingleOrArray, Value::Array(items)) => {
                    children.extend(
                        items
                            .iter()
                            .enumerate()
                            .filter(|(_, item)| item.is_object())
                            .map(|(index, _)| child_path(&base, index)),
                    );
                }
                (ChildKind::ObjectMap, Value::Object(map)) => {
                    children.extend(
                        map.iter()
                            .filter(|(_, item)| item.is_object())
                            .map(|(name, _)| child_path(&base, name.as_str())),
                    );
                }
                _ => {}
            }
        }
        children
    }

    /// Move the enum at `path` into the schema collection and leave a `$ref` behind.
    fn hoist_enum(&mut self, spec: &mut Value, path: &[PathSegment]) -> Option<String> {
        let schema = value_at(spec, path)?.clone();
        let base = match (schema.get("title").and_then(Value::as_str), path.last()) {
            (Some(title), _) => component_name(title),
            (None, Some(PathSegment::Key(key))) => component_name(key),
            _ => component_name(""),
        };
        let name = unique_name(&base, &mut self.used_names);
        let reference = format!("{}/{}", self.schemas_pointer(), encode_segment(&name));

        self.schemas_mut(spec)?.insert(name.clone(), schema);
        *value_at_mut(spec, path)? = json!({ "$ref": reference });
        log::info!("hoisted inline enum at {} to {reference}", path_to_pointer(path));
        self.hoisted.push(name);
        Some(reference)
    }

    /// Copy a referenced enum schema into the node at `path` and drop its `$ref`.
    /// Refs outside the schema collection are left alone.
    fn inline_enum(&mut self, spec: &mut Value, path: &[PathSegment]) {
        let Some(reference) = value_at(spec, path)
            .and_then(|node| node.get("$ref"))
            .and_then(Value::as_str)
            .map(str::to_string)
        else {
            return;
        };
        if !reference.starts_with(&format!("{}/", self.schemas_pointer())) {
            return;
        }
        let Some(Value::Object(target)) = resolve_ref(spec, &reference) else {
            return;
        };
        if !target.contains_key("enum") {
            return;
        }
        let target = target.clone();
        if let Some(Value::Object(node)) = value_at_mut(spec, path) {
            for (key, value) in target {
                node.insert(key, value);
            }
            node.shift_remove("$ref");
        }
        let name = ref_to_name(&reference);
        log::info!("inlined enum {name} at {}", path_to_pointer(path));
        self.schemas_to_delete.insert(name);
    }

    fn schemas_mut<'v>(&self, spec: &'v mut Value) -> Option<&'v mut Map<String, Value>> {
        let mut node = spec;
        for segment in &self.schemas_path {
            let (Value::Object(map), PathSegment::Key(key)) = (node, segment) else {
                return None;
            };
            node = map
                .entry(key.clone())
                .or_insert_with(|| Value::Object(Map::new()));
        }
        node.as_object_mut()
    }

    /// Parameters, request bodies, and responses: a `$ref`, a `schema`, or
    /// media types under `content`.
    pub fn holder(&mut self, spec: &mut Value, path: &[PathSegment], dependencies: &mut IndexSet<String>) {
        let Some(Value::Object(node)) = value_at(spec, path) else {
            return;
        };
        if node.contains_key("$ref") {
            self.schema(spec, path, dependencies);
            return;
        }
        let has_schema = node.get("schema").is_some_and(Value::is_object);
        let media_types: Vec<String> = node
            .get("content")
            .and_then(Value::as_object)
            .map(|content| {
                content
                    .iter()
                    .filter(|(_, media)| media.get("schema").is_some_and(Value::is_object))
                    .map(|(media_type, _)| media_type.clone())
                    .collect()
            })
            .unwrap_or_default();

        if has_schema {
            self.schema(spec, &child_path(path, "schema"), dependencies);
        }
        for media_type in media_types {
            let content = child_path(path, "content");
            let schema = child_path(&child_path(&content, media_type), "schema");
            self.schema(spec, &schema, dependencies);
        }
    }

    /// Everything an operation references through its parameters, request body, and responses.
    pub fn operation(&mut self, spec: &mut Value, path: &[PathSegment], dependencies: &mut IndexSet<String>) {
        self.parameters(spec, &child_path(path, "parameters"), dependencies);
        self.holder(spec, &child_path(path, "requestBody"), dependencies);

        let responses = child_path(path, "responses");
        let codes: Vec<String> = value_at(spec, &responses)
            .and_then(Value::as_object)
            .map(|responses| responses.keys().cloned().collect())
            .unwrap_or_default();
        for code in codes {
            self.holder(spec, &child_path(&responses, code), dependencies);
        }
    }

    /// A `parameters` array, on an operation or a path item.
    pub fn parameters(&mut self, spec: &mut Value, path: &[PathSegment], dependencies: &mut IndexSet<String>) {
        let count = value_at(spec, path)
            .and_then(Value::as_array)
            .map_or(0, Vec::len);
        for index in 0..count {
            self.holder(spec, &child_path(path, index), dependencies);
        }
    }
}
