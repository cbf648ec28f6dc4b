//! Splitting schemas with `readOnly`/`writeOnly` members into separate
//! response (read) and request (write) variants.

use std::collections::HashSet;

use indexmap::IndexMap;
use serde_json::Value;

use crate::config::ReadWriteConfig;
use crate::error::TransformError;
use crate::graph::relationships::{CHILD_SCHEMA_RELATIONSHIPS, ChildKind, has_child_schemas};
use crate::graph::{Graph, Scope, build_graph};
use crate::naming::{render_name, unique_name};
use crate::pointer::{
    PathSegment, child_path, decode_segment, encode_segment, normalize_pointer, pointer_to_path,
    value_at_mut,
};

/// Keywords under which the walk enters schema territory.
const SCHEMA_KEYS: [&str; 9] = [
    "additionalProperties",
    "allOf",
    "anyOf",
    "items",
    "not",
    "oneOf",
    "patternProperties",
    "properties",
    "schema",
];

/// Which flagged members to drop when building a variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeFilter {
    ReadOnly,
    WriteOnly,
}

impl ScopeFilter {
    fn keyword(self) -> &'static str {
        match self {
            ScopeFilter::ReadOnly => "readOnly",
            ScopeFilter::WriteOnly => "writeOnly",
        }
    }

    fn scope(self) -> Scope {
        match self {
            ScopeFilter::ReadOnly => Scope::Read,
            ScopeFilter::WriteOnly => Scope::Write,
        }
    }

    fn flags(self, schema: &Value) -> bool {
        schema.get(self.keyword()).and_then(Value::as_bool) == Some(true)
    }
}

fn drop_child(graph: &Graph<'_>, child: &mut Value, filter: ScopeFilter) -> bool {
    filter.flags(child) || prune_schema_by_scope(graph, child, filter)
}

/// Remove every child schema flagged with `filter`, and `$ref`s to schemas
/// whose only scope is the filtered one. `required` follows removed
/// properties. Returns true when the schema itself should be dropped.
pub fn prune_schema_by_scope(graph: &Graph<'_>, schema: &mut Value, filter: ScopeFilter) -> bool {
    let Value::Object(map) = schema else {
        return false;
    };

    if let Some(Value::String(reference)) = map.get("$ref") {
        let exclusive = graph
            .scopes(&normalize_pointer(reference))
            .is_some_and(|scopes| scopes.len() == 1 && scopes.contains(&filter.scope()));
        if exclusive {
            map.shift_remove("$ref");
            if !has_child_schemas(map) {
                return true;
            }
        }
    }

    for (keyword, kind) in CHILD_SCHEMA_RELATIONSHIPS {
        let Some(value) = map.get_mut(keyword) else {
            continue;
        };
        let mut removed_properties = Vec::new();
        let drop_keyword = match (kind, value) {
            (ChildKind::Array | ChildKind::SingleOrArray, Value::Array(items)) => {
                items.retain_mut(|item| !drop_child(graph, item, filter));
                items.is_empty()
            }
            (ChildKind::ObjectMap, Value::Object(children)) => {
                children.retain(|name, child| {
                    let drop = drop_child(graph, child, filter);
                    if drop && keyword == "properties" {
                        removed_properties.push(name.clone());
                    }
                    !drop
                });
                children.is_empty()
            }
            (ChildKind::Single | ChildKind::SingleOrArray, child @ Value::Object(_)) => {
                drop_child(graph, child, filter)
            }
            _ => false,
        };

        if !removed_properties.is_empty() {
            if let Some(Value::Array(required)) = map.get_mut("required") {
                required.retain(|name| {
                    !name
                        .as_str()
                        .is_some_and(|name| removed_properties.iter().any(|removed| removed == name))
                });
                if required.is_empty() {
                    map.shift_remove("required");
                }
            }
        }
        if drop_keyword {
            map.shift_remove(keyword);
        }
    }

    map.get("type").and_then(Value::as_str) == Some("object") && !has_child_schemas(map)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitVariants {
    pub read: String,
    pub write: String,
}

#[derive(Debug, Clone, Default)]
pub struct SplitSchemas {
    /// Original schema pointer -> variant pointers.
    pub mapping: IndexMap<String, SplitVariants>,
    /// Variant pointer -> original schema pointer.
    pub reverse_mapping: IndexMap<String, String>,
    /// Variant name -> variant schema.
    pub schemas: IndexMap<String, Value>,
}

/// Pointer of the named schema collection, `#/components/schemas` or `#/definitions`.
pub fn schemas_pointer(spec: &Value) -> Option<&'static str> {
    if spec.pointer("/components/schemas").is_some_and(Value::is_object) {
        Some("#/components/schemas")
    } else if spec.get("definitions").is_some_and(Value::is_object) {
        Some("#/definitions")
    } else {
        None
    }
}

pub(crate) fn schemas_path(schemas_pointer: &str) -> Vec<PathSegment> {
    pointer_to_path(schemas_pointer)
        .into_iter()
        .map(PathSegment::from)
        .collect()
}

/// Name of a top-level schema pointer; nested pointers yield `None`.
fn top_level_schema_name(schemas_pointer: &str, pointer: &str) -> Option<String> {
    let rest = pointer.strip_prefix(schemas_pointer)?.strip_prefix('/')?;
    if rest.is_empty() || rest.contains('/') {
        return None;
    }
    Some(decode_segment(rest))
}

/// Build read and write variants for every top-level schema carrying read or
/// write scopes, unless pruning empties a variant or the split would change
/// nothing.
pub fn split_schemas(
    config: &ReadWriteConfig,
    graph: &Graph<'_>,
    schemas_pointer: &str,
) -> Result<SplitSchemas, TransformError> {
    let mut existing: HashSet<String> = graph
        .nodes
        .keys()
        .filter_map(|pointer| top_level_schema_name(schemas_pointer, pointer))
        .collect();
    let mut split = SplitSchemas::default();
    let has_read_write = |scopes: Option<&crate::graph::ScopeSet>| {
        scopes.is_some_and(|s| s.contains(&Scope::Read) || s.contains(&Scope::Write))
    };

    for (pointer, info) in &graph.nodes {
        let Some(name) = top_level_schema_name(schemas_pointer, pointer) else {
            continue;
        };
        if !has_read_write(info.scopes.as_ref()) {
            continue;
        }

        let mut read_schema = info.node.clone();
        let mut write_schema = info.node.clone();
        if prune_schema_by_scope(graph, &mut read_schema, ScopeFilter::WriteOnly)
            || prune_schema_by_scope(graph, &mut write_schema, ScopeFilter::ReadOnly)
        {
            log::debug!("not splitting {name}: a variant would be empty");
            continue;
        }

        let references_read_write = graph
            .all_dependencies_of(pointer)
            .any(|dependency| has_read_write(graph.scopes(dependency)));
        if !references_read_write && read_schema == write_schema && read_schema == *info.node {
            continue;
        }

        let read_base = render_name(&config.responses, &name)?;
        let read_name = if read_base == name {
            read_base
        } else {
            unique_name(&read_base, &mut existing)
        };
        existing.insert(read_name.clone());

        let write_base = render_name(&config.requests, &name)?;
        let write_name = if write_base == name && write_base != read_name {
            write_base
        } else {
            unique_name(&write_base, &mut existing)
        };
        existing.insert(write_name.clone());

        let read = format!("{schemas_pointer}/{}", encode_segment(&read_name));
        let write = format!("{schemas_pointer}/{}", encode_segment(&write_name));
        split.schemas.insert(read_name, read_schema);
        split.schemas.insert(write_name, write_schema);
        split.reverse_mapping.insert(read.clone(), pointer.clone());
        split.reverse_mapping.insert(write.clone(), pointer.clone());
        split.mapping.insert(pointer.clone(), SplitVariants { read, write });
    }
    Ok(split)
}

/// Access context implied by a component's collection.
fn component_context(path: &[PathSegment]) -> Option<Scope> {
    fn key(segment: &PathSegment) -> Option<&str> {
        match segment {
            PathSegment::Key(key) => Some(key.as_str()),
            PathSegment::Index(_) => None,
        }
    }
    match path {
        [components, collection, _] if key(components) == Some("components") => {
            match key(collection)? {
                "parameters" | "requestBodies" => Some(Scope::Write),
                "responses" | "headers" => Some(Scope::Read),
                _ => None,
            }
        }
        [collection, _] => match key(collection)? {
            "parameters" => Some(Scope::Write),
            "responses" => Some(Scope::Read),
            _ => None,
        },
        _ => None,
    }
}

fn is_root_schema_path(path: &[PathSegment]) -> bool {
    matches!(
        path,
        [PathSegment::Key(components), PathSegment::Key(schemas), PathSegment::Key(_)]
            if components == "components" && schemas == "schemas"
    ) || matches!(path, [PathSegment::Key(definitions), PathSegment::Key(_)] if definitions == "definitions")
}

struct RefRewriter<'s> {
    split: &'s SplitSchemas,
    schemas_pointer: &'s str,
}

impl RefRewriter<'_> {
    fn walk(&self, node: &mut Value, path: &[PathSegment], context: Option<Scope>, in_schema: bool) {
        match node {
            Value::Array(items) => {
                for (index, item) in items.iter_mut().enumerate() {
                    self.walk(item, &child_path(path, index), context, in_schema);
                }
            }
            Value::Object(map) => {
                let mut context = context;
                if let Some(PathSegment::Key(name)) = path.last().filter(|_| is_root_schema_path(path)) {
                    let pointer = format!("{}/{}", self.schemas_pointer, encode_segment(name));
                    let variants = self
                        .split
                        .reverse_mapping
                        .get(&pointer)
                        .and_then(|original| self.split.mapping.get(original));
                    if let Some(variants) = variants {
                        if variants.read == pointer {
                            context = Some(Scope::Read);
                        } else if variants.write == pointer {
                            context = Some(Scope::Write);
                        }
                    }
                }

                if let Some(component) = component_context(path) {
                    for (key, value) in map.iter_mut() {
                        self.walk(value, &child_path(path, key.as_str()), Some(component), false);
                    }
                    return;
                }

                for (key, value) in map.iter_mut() {
                    let child = child_path(path, key.as_str());
                    if !in_schema {
                        match (key.as_str(), &mut *value) {
                            ("requestBody", value) => {
                                self.walk(value, &child, Some(Scope::Write), false);
                                continue;
                            }
                            ("responses", value) => {
                                self.walk(value, &child, Some(Scope::Read), false);
                                continue;
                            }
                            ("parameters", Value::Array(parameters)) => {
                                self.parameters(parameters, &child);
                                continue;
                            }
                            ("headers", Value::Object(headers)) => {
                                for (name, header) in headers.iter_mut() {
                                    self.walk(header, &child_path(&child, name.as_str()), Some(Scope::Read), false);
                                }
                                continue;
                            }
                            _ => {}
                        }
                    }

                    if SCHEMA_KEYS.contains(&key.as_str()) {
                        self.walk(value, &child, context, true);
                    } else if key == "$ref" {
                        self.rewrite(value, context);
                    } else {
                        self.walk(value, &child, context, in_schema);
                    }
                }
            }
            _ => {}
        }
    }

    fn parameters(&self, parameters: &mut [Value], path: &[PathSegment]) {
        for (index, parameter) in parameters.iter_mut().enumerate() {
            let Value::Object(parameter) = parameter else {
                continue;
            };
            let base = child_path(path, index);
            if let Some(schema) = parameter.get_mut("schema") {
                self.walk(schema, &child_path(&base, "schema"), Some(Scope::Write), true);
            }
            if let Some(content) = parameter.get_mut("content") {
                self.walk(content, &child_path(&base, "content"), Some(Scope::Write), false);
            }
        }
    }

    fn rewrite(&self, reference: &mut Value, context: Option<Scope>) {
        let Value::String(target) = reference else {
            return;
        };
        let Some(variants) = self.split.mapping.get(&normalize_pointer(target)) else {
            return;
        };
        let variant = match context {
            Some(Scope::Write) => &variants.write,
            Some(Scope::Read) | None => &variants.read,
            Some(Scope::Normal) => return,
        };
        *target = variant.clone();
    }
}

/// Point every `$ref` to a split schema at its read or write variant,
/// depending on where the reference is used. Unused schemas get the read variant.
pub fn update_refs_in_spec(spec: &mut Value, split: &SplitSchemas, schemas_pointer: &str) {
    let rewriter = RefRewriter {
        split,
        schemas_pointer,
    };
    rewriter.walk(spec, &[], None, false);
}

/// Split scoped schemas, rewrite references, and drop the originals.
pub fn read_write_transform(config: &ReadWriteConfig, spec: &mut Value) -> Result<(), TransformError> {
    let Some(pointer) = schemas_pointer(spec) else {
        return Ok(());
    };
    let split = {
        let graph = build_graph(spec);
        split_schemas(config, &graph, pointer)?
    };
    if split.mapping.is_empty() {
        return Ok(());
    }

    let path = schemas_path(pointer);
    if let Some(Value::Object(schemas)) = value_at_mut(spec, &path) {
        for (name, schema) in &split.schemas {
            schemas.insert(name.clone(), schema.clone());
        }
    }
    update_refs_in_spec(spec, &split, pointer);
    if let Some(Value::Object(schemas)) = value_at_mut(spec, &path) {
        for original in split.mapping.keys() {
            if let Some(name) = top_level_schema_name(pointer, original) {
                if !split.schemas.contains_key(&name) {
                    schemas.shift_remove(&name);
                }
            }
        }
    }
    log::info!(
        "split {} schema(s) into read/write variants",
        split.mapping.len()
    );
    Ok(())
}
