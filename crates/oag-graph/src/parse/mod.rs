pub mod dependencies;
pub mod v2_0;
pub mod v3_0;
pub mod v3_1;
pub mod validator;

use std::fmt;
use std::time::Instant;

use indexmap::IndexSet;
use serde::Serialize;
use serde_json::Value;

use crate::config::EnumsMode;
use crate::error::ParseError;
use crate::graph::{ResourceNode, TopLevelGraph};
use crate::pointer::{
    HTTP_METHODS, Namespace, PathSegment, add_namespace, child_path, encode_segment,
    normalize_pointer, operation_key, path_to_pointer, value_at,
};
use dependencies::{Collector, SchemaShape};
use validator::{OperationIds, ValidatorIssue, ValidatorResult, is_valid};

pub use v2_0::Swagger2Extractor;
pub use v3_0::OpenApi30Extractor;
pub use v3_1::OpenApi31Extractor;

/// Parse an OpenAPI document from YAML, keeping key order.
pub fn from_yaml(input: &str) -> Result<Value, ParseError> {
    let spec: Value = serde_yaml_ng::from_str(input)?;
    detect_version(&spec)?;
    Ok(spec)
}

/// Parse an OpenAPI document from JSON, keeping key order.
pub fn from_json(input: &str) -> Result<Value, ParseError> {
    let spec: Value = serde_json::from_str(input)?;
    detect_version(&spec)?;
    Ok(spec)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SpecVersion {
    #[serde(rename = "2.0")]
    V2_0,
    #[serde(rename = "3.0")]
    V3_0,
    #[serde(rename = "3.1")]
    V3_1,
}

impl fmt::Display for SpecVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SpecVersion::V2_0 => "2.0",
            SpecVersion::V3_0 => "3.0",
            SpecVersion::V3_1 => "3.1",
        })
    }
}

fn version_string(value: &Value) -> Option<String> {
    match value {
        Value::String(version) => Some(version.clone()),
        Value::Number(version) => Some(version.to_string()),
        _ => None,
    }
}

/// Read the version from `swagger` or `openapi`.
pub fn detect_version(spec: &Value) -> Result<SpecVersion, ParseError> {
    if let Some(swagger) = spec.get("swagger") {
        let version = version_string(swagger).unwrap_or_default();
        return match version.as_str() {
            "2.0" => Ok(SpecVersion::V2_0),
            _ => Err(ParseError::UnsupportedVersion(version)),
        };
    }
    let version = spec
        .get("openapi")
        .and_then(version_string)
        .ok_or_else(|| ParseError::MissingField("openapi".to_string()))?;
    if version == "3.0" || version.starts_with("3.0.") {
        Ok(SpecVersion::V3_0)
    } else if version == "3.1" || version.starts_with("3.1.") {
        Ok(SpecVersion::V3_1)
    } else {
        Err(ParseError::UnsupportedVersion(version))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ExtractOptions {
    pub validate: bool,
    pub enums: EnumsMode,
}

/// Top-level graph of a document plus the issues found while building it.
#[derive(Debug, Clone, Serialize)]
pub struct ExtractResult {
    pub graph: TopLevelGraph,
    pub issues: Vec<ValidatorIssue>,
    pub valid: bool,
}

impl ExtractResult {
    pub fn validator_result(&self) -> ValidatorResult {
        ValidatorResult::new(self.issues.clone())
    }
}

/// Builds the namespaced top-level graph for one document version.
pub trait GraphExtractor {
    fn version(&self) -> SpecVersion;

    /// Collect dependencies of every named resource. Enum transforms rewrite `spec` in place.
    fn create_graph(&self, spec: &mut Value, options: &ExtractOptions) -> ExtractResult;
}

pub fn extractor_for(version: SpecVersion) -> &'static dyn GraphExtractor {
    match version {
        SpecVersion::V2_0 => &Swagger2Extractor,
        SpecVersion::V3_0 => &OpenApi30Extractor,
        SpecVersion::V3_1 => &OpenApi31Extractor,
    }
}

#[derive(Debug, Clone, Copy)]
enum Content {
    /// The entry itself is a schema.
    Schema,
    /// The entry carries a `schema` or `content.*.schema`.
    Holder,
}

/// Where one version keeps its named resources.
pub(crate) struct Layout {
    pub shape: SchemaShape,
    pub schemas: &'static [&'static str],
    pub collections: &'static [(&'static [&'static str], Namespace)],
    pub webhooks: bool,
}

impl Layout {
    fn content(&self, location: &[&str]) -> Content {
        if location == self.schemas {
            Content::Schema
        } else {
            Content::Holder
        }
    }
}

fn keys_at(spec: &Value, path: &[PathSegment]) -> Vec<String> {
    value_at(spec, path)
        .and_then(Value::as_object)
        .map(|map| map.keys().cloned().collect())
        .unwrap_or_default()
}

fn resource_node(node: Option<&Value>, dependencies: IndexSet<String>) -> ResourceNode {
    let deprecated = node
        .and_then(|n| n.get("deprecated"))
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let tags = node
        .and_then(|n| n.get("tags"))
        .and_then(Value::as_array)
        .map(|tags| {
            tags.iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();
    ResourceNode {
        dependencies,
        deprecated,
        tags,
    }
}

/// Shared extraction over a version's [`Layout`].
pub(crate) fn extract(layout: &Layout, spec: &mut Value, options: &ExtractOptions) -> ExtractResult {
    let started = Instant::now();
    let mut collector = Collector::new(spec, layout.shape, layout.schemas, options.enums);
    let mut graph = TopLevelGraph::default();
    let mut issues = Vec::new();

    for (location, namespace) in layout.collections {
        let base: Vec<PathSegment> = location.iter().map(|s| PathSegment::from(*s)).collect();
        for name in keys_at(spec, &base) {
            let path = child_path(&base, name.as_str());
            let mut dependencies = IndexSet::new();
            match layout.content(location) {
                Content::Schema => collector.schema(spec, &path, &mut dependencies),
                Content::Holder => collector.holder(spec, &path, &mut dependencies),
            }
            graph.insert(
                add_namespace(*namespace, &name),
                resource_node(value_at(spec, &path), dependencies),
            );
        }
    }

    let mut operation_ids = OperationIds::default();
    let mut item_roots = vec![("paths", Namespace::Operation)];
    if layout.webhooks {
        item_roots.push(("webhooks", Namespace::Webhook));
    }
    for (root, namespace) in item_roots {
        let root_path = crate::path![root];
        for route in keys_at(spec, &root_path) {
            let item = child_path(&root_path, route.as_str());
            let methods: Vec<&str> = HTTP_METHODS
                .into_iter()
                .filter(|method| {
                    value_at(spec, &child_path(&item, *method)).is_some_and(Value::is_object)
                })
                .collect();
            for method in methods {
                let operation = child_path(&item, method);
                let mut dependencies = IndexSet::new();
                collector.parameters(spec, &child_path(&item, "parameters"), &mut dependencies);
                collector.operation(spec, &operation, &mut dependencies);

                let node = value_at(spec, &operation);
                if options.validate && namespace == Namespace::Operation {
                    let operation_id = node.and_then(|n| n.get("operationId")).and_then(Value::as_str);
                    if let Some(issue) =
                        operation_id.and_then(|id| operation_ids.claim(id, &route, method))
                    {
                        issues.push(issue);
                    }
                }
                graph.insert(
                    add_namespace(namespace, &operation_key(method, &route)),
                    resource_node(node, dependencies),
                );
            }
        }
    }

    let schemas: Vec<PathSegment> = layout.schemas.iter().map(|s| PathSegment::from(*s)).collect();
    let mut next = 0;
    while next < collector.hoisted.len() {
        let name = collector.hoisted[next].clone();
        next += 1;
        let path = child_path(&schemas, name.as_str());
        let mut dependencies = IndexSet::new();
        collector.schema(spec, &path, &mut dependencies);
        graph.insert(
            add_namespace(Namespace::Schema, &name),
            resource_node(value_at(spec, &path), dependencies),
        );
    }

    if !collector.schemas_to_delete.is_empty() {
        let schemas_path = collector.schemas_path().to_vec();
        if log::log_enabled!(log::Level::Debug) {
            let schemas_pointer = path_to_pointer(&schemas_path);
            let targets: IndexSet<String> = collector
                .schemas_to_delete
                .iter()
                .map(|name| format!("{schemas_pointer}/{}", encode_segment(name)))
                .collect();
            for (location, target) in remaining_referrers(spec, &targets) {
                log::debug!("{location} still references inlined enum {target}");
            }
        }
        if let Some(Value::Object(collection)) = crate::pointer::value_at_mut(spec, &schemas_path) {
            for name in &collector.schemas_to_delete {
                collection.shift_remove(name);
            }
        }
        for name in &collector.schemas_to_delete {
            graph.remove(&add_namespace(Namespace::Schema, name));
        }
        log::info!("inlined {} enum schema(s)", collector.schemas_to_delete.len());
    }

    log::debug!(
        "extracted {} top-level resources in {:?}",
        graph.len(),
        started.elapsed()
    );
    let valid = is_valid(&issues);
    ExtractResult {
        graph,
        issues,
        valid,
    }
}

/// `$ref`s in `spec` that still point at one of `targets`, as (location, target).
fn remaining_referrers(spec: &Value, targets: &IndexSet<String>) -> Vec<(String, String)> {
    fn visit(value: &Value, pointer: String, targets: &IndexSet<String>, found: &mut Vec<(String, String)>) {
        match value {
            Value::Object(map) => {
                if let Some(target) = map
                    .get("$ref")
                    .and_then(Value::as_str)
                    .map(normalize_pointer)
                    .filter(|target| targets.contains(target))
                {
                    found.push((pointer.clone(), target));
                }
                for (key, child) in map {
                    visit(child, format!("{pointer}/{}", encode_segment(key)), targets, found);
                }
            }
            Value::Array(items) => {
                for (index, item) in items.iter().enumerate() {
                    visit(item, format!("{pointer}/{index}"), targets, found);
                }
            }
            _ => {}
        }
    }

    let mut found = Vec::new();
    visit(spec, "#".to_string(), targets, &mut found);
    found
}
