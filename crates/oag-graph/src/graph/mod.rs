//! Pointer-indexed reference graph over a whole OpenAPI document.
//!
//! [`build_graph`] records one [`NodeInfo`] per object/array location, the
//! `$ref` edges between locations, their transpose, propagated access
//! [`Scope`]s, and the set of references reachable from each subtree.

pub mod meta;
pub mod relationships;
pub mod scopes;
pub mod top_level;
pub mod transitive;
pub mod walk;

use std::collections::BTreeSet;
use std::time::Instant;

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;
use serde_json::Value;

use crate::pointer::{PathSegment, encode_segment, normalize_pointer};

pub use meta::build_resource_metadata;
pub use top_level::{ResourceNode, TopLevelGraph};
pub use walk::{
    DependencyGraph, WalkGraph, WalkOptions, WalkOrder, topological_order, walk,
    walk_declarations, walk_topological,
};

/// Access scope of a schema location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Normal,
    Read,
    Write,
}

pub type ScopeSet = BTreeSet<Scope>;

/// Metadata for one visited object or array.
#[derive(Debug, Clone)]
pub struct NodeInfo<'a> {
    /// Key or index used to reach this node from its parent; `None` for the root.
    pub key: Option<PathSegment>,
    pub node: &'a Value,
    pub parent_pointer: Option<String>,
    pub deprecated: Option<bool>,
    pub tags: Option<IndexSet<String>>,
    pub scopes: Option<ScopeSet>,
}

impl NodeInfo<'_> {
    pub fn has_scope(&self, scope: Scope) -> bool {
        self.scopes.as_ref().is_some_and(|s| s.contains(&scope))
    }
}

/// The full reference graph of a document.
///
/// Maps iterate in document pre-order, which downstream ordering relies on.
#[derive(Debug, Clone, Default)]
pub struct Graph<'a> {
    pub nodes: IndexMap<String, NodeInfo<'a>>,
    /// Pointer -> pointers it `$ref`s directly.
    pub dependencies: IndexMap<String, IndexSet<String>>,
    /// Pointer -> pointers that `$ref` it.
    pub reverse_dependencies: IndexMap<String, IndexSet<String>>,
    /// Pointer -> every `$ref` target reachable from anywhere in its subtree.
    pub all_dependencies: IndexMap<String, IndexSet<String>>,
}

impl<'a> Graph<'a> {
    pub fn node(&self, pointer: &str) -> Option<&NodeInfo<'a>> {
        self.nodes.get(pointer)
    }

    pub fn scopes(&self, pointer: &str) -> Option<&ScopeSet> {
        self.nodes.get(pointer).and_then(|n| n.scopes.as_ref())
    }

    pub fn dependencies_of(&self, pointer: &str) -> impl Iterator<Item = &str> {
        self.dependencies
            .get(pointer)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    pub fn all_dependencies_of(&self, pointer: &str) -> impl Iterator<Item = &str> {
        self.all_dependencies
            .get(pointer)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }

    pub fn reverse_dependencies_of(&self, pointer: &str) -> impl Iterator<Item = &str> {
        self.reverse_dependencies
            .get(pointer)
            .into_iter()
            .flatten()
            .map(String::as_str)
    }
}

/// Build the reference graph of `root`.
///
/// Walks depth-first in pre-order, then derives reverse edges, scopes, and
/// subtree dependencies. Cycles of any shape are tolerated.
pub fn build_graph(root: &Value) -> Graph<'_> {
    let started = Instant::now();
    let mut graph = Graph::default();

    visit(&mut graph, root, "#".to_string(), None, None);

    for (pointer, targets) in &graph.dependencies {
        for target in targets {
            graph
                .reverse_dependencies
                .entry(target.clone())
                .or_default()
                .insert(pointer.clone());
        }
    }

    scopes::annotate_scopes(&mut graph);
    graph.all_dependencies = transitive::collect_all_dependencies(&graph);

    log::debug!(
        "built graph with {} nodes and {} referencing nodes in {:?}",
        graph.nodes.len(),
        graph.dependencies.len(),
        started.elapsed()
    );
    graph
}

fn visit<'a>(
    graph: &mut Graph<'a>,
    value: &'a Value,
    pointer: String,
    key: Option<PathSegment>,
    parent_pointer: Option<String>,
) {
    match value {
        Value::Object(map) => {
            let deprecated = map.get("deprecated").and_then(Value::as_bool);
            let tags = map
                .get("tags")
                .and_then(Value::as_array)
                .map(|tags| {
                    tags.iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect::<IndexSet<_>>()
                })
                .filter(|tags| !tags.is_empty());
            if let Some(Value::String(reference)) = map.get("$ref") {
                graph
                    .dependencies
                    .entry(pointer.clone())
                    .or_default()
                    .insert(normalize_pointer(reference));
            }
            graph.nodes.insert(
                pointer.clone(),
                NodeInfo {
                    key,
                    node: value,
                    parent_pointer,
                    deprecated,
                    tags,
                    scopes: None,
                },
            );
            for (name, child) in map {
                if child.is_object() || child.is_array() {
                    let child_pointer = format!("{pointer}/{}", encode_segment(name));
                    visit(
                        graph,
                        child,
                        child_pointer,
                        Some(PathSegment::Key(name.clone())),
                        Some(pointer.clone()),
                    );
                }
            }
        }
        Value::Array(items) => {
            graph.nodes.insert(
                pointer.clone(),
                NodeInfo {
                    key,
                    node: value,
                    parent_pointer,
                    deprecated: None,
                    tags: None,
                    scopes: None,
                },
            );
            for (index, child) in items.iter().enumerate() {
                if child.is_object() || child.is_array() {
                    visit(
                        graph,
                        child,
                        format!("{pointer}/{index}"),
                        Some(PathSegment::Index(index)),
                        Some(pointer.clone()),
                    );
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_records_nodes_in_pre_order() {
        let doc = json!({
            "components": {
                "schemas": {
                    "B": { "type": "string" },
                    "A": { "type": "array", "items": { "$ref": "#/components/schemas/B" } }
                }
            }
        });
        let graph = build_graph(&doc);
        let pointers: Vec<&str> = graph.nodes.keys().map(String::as_str).collect();
        assert_eq!(
            pointers,
            vec![
                "#",
                "#/components",
                "#/components/schemas",
                "#/components/schemas/B",
                "#/components/schemas/A",
                "#/components/schemas/A/items",
            ]
        );
        let items = graph.node("#/components/schemas/A/items").unwrap();
        assert_eq!(items.key, Some(PathSegment::Key("items".into())));
        assert_eq!(items.parent_pointer.as_deref(), Some("#/components/schemas/A"));
        assert!(graph.node("#").unwrap().parent_pointer.is_none());
    }

    #[test]
    fn test_scalars_are_not_nodes() {
        let doc = json!({ "info": { "title": "x" }, "tags": ["a", 1], "n": null });
        let graph = build_graph(&doc);
        assert!(graph.node("#/info/title").is_none());
        assert!(graph.node("#/n").is_none());
        assert!(graph.node("#/tags").is_some());
        assert_eq!(
            graph.node("#").unwrap().tags.as_ref().unwrap().iter().collect::<Vec<_>>(),
            vec!["a"]
        );
    }

    #[test]
    fn test_ref_edges_and_transpose() {
        let doc = json!({
            "components": {
                "schemas": {
                    "Baz": { "$ref": "#/components/schemas/Qux" },
                    "Qux": { "$ref": "#/components/schemas/Baz/" }
                }
            }
        });
        let graph = build_graph(&doc);
        let baz = "#/components/schemas/Baz";
        let qux = "#/components/schemas/Qux";
        assert_eq!(graph.dependencies_of(baz).collect::<Vec<_>>(), vec![qux]);
        assert_eq!(graph.dependencies_of(qux).collect::<Vec<_>>(), vec![baz]);
        assert_eq!(graph.reverse_dependencies_of(baz).collect::<Vec<_>>(), vec![qux]);
        assert_eq!(graph.reverse_dependencies_of(qux).collect::<Vec<_>>(), vec![baz]);
    }

    #[test]
    fn test_deprecated_flag() {
        let doc = json!({ "paths": { "/a": { "get": { "deprecated": true, "tags": ["pets"] } } } });
        let graph = build_graph(&doc);
        let op = graph.node("#/paths/~1a/get").unwrap();
        assert_eq!(op.deprecated, Some(true));
        assert!(op.tags.as_ref().unwrap().contains("pets"));
    }

    #[test]
    fn test_tag_objects_are_not_tags() {
        let doc = json!({ "tags": [{ "name": "pets", "description": "Pet operations" }] });
        let graph = build_graph(&doc);
        assert!(graph.node("#").unwrap().tags.is_none());
    }

    #[test]
    fn test_self_reference_terminates() {
        let doc = json!({
            "components": {
                "schemas": {
                    "Node": {
                        "type": "object",
                        "properties": { "next": { "$ref": "#/components/schemas/Node" } }
                    }
                }
            }
        });
        let graph = build_graph(&doc);
        let node = "#/components/schemas/Node";
        assert!(graph.all_dependencies_of(node).any(|p| p == node));
        assert!(graph.reverse_dependencies_of(node).any(|p| p == "#/components/schemas/Node/properties/next"));
    }
}
