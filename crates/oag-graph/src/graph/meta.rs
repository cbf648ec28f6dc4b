use std::time::Instant;

use indexmap::IndexSet;

use super::{Graph, NodeInfo, ResourceNode, TopLevelGraph};
use crate::pointer::{
    HTTP_METHODS, Namespace, add_namespace, operation_key, pointer_to_path, ref_to_namespaced_key,
};

/// Project the pointer graph onto named top-level resources.
///
/// Each resource depends on everything its subtree can reach, keyed by
/// namespace.
pub fn build_resource_metadata(graph: &Graph<'_>) -> TopLevelGraph {
    let started = Instant::now();
    let mut metadata = TopLevelGraph::default();

    for (pointer, info) in &graph.nodes {
        let path = pointer_to_path(pointer);
        let segments: Vec<&str> = path.iter().map(String::as_str).collect();
        let key = match segments.as_slice() {
            ["components", collection, name] => match *collection {
                "schemas" => add_namespace(Namespace::Schema, name),
                "parameters" => add_namespace(Namespace::Parameter, name),
                "requestBodies" => add_namespace(Namespace::Body, name),
                "responses" => add_namespace(Namespace::Response, name),
                _ => continue,
            },
            ["definitions", name] => add_namespace(Namespace::Schema, name),
            ["parameters", name] => add_namespace(Namespace::Parameter, name),
            ["responses", name] => add_namespace(Namespace::Response, name),
            ["paths", path, method] if HTTP_METHODS.contains(method) => {
                add_namespace(Namespace::Operation, &operation_key(method, path))
            }
            ["webhooks", name, method] if HTTP_METHODS.contains(method) => {
                add_namespace(Namespace::Webhook, &operation_key(method, name))
            }
            _ => continue,
        };
        metadata.insert(key, resource_node(graph, pointer, info));
    }

    log::debug!(
        "built resource metadata for {} resources in {:?}",
        metadata.len(),
        started.elapsed()
    );
    metadata
}

fn resource_node(graph: &Graph<'_>, pointer: &str, info: &NodeInfo<'_>) -> ResourceNode {
    let dependencies: IndexSet<String> = graph
        .all_dependencies_of(pointer)
        .filter_map(ref_to_namespaced_key)
        .collect();
    ResourceNode {
        dependencies,
        deprecated: info.deprecated.unwrap_or(false),
        tags: info.tags.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use serde_json::json;

    #[test]
    fn test_openapi3_resources() {
        let doc = json!({
            "openapi": "3.1.0",
            "paths": {
                "/pets": {
                    "parameters": [],
                    "get": {
                        "tags": ["pets"],
                        "deprecated": true,
                        "parameters": [{ "$ref": "#/components/parameters/limit" }],
                        "responses": {
                            "200": { "$ref": "#/components/responses/PetList" }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Pet": { "type": "object", "properties": { "tag": { "$ref": "#/components/schemas/Tag" } } },
                    "Tag": { "type": "string" }
                },
                "parameters": { "limit": { "name": "limit", "in": "query", "schema": { "type": "integer" } } },
                "responses": {
                    "PetList": {
                        "content": {
                            "application/json": {
                                "schema": { "type": "array", "items": { "$ref": "#/components/schemas/Pet" } }
                            }
                        }
                    }
                }
            }
        });
        let graph = build_graph(&doc);
        let metadata = build_resource_metadata(&graph);

        let operation = metadata.get("operation:GET /pets").unwrap();
        assert!(operation.deprecated);
        assert!(operation.tags.contains("pets"));
        assert_eq!(
            operation.dependencies.iter().collect::<Vec<_>>(),
            vec!["parameter:limit", "response:PetList", "schema:Tag", "schema:Pet"]
        );
        assert_eq!(
            metadata.get("response:PetList").unwrap().dependencies.iter().collect::<Vec<_>>(),
            vec!["schema:Tag", "schema:Pet"]
        );
        assert!(metadata.get("schema:Tag").unwrap().dependencies.is_empty());
        assert!(metadata.get("parameter:limit").is_some());
        assert_eq!(metadata.operations.len(), 1);
    }

    #[test]
    fn test_swagger2_resources() {
        let doc = json!({
            "swagger": "2.0",
            "definitions": {
                "Pet": { "type": "object" }
            },
            "parameters": {
                "body": { "in": "body", "name": "body", "schema": { "$ref": "#/definitions/Pet" } }
            }
        });
        let graph = build_graph(&doc);
        let metadata = build_resource_metadata(&graph);
        assert!(metadata.get("schema:Pet").is_some());
        assert_eq!(
            metadata.get("parameter:body").unwrap().dependencies.iter().collect::<Vec<_>>(),
            vec!["schema:Pet"]
        );
    }
}
