//! Access scope seeding and propagation.

use std::collections::{HashSet, VecDeque};
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::relationships::child_schema_pointers;
use super::{Graph, Scope, ScopeSet};

static PROPERTY_POINTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/properties/[^/]+$").expect("valid property pattern"));

static COMBINATOR_CHILD_POINTER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.*)/(?:allOf|anyOf|oneOf)/\d+$").expect("valid combinator pattern")
});

/// Seed, propagate, and back-fill scopes for every node of `graph`.
pub(crate) fn annotate_scopes(graph: &mut Graph<'_>) {
    seed_scopes(graph);
    propagate_scopes(graph);
    annotate_child_scopes(graph);
}

/// Scope a node carries on its own, before any propagation.
pub fn local_scope(pointer: &str, node: &Value) -> Option<Scope> {
    let Value::Object(map) = node else {
        return None;
    };
    if map.get("readOnly").and_then(Value::as_bool) == Some(true) {
        Some(Scope::Read)
    } else if map.get("writeOnly").and_then(Value::as_bool) == Some(true) {
        Some(Scope::Write)
    } else if PROPERTY_POINTER.is_match(pointer) {
        Some(Scope::Normal)
    } else {
        None
    }
}

fn seed_scopes(graph: &mut Graph<'_>) {
    for (pointer, info) in graph.nodes.iter_mut() {
        if let Some(scope) = local_scope(pointer, info.node) {
            info.scopes = Some(ScopeSet::from([scope]));
        }
    }
}

/// Union `scopes` into the node at `target`. Returns whether anything was added.
fn merge_into(graph: &mut Graph<'_>, target: &str, scopes: &ScopeSet) -> bool {
    let Some(info) = graph.nodes.get_mut(target) else {
        return false;
    };
    let current = info.scopes.get_or_insert_with(ScopeSet::new);
    let before = current.len();
    current.extend(scopes.iter().copied());
    current.len() > before
}

struct Worklist {
    queue: VecDeque<String>,
    pending: HashSet<String>,
}

impl Worklist {
    fn push(&mut self, pointer: &str) {
        if self.pending.insert(pointer.to_string()) {
            self.queue.push_back(pointer.to_string());
        }
    }

    fn pop(&mut self) -> Option<String> {
        let pointer = self.queue.pop_front()?;
        self.pending.remove(&pointer);
        Some(pointer)
    }
}

/// Re-enqueue everything whose scopes may depend on `pointer`.
fn enqueue_dependents(graph: &Graph<'_>, worklist: &mut Worklist, pointer: &str) {
    worklist.push(pointer);
    if let Some(parent) = graph.nodes.get(pointer).and_then(|n| n.parent_pointer.as_deref()) {
        worklist.push(parent);
    }
    for referrer in graph.reverse_dependencies_of(pointer) {
        worklist.push(referrer);
    }
    if let Some(captures) = COMBINATOR_CHILD_POINTER.captures(pointer) {
        if let Some(schema) = captures.get(1) {
            worklist.push(schema.as_str());
        }
    }
}

fn propagate_scopes(graph: &mut Graph<'_>) {
    let mut worklist = Worklist {
        queue: VecDeque::new(),
        pending: HashSet::new(),
    };
    for (pointer, info) in &graph.nodes {
        if info.scopes.as_ref().is_some_and(|s| !s.is_empty()) {
            worklist.push(pointer);
        }
    }

    let mut iterations = 0usize;
    while let Some(pointer) = worklist.pop() {
        iterations += 1;
        let Some(info) = graph.nodes.get(&pointer) else {
            continue;
        };
        let node = info.node;
        let parent = info.parent_pointer.clone();

        let mut incoming: Vec<ScopeSet> = Vec::new();
        for child in child_schema_pointers(&pointer, node) {
            if let Some(scopes) = graph.scopes(&child) {
                incoming.push(scopes.clone());
            }
        }
        for target in graph.dependencies_of(&pointer) {
            if let Some(scopes) = graph.scopes(target) {
                incoming.push(scopes.clone());
            }
        }
        let mut changed = false;
        for scopes in &incoming {
            changed |= merge_into(graph, &pointer, scopes);
        }
        if changed {
            enqueue_dependents(graph, &mut worklist, &pointer);
        }

        let own = graph.scopes(&pointer).filter(|s| !s.is_empty()).cloned();
        if let (Some(own), Some(parent)) = (own, parent) {
            if merge_into(graph, &parent, &own) {
                enqueue_dependents(graph, &mut worklist, &parent);
            }
        }
    }
    log::debug!("scope propagation settled after {iterations} visits");
}

/// Give every still unscoped node its parent's scopes, top down.
fn annotate_child_scopes(graph: &mut Graph<'_>) {
    for index in 0..graph.nodes.len() {
        let Some((_, info)) = graph.nodes.get_index(index) else {
            continue;
        };
        if info.scopes.is_some() {
            continue;
        }
        let inherited = info
            .parent_pointer
            .as_deref()
            .and_then(|parent| graph.scopes(parent))
            .cloned();
        if let Some((_, info)) = graph.nodes.get_index_mut(index) {
            info.scopes = inherited;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use serde_json::json;

    fn scopes(graph: &Graph<'_>, pointer: &str) -> Vec<Scope> {
        graph
            .scopes(pointer)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    #[test]
    fn test_local_scope() {
        assert_eq!(local_scope("#/x", &json!({ "readOnly": true })), Some(Scope::Read));
        assert_eq!(local_scope("#/x", &json!({ "writeOnly": true })), Some(Scope::Write));
        assert_eq!(
            local_scope("#/x", &json!({ "readOnly": true, "writeOnly": true })),
            Some(Scope::Read)
        );
        assert_eq!(local_scope("#/a/properties/b", &json!({})), Some(Scope::Normal));
        assert_eq!(local_scope("#/a/properties", &json!({})), None);
        assert_eq!(local_scope("#/a/properties/b", &json!([])), None);
    }

    #[test]
    fn test_ref_target_scopes_flow_into_referrer() {
        let doc = json!({
            "components": {
                "schemas": {
                    "Foo": {
                        "type": "object",
                        "properties": {
                            "p": { "readOnly": true, "$ref": "#/components/schemas/Bar" }
                        }
                    },
                    "Bar": {
                        "type": "object",
                        "properties": {
                            "secret": { "type": "string", "writeOnly": true }
                        }
                    }
                }
            }
        });
        let graph = build_graph(&doc);
        assert_eq!(
            scopes(&graph, "#/components/schemas/Foo"),
            vec![Scope::Read, Scope::Write]
        );
        assert_eq!(
            scopes(&graph, "#/components/schemas/Foo/properties/p"),
            vec![Scope::Read, Scope::Write]
        );
        assert_eq!(scopes(&graph, "#/components/schemas/Bar"), vec![Scope::Write]);
    }

    #[test]
    fn test_combinator_children_flow_into_schema() {
        let doc = json!({
            "components": {
                "schemas": {
                    "Base": {
                        "type": "object",
                        "properties": { "id": { "type": "string", "readOnly": true } }
                    },
                    "Child": {
                        "allOf": [
                            { "$ref": "#/components/schemas/Base" },
                            { "type": "object", "properties": { "name": { "type": "string" } } }
                        ]
                    }
                }
            }
        });
        let graph = build_graph(&doc);
        assert_eq!(
            scopes(&graph, "#/components/schemas/Child"),
            vec![Scope::Normal, Scope::Read]
        );
        assert_eq!(
            scopes(&graph, "#/components/schemas/Child/allOf/0"),
            vec![Scope::Read]
        );
    }

    #[test]
    fn test_cycles_terminate() {
        let doc = json!({
            "components": {
                "schemas": {
                    "Baz": {
                        "type": "object",
                        "properties": { "qux": { "$ref": "#/components/schemas/Qux" } }
                    },
                    "Qux": {
                        "type": "object",
                        "properties": {
                            "baz": { "$ref": "#/components/schemas/Baz" },
                            "token": { "type": "string", "writeOnly": true }
                        }
                    }
                }
            }
        });
        let graph = build_graph(&doc);
        assert_eq!(
            scopes(&graph, "#/components/schemas/Baz"),
            vec![Scope::Normal, Scope::Write]
        );
        assert_eq!(
            scopes(&graph, "#/components/schemas/Qux"),
            vec![Scope::Normal, Scope::Write]
        );
    }

    #[test]
    fn test_unscoped_descendants_inherit_parent() {
        let doc = json!({
            "components": {
                "schemas": {
                    "Foo": {
                        "type": "object",
                        "properties": {
                            "meta": {
                                "readOnly": true,
                                "example": { "nested": { "deep": [1, 2] } }
                            }
                        }
                    }
                }
            }
        });
        let graph = build_graph(&doc);
        let base = "#/components/schemas/Foo/properties/meta/example";
        assert_eq!(scopes(&graph, base), vec![Scope::Read]);
        assert_eq!(scopes(&graph, &format!("{base}/nested/deep")), vec![Scope::Read]);
        assert!(graph.scopes("#/info").is_none());
    }
}
