//! Subtree dependency closure.
//!
//! A node needs every `$ref` target reachable from it by walking structural
//! children and following refs. Strongly connected components are collapsed
//! first so every node is resolved once, cycles included.

use std::collections::BTreeSet;

use indexmap::{IndexMap, IndexSet};
use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use super::Graph;

/// Every `$ref` target reachable from each node's subtree.
///
/// Targets appear in the order they were first referenced in the document.
/// Nodes with no reachable refs are omitted.
pub fn collect_all_dependencies(graph: &Graph<'_>) -> IndexMap<String, IndexSet<String>> {
    let count = graph.nodes.len();
    let mut targets: IndexSet<&str> = IndexSet::new();
    let mut direct: Vec<Vec<usize>> = vec![Vec::new(); count];
    let mut edges: Vec<Vec<usize>> = vec![Vec::new(); count];

    for (pointer, deps) in &graph.dependencies {
        let Some(from) = graph.nodes.get_index_of(pointer) else {
            continue;
        };
        for dep in deps {
            let (id, _) = targets.insert_full(dep.as_str());
            direct[from].push(id);
            match graph.nodes.get_index_of(dep) {
                Some(to) => edges[from].push(to),
                None => log::warn!("unresolvable $ref {dep} at {pointer}"),
            }
        }
    }
    for (index, info) in graph.nodes.values().enumerate() {
        if let Some(parent) = info
            .parent_pointer
            .as_deref()
            .and_then(|p| graph.nodes.get_index_of(p))
        {
            edges[parent].push(index);
        }
    }

    let components = strongly_connected_components(&edges);
    let mut component_of = vec![0usize; count];
    for (id, members) in components.iter().enumerate() {
        for &member in members {
            component_of[member] = id;
        }
    }

    // Components come out sinks first, so successors are always resolved.
    let mut reachable: Vec<BTreeSet<usize>> = Vec::with_capacity(components.len());
    for (id, members) in components.iter().enumerate() {
        let mut set = BTreeSet::new();
        for &member in members {
            set.extend(direct[member].iter().copied());
            for &next in &edges[member] {
                let other = component_of[next];
                if other != id {
                    set.extend(reachable[other].iter().copied());
                }
            }
        }
        reachable.push(set);
    }

    let mut all = IndexMap::new();
    for (index, pointer) in graph.nodes.keys().enumerate() {
        let set = &reachable[component_of[index]];
        if set.is_empty() {
            continue;
        }
        all.insert(
            pointer.clone(),
            set.iter()
                .filter_map(|&id| targets.get_index(id))
                .map(|target| target.to_string())
                .collect(),
        );
    }
    all
}

/// Components in reverse topological order, sinks first.
fn strongly_connected_components(edges: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let mut graph = DiGraphMap::<usize, ()>::with_capacity(edges.len(), 0);
    for (from, successors) in edges.iter().enumerate() {
        graph.add_node(from);
        for &to in successors {
            graph.add_edge(from, to, ());
        }
    }
    tarjan_scc(&graph)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::build_graph;
    use serde_json::json;

    #[test]
    fn test_components_in_reverse_topological_order() {
        // 0 -> 1 <-> 2 -> 3
        let edges = vec![vec![1], vec![2], vec![1, 3], vec![]];
        let mut components = strongly_connected_components(&edges);
        for component in &mut components {
            component.sort();
        }
        assert_eq!(components, vec![vec![3], vec![1, 2], vec![0]]);
    }

    #[test]
    fn test_self_loop_is_its_own_component() {
        // 0 -> 0, 1 -> 0
        let components = strongly_connected_components(&[vec![0], vec![0]]);
        assert_eq!(components, vec![vec![0], vec![1]]);
    }

    #[test]
    fn test_subtree_dependencies() {
        let doc = json!({
            "components": {
                "schemas": {
                    "A": {
                        "type": "object",
                        "properties": { "b": { "$ref": "#/components/schemas/B" } }
                    },
                    "B": {
                        "type": "array",
                        "items": { "$ref": "#/components/schemas/C" }
                    },
                    "C": { "type": "string" }
                }
            }
        });
        let graph = build_graph(&doc);
        let all: Vec<&str> = graph.all_dependencies_of("#/components/schemas/A").collect();
        assert_eq!(all, vec!["#/components/schemas/B", "#/components/schemas/C"]);
        assert!(graph.all_dependencies_of("#/components/schemas/C").next().is_none());
        assert_eq!(
            graph.all_dependencies_of("#").collect::<Vec<_>>(),
            vec!["#/components/schemas/B", "#/components/schemas/C"]
        );
    }

    #[test]
    fn test_mutual_references() {
        let doc = json!({
            "components": {
                "schemas": {
                    "Baz": { "properties": { "qux": { "$ref": "#/components/schemas/Qux" } } },
                    "Qux": { "properties": { "baz": { "$ref": "#/components/schemas/Baz" } } }
                }
            }
        });
        let graph = build_graph(&doc);
        let baz = "#/components/schemas/Baz";
        let qux = "#/components/schemas/Qux";
        let baz_all: Vec<&str> = graph.all_dependencies_of(baz).collect();
        let qux_all: Vec<&str> = graph.all_dependencies_of(qux).collect();
        assert_eq!(baz_all, vec![qux, baz]);
        assert_eq!(qux_all, vec![qux, baz]);
    }

    #[test]
    fn test_dangling_refs_are_kept() {
        let doc = json!({ "a": { "$ref": "#/missing" } });
        let graph = build_graph(&doc);
        assert_eq!(graph.all_dependencies_of("#/a").collect::<Vec<_>>(), vec!["#/missing"]);
    }
}
