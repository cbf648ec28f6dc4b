//! Deterministic processing order over a dependency graph.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

use super::{Graph, NodeInfo};
use crate::pointer::{TopLevelKind, match_top_level_kind};

/// Spacing between priority groups in the composite declaration index.
const GROUP_STRIDE: u64 = 1_000_000;

/// A graph the walker can order.
pub trait WalkGraph {
    type Node;

    /// Node pointers in declaration order.
    fn pointers(&self) -> Vec<&str>;

    fn node(&self, pointer: &str) -> Option<&Self::Node>;

    /// Direct dependencies of a node.
    fn node_dependencies(&self, pointer: &str) -> Option<&IndexSet<String>>;

    /// Dependencies of the node's whole subtree. Preferred over
    /// [`WalkGraph::node_dependencies`] when present.
    fn subtree_dependencies(&self, _pointer: &str) -> Option<&IndexSet<String>> {
        None
    }

    /// Group used for priorities and the prefer-groups pass.
    fn match_group(&self, pointer: &str) -> Option<TopLevelKind> {
        match_top_level_kind(pointer, None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalkOrder {
    #[default]
    Topological,
    Declarations,
}

pub type GroupMatcher<'a> = &'a dyn Fn(&str) -> Option<TopLevelKind>;
pub type PriorityFn<'a> = &'a dyn Fn(&str) -> usize;

pub struct WalkOptions<'a> {
    pub order: WalkOrder,
    /// Groups to emit first, in this order. Empty disables grouping.
    pub prefer_groups: Vec<TopLevelKind>,
    /// Overrides [`WalkGraph::match_group`].
    pub match_group: Option<GroupMatcher<'a>>,
    /// Overrides the default priority, which is the matched group's position
    /// in `prefer_groups` (unmatched nodes go last).
    pub priority: Option<PriorityFn<'a>>,
}

impl Default for WalkOptions<'_> {
    fn default() -> Self {
        Self {
            order: WalkOrder::Topological,
            prefer_groups: TopLevelKind::DEFAULT_PREFER_GROUPS.to_vec(),
            match_group: None,
            priority: None,
        }
    }
}

impl WalkOptions<'_> {
    pub fn declarations() -> Self {
        Self {
            order: WalkOrder::Declarations,
            ..Self::default()
        }
    }

    fn group<G: WalkGraph + ?Sized>(&self, graph: &G, pointer: &str) -> usize {
        let kind = match self.match_group {
            Some(matcher) => matcher(pointer),
            None => graph.match_group(pointer),
        };
        kind.and_then(|kind| self.prefer_groups.iter().position(|k| *k == kind))
            .unwrap_or(self.prefer_groups.len())
    }

    fn priority<G: WalkGraph + ?Sized>(&self, graph: &G, pointer: &str) -> usize {
        match self.priority {
            Some(priority) => priority(pointer),
            None => self.group(graph, pointer),
        }
    }
}

/// Dependencies first, ties broken by (priority, declaration order).
///
/// Nodes stuck in cycles are appended in declaration order. With
/// `prefer_groups` set, the result is regrouped by kind unless that would
/// place a dependency after its dependent.
pub fn topological_order<G: WalkGraph + ?Sized>(graph: &G, options: &WalkOptions<'_>) -> Vec<String> {
    let pointers = graph.pointers();
    let count = pointers.len();
    let position: HashMap<&str, usize> = pointers
        .iter()
        .enumerate()
        .map(|(index, pointer)| (*pointer, index))
        .collect();

    let composite: Vec<u64> = pointers
        .iter()
        .enumerate()
        .map(|(index, pointer)| options.priority(graph, pointer) as u64 * GROUP_STRIDE + index as u64)
        .collect();

    let deps_of: Vec<Vec<usize>> = pointers
        .iter()
        .enumerate()
        .map(|(index, pointer)| {
            graph
                .subtree_dependencies(pointer)
                .or_else(|| graph.node_dependencies(pointer))
                .into_iter()
                .flatten()
                .filter_map(|dep| position.get(dep.as_str()).copied())
                .filter(|dep| *dep != index)
                .collect()
        })
        .collect();

    let mut in_degree: Vec<usize> = deps_of.iter().map(Vec::len).collect();
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); count];
    for (index, deps) in deps_of.iter().enumerate() {
        for &dep in deps {
            dependents[dep].push(index);
        }
    }

    let mut heap: BinaryHeap<Reverse<(u64, usize)>> = (0..count)
        .filter(|&index| in_degree[index] == 0)
        .map(|index| Reverse((composite[index], index)))
        .collect();
    let mut emitted = vec![false; count];
    let mut order: Vec<usize> = Vec::with_capacity(count);

    while let Some(Reverse((_, current))) = heap.pop() {
        if emitted[current] {
            continue;
        }
        emitted[current] = true;
        order.push(current);
        for &dependent in &dependents[current] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                heap.push(Reverse((composite[dependent], dependent)));
            }
        }
    }

    let mut remaining: Vec<usize> = (0..count).filter(|&index| !emitted[index]).collect();
    if !remaining.is_empty() {
        log::debug!(
            "{} nodes in dependency cycles emitted in declaration order",
            remaining.len()
        );
    }
    remaining.sort_by_key(|&index| composite[index]);
    order.extend(remaining);

    if !options.prefer_groups.is_empty() {
        let groups: Vec<usize> = pointers
            .iter()
            .map(|pointer| options.group(graph, pointer))
            .collect();
        let mut proposed = order.clone();
        proposed.sort_by_key(|&index| groups[index]);

        let mut proposed_index = vec![0usize; count];
        for (slot, &index) in proposed.iter().enumerate() {
            proposed_index[index] = slot;
        }
        let violated = deps_of.iter().enumerate().any(|(node, deps)| {
            deps.iter().any(|&dep| {
                groups[dep] > groups[node] && proposed_index[dep] >= proposed_index[node]
            })
        });
        if violated {
            log::debug!("group preference would break a dependency, keeping topological order");
        } else {
            order = proposed;
        }
    }

    order
        .into_iter()
        .map(|index| pointers[index].to_string())
        .collect()
}

/// Declaration order, with `prefer_groups` kinds pulled to the front.
pub fn declaration_order<G: WalkGraph + ?Sized>(graph: &G, options: &WalkOptions<'_>) -> Vec<String> {
    let pointers = graph.pointers();
    if options.prefer_groups.is_empty() {
        return pointers.into_iter().map(str::to_string).collect();
    }

    let kinds: Vec<Option<TopLevelKind>> = pointers
        .iter()
        .map(|pointer| match options.match_group {
            Some(matcher) => matcher(pointer),
            None => graph.match_group(pointer),
        })
        .collect();
    let mut emitted = vec![false; pointers.len()];
    let mut order = Vec::with_capacity(pointers.len());
    for kind in &options.prefer_groups {
        for (index, pointer) in pointers.iter().enumerate() {
            if !emitted[index] && kinds[index] == Some(*kind) {
                emitted[index] = true;
                order.push(pointer.to_string());
            }
        }
    }
    for (index, pointer) in pointers.iter().enumerate() {
        if !emitted[index] {
            order.push(pointer.to_string());
        }
    }
    order
}

fn visit_in_order<G, F>(graph: &G, order: Vec<String>, mut callback: F)
where
    G: WalkGraph + ?Sized,
    F: FnMut(&str, &G::Node),
{
    for pointer in &order {
        if let Some(node) = graph.node(pointer) {
            callback(pointer, node);
        }
    }
}

/// Call `callback` once per node in topological order.
pub fn walk_topological<G, F>(graph: &G, options: &WalkOptions<'_>, callback: F)
where
    G: WalkGraph + ?Sized,
    F: FnMut(&str, &G::Node),
{
    visit_in_order(graph, topological_order(graph, options), callback);
}

/// Call `callback` once per node in declaration order.
pub fn walk_declarations<G, F>(graph: &G, options: &WalkOptions<'_>, callback: F)
where
    G: WalkGraph + ?Sized,
    F: FnMut(&str, &G::Node),
{
    visit_in_order(graph, declaration_order(graph, options), callback);
}

pub fn walk<G, F>(graph: &G, options: &WalkOptions<'_>, callback: F)
where
    G: WalkGraph + ?Sized,
    F: FnMut(&str, &G::Node),
{
    match options.order {
        WalkOrder::Topological => walk_topological(graph, options, callback),
        WalkOrder::Declarations => walk_declarations(graph, options, callback),
    }
}

impl<'a> WalkGraph for Graph<'a> {
    type Node = NodeInfo<'a>;

    fn pointers(&self) -> Vec<&str> {
        self.nodes.keys().map(String::as_str).collect()
    }

    fn node(&self, pointer: &str) -> Option<&NodeInfo<'a>> {
        self.nodes.get(pointer)
    }

    fn node_dependencies(&self, pointer: &str) -> Option<&IndexSet<String>> {
        self.dependencies.get(pointer)
    }

    fn subtree_dependencies(&self, pointer: &str) -> Option<&IndexSet<String>> {
        self.all_dependencies.get(pointer)
    }
}

/// Plain pointer graph, for callers that already know their edges.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    pub nodes: IndexSet<String>,
    pub node_dependencies: IndexMap<String, IndexSet<String>>,
    pub subtree_dependencies: IndexMap<String, IndexSet<String>>,
}

impl DependencyGraph {
    pub fn with_nodes<I, S>(nodes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            nodes: nodes.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn add_dependency(&mut self, from: &str, to: &str) {
        self.node_dependencies
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }

    pub fn add_subtree_dependency(&mut self, from: &str, to: &str) {
        self.subtree_dependencies
            .entry(from.to_string())
            .or_default()
            .insert(to.to_string());
    }
}

impl WalkGraph for DependencyGraph {
    type Node = String;

    fn pointers(&self) -> Vec<&str> {
        self.nodes.iter().map(String::as_str).collect()
    }

    fn node(&self, pointer: &str) -> Option<&String> {
        self.nodes.get(pointer)
    }

    fn node_dependencies(&self, pointer: &str) -> Option<&IndexSet<String>> {
        self.node_dependencies.get(pointer)
    }

    fn subtree_dependencies(&self, pointer: &str) -> Option<&IndexSet<String>> {
        self.subtree_dependencies.get(pointer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_graph(deps: &[(&str, &[&str])], nodes: &[&str]) -> DependencyGraph {
        let mut graph = DependencyGraph::with_nodes(nodes.iter().copied());
        for (from, to_list) in deps {
            for to in *to_list {
                graph.add_dependency(from, to);
            }
        }
        graph
    }

    fn order_of(graph: &DependencyGraph, options: &WalkOptions<'_>) -> Vec<String> {
        let mut order = Vec::new();
        walk(graph, options, |pointer, _| order.push(pointer.to_string()));
        order
    }

    fn index(order: &[String], pointer: &str) -> usize {
        order.iter().position(|p| p == pointer).unwrap()
    }

    #[test]
    fn test_simple_chain() {
        let graph = make_graph(&[("A", &["B"]), ("B", &["C"])], &["A", "B", "C"]);
        let order = order_of(&graph, &WalkOptions::default());
        assert_eq!(order, vec!["C", "B", "A"]);
    }

    #[test]
    fn test_diamond() {
        let graph = make_graph(
            &[("A", &["B", "C"]), ("B", &["D"]), ("C", &["D"])],
            &["A", "B", "C", "D"],
        );
        let order = order_of(&graph, &WalkOptions::default());
        assert_eq!(order, vec!["D", "B", "C", "A"]);
    }

    #[test]
    fn test_disconnected_keeps_declaration_tiebreak() {
        let graph = make_graph(&[("A", &["B"])], &["A", "B", "C", "D"]);
        let order = order_of(&graph, &WalkOptions::default());
        assert_eq!(order, vec!["B", "A", "C", "D"]);
    }

    #[test]
    fn test_cycle_members_are_all_emitted() {
        let graph = make_graph(&[("A", &["B"]), ("B", &["A"])], &["A", "B", "C"]);
        let mut order = order_of(&graph, &WalkOptions::default());
        assert_eq!(order.len(), 3);
        order.sort();
        assert_eq!(order, vec!["A", "B", "C"]);
    }

    #[test]
    fn test_cycle_remainder_in_declaration_order() {
        let graph = make_graph(
            &[("A", &["B"]), ("B", &["A"]), ("D", &["A"])],
            &["D", "A", "B", "C"],
        );
        let order = order_of(&graph, &WalkOptions::default());
        assert_eq!(order, vec!["C", "D", "A", "B"]);
    }

    #[test]
    fn test_stable_for_independent_nodes() {
        let nodes = [
            "#/components/schemas/A",
            "#/components/schemas/B",
            "#/components/schemas/C",
        ];
        let graph = make_graph(&[], &nodes);
        assert_eq!(order_of(&graph, &WalkOptions::default()), nodes);
        assert_eq!(order_of(&graph, &WalkOptions::declarations()), nodes);
    }

    #[test]
    fn test_self_dependency_is_ignored() {
        let foo = "#/components/schemas/Foo";
        let bar = "#/components/schemas/Bar";
        let graph = make_graph(&[(foo, &[foo]), (bar, &[foo])], &[bar, foo]);
        let order = order_of(&graph, &WalkOptions::default());
        assert_eq!(order, vec![foo, bar]);
    }

    #[test]
    fn test_subtree_dependencies_take_precedence() {
        let parent = "#/components/schemas/Parent";
        let child = "#/components/schemas/Child";
        let mut graph = make_graph(&[], &[parent, child]);
        graph.add_subtree_dependency(parent, child);
        let order = order_of(&graph, &WalkOptions::default());
        assert!(index(&order, child) < index(&order, parent));
    }

    #[test]
    fn test_missing_dependencies_are_ignored() {
        let graph = make_graph(&[("A", &["#/nowhere"])], &["A", "B"]);
        assert_eq!(order_of(&graph, &WalkOptions::default()), vec!["A", "B"]);
    }

    #[test]
    fn test_prefers_schemas_before_parameters() {
        let param = "#/components/parameters/P";
        let schema = "#/components/schemas/A";
        let graph = make_graph(&[], &[param, schema]);
        let order = order_of(&graph, &WalkOptions::default());
        assert_eq!(order, vec![schema, param]);
    }

    #[test]
    fn test_group_preference_never_breaks_dependencies() {
        let param = "#/components/parameters/P";
        let schema = "#/components/schemas/S";
        let graph = make_graph(&[(schema, &[param])], &[param, schema]);
        let order = order_of(&graph, &WalkOptions::default());
        assert_eq!(order, vec![param, schema]);
    }

    #[test]
    fn test_explicit_priority_without_groups() {
        let priority = |pointer: &str| usize::from(pointer.starts_with("#/components/schemas/"));
        let options = WalkOptions {
            prefer_groups: Vec::new(),
            priority: Some(&priority),
            ..WalkOptions::default()
        };
        let graph = make_graph(&[], &["#/components/schemas/A", "#/paths/~1a/get"]);
        assert_eq!(
            order_of(&graph, &options),
            vec!["#/paths/~1a/get", "#/components/schemas/A"]
        );
    }

    #[test]
    fn test_declarations_with_prefer_groups() {
        let param = "#/components/parameters/P";
        let schema = "#/components/schemas/A";
        let other = "#/info";
        let graph = make_graph(&[(schema, &[param])], &[other, param, schema]);
        let order = order_of(&graph, &WalkOptions::declarations());
        assert_eq!(order, vec![schema, param, other]);

        let options = WalkOptions {
            prefer_groups: Vec::new(),
            ..WalkOptions::declarations()
        };
        assert_eq!(order_of(&graph, &options), vec![other, param, schema]);
    }

    #[test]
    fn test_custom_group_matcher() {
        let matcher = |pointer: &str| {
            pointer
                .starts_with("op")
                .then_some(TopLevelKind::Operation)
                .or(Some(TopLevelKind::Schema))
        };
        let options = WalkOptions {
            prefer_groups: vec![TopLevelKind::Operation, TopLevelKind::Schema],
            match_group: Some(&matcher),
            ..WalkOptions::default()
        };
        let graph = make_graph(&[], &["type", "op"]);
        assert_eq!(order_of(&graph, &options), vec!["op", "type"]);
    }
}
