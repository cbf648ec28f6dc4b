//! Include/exclude filtering of named resources, consistent with the
//! dependency graph so no kept resource references a dropped one.

use std::collections::VecDeque;
use std::time::Instant;

use indexmap::IndexSet;
use regex::Regex;
use serde_json::{Map, Value};

use crate::config::{FilterSet, Filters};
use crate::error::ConfigError;
use crate::graph::{ResourceNode, TopLevelGraph};
use crate::pointer::{HTTP_METHODS, Namespace, add_namespace, operation_key, remove_namespace};

/// One compiled filter pattern.
#[derive(Debug, Clone)]
pub enum Matcher {
    Exact(String),
    Regex(Regex),
    Tag(String),
    Deprecated(bool),
}

impl Matcher {
    /// `/regex/`, `@tag:<name>`, `@deprecated[:bool]`, or an exact name.
    pub fn compile(pattern: &str) -> Result<Self, ConfigError> {
        if pattern.len() > 1 && pattern.starts_with('/') && pattern.ends_with('/') {
            let source = &pattern[1..pattern.len() - 1];
            return Regex::new(source)
                .map(Matcher::Regex)
                .map_err(|source| ConfigError::InvalidPattern {
                    pattern: pattern.to_string(),
                    source,
                });
        }
        if let Some(field) = pattern.strip_prefix('@') {
            let (field, value) = match field.split_once(':') {
                Some((field, value)) => (field, Some(value)),
                None => (field, None),
            };
            match (field, value) {
                ("tag", Some(tag)) => return Ok(Matcher::Tag(tag.to_string())),
                ("deprecated", None | Some("true")) => return Ok(Matcher::Deprecated(true)),
                ("deprecated", Some("false")) => return Ok(Matcher::Deprecated(false)),
                _ => log::warn!("unsupported structured filter {pattern}, matching it by name"),
            }
        }
        Ok(Matcher::Exact(pattern.to_string()))
    }

    /// Test against the un-namespaced `name` and the resource's metadata.
    pub fn matches(&self, name: &str, node: &ResourceNode) -> bool {
        match self {
            Matcher::Exact(exact) => exact == name,
            Matcher::Regex(regex) => regex.is_match(name),
            Matcher::Tag(tag) => node.tags.contains(tag),
            Matcher::Deprecated(deprecated) => node.deprecated == *deprecated,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct CompiledSet {
    include: Vec<Matcher>,
    exclude: Vec<Matcher>,
}

impl CompiledSet {
    fn compile(set: &FilterSet) -> Result<Self, ConfigError> {
        Ok(Self {
            include: set
                .include
                .iter()
                .map(|p| Matcher::compile(p))
                .collect::<Result<_, _>>()?,
            exclude: set
                .exclude
                .iter()
                .map(|p| Matcher::compile(p))
                .collect::<Result<_, _>>()?,
        })
    }

    fn included(&self, name: &str, node: &ResourceNode) -> bool {
        self.include.iter().any(|m| m.matches(name, node))
    }

    fn excluded(&self, name: &str, node: &ResourceNode) -> bool {
        self.exclude.iter().any(|m| m.matches(name, node))
    }

    /// Include (when any is given) minus exclude.
    fn selects(&self, name: &str, node: &ResourceNode) -> bool {
        (self.include.is_empty() || self.included(name, node)) && !self.excluded(name, node)
    }

    /// Same rules applied to an operation's tags.
    fn selects_tags(&self, node: &ResourceNode) -> bool {
        let included = self.include.is_empty()
            || node.tags.iter().any(|tag| self.included(tag, node));
        included && !node.tags.iter().any(|tag| self.excluded(tag, node))
    }
}

/// Namespaced keys of the resources that survive filtering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilteredSets {
    pub operations: IndexSet<String>,
    pub parameters: IndexSet<String>,
    pub request_bodies: IndexSet<String>,
    pub responses: IndexSet<String>,
    pub schemas: IndexSet<String>,
}

impl FilteredSets {
    fn components(&self) -> impl Iterator<Item = &String> {
        self.schemas
            .iter()
            .chain(&self.parameters)
            .chain(&self.request_bodies)
            .chain(&self.responses)
    }

    fn component_set_mut(&mut self, namespace: Namespace) -> Option<&mut IndexSet<String>> {
        match namespace {
            Namespace::Schema => Some(&mut self.schemas),
            Namespace::Parameter => Some(&mut self.parameters),
            Namespace::Body => Some(&mut self.request_bodies),
            Namespace::Response => Some(&mut self.responses),
            _ => None,
        }
    }

    fn contains_component(&self, key: &str) -> bool {
        match remove_namespace(key).0 {
            Namespace::Schema => self.schemas.contains(key),
            Namespace::Parameter => self.parameters.contains(key),
            Namespace::Body => self.request_bodies.contains(key),
            Namespace::Response => self.responses.contains(key),
            _ => false,
        }
    }

    fn remove_component(&mut self, key: &str) -> bool {
        self.component_set_mut(remove_namespace(key).0)
            .is_some_and(|set| set.shift_remove(key))
    }
}

fn is_component(key: &str) -> bool {
    matches!(
        remove_namespace(key).0,
        Namespace::Schema | Namespace::Parameter | Namespace::Body | Namespace::Response
    )
}

/// Select the resources to keep from `graph` according to `filters`.
pub fn create_filtered_dependencies(
    filters: &Filters,
    graph: &TopLevelGraph,
) -> Result<FilteredSets, ConfigError> {
    let started = Instant::now();
    let component_filters = [
        (Namespace::Schema, CompiledSet::compile(&filters.schemas)?),
        (Namespace::Parameter, CompiledSet::compile(&filters.parameters)?),
        (Namespace::Body, CompiledSet::compile(&filters.request_bodies)?),
        (Namespace::Response, CompiledSet::compile(&filters.responses)?),
    ];
    let operation_filter = CompiledSet::compile(&filters.operations)?;
    let tag_filter = CompiledSet::compile(&filters.tags)?;
    let keeps_deprecated = |node: &ResourceNode| filters.deprecated || !node.deprecated;

    let mut sets = FilteredSets::default();
    let mut explicit = IndexSet::new();
    for (namespace, filter) in &component_filters {
        let Some(collection) = graph.collection(*namespace) else {
            continue;
        };
        for (key, node) in collection {
            let (_, name) = remove_namespace(key);
            if filter.selects(name, node) && keeps_deprecated(node) {
                if !filter.include.is_empty() {
                    explicit.insert(key.clone());
                }
                if let Some(set) = sets.component_set_mut(*namespace) {
                    set.insert(key.clone());
                }
            }
        }
    }

    // Drop components referencing dropped components until nothing changes.
    loop {
        let dangling: Vec<String> = sets
            .components()
            .filter(|key| {
                graph.get(key).is_some_and(|node| {
                    node.dependencies.iter().any(|dependency| {
                        is_component(dependency)
                            && graph.get(dependency).is_some()
                            && !sets.contains_component(dependency)
                    })
                })
            })
            .cloned()
            .collect();
        if dangling.is_empty() {
            break;
        }
        for key in &dangling {
            sets.remove_component(key);
            explicit.shift_remove(key);
        }
    }

    for (key, node) in &graph.operations {
        let (_, name) = remove_namespace(key);
        let selected = operation_filter.selects(name, node)
            && tag_filter.selects_tags(node)
            && keeps_deprecated(node);
        let satisfied = node.dependencies.iter().all(|dependency| {
            !is_component(dependency)
                || graph.get(dependency).is_none()
                || sets.contains_component(dependency)
        });
        if selected && satisfied {
            sets.operations.insert(key.clone());
        }
    }

    if !filters.orphans {
        let mut reachable: IndexSet<String> = IndexSet::new();
        let mut queue: VecDeque<&str> = sets
            .operations
            .iter()
            .chain(graph.webhooks.keys())
            .chain(&explicit)
            .map(String::as_str)
            .collect();
        while let Some(key) = queue.pop_front() {
            if !reachable.insert(key.to_string()) {
                continue;
            }
            if let Some(node) = graph.get(key) {
                queue.extend(node.dependencies.iter().map(String::as_str));
            }
        }
        let orphans: Vec<String> = sets
            .components()
            .filter(|key| !reachable.contains(*key))
            .cloned()
            .collect();
        for key in &orphans {
            sets.remove_component(key);
        }
        if !orphans.is_empty() {
            log::info!("dropped {} orphaned component(s)", orphans.len());
        }
    }

    log::debug!(
        "selected {} operations and {} schemas in {:?}",
        sets.operations.len(),
        sets.schemas.len(),
        started.elapsed()
    );
    Ok(sets)
}

fn filter_collection(
    collection: &mut Map<String, Value>,
    namespace: Namespace,
    keep: &IndexSet<String>,
    preserve_order: bool,
) {
    if preserve_order {
        collection.retain(|name, _| keep.contains(&add_namespace(namespace, name)));
        return;
    }
    let mut filtered = Map::new();
    for key in keep {
        let (_, name) = remove_namespace(key);
        if let Some(source) = collection.shift_remove(name) {
            filtered.insert(name.to_string(), source);
        }
    }
    *collection = filtered;
}

/// Rewrite `spec` in place so it only holds the selected resources.
pub fn filter_spec(spec: &mut Value, sets: &FilteredSets, preserve_order: bool) {
    let started = Instant::now();
    let Value::Object(root) = spec else {
        return;
    };

    let collections = [
        ("schemas", Namespace::Schema, &sets.schemas),
        ("parameters", Namespace::Parameter, &sets.parameters),
        ("requestBodies", Namespace::Body, &sets.request_bodies),
        ("responses", Namespace::Response, &sets.responses),
    ];
    if let Some(Value::Object(components)) = root.get_mut("components") {
        for (name, namespace, keep) in collections {
            if let Some(Value::Object(collection)) = components.get_mut(name) {
                filter_collection(collection, namespace, keep, preserve_order);
            }
        }
    }
    for (name, namespace, keep) in [
        ("definitions", Namespace::Schema, &sets.schemas),
        ("parameters", Namespace::Parameter, &sets.parameters),
        ("responses", Namespace::Response, &sets.responses),
    ] {
        if let Some(Value::Object(collection)) = root.get_mut(name) {
            filter_collection(collection, namespace, keep, preserve_order);
        }
    }

    if let Some(Value::Object(paths)) = root.get_mut("paths") {
        paths.retain(|route, item| {
            let Value::Object(item) = item else {
                return true;
            };
            for method in HTTP_METHODS {
                let key = add_namespace(Namespace::Operation, &operation_key(method, route));
                if item.contains_key(method) && !sets.operations.contains(&key) {
                    item.shift_remove(method);
                }
            }
            !item.is_empty()
        });
    }
    log::debug!("filtered document in {:?}", started.elapsed());
}
