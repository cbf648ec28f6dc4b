use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use super::walk::WalkGraph;
use crate::pointer::{Namespace, TopLevelKind, remove_namespace};

/// A named top-level resource and the namespaced keys it references.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResourceNode {
    pub dependencies: IndexSet<String>,
    pub deprecated: bool,
    #[serde(skip_serializing_if = "IndexSet::is_empty")]
    pub tags: IndexSet<String>,
}

/// Dependency graph restricted to named top-level resources.
///
/// Keys are namespaced (`schema:Pet`, `body:NewPet`, `operation:GET /pets`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopLevelGraph {
    pub schemas: IndexMap<String, ResourceNode>,
    pub parameters: IndexMap<String, ResourceNode>,
    pub request_bodies: IndexMap<String, ResourceNode>,
    pub responses: IndexMap<String, ResourceNode>,
    pub operations: IndexMap<String, ResourceNode>,
    pub webhooks: IndexMap<String, ResourceNode>,
}

impl TopLevelGraph {
    pub fn collection(&self, namespace: Namespace) -> Option<&IndexMap<String, ResourceNode>> {
        match namespace {
            Namespace::Schema => Some(&self.schemas),
            Namespace::Parameter => Some(&self.parameters),
            Namespace::Body => Some(&self.request_bodies),
            Namespace::Response => Some(&self.responses),
            Namespace::Operation => Some(&self.operations),
            Namespace::Webhook => Some(&self.webhooks),
            Namespace::Unknown => None,
        }
    }

    pub fn collection_mut(
        &mut self,
        namespace: Namespace,
    ) -> Option<&mut IndexMap<String, ResourceNode>> {
        match namespace {
            Namespace::Schema => Some(&mut self.schemas),
            Namespace::Parameter => Some(&mut self.parameters),
            Namespace::Body => Some(&mut self.request_bodies),
            Namespace::Response => Some(&mut self.responses),
            Namespace::Operation => Some(&mut self.operations),
            Namespace::Webhook => Some(&mut self.webhooks),
            Namespace::Unknown => None,
        }
    }

    /// Insert under the collection named by the key's namespace.
    pub fn insert(&mut self, key: String, node: ResourceNode) {
        let (namespace, _) = remove_namespace(&key);
        match self.collection_mut(namespace) {
            Some(collection) => {
                collection.insert(key, node);
            }
            None => log::warn!("ignoring resource with unknown namespace: {key}"),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ResourceNode> {
        let (namespace, _) = remove_namespace(key);
        self.collection(namespace)?.get(key)
    }

    pub fn remove(&mut self, key: &str) -> Option<ResourceNode> {
        let (namespace, _) = remove_namespace(key);
        self.collection_mut(namespace)?.shift_remove(key)
    }

    /// Every key, collection by collection, each in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.schemas
            .keys()
            .chain(self.parameters.keys())
            .chain(self.request_bodies.keys())
            .chain(self.responses.keys())
            .chain(self.operations.keys())
            .chain(self.webhooks.keys())
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
            + self.parameters.len()
            + self.request_bodies.len()
            + self.responses.len()
            + self.operations.len()
            + self.webhooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WalkGraph for TopLevelGraph {
    type Node = ResourceNode;

    fn pointers(&self) -> Vec<&str> {
        self.keys().collect()
    }

    fn node(&self, pointer: &str) -> Option<&ResourceNode> {
        self.get(pointer)
    }

    fn node_dependencies(&self, pointer: &str) -> Option<&IndexSet<String>> {
        self.get(pointer).map(|node| &node.dependencies)
    }

    fn match_group(&self, pointer: &str) -> Option<TopLevelKind> {
        match remove_namespace(pointer).0 {
            Namespace::Schema => Some(TopLevelKind::Schema),
            Namespace::Parameter => Some(TopLevelKind::Parameter),
            Namespace::Body => Some(TopLevelKind::RequestBody),
            Namespace::Operation => Some(TopLevelKind::Operation),
            Namespace::Webhook => Some(TopLevelKind::Webhook),
            Namespace::Response | Namespace::Unknown => None,
        }
    }
}
