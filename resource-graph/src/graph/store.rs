//! Node Store
//!
//! The store exclusively owns every node and its value. Besides the node map
//! it keeps two counters:
//!
//! - the version clock, handing out a fresh [`Version`] for every installed
//!   value;
//! - the revision, bumped whenever something happens that can make a verified
//!   node stale (a `set`, or a collection that removed nodes).
//!
//! Edges are stored on the consumer only (consumer -> producer). The graph is
//! pull-based, so nothing ever walks from a producer to its consumers.

use indexmap::IndexMap;

use super::key::ResourceKey;
use super::node::{ResourceNode, Version};
use crate::error::{ResourceError, Result};

/// Key -> node map plus the version and revision counters.
#[derive(Debug, Default)]
pub struct NodeStore {
    /// Insertion ordered so that sweeps visit nodes deterministically.
    nodes: IndexMap<ResourceKey, ResourceNode>,

    clock: u64,

    revision: u64,
}

impl NodeStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out the next version stamp.
    pub fn next_version(&mut self) -> Version {
        self.clock += 1;
        Version::new(self.clock)
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn bump_revision(&mut self) {
        self.revision += 1;
    }

    /// Add a node, replacing any node stored under the same key.
    pub fn insert(&mut self, key: ResourceKey, node: ResourceNode) {
        self.nodes.insert(key, node);
    }

    /// Remove a node together with its outgoing edges.
    pub fn remove(&mut self, key: &ResourceKey) -> Option<ResourceNode> {
        self.nodes.shift_remove(key)
    }

    pub fn get(&self, key: &ResourceKey) -> Option<&ResourceNode> {
        self.nodes.get(key)
    }

    pub fn get_mut(&mut self, key: &ResourceKey) -> Option<&mut ResourceNode> {
        self.nodes.get_mut(key)
    }

    /// Like [`get_mut`](Self::get_mut), for nodes that must exist.
    pub(crate) fn node_mut(&mut self, key: &ResourceKey) -> Result<&mut ResourceNode> {
        self.nodes
            .get_mut(key)
            .ok_or_else(|| ResourceError::Missing { key: key.clone() })
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.nodes.contains_key(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ResourceKey, &ResourceNode)> {
        self.nodes.iter()
    }

    /// Get the total number of nodes in the store.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
