//! Resource Nodes
//!
//! This module defines the node type held by the [`NodeStore`](super::NodeStore).

use std::any::Any;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use super::key::ResourceKey;
use crate::error::DisposeError;

/// A type-erased resource value.
pub type Value = Rc<dyn Any>;

/// Type-erased disposer, called once with the value it releases.
pub(crate) type DisposeFn = Rc<dyn Fn(&dyn Any) -> Result<(), DisposeError>>;

/// Monotonic stamp identifying one installed value.
///
/// Versions come from a single store-wide clock, so a node that is collected
/// and created again never reuses a version its old dependents recorded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version(u64);

impl Version {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Get the raw version value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

/// The recomputation policy of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    /// Memoized pure function of its dependencies.
    Static,

    /// Host-supplied value. Never computed, only `set`.
    Global,

    /// Long-lived value updated in place whenever a dependency changes.
    Dynamic,

    /// Computed once per node lifetime. Dependency changes are ignored.
    Once,

    /// Recomputed only when a cheap proxy hash changes.
    HashChecked,
}

impl NodeKind {
    /// Whether reads of this node check its dependencies for changes.
    pub fn tracks_staleness(self) -> bool {
        matches!(self, NodeKind::Static | NodeKind::Dynamic | NodeKind::HashChecked)
    }
}

/// A node in the resource graph.
pub struct ResourceNode {
    kind: NodeKind,

    value: Value,

    version: Version,

    /// Resources read during the last computation, with the version observed.
    /// Rebuilt on every recomputation, in read order.
    dependencies: IndexMap<ResourceKey, Version>,

    /// Collector generation of the last read.
    last_accessed: u64,

    /// `(revision, generation)` at which the dependencies were last verified.
    verified: Option<(u64, u64)>,

    /// Last hash, for hash-checked nodes.
    hash: Option<Box<dyn Any>>,

    /// Resources read by a hash-checked `compute`. Kept alive alongside the
    /// node but never compared.
    retained: Vec<ResourceKey>,

    disposer: Option<DisposeFn>,
}

impl ResourceNode {
    pub(crate) fn new(
        kind: NodeKind,
        value: Value,
        version: Version,
        dependencies: IndexMap<ResourceKey, Version>,
        disposer: Option<DisposeFn>,
    ) -> Self {
        Self {
            kind,
            value,
            version,
            dependencies,
            last_accessed: 0,
            verified: None,
            hash: None,
            retained: Vec::new(),
            disposer,
        }
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn last_accessed(&self) -> u64 {
        self.last_accessed
    }

    pub fn dependencies(&self) -> impl Iterator<Item = (&ResourceKey, Version)> {
        self.dependencies.iter().map(|(key, version)| (key, *version))
    }

    pub fn dependency_count(&self) -> usize {
        self.dependencies.len()
    }

    /// Value and version, as handed back to readers.
    pub(crate) fn snapshot(&self) -> (Value, Version) {
        (Rc::clone(&self.value), self.version)
    }

    /// Record a read in the given generation.
    pub(crate) fn touch(&mut self, generation: u64) {
        self.last_accessed = self.last_accessed.max(generation);
    }

    pub(crate) fn is_verified(&self, revision: u64, generation: u64) -> bool {
        self.verified == Some((revision, generation))
    }

    pub(crate) fn mark_verified(&mut self, revision: u64, generation: u64) {
        self.verified = Some((revision, generation));
    }

    /// Install a new value, returning the one it replaces.
    pub(crate) fn replace(
        &mut self,
        value: Value,
        version: Version,
        dependencies: IndexMap<ResourceKey, Version>,
    ) -> Value {
        self.version = version;
        self.dependencies = dependencies;
        std::mem::replace(&mut self.value, value)
    }

    /// Keep the value but record a new version and dependency set.
    pub(crate) fn refresh(
        &mut self,
        version: Version,
        dependencies: IndexMap<ResourceKey, Version>,
    ) {
        self.version = version;
        self.dependencies = dependencies;
    }

    /// Replace the dependency set without touching value or version.
    pub(crate) fn set_dependencies(&mut self, dependencies: IndexMap<ResourceKey, Version>) {
        self.dependencies = dependencies;
    }

    pub(crate) fn hash(&self) -> Option<&dyn Any> {
        self.hash.as_deref()
    }

    pub(crate) fn set_hash(&mut self, hash: Box<dyn Any>) {
        self.hash = Some(hash);
    }

    pub(crate) fn retained(&self) -> &[ResourceKey] {
        &self.retained
    }

    pub(crate) fn set_retained(&mut self, retained: Vec<ResourceKey>) {
        self.retained = retained;
    }

    pub(crate) fn disposer(&self) -> Option<&DisposeFn> {
        self.disposer.as_ref()
    }

    /// Split the node into what disposal needs.
    pub(crate) fn into_disposal(self) -> (Value, Option<DisposeFn>) {
        (self.value, self.disposer)
    }
}

impl fmt::Debug for ResourceNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceNode")
            .field("kind", &self.kind)
            .field("version", &self.version)
            .field("dependencies", &self.dependencies.len())
            .field("last_accessed", &self.last_accessed)
            .field("disposable", &self.disposer.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(kind: NodeKind, value: i32) -> ResourceNode {
        ResourceNode::new(kind, Rc::new(value), Version::new(1), IndexMap::new(), None)
    }

    #[test]
    fn only_derived_kinds_track_staleness() {
        assert!(NodeKind::Static.tracks_staleness());
        assert!(NodeKind::Dynamic.tracks_staleness());
        assert!(NodeKind::HashChecked.tracks_staleness());
        assert!(!NodeKind::Global.tracks_staleness());
        assert!(!NodeKind::Once.tracks_staleness());
    }

    #[test]
    fn touch_never_moves_backwards() {
        let mut node = node(NodeKind::Static, 1);
        node.touch(4);
        node.touch(2);
        assert_eq!(node.last_accessed(), 4);
    }

    #[test]
    fn replace_returns_previous_value() {
        let mut node = node(NodeKind::Static, 1);
        let mut deps = IndexMap::new();
        deps.insert(ResourceKey::new("/d", ()), Version::new(7));

        let previous = node.replace(Rc::new(2), Version::new(8), deps);

        assert_eq!(previous.downcast_ref::<i32>(), Some(&1));
        assert_eq!(node.value().downcast_ref::<i32>(), Some(&2));
        assert_eq!(node.version(), Version::new(8));
        assert_eq!(node.dependency_count(), 1);
    }

    #[test]
    fn verification_is_per_revision_and_generation() {
        let mut node = node(NodeKind::Static, 1);
        assert!(!node.is_verified(0, 0));

        node.mark_verified(3, 1);
        assert!(node.is_verified(3, 1));
        assert!(!node.is_verified(4, 1));
        assert!(!node.is_verified(3, 2));
    }
}
