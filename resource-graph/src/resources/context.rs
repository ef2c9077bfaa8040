//! Dependency Context
//!
//! Every provider invocation receives a [`Deps`] context. Reads made through
//! it are resolved by the runtime (recomputing stale producers first) and
//! recorded in a per-call [`ReadLog`]. When the provider returns, the log
//! becomes the node's new dependency set.
//!
//! # Implementation
//!
//! Nothing here is global or thread-local. Each `Deps` borrows the runtime
//! mutably for the duration of one provider call, so nested computations
//! (a provider reading a resource that must itself be computed) simply
//! create a nested `Deps` with its own log.
//!
//! Cycle detection uses the runtime's [`ActiveSet`]: the keys currently being
//! resolved, outermost first.

use std::any::Any;
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};

use super::runtime::{downcast, Runtime};
use crate::error::{ResourceError, Result};
use crate::graph::{IntoArgs, ResourceKey, Version};

/// Context handed to providers. Reads through it become dependency edges.
pub struct Deps<'a> {
    runtime: &'a mut Runtime,

    /// The resource being computed.
    consumer: &'a ResourceKey,

    reads: ReadLog,
}

impl<'a> Deps<'a> {
    pub(crate) fn new(runtime: &'a mut Runtime, consumer: &'a ResourceKey) -> Self {
        Self {
            runtime,
            consumer,
            reads: ReadLog::default(),
        }
    }

    /// The key of the resource being computed.
    pub fn consumer(&self) -> &ResourceKey {
        self.consumer
    }

    /// Read a resource and record it as a dependency.
    ///
    /// The producer is brought up to date first, computing or recomputing it
    /// as needed.
    pub fn get<T: Any>(&mut self, path: &str, args: impl IntoArgs) -> Result<Rc<T>> {
        let key = self.runtime.registry().key(path, args.into_args())?;
        self.get_key(&key)
    }

    /// Like [`get`](Self::get), for an already built key.
    pub fn get_key<T: Any>(&mut self, key: &ResourceKey) -> Result<Rc<T>> {
        let (value, version) = self.runtime.resolve(key)?;
        self.reads.record(key, version);
        downcast(key, value)
    }

    /// Read the cached value of a resource without computing it and without
    /// recording a dependency.
    pub fn peek<T: Any>(&self, path: &str, args: impl IntoArgs) -> Option<Rc<T>> {
        self.runtime.peek(path, args.into_args())
    }

    /// Number of distinct resources read so far.
    pub fn read_count(&self) -> usize {
        self.reads.len()
    }

    pub(crate) fn finish(self) -> ReadLog {
        self.reads
    }
}

/// Resources read by one provider call, in read order, with the version
/// observed on first read.
#[derive(Debug, Default)]
pub(crate) struct ReadLog {
    reads: IndexMap<ResourceKey, Version>,
}

impl ReadLog {
    pub(crate) fn record(&mut self, key: &ResourceKey, version: Version) {
        if !self.reads.contains_key(key) {
            self.reads.insert(key.clone(), version);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.reads.len()
    }

    pub(crate) fn into_versions(self) -> IndexMap<ResourceKey, Version> {
        self.reads
    }
}

/// Keys currently being resolved, outermost first.
#[derive(Debug, Default)]
pub(crate) struct ActiveSet {
    keys: IndexSet<ResourceKey>,
}

impl ActiveSet {
    /// Mark `key` as being resolved, failing if it already is.
    pub(crate) fn enter(&mut self, key: &ResourceKey) -> Result<()> {
        if self.keys.contains(key) {
            let chain = self
                .keys
                .iter()
                .skip_while(|active| *active != key)
                .cloned()
                .chain(std::iter::once(key.clone()))
                .collect();
            return Err(ResourceError::Cycle {
                key: key.clone(),
                chain,
            });
        }
        self.keys.insert(key.clone());
        Ok(())
    }

    pub(crate) fn exit(&mut self, key: &ResourceKey) {
        let popped = self.keys.pop();

        // Resolution is strictly nested.
        debug_assert_eq!(
            popped.as_ref(),
            Some(key),
            "ActiveSet mismatch: expected {key}, got {popped:?}"
        );
    }

    #[cfg(test)]
    pub(crate) fn depth(&self) -> usize {
        self.keys.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::NodeStore;

    #[test]
    fn read_log_keeps_first_observation() {
        let mut store = NodeStore::new();
        let first = store.next_version();
        let second = store.next_version();
        let key = ResourceKey::new("/d", ());

        let mut log = ReadLog::default();
        log.record(&key, first);
        log.record(&key, second);
        log.record(&ResourceKey::new("/e", 1), second);

        assert_eq!(log.len(), 2);
        let versions = log.into_versions();
        assert_eq!(versions.get(&key), Some(&first));
        assert_eq!(
            versions.keys().map(ToString::to_string).collect::<Vec<_>>(),
            ["/d", "/e(1)"]
        );
    }

    #[test]
    fn active_set_tracks_nesting() {
        let a = ResourceKey::new("/a", ());
        let b = ResourceKey::new("/b", ());
        let mut active = ActiveSet::default();

        active.enter(&a).unwrap();
        active.enter(&b).unwrap();
        assert_eq!(active.depth(), 2);

        active.exit(&b);
        active.exit(&a);
        assert_eq!(active.depth(), 0);
    }

    #[test]
    fn reentering_reports_cycle_from_first_occurrence() {
        let root = ResourceKey::new("/root", ());
        let a = ResourceKey::new("/a", ());
        let b = ResourceKey::new("/b", ());
        let mut active = ActiveSet::default();

        active.enter(&root).unwrap();
        active.enter(&a).unwrap();
        active.enter(&b).unwrap();

        match active.enter(&a) {
            Err(ResourceError::Cycle { key, chain }) => {
                assert_eq!(key, a);
                assert_eq!(chain, vec![a.clone(), b.clone(), a.clone()]);
            }
            other => panic!("expected cycle, got {other:?}"),
        }
        assert_eq!(active.depth(), 3);
    }
}
