//! The `Resources` facade: the host-facing `get`/`set`/`peek`/`collect`
//! surface over the runtime.

use std::any::{Any, TypeId};
use std::fmt;
use std::rc::Rc;

use super::builder::ResourcesBuilder;
use super::runtime::{downcast, Runtime};
use crate::config::Capacities;
use crate::error::{ResourceError, Result};
use crate::graph::{CollectStats, IntoArgs, NodeKind, ResourceKey, ResourceNode, Version};

/// A built resource graph.
///
/// Single-threaded: values are `Rc`-shared and every operation takes
/// `&mut self` or `&self`, so calls never interleave.
pub struct Resources {
    runtime: Runtime,
}

impl Resources {
    pub(crate) fn new(runtime: Runtime) -> Self {
        Self { runtime }
    }

    pub fn builder() -> ResourcesBuilder {
        ResourcesBuilder::new()
    }

    /// Resolve a resource, recomputing it first if it is stale.
    pub fn get<T: Any>(&mut self, path: &str, args: impl IntoArgs) -> Result<Rc<T>> {
        let key = self.runtime.registry().key(path, args.into_args())?;
        self.get_key(&key)
    }

    /// Like [`get`](Self::get), for an already built key.
    pub fn get_key<T: Any>(&mut self, key: &ResourceKey) -> Result<Rc<T>> {
        let (value, _) = self.runtime.resolve(key)?;
        downcast(key, value)
    }

    /// Replace the value of a global resource.
    ///
    /// The version is bumped even if the new value equals the old one.
    pub fn set<T: Any>(&mut self, path: &str, value: T) -> Result<()> {
        self.runtime
            .set(path, TypeId::of::<T>(), Rc::new(value))
            .map(|_| ())
    }

    /// Clone the current value of a global, modify it and `set` the result.
    pub fn update<T, F>(&mut self, path: &str, modify: F) -> Result<()>
    where
        T: Any + Clone,
        F: FnOnce(&mut T),
    {
        if self.runtime.registry().kind(path)? != NodeKind::Global {
            return Err(ResourceError::NotGlobal {
                path: path.to_owned(),
            });
        }
        let current = self.get::<T>(path, ())?;
        let mut value = T::clone(&current);
        modify(&mut value);
        self.set(path, value)
    }

    /// Cached value of a resource, if present. Never computes and does not
    /// count as a read for the collector.
    pub fn peek<T: Any>(&self, path: &str, args: impl IntoArgs) -> Option<Rc<T>> {
        self.runtime.peek(path, args.into_args())
    }

    /// Advance the collector generation and dispose expired resources.
    pub fn collect(&mut self) -> CollectStats {
        self.runtime.collect()
    }

    /// Current version of a resource, if it has a node.
    pub fn version(&self, path: &str, args: impl IntoArgs) -> Option<Version> {
        self.node(path, args).map(ResourceNode::version)
    }

    /// Resources read by the last computation of a resource.
    pub fn dependencies(&self, path: &str, args: impl IntoArgs) -> Option<Vec<ResourceKey>> {
        self.node(path, args)
            .map(|node| node.dependencies().map(|(key, _)| key.clone()).collect())
    }

    /// Whether a node currently exists for the resource.
    pub fn contains(&self, path: &str, args: impl IntoArgs) -> bool {
        self.node(path, args).is_some()
    }

    /// Number of live nodes.
    pub fn len(&self) -> usize {
        self.runtime.store().len()
    }

    pub fn is_empty(&self) -> bool {
        self.runtime.store().is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.runtime.collector().generation()
    }

    pub fn capacities(&self) -> &Capacities {
        self.runtime.collector().capacities()
    }

    fn node(&self, path: &str, args: impl IntoArgs) -> Option<&ResourceNode> {
        let key = self.runtime.registry().key(path, args.into_args()).ok()?;
        self.runtime.store().get(&key)
    }
}

impl fmt::Debug for Resources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resources")
            .field("registered", &self.runtime.registry().len())
            .field("nodes", &self.len())
            .field("generation", &self.generation())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resources() -> Resources {
        Resources::builder()
            .add_global("/count", 1u32)
            .add("/label", |deps, _args| {
                Ok(format!("count={}", deps.get::<u32>("/count", ())?))
            })
            .build()
            .unwrap()
    }

    #[test]
    fn update_modifies_global() {
        let mut resources = resources();
        resources.update::<u32, _>("/count", |count| *count += 4).unwrap();
        assert_eq!(*resources.get::<u32>("/count", ()).unwrap(), 5);
        assert_eq!(&*resources.get::<String>("/label", ()).unwrap(), "count=5");
    }

    #[test]
    fn update_rejects_derived_resources() {
        let mut resources = resources();
        let err = resources
            .update::<String, _>("/label", |label| label.clear())
            .unwrap_err();
        assert!(matches!(err, ResourceError::NotGlobal { .. }));
        assert!(!resources.contains("/label", ()));
    }

    #[test]
    fn diagnostics_reflect_nodes() {
        let mut resources = resources();
        assert!(resources.is_empty());
        assert!(resources.version("/label", ()).is_none());

        resources.get::<String>("/label", ()).unwrap();
        assert_eq!(resources.len(), 2);
        assert_eq!(
            resources.dependencies("/label", ()).unwrap(),
            vec![ResourceKey::new("/count", ())]
        );
        assert!(resources.version("/label", ()).is_some());
        assert_eq!(resources.capacities(), &Capacities::default());
        assert!(format!("{resources:?}").contains("nodes: 2"));
    }
}
