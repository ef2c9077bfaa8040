//! Resource Runtime
//!
//! The runtime owns the registry, the node store and the collector, and
//! implements the invalidation engine on top of them.
//!
//! # How It Works
//!
//! 1. `resolve(key)` enters the key into the active set (detecting cycles).
//!
//! 2. If no node exists, the bound provider runs inside a fresh [`Deps`]
//!    context and the node is created from its result and read log.
//!
//! 3. Otherwise, for kinds that track staleness, each recorded dependency is
//!    resolved in read order (depth-first) and its current version compared
//!    with the one recorded. The first mismatch makes the node stale and the
//!    kind-specific recomputation runs.
//!
//! 4. `set` only replaces a global's value and bumps its version. Nothing is
//!    recomputed until the next read.
//!
//! 5. Hash-checked nodes also remember what their `compute` read. Those keys
//!    are never compared, only re-stamped on each verification so the values
//!    the cached result was built from outlive it.
//!
//! # Fast Path
//!
//! A node verified at the current store revision within the current
//! collector generation is returned without walking its dependencies: no
//! `set` or collection happened since, and the walk already stamped every
//! dependency for this generation.

use std::any::{Any, TypeId};
use std::rc::Rc;

use indexmap::{IndexMap, IndexSet};
use tracing::{debug, trace, warn};

use super::context::{ActiveSet, Deps, ReadLog};
use super::provider::{Binding, Provider, Registry};
use crate::config::Capacities;
use crate::error::{ResourceError, Result};
use crate::graph::{
    Args, CollectStats, Collector, DisposeFn, NodeKind, NodeStore, ResourceKey, ResourceNode,
    Value, Version,
};

/// Registry, store and collector, plus the resolution logic tying them together.
pub(crate) struct Runtime {
    registry: Registry,
    store: NodeStore,
    collector: Collector,
    active: ActiveSet,
}

impl Runtime {
    pub(crate) fn new(registry: Registry, capacities: Capacities) -> Self {
        Self {
            registry,
            store: NodeStore::new(),
            collector: Collector::new(capacities),
            active: ActiveSet::default(),
        }
    }

    pub(crate) fn registry(&self) -> &Registry {
        &self.registry
    }

    pub(crate) fn store(&self) -> &NodeStore {
        &self.store
    }

    pub(crate) fn collector(&self) -> &Collector {
        &self.collector
    }

    /// Bring `key` up to date and return its value and version.
    pub(crate) fn resolve(&mut self, key: &ResourceKey) -> Result<(Value, Version)> {
        let binding = self.registry.binding(key)?.clone();
        self.active.enter(key)?;
        let resolved = self.resolve_entered(key, &binding);
        self.active.exit(key);
        resolved
    }

    fn resolve_entered(&mut self, key: &ResourceKey, binding: &Binding) -> Result<(Value, Version)> {
        if !self.store.contains(key) {
            return self.create(key, binding);
        }

        let generation = self.collector.generation();
        let revision = self.store.revision();

        let node = self.store.node_mut(key)?;
        node.touch(generation);
        if !node.kind().tracks_staleness() || node.is_verified(revision, generation) {
            trace!(key = %key, "resource fresh");
            return Ok(node.snapshot());
        }
        let recorded: Vec<(ResourceKey, Version)> = node
            .dependencies()
            .map(|(dependency, version)| (dependency.clone(), version))
            .collect();

        let resolved = if self.any_changed(&recorded)? {
            self.recompute(key, binding)?
        } else {
            let node = self.store.node_mut(key)?;
            node.mark_verified(revision, generation);
            node.snapshot()
        };
        self.touch_retained(key, generation);
        Ok(resolved)
    }

    /// Stamp everything reachable through a node's retained keys, following
    /// both retained keys and recorded dependencies.
    fn touch_retained(&mut self, key: &ResourceKey, generation: u64) {
        let mut pending: Vec<ResourceKey> = match self.store.get(key) {
            Some(node) if !node.retained().is_empty() => node.retained().to_vec(),
            _ => return,
        };
        let mut seen = IndexSet::new();
        while let Some(next) = pending.pop() {
            if !seen.insert(next.clone()) {
                continue;
            }
            if let Some(node) = self.store.get_mut(&next) {
                node.touch(generation);
                pending.extend(node.dependencies().map(|(dependency, _)| dependency.clone()));
                pending.extend(node.retained().iter().cloned());
            }
        }
    }

    /// Resolve recorded dependencies in order, stopping at the first one whose
    /// version moved.
    fn any_changed(&mut self, recorded: &[(ResourceKey, Version)]) -> Result<bool> {
        for (dependency, seen) in recorded {
            let (_, current) = self.resolve(dependency)?;
            if current != *seen {
                trace!(dependency = %dependency, "dependency changed");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Run a provider function with a fresh dependency context.
    fn run<R>(
        &mut self,
        key: &ResourceKey,
        f: impl FnOnce(&mut Deps<'_>) -> Result<R>,
    ) -> Result<(R, ReadLog)> {
        let mut deps = Deps::new(self, key);
        let output = f(&mut deps)?;
        Ok((output, deps.finish()))
    }

    fn create(&mut self, key: &ResourceKey, binding: &Binding) -> Result<(Value, Version)> {
        let args = key.args();
        let mut hash = None;
        let mut retained = Vec::new();

        let (value, reads) = match &binding.provider {
            Provider::Global { initial } => (Rc::clone(initial), ReadLog::default()),
            Provider::Static { compute } | Provider::Once { factory: compute } => {
                self.run(key, |deps| compute(deps, args))?
            }
            Provider::Dynamic { factory, update } => self.run(key, |deps| {
                let value = factory(deps, args)?;
                update(deps, &value, args)?;
                Ok(value)
            })?,
            Provider::HashChecked {
                compute,
                hash: hash_fn,
                ..
            } => {
                let (fresh, reads) = self.run(key, |deps| hash_fn(deps, args))?;
                let (value, compute_reads) = self.run(key, |deps| compute(deps, args))?;
                hash = Some(fresh);
                retained = compute_reads.into_versions().into_keys().collect();
                (value, reads)
            }
        };

        let generation = self.collector.generation();
        let revision = self.store.revision();
        let version = self.store.next_version();

        let mut node = ResourceNode::new(
            binding.provider.kind(),
            value,
            version,
            reads.into_versions(),
            binding.disposer.clone(),
        );
        if let Some(hash) = hash {
            node.set_hash(hash);
        }
        node.set_retained(retained);
        node.touch(generation);
        node.mark_verified(revision, generation);

        debug!(
            key = %key,
            kind = ?node.kind(),
            version = version.raw(),
            dependencies = node.dependency_count(),
            "resource created"
        );

        let resolved = node.snapshot();
        self.store.insert(key.clone(), node);
        Ok(resolved)
    }

    fn recompute(&mut self, key: &ResourceKey, binding: &Binding) -> Result<(Value, Version)> {
        let args = key.args();
        let generation = self.collector.generation();
        let revision = self.store.revision();

        match &binding.provider {
            Provider::Static { compute } => {
                let (value, reads) = self.run(key, |deps| compute(deps, args))?;
                let version = self.store.next_version();
                let node = self.store.node_mut(key)?;
                let previous = node.replace(value, version, reads.into_versions());
                let disposer = node.disposer().cloned();
                debug!(key = %key, version = version.raw(), "resource recomputed");
                dispose_value(key, disposer.as_ref(), previous);
            }
            Provider::Dynamic { update, .. } => {
                let value = Rc::clone(self.store.node_mut(key)?.value());
                let ((), reads) = self.run(key, |deps| update(deps, &value, args))?;
                let version = self.store.next_version();
                self.store
                    .node_mut(key)?
                    .refresh(version, reads.into_versions());
                debug!(key = %key, version = version.raw(), "resource updated in place");
            }
            Provider::HashChecked {
                compute,
                hash,
                equal,
            } => {
                let (fresh, reads) = self.run(key, |deps| hash(deps, args))?;
                let node = self.store.node_mut(key)?;
                let unchanged = node
                    .hash()
                    .is_some_and(|previous| equal(&*fresh, previous));

                if unchanged {
                    node.set_dependencies(reads.into_versions());
                    debug!(key = %key, "hash unchanged, keeping resource");
                } else {
                    let (value, compute_reads) = self.run(key, |deps| compute(deps, args))?;
                    let version = self.store.next_version();
                    let node = self.store.node_mut(key)?;
                    let previous = node.replace(value, version, reads.into_versions());
                    node.set_hash(fresh);
                    node.set_retained(compute_reads.into_versions().into_keys().collect());
                    let disposer = node.disposer().cloned();
                    debug!(key = %key, version = version.raw(), "hash changed, resource recomputed");
                    dispose_value(key, disposer.as_ref(), previous);
                }
            }
            // Never stale.
            Provider::Global { .. } | Provider::Once { .. } => {}
        }

        let node = self.store.node_mut(key)?;
        node.mark_verified(revision, generation);
        Ok(node.snapshot())
    }

    /// Cached value of a resource, without computing or recording anything.
    pub(crate) fn peek<T: Any>(&self, path: &str, args: Args) -> Option<Rc<T>> {
        let key = self.registry.key(path, args).ok()?;
        let node = self.store.get(&key)?;
        Rc::clone(node.value()).downcast::<T>().ok()
    }

    /// Replace the value of a global resource.
    pub(crate) fn set(&mut self, path: &str, value_type: TypeId, value: Value) -> Result<Version> {
        let key = self.registry.key(path, Args::new())?;
        let binding = self.registry.binding(&key)?;
        let Provider::Global { initial } = &binding.provider else {
            return Err(ResourceError::NotGlobal {
                path: path.to_owned(),
            });
        };
        if binding.value_type != value_type {
            return Err(ResourceError::TypeMismatch {
                key,
                expected: binding.type_name,
            });
        }
        let initial = Rc::clone(initial);
        let disposer = binding.disposer.clone();

        let version = self.store.next_version();
        self.store.bump_revision();

        match self.store.get_mut(&key) {
            Some(node) => {
                let previous = node.replace(value, version, IndexMap::new());
                dispose_value(&key, disposer.as_ref(), previous);
            }
            None => {
                // Never read, so the registered value was never installed.
                dispose_value(&key, disposer.as_ref(), initial);
                let mut node =
                    ResourceNode::new(NodeKind::Global, value, version, IndexMap::new(), disposer);
                node.touch(self.collector.generation());
                self.store.insert(key.clone(), node);
            }
        }

        debug!(key = %key, version = version.raw(), "global resource set");
        Ok(version)
    }

    /// Advance the generation and dispose every expired node.
    pub(crate) fn collect(&mut self) -> CollectStats {
        let generation = self.collector.advance();

        let expired: Vec<ResourceKey> = self
            .store
            .iter()
            .filter(|(key, node)| {
                node.kind() != NodeKind::Global
                    && self.collector.is_expired(key.path(), node.last_accessed())
            })
            .map(|(key, _)| key.clone())
            .collect();

        let mut stats = CollectStats {
            generation,
            ..CollectStats::default()
        };
        for key in &expired {
            let Some(node) = self.store.remove(key) else {
                continue;
            };
            let (value, disposer) = node.into_disposal();
            if !dispose_value(key, disposer.as_ref(), value) {
                stats.failed += 1;
            }
            stats.disposed += 1;
        }

        if stats.disposed > 0 {
            self.store.bump_revision();
        }
        stats.retained = self.store.len();

        debug!(
            generation,
            disposed = stats.disposed,
            failed = stats.failed,
            retained = stats.retained,
            "collected resources"
        );
        stats
    }
}

/// Downcast a resolved value, reporting the key on mismatch.
pub(crate) fn downcast<T: Any>(key: &ResourceKey, value: Value) -> Result<Rc<T>> {
    value
        .downcast::<T>()
        .map_err(|_| ResourceError::TypeMismatch {
            key: key.clone(),
            expected: std::any::type_name::<T>(),
        })
}

/// Run a disposer, if any. Failures are logged, never propagated.
///
/// Returns `false` if the disposer reported an error.
fn dispose_value(key: &ResourceKey, disposer: Option<&DisposeFn>, value: Value) -> bool {
    let Some(disposer) = disposer else {
        return true;
    };
    match disposer(value.as_ref()) {
        Ok(()) => {
            trace!(key = %key, "resource disposed");
            true
        }
        Err(error) => {
            warn!(key = %key, error = %error, "resource disposer failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::provider::computed;
    use std::cell::Cell;
    use std::sync::Arc;

    fn runtime(bindings: Vec<(&str, Binding)>) -> Runtime {
        let bindings = bindings
            .into_iter()
            .map(|(path, binding)| (Arc::from(path), binding))
            .collect();
        Runtime::new(Registry::new(bindings), Capacities::default())
    }

    fn global(value: i32) -> Binding {
        Binding::new::<i32>(Provider::Global {
            initial: Rc::new(value),
        })
    }

    #[test]
    fn resolves_and_caches_static_chain() {
        let calls = Rc::new(Cell::new(0));
        let counter = Rc::clone(&calls);
        let mut runtime = runtime(vec![
            ("/base", global(4)),
            (
                "/double",
                Binding::new::<i32>(Provider::Static {
                    compute: computed(move |deps, _args| {
                        counter.set(counter.get() + 1);
                        Ok(*deps.get::<i32>("/base", ())? * 2)
                    }),
                }),
            ),
        ]);
        let key = runtime.registry().key("/double", Args::new()).unwrap();

        let (first, v1) = runtime.resolve(&key).unwrap();
        let (second, v2) = runtime.resolve(&key).unwrap();
        assert_eq!(first.downcast_ref::<i32>(), Some(&8));
        assert!(Rc::ptr_eq(&first, &second));
        assert_eq!(v1, v2);
        assert_eq!(calls.get(), 1);

        runtime
            .set("/base", TypeId::of::<i32>(), Rc::new(5))
            .unwrap();
        let (third, v3) = runtime.resolve(&key).unwrap();
        assert_eq!(third.downcast_ref::<i32>(), Some(&10));
        assert!(v3 > v2);
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn set_rejects_wrong_type() {
        let mut runtime = runtime(vec![("/base", global(1))]);
        let err = runtime
            .set("/base", TypeId::of::<u8>(), Rc::new(1u8))
            .unwrap_err();
        assert!(matches!(err, ResourceError::TypeMismatch { .. }));
    }

    #[test]
    fn active_set_is_unwound_after_errors() {
        let mut runtime = runtime(vec![(
            "/broken",
            Binding::new::<i32>(Provider::Static {
                compute: computed(|deps, _args| deps.get::<i32>("/missing", ()).map(|v| *v)),
            }),
        )]);
        let key = runtime.registry().key("/broken", Args::new()).unwrap();

        assert!(matches!(
            runtime.resolve(&key),
            Err(ResourceError::Unbound { .. })
        ));
        assert_eq!(runtime.active.depth(), 0);
        assert!(runtime.store().is_empty());
    }

    #[test]
    fn collect_skips_globals() {
        let mut runtime = runtime(vec![("/base", global(1))]);
        let key = runtime.registry().key("/base", Args::new()).unwrap();
        runtime.resolve(&key).unwrap();

        for _ in 0..4 {
            runtime.collect();
        }
        assert!(runtime.store().contains(&key));
        assert_eq!(runtime.collector().generation(), 4);
    }
}
