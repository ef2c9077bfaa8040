//! Resources Builder
//!
//! All providers are registered up front; [`ResourcesBuilder::build`] freezes
//! the registry and hands back the [`Resources`] facade.
//!
//! Registration problems do not panic. They are collected as they happen and
//! the first one is returned by `build`.

use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::debug;

use super::context::Deps;
use super::facade::Resources;
use super::provider::{self, Binding, Provider, Registry};
use super::runtime::Runtime;
use crate::config::Capacities;
use crate::error::{DisposeError, ResourceError, Result};
use crate::graph::{Args, DisposeFn};

/// Registers providers, then builds [`Resources`].
///
/// # Example
///
/// ```rust
/// use resource_graph::ResourcesBuilder;
///
/// let mut resources = ResourcesBuilder::new()
///     .add_global("/scale", 3i64)
///     .add("/scaled", |deps, args| Ok(*deps.get::<i64>("/scale", ())? * args.int(0)?))
///     .build()
///     .unwrap();
///
/// assert_eq!(*resources.get::<i64>("/scaled", 7).unwrap(), 21);
/// resources.set("/scale", 4i64).unwrap();
/// assert_eq!(*resources.get::<i64>("/scaled", 7).unwrap(), 28);
/// ```
#[derive(Default)]
pub struct ResourcesBuilder {
    bindings: IndexMap<Arc<str>, Binding>,

    /// Disposers are attached at build time so they may be declared before
    /// the path they refer to.
    disposers: Vec<PendingDisposer>,

    errors: Vec<ResourceError>,

    capacities: Capacities,
}

impl ResourcesBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the collector capacities.
    pub fn capacities(mut self, capacities: Capacities) -> Self {
        self.capacities = capacities;
        self
    }

    /// Register a static resource: a memoized function of its dependencies.
    pub fn add<T, F>(self, path: &str, compute: F) -> Self
    where
        T: Any,
        F: Fn(&mut Deps<'_>, &Args) -> Result<T> + 'static,
    {
        self.bind::<T>(
            path,
            Provider::Static {
                compute: provider::computed(compute),
            },
        )
    }

    /// Register a global resource with its initial value.
    pub fn add_global<T: Any>(self, path: &str, initial: T) -> Self {
        self.bind::<T>(
            path,
            Provider::Global {
                initial: Rc::new(initial),
            },
        )
    }

    /// Register a dynamic resource.
    ///
    /// `factory` allocates the value once per key; `update` runs on the first
    /// read and on every read where a dependency changed, mutating the value
    /// in place. Readers get `Rc<RefCell<V>>`, the same allocation every time.
    pub fn add_dynamic<V, F, U>(self, path: &str, factory: F, update: U) -> Self
    where
        V: Any,
        F: Fn(&mut Deps<'_>, &Args) -> Result<V> + 'static,
        U: Fn(&mut Deps<'_>, &mut V, &Args) -> Result<()> + 'static,
    {
        self.bind::<RefCell<V>>(
            path,
            Provider::Dynamic {
                factory: provider::cell_factory(factory),
                update: provider::cell_updater(update),
            },
        )
    }

    /// Register a resource computed once per node lifetime.
    pub fn add_once<T, F>(self, path: &str, factory: F) -> Self
    where
        T: Any,
        F: Fn(&mut Deps<'_>, &Args) -> Result<T> + 'static,
    {
        self.bind::<T>(
            path,
            Provider::Once {
                factory: provider::computed(factory),
            },
        )
    }

    /// Register a hash-checked resource compared with `PartialEq`.
    pub fn add_hash_checked<T, H, F, G>(self, path: &str, compute: F, hash: G) -> Self
    where
        T: Any,
        H: PartialEq + Any,
        F: Fn(&mut Deps<'_>, &Args) -> Result<T> + 'static,
        G: Fn(&mut Deps<'_>, &Args) -> Result<H> + 'static,
    {
        self.add_hash_checked_by(path, compute, hash, H::eq)
    }

    /// Register a hash-checked resource with a custom hash equality.
    ///
    /// `compute` only runs when `equal(new_hash, old_hash)` is false.
    pub fn add_hash_checked_by<T, H, F, G, E>(self, path: &str, compute: F, hash: G, equal: E) -> Self
    where
        T: Any,
        H: Any,
        F: Fn(&mut Deps<'_>, &Args) -> Result<T> + 'static,
        G: Fn(&mut Deps<'_>, &Args) -> Result<H> + 'static,
        E: Fn(&H, &H) -> bool + 'static,
    {
        self.bind::<T>(
            path,
            Provider::HashChecked {
                compute: provider::computed(compute),
                hash: provider::hashed(hash),
                equal: provider::hash_equality(equal),
            },
        )
    }

    /// Attach a disposer to `path`.
    ///
    /// `T` is the type `get` returns for the path (`RefCell<V>` for dynamic
    /// resources). The disposer runs exactly once per value, when the
    /// collector reclaims the node or when a recomputation replaces the value.
    pub fn dispose_with<T, D>(mut self, path: &str, dispose: D) -> Self
    where
        T: Any,
        D: Fn(&T) -> Result<(), DisposeError> + 'static,
    {
        self.disposers.push(PendingDisposer {
            path: path.to_owned(),
            value_type: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            dispose: provider::disposer::<T, D>(dispose),
        });
        self
    }

    /// Freeze the registry.
    pub fn build(mut self) -> Result<Resources> {
        for pending in std::mem::take(&mut self.disposers) {
            let PendingDisposer {
                path,
                value_type,
                type_name,
                dispose,
            } = pending;
            match self.bindings.get_mut(path.as_str()) {
                Some(binding) if binding.value_type != value_type => {
                    self.errors.push(ResourceError::DisposerType {
                        path,
                        expected: binding.type_name,
                        found: type_name,
                    });
                }
                Some(binding) => binding.disposer = Some(dispose),
                None => self.errors.push(ResourceError::UnknownDisposer { path }),
            }
        }
        if let Some(error) = self.errors.into_iter().next() {
            return Err(error);
        }

        let registry = Registry::new(self.bindings);
        debug!(resources = registry.len(), "resource graph built");
        Ok(Resources::new(Runtime::new(registry, self.capacities)))
    }

    fn bind<T: Any>(mut self, path: &str, provider: Provider) -> Self {
        if let Err(error) = validate_path(path) {
            self.errors.push(error);
        } else if self.bindings.contains_key(path) {
            self.errors.push(ResourceError::DuplicatePath {
                path: path.to_owned(),
            });
        } else {
            debug!(path, kind = ?provider.kind(), value = type_name::<T>(), "resource registered");
            self.bindings
                .insert(Arc::from(path), Binding::new::<T>(provider));
        }
        self
    }
}

/// A disposer waiting for `build` to attach it.
struct PendingDisposer {
    path: String,
    value_type: TypeId,
    type_name: &'static str,
    dispose: DisposeFn,
}

fn validate_path(path: &str) -> Result<()> {
    let reason = if path.is_empty() {
        "path is empty"
    } else if !path.starts_with('/') {
        "path must start with '/'"
    } else if path.chars().any(char::is_whitespace) {
        "path must not contain whitespace"
    } else {
        return Ok(());
    };
    Err(ResourceError::InvalidPath {
        path: path.to_owned(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_paths_fail_build() {
        let err = ResourcesBuilder::new()
            .add_global("/d", 1)
            .add("/d", |_deps, _args| Ok(2))
            .build()
            .unwrap_err();
        assert!(matches!(err, ResourceError::DuplicatePath { path } if path == "/d"));
    }

    #[test]
    fn invalid_paths_fail_build() {
        for path in ["", "terrain", "/two words"] {
            let err = ResourcesBuilder::new()
                .add_global(path, 1)
                .build()
                .unwrap_err();
            assert!(matches!(err, ResourceError::InvalidPath { .. }), "{path:?}");
        }
    }

    #[test]
    fn disposer_for_unknown_path_fails_build() {
        let err = ResourcesBuilder::new()
            .dispose_with::<i32, _>("/ghost", |_| Ok(()))
            .build()
            .unwrap_err();
        assert!(matches!(err, ResourceError::UnknownDisposer { path } if path == "/ghost"));
    }

    #[test]
    fn disposer_may_precede_its_path() {
        let resources = ResourcesBuilder::new()
            .dispose_with::<i32, _>("/d", |_| Ok(()))
            .add_global("/d", 1)
            .build();
        assert!(resources.is_ok());
    }

    #[test]
    fn disposer_of_wrong_type_fails_build() {
        let err = ResourcesBuilder::new()
            .add_dynamic(
                "/mesh",
                |_deps, _args| Ok(Vec::<u8>::new()),
                |_deps, _mesh, _args| Ok(()),
            )
            .dispose_with::<Vec<u8>, _>("/mesh", |_| Ok(()))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ResourceError::DisposerType { ref path, .. } if path == "/mesh"
        ));
        assert!(err.to_string().contains("RefCell"));

        let built = ResourcesBuilder::new()
            .add_dynamic(
                "/mesh",
                |_deps, _args| Ok(Vec::<u8>::new()),
                |_deps, _mesh, _args| Ok(()),
            )
            .dispose_with::<RefCell<Vec<u8>>, _>("/mesh", |_| Ok(()))
            .build();
        assert!(built.is_ok());
    }

    #[test]
    fn first_error_wins() {
        let err = ResourcesBuilder::new()
            .add_global("bad", 1)
            .add_global("/d", 1)
            .add_global("/d", 2)
            .build()
            .unwrap_err();
        assert!(matches!(err, ResourceError::InvalidPath { .. }));
    }
}
