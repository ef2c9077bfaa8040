//! Providers and the Registry
//!
//! A provider is what a path is bound to: the function (or value) that
//! produces a resource. There are five kinds, mirrored one-to-one by
//! [`NodeKind`], and the runtime dispatches on them exhaustively.
//!
//! Providers are stored type-erased. The typed closures handed to the
//! builder are wrapped here so that values travel through the graph as
//! [`Value`] (`Rc<dyn Any>`) and hashes as `Box<dyn Any>`.

use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use indexmap::IndexMap;

use super::context::Deps;
use crate::error::{DisposeError, ResourceError, Result};
use crate::graph::{Args, DisposeFn, NodeKind, ResourceKey, Value};

pub(crate) type ComputeFn = Rc<dyn Fn(&mut Deps<'_>, &Args) -> Result<Value>>;
pub(crate) type UpdateFn = Rc<dyn Fn(&mut Deps<'_>, &Value, &Args) -> Result<()>>;
pub(crate) type HashFn = Rc<dyn Fn(&mut Deps<'_>, &Args) -> Result<Box<dyn Any>>>;
pub(crate) type HashEqFn = Rc<dyn Fn(&dyn Any, &dyn Any) -> bool>;

/// The recomputation policy bound to a path.
#[derive(Clone)]
pub(crate) enum Provider {
    Static {
        compute: ComputeFn,
    },
    Global {
        initial: Value,
    },
    /// `factory` allocates the long-lived value, `update` mutates it in place.
    Dynamic {
        factory: ComputeFn,
        update: UpdateFn,
    },
    Once {
        factory: ComputeFn,
    },
    HashChecked {
        compute: ComputeFn,
        hash: HashFn,
        equal: HashEqFn,
    },
}

impl Provider {
    pub(crate) fn kind(&self) -> NodeKind {
        match self {
            Provider::Static { .. } => NodeKind::Static,
            Provider::Global { .. } => NodeKind::Global,
            Provider::Dynamic { .. } => NodeKind::Dynamic,
            Provider::Once { .. } => NodeKind::Once,
            Provider::HashChecked { .. } => NodeKind::HashChecked,
        }
    }
}

fn compute_fn<F>(f: F) -> ComputeFn
where
    F: Fn(&mut Deps<'_>, &Args) -> Result<Value> + 'static,
{
    Rc::new(f)
}

fn update_fn<F>(f: F) -> UpdateFn
where
    F: Fn(&mut Deps<'_>, &Value, &Args) -> Result<()> + 'static,
{
    Rc::new(f)
}

fn hash_fn<F>(f: F) -> HashFn
where
    F: Fn(&mut Deps<'_>, &Args) -> Result<Box<dyn Any>> + 'static,
{
    Rc::new(f)
}

/// Wrap a typed computation so its result is stored as a [`Value`].
pub(crate) fn computed<T, F>(compute: F) -> ComputeFn
where
    T: Any,
    F: Fn(&mut Deps<'_>, &Args) -> Result<T> + 'static,
{
    compute_fn(move |deps, args| Ok(Rc::new(compute(deps, args)?) as Value))
}

/// Wrap a dynamic factory; the value lives in a `RefCell` so it can be
/// updated in place while readers hold the same `Rc`.
pub(crate) fn cell_factory<V, F>(factory: F) -> ComputeFn
where
    V: Any,
    F: Fn(&mut Deps<'_>, &Args) -> Result<V> + 'static,
{
    compute_fn(move |deps, args| Ok(Rc::new(RefCell::new(factory(deps, args)?)) as Value))
}

pub(crate) fn cell_updater<V, U>(update: U) -> UpdateFn
where
    V: Any,
    U: Fn(&mut Deps<'_>, &mut V, &Args) -> Result<()> + 'static,
{
    update_fn(move |deps, value, args| {
        let cell = value
            .downcast_ref::<RefCell<V>>()
            .ok_or_else(|| ResourceError::TypeMismatch {
                key: deps.consumer().clone(),
                expected: type_name::<RefCell<V>>(),
            })?;
        let mut guard = cell.try_borrow_mut().map_err(|_| ResourceError::Borrowed {
            key: deps.consumer().clone(),
        })?;
        update(deps, &mut guard, args)
    })
}

pub(crate) fn hashed<H, G>(hash: G) -> HashFn
where
    H: Any,
    G: Fn(&mut Deps<'_>, &Args) -> Result<H> + 'static,
{
    hash_fn(move |deps, args| Ok(Box::new(hash(deps, args)?) as Box<dyn Any>))
}

pub(crate) fn hash_equality<H, E>(equal: E) -> HashEqFn
where
    H: Any,
    E: Fn(&H, &H) -> bool + 'static,
{
    Rc::new(
        move |a: &dyn Any, b: &dyn Any| match (a.downcast_ref::<H>(), b.downcast_ref::<H>()) {
            (Some(a), Some(b)) => equal(a, b),
            _ => false,
        },
    )
}

/// Wrap a typed disposer.
pub(crate) fn disposer<T, D>(dispose: D) -> DisposeFn
where
    T: Any,
    D: Fn(&T) -> Result<(), DisposeError> + 'static,
{
    Rc::new(move |value: &dyn Any| match value.downcast_ref::<T>() {
        Some(value) => dispose(value),
        None => Err(format!("disposer expects a value of type {}", type_name::<T>()).into()),
    })
}

/// Everything registered for one path.
#[derive(Clone)]
pub(crate) struct Binding {
    pub(crate) provider: Provider,
    pub(crate) disposer: Option<DisposeFn>,

    /// Type handed back by `get` for this path.
    pub(crate) value_type: TypeId,
    pub(crate) type_name: &'static str,
}

impl Binding {
    pub(crate) fn new<T: Any>(provider: Provider) -> Self {
        Self {
            provider,
            disposer: None,
            value_type: TypeId::of::<T>(),
            type_name: type_name::<T>(),
        }
    }
}

/// Path -> binding map, frozen once the resources are built.
pub(crate) struct Registry {
    bindings: IndexMap<Arc<str>, Binding>,
}

impl Registry {
    pub(crate) fn new(bindings: IndexMap<Arc<str>, Binding>) -> Self {
        Self { bindings }
    }

    /// Build the key for `path`, sharing the registered path allocation.
    pub(crate) fn key(&self, path: &str, args: Args) -> Result<ResourceKey> {
        let (path, _) = self
            .bindings
            .get_key_value(path)
            .ok_or_else(|| ResourceError::Unbound {
                path: path.to_owned(),
            })?;
        Ok(ResourceKey::new(Arc::clone(path), args))
    }

    /// Binding for a key. Globals do not take arguments.
    pub(crate) fn binding(&self, key: &ResourceKey) -> Result<&Binding> {
        let binding = self
            .bindings
            .get(key.path())
            .ok_or_else(|| ResourceError::Unbound {
                path: key.path().to_owned(),
            })?;
        if binding.provider.kind() == NodeKind::Global && !key.args().is_empty() {
            return Err(ResourceError::UnexpectedArgs {
                path: key.path().to_owned(),
                count: key.args().len(),
            });
        }
        Ok(binding)
    }

    pub(crate) fn kind(&self, path: &str) -> Result<NodeKind> {
        self.bindings
            .get(path)
            .map(|binding| binding.provider.kind())
            .ok_or_else(|| ResourceError::Unbound {
                path: path.to_owned(),
            })
    }

    pub(crate) fn len(&self) -> usize {
        self.bindings.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::IntoArgs;

    fn registry() -> Registry {
        let mut bindings = IndexMap::new();
        bindings.insert(
            Arc::from("/d"),
            Binding::new::<i32>(Provider::Global {
                initial: Rc::new(5i32),
            }),
        );
        bindings.insert(
            Arc::from("/e"),
            Binding::new::<i32>(Provider::Static {
                compute: computed(|_deps, args: &Args| Ok(args.int(0)? as i32)),
            }),
        );
        Registry::new(bindings)
    }

    #[test]
    fn keys_share_registered_path() {
        let registry = registry();
        let a = registry.key("/e", (1,).into_args()).unwrap();
        let b = registry.key("/e", (2,).into_args()).unwrap();
        assert!(Arc::ptr_eq(a.shared_path(), b.shared_path()));
    }

    #[test]
    fn unknown_path_is_unbound() {
        let registry = registry();
        assert!(matches!(
            registry.key("/nope", Args::new()),
            Err(ResourceError::Unbound { .. })
        ));
        assert!(matches!(registry.kind("/nope"), Err(ResourceError::Unbound { .. })));
    }

    #[test]
    fn globals_reject_arguments() {
        let registry = registry();
        let key = registry.key("/d", (1,).into_args()).unwrap();
        assert!(matches!(
            registry.binding(&key),
            Err(ResourceError::UnexpectedArgs { count: 1, .. })
        ));
    }

    #[test]
    fn kinds_follow_providers() {
        let registry = registry();
        assert_eq!(registry.kind("/d").unwrap(), NodeKind::Global);
        assert_eq!(registry.kind("/e").unwrap(), NodeKind::Static);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn hash_equality_rejects_foreign_types() {
        let equal = hash_equality::<u32, _>(|a, b| a == b);
        assert!(equal(&3u32, &3u32));
        assert!(!equal(&3u32, &4u32));
        assert!(!equal(&3u32, &"3"));
    }

    #[test]
    fn disposer_checks_value_type() {
        let dispose = disposer::<i32, _>(|_| Ok(()));
        assert!(dispose(&1i32).is_ok());
        assert!(dispose(&"text").is_err());
    }
}
