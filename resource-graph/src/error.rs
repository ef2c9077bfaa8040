//! Error types for the resource graph.

use thiserror::Error;

use crate::graph::ResourceKey;

/// Error returned by a disposer.
pub type DisposeError = Box<dyn std::error::Error + Send + Sync>;

/// Result alias used throughout the crate.
pub type Result<T, E = ResourceError> = std::result::Result<T, E>;

/// Everything that can go wrong while registering, resolving or mutating
/// resources.
#[derive(Debug, Error)]
pub enum ResourceError {
    /// A resource was re-entered while it was still being computed.
    #[error("dependency cycle detected at {key}: {}", render_chain(.chain))]
    Cycle {
        key: ResourceKey,
        /// The active resolution chain, outermost first, ending with `key`.
        chain: Vec<ResourceKey>,
    },

    /// No provider or global is registered for the path.
    #[error("no resource registered at {path}")]
    Unbound { path: String },

    /// A global resource was addressed with arguments.
    #[error("global resource {path} takes no arguments, got {count}")]
    UnexpectedArgs { path: String, count: usize },

    /// `set` was called on a derived resource.
    #[error("resource {path} is not global and cannot be set")]
    NotGlobal { path: String },

    /// The stored value is not of the requested type.
    #[error("resource {key} does not hold a value of type {expected}")]
    TypeMismatch {
        key: ResourceKey,
        expected: &'static str,
    },

    /// An argument was missing or of the wrong shape.
    #[error("argument {index} is not a {expected}")]
    BadArgument { index: usize, expected: &'static str },

    /// A dynamic value was still borrowed when its updater had to run.
    #[error("dynamic resource {key} is borrowed and cannot be updated")]
    Borrowed { key: ResourceKey },

    #[error("path {path} is registered more than once")]
    DuplicatePath { path: String },

    #[error("invalid resource path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("disposer attached to unregistered path {path}")]
    UnknownDisposer { path: String },

    /// A disposer's value type differs from what the path stores.
    #[error("disposer for {path} takes {found}, but the resource holds {expected}")]
    DisposerType {
        path: String,
        expected: &'static str,
        found: &'static str,
    },

    /// A node disappeared while it was being resolved.
    #[error("resource {key} vanished from the store during resolution")]
    Missing { key: ResourceKey },

    /// Failure reported by a provider function.
    #[error("provider failed: {0}")]
    Provider(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ResourceError {
    /// Wrap a provider-specific error.
    pub fn provider<E>(error: E) -> Self
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Self::Provider(error.into())
    }

    /// Whether this error is a dependency cycle.
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::Cycle { .. })
    }
}

fn render_chain(chain: &[ResourceKey]) -> String {
    chain
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Args;

    #[test]
    fn cycle_message_lists_chain() {
        let a = ResourceKey::new("/a", Args::new());
        let b = ResourceKey::new("/b", Args::new());
        let err = ResourceError::Cycle {
            key: a.clone(),
            chain: vec![a.clone(), b, a],
        };
        assert!(err.is_cycle());
        assert_eq!(
            err.to_string(),
            "dependency cycle detected at /a: /a -> /b -> /a"
        );
    }

    #[test]
    fn provider_wraps_strings() {
        let err = ResourceError::provider("tensor not loaded");
        assert_eq!(err.to_string(), "provider failed: tensor not loaded");
    }
}
