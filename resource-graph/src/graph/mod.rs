//! Resource Graph Storage
//!
//! This module holds the passive half of the resource graph: identities,
//! nodes, the store that owns them and the collector that decides when they
//! expire. The active half (dependency tracking, providers and the runtime
//! that recomputes stale nodes) lives in [`crate::resources`].
//!
//! # Overview
//!
//! - Nodes are addressed by [`ResourceKey`] (path plus argument tuple).
//! - Each node records the resources it read during its last computation,
//!   together with the [`Version`] it observed for each of them.
//! - A node is stale when any recorded version differs from the producer's
//!   current version. Staleness is checked lazily on read; nothing is pushed.
//!
//! # Design Decisions
//!
//! 1. Edges are kept on the consumer only. Invalidation is pull-based, so the
//!    reverse direction is never needed.
//!
//! 2. Versions come from a single clock in the [`NodeStore`]. Comparing a
//!    recorded version for equality is then enough to detect any change,
//!    including a producer that was collected and rebuilt.

mod collector;
mod key;
mod node;
mod store;

pub use collector::{CollectStats, Collector};
pub use key::{Arg, Args, FloatBits, IntoArgs, ResourceKey};
pub(crate) use node::DisposeFn;
pub use node::{NodeKind, ResourceNode, Value, Version};
pub use store::NodeStore;
