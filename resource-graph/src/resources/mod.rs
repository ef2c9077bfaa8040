//! Resources
//!
//! This module implements the active half of the resource graph: providers
//! bound to paths, the runtime that computes and recomputes them, and the
//! builder and facade hosts interact with.
//!
//! # Concepts
//!
//! ## Providers
//!
//! Every path is bound to one of five providers:
//!
//! - **static** (`add`): a memoized function of the resources it reads,
//!   recomputed whenever one of them changes.
//! - **global** (`add_global`): a host-supplied value, replaced with `set`.
//!   This is the only way new information enters the graph.
//! - **dynamic** (`add_dynamic`): a long-lived value created once and then
//!   updated in place. Readers always see the same allocation.
//! - **once** (`add_once`): computed on first read and never again for the
//!   lifetime of the node, whatever happens to its inputs.
//! - **hash-checked** (`add_hash_checked`): a cheap hash is recomputed when
//!   inputs change, the expensive value only when the hash differs.
//!
//! ## Dependency Tracking
//!
//! Providers read other resources through the [`Deps`] context they are
//! handed. Every read is recorded with the version observed, and the record
//! replaces the node's dependency set when the provider returns.
//!
//! ## Invalidation
//!
//! Invalidation is pull-based. `set` only bumps the global's version; a
//! derived resource notices on its next read, when the versions it recorded
//! no longer match.
//!
//! ## Collection
//!
//! `collect` advances a generation counter and disposes nodes that went
//! unread for longer than their grace period. Globals are never collected.

mod builder;
mod context;
mod facade;
mod provider;
mod runtime;

pub use builder::ResourcesBuilder;
pub use context::Deps;
pub use facade::Resources;
