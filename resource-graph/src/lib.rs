//! Resource Graph
//!
//! A key-addressed, dependency-tracked incremental computation and caching
//! engine. Subsystems are expressed as *resources*: functions of other
//! resources, memoized by key, invalidated when their inputs change and
//! reclaimed by a deferred collector once nobody reads them.
//!
//! - Five recomputation policies: static, global, dynamic, once and
//!   hash-checked
//! - Implicit dependency tracking through the [`Deps`] context
//! - Lazy, pull-based invalidation driven by version stamps
//! - Generational collection with exactly-once disposal
//!
//! # Architecture
//!
//! The crate is organized into two modules:
//!
//! - `graph`: resource keys, nodes, the node store and the collector
//! - `resources`: providers, dependency tracking, the runtime, the builder
//!   and the [`Resources`] facade
//!
//! # Example
//!
//! ```rust
//! use std::cell::RefCell;
//! use std::rc::Rc;
//! use resource_graph::ResourcesBuilder;
//!
//! let mut resources = ResourcesBuilder::new()
//!     .add_global("/volume", vec![1u8, 2, 3])
//!     .add_dynamic(
//!         "/mesh",
//!         |_deps, _args| Ok(Vec::<u8>::new()),
//!         |deps, mesh, _args| {
//!             let volume = deps.get::<Vec<u8>>("/volume", ())?;
//!             mesh.clear();
//!             mesh.extend(volume.iter().map(|v| v * 2));
//!             Ok(())
//!         },
//!     )
//!     .build()
//!     .unwrap();
//!
//! let mesh = resources.get::<RefCell<Vec<u8>>>("/mesh", ()).unwrap();
//! assert_eq!(*mesh.borrow(), [2, 4, 6]);
//!
//! resources.set("/volume", vec![5u8]).unwrap();
//! let again = resources.get::<RefCell<Vec<u8>>>("/mesh", ()).unwrap();
//! assert!(Rc::ptr_eq(&mesh, &again));
//! assert_eq!(*mesh.borrow(), [10]);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod resources;

pub use config::Capacities;
pub use error::{DisposeError, ResourceError, Result};
pub use graph::{Arg, Args, CollectStats, IntoArgs, NodeKind, ResourceKey, Version};
pub use resources::{Deps, Resources, ResourcesBuilder};
