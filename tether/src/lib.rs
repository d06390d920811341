//! # Tether: dependency resolution container for Rust
//!
//! Register factories by type (and optional name), choose how instances are
//! retained, and resolve them synchronously or from async code.
//!
//! ```rust
//! use std::sync::Arc;
//! use tether::prelude::*;
//!
//! struct Catalog;
//!
//! let container = Container::new();
//! container
//!     .register::<Arc<Catalog>>()
//!     .as_singleton()
//!     .with(|_| Ok(Arc::new(Catalog)))
//!     .unwrap();
//!
//! let first: Arc<Catalog> = container.resolve_sync().unwrap();
//! let second: Arc<Catalog> = container.resolve_sync().unwrap();
//! assert!(Arc::ptr_eq(&first, &second));
//! ```

pub use tether_container::*;
pub use tether_support as support;
