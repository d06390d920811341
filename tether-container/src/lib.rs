//! Core container implementation for Tether DI.

pub mod builder;
mod cache;
pub mod capability;
pub mod config;
pub mod container;
pub mod context;
pub mod diagnostics;
pub mod error;
pub mod factory;
pub mod instance;
pub mod instrumented;
pub mod key;
pub mod metrics;
pub mod policy;
pub mod provider;
pub mod registry;
pub mod scope;
pub mod scoped;

pub use container::{Container, prelude};
pub use error::{ContainerError, Result};
pub use key::TypeKey;
pub use policy::RetentionPolicy;
