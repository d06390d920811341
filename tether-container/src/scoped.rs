//! Process-wide container registry.
//!
//! Holds a "current" container, swapped atomically, and a table of named
//! scope containers. [`global()`] is the shared instance; the free functions
//! in this module forward to it. A [`ScopedRegistry`] can also be created
//! locally, which is what tests should do.
//!
//! ```rust
//! use tether_container::prelude::*;
//! use tether_container::scoped::ScopedRegistry;
//!
//! let registry = ScopedRegistry::new();
//! assert_eq!(registry.resolve_or(8080u16), 8080);
//!
//! let container = Container::new();
//! container.register::<u16>().with_value(9090).unwrap();
//! registry.set_container(container);
//! assert_eq!(registry.resolve_or(8080u16), 9090);
//! ```

use std::future::Future;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use tracing::debug;

use crate::capability::ResolverExt;
use crate::container::Container;
use crate::error::{ContainerError, Result};

/// A current-container slot plus a `scope id → container` table.
#[derive(Debug, Default)]
pub struct ScopedRegistry {
    current: ArcSwapOption<Container>,
    scopes: DashMap<String, Container>,
}

impl ScopedRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Current container ──

    /// Snapshot of the current container.
    pub fn current(&self) -> Option<Container> {
        self.current.load_full().map(Arc::unwrap_or_clone)
    }

    /// Like [`current`](Self::current), but fails with
    /// [`ContainerError::ContainerUnavailable`] when none is set.
    pub fn require_current(&self) -> Result<Container> {
        self.current().ok_or(ContainerError::ContainerUnavailable)
    }

    /// Installs `container` as current and returns the previous one.
    pub fn set_container(&self, container: Container) -> Option<Container> {
        debug!(?container, "Setting current container");
        self.current
            .swap(Some(Arc::new(container)))
            .map(Arc::unwrap_or_clone)
    }

    /// Clears the current container and returns it.
    pub fn clear_container(&self) -> Option<Container> {
        debug!("Clearing current container");
        self.current.swap(None).map(Arc::unwrap_or_clone)
    }

    /// Runs `action` with `temporary` as the current container.
    ///
    /// The previous container is put back however the action ends: normal
    /// return, panic, or the returned future being dropped.
    pub async fn with_container<F, Fut, T>(&self, temporary: Container, action: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        let previous = self.current.swap(Some(Arc::new(temporary)));
        let _restore = RestoreGuard {
            slot: &self.current,
            previous,
        };
        action().await
    }

    // ── Named scopes ──

    /// Stores `container` under `id`, returning what was there before.
    pub fn set_scoped_container(&self, id: impl Into<String>, container: Container) -> Option<Container> {
        let id = id.into();
        debug!(scope = %id, "Setting scoped container");
        self.scopes.insert(id, container)
    }

    pub fn scoped_container(&self, id: &str) -> Option<Container> {
        self.scopes.get(id).map(|entry| entry.value().clone())
    }

    /// Like [`scoped_container`](Self::scoped_container), but fails with
    /// [`ContainerError::ScopeNotFound`] listing the known scope ids.
    pub fn require_scoped_container(&self, id: &str) -> Result<Container> {
        self.scoped_container(id)
            .ok_or_else(|| ContainerError::ScopeNotFound {
                id: id.to_string(),
                available_scopes: self.scope_ids(),
            })
    }

    pub fn remove_scoped_container(&self, id: &str) -> Option<Container> {
        let removed = self.scopes.remove(id).map(|(_, container)| container);
        if removed.is_some() {
            debug!(scope = %id, "Removed scoped container");
        }
        removed
    }

    /// Known scope ids, sorted.
    pub fn scope_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.scopes.iter().map(|entry| entry.key().clone()).collect();
        ids.sort();
        ids
    }

    // ── Fallback resolution ──

    /// Resolves `T` synchronously from the current container, or returns
    /// `fallback` when there is no container or resolution fails.
    pub fn resolve_or<T: Clone + Send + Sync + 'static>(&self, fallback: T) -> T {
        self.resolve_or_else(|| fallback)
    }

    /// Named variant of [`resolve_or`](Self::resolve_or).
    pub fn resolve_named_or<T: Clone + Send + Sync + 'static>(&self, name: &str, fallback: T) -> T {
        self.fallback_to(|container| container.resolve_named_sync::<T>(name), || fallback)
    }

    pub fn resolve_or_else<T, F>(&self, fallback: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> T,
    {
        self.fallback_to(|container| container.resolve_sync::<T>(), fallback)
    }

    fn fallback_to<T>(
        &self,
        resolve: impl FnOnce(&Container) -> Result<T>,
        fallback: impl FnOnce() -> T,
    ) -> T {
        let Some(container) = self.current() else {
            debug!(product = std::any::type_name::<T>(), "No current container, using fallback");
            return fallback();
        };
        resolve(&container).unwrap_or_else(|error| {
            debug!(error = %error, "Resolution failed, using fallback");
            fallback()
        })
    }
}

struct RestoreGuard<'a> {
    slot: &'a ArcSwapOption<Container>,
    previous: Option<Arc<Container>>,
}

impl Drop for RestoreGuard<'_> {
    fn drop(&mut self) {
        self.slot.store(self.previous.take());
    }
}

// ═══════════════════════════════════════════
// Process-wide registry
// ═══════════════════════════════════════════

static GLOBAL: Lazy<ScopedRegistry> = Lazy::new(ScopedRegistry::new);

/// The process-wide registry.
pub fn global() -> &'static ScopedRegistry {
    &GLOBAL
}

/// The current global container.
///
/// # Errors
/// [`ContainerError::ContainerUnavailable`] when none is set.
pub fn current() -> Result<Container> {
    GLOBAL.require_current()
}

/// The current global container, if any.
pub fn current_sync() -> Option<Container> {
    GLOBAL.current()
}

pub fn set_container(container: Container) -> Option<Container> {
    GLOBAL.set_container(container)
}

pub fn clear_container() -> Option<Container> {
    GLOBAL.clear_container()
}

/// See [`ScopedRegistry::with_container`].
pub async fn with_container<F, Fut, T>(temporary: Container, action: F) -> T
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = T>,
{
    GLOBAL.with_container(temporary, action).await
}

pub fn set_scoped_container(id: impl Into<String>, container: Container) -> Option<Container> {
    GLOBAL.set_scoped_container(id, container)
}

pub fn scoped_container(id: &str) -> Option<Container> {
    GLOBAL.scoped_container(id)
}

pub fn remove_scoped_container(id: &str) -> Option<Container> {
    GLOBAL.remove_scoped_container(id)
}

/// A fresh, empty container. Nothing is shared between calls.
pub fn create_container() -> Container {
    Container::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::RegistrarExt;
    use futures::FutureExt;
    use std::panic::AssertUnwindSafe;

    fn container_with(value: u8) -> Container {
        let container = Container::new();
        container.register::<u8>().with_value(value).unwrap();
        container
    }

    #[test]
    fn set_and_clear_return_previous() {
        let registry = ScopedRegistry::new();
        assert!(registry.current().is_none());
        assert!(matches!(
            registry.require_current(),
            Err(ContainerError::ContainerUnavailable)
        ));

        let first = container_with(1);
        assert!(registry.set_container(first.clone()).is_none());
        let previous = registry.set_container(container_with(2)).unwrap();
        assert!(previous.ptr_eq(&first));

        assert!(registry.clear_container().is_some());
        assert!(registry.current().is_none());
    }

    #[tokio::test]
    async fn with_container_restores_on_return() {
        let registry = ScopedRegistry::new();
        let outer = container_with(1);
        registry.set_container(outer.clone());

        let seen = registry
            .with_container(container_with(2), || async { registry.resolve_or(0u8) })
            .await;
        assert_eq!(seen, 2);
        assert!(registry.current().unwrap().ptr_eq(&outer));
    }

    #[tokio::test]
    async fn with_container_restores_on_error_and_panic() {
        let registry = ScopedRegistry::new();

        let failed: std::result::Result<(), &str> = registry
            .with_container(container_with(2), || async { Err("checkout aborted") })
            .await;
        assert!(failed.is_err());
        assert!(registry.current().is_none());

        let panicked = AssertUnwindSafe(registry.with_container(container_with(3), || async {
            let value = registry.resolve_or(0u8);
            assert_eq!(value, 0, "factory exploded");
        }))
        .catch_unwind()
        .await;
        assert!(panicked.is_err());
        assert!(registry.current().is_none());
    }

    #[tokio::test]
    async fn with_container_restores_when_dropped() {
        let registry = ScopedRegistry::new();
        let outer = container_with(1);
        registry.set_container(outer.clone());

        let pending = registry.with_container(container_with(2), || futures::future::pending::<()>());
        let timed_out = tokio::time::timeout(std::time::Duration::from_millis(10), pending).await;
        assert!(timed_out.is_err());
        assert!(registry.current().unwrap().ptr_eq(&outer));
    }

    #[test]
    fn scopes_are_isolated() {
        let registry = ScopedRegistry::new();
        registry.set_container(container_with(0));
        registry.set_scoped_container("checkout", container_with(1));
        registry.set_scoped_container("account", container_with(2));

        let checkout = registry.scoped_container("checkout").unwrap();
        let account = registry.scoped_container("account").unwrap();
        assert!(!checkout.ptr_eq(&account));
        assert!(!checkout.ptr_eq(&registry.current().unwrap()));
        assert_eq!(registry.scope_ids(), vec!["account", "checkout"]);

        assert!(registry.remove_scoped_container("checkout").is_some());
        assert!(registry.scoped_container("checkout").is_none());
        assert!(registry.remove_scoped_container("checkout").is_none());
        assert!(registry.scoped_container("account").unwrap().ptr_eq(&account));
        assert_eq!(registry.scope_ids(), vec!["account"]);
    }

    #[test]
    fn missing_scope_lists_available() {
        let registry = ScopedRegistry::new();
        registry.set_scoped_container("checkout", Container::new());
        match registry.require_scoped_container("cart") {
            Err(ContainerError::ScopeNotFound { id, available_scopes }) => {
                assert_eq!(id, "cart");
                assert_eq!(available_scopes, vec!["checkout"]);
            }
            other => panic!("expected ScopeNotFound, got {other:?}"),
        }
    }

    #[test]
    fn fallback_covers_missing_container_and_failures() {
        let registry = ScopedRegistry::new();
        assert_eq!(registry.resolve_or(7u8), 7);

        registry.set_container(container_with(1));
        assert_eq!(registry.resolve_or(7u8), 1);
        assert_eq!(registry.resolve_or(7u16), 7);
        assert_eq!(registry.resolve_named_or("retries", 4u8), 4);
        assert_eq!(registry.resolve_or_else(|| String::from("guest")), "guest");
    }

    #[test]
    fn create_container_is_always_fresh() {
        let a = create_container();
        let b = create_container();
        assert!(!a.ptr_eq(&b));
        assert!(a.is_empty());
    }
}
