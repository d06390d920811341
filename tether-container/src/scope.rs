//! Named dependency scopes.
//!
//! A scope is a sub-flow of the application (checkout, onboarding, ...)
//! with its own container. The scope fills the container when it is
//! registered in a [`ScopedRegistry`] and tears down when it is removed.

use std::future::Future;

use async_trait::async_trait;
use tracing::debug;

use crate::container::Container;
use crate::error::Result;
use crate::scoped::ScopedRegistry;

/// A named sub-flow with its own container.
///
/// ```rust,ignore
/// struct CheckoutScope;
///
/// #[async_trait]
/// impl DependencyScope for CheckoutScope {
///     fn scope_id(&self) -> &str {
///         "checkout"
///     }
///
///     fn setup_container(&self, container: &Container) -> Result<()> {
///         container.register::<Arc<Cart>>().as_singleton().with(|_| Ok(Arc::new(Cart::default())))?;
///         Ok(())
///     }
/// }
///
/// let container = CheckoutScope.register_in(scoped::global())?;
/// ```
#[async_trait]
pub trait DependencyScope: Send + Sync {
    fn scope_id(&self) -> &str;

    /// Registers the scope's dependencies.
    fn setup_container(&self, container: &Container) -> Result<()>;

    /// Runs when the scope is removed from a registry.
    async fn cleanup_scope(&self) {}

    /// The container the scope is set up in. Override to pick a config.
    fn create_container(&self) -> Container {
        Container::new()
    }

    /// Creates and fills the scope's container, then stores it in `registry`
    /// under [`scope_id`](Self::scope_id). An existing entry is replaced.
    fn register_in(&self, registry: &ScopedRegistry) -> Result<Container> {
        let container = self.create_container();
        self.setup_container(&container)?;
        registry.set_scoped_container(self.scope_id(), container.clone());
        debug!(scope = self.scope_id(), registrations = container.len(), "Scope registered");
        Ok(container)
    }

    /// Removes the scope's container from `registry` and runs
    /// [`cleanup_scope`](Self::cleanup_scope).
    async fn unregister_from(&self, registry: &ScopedRegistry) -> Option<Container> {
        let removed = registry.remove_scoped_container(self.scope_id());
        self.cleanup_scope().await;
        debug!(scope = self.scope_id(), found = removed.is_some(), "Scope unregistered");
        removed
    }

    /// The scope's container in `registry`.
    ///
    /// # Errors
    /// [`ContainerError::ScopeNotFound`](crate::error::ContainerError::ScopeNotFound)
    /// if the scope was never registered or has been removed.
    fn scope_container(&self, registry: &ScopedRegistry) -> Result<Container> {
        registry.require_scoped_container(self.scope_id())
    }

    /// Runs `action` against the scope's container.
    async fn with_scope_container<F, Fut, T>(&self, registry: &ScopedRegistry, action: F) -> Result<T>
    where
        Self: Sized,
        F: FnOnce(Container) -> Fut + Send,
        Fut: Future<Output = T> + Send,
        T: Send,
    {
        let container = self.scope_container(registry)?;
        Ok(action(container).await)
    }
}
