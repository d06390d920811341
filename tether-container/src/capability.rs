//! Capability traits.
//!
//! Consumers depend on the narrowest capability they need:
//! - [`Registrar`] to add and remove registrations
//! - [`Resolver`] to obtain instances
//! - [`LifecycleManager`] to reset caches
//!
//! [`ContainerProtocol`] is all three. The base traits are object safe;
//! the typed, generic API lives in the [`RegistrarExt`] and
//! [`ResolverExt`] extension traits, which every implementor gets for free.

use std::any::TypeId;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use tracing::debug;

use crate::builder::RegistrationBuilder;
use crate::error::{ContainerError, Result};
use crate::factory::{AsyncFactory, Factory};
use crate::instance::Instance;
use crate::key::TypeKey;
use crate::registry::Registration;

// ═══════════════════════════════════════════
// Registrar
// ═══════════════════════════════════════════

/// Adds and removes registrations.
pub trait Registrar: Send + Sync {
    /// Commits a registration, replacing any existing one for the same key
    /// and invalidating its cached instance.
    ///
    /// # Errors
    /// [`ContainerError::WeakUnsupported`] if the registration asks for weak
    /// retention of a product that is not reference counted.
    fn add_registration(&self, registration: Registration) -> Result<()>;

    /// Removes a registration and its cached instance. Returns `true` if
    /// something was removed.
    fn remove_registration(&self, key: &TypeKey) -> bool;

    fn is_registered(&self, key: &TypeKey) -> bool;
}

/// Typed registration API for every [`Registrar`].
pub trait RegistrarExt: Registrar {
    /// Starts a registration for `T`.
    ///
    /// ```rust,ignore
    /// container
    ///     .register::<Arc<ApiClient>>()
    ///     .named("sandbox")
    ///     .as_singleton()
    ///     .with(|ctx| Ok(Arc::new(ApiClient::new(ctx.resolve_sync()?))))?;
    /// ```
    fn register<T: Clone + Send + Sync + 'static>(&self) -> RegistrationBuilder<'_, T, Self> {
        RegistrationBuilder::new(self)
    }

    /// Like [`register`](RegistrarExt::register), but returns `None` when the
    /// slot is already taken.
    fn register_if_needed<T: Clone + Send + Sync + 'static>(
        &self,
        name: Option<&str>,
    ) -> Option<RegistrationBuilder<'_, T, Self>> {
        let key = TypeKey::new::<T>(name);
        if self.is_registered(&key) {
            debug!(key = %key, "Already registered, skipping");
            return None;
        }
        let builder = RegistrationBuilder::new(self);
        Some(match name {
            Some(name) => builder.named(name),
            None => builder,
        })
    }

    /// Removes the registration for `T` under `name`. Chainable.
    fn unregister<T: ?Sized + 'static>(&self, name: Option<&str>) -> &Self {
        self.remove_registration(&TypeKey::new::<T>(name));
        self
    }

    /// Registers a parameterized factory object as a singleton `Arc<F>`.
    ///
    /// Resolve products from it with [`ResolverExt::create`] or
    /// [`ResolverExt::create_async`].
    fn register_factory<F: Send + Sync + 'static>(&self, factory: F) -> Result<TypeKey> {
        let factory = Arc::new(factory);
        self.register::<Arc<F>>()
            .as_singleton()
            .with(move |_| Ok(factory.clone()))
    }
}

impl<R: Registrar + ?Sized> RegistrarExt for R {}

// ═══════════════════════════════════════════
// Resolver
// ═══════════════════════════════════════════

/// Produces type-erased instances for keys.
#[async_trait]
pub trait Resolver: Send + Sync {
    /// Resolves `key`, awaiting suspending factories.
    async fn resolve_key(&self, key: &TypeKey) -> Result<Instance>;

    /// Resolves `key` without suspending.
    ///
    /// Fails fast when a factory on the way is asynchronous, or when a
    /// singleton is being built by another task.
    fn resolve_key_sync(&self, key: &TypeKey) -> Result<Instance>;

    /// Every slot of the product type, unnamed first then by name.
    /// Slots that fail to resolve are skipped.
    async fn resolve_all_of(&self, type_id: TypeId) -> Vec<Instance>;
}

/// Typed resolution API for every [`Resolver`].
#[async_trait]
pub trait ResolverExt: Resolver {
    async fn resolve<T: Clone + Send + Sync + 'static>(&self) -> Result<T> {
        let key = TypeKey::of::<T>();
        self.resolve_key(&key).await?.cast(&key)
    }

    async fn resolve_named<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Result<T> {
        let key = TypeKey::named::<T>(name);
        self.resolve_key(&key).await?.cast(&key)
    }

    fn resolve_sync<T: Clone + Send + Sync + 'static>(&self) -> Result<T> {
        let key = TypeKey::of::<T>();
        self.resolve_key_sync(&key)?.cast(&key)
    }

    fn resolve_named_sync<T: Clone + Send + Sync + 'static>(&self, name: &str) -> Result<T> {
        let key = TypeKey::named::<T>(name);
        self.resolve_key_sync(&key)?.cast(&key)
    }

    /// Every registered `T`, best effort. Entries that fail to build, or
    /// that hold a different type, are left out.
    async fn resolve_all<T: Clone + Send + Sync + 'static>(&self) -> Vec<T> {
        self.resolve_all_of(TypeId::of::<T>())
            .await
            .iter()
            .filter_map(|instance| instance.downcast_ref::<T>().cloned())
            .collect()
    }

    /// Resolves the named `T` slots concurrently, in request order.
    /// Fails on the first error.
    async fn resolve_batch<T: Clone + Send + Sync + 'static>(
        &self,
        names: &[&str],
    ) -> Result<Vec<T>> {
        try_join_all(names.iter().map(|name| self.resolve_named::<T>(name))).await
    }

    /// Builds a product with a registered [`Factory`].
    async fn create<F: Factory>(&self, params: F::Params) -> Result<F::Product> {
        let factory = self.resolve::<Arc<F>>().await?;
        Factory::create(&*factory, params)
            .map_err(|error| ContainerError::from_factory(&factory_key::<F>(), error))
    }

    /// Builds a product with a registered [`AsyncFactory`].
    async fn create_async<F: AsyncFactory>(&self, params: F::Params) -> Result<F::Product> {
        let factory = self.resolve::<Arc<F>>().await?;
        AsyncFactory::create(&*factory, params)
            .await
            .map_err(|error| ContainerError::from_factory(&factory_key::<F>(), error))
    }
}

impl<R: Resolver + ?Sized> ResolverExt for R {}

fn factory_key<F: 'static>() -> TypeKey {
    TypeKey::of::<Arc<F>>()
}

// ═══════════════════════════════════════════
// LifecycleManager
// ═══════════════════════════════════════════

/// Clears cached instances.
#[async_trait]
pub trait LifecycleManager: Send + Sync {
    /// Drops singleton and weak caches for every product type not in
    /// `ignoring`. Registrations are kept, so the next resolution rebuilds.
    async fn reset(&self, ignoring: &[TypeId]);
}

/// Registrar, resolver and lifecycle manager in one.
pub trait ContainerProtocol: Registrar + Resolver + LifecycleManager {}

impl<C: Registrar + Resolver + LifecycleManager + ?Sized> ContainerProtocol for C {}
