//! Fluent registration builder.
//!
//! ```rust,ignore
//! container
//!     .register::<Arc<dyn PaymentGateway>>()
//!     .named("adyen")
//!     .as_singleton()
//!     .with_async(|ctx| async move {
//!         let settings: Arc<Settings> = ctx.resolve().await?;
//!         Ok(Arc::new(AdyenGateway::connect(&settings).await?) as Arc<dyn PaymentGateway>)
//!     })?;
//! ```
//!
//! Nothing touches the container until a terminal method (`with`,
//! `with_async`, `with_value`) commits the registration.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::capability::Registrar;
use crate::context::FactoryContext;
use crate::error::{FactoryResult, Result};
use crate::instance::downgrade_arc;
use crate::key::TypeKey;
use crate::policy::RetentionPolicy;
use crate::registry::{DowngradeFn, FactoryFn, Registration};

/// Collects name, policy and factory for a product `T`, then commits.
///
/// The default policy is [`RetentionPolicy::Transient`].
#[must_use = "a registration is only committed by `with`, `with_async` or `with_value`"]
pub struct RegistrationBuilder<'a, T, R: Registrar + ?Sized> {
    registrar: &'a R,
    name: Option<Arc<str>>,
    policy: RetentionPolicy,
    downgrade: Option<DowngradeFn>,
    product: PhantomData<fn() -> T>,
}

impl<'a, T, R> RegistrationBuilder<'a, T, R>
where
    T: Clone + Send + Sync + 'static,
    R: Registrar + ?Sized,
{
    pub(crate) fn new(registrar: &'a R) -> Self {
        Self {
            registrar,
            name: None,
            policy: RetentionPolicy::default(),
            downgrade: None,
            product: PhantomData,
        }
    }

    /// Registers under a name instead of the unnamed slot.
    pub fn named(mut self, name: impl Into<Arc<str>>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn as_singleton(mut self) -> Self {
        self.policy = RetentionPolicy::Singleton;
        self
    }

    pub fn as_transient(mut self) -> Self {
        self.policy = RetentionPolicy::Transient;
        self
    }

    /// The key this builder will commit to.
    pub fn key(&self) -> TypeKey {
        match &self.name {
            Some(name) => TypeKey::named::<T>(name.clone()),
            None => TypeKey::of::<T>(),
        }
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    /// Commits a synchronous factory.
    pub fn with<F>(self, factory: F) -> Result<TypeKey>
    where
        F: Fn(&FactoryContext) -> FactoryResult<T> + Send + Sync + 'static,
    {
        self.commit(FactoryFn::from_sync(factory))
    }

    /// Commits a suspending factory.
    pub fn with_async<F, Fut>(self, factory: F) -> Result<TypeKey>
    where
        F: Fn(FactoryContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FactoryResult<T>> + Send + 'static,
    {
        self.commit(FactoryFn::from_async(factory))
    }

    /// Commits a prebuilt value; every construction hands out a clone.
    pub fn with_value(self, value: T) -> Result<TypeKey> {
        self.with(move |_| Ok(value.clone()))
    }

    fn commit(self, factory: FactoryFn) -> Result<TypeKey> {
        let key = self.key();
        let registration =
            Registration::new(key.clone(), self.policy, factory).with_downgrade(self.downgrade);
        self.registrar.add_registration(registration)?;
        Ok(key)
    }
}

impl<T, R> RegistrationBuilder<'_, Arc<T>, R>
where
    T: ?Sized + Send + Sync + 'static,
    R: Registrar + ?Sized,
{
    /// Retains the product weakly: the container hands out the same `Arc`
    /// while anyone else holds it, and builds a new one once all are gone.
    ///
    /// Only available for `Arc` products.
    pub fn as_weak(mut self) -> Self {
        self.policy = RetentionPolicy::Weak;
        self.downgrade = Some(Arc::new(downgrade_arc::<T>));
        self
    }
}

impl<T, R: Registrar + ?Sized> fmt::Debug for RegistrationBuilder<'_, T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistrationBuilder")
            .field("product", &std::any::type_name::<T>())
            .field("name", &self.name)
            .field("policy", &self.policy)
            .finish()
    }
}
