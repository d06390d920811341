//! Registrations and the registry that stores them.
//!
//! The registry maps a [`TypeKey`] to the [`Registration`] that knows how
//! to build it. Registering a key again replaces the previous entry.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;

use crate::context::FactoryContext;
use crate::error::{ContainerError, FactoryResult, Result};
use crate::instance::{Instance, WeakInstance, downgrade_arc};
use crate::key::TypeKey;
use crate::policy::RetentionPolicy;

pub type SyncFactoryFn = Arc<dyn Fn(&FactoryContext) -> FactoryResult<Instance> + Send + Sync>;

pub type AsyncFactoryFn =
    Arc<dyn Fn(FactoryContext) -> BoxFuture<'static, FactoryResult<Instance>> + Send + Sync>;

/// Takes a weak handle, or returns the expected product type name.
pub(crate) type DowngradeFn =
    Arc<dyn Fn(&Instance) -> std::result::Result<WeakInstance, &'static str> + Send + Sync>;

/// A type-erased factory, either synchronous or suspending.
///
/// Factories receive a [`FactoryContext`] and resolve their own
/// dependencies through it.
#[derive(Clone)]
pub enum FactoryFn {
    Sync(SyncFactoryFn),
    Async(AsyncFactoryFn),
}

impl FactoryFn {
    /// Wraps a synchronous factory producing `T`.
    pub fn from_sync<T, F>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(&FactoryContext) -> FactoryResult<T> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(move |context: &FactoryContext| {
            factory(context).map(Instance::new)
        }))
    }

    /// Wraps a suspending factory producing `T`.
    pub fn from_async<T, F, Fut>(factory: F) -> Self
    where
        T: Send + Sync + 'static,
        F: Fn(FactoryContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = FactoryResult<T>> + Send + 'static,
    {
        Self::Async(Arc::new(move |context: FactoryContext| {
            factory(context).map(|produced| produced.map(Instance::new)).boxed()
        }))
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Self::Async(_))
    }
}

impl fmt::Debug for FactoryFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => write!(f, "FactoryFn::Sync"),
            Self::Async(_) => write!(f, "FactoryFn::Async"),
        }
    }
}

/// One slot's key, retention policy and factory.
///
/// Most code registers through
/// [`RegistrationBuilder`](crate::builder::RegistrationBuilder); providers
/// that choose a policy at runtime can build a `Registration` directly.
#[derive(Clone)]
pub struct Registration {
    key: TypeKey,
    policy: RetentionPolicy,
    factory: FactoryFn,
    downgrade: Option<DowngradeFn>,
    generation: u64,
}

impl Registration {
    pub fn new(key: TypeKey, policy: RetentionPolicy, factory: FactoryFn) -> Self {
        Self {
            key,
            policy,
            factory,
            downgrade: None,
            generation: 0,
        }
    }

    /// Marks the product as `Arc<U>` so the slot can be retained weakly.
    ///
    /// Without this, committing a [`RetentionPolicy::Weak`] registration
    /// fails with [`ContainerError::WeakUnsupported`](crate::error::ContainerError::WeakUnsupported).
    pub fn weakly_retainable<U: ?Sized + Send + Sync + 'static>(mut self) -> Self {
        self.downgrade = Some(Arc::new(downgrade_arc::<U>));
        self
    }

    pub(crate) fn with_downgrade(mut self, downgrade: Option<DowngradeFn>) -> Self {
        self.downgrade = downgrade;
        self
    }

    pub fn key(&self) -> &TypeKey {
        &self.key
    }

    pub fn policy(&self) -> RetentionPolicy {
        self.policy
    }

    pub fn factory(&self) -> &FactoryFn {
        &self.factory
    }

    /// Whether a weak handle can be taken from this slot's instances.
    pub fn supports_weak(&self) -> bool {
        self.downgrade.is_some()
    }

    /// A weak handle on `instance`.
    ///
    /// Fails with `WeakUnsupported` when the slot has no downgrade hook, and
    /// with `TypeCastFailed` when the factory produced another type.
    pub(crate) fn downgrade(&self, instance: &Instance) -> Result<WeakInstance> {
        let Some(downgrade) = &self.downgrade else {
            return Err(ContainerError::WeakUnsupported {
                key: self.key.clone(),
            });
        };
        downgrade(instance).map_err(|expected| ContainerError::TypeCastFailed {
            key: self.key.clone(),
            expected,
            actual: instance.type_name(),
        })
    }

    pub(crate) fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Debug for Registration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registration")
            .field("key", &self.key)
            .field("policy", &self.policy)
            .field("factory", &self.factory)
            .field("generation", &self.generation)
            .finish()
    }
}

/// Stores the registrations of one container.
///
/// Each insert stamps the registration with a fresh generation so caches
/// can tell a replaced slot from the current one.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    registrations: HashMap<TypeKey, Registration>,
    next_generation: u64,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a registration, returning the one it replaced.
    pub fn insert(&mut self, mut registration: Registration) -> Option<Registration> {
        self.next_generation += 1;
        registration.generation = self.next_generation;
        self.registrations
            .insert(registration.key.clone(), registration)
    }

    pub fn remove(&mut self, key: &TypeKey) -> Option<Registration> {
        self.registrations.remove(key)
    }

    pub fn get(&self, key: &TypeKey) -> Option<&Registration> {
        self.registrations.get(key)
    }

    pub fn contains(&self, key: &TypeKey) -> bool {
        self.registrations.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn keys(&self) -> Vec<TypeKey> {
        let mut keys: Vec<_> = self.registrations.keys().cloned().collect();
        keys.sort_by_key(TypeKey::short_name);
        keys
    }

    /// Every key whose product type is `type_id`; the unnamed slot first,
    /// then by name.
    pub fn keys_of(&self, type_id: TypeId) -> Vec<TypeKey> {
        let mut keys: Vec<_> = self
            .registrations
            .keys()
            .filter(|key| key.type_id() == type_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| a.name().cmp(&b.name()));
        keys
    }
}
