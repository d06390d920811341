//! # The Container
//!
//! Holds registrations, caches instances per retention policy and runs the
//! resolution algorithm.
//!
//! # Architecture
//! ```text
//! RegistrationBuilder ──with()──> Registry (TypeKey → Registration)
//!                                    │
//!                      resolve / resolve_sync
//!                                    │
//!              ┌─────────────────────┼──────────────────────┐
//!              ▼                     ▼                      ▼
//!     Singleton: OnceCell      Transient: factory     Weak: WeakInstance
//!     (single flight)          every time             (liveness check)
//! ```
//!
//! # Examples
//! ```rust
//! use std::sync::Arc;
//! use tether_container::prelude::*;
//!
//! struct Settings {
//!     base_url: String,
//! }
//!
//! struct ApiClient {
//!     settings: Arc<Settings>,
//! }
//!
//! # tokio_test();
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn tokio_test() {
//! let container = Container::new();
//! container
//!     .register::<Arc<Settings>>()
//!     .as_singleton()
//!     .with_value(Arc::new(Settings { base_url: "https://api.example.com".into() }))
//!     .unwrap();
//! container
//!     .register::<Arc<ApiClient>>()
//!     .as_singleton()
//!     .with_async(|ctx| async move {
//!         let settings: Arc<Settings> = ctx.resolve().await?;
//!         Ok(Arc::new(ApiClient { settings }))
//!     })
//!     .unwrap();
//!
//! let client: Arc<ApiClient> = container.resolve().await.unwrap();
//! assert_eq!(client.settings.base_url, "https://api.example.com");
//! # }
//! ```

use std::any::TypeId;
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use dashmap::DashSet;
use futures::FutureExt;
use parking_lot::{Mutex, RwLock};
use tether_support::rendering::{render_path, suggest_similar};
use tracing::{debug, instrument, trace, warn};

use crate::cache::InstanceCache;
use crate::capability::{LifecycleManager, Registrar, Resolver};
use crate::config::ContainerConfig;
use crate::context::{FactoryContext, ResolutionPath};
use crate::error::{ContainerError, Result, SyncResolutionError};
use crate::instance::Instance;
use crate::key::TypeKey;
use crate::policy::RetentionPolicy;
use crate::provider::Provider;
use crate::registry::{FactoryFn, Registration, Registry};

const MAX_RECORDED_CYCLES: usize = 16;

/// Whether a resolution was served from a cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CacheOutcome {
    Hit,
    Miss,
}

pub(crate) struct Resolved {
    pub instance: Instance,
    pub outcome: CacheOutcome,
}

impl Resolved {
    fn hit(instance: Instance) -> Self {
        Self {
            instance,
            outcome: CacheOutcome::Hit,
        }
    }

    fn miss(instance: Instance) -> Self {
        Self {
            instance,
            outcome: CacheOutcome::Miss,
        }
    }
}

// ═══════════════════════════════════════════
// Resolution statistics (feed the health check)
// ═══════════════════════════════════════════

#[derive(Default)]
pub(crate) struct ResolutionStats {
    max_depth: AtomicUsize,
    deepest: Mutex<Vec<TypeKey>>,
    cycles: Mutex<Vec<Vec<TypeKey>>>,
    resolved: DashSet<TypeKey>,
}

impl ResolutionStats {
    fn observe_path(&self, path: &ResolutionPath) {
        if path.depth() <= self.max_depth.load(Ordering::Relaxed) {
            return;
        }
        let mut deepest = self.deepest.lock();
        if path.depth() > deepest.len() {
            *deepest = path.keys();
            self.max_depth.store(path.depth(), Ordering::Relaxed);
        }
    }

    fn record_cycle(&self, path: &[TypeKey]) {
        let mut cycles = self.cycles.lock();
        if cycles.len() < MAX_RECORDED_CYCLES && !cycles.iter().any(|known| known == path) {
            cycles.push(path.to_vec());
        }
    }

    /// Drops everything recorded about `key`: its resolved mark, the cycles
    /// it took part in and the deepest path if it ran through it.
    fn forget(&self, key: &TypeKey) {
        self.resolved.remove(key);
        self.cycles.lock().retain(|cycle| !cycle.contains(key));
        let mut deepest = self.deepest.lock();
        if deepest.contains(key) {
            deepest.clear();
            self.max_depth.store(0, Ordering::Relaxed);
        }
    }

    /// Drops recorded cycles and the deepest path.
    fn clear_paths(&self) {
        self.cycles.lock().clear();
        self.deepest.lock().clear();
        self.max_depth.store(0, Ordering::Relaxed);
    }

    pub fn deepest_path(&self) -> Vec<TypeKey> {
        self.deepest.lock().clone()
    }

    pub fn cycles(&self) -> Vec<Vec<TypeKey>> {
        self.cycles.lock().clone()
    }

    pub fn was_resolved(&self, key: &TypeKey) -> bool {
        self.resolved.contains(key)
    }
}

// ═══════════════════════════════════════════
// Container
// ═══════════════════════════════════════════

pub(crate) struct ContainerInner {
    pub config: ContainerConfig,
    pub registry: RwLock<Registry>,
    pub cache: InstanceCache,
    pub stats: ResolutionStats,
}

/// A dependency container.
///
/// `Container` is a cheap, cloneable handle: clones share registrations and
/// caches. Every container starts empty; there is no implicit global one
/// (see [`scoped`](crate::scoped) for the process-wide registry).
#[derive(Clone)]
pub struct Container {
    pub(crate) inner: Arc<ContainerInner>,
}

impl Container {
    /// Creates an empty container with the default configuration.
    pub fn new() -> Self {
        Self::with_config(ContainerConfig::default())
    }

    pub fn with_config(config: ContainerConfig) -> Self {
        Self {
            inner: Arc::new(ContainerInner {
                config,
                registry: RwLock::new(Registry::new()),
                cache: InstanceCache::new(),
                stats: ResolutionStats::default(),
            }),
        }
    }

    pub fn config(&self) -> &ContainerConfig {
        &self.inner.config
    }

    /// Returns `true` if both handles point at the same container.
    pub fn ptr_eq(&self, other: &Container) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.inner.registry.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Registered keys, sorted by their short display form.
    pub fn registered_keys(&self) -> Vec<TypeKey> {
        self.inner.registry.read().keys()
    }

    /// Lets a [`Provider`] register its group of dependencies.
    pub fn install(&self, provider: &dyn Provider) -> Result<()> {
        debug!(provider = provider.name(), "Installing provider");
        provider.register(self)
    }

    /// Drops singleton and weak caches, keeping product types in `ignoring`,
    /// and forgets recorded cycles and depths. Registrations survive.
    /// Returns how many cache entries were dropped.
    pub fn clear_cache(&self, ignoring: &[TypeId]) -> usize {
        let dropped = self
            .inner
            .cache
            .clear_except(|key| ignoring.contains(&key.type_id()));
        self.inner.stats.clear_paths();
        debug!(dropped, preserved_types = ignoring.len(), "Reset container caches");
        dropped
    }

    pub(crate) fn keys_of(&self, type_id: TypeId) -> Vec<TypeKey> {
        self.inner.registry.read().keys_of(type_id)
    }

    // ── Resolution ──

    /// Resolves `key` below `parent`, reporting whether a cache served it.
    #[instrument(level = "trace", name = "resolve", skip_all, fields(key = %key, depth = parent.depth()))]
    pub(crate) async fn resolve_traced(
        &self,
        key: &TypeKey,
        parent: &ResolutionPath,
    ) -> Result<Resolved> {
        let registration = self.lookup(key)?;
        let path = self.enter(key, parent)?;
        let generation = registration.generation();

        let resolved = match registration.policy() {
            RetentionPolicy::Singleton => {
                let cell = self.inner.cache.singleton_cell(key, generation);
                if let Some(instance) = cell.get() {
                    trace!("Singleton cache hit");
                    Resolved::hit(instance.clone())
                } else {
                    let mut built = false;
                    let instance = cell
                        .get_or_try_init(|| {
                            built = true;
                            self.construct(&registration, path)
                        })
                        .await?
                        .clone();
                    if built {
                        Resolved::miss(instance)
                    } else {
                        trace!("Joined in-flight singleton construction");
                        Resolved::hit(instance)
                    }
                }
            }
            RetentionPolicy::Transient => Resolved::miss(self.construct(&registration, path).await?),
            RetentionPolicy::Weak => {
                let live = self.inner.cache.live_weak(key, generation);
                match live {
                    Some(instance) => {
                        trace!("Weak reference still alive");
                        Resolved::hit(instance)
                    }
                    None => {
                        let instance = self.construct(&registration, path).await?;
                        Resolved::miss(self.retain_weak(&registration, instance)?)
                    }
                }
            }
        };

        self.inner.stats.resolved.insert(key.clone());
        Ok(resolved)
    }

    /// Synchronous counterpart of [`resolve_traced`](Self::resolve_traced).
    ///
    /// Cached instances are returned whatever their factory kind. Building
    /// fails fast if the factory is asynchronous or if another task is
    /// already building the singleton.
    pub(crate) fn resolve_traced_sync(
        &self,
        key: &TypeKey,
        parent: &ResolutionPath,
    ) -> Result<Resolved> {
        let registration = self.lookup(key)?;
        let path = self.enter(key, parent)?;
        let generation = registration.generation();
        trace!(key = %key, depth = path.depth(), "Resolving synchronously");

        let resolved = match registration.policy() {
            RetentionPolicy::Singleton => {
                let cell = self.inner.cache.singleton_cell(key, generation);
                if let Some(instance) = cell.get() {
                    Resolved::hit(instance.clone())
                } else {
                    let mut built = false;
                    let init = cell.get_or_try_init(|| {
                        built = true;
                        let produced = self.construct_sync(&registration, path);
                        async move { produced }
                    });
                    // The init future completes on its first poll unless another
                    // task holds the cell's permit.
                    let Some(result) = tokio::task::unconstrained(init).now_or_never() else {
                        return Err(sync_failure(key, SyncResolutionError::ConstructionInFlight));
                    };
                    let instance = result?.clone();
                    if built {
                        Resolved::miss(instance)
                    } else {
                        Resolved::hit(instance)
                    }
                }
            }
            RetentionPolicy::Transient => Resolved::miss(self.construct_sync(&registration, path)?),
            RetentionPolicy::Weak => match self.inner.cache.live_weak(key, generation) {
                Some(instance) => Resolved::hit(instance),
                None => {
                    let instance = self.construct_sync(&registration, path)?;
                    Resolved::miss(self.retain_weak(&registration, instance)?)
                }
            },
        };

        self.inner.stats.resolved.insert(key.clone());
        Ok(resolved)
    }

    /// Resolves every slot of a product type, skipping failures.
    pub(crate) async fn resolve_all_traced(
        &self,
        type_id: TypeId,
        parent: &ResolutionPath,
    ) -> Vec<Instance> {
        let mut instances = Vec::new();
        for key in self.keys_of(type_id) {
            match self.resolve_traced(&key, parent).await {
                Ok(resolved) => instances.push(resolved.instance),
                Err(error) => warn!(key = %key, error = %error, "Skipping slot in resolve_all"),
            }
        }
        instances
    }

    fn lookup(&self, key: &TypeKey) -> Result<Registration> {
        let registration = self.inner.registry.read().get(key).cloned();
        registration.ok_or_else(|| self.not_registered(key))
    }

    fn not_registered(&self, key: &TypeKey) -> ContainerError {
        let candidates: Vec<String> = self
            .registered_keys()
            .iter()
            .map(TypeKey::short_name)
            .collect();
        let suggestions = suggest_similar(
            &key.short_name(),
            &candidates,
            self.inner.config.max_suggestions,
        );
        debug!(key = %key, suggestions = suggestions.len(), "Dependency not registered");
        ContainerError::DependencyNotRegistered {
            key: key.clone(),
            suggestions,
        }
    }

    /// Cycle check, then extends the path with `key`.
    fn enter(&self, key: &TypeKey, parent: &ResolutionPath) -> Result<ResolutionPath> {
        if parent.contains(key) {
            let mut path = parent.keys();
            path.push(key.clone());
            let rendered: Vec<String> = path.iter().map(TypeKey::short_name).collect();
            warn!(key = %key, path = %render_path(&rendered), "Circular dependency detected");
            self.inner.stats.record_cycle(&path);
            return Err(ContainerError::CircularDependency {
                key: key.clone(),
                path,
            });
        }
        let path = parent.push(key.clone());
        self.inner.stats.observe_path(&path);
        Ok(path)
    }

    async fn construct(&self, registration: &Registration, path: ResolutionPath) -> Result<Instance> {
        let key = registration.key();
        trace!(key = %key, policy = %registration.policy(), "Invoking factory");
        let context = FactoryContext::new(self.clone(), path);
        let produced = match registration.factory() {
            FactoryFn::Sync(factory) => factory(&context),
            FactoryFn::Async(factory) => factory(context).await,
        };
        produced.map_err(|error| ContainerError::from_factory(key, error))
    }

    fn construct_sync(&self, registration: &Registration, path: ResolutionPath) -> Result<Instance> {
        let key = registration.key();
        let FactoryFn::Sync(factory) = registration.factory() else {
            return Err(sync_failure(key, SyncResolutionError::AsyncFactory));
        };
        trace!(key = %key, policy = %registration.policy(), "Invoking factory");
        let context = FactoryContext::new(self.clone(), path);
        factory(&context).map_err(|error| ContainerError::from_factory(key, error))
    }

    fn retain_weak(&self, registration: &Registration, instance: Instance) -> Result<Instance> {
        let key = registration.key();
        let handle = registration.downgrade(&instance)?;
        Ok(self
            .inner
            .cache
            .store_weak(key, registration.generation(), handle, instance))
    }
}

fn sync_failure(key: &TypeKey, cause: SyncResolutionError) -> ContainerError {
    ContainerError::FactoryFailed {
        key: key.clone(),
        source: Box::new(cause),
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("registered", &self.len())
            .field("singletons", &self.inner.cache.built_singletons())
            .finish()
    }
}

// ═══════════════════════════════════════════
// Capabilities
// ═══════════════════════════════════════════

impl Registrar for Container {
    fn add_registration(&self, registration: Registration) -> Result<()> {
        let key = registration.key().clone();
        let policy = registration.policy();
        if policy == RetentionPolicy::Weak && !registration.supports_weak() {
            warn!(key = %key, "Weak retention requested for a product that is not an Arc");
            return Err(ContainerError::WeakUnsupported { key });
        }

        // Invalidate under the write lock so no resolver can pair the new
        // registration with the old cached instance.
        let mut registry = self.inner.registry.write();
        let replaced = registry.insert(registration).is_some();
        self.inner.cache.invalidate(&key);
        self.inner.stats.forget(&key);
        drop(registry);

        debug!(key = %key, policy = %policy, replaced, "Registered dependency");
        Ok(())
    }

    fn remove_registration(&self, key: &TypeKey) -> bool {
        let mut registry = self.inner.registry.write();
        let removed = registry.remove(key).is_some();
        self.inner.cache.invalidate(key);
        self.inner.stats.forget(key);
        drop(registry);

        if removed {
            debug!(key = %key, "Unregistered dependency");
        }
        removed
    }

    fn is_registered(&self, key: &TypeKey) -> bool {
        self.inner.registry.read().contains(key)
    }
}

#[async_trait]
impl Resolver for Container {
    async fn resolve_key(&self, key: &TypeKey) -> Result<Instance> {
        let root = ResolutionPath::root();
        let resolved = self.resolve_traced(key, &root).await?;
        Ok(resolved.instance)
    }

    fn resolve_key_sync(&self, key: &TypeKey) -> Result<Instance> {
        let resolved = self.resolve_traced_sync(key, &ResolutionPath::root())?;
        Ok(resolved.instance)
    }

    async fn resolve_all_of(&self, type_id: TypeId) -> Vec<Instance> {
        let root = ResolutionPath::root();
        self.resolve_all_traced(type_id, &root).await
    }
}

#[async_trait]
impl LifecycleManager for Container {
    async fn reset(&self, ignoring: &[TypeId]) {
        self.clear_cache(ignoring);
    }
}

// ═══════════════════════════════════════════
// Prelude
// ═══════════════════════════════════════════

pub mod prelude {
    pub use super::Container;
    pub use crate::builder::RegistrationBuilder;
    pub use crate::capability::{
        ContainerProtocol, LifecycleManager, Registrar, RegistrarExt, Resolver, ResolverExt,
    };
    pub use crate::config::ContainerConfig;
    pub use crate::context::FactoryContext;
    pub use crate::error::{ContainerError, FactoryResult, Result};
    pub use crate::factory::{AsyncFactory, Factory};
    pub use crate::instrumented::InstrumentedContainer;
    pub use crate::key::TypeKey;
    pub use crate::policy::RetentionPolicy;
    pub use crate::provider::Provider;
    pub use crate::scope::DependencyScope;
}

// ═══════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════
