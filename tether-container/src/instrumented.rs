//! A container wrapper that records resolution metrics.
//!
//! Only top-level resolutions made through the wrapper are timed; what a
//! factory resolves through its [`FactoryContext`](crate::context::FactoryContext)
//! is part of the parent's sample.

use std::any::TypeId;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::warn;

use crate::capability::{LifecycleManager, Registrar, Resolver};
use crate::container::{CacheOutcome, Container, Resolved};
use crate::context::ResolutionPath;
use crate::error::Result;
use crate::instance::Instance;
use crate::key::TypeKey;
use crate::metrics::{ContainerMetrics, MetricsReport};
use crate::registry::Registration;

/// Wraps a [`Container`] and records duration and cache outcome of every
/// resolution, failed ones included. Resolution semantics are unchanged.
///
/// A sample is taken once the container hands back the erased instance.
/// The typed cast happens after that, so a resolution that ends in
/// [`TypeCastFailed`](crate::error::ContainerError::TypeCastFailed) still
/// counts with the cache outcome of the lookup behind it.
///
/// Recording is off when the container's config has `metrics_enabled`
/// set to `false`.
#[derive(Debug, Clone)]
pub struct InstrumentedContainer {
    container: Container,
    metrics: Option<Arc<ContainerMetrics>>,
}

impl InstrumentedContainer {
    pub fn new(container: Container) -> Self {
        let metrics = container
            .config()
            .metrics_enabled
            .then(|| Arc::new(ContainerMetrics::new(container.config())));
        Self { container, metrics }
    }

    /// The wrapped container. Resolutions made on it directly are not recorded.
    pub fn container(&self) -> &Container {
        &self.container
    }

    pub fn metrics(&self) -> Option<&ContainerMetrics> {
        self.metrics.as_deref()
    }

    /// A report of everything recorded so far, or `None` when disabled.
    pub fn performance_metrics(&self) -> Option<MetricsReport> {
        self.metrics.as_ref().map(|metrics| metrics.report())
    }

    fn record(&self, key: &TypeKey, started: Instant, outcome: &Result<Resolved>) {
        let Some(metrics) = &self.metrics else {
            return;
        };
        metrics.record_resolution(key, started.elapsed());
        match outcome {
            Ok(Resolved {
                outcome: CacheOutcome::Hit,
                ..
            }) => metrics.record_cache_hit(key),
            Ok(Resolved {
                outcome: CacheOutcome::Miss,
                ..
            }) => metrics.record_cache_miss(key),
            Err(_) => {}
        }
    }
}

impl From<Container> for InstrumentedContainer {
    fn from(container: Container) -> Self {
        Self::new(container)
    }
}

impl Registrar for InstrumentedContainer {
    fn add_registration(&self, registration: Registration) -> Result<()> {
        self.container.add_registration(registration)?;
        if let Some(metrics) = &self.metrics {
            metrics.record_registration();
        }
        Ok(())
    }

    fn remove_registration(&self, key: &TypeKey) -> bool {
        self.container.remove_registration(key)
    }

    fn is_registered(&self, key: &TypeKey) -> bool {
        self.container.is_registered(key)
    }
}

#[async_trait]
impl Resolver for InstrumentedContainer {
    async fn resolve_key(&self, key: &TypeKey) -> Result<Instance> {
        let started = Instant::now();
        let root = ResolutionPath::root();
        let outcome = self.container.resolve_traced(key, &root).await;
        self.record(key, started, &outcome);
        Ok(outcome?.instance)
    }

    fn resolve_key_sync(&self, key: &TypeKey) -> Result<Instance> {
        let started = Instant::now();
        let outcome = self
            .container
            .resolve_traced_sync(key, &ResolutionPath::root());
        self.record(key, started, &outcome);
        Ok(outcome?.instance)
    }

    async fn resolve_all_of(&self, type_id: TypeId) -> Vec<Instance> {
        let mut instances = Vec::new();
        for key in self.container.keys_of(type_id) {
            match self.resolve_key(&key).await {
                Ok(instance) => instances.push(instance),
                Err(error) => warn!(key = %key, error = %error, "Skipping slot in resolve_all"),
            }
        }
        instances
    }
}

#[async_trait]
impl LifecycleManager for InstrumentedContainer {
    async fn reset(&self, ignoring: &[TypeId]) {
        self.container.reset(ignoring).await;
    }
}
