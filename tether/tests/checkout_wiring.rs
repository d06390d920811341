use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tether::diagnostics::HealthStatus;
use tether::prelude::*;
use tether::scoped::ScopedRegistry;

trait PaymentMethod: Send + Sync {
    fn code(&self) -> &'static str;
}

struct Card;
struct Wallet;

impl PaymentMethod for Card {
    fn code(&self) -> &'static str {
        "card"
    }
}

impl PaymentMethod for Wallet {
    fn code(&self) -> &'static str {
        "wallet"
    }
}

struct Inventory {
    connections: Arc<AtomicUsize>,
}

struct Checkout {
    inventory: Arc<Inventory>,
    methods: Vec<Arc<dyn PaymentMethod>>,
}

struct HandlerFactory;

impl Factory for HandlerFactory {
    type Params = &'static str;
    type Product = String;

    fn create(&self, method: &'static str) -> FactoryResult<String> {
        Ok(format!("handler:{method}"))
    }
}

struct CheckoutModule {
    connections: Arc<AtomicUsize>,
}

impl Provider for CheckoutModule {
    fn register(&self, registrar: &dyn Registrar) -> Result<()> {
        let connections = self.connections.clone();
        registrar
            .register::<Arc<Inventory>>()
            .as_singleton()
            .with_async(move |_| {
                let connections = connections.clone();
                async move {
                    connections.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(20)).await;
                    Ok(Arc::new(Inventory { connections }))
                }
            })?;
        registrar
            .register::<Arc<dyn PaymentMethod>>()
            .named("card")
            .with(|_| Ok(Arc::new(Card) as Arc<dyn PaymentMethod>))?;
        registrar
            .register::<Arc<dyn PaymentMethod>>()
            .named("wallet")
            .with(|_| Ok(Arc::new(Wallet) as Arc<dyn PaymentMethod>))?;
        registrar
            .register::<Arc<Checkout>>()
            .with_async(|ctx| async move {
                Ok(Arc::new(Checkout {
                    inventory: ctx.resolve().await?,
                    methods: ctx.resolve_all().await,
                }))
            })?;
        registrar.register_factory(HandlerFactory)?;
        Ok(())
    }
}

fn wired() -> (Container, Arc<AtomicUsize>) {
    let connections = Arc::new(AtomicUsize::new(0));
    let container = Container::new();
    container
        .install(&CheckoutModule {
            connections: connections.clone(),
        })
        .unwrap();
    (container, connections)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_checkouts_share_one_inventory() {
    let (container, connections) = wired();

    let tasks: Vec<_> = (0..16)
        .map(|_| {
            let container = container.clone();
            tokio::spawn(async move { container.resolve::<Arc<Checkout>>().await })
        })
        .collect();

    let mut checkouts = Vec::new();
    for task in tasks {
        checkouts.push(task.await.unwrap().unwrap());
    }

    assert_eq!(connections.load(Ordering::SeqCst), 1);
    assert!(
        checkouts
            .iter()
            .all(|c| Arc::ptr_eq(&c.inventory, &checkouts[0].inventory))
    );
    assert_eq!(checkouts[0].inventory.connections.load(Ordering::SeqCst), 1);
    let codes: Vec<_> = checkouts[0].methods.iter().map(|m| m.code()).collect();
    assert_eq!(codes, vec!["card", "wallet"]);
}

#[tokio::test]
async fn parameterized_factory_and_batch() {
    let (container, _) = wired();

    assert_eq!(
        container.create::<HandlerFactory>("card").await.unwrap(),
        "handler:card"
    );
    let methods: Vec<Arc<dyn PaymentMethod>> = container
        .resolve_batch(&["wallet", "card"])
        .await
        .unwrap();
    assert_eq!(methods[0].code(), "wallet");
    assert_eq!(methods[1].code(), "card");
}

#[tokio::test]
async fn instrumented_container_reports_and_stays_healthy() {
    let (container, _) = wired();
    let instrumented = InstrumentedContainer::new(container.clone());

    for _ in 0..3 {
        let _: Arc<Checkout> = instrumented.resolve().await.unwrap();
    }
    let _: Arc<HandlerFactory> = instrumented.resolve().await.unwrap();
    let report = instrumented.performance_metrics().unwrap();
    assert_eq!(report.total_resolutions, 4);
    assert!(report.to_string().contains("Container Performance Metrics"));

    let health = container.health_check();
    assert_eq!(health.status, HealthStatus::Healthy, "{health}");
    assert_eq!(container.diagnostics().singleton_instances, 2);
}

struct PromoScope;

#[async_trait]
impl DependencyScope for PromoScope {
    fn scope_id(&self) -> &str {
        "promo"
    }

    fn setup_container(&self, container: &Container) -> Result<()> {
        container.register::<u32>().named("discount").with_value(15)?;
        Ok(())
    }
}

#[tokio::test]
async fn scope_in_local_registry() {
    let registry = ScopedRegistry::new();
    PromoScope.register_in(&registry).unwrap();

    let discount = PromoScope
        .with_scope_container(&registry, |container| async move {
            container.resolve_named::<u32>("discount").await
        })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(discount, 15);

    PromoScope.unregister_from(&registry).await;
    assert!(matches!(
        PromoScope.scope_container(&registry),
        Err(ContainerError::ScopeNotFound { .. })
    ));
}
