//! Wiring a small checkout flow with Tether.
//!
//! Run with `RUST_LOG=tether_container=debug` to see registrations and
//! resolutions.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tether::prelude::*;
use tether::scoped;
use tracing::info;
use tracing_subscriber::EnvFilter;

// === Services ===

trait PaymentGateway: Send + Sync {
    fn charge(&self, cents: u64) -> String;
}

struct CardGateway {
    merchant: String,
}

impl PaymentGateway for CardGateway {
    fn charge(&self, cents: u64) -> String {
        format!("charged {cents} cents via card for {}", self.merchant)
    }
}

#[derive(Clone)]
struct Settings {
    merchant: String,
    currency: String,
}

struct Cart {
    items: Vec<(String, u64)>,
}

struct CheckoutService {
    gateway: Arc<dyn PaymentGateway>,
    settings: Arc<Settings>,
}

impl CheckoutService {
    fn pay(&self, cart: &Cart) -> String {
        let total: u64 = cart.items.iter().map(|(_, cents)| cents).sum();
        format!("{} ({})", self.gateway.charge(total), self.settings.currency)
    }
}

// === Wiring ===

struct PaymentsProvider;

impl Provider for PaymentsProvider {
    fn register(&self, registrar: &dyn Registrar) -> Result<()> {
        registrar
            .register::<Arc<dyn PaymentGateway>>()
            .as_singleton()
            .with_async(|ctx| async move {
                let settings: Arc<Settings> = ctx.resolve().await?;
                // Pretend to open a connection.
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok(Arc::new(CardGateway {
                    merchant: settings.merchant.clone(),
                }) as Arc<dyn PaymentGateway>)
            })?;
        registrar
            .register::<Arc<CheckoutService>>()
            .with_async(|ctx| async move {
                Ok(Arc::new(CheckoutService {
                    gateway: ctx.resolve().await?,
                    settings: ctx.resolve().await?,
                }))
            })?;
        Ok(())
    }
}

struct CheckoutScope;

#[async_trait]
impl DependencyScope for CheckoutScope {
    fn scope_id(&self) -> &str {
        "checkout"
    }

    fn setup_container(&self, container: &Container) -> Result<()> {
        container
            .register::<Arc<Cart>>()
            .as_weak()
            .with(|_| {
                Ok(Arc::new(Cart {
                    items: vec![("coffee".into(), 450), ("bagel".into(), 325)],
                }))
            })?;
        Ok(())
    }

    async fn cleanup_scope(&self) {
        info!("checkout scope torn down");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let container = scoped::create_container();
    container
        .register::<Arc<Settings>>()
        .as_singleton()
        .with_value(Arc::new(Settings {
            merchant: "Corner Café".into(),
            currency: "EUR".into(),
        }))?;
    container.install(&PaymentsProvider)?;
    scoped::set_container(container.clone());

    let instrumented = InstrumentedContainer::new(container.clone());
    let checkout: Arc<CheckoutService> = instrumented.resolve().await?;

    let scope = CheckoutScope;
    scope.register_in(scoped::global())?;
    let receipt = scope
        .with_scope_container(scoped::global(), |scope_container| async move {
            let cart: Arc<Cart> = scope_container.resolve().await?;
            Ok::<_, ContainerError>(checkout.pay(&cart))
        })
        .await??;
    println!("{receipt}");

    // Presentation code falls back to a default when nothing is wired.
    let retries = scoped::global().resolve_named_or("retries", 3u8);
    println!("retries: {retries}");

    for _ in 0..10 {
        let _: Arc<CheckoutService> = instrumented.resolve().await?;
    }
    if let Some(report) = instrumented.performance_metrics() {
        println!("{report}");
    }
    println!("{}", container.diagnostics());
    println!("{}", container.health_check());

    scope.unregister_from(scoped::global()).await;
    scoped::clear_container();
    Ok(())
}
