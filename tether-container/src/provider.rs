//! Provider modules: a group of related registrations.
//!
//! # Examples
//! ```rust,ignore
//! struct PaymentsProvider;
//!
//! impl Provider for PaymentsProvider {
//!     fn register(&self, registrar: &dyn Registrar) -> Result<()> {
//!         registrar
//!             .register::<Arc<dyn PaymentGateway>>()
//!             .as_singleton()
//!             .with(|_| Ok(Arc::new(StripeGateway::default()) as Arc<dyn PaymentGateway>))?;
//!         registrar.register::<Arc<Receipts>>().with(|ctx| Ok(Arc::new(Receipts::new(ctx.resolve_sync()?))))?;
//!         Ok(())
//!     }
//! }
//!
//! container.install(&PaymentsProvider)?;
//! ```

use crate::capability::Registrar;
use crate::error::Result;

/// A module that registers related dependencies.
///
/// Providers see only the [`Registrar`] capability, so they can be tested
/// against any registrar, not just a [`Container`](crate::container::Container).
pub trait Provider: Send + Sync {
    /// Registers this provider's dependencies. Stops at the first error.
    fn register(&self, registrar: &dyn Registrar) -> Result<()>;

    /// Human-readable name for logs.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }
}
