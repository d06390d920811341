//! Parameterized factories.
//!
//! A factory object is registered once (as a singleton `Arc<F>`) and then
//! builds products from caller-supplied parameters, e.g. one payment
//! method handler per method type.

use async_trait::async_trait;

use crate::error::FactoryResult;

/// Builds a `Product` from `Params` synchronously.
pub trait Factory: Send + Sync + 'static {
    type Params: Send + 'static;
    type Product: Send + 'static;

    fn create(&self, params: Self::Params) -> FactoryResult<Self::Product>;
}

/// Builds a `Product` from `Params`, possibly suspending.
#[async_trait]
pub trait AsyncFactory: Send + Sync + 'static {
    type Params: Send + 'static;
    type Product: Send + 'static;

    async fn create(&self, params: Self::Params) -> FactoryResult<Self::Product>;
}
