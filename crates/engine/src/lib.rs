//! Order/inventory consistency engine.
//!
//! The engine moves a shopper's cart through checkout and keeps orders in
//! step with the real payment outcome:
//! 1. [`CartService`] stages (product, quantity) lines per user
//! 2. [`CheckoutOrchestrator`] prices the cart, creates a payment intent and
//!    records a pending order
//! 3. [`PaymentReconciler`] applies the provider's webhook, debiting stock
//!    through the [`InventoryLedger`] and settling the order exactly once
//!
//! Stock is consumed only on payment confirmation. A checkout that fails or
//! times out never changes stock.

pub mod cart;
pub mod checkout;
pub mod error;
pub mod inventory;
pub mod orders;
pub mod reconciliation;

use std::sync::Arc;
use std::time::Duration;

pub use cart::{CartLine, CartService, CartSummary};
pub use checkout::{CheckoutConfig, CheckoutOrchestrator, CheckoutReceipt};
pub use error::{EngineError, ErrorKind, Result};
pub use inventory::InventoryLedger;
pub use orders::OrderQueries;
pub use reconciliation::{PaymentReconciler, WebhookOutcome};

use payments::PaymentProvider;
use store::Store;

/// Engine settings.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub currency: String,
    pub provider_timeout: Duration,
    /// Secret shared with the payment provider for webhook signatures.
    pub webhook_secret: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let checkout = CheckoutConfig::default();
        Self {
            currency: checkout.currency,
            provider_timeout: checkout.provider_timeout,
            webhook_secret: "whsec_dev".to_string(),
        }
    }
}

/// All engine components over one store and one payment provider.
pub struct Engine<S, P: ?Sized> {
    pub inventory: InventoryLedger<S>,
    pub carts: CartService<S>,
    pub checkout: CheckoutOrchestrator<S, Arc<P>>,
    pub reconciler: PaymentReconciler<S, Arc<P>>,
    pub orders: OrderQueries<S>,
    store: S,
}

impl<S, P> Engine<S, P>
where
    S: Store + Clone,
    P: PaymentProvider + ?Sized,
{
    pub fn new(store: S, provider: Arc<P>, config: EngineConfig) -> Self {
        let checkout_config = CheckoutConfig {
            currency: config.currency,
            provider_timeout: config.provider_timeout,
        };

        Self {
            inventory: InventoryLedger::new(store.clone()),
            carts: CartService::new(store.clone()),
            checkout: CheckoutOrchestrator::new(store.clone(), provider.clone(), checkout_config),
            reconciler: PaymentReconciler::new(store.clone(), provider, config.webhook_secret),
            orders: OrderQueries::new(store.clone()),
            store,
        }
    }

    /// Opens and abandons a transaction to check that storage answers.
    pub async fn check_store(&self) -> Result<()> {
        let tx = self.store.begin().await?;
        drop(tx);
        Ok(())
    }
}
