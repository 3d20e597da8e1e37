//! Checkout: turns a cart into a pending order backed by a payment intent.

use std::time::{Duration, Instant};

use common::{Money, OrderId, UserId};
use domain::{Order, OrderItem};
use payments::{IntentMetadata, PaymentProvider};
use store::{Store, Transaction};

use crate::error::{EngineError, Result};

/// Checkout settings.
#[derive(Debug, Clone)]
pub struct CheckoutConfig {
    /// ISO currency code sent with every payment intent.
    pub currency: String,
    /// Upper bound on the provider call.
    pub provider_timeout: Duration,
}

impl Default for CheckoutConfig {
    fn default() -> Self {
        Self {
            currency: "usd".to_string(),
            provider_timeout: Duration::from_secs(10),
        }
    }
}

/// What the shopper needs to complete payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutReceipt {
    pub order_id: OrderId,
    /// Client secret of the payment intent.
    pub payment_handle: String,
    pub payment_ref: String,
    pub total: Money,
}

/// Converts carts into pending orders.
///
/// Checkout runs in three phases:
/// 1. Read the cart and current prices and check stock, without writing
/// 2. Create a payment intent for the total, holding no locks
/// 3. In one transaction, lock the cart, delete it and insert the order
///
/// Stock is never touched here. It is debited when the payment is
/// confirmed, see [`crate::PaymentReconciler`].
pub struct CheckoutOrchestrator<S, P> {
    store: S,
    provider: P,
    config: CheckoutConfig,
}

impl<S, P> CheckoutOrchestrator<S, P>
where
    S: Store,
    P: PaymentProvider,
{
    pub fn new(store: S, provider: P, config: CheckoutConfig) -> Self {
        Self {
            store,
            provider,
            config,
        }
    }

    /// Checks out the user's cart.
    #[tracing::instrument(skip(self))]
    pub async fn checkout(&self, user_id: UserId) -> Result<CheckoutReceipt> {
        let started = Instant::now();
        let result = self.run(user_id).await;

        let outcome = match &result {
            Ok(_) => "success",
            Err(e) => e.code(),
        };
        metrics::counter!("checkouts_total", "outcome" => outcome).increment(1);
        metrics::histogram!("checkout_duration_seconds").record(started.elapsed().as_secs_f64());

        match &result {
            Ok(receipt) => tracing::info!(
                order_id = %receipt.order_id,
                payment_ref = %receipt.payment_ref,
                total = %receipt.total,
                "order placed"
            ),
            Err(e) => tracing::info!(error = %e, "checkout rejected"),
        }
        result
    }

    async fn run(&self, user_id: UserId) -> Result<CheckoutReceipt> {
        let order_id = OrderId::new();

        // 1. Read phase
        let (cart, items) = {
            let mut tx = self.store.begin().await?;
            let cart = tx
                .cart_by_user(user_id)
                .await?
                .filter(|cart| !cart.is_empty())
                .ok_or(EngineError::CartEmpty)?;

            let mut items = Vec::with_capacity(cart.items.len());
            for line in &cart.items {
                let product = tx
                    .product(&line.product_id)
                    .await?
                    .ok_or_else(|| EngineError::ProductNotFound(line.product_id.clone()))?;
                if !product.has_stock_for(line.quantity) {
                    return Err(EngineError::InsufficientStock {
                        product_id: product.id,
                        requested: line.quantity,
                        available: product.stock,
                    });
                }
                items.push(OrderItem::snapshot(order_id, &product, line.quantity));
            }
            (cart, items)
        };
        let total: Money = items.iter().map(OrderItem::line_total).sum();

        // 2. Payment intent
        let mut metadata = IntentMetadata::new();
        metadata.insert("user_id".to_string(), user_id.to_string());
        metadata.insert("order_id".to_string(), order_id.to_string());

        let intent = tokio::time::timeout(
            self.config.provider_timeout,
            self.provider
                .create_intent(total, &self.config.currency, &metadata),
        )
        .await
        .map_err(|_| {
            EngineError::PaymentProvider(format!(
                "no response within {}s",
                self.config.provider_timeout.as_secs_f64()
            ))
        })??;

        // 3. Write phase
        let mut tx = self.store.begin().await?;
        let current = tx
            .lock_cart_by_user(user_id)
            .await?
            .ok_or(EngineError::CartEmpty)?;
        if current.id != cart.id || !current.same_lines(&cart) {
            tracing::warn!(payment_ref = %intent.id, "cart changed after intent creation");
            return Err(EngineError::CartChanged);
        }
        if !tx.delete_cart(cart.id, user_id).await? {
            return Err(EngineError::CartEmpty);
        }

        let order = Order::place(
            order_id,
            user_id,
            items,
            intent.id.clone(),
            chrono::Utc::now(),
        )?;
        tx.insert_order(&order).await?;
        tx.commit().await?;

        Ok(CheckoutReceipt {
            order_id,
            payment_handle: intent.client_secret,
            payment_ref: intent.id,
            total: order.total(),
        })
    }
}
