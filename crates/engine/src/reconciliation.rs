//! Payment webhook reconciliation.

use common::OrderId;
use domain::{OrderItem, PaymentStatus};
use payments::{EventKind, PaymentProvider};
use store::{Store, Transaction};

use crate::error::{EngineError, Result};
use crate::inventory;

/// What a webhook delivery did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The event type carries no meaning for orders.
    Ignored { event_type: String },
    /// No order carries the payment reference.
    UnknownReference { payment_ref: String },
    /// The order was already settled by an earlier delivery.
    Duplicate { order_id: OrderId },
    /// Stock was debited and the order is paid.
    Paid { order_id: OrderId },
    /// Payment arrived but stock could not cover the order.
    Failed { order_id: OrderId, reason: String },
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Ignored { .. } => "ignored",
            WebhookOutcome::UnknownReference { .. } => "unknown_reference",
            WebhookOutcome::Duplicate { .. } => "duplicate",
            WebhookOutcome::Paid { .. } => "paid",
            WebhookOutcome::Failed { .. } => "failed",
        }
    }
}

/// Applies payment provider notifications to orders.
///
/// This is the only component that moves an order out of `Pending` and the
/// only one that debits stock for a purchase. Deliveries for one order
/// serialize on the order's row lock, and a settled order is never touched
/// again, so any number of redeliveries debit stock once.
pub struct PaymentReconciler<S, P> {
    store: S,
    provider: P,
    webhook_secret: String,
}

impl<S, P> PaymentReconciler<S, P>
where
    S: Store,
    P: PaymentProvider,
{
    pub fn new(store: S, provider: P, webhook_secret: impl Into<String>) -> Self {
        Self {
            store,
            provider,
            webhook_secret: webhook_secret.into(),
        }
    }

    /// Verifies and applies one webhook delivery.
    ///
    /// Nothing is looked up before the signature verifies. Unknown event
    /// types and unknown references are acknowledged so the provider stops
    /// redelivering them.
    #[tracing::instrument(skip_all)]
    pub async fn handle_provider_event(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome> {
        let result = self.verify_and_apply(payload, signature).await;

        let outcome = match &result {
            Ok(outcome) => outcome.as_str(),
            Err(e) => e.code(),
        };
        metrics::counter!("payment_webhooks_total", "outcome" => outcome).increment(1);
        result
    }

    async fn verify_and_apply(
        &self,
        payload: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome> {
        let signature = signature.ok_or_else(|| {
            tracing::warn!("webhook rejected: missing signature header");
            EngineError::InvalidSignature("missing signature header".to_string())
        })?;

        let event = self
            .provider
            .verify_event(payload, signature, &self.webhook_secret)
            .map_err(|e| {
                tracing::warn!(error = %e, "webhook rejected");
                EngineError::from(e)
            })?;

        match event.kind {
            EventKind::PaymentSucceeded { payment_ref } => {
                tracing::info!(event_id = %event.id, %payment_ref, "payment succeeded");
                self.settle(&payment_ref).await
            }
            EventKind::Other(event_type) => {
                tracing::debug!(event_id = %event.id, %event_type, "event ignored");
                Ok(WebhookOutcome::Ignored { event_type })
            }
        }
    }

    async fn settle(&self, payment_ref: &str) -> Result<WebhookOutcome> {
        let mut tx = self.store.begin().await?;

        let Some(mut order) = tx.lock_order_by_payment_ref(payment_ref).await? else {
            tracing::info!(%payment_ref, "no order for payment reference");
            return Ok(WebhookOutcome::UnknownReference {
                payment_ref: payment_ref.to_string(),
            });
        };
        let order_id = order.id;

        if order.is_settled() {
            tracing::info!(%order_id, status = %order.status(), "duplicate delivery");
            return Ok(WebhookOutcome::Duplicate { order_id });
        }

        let lines = order.items().to_vec();
        match debit_lines(&mut tx, &lines).await? {
            None => {
                order.mark_paid()?;
                tx.update_order_status(&order).await?;
                tx.commit().await?;

                tracing::info!(%order_id, total = %order.total(), "order paid");
                Ok(WebhookOutcome::Paid { order_id })
            }
            Some(shortfall) => {
                let reason = shortfall.to_string();
                order.mark_failed(PaymentStatus::Paid, reason.clone())?;
                tx.update_order_status(&order).await?;
                tx.commit().await?;

                let err = EngineError::Integrity {
                    order_id,
                    reason: reason.clone(),
                };
                metrics::counter!("order_integrity_failures_total").increment(1);
                tracing::error!(
                    fatal = true,
                    %order_id,
                    %payment_ref,
                    error = %err,
                    "payment captured but stock could not be debited; manual reconciliation required"
                );
                Ok(WebhookOutcome::Failed { order_id, reason })
            }
        }
    }
}

/// Debits every line, or none of them.
///
/// Lines are visited in product id order, so settlements of orders sharing
/// products lock the product rows in the same order. Returns the first
/// shortfall, after crediting back the lines already debited. Storage errors
/// propagate and leave rollback to the transaction.
async fn debit_lines<T: Transaction>(
    tx: &mut T,
    lines: &[OrderItem],
) -> Result<Option<EngineError>> {
    let lines = in_lock_order(lines);
    for (index, line) in lines.iter().enumerate() {
        match inventory::debit_in(tx, &line.product_id, line.quantity).await {
            Ok(_) => {}
            Err(
                shortfall @ (EngineError::InsufficientStock { .. }
                | EngineError::ProductNotFound(_)),
            ) => {
                for debited in &lines[..index] {
                    inventory::credit_in(tx, &debited.product_id, debited.quantity).await?;
                }
                return Ok(Some(shortfall));
            }
            Err(e) => return Err(e),
        }
    }
    Ok(None)
}

fn in_lock_order(lines: &[OrderItem]) -> Vec<&OrderItem> {
    let mut ordered: Vec<&OrderItem> = lines.iter().collect();
    ordered.sort_by(|a, b| a.product_id.cmp(&b.product_id));
    ordered
}
