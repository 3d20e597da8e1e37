//! Payment provider trait.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::Money;

use crate::error::PaymentError;
use crate::event::{self, ProviderEvent};
use crate::signature;

/// Free-form key/value tags attached to a payment intent.
pub type IntentMetadata = BTreeMap<String, String>;

/// A payment intent created by the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    /// The provider's reference for the intent.
    pub id: String,
    /// Handle the shopper's application uses to complete payment.
    pub client_secret: String,
}

/// Trait for payment provider operations.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Creates a payment intent for `amount` (in minor units) in `currency`.
    async fn create_intent(
        &self,
        amount: Money,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntent, PaymentError>;

    /// Verifies a webhook delivery's signature and decodes it.
    ///
    /// Nothing in the body is trusted until the signature has been checked.
    fn verify_event(
        &self,
        payload: &[u8],
        signature: &str,
        secret: &str,
    ) -> Result<ProviderEvent, PaymentError> {
        let now = chrono::Utc::now().timestamp();
        signature::verify(
            payload,
            signature,
            secret,
            signature::DEFAULT_TOLERANCE_SECS,
            now,
        )?;
        event::decode(payload)
    }
}

#[async_trait]
impl<T: PaymentProvider + ?Sized> PaymentProvider for Arc<T> {
    async fn create_intent(
        &self,
        amount: Money,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntent, PaymentError> {
        (**self).create_intent(amount, currency, metadata).await
    }

    fn verify_event(
        &self,
        payload: &[u8],
        signature: &str,
        secret: &str,
    ) -> Result<ProviderEvent, PaymentError> {
        (**self).verify_event(payload, signature, secret)
    }
}
