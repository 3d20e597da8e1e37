//! In-memory payment provider for tests and local runs.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use common::Money;

use crate::error::PaymentError;
use crate::event;
use crate::provider::{IntentMetadata, PaymentIntent, PaymentProvider};
use crate::signature;

/// An intent as the in-memory provider recorded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedIntent {
    pub amount: Money,
    pub currency: String,
    pub metadata: IntentMetadata,
}

#[derive(Default)]
struct State {
    next_id: u64,
    intents: HashMap<String, RecordedIntent>,
    fail_on_create: bool,
    delay: Option<Duration>,
}

/// Provider that keeps intents in memory and signs its own webhooks.
#[derive(Default)]
pub struct InMemoryPaymentProvider {
    state: Mutex<State>,
}

impl InMemoryPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Makes every subsequent `create_intent` fail.
    pub fn set_fail_on_create(&self, fail: bool) {
        self.state().fail_on_create = fail;
    }

    /// Delays every subsequent `create_intent` by `delay`.
    pub fn set_delay(&self, delay: Duration) {
        self.state().delay = Some(delay);
    }

    /// Number of intents created so far.
    pub fn intent_count(&self) -> usize {
        self.state().intents.len()
    }

    pub fn intent(&self, id: &str) -> Option<RecordedIntent> {
        self.state().intents.get(id).cloned()
    }

    /// Builds a signed webhook delivery for `object_id`.
    ///
    /// Returns the body and the signature header value.
    pub fn signed_event(
        &self,
        event_id: &str,
        event_type: &str,
        object_id: &str,
        secret: &str,
    ) -> Result<(Vec<u8>, String), PaymentError> {
        let body = event::encode(event_id, event_type, object_id).into_bytes();
        let header = signature::sign(&body, secret, chrono::Utc::now().timestamp())?;
        Ok((body, header))
    }
}

#[async_trait]
impl PaymentProvider for InMemoryPaymentProvider {
    async fn create_intent(
        &self,
        amount: Money,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntent, PaymentError> {
        let delay = self.state().delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut state = self.state();
        if state.fail_on_create {
            return Err(PaymentError::Provider(
                "payment provider unavailable".to_string(),
            ));
        }

        state.next_id += 1;
        let id = format!("pi_{:04}", state.next_id);
        state.intents.insert(
            id.clone(),
            RecordedIntent {
                amount,
                currency: currency.to_string(),
                metadata: metadata.clone(),
            },
        );

        Ok(PaymentIntent {
            client_secret: format!("{id}_secret_{:08x}", state.next_id.wrapping_mul(0x9e37_79b9)),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, PAYMENT_SUCCEEDED};

    #[tokio::test]
    async fn test_create_intent_records_request() {
        let provider = InMemoryPaymentProvider::new();
        let mut metadata = IntentMetadata::new();
        metadata.insert("user_id".to_string(), "u-1".to_string());

        let first = provider
            .create_intent(Money::from_cents(2500), "usd", &metadata)
            .await
            .unwrap();
        let second = provider
            .create_intent(Money::from_cents(100), "usd", &IntentMetadata::new())
            .await
            .unwrap();

        assert_eq!(first.id, "pi_0001");
        assert_eq!(second.id, "pi_0002");
        assert!(first.client_secret.starts_with("pi_0001_secret_"));
        assert_eq!(provider.intent_count(), 2);

        let recorded = provider.intent("pi_0001").unwrap();
        assert_eq!(recorded.amount, Money::from_cents(2500));
        assert_eq!(recorded.currency, "usd");
        assert_eq!(recorded.metadata.get("user_id").map(String::as_str), Some("u-1"));
    }

    #[tokio::test]
    async fn test_fail_on_create() {
        let provider = InMemoryPaymentProvider::new();
        provider.set_fail_on_create(true);

        let result = provider
            .create_intent(Money::from_cents(100), "usd", &IntentMetadata::new())
            .await;

        assert!(matches!(result, Err(PaymentError::Provider(_))));
        assert_eq!(provider.intent_count(), 0);
    }

    #[test]
    fn test_signed_event_verifies() {
        let provider = InMemoryPaymentProvider::new();
        let (body, header) = provider
            .signed_event("evt_1", PAYMENT_SUCCEEDED, "pi_0001", "whsec_test")
            .unwrap();

        let event = provider.verify_event(&body, &header, "whsec_test").unwrap();
        assert_eq!(
            event.kind,
            EventKind::PaymentSucceeded {
                payment_ref: "pi_0001".to_string()
            }
        );

        assert!(matches!(
            provider.verify_event(&body, &header, "whsec_wrong"),
            Err(PaymentError::SignatureInvalid(_))
        ));
    }
}
