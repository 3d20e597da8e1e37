//! Stripe-compatible HTTP provider.

use async_trait::async_trait;
use common::Money;
use reqwest::Client;
use serde::Deserialize;

use crate::error::PaymentError;
use crate::provider::{IntentMetadata, PaymentIntent, PaymentProvider};

/// Configuration for the Stripe API.
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key, sent as a bearer token.
    pub api_key: String,

    /// API base URL, e.g. `"https://api.stripe.com"`.
    pub base_url: String,
}

/// HTTP client for creating payment intents.
#[derive(Debug, Clone)]
pub struct StripePaymentProvider {
    config: StripeConfig,
    http: Client,
}

impl StripePaymentProvider {
    #[must_use]
    pub fn new(config: StripeConfig) -> Self {
        Self {
            config,
            http: Client::new(),
        }
    }
}

/// Form fields for a create-intent request.
///
/// Amounts go over the wire in minor units. Metadata keys use the
/// `metadata[key]` bracket form.
pub fn intent_form(
    amount: Money,
    currency: &str,
    metadata: &IntentMetadata,
) -> Vec<(String, String)> {
    let mut form = vec![
        ("amount".to_string(), amount.cents().to_string()),
        ("currency".to_string(), currency.to_lowercase()),
    ];
    for (key, value) in metadata {
        form.push((format!("metadata[{key}]"), value.clone()));
    }
    form
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
}

#[async_trait]
impl PaymentProvider for StripePaymentProvider {
    async fn create_intent(
        &self,
        amount: Money,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> Result<PaymentIntent, PaymentError> {
        let url = format!(
            "{}/v1/payment_intents",
            self.config.base_url.trim_end_matches('/')
        );

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .form(&intent_form(amount, currency, metadata))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&text)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or(text);

            tracing::warn!(%status, %message, "Payment intent creation rejected");
            return Err(PaymentError::Provider(format!(
                "create intent failed with status {status}: {message}"
            )));
        }

        let parsed: IntentResponse = response.json().await?;
        let client_secret = parsed.client_secret.ok_or_else(|| {
            PaymentError::Provider(format!("intent {} has no client secret", parsed.id))
        })?;

        Ok(PaymentIntent {
            id: parsed.id,
            client_secret,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_form() {
        let mut metadata = IntentMetadata::new();
        metadata.insert("user_id".to_string(), "u-1".to_string());

        let form = intent_form(Money::from_cents(1999), "USD", &metadata);

        assert_eq!(
            form,
            vec![
                ("amount".to_string(), "1999".to_string()),
                ("currency".to_string(), "usd".to_string()),
                ("metadata[user_id]".to_string(), "u-1".to_string()),
            ]
        );
    }

    #[test]
    fn test_error_body_message() {
        let body = r#"{"error":{"message":"Invalid API Key provided","type":"invalid_request_error"}}"#;
        let parsed: ErrorResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.error.message.as_deref(), Some("Invalid API Key provided"));
    }
}
