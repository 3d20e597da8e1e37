//! Webhook event decoding.

use serde::Deserialize;

use crate::error::PaymentError;

/// Event type emitted when a payment intent has been paid.
pub const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";

/// A verified provider notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEvent {
    /// Provider-assigned event ID. Redeliveries carry the same ID.
    pub id: String,
    pub kind: EventKind,
}

/// What an event means to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// The payment intent with this reference succeeded.
    PaymentSucceeded { payment_ref: String },
    /// Any other event type, kept by name for logging.
    Other(String),
}

impl EventKind {
    /// Returns the provider's event type name.
    pub fn event_type(&self) -> &str {
        match self {
            EventKind::PaymentSucceeded { .. } => PAYMENT_SUCCEEDED,
            EventKind::Other(event_type) => event_type,
        }
    }
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    data: RawData,
}

#[derive(Deserialize)]
struct RawData {
    object: serde_json::Value,
}

/// Decodes a raw webhook body.
///
/// The body's authenticity must already have been checked.
pub fn decode(payload: &[u8]) -> Result<ProviderEvent, PaymentError> {
    let raw: RawEvent = serde_json::from_slice(payload)
        .map_err(|e| PaymentError::MalformedPayload(e.to_string()))?;

    let kind = if raw.event_type == PAYMENT_SUCCEEDED {
        let payment_ref = raw
            .data
            .object
            .get("id")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| {
                PaymentError::MalformedPayload("payment intent has no id".to_string())
            })?;
        EventKind::PaymentSucceeded {
            payment_ref: payment_ref.to_string(),
        }
    } else {
        EventKind::Other(raw.event_type)
    };

    Ok(ProviderEvent { id: raw.id, kind })
}

/// Builds a webhook body in the provider's format.
pub fn encode(event_id: &str, event_type: &str, object_id: &str) -> String {
    serde_json::json!({
        "id": event_id,
        "object": "event",
        "type": event_type,
        "data": { "object": { "id": object_id, "object": "payment_intent" } },
    })
    .to_string()
}
