//! Payment error types.

use thiserror::Error;

/// Errors that can occur when talking to the payment provider.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// The provider rejected the request or answered with something unusable.
    #[error("Payment provider error: {0}")]
    Provider(String),

    /// The provider could not be reached.
    #[error("Payment provider request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// A webhook signature did not verify.
    #[error("Invalid webhook signature: {0}")]
    SignatureInvalid(String),

    /// A webhook body could not be decoded.
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),
}
