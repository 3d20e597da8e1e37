//! Payment provider client.
//!
//! The engine needs two things from a payment provider:
//! 1. Create a payment intent for an amount, returning a reference and a
//!    client secret the shopper's application uses to complete payment
//! 2. Verify and decode the signed webhook events the provider sends back
//!
//! [`StripePaymentProvider`] talks to a Stripe-compatible HTTP API;
//! [`InMemoryPaymentProvider`] is a local double for tests and development.

pub mod error;
pub mod event;
pub mod memory;
pub mod provider;
pub mod signature;
pub mod stripe;

pub use error::PaymentError;
pub use event::{EventKind, ProviderEvent, PAYMENT_SUCCEEDED};
pub use memory::{InMemoryPaymentProvider, RecordedIntent};
pub use provider::{IntentMetadata, PaymentIntent, PaymentProvider};
pub use stripe::{StripeConfig, StripePaymentProvider};
