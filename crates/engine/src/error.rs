//! Engine error types.

use common::{OrderId, ProductId};
use domain::OrderError;
use payments::PaymentError;
use store::StoreError;
use thiserror::Error;

/// Broad failure class of an [`EngineError`], used to pick a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A product, cart or order is absent.
    NotFound,
    /// The request clashes with current state.
    Conflict,
    /// The request itself is invalid.
    Validation,
    /// The payment provider failed or was unreachable. Retryable.
    ExternalService,
    /// A webhook failed authentication.
    Security,
    /// Stored state needs an operator.
    Integrity,
    /// Anything else, e.g. a storage failure.
    Internal,
}

/// Errors that can occur in engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    #[error("Cart not found")]
    CartNotFound,

    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Checkout found no cart, or a cart without lines.
    #[error("Cart is empty")]
    CartEmpty,

    /// The cart was modified while the payment intent was being created.
    #[error("Cart changed during checkout")]
    CartChanged,

    #[error("Insufficient stock for {product_id}: requested {requested}, available {available}")]
    InsufficientStock {
        product_id: ProductId,
        requested: u32,
        available: u32,
    },

    #[error("Invalid quantity {quantity}: must be a positive integer")]
    InvalidQuantity { quantity: i64 },

    #[error("Payment provider error: {0}")]
    PaymentProvider(String),

    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(String),

    /// Payment was confirmed but the order could not be fulfilled.
    #[error("Integrity failure on order {order_id}: {reason}")]
    Integrity { order_id: OrderId, reason: String },

    #[error("Order error: {0}")]
    Order(#[from] OrderError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            EngineError::ProductNotFound(_)
            | EngineError::CartNotFound
            | EngineError::OrderNotFound(_) => ErrorKind::NotFound,
            EngineError::CartEmpty
            | EngineError::CartChanged
            | EngineError::InsufficientStock { .. } => ErrorKind::Conflict,
            EngineError::InvalidQuantity { .. } | EngineError::MalformedPayload(_) => {
                ErrorKind::Validation
            }
            EngineError::PaymentProvider(_) => ErrorKind::ExternalService,
            EngineError::InvalidSignature(_) => ErrorKind::Security,
            EngineError::Integrity { .. } => ErrorKind::Integrity,
            EngineError::Order(OrderError::InvalidStateTransition { .. }) => ErrorKind::Conflict,
            EngineError::Order(_) => ErrorKind::Validation,
            EngineError::Store(_) => ErrorKind::Internal,
        }
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::ProductNotFound(_) => "product_not_found",
            EngineError::CartNotFound => "cart_not_found",
            EngineError::OrderNotFound(_) => "order_not_found",
            EngineError::CartEmpty => "cart_empty",
            EngineError::CartChanged => "cart_changed",
            EngineError::InsufficientStock { .. } => "insufficient_stock",
            EngineError::InvalidQuantity { .. } => "invalid_quantity",
            EngineError::PaymentProvider(_) => "payment_provider_error",
            EngineError::InvalidSignature(_) => "invalid_signature",
            EngineError::MalformedPayload(_) => "malformed_payload",
            EngineError::Integrity { .. } => "integrity_error",
            EngineError::Order(OrderError::InvalidStateTransition { .. }) => {
                "invalid_state_transition"
            }
            EngineError::Order(_) => "invalid_order",
            EngineError::Store(_) => "internal_error",
        }
    }
}

impl From<PaymentError> for EngineError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::SignatureInvalid(reason) => EngineError::InvalidSignature(reason),
            PaymentError::MalformedPayload(reason) => EngineError::MalformedPayload(reason),
            other => EngineError::PaymentProvider(other.to_string()),
        }
    }
}

/// Convenience type alias for engine results.
pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_and_codes() {
        let err = EngineError::InsufficientStock {
            product_id: ProductId::new("SKU-001"),
            requested: 3,
            available: 1,
        };
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert_eq!(err.code(), "insufficient_stock");
        assert_eq!(
            err.to_string(),
            "Insufficient stock for SKU-001: requested 3, available 1"
        );

        assert_eq!(EngineError::CartNotFound.kind(), ErrorKind::NotFound);
        assert_eq!(
            EngineError::InvalidQuantity { quantity: 0 }.kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            EngineError::Order(OrderError::NoItems).code(),
            "invalid_order"
        );
    }

    #[test]
    fn test_payment_errors_split_by_cause() {
        let err: EngineError = PaymentError::SignatureInvalid("no matching signature".into()).into();
        assert_eq!(err.kind(), ErrorKind::Security);

        let err: EngineError = PaymentError::MalformedPayload("eof".into()).into();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let err: EngineError = PaymentError::Provider("card_declined".into()).into();
        assert_eq!(err.kind(), ErrorKind::ExternalService);
        assert_eq!(err.code(), "payment_provider_error");
    }
}
