//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, UserId};
use serde::{Deserialize, Serialize};

use super::{OrderError, OrderItem, OrderStatus, PaymentStatus};

/// Order aggregate root.
///
/// Created once at checkout and never deleted. After creation only the
/// status fields move, and only out of `Pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    status: OrderStatus,
    payment_status: PaymentStatus,

    /// Sum of the line totals at creation time.
    total: Money,

    /// Payment intent reference issued by the provider.
    payment_ref: String,

    /// Discrepancy recorded when the order was failed during reconciliation.
    failure_reason: Option<String>,

    items: Vec<OrderItem>,
}

impl Order {
    /// Places a new pending order from priced lines.
    ///
    /// The total is computed here from the lines and never recomputed.
    pub fn place(
        id: OrderId,
        user_id: UserId,
        items: Vec<OrderItem>,
        payment_ref: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, OrderError> {
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }

        if let Some(item) = items.iter().find(|item| item.quantity == 0) {
            return Err(OrderError::InvalidQuantity {
                product_id: item.product_id.to_string(),
                quantity: item.quantity,
            });
        }

        let total = items.iter().map(OrderItem::line_total).sum();

        Ok(Self {
            id,
            user_id,
            created_at,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            total,
            payment_ref: payment_ref.into(),
            failure_reason: None,
            items,
        })
    }

    /// Rebuilds an order from persisted fields without re-running creation rules.
    #[allow(clippy::too_many_arguments)]
    pub fn restore(
        id: OrderId,
        user_id: UserId,
        created_at: DateTime<Utc>,
        status: OrderStatus,
        payment_status: PaymentStatus,
        total: Money,
        payment_ref: String,
        failure_reason: Option<String>,
        items: Vec<OrderItem>,
    ) -> Self {
        Self {
            id,
            user_id,
            created_at,
            status,
            payment_status,
            total,
            payment_ref,
            failure_reason,
            items,
        }
    }
}

// Query methods
impl Order {
    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn payment_ref(&self) -> &str {
        &self.payment_ref
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Returns true if the stored total still equals the sum of the lines.
    pub fn total_matches_lines(&self) -> bool {
        self.items.iter().map(OrderItem::line_total).sum::<Money>() == self.total
    }

    /// Returns true if payment has already been confirmed or rejected.
    pub fn is_settled(&self) -> bool {
        self.payment_status == PaymentStatus::Paid || self.status.is_terminal()
    }
}

// Transitions
impl Order {
    /// Marks the order paid after payment confirmation and stock debit.
    pub fn mark_paid(&mut self) -> Result<(), OrderError> {
        if !self.status.can_mark_paid() {
            return Err(OrderError::InvalidStateTransition {
                current_state: self.status,
                action: "mark paid",
            });
        }

        self.status = OrderStatus::Paid;
        self.payment_status = PaymentStatus::Paid;
        Ok(())
    }

    /// Marks the order failed, recording why.
    ///
    /// The payment was captured by the provider but the order could not be
    /// fulfilled, so the payment status is left as reported.
    pub fn mark_failed(
        &mut self,
        payment_status: PaymentStatus,
        reason: impl Into<String>,
    ) -> Result<(), OrderError> {
        if !self.status.can_mark_failed() {
            return Err(OrderError::InvalidStateTransition {
                current_state: self.status,
                action: "mark failed",
            });
        }

        self.status = OrderStatus::Failed;
        self.payment_status = payment_status;
        self.failure_reason = Some(reason.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::Product;

    fn widget_lines(order_id: OrderId) -> Vec<OrderItem> {
        let widget = Product::new("SKU-001", "Widget", Money::from_cents(1000), 5);
        let gadget = Product::new("SKU-002", "Gadget", Money::from_cents(250), 9);
        vec![
            OrderItem::snapshot(order_id, &widget, 3),
            OrderItem::snapshot(order_id, &gadget, 2),
        ]
    }

    fn place_order() -> Order {
        let id = OrderId::new();
        Order::place(id, UserId::new(), widget_lines(id), "pi_0001", Utc::now()).unwrap()
    }

    #[test]
    fn test_place_computes_total_from_lines() {
        let order = place_order();
        assert_eq!(order.total().cents(), 3500);
        assert!(order.total_matches_lines());
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.payment_status(), PaymentStatus::Pending);
        assert_eq!(order.payment_ref(), "pi_0001");
        assert!(order.failure_reason().is_none());
    }

    #[test]
    fn test_place_without_items_fails() {
        let result = Order::place(OrderId::new(), UserId::new(), vec![], "pi_0001", Utc::now());
        assert_eq!(result.unwrap_err(), OrderError::NoItems);
    }

    #[test]
    fn test_place_with_zero_quantity_fails() {
        let id = OrderId::new();
        let items = vec![OrderItem::new(id, "SKU-001", 0, Money::from_cents(1000))];
        let result = Order::place(id, UserId::new(), items, "pi_0001", Utc::now());
        assert!(matches!(result, Err(OrderError::InvalidQuantity { .. })));
    }

    #[test]
    fn test_mark_paid_is_terminal() {
        let mut order = place_order();
        order.mark_paid().unwrap();

        assert_eq!(order.status(), OrderStatus::Paid);
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
        assert!(order.is_settled());

        let again = order.mark_paid();
        assert!(matches!(
            again,
            Err(OrderError::InvalidStateTransition {
                current_state: OrderStatus::Paid,
                ..
            })
        ));
        assert!(order.mark_failed(PaymentStatus::Paid, "late").is_err());
    }

    #[test]
    fn test_mark_failed_records_reason() {
        let mut order = place_order();
        order
            .mark_failed(PaymentStatus::Paid, "insufficient stock for SKU-001")
            .unwrap();

        assert_eq!(order.status(), OrderStatus::Failed);
        assert_eq!(order.payment_status(), PaymentStatus::Paid);
        assert_eq!(
            order.failure_reason(),
            Some("insufficient stock for SKU-001")
        );
        assert!(order.is_settled());
        assert!(order.mark_paid().is_err());
    }

    #[test]
    fn test_restore_keeps_persisted_fields() {
        let order = place_order();
        let restored = Order::restore(
            order.id,
            order.user_id,
            order.created_at,
            OrderStatus::Paid,
            PaymentStatus::Paid,
            order.total(),
            order.payment_ref().to_string(),
            None,
            order.items().to_vec(),
        );

        assert_eq!(restored.status(), OrderStatus::Paid);
        assert_eq!(restored.total(), order.total());
        assert_eq!(restored.items(), order.items());
    }
}
