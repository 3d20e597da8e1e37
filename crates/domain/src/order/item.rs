use common::{Money, OrderId, ProductId};
use serde::{Deserialize, Serialize};

use crate::product::Product;

/// A purchased line of an order.
///
/// `unit_price` is the catalog price at checkout time. Later price changes
/// never touch it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItem {
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

impl OrderItem {
    /// Creates an order line.
    pub fn new(
        order_id: OrderId,
        product_id: impl Into<ProductId>,
        quantity: u32,
        unit_price: Money,
    ) -> Self {
        Self {
            order_id,
            product_id: product_id.into(),
            quantity,
            unit_price,
        }
    }

    /// Creates an order line priced at the product's current price.
    pub fn snapshot(order_id: OrderId, product: &Product, quantity: u32) -> Self {
        Self::new(order_id, product.id.clone(), quantity, product.price)
    }

    /// Returns the total price for this line (quantity * unit_price).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}
