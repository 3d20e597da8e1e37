//! Shopping cart, the per-user staging area before checkout.

use chrono::{DateTime, Utc};
use common::{CartId, ProductId, UserId};
use serde::{Deserialize, Serialize};

/// A user's open cart. At most one exists per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    pub id: CartId,
    pub user_id: UserId,
    pub created_at: DateTime<Utc>,
    pub items: Vec<CartItem>,
}

impl Cart {
    /// Creates a new empty cart for a user.
    pub fn new(user_id: UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: CartId::new(),
            user_id,
            created_at,
            items: Vec::new(),
        }
    }

    /// Returns true if the cart has no lines.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the line for a product, if present.
    pub fn item(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }

    /// Returns true if both carts hold the same lines, ignoring order.
    pub fn same_lines(&self, other: &Cart) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .all(|line| other.item(&line.product_id) == Some(line))
    }
}

/// One (product, quantity) line of a cart. Unique per (cart, product).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    pub cart_id: CartId,
    pub product_id: ProductId,
    pub quantity: u32,
}

impl CartItem {
    pub fn new(cart_id: CartId, product_id: impl Into<ProductId>, quantity: u32) -> Self {
        Self {
            cart_id,
            product_id: product_id.into(),
            quantity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cart_with(lines: &[(&str, u32)]) -> Cart {
        let mut cart = Cart::new(UserId::new(), Utc::now());
        for (sku, qty) in lines {
            cart.items.push(CartItem::new(cart.id, *sku, *qty));
        }
        cart
    }

    #[test]
    fn new_cart_is_empty() {
        let cart = Cart::new(UserId::new(), Utc::now());
        assert!(cart.is_empty());
        assert!(cart.item(&ProductId::new("SKU-001")).is_none());
    }

    #[test]
    fn item_lookup() {
        let cart = cart_with(&[("SKU-001", 2), ("SKU-002", 1)]);
        assert_eq!(cart.item(&"SKU-002".into()).unwrap().quantity, 1);
    }

    #[test]
    fn same_lines_ignores_ordering() {
        let a = cart_with(&[("SKU-001", 2), ("SKU-002", 1)]);
        let mut b = a.clone();
        b.items.reverse();
        assert!(a.same_lines(&b));

        b.items[0].quantity += 1;
        assert!(!a.same_lines(&b));

        b.items.pop();
        assert!(!a.same_lines(&b));
    }
}
