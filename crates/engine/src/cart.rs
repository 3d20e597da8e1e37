//! Cart operations.

use common::{CartId, Money, ProductId, UserId};
use store::{Store, StoreError, Transaction};

use crate::error::{EngineError, Result};

/// A cart line priced at the current catalog price.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: ProductId,
    pub name: String,
    pub quantity: u32,
    pub unit_price: Money,
    pub line_total: Money,
}

/// A cart as shown to its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartSummary {
    pub cart_id: CartId,
    pub items: Vec<CartLine>,
    pub total: Money,
}

/// Adds to and reads users' carts.
///
/// Carts never hold stock. Availability is checked when a line is added and
/// again at checkout; only payment confirmation consumes stock.
#[derive(Clone)]
pub struct CartService<S> {
    store: S,
}

impl<S: Store> CartService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Adds `quantity` of a product to the user's cart, creating the cart on
    /// first use. Repeated adds of one product merge into a single line.
    ///
    /// Fails with `InsufficientStock` when the merged line would exceed
    /// current stock; the cart is then left unchanged.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(
        &self,
        user_id: UserId,
        product_id: &ProductId,
        quantity: i64,
    ) -> Result<CartSummary> {
        let quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or(EngineError::InvalidQuantity { quantity })?;

        let mut tx = self.store.begin().await?;

        let product = tx
            .product(product_id)
            .await?
            .ok_or_else(|| EngineError::ProductNotFound(product_id.clone()))?;

        let cart = tx.open_cart(user_id, chrono::Utc::now()).await?;
        let in_cart = cart.item(product_id).map_or(0, |line| line.quantity);
        let wanted = in_cart.saturating_add(quantity);
        if !product.has_stock_for(wanted) {
            return Err(EngineError::InsufficientStock {
                product_id: product_id.clone(),
                requested: wanted,
                available: product.stock,
            });
        }

        let line = tx
            .add_cart_item(cart.id, product_id, quantity)
            .await
            .map_err(|e| match e {
                StoreError::Conflict { .. } => EngineError::CartChanged,
                other => EngineError::Store(other),
            })?;
        let summary = summarize(&mut tx, cart.id, user_id).await?;
        tx.commit().await?;

        metrics::counter!("cart_items_added_total").increment(1);
        tracing::info!(cart_id = %cart.id, quantity = line.quantity, "cart line updated");
        Ok(summary)
    }

    /// Returns the user's cart priced at current catalog prices.
    ///
    /// An existing cart without lines is valid and totals zero; a user
    /// without a cart gets `CartNotFound`.
    #[tracing::instrument(skip(self))]
    pub async fn view(&self, user_id: UserId) -> Result<CartSummary> {
        let mut tx = self.store.begin().await?;
        let cart = tx
            .cart_by_user(user_id)
            .await?
            .ok_or(EngineError::CartNotFound)?;
        summarize(&mut tx, cart.id, user_id).await
    }
}

async fn summarize<T: Transaction>(
    tx: &mut T,
    cart_id: CartId,
    user_id: UserId,
) -> Result<CartSummary> {
    let cart = tx
        .cart_by_user(user_id)
        .await?
        .filter(|cart| cart.id == cart_id)
        .ok_or(EngineError::CartNotFound)?;

    let mut items = Vec::with_capacity(cart.items.len());
    for line in &cart.items {
        let Some(product) = tx.product(&line.product_id).await? else {
            tracing::warn!(product_id = %line.product_id, "cart line references a missing product");
            continue;
        };
        items.push(CartLine {
            product_id: product.id,
            name: product.name,
            quantity: line.quantity,
            unit_price: product.price,
            line_total: product.price.multiply(line.quantity),
        });
    }

    let total = items.iter().map(|line| line.line_total).sum();
    Ok(CartSummary {
        cart_id,
        items,
        total,
    })
}
