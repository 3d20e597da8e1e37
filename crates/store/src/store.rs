use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Cart, CartId, CartItem, Order, OrderId, Product, ProductId, UserId};

use crate::{Result, StoreError};

/// Rejects products with a negative price.
pub(crate) fn check_product(product: &Product) -> Result<()> {
    if product.price.is_negative() {
        return Err(StoreError::Invalid {
            entity: "product",
            reason: format!("negative price {} for {}", product.price, product.id),
        });
    }
    Ok(())
}

/// Entry point into storage: hands out transactions.
///
/// All implementations must be thread-safe (Send + Sync) and cheap to clone.
#[async_trait]
pub trait Store: Send + Sync {
    /// The transaction type produced by [`Store::begin`].
    type Tx: Transaction;

    /// Starts a new transaction.
    ///
    /// Isolation is at least read-committed. A transaction dropped without
    /// [`Transaction::commit`] is rolled back.
    async fn begin(&self) -> Result<Self::Tx>;
}

/// A unit of work over products, carts and orders.
///
/// Every cross-entity read is an explicit call here; entities never load
/// their relations lazily.
#[async_trait]
pub trait Transaction: Send {
    /// Loads a product by ID.
    async fn product(&mut self, id: &ProductId) -> Result<Option<Product>>;

    /// Inserts a product or replaces its name, price and stock.
    ///
    /// Catalog maintenance belongs to the catalog service; this exists for
    /// seeding and administration.
    async fn upsert_product(&mut self, product: &Product) -> Result<()>;

    /// Decrements stock by `quantity` if, at the moment of the update, at
    /// least that much is available.
    ///
    /// Returns the remaining stock, or `None` if the product is missing or
    /// short. The check and the write are a single atomic step on the row.
    async fn debit_stock(&mut self, id: &ProductId, quantity: u32) -> Result<Option<u32>>;

    /// Increments stock by `quantity`.
    ///
    /// Returns the new stock, or `None` if the product is missing.
    async fn credit_stock(&mut self, id: &ProductId, quantity: u32) -> Result<Option<u32>>;

    /// Loads the user's cart with its lines.
    async fn cart_by_user(&mut self, user_id: UserId) -> Result<Option<Cart>>;

    /// Loads the user's cart with its lines and locks it until the
    /// transaction ends.
    async fn lock_cart_by_user(&mut self, user_id: UserId) -> Result<Option<Cart>>;

    /// Returns the user's cart, creating an empty one if none exists.
    async fn open_cart(&mut self, user_id: UserId, now: DateTime<Utc>) -> Result<Cart>;

    /// Adds `quantity` of a product to a cart, merging with an existing line.
    ///
    /// Returns the resulting line, or [`crate::StoreError::Conflict`] when the
    /// cart was deleted concurrently.
    async fn add_cart_item(
        &mut self,
        cart_id: CartId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartItem>;

    /// Deletes a cart and its lines if it exists and belongs to `user_id`.
    ///
    /// Returns false when no such cart was found.
    async fn delete_cart(&mut self, cart_id: CartId, user_id: UserId) -> Result<bool>;

    /// Persists a new order with its lines.
    async fn insert_order(&mut self, order: &Order) -> Result<()>;

    /// Loads an order with its lines.
    async fn order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Loads all orders of a user, oldest first.
    async fn orders_by_user(&mut self, user_id: UserId) -> Result<Vec<Order>>;

    /// Loads the order owning a payment reference and locks it until the
    /// transaction ends.
    async fn lock_order_by_payment_ref(&mut self, payment_ref: &str) -> Result<Option<Order>>;

    /// Writes the order's status, payment status and failure reason.
    async fn update_order_status(&mut self, order: &Order) -> Result<()>;

    /// Commits the transaction.
    async fn commit(self) -> Result<()>;
}
