use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{Cart, CartId, CartItem, Order, OrderId, Product, ProductId, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    Result,
    store::{Store, Transaction},
};

#[derive(Debug, Clone, Default)]
struct State {
    products: HashMap<ProductId, Product>,
    carts: HashMap<CartId, Cart>,
    orders: HashMap<OrderId, Order>,
}

/// In-memory store implementation for testing and local development.
///
/// Transactions are serialized: each one holds the store lock for its whole
/// lifetime and works on a private copy of the state, which replaces the
/// shared state on commit. Dropping a transaction discards its copy.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with the given products.
    pub async fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let store = Self::new();
        {
            let mut state = store.state.lock().await;
            for product in products {
                state.products.insert(product.id.clone(), product);
            }
        }
        store
    }

    /// Returns the current stock of a product.
    pub async fn stock(&self, id: &ProductId) -> Option<u32> {
        self.state.lock().await.products.get(id).map(|p| p.stock)
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Returns the total number of carts stored.
    pub async fn cart_count(&self) -> usize {
        self.state.lock().await.carts.len()
    }
}

#[async_trait]
impl Store for InMemoryStore {
    type Tx = InMemoryTransaction;

    async fn begin(&self) -> Result<Self::Tx> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction { guard, working })
    }
}

/// Transaction over an [`InMemoryStore`].
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<State>,
    working: State,
}

impl InMemoryTransaction {
    fn cart_of(&self, user_id: UserId) -> Option<Cart> {
        self.working
            .carts
            .values()
            .find(|cart| cart.user_id == user_id)
            .cloned()
    }
}

#[async_trait]
impl Transaction for InMemoryTransaction {
    async fn product(&mut self, id: &ProductId) -> Result<Option<Product>> {
        Ok(self.working.products.get(id).cloned())
    }

    async fn upsert_product(&mut self, product: &Product) -> Result<()> {
        crate::store::check_product(product)?;
        self.working
            .products
            .insert(product.id.clone(), product.clone());
        Ok(())
    }

    async fn debit_stock(&mut self, id: &ProductId, quantity: u32) -> Result<Option<u32>> {
        let Some(product) = self.working.products.get_mut(id) else {
            return Ok(None);
        };

        match product.stock.checked_sub(quantity) {
            Some(remaining) => {
                product.stock = remaining;
                Ok(Some(remaining))
            }
            None => Ok(None),
        }
    }

    async fn credit_stock(&mut self, id: &ProductId, quantity: u32) -> Result<Option<u32>> {
        let Some(product) = self.working.products.get_mut(id) else {
            return Ok(None);
        };

        match product.stock.checked_add(quantity) {
            Some(stock) => {
                product.stock = stock;
                Ok(Some(stock))
            }
            None => Ok(None),
        }
    }

    async fn cart_by_user(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        Ok(self.cart_of(user_id))
    }

    async fn lock_cart_by_user(&mut self, user_id: UserId) -> Result<Option<Cart>> {
        // The whole store is already held by this transaction.
        Ok(self.cart_of(user_id))
    }

    async fn open_cart(&mut self, user_id: UserId, now: DateTime<Utc>) -> Result<Cart> {
        if let Some(cart) = self.cart_of(user_id) {
            return Ok(cart);
        }

        let cart = Cart::new(user_id, now);
        self.working.carts.insert(cart.id, cart.clone());
        Ok(cart)
    }

    async fn add_cart_item(
        &mut self,
        cart_id: CartId,
        product_id: &ProductId,
        quantity: u32,
    ) -> Result<CartItem> {
        let cart = self
            .working
            .carts
            .get_mut(&cart_id)
            .ok_or_else(|| crate::StoreError::Conflict {
                entity: "cart",
                reason: format!("cart {cart_id} no longer exists"),
            })?;

        if let Some(line) = cart
            .items
            .iter_mut()
            .find(|line| &line.product_id == product_id)
        {
            line.quantity = line.quantity.saturating_add(quantity);
            return Ok(line.clone());
        }

        let line = CartItem::new(cart_id, product_id.clone(), quantity);
        cart.items.push(line.clone());
        Ok(line)
    }

    async fn delete_cart(&mut self, cart_id: CartId, user_id: UserId) -> Result<bool> {
        match self.working.carts.get(&cart_id) {
            Some(cart) if cart.user_id == user_id => {
                self.working.carts.remove(&cart_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn insert_order(&mut self, order: &Order) -> Result<()> {
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn orders_by_user(&mut self, user_id: UserId) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self
            .working
            .orders
            .values()
            .filter(|order| order.user_id == user_id)
            .cloned()
            .collect();
        orders.sort_by_key(|order| order.created_at);
        Ok(orders)
    }

    async fn lock_order_by_payment_ref(&mut self, payment_ref: &str) -> Result<Option<Order>> {
        Ok(self
            .working
            .orders
            .values()
            .find(|order| order.payment_ref() == payment_ref)
            .cloned())
    }

    async fn update_order_status(&mut self, order: &Order) -> Result<()> {
        if let Some(stored) = self.working.orders.get_mut(&order.id) {
            *stored = Order::restore(
                stored.id,
                stored.user_id,
                stored.created_at,
                order.status(),
                order.payment_status(),
                stored.total(),
                stored.payment_ref().to_string(),
                order.failure_reason().map(String::from),
                stored.items().to_vec(),
            );
        }
        Ok(())
    }

    async fn commit(mut self) -> Result<()> {
        *self.guard = std::mem::take(&mut self.working);
        Ok(())
    }
}
