//! Read access to a user's orders.

use common::{OrderId, UserId};
use domain::Order;
use store::{Store, Transaction};

use crate::error::{EngineError, Result};

#[derive(Clone)]
pub struct OrderQueries<S> {
    store: S,
}

impl<S: Store> OrderQueries<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Loads one of the user's orders.
    ///
    /// Another user's order is reported as not found.
    pub async fn get(&self, user_id: UserId, order_id: OrderId) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        tx.order(order_id)
            .await?
            .filter(|order| order.user_id == user_id)
            .ok_or(EngineError::OrderNotFound(order_id))
    }

    /// Lists the user's orders, oldest first.
    pub async fn list(&self, user_id: UserId) -> Result<Vec<Order>> {
        let mut tx = self.store.begin().await?;
        Ok(tx.orders_by_user(user_id).await?)
    }
}
