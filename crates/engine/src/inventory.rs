//! Inventory ledger: the only writer of product stock.

use common::ProductId;
use store::{Store, Transaction};

use crate::error::{EngineError, Result};

/// Authoritative stock operations over a [`Store`].
///
/// Each standalone operation runs in its own transaction. The `*_in`
/// functions run inside a caller's transaction so stock moves commit or roll
/// back together with order state.
#[derive(Clone)]
pub struct InventoryLedger<S> {
    store: S,
}

impl<S: Store> InventoryLedger<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns true if current stock covers `quantity`. Reads only.
    pub async fn check_availability(&self, product_id: &ProductId, quantity: u32) -> Result<bool> {
        let mut tx = self.store.begin().await?;
        check_availability_in(&mut tx, product_id, quantity).await
    }

    /// Takes `quantity` out of stock, returning what remains.
    #[tracing::instrument(skip(self))]
    pub async fn debit(&self, product_id: &ProductId, quantity: u32) -> Result<u32> {
        let mut tx = self.store.begin().await?;
        let remaining = debit_in(&mut tx, product_id, quantity).await?;
        tx.commit().await?;
        Ok(remaining)
    }

    /// Puts `quantity` back into stock, returning the new level.
    #[tracing::instrument(skip(self))]
    pub async fn credit(&self, product_id: &ProductId, quantity: u32) -> Result<u32> {
        let mut tx = self.store.begin().await?;
        let stock = credit_in(&mut tx, product_id, quantity).await?;
        tx.commit().await?;
        Ok(stock)
    }
}

pub async fn check_availability_in<T: Transaction>(
    tx: &mut T,
    product_id: &ProductId,
    quantity: u32,
) -> Result<bool> {
    let product = tx
        .product(product_id)
        .await?
        .ok_or_else(|| EngineError::ProductNotFound(product_id.clone()))?;
    Ok(product.has_stock_for(quantity))
}

/// Debits stock inside `tx`.
///
/// The availability check happens in the same statement as the write, so two
/// concurrent debits can never take more than was there.
pub async fn debit_in<T: Transaction>(
    tx: &mut T,
    product_id: &ProductId,
    quantity: u32,
) -> Result<u32> {
    if let Some(remaining) = tx.debit_stock(product_id, quantity).await? {
        metrics::counter!("stock_debits_total").increment(1);
        tracing::debug!(%product_id, quantity, remaining, "stock debited");
        return Ok(remaining);
    }

    // Not applied: find out whether the product is missing or short.
    let product = tx
        .product(product_id)
        .await?
        .ok_or_else(|| EngineError::ProductNotFound(product_id.clone()))?;
    Err(EngineError::InsufficientStock {
        product_id: product_id.clone(),
        requested: quantity,
        available: product.stock,
    })
}

pub async fn credit_in<T: Transaction>(
    tx: &mut T,
    product_id: &ProductId,
    quantity: u32,
) -> Result<u32> {
    let stock = tx
        .credit_stock(product_id, quantity)
        .await?
        .ok_or_else(|| EngineError::ProductNotFound(product_id.clone()))?;
    tracing::debug!(%product_id, quantity, stock, "stock credited");
    Ok(stock)
}
