//! Cart and checkout endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use common::ProductId;
use engine::{CartSummary, CheckoutReceipt};
use payments::PaymentProvider;
use serde::{Deserialize, Serialize};
use store::Store;

use crate::AppState;
use crate::error::ApiError;
use crate::extract::CurrentUser;

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    #[serde(alias = "productId")]
    pub product_id: String,
    pub quantity: i64,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartResponse {
    pub cart_id: String,
    pub items: Vec<CartLineResponse>,
    pub total_cents: i64,
}

#[derive(Serialize)]
pub struct CartLineResponse {
    pub product_id: String,
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub order_id: String,
    pub payment_handle: String,
    pub payment_ref: String,
    pub total_cents: i64,
}

impl From<CartSummary> for CartResponse {
    fn from(summary: CartSummary) -> Self {
        Self {
            cart_id: summary.cart_id.to_string(),
            items: summary
                .items
                .into_iter()
                .map(|line| CartLineResponse {
                    product_id: line.product_id.to_string(),
                    name: line.name,
                    quantity: line.quantity,
                    unit_price_cents: line.unit_price.cents(),
                    line_total_cents: line.line_total.cents(),
                })
                .collect(),
            total_cents: summary.total.cents(),
        }
    }
}

impl From<CheckoutReceipt> for CheckoutResponse {
    fn from(receipt: CheckoutReceipt) -> Self {
        Self {
            order_id: receipt.order_id.to_string(),
            payment_handle: receipt.payment_handle,
            payment_ref: receipt.payment_ref,
            total_cents: receipt.total.cents(),
        }
    }
}

// -- Handlers --

/// POST /cart/items: add a product to the caller's cart.
#[tracing::instrument(skip(state, payload))]
pub async fn add_item<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    CurrentUser(user_id): CurrentUser,
    payload: Result<Json<AddItemRequest>, JsonRejection>,
) -> Result<Json<CartResponse>, ApiError>
where
    S: Store + Clone + 'static,
    P: PaymentProvider + ?Sized + 'static,
{
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    if req.product_id.trim().is_empty() {
        return Err(ApiError::BadRequest("product_id must not be empty".to_string()));
    }

    let summary = state
        .engine
        .carts
        .add_item(user_id, &ProductId::new(req.product_id), req.quantity)
        .await?;
    Ok(Json(summary.into()))
}

/// GET /cart: the caller's cart at current prices.
#[tracing::instrument(skip(state))]
pub async fn view<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<CartResponse>, ApiError>
where
    S: Store + Clone + 'static,
    P: PaymentProvider + ?Sized + 'static,
{
    let summary = state.engine.carts.view(user_id).await?;
    Ok(Json(summary.into()))
}

/// POST /cart/checkout: turn the caller's cart into a pending order.
#[tracing::instrument(skip(state))]
pub async fn checkout<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError>
where
    S: Store + Clone + 'static,
    P: PaymentProvider + ?Sized + 'static,
{
    let receipt = state.engine.checkout.checkout(user_id).await?;
    Ok((StatusCode::CREATED, Json(receipt.into())))
}
