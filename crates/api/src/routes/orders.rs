//! Order read endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use common::OrderId;
use domain::Order;
use payments::PaymentProvider;
use serde::Serialize;
use store::Store;

use crate::AppState;
use crate::error::ApiError;
use crate::extract::CurrentUser;

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub status: String,
    pub payment_status: String,
    pub payment_ref: String,
    pub total_cents: i64,
    pub failure_reason: Option<String>,
    pub created_at: String,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Serialize)]
pub struct OrderItemResponse {
    pub product_id: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
}

impl From<&Order> for OrderResponse {
    fn from(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            user_id: order.user_id.to_string(),
            status: order.status().to_string(),
            payment_status: order.payment_status().to_string(),
            payment_ref: order.payment_ref().to_string(),
            total_cents: order.total().cents(),
            failure_reason: order.failure_reason().map(String::from),
            created_at: order.created_at.to_rfc3339(),
            items: order
                .items()
                .iter()
                .map(|item| OrderItemResponse {
                    product_id: item.product_id.to_string(),
                    quantity: item.quantity,
                    unit_price_cents: item.unit_price.cents(),
                    line_total_cents: item.line_total().cents(),
                })
                .collect(),
        }
    }
}

// -- Handlers --

/// GET /orders/{id}: one of the caller's orders.
#[tracing::instrument(skip(state))]
pub async fn get<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    CurrentUser(user_id): CurrentUser,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError>
where
    S: Store + Clone + 'static,
    P: PaymentProvider + ?Sized + 'static,
{
    let order_id = parse_order_id(&id)?;
    let order = state.engine.orders.get(user_id, order_id).await?;
    Ok(Json(OrderResponse::from(&order)))
}

/// GET /orders: the caller's orders, oldest first.
#[tracing::instrument(skip(state))]
pub async fn list<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    CurrentUser(user_id): CurrentUser,
) -> Result<Json<Vec<OrderResponse>>, ApiError>
where
    S: Store + Clone + 'static,
    P: PaymentProvider + ?Sized + 'static,
{
    let orders = state.engine.orders.list(user_id).await?;
    Ok(Json(orders.iter().map(OrderResponse::from).collect()))
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}
