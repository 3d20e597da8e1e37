//! Payment provider webhook endpoint.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use payments::PaymentProvider;
use serde::Serialize;
use store::Store;

use crate::AppState;
use crate::error::ApiError;

/// Header carrying the provider's webhook signature.
pub const SIGNATURE_HEADER: &str = "stripe-signature";

#[derive(Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    pub outcome: &'static str,
}

/// POST /payments/webhook: apply a signed provider notification.
///
/// The raw body is passed through untouched; signatures are computed over
/// the exact bytes the provider sent.
#[tracing::instrument(skip_all)]
pub async fn webhook<S, P>(
    State(state): State<Arc<AppState<S, P>>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<WebhookResponse>, ApiError>
where
    S: Store + Clone + 'static,
    P: PaymentProvider + ?Sized + 'static,
{
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    let outcome = state
        .engine
        .reconciler
        .handle_provider_event(&body, signature)
        .await?;

    Ok(Json(WebhookResponse {
        status: "success",
        outcome: outcome.as_str(),
    }))
}
