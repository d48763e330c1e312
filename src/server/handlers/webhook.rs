//! Payment gateway webhook

use crate::core::{Result, ShopError};
use crate::server::host::ServerHost;
use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use serde_json::{Value, json};
use std::sync::Arc;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

/// `POST /webhook-checkout`
///
/// The body is read raw so the signature can be checked over the exact bytes.
pub async fn checkout_webhook(
    State(host): State<Arc<ServerHost>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ShopError::Unauthorized(format!("missing {} header", SIGNATURE_HEADER)))?;

    let outcome = host.orders.complete_checkout_webhook(&body, signature).await?;
    if let Some(order) = outcome.order() {
        tracing::debug!(order = %order.id, "webhook processed");
    }
    Ok(Json(json!({ "received": true })))
}
