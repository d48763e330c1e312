//! `/orders` routes

use super::{member, shopper};
use crate::core::auth::{Auth, AuthPolicy};
use crate::core::query::QueryParams;
use crate::core::service::Page;
use crate::core::{JsonBody, Result};
use crate::entities::{Order, ShippingAddress};
use crate::integrations::CheckoutSession;
use crate::server::host::ServerHost;
use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

/// Body of order and checkout requests
#[derive(Debug, Default, Deserialize)]
pub struct PlaceOrder {
    #[serde(default)]
    pub shipping_address: Option<ShippingAddress>,
}

/// `POST /orders/{cart id}`: cash on delivery
pub async fn create_cash_order(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    Path(cart_id): Path<Uuid>,
    JsonBody(body): JsonBody<PlaceOrder>,
) -> Result<(StatusCode, Json<Order>)> {
    let owner = shopper(&ctx)?;
    let order = host
        .orders
        .create_cash_order(owner, cart_id, body.shipping_address)
        .await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// `POST /orders/checkout-session/{cart id}`
pub async fn create_checkout_session(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    Path(cart_id): Path<Uuid>,
    JsonBody(body): JsonBody<PlaceOrder>,
) -> Result<Json<CheckoutSession>> {
    let owner = shopper(&ctx)?;
    let session = host
        .orders
        .create_checkout_session(owner, cart_id, body.shipping_address)
        .await?;
    Ok(Json(session))
}

pub async fn list_orders(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    Query(params): Query<QueryParams>,
) -> Result<Json<Page>> {
    member(&ctx)?;
    let page = host.orders.list_orders(&ctx, &params, &host.config.query).await?;
    Ok(Json(page))
}

pub async fn get_order(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>> {
    member(&ctx)?;
    Ok(Json(host.orders.get_order(&ctx, id).await?))
}

/// `GET /orders/mine/{id}`
pub async fn get_my_order(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>> {
    let owner = member(&ctx)?;
    Ok(Json(host.orders.get_my_order(owner, id).await?))
}

pub async fn mark_paid(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>> {
    AuthPolicy::staff().enforce(&ctx)?;
    Ok(Json(host.orders.mark_paid(id).await?))
}

pub async fn mark_delivered(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>> {
    AuthPolicy::staff().enforce(&ctx)?;
    Ok(Json(host.orders.mark_delivered(id).await?))
}
