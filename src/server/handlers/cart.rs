//! `/cart` routes

use super::shopper;
use crate::core::auth::Auth;
use crate::core::{Result, ValidatedJson};
use crate::entities::Cart;
use crate::server::host::ServerHost;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub num_of_cart_items: usize,
    pub data: Cart,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        Self {
            num_of_cart_items: cart.item_count(),
            data: cart,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct AddToCart {
    pub product_id: Uuid,
    #[validate(length(min = 1))]
    pub color: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct QuantityUpdate {
    #[validate(range(min = 1))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ApplyCoupon {
    #[validate(length(min = 1))]
    pub coupon: String,
}

pub async fn add_to_cart(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    ValidatedJson(body): ValidatedJson<AddToCart>,
) -> Result<Json<CartResponse>> {
    let owner = shopper(&ctx)?;
    let cart = host.carts.add_item(owner, body.product_id, body.color).await?;
    Ok(Json(cart.into()))
}

pub async fn get_cart(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
) -> Result<Json<CartResponse>> {
    let owner = shopper(&ctx)?;
    Ok(Json(host.carts.get_cart(owner).await?.into()))
}

pub async fn clear_cart(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
) -> Result<StatusCode> {
    let owner = shopper(&ctx)?;
    host.carts.clear_cart(owner).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn update_item_quantity(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    Path(item_id): Path<Uuid>,
    ValidatedJson(body): ValidatedJson<QuantityUpdate>,
) -> Result<Json<CartResponse>> {
    let owner = shopper(&ctx)?;
    let cart = host.carts.update_item_quantity(owner, item_id, body.quantity).await?;
    Ok(Json(cart.into()))
}

pub async fn remove_item(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    Path(item_id): Path<Uuid>,
) -> Result<Json<CartResponse>> {
    let owner = shopper(&ctx)?;
    Ok(Json(host.carts.remove_item(owner, item_id).await?.into()))
}

pub async fn apply_coupon(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    ValidatedJson(body): ValidatedJson<ApplyCoupon>,
) -> Result<Json<CartResponse>> {
    let owner = shopper(&ctx)?;
    Ok(Json(host.carts.apply_coupon(owner, &body.coupon).await?.into()))
}
