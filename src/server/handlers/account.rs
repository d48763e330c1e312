//! `/users/me`, `/addresses`, `/wishlist` and user suspension routes

use super::{member, shopper};
use crate::commerce::ProfileUpdate;
use crate::core::auth::{Auth, AuthPolicy, Role};
use crate::core::{Result, ValidatedJson};
use crate::entities::{Address, AddressPatch, NewAddress, Product, User};
use crate::server::host::ServerHost;
use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct WishlistEntry {
    pub product_id: Uuid,
}

// -- profile ------------------------------------------------------------------

pub async fn get_me(State(host): State<Arc<ServerHost>>, Auth(ctx): Auth) -> Result<Json<User>> {
    let user_id = member(&ctx)?;
    Ok(Json(host.accounts.get_me(user_id).await?))
}

pub async fn update_me(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    ValidatedJson(update): ValidatedJson<ProfileUpdate>,
) -> Result<Json<User>> {
    let user_id = member(&ctx)?;
    Ok(Json(host.accounts.update_me(user_id, update).await?))
}

pub async fn deactivate_me(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
) -> Result<StatusCode> {
    let user_id = member(&ctx)?;
    host.accounts.deactivate_me(user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// -- administration -----------------------------------------------------------

pub async fn suspend_user(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
) -> Result<Json<User>> {
    AuthPolicy::HasRole(vec![Role::Admin]).enforce(&ctx)?;
    Ok(Json(host.accounts.suspend_user(id).await?))
}

pub async fn unsuspend_user(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
) -> Result<Json<User>> {
    AuthPolicy::HasRole(vec![Role::Admin]).enforce(&ctx)?;
    Ok(Json(host.accounts.unsuspend_user(id).await?))
}

// -- addresses ----------------------------------------------------------------

pub async fn add_address(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    ValidatedJson(address): ValidatedJson<NewAddress>,
) -> Result<(StatusCode, Json<Vec<Address>>)> {
    let user_id = shopper(&ctx)?;
    let addresses = host.accounts.add_address(user_id, address).await?;
    Ok((StatusCode::CREATED, Json(addresses)))
}

pub async fn list_addresses(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
) -> Result<Json<Vec<Address>>> {
    let user_id = shopper(&ctx)?;
    Ok(Json(host.accounts.list_addresses(user_id).await?))
}

pub async fn get_address(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
) -> Result<Json<Address>> {
    let user_id = shopper(&ctx)?;
    Ok(Json(host.accounts.get_address(user_id, id).await?))
}

pub async fn update_address(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
    ValidatedJson(patch): ValidatedJson<AddressPatch>,
) -> Result<Json<Address>> {
    let user_id = shopper(&ctx)?;
    Ok(Json(host.accounts.update_address(user_id, id, patch).await?))
}

pub async fn remove_address(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Address>>> {
    let user_id = shopper(&ctx)?;
    Ok(Json(host.accounts.remove_address(user_id, id).await?))
}

// -- wishlist -----------------------------------------------------------------

pub async fn add_to_wishlist(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    ValidatedJson(entry): ValidatedJson<WishlistEntry>,
) -> Result<Json<Vec<Uuid>>> {
    let user_id = shopper(&ctx)?;
    Ok(Json(host.accounts.add_to_wishlist(user_id, entry.product_id).await?))
}

pub async fn remove_from_wishlist(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
    Path(product_id): Path<Uuid>,
) -> Result<Json<Vec<Uuid>>> {
    let user_id = shopper(&ctx)?;
    Ok(Json(host.accounts.remove_from_wishlist(user_id, product_id).await?))
}

pub async fn list_wishlist(
    State(host): State<Arc<ServerHost>>,
    Auth(ctx): Auth,
) -> Result<Json<Vec<Product>>> {
    let user_id = shopper(&ctx)?;
    Ok(Json(host.accounts.list_wishlist(user_id).await?))
}
