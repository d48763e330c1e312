//! HTTP handlers for the shop's non-CRUD routes
//!
//! Every handler receives the shared [`ServerHost`](super::host::ServerHost)
//! and delegates to a commerce service.

pub mod account;
pub mod cart;
pub mod catalog;
pub mod orders;
pub mod webhook;

use crate::core::auth::{AuthContext, AuthPolicy, Role};
use crate::core::Result;
use axum::Json;
use serde_json::{Value, json};
use uuid::Uuid;

/// The caller's id, provided they shop with the `user` role
pub(crate) fn shopper(ctx: &AuthContext) -> Result<Uuid> {
    AuthPolicy::HasRole(vec![Role::User]).enforce(ctx)?;
    ctx.require_user()
}

/// The caller's id, any role
pub(crate) fn member(ctx: &AuthContext) -> Result<Uuid> {
    AuthPolicy::Authenticated.enforce(ctx)?;
    ctx.require_user()
}

/// `GET /health`
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": "shop-rs"
    }))
}
