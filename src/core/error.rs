//! Typed error handling for the shop
//!
//! Every core operation returns [`ShopError`] instead of a generic
//! `anyhow::Error`, so handlers can map failures to HTTP responses and
//! callers can match on specific cases.
//!
//! # Example
//!
//! ```rust,ignore
//! match carts.get_cart(user_id).await {
//!     Ok(cart) => println!("{} items", cart.items.len()),
//!     Err(ShopError::NotFound { .. }) => println!("no cart yet"),
//!     Err(e) => eprintln!("other error: {}", e),
//! }
//! ```

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use uuid::Uuid;

/// Result alias used across the core, storage and commerce layers
pub type Result<T, E = ShopError> = std::result::Result<T, E>;

/// The main error type of the shop
#[derive(Debug, thiserror::Error)]
pub enum ShopError {
    /// A document looked up by id (or by a unique key) does not exist
    #[error("{entity_type} '{id}' not found")]
    NotFound { entity_type: String, id: String },

    /// A unique key is already taken
    #[error("{entity_type} with {field} '{value}' already exists")]
    AlreadyExists {
        entity_type: String,
        field: String,
        value: String,
    },

    /// Optimistic concurrency check failed (document changed underneath)
    #[error("{entity_type} '{id}' was modified concurrently")]
    Conflict { entity_type: String, id: Uuid },

    /// Coupon missing, expired or not applicable
    #[error("{0}")]
    InvalidOrExpired(String),

    /// Illegal state transition
    #[error("{0}")]
    InvalidState(String),

    /// Stock adjustment would drive availability negative
    #[error("product '{product}' has {available} units available, {requested} requested")]
    OutOfStock {
        product: Uuid,
        requested: i64,
        available: i64,
    },

    /// Malformed input (body, path or query string)
    #[error("{0}")]
    Validation(String),

    /// Missing or invalid credentials / signature
    #[error("{0}")]
    Unauthorized(String),

    /// Authenticated but not allowed
    #[error("{0}")]
    Forbidden(String),

    /// A collaborator (payment gateway, image store, email) failed
    #[error("{service} failed: {message}")]
    Upstream { service: String, message: String },

    /// Storage backend failure
    #[error("storage error: {0}")]
    Storage(String),

    /// Should not happen in normal operation
    #[error("internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Optional additional details
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ShopError {
    /// Shorthand for a [`ShopError::NotFound`]
    pub fn not_found(entity_type: impl Into<String>, id: impl ToString) -> Self {
        ShopError::NotFound {
            entity_type: entity_type.into(),
            id: id.to_string(),
        }
    }

    /// Shorthand for a [`ShopError::Upstream`]
    pub fn upstream(service: impl Into<String>, message: impl ToString) -> Self {
        ShopError::Upstream {
            service: service.into(),
            message: message.to_string(),
        }
    }

    /// Shorthand for a [`ShopError::Storage`]
    pub fn storage(message: impl ToString) -> Self {
        ShopError::Storage(message.to_string())
    }

    /// HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ShopError::NotFound { .. } => StatusCode::NOT_FOUND,
            ShopError::AlreadyExists { .. } => StatusCode::CONFLICT,
            ShopError::Conflict { .. } => StatusCode::CONFLICT,
            ShopError::InvalidOrExpired(_) => StatusCode::BAD_REQUEST,
            ShopError::InvalidState(_) => StatusCode::BAD_REQUEST,
            ShopError::OutOfStock { .. } => StatusCode::CONFLICT,
            ShopError::Validation(_) => StatusCode::BAD_REQUEST,
            ShopError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ShopError::Forbidden(_) => StatusCode::FORBIDDEN,
            ShopError::Upstream { .. } => StatusCode::BAD_GATEWAY,
            ShopError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ShopError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable error code for this error
    pub fn error_code(&self) -> &'static str {
        match self {
            ShopError::NotFound { .. } => "NOT_FOUND",
            ShopError::AlreadyExists { .. } => "ALREADY_EXISTS",
            ShopError::Conflict { .. } => "CONFLICT",
            ShopError::InvalidOrExpired(_) => "INVALID_OR_EXPIRED",
            ShopError::InvalidState(_) => "INVALID_STATE",
            ShopError::OutOfStock { .. } => "OUT_OF_STOCK",
            ShopError::Validation(_) => "VALIDATION_ERROR",
            ShopError::Unauthorized(_) => "UNAUTHORIZED",
            ShopError::Forbidden(_) => "FORBIDDEN",
            ShopError::Upstream { .. } => "UPSTREAM_FAILURE",
            ShopError::Storage(_) => "STORAGE_ERROR",
            ShopError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Convert to an error response body
    pub fn to_response(&self) -> ErrorResponse {
        ErrorResponse {
            code: self.error_code().to_string(),
            message: self.to_string(),
            details: self.details(),
        }
    }

    fn details(&self) -> Option<serde_json::Value> {
        match self {
            ShopError::NotFound { entity_type, id } => Some(serde_json::json!({
                "entity_type": entity_type,
                "id": id,
            })),
            ShopError::OutOfStock {
                product,
                requested,
                available,
            } => Some(serde_json::json!({
                "product": product.to_string(),
                "requested": requested,
                "available": available,
            })),
            ShopError::Upstream { service, .. } => Some(serde_json::json!({ "service": service })),
            _ => None,
        }
    }
}

impl IntoResponse for ShopError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.error_code(), error = %self, "request failed");
        }
        (status, Json(self.to_response())).into_response()
    }
}

impl From<serde_json::Error> for ShopError {
    fn from(err: serde_json::Error) -> Self {
        ShopError::Validation(format!("invalid document: {}", err))
    }
}

impl From<validator::ValidationErrors> for ShopError {
    fn from(err: validator::ValidationErrors) -> Self {
        ShopError::Validation(err.to_string())
    }
}
