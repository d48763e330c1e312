//! # shop-rs
//!
//! An e-commerce backend built on a generic entity layer.
//!
//! ## Features
//!
//! - **Catalog CRUD**: products, categories, subcategories, brands, reviews,
//!   coupons and users, with per-entity authorization policies
//! - **Query features**: filtering with range operators, keyword search,
//!   field projection, sorting and pagination on every list route
//! - **Carts and coupons**: one cart per user, percentage coupons with expiry
//! - **Orders**: cash-on-delivery orders and gateway checkout sessions, with a
//!   signed, idempotent payment webhook and stock reservation
//! - **Accounts**: profile, saved addresses and wishlist
//! - **Pluggable storage**: in-memory stores by default, MongoDB behind the
//!   `mongodb_backend` feature
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use shop::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     ServerBuilder::new()
//!         .with_config(AppConfig::from_yaml_file("shop.yaml")?)
//!         .serve("127.0.0.1:3000")
//!         .await
//! }
//! ```

pub mod commerce;
pub mod config;
pub mod core;
pub mod entities;
pub mod integrations;
pub mod server;
pub mod storage;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core ===
    pub use crate::core::{
        Auth, AuthContext, AuthPolicy, AuthProvider, DataService, Entity, Filter,
        HeaderAuthProvider, NoAuthProvider, Page, QueryDefaults, QueryParams, QuerySpec, Role,
        ShopError,
    };

    // === Entities ===
    pub use crate::entities::{
        Address, Brand, Cart, CartItem, Category, Coupon, Order, OrderItem, PaymentMethod, Product,
        Review, ShippingAddress, SubCategory, User,
    };
    pub use crate::impl_entity;

    // === Commerce ===
    pub use crate::commerce::{
        AccountService, CartService, OrderService, StockLedger, StockPolicy, WebhookOutcome,
    };

    // === Integrations ===
    pub use crate::integrations::{
        EmailSender, ImagePipeline, ImageStore, InMemoryImageStore, InMemoryPaymentGateway,
        PaymentGateway, WebhookVerifier,
    };

    // === Storage ===
    pub use crate::storage::InMemoryDataService;
    #[cfg(feature = "mongodb_backend")]
    pub use crate::storage::MongoDataService;

    // === Config ===
    pub use crate::config::{AppConfig, EntityAuthConfig, EntityPolicies};

    // === Server ===
    pub use crate::server::{
        CrudDescriptor, EntityDescriptor, EntityRegistry, ServerBuilder, ServerHost, Stores,
    };

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use rust_decimal::Decimal;
    pub use serde::{Deserialize, Serialize};
    pub use uuid::Uuid;
}
