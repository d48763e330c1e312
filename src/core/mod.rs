//! Core module containing fundamental traits and types for the shop

pub mod auth;
pub mod entity;
pub mod error;
pub mod extract;
pub mod query;
pub mod service;

pub use auth::{
    Auth, AuthContext, AuthPolicy, AuthProvider, HeaderAuthProvider, NoAuthProvider, Role,
};
pub use entity::{Entity, EntityKind, slugify};
pub use error::{ErrorResponse, Result, ShopError};
pub use extract::{JsonBody, ValidatedJson};
pub use query::{Filter, Pagination, QueryDefaults, QueryParams, QuerySpec};
pub use service::{DataService, Page};
