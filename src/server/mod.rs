//! HTTP server for the shop
//!
//! This module provides a `ServerBuilder` that wires:
//! - CRUD routes for every catalog and account entity
//! - cart, order, address and wishlist routes
//! - the payment webhook and health checks

pub mod builder;
pub mod crud;
pub mod handlers;
pub mod host;
pub mod router;

pub use builder::ServerBuilder;
pub use crud::{
    CrudDescriptor, CrudOptions, CrudState, EntityDescriptor, EntityRegistry, ParentScope,
};
pub use host::{ServerHost, Stores};
