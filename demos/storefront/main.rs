//! Storefront example
//!
//! Seeds an in-memory shop with a category, two products, a coupon and an
//! admin, then serves the API.
//!
//! ```text
//! cargo run --example storefront -- demos/storefront/shop.yaml
//! ```
//!
//! Identity is read from `x-user-id` / `x-user-role` / `x-user-email` headers.

use anyhow::Result;
use chrono::Duration;
use rust_decimal::Decimal;
use shop::prelude::*;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,shop=debug")),
        )
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => AppConfig::from_yaml_file(&path)?,
        None => AppConfig::default(),
    };
    let bind = config.server.bind.clone();

    let stores = Stores::in_memory();
    seed(&stores).await?;

    ServerBuilder::new()
        .with_config(config)
        .with_stores(stores)
        .serve(&bind)
        .await
}

async fn seed(stores: &Stores) -> Result<()> {
    let books = stores
        .categories
        .create(Category {
            name: "Books".into(),
            ..Default::default()
        })
        .await?;

    for (title, price, stock) in [("The Rust Book", 39, 25), ("Zero to Production", 45, 3)] {
        let product = stores
            .products
            .create(Product {
                title: title.into(),
                description: format!("{} in paperback", title),
                price: Decimal::from(price),
                available_quantity: stock,
                category: books.id,
                ..Default::default()
            })
            .await?;
        tracing::info!(id = %product.id, title = %product.title, "product seeded");
    }

    stores
        .coupons
        .create(Coupon {
            name: "WELCOME10".into(),
            discount: Decimal::from(10),
            expires_at: Utc::now() + Duration::days(30),
            ..Default::default()
        })
        .await?;

    let admin = stores
        .users
        .create(User::new("Shop Admin", "admin@example.com", Role::Admin))
        .await?;
    tracing::info!(id = %admin.id, "admin seeded; send it as x-user-id with x-user-role: admin");

    Ok(())
}
