//! Integration tests for the MongoDB storage backend.
//!
//! # Requirements
//!
//! - Docker must be running (testcontainers launches a MongoDB container)
//! - Feature flag `mongodb_backend` must be enabled
//!
//! # Running
//!
//! ```sh
//! cargo test --features mongodb_backend --test mongodb_tests -- --test-threads=1
//! ```
//!
//! # Test isolation
//!
//! All tests share a single MongoDB container (via `OnceLock`). Each test
//! works in a database of its own.

#![cfg(feature = "mongodb_backend")]

use chrono::{Duration, Utc};
use mongodb::Client;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use shop::commerce::{StockAdjustment, StockLedger, StockPolicy};
use shop::core::service::find_page;
use shop::core::{DataService, Filter, QueryDefaults, QueryParams, ShopError};
use shop::entities::{Category, Coupon, Order, Product};
use shop::server::Stores;
use shop::storage::MongoDataService;
use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use testcontainers::runners::AsyncRunner;
use testcontainers_modules::mongo::Mongo;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Shared test environment (single container, fresh database per test)
// ---------------------------------------------------------------------------

struct MongoTestEnv {
    /// Dropping this stops the container
    _container: testcontainers::ContainerAsync<Mongo>,
    connection_url: String,
}

static TEST_ENV: OnceLock<MongoTestEnv> = OnceLock::new();

async fn init_mongo_env() -> &'static MongoTestEnv {
    if let Some(env) = TEST_ENV.get() {
        return env;
    }

    let container = Mongo::default()
        .start()
        .await
        .expect("Failed to start MongoDB container (is Docker running?)");

    let host = container.get_host().await.unwrap();
    let port = container.get_host_port_ipv4(27017).await.unwrap();
    let url = format!("mongodb://{}:{}", host, port);

    let _ = TEST_ENV.set(MongoTestEnv {
        _container: container,
        connection_url: url,
    });
    TEST_ENV.get().unwrap()
}

static DB_COUNTER: AtomicU64 = AtomicU64::new(0);

async fn mongo_database() -> mongodb::Database {
    let env = init_mongo_env().await;
    let client = Client::with_uri_str(&env.connection_url)
        .await
        .expect("Failed to connect to MongoDB");
    let db_num = DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    client.database(&format!("shop_test_{}", db_num))
}

fn product(category: Uuid, title: &str, price: Decimal, stock: i64) -> Product {
    Product {
        title: title.into(),
        description: format!("{} for testing", title),
        price,
        available_quantity: stock,
        category,
        ..Default::default()
    }
}

// ---------------------------------------------------------------------------
// Documents
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_find_and_delete() {
    let products = MongoDataService::<Product>::new(mongo_database().await);
    let created = products
        .create(product(Uuid::new_v4(), "Rust Handbook", dec!(39.99), 5))
        .await
        .unwrap();
    assert_eq!(created.slug, "rust-handbook");

    let found = products.find_by_id(&created.id).await.unwrap().expect("stored");
    assert_eq!(found.price, dec!(39.99));
    assert_eq!(found.title, "Rust Handbook");

    let deleted = products.find_by_id_and_delete(&created.id).await.unwrap();
    assert!(deleted.is_some());
    assert!(products.find_by_id(&created.id).await.unwrap().is_none());
    assert!(products.find_by_id_and_delete(&created.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unique_index_rejects_duplicates() {
    let categories = MongoDataService::<Category>::new(mongo_database().await);
    categories.ensure_indexes().await.unwrap();

    categories
        .create(Category {
            name: "Books".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let err = categories
        .create(Category {
            name: "Books".into(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, ShopError::AlreadyExists { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_payment_reference_is_unique_only_when_set() {
    let orders = MongoDataService::<Order>::new(mongo_database().await);
    orders.ensure_indexes().await.unwrap();
    let owner = Uuid::new_v4();

    for _ in 0..2 {
        orders
            .create(Order {
                owner,
                ..Default::default()
            })
            .await
            .unwrap();
    }

    let paid = || Order {
        owner,
        payment_reference: Some("cs_test_1".into()),
        ..Default::default()
    };
    orders.create(paid()).await.unwrap();
    let err = orders.create(paid()).await.unwrap_err();
    assert!(
        matches!(err, ShopError::AlreadyExists { ref field, .. } if field == "payment_reference"),
        "got {:?}",
        err
    );
}

#[tokio::test]
async fn test_stale_version_conflicts() {
    let coupons = MongoDataService::<Coupon>::new(mongo_database().await);
    let coupon = coupons
        .create(Coupon {
            name: "SAVE10".into(),
            discount: dec!(10),
            expires_at: Utc::now() + Duration::days(1),
            ..Default::default()
        })
        .await
        .unwrap();

    let mut first = coupon.clone();
    first.discount = dec!(15);
    let saved = coupons.replace_versioned(first).await.unwrap();
    assert_eq!(saved.version, coupon.version + 1);

    let mut stale = coupon;
    stale.discount = dec!(20);
    let err = coupons.replace_versioned(stale).await.unwrap_err();
    assert!(matches!(err, ShopError::Conflict { .. }), "got {:?}", err);
}

#[tokio::test]
async fn test_patch_merges_fields() {
    let products = MongoDataService::<Product>::new(mongo_database().await);
    let created = products
        .create(product(Uuid::new_v4(), "Chess Set", dec!(30), 2))
        .await
        .unwrap();

    let updated = products
        .find_by_id_and_update(&created.id, serde_json::json!({ "title": "Deluxe Chess Set" }))
        .await
        .unwrap();
    assert_eq!(updated.slug, "deluxe-chess-set");
    assert_eq!(updated.price, dec!(30));
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_query_pipeline_against_mongo() {
    let products = MongoDataService::<Product>::new(mongo_database().await);
    let category = Uuid::new_v4();
    let catalog = [
        ("Cheap Novel", dec!(10)),
        ("Rust Handbook", dec!(40)),
        ("Rust Atlas", dec!(90)),
    ];
    for (title, price) in catalog {
        products.create(product(category, title, price, 5)).await.unwrap();
    }

    let params = QueryParams::from_pairs([
        ("price[gte]", "40"),
        ("sort", "-price"),
        ("fields", "title,price"),
        ("limit", "1"),
    ]);
    let page = find_page::<Product>(&products, Filter::all(), &params, &QueryDefaults::default())
        .await
        .unwrap();
    assert_eq!(page.results, 1);
    assert_eq!(page.pagination.number_of_pages, 2);
    assert_eq!(page.data[0]["title"], "Rust Atlas");
    assert!(page.data[0].get("description").is_none());
    assert!(page.data[0].get("id").is_some());

    let params = QueryParams::from_pairs([("keyword", "rust ("), ("sort", "title")]);
    let page = find_page::<Product>(&products, Filter::all(), &params, &QueryDefaults::default())
        .await
        .unwrap();
    assert_eq!(page.results, 0);

    let params = QueryParams::from_pairs([("keyword", "RUST")]);
    let in_category = Filter::by("category", category.to_string());
    let page = find_page::<Product>(&products, in_category, &params, &QueryDefaults::default())
        .await
        .unwrap();
    assert_eq!(page.results, 2);
}

// ---------------------------------------------------------------------------
// Stock
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_stock_reject_is_all_or_nothing() {
    let products = MongoDataService::<Product>::new(mongo_database().await);
    let plenty = products
        .create(product(Uuid::new_v4(), "Plenty", dec!(5), 10))
        .await
        .unwrap();
    let scarce = products
        .create(product(Uuid::new_v4(), "Scarce", dec!(5), 1))
        .await
        .unwrap();

    let batch = [
        StockAdjustment {
            product: plenty.id,
            quantity: 3,
        },
        StockAdjustment {
            product: scarce.id,
            quantity: 2,
        },
    ];
    let err = products.apply(&batch, StockPolicy::Reject).await.unwrap_err();
    assert!(matches!(err, ShopError::OutOfStock { .. }), "got {:?}", err);

    let plenty_after = products.get(&plenty.id).await.unwrap();
    assert_eq!(plenty_after.available_quantity, 10);
    assert_eq!(plenty_after.units_sold, 0);

    products.apply(&batch[..1], StockPolicy::Reject).await.unwrap();
    let plenty_after = products.get(&plenty.id).await.unwrap();
    assert_eq!(plenty_after.available_quantity, 7);
    assert_eq!(plenty_after.units_sold, 3);

    products.apply(&batch, StockPolicy::Tolerate).await.unwrap();
    let scarce_after = products.get(&scarce.id).await.unwrap();
    assert_eq!(scarce_after.available_quantity, -1);
}

#[tokio::test]
async fn test_stores_share_one_database() {
    let database = mongo_database().await;
    let stores = Stores::mongodb(database).await.unwrap();

    let category = stores
        .categories
        .create(Category {
            name: "Garden".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    let created = stores
        .products
        .create(product(category.id, "Rake", dec!(12.5), 3))
        .await
        .unwrap();

    stores
        .stock
        .apply(
            &[StockAdjustment {
                product: created.id,
                quantity: 1,
            }],
            StockPolicy::Reject,
        )
        .await
        .unwrap();
    let after = stores.products.get(&created.id).await.unwrap();
    assert_eq!(after.available_quantity, 2);
}
