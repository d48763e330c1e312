//! Server host holding every store and service behind the HTTP layer
//!
//! The host is transport-agnostic: handlers receive it as shared state and
//! call into the commerce services or the stores directly.

use crate::commerce::{AccountService, CartService, OrderService, OrderSettings, StockLedger};
use crate::config::AppConfig;
use crate::core::auth::AuthProvider;
use crate::core::DataService;
use crate::entities::{Brand, Cart, Category, Coupon, Order, Product, Review, SubCategory, User};
use crate::integrations::{EmailSender, ImagePipeline, PaymentGateway};
use crate::storage::InMemoryDataService;
use std::sync::Arc;

/// One store handle per entity, plus the stock ledger over products
#[derive(Clone)]
pub struct Stores {
    pub products: Arc<dyn DataService<Product>>,
    pub categories: Arc<dyn DataService<Category>>,
    pub sub_categories: Arc<dyn DataService<SubCategory>>,
    pub brands: Arc<dyn DataService<Brand>>,
    pub reviews: Arc<dyn DataService<Review>>,
    pub coupons: Arc<dyn DataService<Coupon>>,
    pub users: Arc<dyn DataService<User>>,
    pub carts: Arc<dyn DataService<Cart>>,
    pub orders: Arc<dyn DataService<Order>>,
    pub stock: Arc<dyn StockLedger>,
}

impl Stores {
    /// Process-local stores
    pub fn in_memory() -> Self {
        let products = Arc::new(InMemoryDataService::<Product>::new());
        Self {
            products: products.clone(),
            categories: Arc::new(InMemoryDataService::<Category>::new()),
            sub_categories: Arc::new(InMemoryDataService::<SubCategory>::new()),
            brands: Arc::new(InMemoryDataService::<Brand>::new()),
            reviews: Arc::new(InMemoryDataService::<Review>::new()),
            coupons: Arc::new(InMemoryDataService::<Coupon>::new()),
            users: Arc::new(InMemoryDataService::<User>::new()),
            carts: Arc::new(InMemoryDataService::<Cart>::new()),
            orders: Arc::new(InMemoryDataService::<Order>::new()),
            stock: products,
        }
    }

    /// Collections in a MongoDB database, with unique indexes in place
    #[cfg(feature = "mongodb_backend")]
    pub async fn mongodb(database: mongodb::Database) -> crate::core::Result<Self> {
        use crate::storage::MongoDataService;

        let products = Arc::new(MongoDataService::<Product>::new(database.clone()));
        let categories = Arc::new(MongoDataService::<Category>::new(database.clone()));
        let sub_categories = Arc::new(MongoDataService::<SubCategory>::new(database.clone()));
        let brands = Arc::new(MongoDataService::<Brand>::new(database.clone()));
        let coupons = Arc::new(MongoDataService::<Coupon>::new(database.clone()));
        let users = Arc::new(MongoDataService::<User>::new(database.clone()));
        let carts = Arc::new(MongoDataService::<Cart>::new(database.clone()));
        let orders = Arc::new(MongoDataService::<Order>::new(database.clone()));

        categories.ensure_indexes().await?;
        sub_categories.ensure_indexes().await?;
        brands.ensure_indexes().await?;
        coupons.ensure_indexes().await?;
        users.ensure_indexes().await?;
        carts.ensure_indexes().await?;
        orders.ensure_indexes().await?;

        Ok(Self {
            products: products.clone(),
            categories,
            sub_categories,
            brands,
            reviews: Arc::new(MongoDataService::<Review>::new(database.clone())),
            coupons,
            users,
            carts,
            orders,
            stock: products,
        })
    }
}

/// Host context shared by every handler
pub struct ServerHost {
    pub config: Arc<AppConfig>,
    pub stores: Stores,
    pub carts: CartService,
    pub orders: OrderService,
    pub accounts: AccountService,
    pub images: ImagePipeline,
    pub auth_provider: Arc<dyn AuthProvider>,
}

impl ServerHost {
    /// Wire the services on top of the stores and collaborators
    pub fn new(
        config: AppConfig,
        stores: Stores,
        auth_provider: Arc<dyn AuthProvider>,
        payments: Arc<dyn PaymentGateway>,
        images: ImagePipeline,
        mailer: Arc<dyn EmailSender>,
    ) -> Self {
        let carts = CartService::new(
            stores.carts.clone(),
            stores.products.clone(),
            stores.coupons.clone(),
            config.commerce.stock_policy,
        );
        let orders = OrderService::new(
            stores.orders.clone(),
            stores.carts.clone(),
            stores.users.clone(),
            stores.stock.clone(),
            payments,
            OrderSettings::from_config(&config),
        );
        let accounts = AccountService::new(stores.users.clone(), stores.products.clone(), mailer);

        Self {
            config: Arc::new(config),
            stores,
            carts,
            orders,
            accounts,
            images,
            auth_provider,
        }
    }
}
