//! Order placement, payment webhook handling and order state changes

use crate::commerce::inventory::{StockAdjustment, StockLedger, StockPolicy};
use crate::config::AppConfig;
use crate::core::auth::{AuthContext, Role};
use crate::core::query::{Filter, QueryDefaults, QueryParams};
use crate::core::service::{Page, find_page};
use crate::core::{DataService, Result, ShopError};
use crate::entities::{Cart, Order, OrderItem, PaymentMethod, ShippingAddress, User};
use crate::integrations::payment::{
    CheckoutSession, CheckoutSessionRequest, CompletedCheckout, GatewayEvent, PaymentGateway,
};
use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use std::collections::BTreeMap;
use std::sync::Arc;
use uuid::Uuid;

/// Pricing and checkout settings used when placing orders
#[derive(Debug, Clone)]
pub struct OrderSettings {
    pub currency: String,
    pub tax_price: Decimal,
    pub shipping_price: Decimal,
    pub stock_policy: StockPolicy,
    pub success_url: String,
    pub cancel_url: String,
}

impl OrderSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            currency: config.commerce.currency.clone(),
            tax_price: config.commerce.tax_price,
            shipping_price: config.commerce.shipping_price,
            stock_policy: config.commerce.stock_policy,
            success_url: config.payment.success_url.clone(),
            cancel_url: config.payment.cancel_url.clone(),
        }
    }
}

impl Default for OrderSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// Result of processing one webhook delivery
#[derive(Debug, Clone, PartialEq)]
pub enum WebhookOutcome {
    /// Verified event of a type the shop does not act on
    Ignored(String),
    Created(Order),
    /// The session was already turned into this order
    Duplicate(Order),
}

impl WebhookOutcome {
    pub fn order(&self) -> Option<&Order> {
        match self {
            Self::Created(order) | Self::Duplicate(order) => Some(order),
            Self::Ignored(_) => None,
        }
    }
}

const SHIPPING_KEYS: [&str; 4] = ["details", "phone", "city", "postal_code"];

fn shipping_metadata(shipping: Option<&ShippingAddress>) -> BTreeMap<String, String> {
    let Some(shipping) = shipping else {
        return BTreeMap::new();
    };
    let values = [
        &shipping.details,
        &shipping.phone,
        &shipping.city,
        &shipping.postal_code,
    ];
    SHIPPING_KEYS
        .iter()
        .zip(values)
        .filter_map(|(key, value)| value.as_ref().map(|v| (key.to_string(), v.clone())))
        .collect()
}

fn shipping_from_metadata(metadata: &BTreeMap<String, String>) -> Option<ShippingAddress> {
    if !SHIPPING_KEYS.iter().any(|key| metadata.contains_key(*key)) {
        return None;
    }
    Some(ShippingAddress {
        details: metadata.get("details").cloned(),
        phone: metadata.get("phone").cloned(),
        city: metadata.get("city").cloned(),
        postal_code: metadata.get("postal_code").cloned(),
    })
}

/// Amount in the currency's minor unit
fn to_minor_units(amount: Decimal) -> Result<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .ok_or_else(|| ShopError::Internal(format!("amount {} is out of range", amount)))
}

/// Order service
#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn DataService<Order>>,
    carts: Arc<dyn DataService<Cart>>,
    users: Arc<dyn DataService<User>>,
    stock: Arc<dyn StockLedger>,
    payments: Arc<dyn PaymentGateway>,
    settings: OrderSettings,
}

impl OrderService {
    pub fn new(
        orders: Arc<dyn DataService<Order>>,
        carts: Arc<dyn DataService<Cart>>,
        users: Arc<dyn DataService<User>>,
        stock: Arc<dyn StockLedger>,
        payments: Arc<dyn PaymentGateway>,
        settings: OrderSettings,
    ) -> Self {
        Self {
            orders,
            carts,
            users,
            stock,
            payments,
            settings,
        }
    }

    pub fn settings(&self) -> &OrderSettings {
        &self.settings
    }

    /// A non-empty cart owned by `owner`
    async fn owned_cart(&self, owner: Uuid, cart_id: Uuid) -> Result<Cart> {
        let cart = self
            .carts
            .find_by_id(&cart_id)
            .await?
            .filter(|cart| cart.owner == owner)
            .ok_or_else(|| ShopError::not_found("cart", cart_id))?;
        if cart.is_empty() {
            return Err(ShopError::InvalidState("cart is empty".into()));
        }
        Ok(cart)
    }

    fn order_total(&self, cart: &Cart) -> Decimal {
        cart.effective_total() + self.settings.tax_price + self.settings.shipping_price
    }

    fn draft(&self, owner: Uuid, cart: &Cart, shipping: Option<ShippingAddress>) -> Order {
        Order {
            owner,
            items: cart.items.iter().map(OrderItem::from).collect(),
            shipping_address: shipping,
            tax_price: self.settings.tax_price,
            shipping_price: self.settings.shipping_price,
            total_order_price: self.order_total(cart),
            ..Default::default()
        }
    }

    /// Reserve stock, persist the order, then drop the cart.
    ///
    /// Stock is released again if the order cannot be stored. Once the order
    /// exists nothing is rolled back.
    async fn place_order(&self, order: Order, cart_id: Uuid) -> Result<Order> {
        let adjustments = StockAdjustment::from_items(&order.items);
        self.stock.apply(&adjustments, self.settings.stock_policy).await?;

        let order = match self.orders.create(order).await {
            Ok(order) => order,
            Err(err) => {
                if let Err(release_err) = self.stock.release(&adjustments).await {
                    tracing::error!(
                        cart = %cart_id,
                        error = %release_err,
                        "failed to release reserved stock"
                    );
                }
                return Err(err);
            }
        };

        if let Err(err) = self.carts.find_by_id_and_delete(&cart_id).await {
            tracing::error!(
                order = %order.id,
                cart = %cart_id,
                error = %err,
                "order placed but cart was not removed"
            );
            return Err(err);
        }

        tracing::info!(
            order = %order.id,
            owner = %order.owner,
            total = %order.total_order_price,
            method = ?order.payment_method,
            "order placed"
        );
        Ok(order)
    }

    /// Turn the user's cart into a cash-on-delivery order
    pub async fn create_cash_order(
        &self,
        owner: Uuid,
        cart_id: Uuid,
        shipping: Option<ShippingAddress>,
    ) -> Result<Order> {
        let cart = self.owned_cart(owner, cart_id).await?;
        let order = Order {
            payment_method: PaymentMethod::Cash,
            ..self.draft(owner, &cart, shipping)
        };
        self.place_order(order, cart.id).await
    }

    /// Open a gateway checkout session for the user's cart
    pub async fn create_checkout_session(
        &self,
        owner: Uuid,
        cart_id: Uuid,
        shipping: Option<ShippingAddress>,
    ) -> Result<CheckoutSession> {
        let cart = self.owned_cart(owner, cart_id).await?;
        let user = self.users.get(&owner).await?;

        let request = CheckoutSessionRequest {
            amount_minor: to_minor_units(self.order_total(&cart))?,
            currency: self.settings.currency.clone(),
            buyer_name: user.name,
            buyer_email: user.email,
            success_url: self.settings.success_url.clone(),
            cancel_url: self.settings.cancel_url.clone(),
            reference: cart.id.to_string(),
            metadata: shipping_metadata(shipping.as_ref()),
        };

        let session = self.payments.create_checkout_session(request).await?;
        tracing::info!(
            session = %session.id,
            cart = %cart.id,
            amount = session.amount_total,
            "checkout session created"
        );
        Ok(session)
    }

    /// Handle a signed webhook delivery from the payment gateway.
    ///
    /// Replays of an already processed session return the existing order.
    pub async fn complete_checkout_webhook(
        &self,
        payload: &[u8],
        signature: &str,
    ) -> Result<WebhookOutcome> {
        let checkout = match self.payments.verify_event(payload, signature)? {
            GatewayEvent::CheckoutCompleted(checkout) => checkout,
            GatewayEvent::Other(event_type) => {
                tracing::debug!(event = %event_type, "webhook event ignored");
                return Ok(WebhookOutcome::Ignored(event_type));
            }
        };

        let session_id = checkout.session_id.clone();
        if let Some(existing) = self.order_for_session(&session_id).await? {
            tracing::info!(
                session = %session_id,
                order = %existing.id,
                "duplicate checkout completion"
            );
            return Ok(WebhookOutcome::Duplicate(existing));
        }

        match self.card_order(checkout).await {
            Ok(order) => Ok(WebhookOutcome::Created(order)),
            // A concurrent delivery of the same session won the unique
            // payment reference or already consumed the cart.
            Err(err @ (ShopError::AlreadyExists { .. } | ShopError::NotFound { .. })) => {
                match self.order_for_session(&session_id).await? {
                    Some(existing) => {
                        tracing::info!(
                            session = %session_id,
                            order = %existing.id,
                            "concurrent checkout completion"
                        );
                        Ok(WebhookOutcome::Duplicate(existing))
                    }
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn order_for_session(&self, session_id: &str) -> Result<Option<Order>> {
        self.orders
            .find_one(&Filter::by("payment_reference", session_id.to_string()))
            .await
    }

    async fn card_order(&self, checkout: CompletedCheckout) -> Result<Order> {
        let cart_id = Uuid::parse_str(&checkout.reference)
            .map_err(|_| {
                ShopError::Validation(format!("invalid cart reference '{}'", checkout.reference))
            })?;
        let cart = self
            .carts
            .find_by_id(&cart_id)
            .await?
            .ok_or_else(|| ShopError::not_found("cart", cart_id))?;

        let email = checkout.customer_email.trim().to_lowercase();
        let user = self
            .users
            .find_one(&Filter::by("email", email.clone()))
            .await?
            .ok_or_else(|| ShopError::not_found("user", &email))?;
        if cart.owner != user.id {
            tracing::warn!(cart = %cart.id, user = %user.id, "paid cart belongs to another user");
        }

        let now = Utc::now();
        let order = Order {
            total_order_price: Decimal::new(checkout.amount_total, 2),
            payment_method: PaymentMethod::Card,
            is_paid: true,
            paid_at: Some(now),
            payment_reference: Some(checkout.session_id),
            ..self.draft(user.id, &cart, shipping_from_metadata(&checkout.metadata))
        };
        self.place_order(order, cart.id).await
    }

    async fn update_order<F>(&self, id: Uuid, change: F) -> Result<Order>
    where
        F: FnOnce(&mut Order) -> Result<()> + Send,
    {
        let mut order = self.orders.get(&id).await?;
        change(&mut order)?;
        self.orders.replace_versioned(order).await
    }

    pub async fn mark_paid(&self, id: Uuid) -> Result<Order> {
        let order = self.update_order(id, |order| order.mark_paid(Utc::now())).await?;
        tracing::info!(order = %order.id, "order marked paid");
        Ok(order)
    }

    pub async fn mark_delivered(&self, id: Uuid) -> Result<Order> {
        let order = self
            .update_order(id, |order| {
                order.mark_delivered(Utc::now());
                Ok(())
            })
            .await?;
        tracing::info!(order = %order.id, "order marked delivered");
        Ok(order)
    }

    /// Fetch an order; plain users only see their own
    pub async fn get_order(&self, ctx: &AuthContext, id: Uuid) -> Result<Order> {
        match ctx.role() {
            Some(Role::User) => self.get_my_order(ctx.require_user()?, id).await,
            _ => self.orders.get(&id).await,
        }
    }

    pub async fn get_my_order(&self, owner: Uuid, id: Uuid) -> Result<Order> {
        self.orders
            .find_by_id(&id)
            .await?
            .filter(|order| order.owner == owner)
            .ok_or_else(|| ShopError::not_found("order", id))
    }

    /// List orders through the query builder; plain users only see their own
    pub async fn list_orders(
        &self,
        ctx: &AuthContext,
        params: &QueryParams,
        defaults: &QueryDefaults,
    ) -> Result<Page> {
        let base = match ctx.role() {
            Some(Role::User) => Filter::by("owner", ctx.require_user()?.to_string()),
            _ => Filter::all(),
        };
        find_page(self.orders.as_ref(), base, params, defaults).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commerce::cart::CartService;
    use crate::core::query::QuerySpec;
    use crate::entities::{Coupon, Product};
    use crate::integrations::payment::{InMemoryPaymentGateway, WebhookVerifier};
    use crate::storage::InMemoryDataService;
    use rust_decimal_macros::dec;

    const SECRET: &str = "whsec_test";

    struct Fixture {
        orders: OrderService,
        carts: CartService,
        products: Arc<InMemoryDataService<Product>>,
        users: Arc<InMemoryDataService<User>>,
        gateway: Arc<InMemoryPaymentGateway>,
    }

    fn fixture(settings: OrderSettings) -> Fixture {
        let products = Arc::new(InMemoryDataService::<Product>::new());
        let carts_store = Arc::new(InMemoryDataService::<Cart>::new());
        let users = Arc::new(InMemoryDataService::<User>::new());
        let gateway = Arc::new(InMemoryPaymentGateway::new(WebhookVerifier::new(SECRET, 300)));

        let carts = CartService::new(
            carts_store.clone(),
            products.clone(),
            Arc::new(InMemoryDataService::<Coupon>::new()),
            settings.stock_policy,
        );
        let orders = OrderService::new(
            Arc::new(InMemoryDataService::<Order>::new()),
            carts_store,
            users.clone(),
            products.clone(),
            gateway.clone(),
            settings,
        );
        Fixture {
            orders,
            carts,
            products,
            users,
            gateway,
        }
    }

    async fn product(fx: &Fixture, price: Decimal, available: i64) -> Product {
        fx.products
            .create(Product {
                title: "Shirt".into(),
                price,
                available_quantity: available,
                ..Default::default()
            })
            .await
            .unwrap()
    }

    async fn fill_cart(fx: &Fixture, owner: Uuid, product: &Product, quantity: u32) -> Cart {
        let cart = fx.carts.add_item(owner, product.id, None).await.unwrap();
        let item = cart.items.iter().find(|i| i.product == product.id).unwrap().id;
        fx.carts.update_item_quantity(owner, item, quantity).await.unwrap()
    }

    #[tokio::test]
    async fn test_cash_order_adjusts_stock_and_removes_cart() {
        let fx = fixture(OrderSettings::default());
        let owner = Uuid::new_v4();
        let shirt = product(&fx, dec!(10), 10).await;
        let hat = product(&fx, dec!(5), 10).await;
        fill_cart(&fx, owner, &shirt, 3).await;
        let cart = fill_cart(&fx, owner, &hat, 3).await;

        let order = fx.orders.create_cash_order(owner, cart.id, None).await.unwrap();
        assert_eq!(order.items.len(), 2);
        assert_eq!(order.total_order_price, dec!(45));
        assert_eq!(order.payment_method, PaymentMethod::Cash);
        assert!(!order.is_paid);

        for id in [shirt.id, hat.id] {
            let stored = fx.products.get(&id).await.unwrap();
            assert_eq!(stored.available_quantity, 7);
            assert_eq!(stored.units_sold, 3);
        }
        assert!(matches!(fx.carts.get_cart(owner).await, Err(ShopError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_order_total_includes_discount_tax_and_shipping() {
        let settings = OrderSettings {
            tax_price: dec!(2.50),
            shipping_price: dec!(10),
            ..OrderSettings::default()
        };
        let fx = fixture(settings);
        let owner = Uuid::new_v4();
        let shirt = product(&fx, dec!(100), 10).await;
        let cart = fill_cart(&fx, owner, &shirt, 1).await;

        let mut discounted = fx.carts.get_cart(owner).await.unwrap();
        discounted.apply_discount(dec!(20));
        fx.orders.carts.replace_versioned(discounted).await.unwrap();

        let order = fx.orders.create_cash_order(owner, cart.id, None).await.unwrap();
        assert_eq!(order.total_order_price, dec!(92.50));
        assert_eq!(order.tax_price, dec!(2.50));
        assert_eq!(order.shipping_price, dec!(10));
    }

    #[tokio::test]
    async fn test_order_snapshot_ignores_later_price_changes() {
        let fx = fixture(OrderSettings::default());
        let owner = Uuid::new_v4();
        let shirt = product(&fx, dec!(10), 10).await;
        let cart = fill_cart(&fx, owner, &shirt, 2).await;
        let order = fx.orders.create_cash_order(owner, cart.id, None).await.unwrap();

        fx.products
            .find_by_id_and_update(&shirt.id, serde_json::json!({ "price": 99 }))
            .await
            .unwrap();

        let stored = fx.orders.get_my_order(owner, order.id).await.unwrap();
        assert_eq!(stored.items[0].unit_price, dec!(10));
        assert_eq!(stored.total_order_price, dec!(20));
    }

    #[tokio::test]
    async fn test_cash_order_rejects_foreign_missing_or_empty_cart() {
        let fx = fixture(OrderSettings::default());
        let owner = Uuid::new_v4();
        let shirt = product(&fx, dec!(10), 10).await;
        let cart = fill_cart(&fx, owner, &shirt, 1).await;

        assert!(matches!(
            fx.orders.create_cash_order(Uuid::new_v4(), cart.id, None).await,
            Err(ShopError::NotFound { .. })
        ));
        assert!(matches!(
            fx.orders.create_cash_order(owner, Uuid::new_v4(), None).await,
            Err(ShopError::NotFound { .. })
        ));

        fx.carts.remove_item(owner, cart.items[0].id).await.unwrap();
        assert!(matches!(
            fx.orders.create_cash_order(owner, cart.id, None).await,
            Err(ShopError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn test_oversell_is_rejected_without_side_effects() {
        let fx = fixture(OrderSettings {
            stock_policy: StockPolicy::Tolerate,
            ..OrderSettings::default()
        });
        let owner = Uuid::new_v4();
        let shirt = product(&fx, dec!(10), 2).await;
        let cart = fill_cart(&fx, owner, &shirt, 5).await;

        let strict = OrderService {
            settings: OrderSettings::default(),
            ..fx.orders.clone()
        };
        let err = strict.create_cash_order(owner, cart.id, None).await.unwrap_err();
        assert!(matches!(err, ShopError::OutOfStock { requested: 5, available: 2, .. }));
        assert_eq!(fx.products.get(&shirt.id).await.unwrap().available_quantity, 2);
        assert!(fx.carts.get_cart(owner).await.is_ok());

        fx.orders.create_cash_order(owner, cart.id, None).await.unwrap();
        assert_eq!(fx.products.get(&shirt.id).await.unwrap().available_quantity, -3);
    }

    #[tokio::test]
    async fn test_mark_paid_and_delivered() {
        let fx = fixture(OrderSettings::default());
        let owner = Uuid::new_v4();
        let shirt = product(&fx, dec!(10), 10).await;
        let cart = fill_cart(&fx, owner, &shirt, 1).await;
        let order = fx.orders.create_cash_order(owner, cart.id, None).await.unwrap();

        assert!(matches!(fx.orders.mark_paid(order.id).await, Err(ShopError::InvalidState(_))));
        let delivered = fx.orders.mark_delivered(order.id).await.unwrap();
        assert!(delivered.is_delivered);
        let paid = fx.orders.mark_paid(order.id).await.unwrap();
        assert!(paid.is_paid);
        assert!(paid.paid_at.is_some());

        assert!(matches!(
            fx.orders.mark_delivered(Uuid::new_v4()).await,
            Err(ShopError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_checkout_and_webhook_create_paid_order_once() {
        let fx = fixture(OrderSettings::default());
        let user = fx
            .users
            .create(User::new("Sara", "sara@example.com", Role::User))
            .await
            .unwrap();
        let shirt = product(&fx, dec!(19.99), 10).await;
        let cart = fill_cart(&fx, user.id, &shirt, 2).await;
        let shipping = ShippingAddress {
            city: Some("Riyadh".into()),
            ..Default::default()
        };

        let session = fx
            .orders
            .create_checkout_session(user.id, cart.id, Some(shipping.clone()))
            .await
            .unwrap();
        assert_eq!(session.amount_total, 3998);

        let request = &fx.gateway.requests()[0];
        assert_eq!(request.reference, cart.id.to_string());
        assert_eq!(request.buyer_email, "sara@example.com");
        assert_eq!(request.metadata.get("city").map(String::as_str), Some("Riyadh"));

        let (payload, signature) = fx.gateway.signed_completion(&session.id).unwrap();
        let outcome = fx.orders.complete_checkout_webhook(&payload, &signature).await.unwrap();
        let WebhookOutcome::Created(order) = outcome else {
            panic!("expected a new order, got {:?}", outcome);
        };
        assert!(order.is_paid);
        assert_eq!(order.payment_method, PaymentMethod::Card);
        assert_eq!(order.total_order_price, dec!(39.98));
        assert_eq!(order.shipping_address, Some(shipping));
        assert_eq!(order.owner, user.id);
        assert_eq!(fx.products.get(&shirt.id).await.unwrap().available_quantity, 8);

        let replay = fx.orders.complete_checkout_webhook(&payload, &signature).await.unwrap();
        assert_eq!(replay, WebhookOutcome::Duplicate(order));
        assert_eq!(fx.products.get(&shirt.id).await.unwrap().available_quantity, 8);
    }

    /// Order store that yields to the scheduler before reads and writes,
    /// the way a networked database would.
    struct YieldingOrders(InMemoryDataService<Order>);

    #[async_trait::async_trait]
    impl DataService<Order> for YieldingOrders {
        async fn create(&self, entity: Order) -> Result<Order> {
            tokio::task::yield_now().await;
            self.0.create(entity).await
        }
        async fn find_by_id(&self, id: &Uuid) -> Result<Option<Order>> {
            self.0.find_by_id(id).await
        }
        async fn find_one(&self, filter: &Filter) -> Result<Option<Order>> {
            tokio::task::yield_now().await;
            self.0.find_one(filter).await
        }
        async fn find(&self, spec: &QuerySpec) -> Result<Vec<serde_json::Value>> {
            self.0.find(spec).await
        }
        async fn find_all(&self, filter: &Filter) -> Result<Vec<Order>> {
            self.0.find_all(filter).await
        }
        async fn count_matching(&self, spec: &QuerySpec) -> Result<u64> {
            self.0.count_matching(spec).await
        }
        async fn replace_versioned(&self, entity: Order) -> Result<Order> {
            self.0.replace_versioned(entity).await
        }
        async fn find_by_id_and_delete(&self, id: &Uuid) -> Result<Option<Order>> {
            self.0.find_by_id_and_delete(id).await
        }
        async fn delete_matching(&self, filter: &Filter) -> Result<u64> {
            self.0.delete_matching(filter).await
        }
    }

    #[tokio::test]
    async fn test_concurrent_webhook_deliveries_create_one_order() {
        let mut fx = fixture(OrderSettings::default());
        let orders: Arc<dyn DataService<Order>> =
            Arc::new(YieldingOrders(InMemoryDataService::new()));
        fx.orders = OrderService {
            orders: orders.clone(),
            ..fx.orders.clone()
        };
        let user = fx
            .users
            .create(User::new("Omar", "omar@example.com", Role::User))
            .await
            .unwrap();
        let shirt = product(&fx, dec!(10), 10).await;
        let cart = fill_cart(&fx, user.id, &shirt, 2).await;

        let session = fx.orders.create_checkout_session(user.id, cart.id, None).await.unwrap();
        let (payload, signature) = fx.gateway.signed_completion(&session.id).unwrap();

        let (first, second) = tokio::join!(
            fx.orders.complete_checkout_webhook(&payload, &signature),
            fx.orders.complete_checkout_webhook(&payload, &signature),
        );
        let (first, second) = (first.unwrap(), second.unwrap());
        let created = [&first, &second]
            .iter()
            .filter(|outcome| matches!(outcome, WebhookOutcome::Created(_)))
            .count();
        assert_eq!(created, 1, "got {:?} and {:?}", first, second);
        assert_eq!(first.order().map(|o| o.id), second.order().map(|o| o.id));

        let stored = orders
            .find_all(&Filter::by("payment_reference", session.id.clone()))
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        let shirt = fx.products.get(&shirt.id).await.unwrap();
        assert_eq!(shirt.available_quantity, 8);
        assert_eq!(shirt.units_sold, 2);
    }

    #[tokio::test]
    async fn test_orders_without_payment_reference_do_not_collide() {
        let fx = fixture(OrderSettings::default());
        let owner = Uuid::new_v4();
        let shirt = product(&fx, dec!(10), 10).await;

        let cart = fill_cart(&fx, owner, &shirt, 1).await;
        fx.orders.create_cash_order(owner, cart.id, None).await.unwrap();
        let cart = fill_cart(&fx, owner, &shirt, 1).await;
        let second = fx.orders.create_cash_order(owner, cart.id, None).await.unwrap();
        assert!(second.payment_reference.is_none());
    }

    #[tokio::test]
    async fn test_webhook_rejects_bad_signature_and_ignores_other_events() {
        let fx = fixture(OrderSettings::default());
        let payload = br#"{"type":"payment_intent.created","data":{"object":{}}}"#;

        assert!(matches!(
            fx.orders.complete_checkout_webhook(payload, "t=1,v1=deadbeef").await,
            Err(ShopError::Unauthorized(_))
        ));

        let signature = WebhookVerifier::new(SECRET, 300)
            .sign(payload, Utc::now().timestamp())
            .unwrap();
        let outcome = fx.orders.complete_checkout_webhook(payload, &signature).await.unwrap();
        assert_eq!(outcome, WebhookOutcome::Ignored("payment_intent.created".into()));
        assert!(outcome.order().is_none());
    }

    #[tokio::test]
    async fn test_orders_are_scoped_to_plain_users() {
        let fx = fixture(OrderSettings::default());
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let shirt = product(&fx, dec!(10), 10).await;

        let cart = fill_cart(&fx, alice, &shirt, 1).await;
        let alice_order = fx.orders.create_cash_order(alice, cart.id, None).await.unwrap();
        let cart = fill_cart(&fx, bob, &shirt, 1).await;
        fx.orders.create_cash_order(bob, cart.id, None).await.unwrap();

        let defaults = QueryDefaults::default();
        let params = QueryParams::default();
        let as_alice = AuthContext::user(alice, Role::User);
        let as_admin = AuthContext::user(Uuid::new_v4(), Role::Admin);

        let page = fx.orders.list_orders(&as_alice, &params, &defaults).await.unwrap();
        assert_eq!(page.results, 1);
        assert_eq!(page.data[0]["id"], alice_order.id.to_string());
        assert_eq!(fx.orders.list_orders(&as_admin, &params, &defaults).await.unwrap().results, 2);

        let as_bob = AuthContext::user(bob, Role::User);
        assert!(matches!(
            fx.orders.get_order(&as_bob, alice_order.id).await,
            Err(ShopError::NotFound { .. })
        ));
        assert_eq!(fx.orders.get_order(&as_admin, alice_order.id).await.unwrap(), alice_order);
    }
}
