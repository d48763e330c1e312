//! Router assembly
//!
//! Layout of the final application:
//! - `GET /health`, `GET /healthz` at the root
//! - `POST /webhook-checkout` at the root (signed, no auth middleware)
//! - everything else nested under the configured API prefix, behind
//!   [`auth_middleware`]

use super::crud::{CrudDescriptor, EntityRegistry};
use super::handlers::{account, cart, catalog, health_check, orders, webhook};
use super::host::ServerHost;
use crate::core::auth::auth_middleware;
use crate::core::{DataService, Entity};
use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post, put};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

fn descriptor<T: Entity>(host: &ServerHost, store: &Arc<dyn DataService<T>>) -> CrudDescriptor<T> {
    CrudDescriptor::new(
        store.clone(),
        host.config.policies_for(T::resource_name()),
        host.config.query,
        host.images.clone(),
    )
}

/// Register the CRUD surface of every catalog and account entity
pub fn catalog_registry(host: &ServerHost) -> EntityRegistry {
    let stores = &host.stores;
    EntityRegistry::new()
        .with(descriptor(host, &stores.products))
        .with(descriptor(host, &stores.categories).with_image("image"))
        .with(descriptor(host, &stores.sub_categories).nested_under("categories", "category"))
        .with(descriptor(host, &stores.brands).with_image("image"))
        .with(
            descriptor(host, &stores.reviews)
                .nested_under("products", "product")
                .owned_by("user"),
        )
        .with(descriptor(host, &stores.coupons))
        .with(descriptor(host, &stores.users).with_image("image"))
}

/// Cart, order, account and product-gallery routes
pub fn build_commerce_routes(host: Arc<ServerHost>) -> Router {
    Router::new()
        .route(
            "/cart",
            get(cart::get_cart).post(cart::add_to_cart).delete(cart::clear_cart),
        )
        .route("/cart/apply-coupon", put(cart::apply_coupon))
        .route(
            "/cart/{id}",
            put(cart::update_item_quantity).delete(cart::remove_item),
        )
        .route("/orders", get(orders::list_orders))
        .route("/orders/{id}", get(orders::get_order).post(orders::create_cash_order))
        .route("/orders/{id}/pay", put(orders::mark_paid))
        .route("/orders/{id}/deliver", put(orders::mark_delivered))
        .route("/orders/mine/{id}", get(orders::get_my_order))
        .route("/orders/checkout-session/{id}", post(orders::create_checkout_session))
        .route(
            "/users/me",
            get(account::get_me).put(account::update_me).delete(account::deactivate_me),
        )
        .route("/users/{id}/suspend", put(account::suspend_user))
        .route("/users/{id}/unsuspend", put(account::unsuspend_user))
        .route(
            "/addresses",
            get(account::list_addresses).post(account::add_address),
        )
        .route(
            "/addresses/{id}",
            get(account::get_address)
                .put(account::update_address)
                .delete(account::remove_address),
        )
        .route(
            "/wishlist",
            get(account::list_wishlist).post(account::add_to_wishlist),
        )
        .route("/wishlist/{id}", axum::routing::delete(account::remove_from_wishlist))
        .route("/products/{id}/images", put(catalog::upload_product_images))
        .with_state(host)
}

/// Routes the payment gateway calls back into
pub fn build_webhook_routes(host: Arc<ServerHost>) -> Router {
    Router::new()
        .route("/webhook-checkout", post(webhook::checkout_webhook))
        .with_state(host)
}

pub fn health_routes() -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
}

/// Build the complete application router from a host
pub fn build_router(host: Arc<ServerHost>, custom_routes: Vec<Router>) -> Router {
    let mut api = catalog_registry(&host)
        .build_routes()
        .merge(build_commerce_routes(host.clone()));
    for custom in custom_routes {
        api = api.merge(custom);
    }
    let api = api.layer(from_fn_with_state(host.auth_provider.clone(), auth_middleware));

    let root = health_routes().merge(build_webhook_routes(host.clone()));
    let prefix = host.config.server.api_prefix.trim_end_matches('/');
    let app = if prefix.is_empty() {
        root.merge(api)
    } else {
        root.nest(prefix, api)
    };

    app.layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive())
}
