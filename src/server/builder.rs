//! ServerBuilder for fluent API to build the shop's HTTP server

use super::host::{ServerHost, Stores};
use super::router;
use crate::config::AppConfig;
use crate::core::auth::{AuthProvider, HeaderAuthProvider};
use crate::integrations::{
    EmailSender, ImagePipeline, ImageStore, InMemoryImageStore, InMemoryPaymentGateway,
    PaymentGateway, TracingEmailSender, WebhookVerifier,
};
use anyhow::Result;
use axum::Router;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Builder for the shop server
///
/// Every collaborator has a process-local default, so the smallest setup is
/// just `ServerBuilder::new().serve(addr)`.
///
/// # Example
///
/// ```ignore
/// let app = ServerBuilder::new()
///     .with_config(AppConfig::from_yaml_file("shop.yaml")?)
///     .with_stores(Stores::mongodb(database).await?)
///     .build()?;
/// ```
pub struct ServerBuilder {
    config: Option<AppConfig>,
    stores: Option<Stores>,
    auth_provider: Option<Arc<dyn AuthProvider>>,
    payments: Option<Arc<dyn PaymentGateway>>,
    image_store: Option<Arc<dyn ImageStore>>,
    mailer: Option<Arc<dyn EmailSender>>,
    custom_routes: Vec<Router>,
}

impl ServerBuilder {
    /// Create a new ServerBuilder
    pub fn new() -> Self {
        Self {
            config: None,
            stores: None,
            auth_provider: None,
            payments: None,
            image_store: None,
            mailer: None,
            custom_routes: Vec::new(),
        }
    }

    pub fn with_config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the entity stores (defaults to in-memory stores)
    pub fn with_stores(mut self, stores: Stores) -> Self {
        self.stores = Some(stores);
        self
    }

    /// Set how requests are authenticated (defaults to [`HeaderAuthProvider`])
    pub fn with_auth_provider(mut self, provider: impl AuthProvider + 'static) -> Self {
        self.auth_provider = Some(Arc::new(provider));
        self
    }

    pub fn with_payment_gateway(mut self, gateway: Arc<dyn PaymentGateway>) -> Self {
        self.payments = Some(gateway);
        self
    }

    pub fn with_image_store(mut self, store: Arc<dyn ImageStore>) -> Self {
        self.image_store = Some(store);
        self
    }

    pub fn with_email_sender(mut self, mailer: Arc<dyn EmailSender>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    /// Add custom routes to the API
    ///
    /// They are nested under the API prefix and run behind the auth
    /// middleware, like the built-in routes.
    pub fn with_custom_routes(mut self, routes: Router) -> Self {
        self.custom_routes.push(routes);
        self
    }

    /// Build the transport-agnostic host
    pub fn build_host(&mut self) -> Result<ServerHost> {
        let config = self.config.take().unwrap_or_default();

        let stores = self.stores.take().unwrap_or_else(Stores::in_memory);
        let auth_provider = self
            .auth_provider
            .take()
            .unwrap_or_else(|| Arc::new(HeaderAuthProvider));
        let payments = self.payments.take().unwrap_or_else(|| default_gateway(&config));
        let image_store = self
            .image_store
            .take()
            .unwrap_or_else(|| Arc::new(InMemoryImageStore::new(config.images.base_url.clone())));
        let images = ImagePipeline::new(image_store, config.images.root_folder.clone());
        let mailer = self.mailer.take().unwrap_or_else(|| Arc::new(TracingEmailSender));

        Ok(ServerHost::new(config, stores, auth_provider, payments, images, mailer))
    }

    /// Build the final router
    pub fn build(mut self) -> Result<Router> {
        let custom_routes = std::mem::take(&mut self.custom_routes);
        let host = Arc::new(self.build_host()?);
        Ok(router::build_router(host, custom_routes))
    }

    /// Serve the application with graceful shutdown
    ///
    /// This will:
    /// - Bind to the provided address
    /// - Start serving requests
    /// - Handle SIGTERM and SIGINT (Ctrl+C) for graceful shutdown
    pub async fn serve(self, addr: &str) -> Result<()> {
        let app = self.build()?;
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn verifier(config: &AppConfig) -> WebhookVerifier {
    WebhookVerifier::new(
        config.payment.webhook_secret.clone(),
        config.payment.webhook_tolerance_secs,
    )
}

#[cfg(feature = "stripe")]
fn default_gateway(config: &AppConfig) -> Arc<dyn PaymentGateway> {
    use crate::integrations::{StripeConfig, StripeGateway};

    match &config.payment.api_key {
        Some(key) => Arc::new(StripeGateway::new(StripeConfig::new(key.clone()), verifier(config))),
        None => Arc::new(InMemoryPaymentGateway::new(verifier(config))),
    }
}

#[cfg(not(feature = "stripe"))]
fn default_gateway(config: &AppConfig) -> Arc<dyn PaymentGateway> {
    if config.payment.api_key.is_some() {
        tracing::warn!(
            "payment.api_key is set but the stripe feature is disabled; using the in-memory gateway"
        );
    }
    Arc::new(InMemoryPaymentGateway::new(verifier(config)))
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
