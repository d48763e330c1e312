//! Configuration loading and management

use crate::commerce::inventory::StockPolicy;
use crate::core::auth::AuthPolicy;
use crate::core::query::QueryDefaults;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// HTTP listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Prefix of every API route except the payment webhook
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_api_prefix() -> String {
    "/api/v1".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            api_prefix: default_api_prefix(),
        }
    }
}

/// Pricing and stock settings for orders
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommerceConfig {
    /// ISO currency code sent to the payment gateway
    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default)]
    pub tax_price: Decimal,

    #[serde(default)]
    pub shipping_price: Decimal,

    #[serde(default)]
    pub stock_policy: StockPolicy,
}

fn default_currency() -> String {
    "sar".to_string()
}

impl Default for CommerceConfig {
    fn default() -> Self {
        Self {
            currency: default_currency(),
            tax_price: Decimal::ZERO,
            shipping_price: Decimal::ZERO,
            stock_policy: StockPolicy::default(),
        }
    }
}

/// Payment gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentConfig {
    /// Shared secret for webhook signatures
    #[serde(default = "default_webhook_secret")]
    pub webhook_secret: String,

    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_secs: i64,

    #[serde(default = "default_success_url")]
    pub success_url: String,

    #[serde(default = "default_cancel_url")]
    pub cancel_url: String,

    /// Gateway API key; only needed by the Stripe client
    #[serde(default)]
    pub api_key: Option<String>,
}

fn default_webhook_secret() -> String {
    "whsec_development".to_string()
}

fn default_webhook_tolerance() -> i64 {
    300
}

fn default_success_url() -> String {
    "http://localhost:3000/orders".to_string()
}

fn default_cancel_url() -> String {
    "http://localhost:3000/cart".to_string()
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            webhook_secret: default_webhook_secret(),
            webhook_tolerance_secs: default_webhook_tolerance(),
            success_url: default_success_url(),
            cancel_url: default_cancel_url(),
            api_key: None,
        }
    }
}

/// Image storage settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagesConfig {
    /// Top-level folder of every stored image
    #[serde(default = "default_root_folder")]
    pub root_folder: String,

    /// Public base URL of the in-memory image store
    #[serde(default = "default_image_base_url")]
    pub base_url: String,
}

fn default_root_folder() -> String {
    "shop".to_string()
}

fn default_image_base_url() -> String {
    "http://localhost:3000/images".to_string()
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            root_folder: default_root_folder(),
            base_url: default_image_base_url(),
        }
    }
}

/// Authorization policies of one entity's CRUD routes
///
/// Each value is a policy string (`public`, `authenticated`, `admin_only`,
/// `role:admin|manager`). Unset operations keep the built-in default.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityAuthConfig {
    #[serde(default)]
    pub list: Option<String>,
    #[serde(default)]
    pub get: Option<String>,
    #[serde(default)]
    pub create: Option<String>,
    #[serde(default)]
    pub update: Option<String>,
    #[serde(default)]
    pub delete: Option<String>,
}

/// Parsed policies of one entity's CRUD routes
#[derive(Debug, Clone)]
pub struct EntityPolicies {
    pub list: AuthPolicy,
    pub get: AuthPolicy,
    pub create: AuthPolicy,
    pub update: AuthPolicy,
    pub delete: AuthPolicy,
}

impl EntityPolicies {
    fn defaults_for(plural: &str) -> [&'static str; 5] {
        const STAFF: &str = "role:admin|manager";
        match plural {
            "reviews" => ["public", "public", "role:user", "role:user", "role:user|manager|admin"],
            "coupons" => [STAFF; 5],
            "users" => [STAFF, STAFF, "admin_only", "admin_only", "admin_only"],
            _ => ["public", "public", STAFF, STAFF, "admin_only"],
        }
    }

    fn resolve(plural: &str, overrides: Option<&EntityAuthConfig>) -> Self {
        let [list, get, create, update, delete] = Self::defaults_for(plural);
        let pick = |configured: Option<&Option<String>>, fallback: &str| {
            AuthPolicy::parse_policy(configured.and_then(|c| c.as_deref()).unwrap_or(fallback))
        };

        Self {
            list: pick(overrides.map(|o| &o.list), list),
            get: pick(overrides.map(|o| &o.get), get),
            create: pick(overrides.map(|o| &o.create), create),
            update: pick(overrides.map(|o| &o.update), update),
            delete: pick(overrides.map(|o| &o.delete), delete),
        }
    }
}

/// Complete configuration of the shop
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub query: QueryDefaults,

    #[serde(default)]
    pub commerce: CommerceConfig,

    #[serde(default)]
    pub payment: PaymentConfig,

    #[serde(default)]
    pub images: ImagesConfig,

    /// Per-entity policy overrides, keyed by plural resource name
    #[serde(default)]
    pub auth: HashMap<String, EntityAuthConfig>,
}

impl AppConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path))?;
        Self::from_yaml_str(&content)
    }

    /// Load configuration from a YAML string
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.query.default_limit >= 1, "query.default_limit must be at least 1");
        anyhow::ensure!(
            self.query.max_limit >= self.query.default_limit,
            "query.max_limit must not be below query.default_limit"
        );
        anyhow::ensure!(
            self.commerce.tax_price >= Decimal::ZERO
                && self.commerce.shipping_price >= Decimal::ZERO,
            "commerce prices must not be negative"
        );
        Ok(())
    }

    /// Route policies for the entity with the given plural name
    pub fn policies_for(&self, plural: &str) -> EntityPolicies {
        EntityPolicies::resolve(plural, self.auth.get(plural))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::auth::{AuthContext, Role};
    use std::io::Write;
    use uuid::Uuid;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.api_prefix, "/api/v1");
        assert_eq!(config.query.default_limit, 50);
        assert_eq!(config.query.max_limit, 100);
        assert_eq!(config.commerce.currency, "sar");
        assert_eq!(config.commerce.stock_policy, StockPolicy::Reject);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AppConfig::from_yaml_str(
            r#"
server:
  bind: "0.0.0.0:8080"
commerce:
  shipping_price: 15.5
  stock_policy: tolerate
auth:
  products:
    list: authenticated
"#,
        )
        .unwrap();

        assert_eq!(config.server.bind, "0.0.0.0:8080");
        assert_eq!(config.server.api_prefix, "/api/v1");
        assert_eq!(config.commerce.shipping_price, Decimal::new(155, 1));
        assert_eq!(config.commerce.stock_policy, StockPolicy::Tolerate);

        let products = config.policies_for("products");
        assert!(!products.list.check(&AuthContext::Anonymous));
        assert!(products.get.check(&AuthContext::Anonymous));
    }

    #[test]
    fn test_builtin_policies() {
        let config = AppConfig::default();
        let user = AuthContext::user(Uuid::new_v4(), Role::User);
        let manager = AuthContext::user(Uuid::new_v4(), Role::Manager);

        let coupons = config.policies_for("coupons");
        assert!(!coupons.list.check(&user));
        assert!(coupons.create.check(&manager));

        let categories = config.policies_for("categories");
        assert!(categories.list.check(&AuthContext::Anonymous));
        assert!(!categories.delete.check(&manager));

        let reviews = config.policies_for("reviews");
        assert!(reviews.create.check(&user));
        assert!(!reviews.create.check(&manager));
        assert!(reviews.update.check(&user));
        assert!(!reviews.update.check(&manager));
        assert!(reviews.delete.check(&user));
        assert!(reviews.delete.check(&manager));
    }

    #[test]
    fn test_invalid_limits_are_rejected() {
        let err = AppConfig::from_yaml_str("query:\n  default_limit: 50\n  max_limit: 10\n")
            .unwrap_err();
        assert!(err.to_string().contains("max_limit"));
    }

    #[test]
    fn test_from_yaml_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "payment:\n  webhook_secret: whsec_file\n  webhook_tolerance_secs: 60"
        )
        .unwrap();

        let config = AppConfig::from_yaml_file(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.payment.webhook_secret, "whsec_file");
        assert_eq!(config.payment.webhook_tolerance_secs, 60);

        assert!(AppConfig::from_yaml_file("/nonexistent/shop.yaml").is_err());
    }
}
