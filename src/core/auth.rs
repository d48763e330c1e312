//! Authorization for the shop
//!
//! Identity is established upstream (a gateway or session layer) and handed to
//! the shop through an [`AuthProvider`]. Handlers receive the resulting
//! [`AuthContext`] through the [`Auth`] extractor and check it against an
//! [`AuthPolicy`].

use crate::core::error::{Result, ShopError};
use async_trait::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Role of an authenticated user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Manager,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Manager => "manager",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ShopError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "user" => Ok(Role::User),
            "manager" => Ok(Role::Manager),
            "admin" => Ok(Role::Admin),
            other => Err(ShopError::Validation(format!("unknown role '{}'", other))),
        }
    }
}

/// Authorization context extracted from a request
#[derive(Debug, Clone, PartialEq)]
pub enum AuthContext {
    /// Authenticated user
    User {
        user_id: Uuid,
        role: Role,
        email: String,
        name: String,
    },

    /// No authentication (public access)
    Anonymous,
}

impl AuthContext {
    pub fn user(user_id: Uuid, role: Role) -> Self {
        AuthContext::User {
            user_id,
            role,
            email: String::new(),
            name: String::new(),
        }
    }

    /// Get user_id if available
    pub fn user_id(&self) -> Option<Uuid> {
        match self {
            AuthContext::User { user_id, .. } => Some(*user_id),
            AuthContext::Anonymous => None,
        }
    }

    pub fn role(&self) -> Option<Role> {
        match self {
            AuthContext::User { role, .. } => Some(*role),
            AuthContext::Anonymous => None,
        }
    }

    pub fn email(&self) -> Option<&str> {
        match self {
            AuthContext::User { email, .. } => Some(email),
            AuthContext::Anonymous => None,
        }
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            AuthContext::User { name, .. } => Some(name),
            AuthContext::Anonymous => None,
        }
    }

    /// Check if context represents an admin
    pub fn is_admin(&self) -> bool {
        self.role() == Some(Role::Admin)
    }

    /// The caller's user id, or `Unauthorized`
    pub fn require_user(&self) -> Result<Uuid> {
        self.user_id()
            .ok_or_else(|| ShopError::Unauthorized("authentication required".into()))
    }
}

/// Authorization policy for an operation
#[derive(Debug, Clone)]
pub enum AuthPolicy {
    /// Public access (no auth required)
    Public,

    /// Any authenticated user
    Authenticated,

    /// User must have one of these roles
    HasRole(Vec<Role>),

    /// Combination of policies (AND)
    And(Vec<AuthPolicy>),

    /// Combination of policies (OR)
    Or(Vec<AuthPolicy>),

    /// Custom policy function
    Custom(fn(&AuthContext) -> bool),
}

impl AuthPolicy {
    /// Check if auth context satisfies this policy
    pub fn check(&self, context: &AuthContext) -> bool {
        match self {
            AuthPolicy::Public => true,

            AuthPolicy::Authenticated => !matches!(context, AuthContext::Anonymous),

            AuthPolicy::HasRole(required) => context.role().is_some_and(|r| required.contains(&r)),

            AuthPolicy::And(policies) => policies.iter().all(|p| p.check(context)),

            AuthPolicy::Or(policies) => policies.iter().any(|p| p.check(context)),

            AuthPolicy::Custom(f) => f(context),
        }
    }

    /// Like [`check`](Self::check), but as an error suitable for a handler
    pub fn enforce(&self, context: &AuthContext) -> Result<()> {
        if self.check(context) {
            Ok(())
        } else if matches!(context, AuthContext::Anonymous) {
            Err(ShopError::Unauthorized("authentication required".into()))
        } else {
            Err(ShopError::Forbidden(
                "you are not allowed to access this route".into(),
            ))
        }
    }

    /// Parse policy from string (for YAML config)
    ///
    /// `public`, `authenticated`, `admin_only`, or `role:<r>[|<r>...]`.
    pub fn parse_policy(s: &str) -> Self {
        match s {
            "public" => AuthPolicy::Public,
            "authenticated" => AuthPolicy::Authenticated,
            "admin_only" => AuthPolicy::HasRole(vec![Role::Admin]),
            s if s.starts_with("role:") => {
                let roles = s["role:".len()..]
                    .split('|')
                    .filter_map(|r| r.parse::<Role>().ok())
                    .collect();
                AuthPolicy::HasRole(roles)
            }
            _ => AuthPolicy::Authenticated, // Default
        }
    }

    /// Admins and managers
    pub fn staff() -> Self {
        AuthPolicy::HasRole(vec![Role::Admin, Role::Manager])
    }
}

/// Trait for auth providers
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Extract auth context from the request head
    async fn extract_context(&self, parts: &Parts) -> Result<AuthContext>;
}

/// Default no-auth provider (for development)
pub struct NoAuthProvider;

#[async_trait]
impl AuthProvider for NoAuthProvider {
    async fn extract_context(&self, _parts: &Parts) -> Result<AuthContext> {
        Ok(AuthContext::Anonymous)
    }
}

/// Trusts identity headers set by an upstream gateway.
///
/// `x-user-id` (UUID) and `x-user-role` identify the caller; `x-user-email`
/// and `x-user-name` are optional. A request without `x-user-id` is anonymous.
pub struct HeaderAuthProvider;

impl HeaderAuthProvider {
    pub const USER_ID: &'static str = "x-user-id";
    pub const USER_ROLE: &'static str = "x-user-role";
    pub const USER_EMAIL: &'static str = "x-user-email";
    pub const USER_NAME: &'static str = "x-user-name";
}

fn header<'a>(parts: &'a Parts, name: &str) -> Result<Option<&'a str>> {
    parts
        .headers
        .get(name)
        .map(|v| {
            v.to_str()
                .map_err(|_| ShopError::Unauthorized(format!("invalid {} header", name)))
        })
        .transpose()
}

#[async_trait]
impl AuthProvider for HeaderAuthProvider {
    async fn extract_context(&self, parts: &Parts) -> Result<AuthContext> {
        let Some(raw_id) = header(parts, Self::USER_ID)? else {
            return Ok(AuthContext::Anonymous);
        };

        let user_id = Uuid::parse_str(raw_id.trim())
            .map_err(|_| ShopError::Unauthorized(format!("invalid {} header", Self::USER_ID)))?;
        let role = match header(parts, Self::USER_ROLE)? {
            Some(raw) => raw.parse::<Role>().map_err(|_| {
                ShopError::Unauthorized(format!("invalid {} header", Self::USER_ROLE))
            })?,
            None => Role::User,
        };

        Ok(AuthContext::User {
            user_id,
            role,
            email: header(parts, Self::USER_EMAIL)?.unwrap_or_default().to_string(),
            name: header(parts, Self::USER_NAME)?.unwrap_or_default().to_string(),
        })
    }
}

/// Middleware resolving the [`AuthContext`] once per request
pub async fn auth_middleware(
    State(provider): State<Arc<dyn AuthProvider>>,
    request: Request,
    next: Next,
) -> Response {
    let (mut parts, body) = request.into_parts();
    match provider.extract_context(&parts).await {
        Ok(context) => {
            parts.extensions.insert(context);
            next.run(Request::from_parts(parts, body)).await
        }
        Err(e) => e.into_response(),
    }
}

/// Extractor for the caller's [`AuthContext`]; anonymous when no middleware ran
#[derive(Debug, Clone)]
pub struct Auth(pub AuthContext);

impl<S> FromRequestParts<S> for Auth
where
    S: Send + Sync,
{
    type Rejection = ShopError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        Ok(Auth(
            parts
                .extensions
                .get::<AuthContext>()
                .cloned()
                .unwrap_or(AuthContext::Anonymous),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request as HttpRequest;

    fn parts_with(headers: &[(&str, &str)]) -> Parts {
        let mut builder = HttpRequest::builder();
        for (k, v) in headers {
            builder = builder.header(*k, *v);
        }
        builder.body(()).expect("failed to build request").into_parts().0
    }

    #[test]
    fn test_policy_check() {
        let admin = AuthContext::user(Uuid::new_v4(), Role::Admin);
        let user = AuthContext::user(Uuid::new_v4(), Role::User);

        assert!(AuthPolicy::Authenticated.check(&user));
        assert!(AuthPolicy::staff().check(&admin));
        assert!(!AuthPolicy::staff().check(&user));

        let anon = AuthContext::Anonymous;
        assert!(AuthPolicy::Public.check(&anon));
        assert!(!AuthPolicy::Authenticated.check(&anon));
    }

    #[test]
    fn test_policy_combinators() {
        let manager = AuthContext::user(Uuid::new_v4(), Role::Manager);
        let both = AuthPolicy::And(vec![
            AuthPolicy::Authenticated,
            AuthPolicy::HasRole(vec![Role::Admin]),
        ]);
        assert!(!both.check(&manager));

        let either = AuthPolicy::Or(vec![
            AuthPolicy::HasRole(vec![Role::Admin]),
            AuthPolicy::HasRole(vec![Role::Manager]),
        ]);
        assert!(either.check(&manager));

        fn never(_ctx: &AuthContext) -> bool {
            false
        }
        assert!(!AuthPolicy::Custom(never).check(&manager));
    }

    #[test]
    fn test_enforce_distinguishes_anonymous_from_forbidden() {
        let policy = AuthPolicy::HasRole(vec![Role::Admin]);
        assert!(matches!(
            policy.enforce(&AuthContext::Anonymous),
            Err(ShopError::Unauthorized(_))
        ));
        assert!(matches!(
            policy.enforce(&AuthContext::user(Uuid::new_v4(), Role::User)),
            Err(ShopError::Forbidden(_))
        ));
    }

    #[test]
    fn test_parse_policy() {
        assert!(matches!(AuthPolicy::parse_policy("public"), AuthPolicy::Public));
        assert!(matches!(
            AuthPolicy::parse_policy("something_unknown"),
            AuthPolicy::Authenticated
        ));
        match AuthPolicy::parse_policy("role:admin|manager") {
            AuthPolicy::HasRole(roles) => assert_eq!(roles, vec![Role::Admin, Role::Manager]),
            other => panic!("Expected HasRole, got {:?}", other),
        }
        match AuthPolicy::parse_policy("admin_only") {
            AuthPolicy::HasRole(roles) => assert_eq!(roles, vec![Role::Admin]),
            other => panic!("Expected HasRole, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_header_provider_anonymous_without_headers() {
        let ctx = HeaderAuthProvider
            .extract_context(&parts_with(&[]))
            .await
            .expect("extract_context should succeed");
        assert_eq!(ctx, AuthContext::Anonymous);
    }

    #[tokio::test]
    async fn test_header_provider_reads_identity() {
        let id = Uuid::new_v4();
        let ctx = HeaderAuthProvider
            .extract_context(&parts_with(&[
                ("x-user-id", &id.to_string()),
                ("x-user-role", "manager"),
                ("x-user-email", "m@example.com"),
                ("x-user-name", "Mona"),
            ]))
            .await
            .expect("extract_context should succeed");

        assert_eq!(ctx.user_id(), Some(id));
        assert_eq!(ctx.role(), Some(Role::Manager));
        assert_eq!(ctx.email(), Some("m@example.com"));
        assert_eq!(ctx.name(), Some("Mona"));
    }

    #[tokio::test]
    async fn test_header_provider_defaults_role_and_rejects_garbage() {
        let id = Uuid::new_v4();
        let ctx = HeaderAuthProvider
            .extract_context(&parts_with(&[("x-user-id", &id.to_string())]))
            .await
            .expect("extract_context should succeed");
        assert_eq!(ctx.role(), Some(Role::User));

        let err = HeaderAuthProvider
            .extract_context(&parts_with(&[("x-user-id", "not-a-uuid")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::Unauthorized(_)));

        let id = id.to_string();
        let err = HeaderAuthProvider
            .extract_context(&parts_with(&[("x-user-id", id.as_str()), ("x-user-role", "root")]))
            .await
            .unwrap_err();
        assert!(matches!(err, ShopError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn test_no_auth_provider_extract_context() {
        let ctx = NoAuthProvider
            .extract_context(&parts_with(&[]))
            .await
            .expect("extract_context should succeed");
        assert!(matches!(ctx, AuthContext::Anonymous));
    }
}
