//! Payment gateway abstraction and webhook signature verification
//!
//! Checkout sessions are created through a [`PaymentGateway`]; the gateway
//! later calls the webhook endpoint with a signed event. Signatures use the
//! `t=<unix seconds>,v1=<hex HMAC-SHA256 of "<t>.<payload>">` header scheme.

use crate::core::error::{Result, ShopError};
use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::BTreeMap;
use std::sync::Mutex;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

/// Event type emitted when a checkout session is paid
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";

/// What the shop asks the gateway to charge
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutSessionRequest {
    /// Amount in the currency's minor unit (cents)
    pub amount_minor: i64,
    pub currency: String,
    pub buyer_name: String,
    pub buyer_email: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Echoed back on completion; the cart id
    pub reference: String,
    pub metadata: BTreeMap<String, String>,
}

/// Session descriptor returned to the client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
    pub amount_total: i64,
    pub currency: String,
}

/// A paid checkout session as reported by the webhook
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedCheckout {
    pub session_id: String,
    pub reference: String,
    pub customer_email: String,
    /// Minor units
    pub amount_total: i64,
    pub metadata: BTreeMap<String, String>,
}

/// A verified webhook event
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayEvent {
    CheckoutCompleted(CompletedCheckout),
    /// Any other event type, acknowledged and ignored
    Other(String),
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession>;

    /// Authenticate and decode a webhook delivery
    fn verify_event(&self, payload: &[u8], signature: &str) -> Result<GatewayEvent>;
}

// =============================================================================
// Signatures
// =============================================================================

/// HMAC-SHA256 webhook signer / verifier
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_secs: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_secs,
        }
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| ShopError::Internal(format!("invalid webhook secret: {}", e)))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }

    /// Signature header for `payload` at `timestamp`
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String> {
        let digest = self.mac(timestamp, payload)?.finalize().into_bytes();
        Ok(format!("t={},v1={}", timestamp, hex::encode(digest)))
    }

    /// Check a signature header against `payload` as of `now` (unix seconds)
    pub fn verify(&self, payload: &[u8], header: &str, now: i64) -> Result<()> {
        let invalid = |reason: &str| {
            ShopError::Unauthorized(format!("invalid webhook signature: {}", reason))
        };

        let mut timestamp = None;
        let mut candidates = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => {
                    timestamp = Some(value.parse::<i64>().map_err(|_| invalid("bad timestamp"))?)
                }
                Some(("v1", value)) => candidates.push(value),
                _ => {}
            }
        }

        let timestamp = timestamp.ok_or_else(|| invalid("missing timestamp"))?;
        let age = now.checked_sub(timestamp).and_then(i64::checked_abs);
        if age.is_none_or(|age| age > self.tolerance_secs) {
            return Err(invalid("timestamp outside tolerance"));
        }

        for candidate in candidates {
            let Ok(expected) = hex::decode(candidate) else {
                continue;
            };
            if self.mac(timestamp, payload)?.verify_slice(&expected).is_ok() {
                return Ok(());
            }
        }
        Err(invalid("no matching signature"))
    }
}

#[derive(Debug, Deserialize)]
struct EventEnvelope {
    #[serde(rename = "type")]
    event_type: String,
    data: EventData,
}

#[derive(Debug, Deserialize)]
struct EventData {
    object: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CustomerDetails {
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionObject {
    id: String,
    client_reference_id: Option<String>,
    customer_email: Option<String>,
    customer_details: Option<CustomerDetails>,
    amount_total: i64,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

/// Decode a gateway event body
pub fn parse_event(payload: &[u8]) -> Result<GatewayEvent> {
    let envelope: EventEnvelope = serde_json::from_slice(payload)?;
    if envelope.event_type != CHECKOUT_COMPLETED {
        return Ok(GatewayEvent::Other(envelope.event_type));
    }

    let session: SessionObject = serde_json::from_value(envelope.data.object)?;
    let customer_email = session
        .customer_email
        .or_else(|| session.customer_details.and_then(|d| d.email))
        .ok_or_else(|| ShopError::Validation("checkout session has no customer email".into()))?;
    let reference = session
        .client_reference_id
        .ok_or_else(|| ShopError::Validation("checkout session has no reference".into()))?;

    Ok(GatewayEvent::CheckoutCompleted(CompletedCheckout {
        session_id: session.id,
        reference,
        customer_email,
        amount_total: session.amount_total,
        metadata: session.metadata,
    }))
}

// =============================================================================
// In-memory gateway
// =============================================================================

/// Gateway that records sessions locally; for development and tests
pub struct InMemoryPaymentGateway {
    verifier: WebhookVerifier,
    sessions: Mutex<Vec<(CheckoutSession, CheckoutSessionRequest)>>,
}

impl InMemoryPaymentGateway {
    pub fn new(verifier: WebhookVerifier) -> Self {
        Self {
            verifier,
            sessions: Mutex::new(Vec::new()),
        }
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<CheckoutSessionRequest> {
        self.sessions
            .lock()
            .map(|s| s.iter().map(|(_, r)| r.clone()).collect())
            .unwrap_or_default()
    }

    /// A signed `checkout.session.completed` delivery for a recorded session
    pub fn signed_completion(&self, session_id: &str) -> Result<(Vec<u8>, String)> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|e| ShopError::Internal(format!("Failed to acquire lock: {}", e)))?;
        let (session, request) = sessions
            .iter()
            .find(|(s, _)| s.id == session_id)
            .ok_or_else(|| ShopError::not_found("checkout session", session_id))?;

        let payload = serde_json::to_vec(&serde_json::json!({
            "id": format!("evt_{}", Uuid::new_v4().simple()),
            "type": CHECKOUT_COMPLETED,
            "data": {
                "object": {
                    "id": session.id,
                    "client_reference_id": request.reference,
                    "customer_email": request.buyer_email,
                    "amount_total": session.amount_total,
                    "currency": session.currency,
                    "metadata": request.metadata,
                }
            }
        }))
        .map_err(|e| ShopError::Internal(e.to_string()))?;

        let signature = self.verifier.sign(&payload, Utc::now().timestamp())?;
        Ok((payload, signature))
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession> {
        let id = format!("cs_test_{}", Uuid::new_v4().simple());
        let session = CheckoutSession {
            url: format!("https://checkout.invalid/pay/{}", id),
            id,
            amount_total: request.amount_minor,
            currency: request.currency.clone(),
        };

        self.sessions
            .lock()
            .map_err(|e| ShopError::Internal(format!("Failed to acquire lock: {}", e)))?
            .push((session.clone(), request));

        Ok(session)
    }

    fn verify_event(&self, payload: &[u8], signature: &str) -> Result<GatewayEvent> {
        self.verifier.verify(payload, signature, Utc::now().timestamp())?;
        parse_event(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verifier() -> WebhookVerifier {
        WebhookVerifier::new("whsec_test", 300)
    }

    fn request() -> CheckoutSessionRequest {
        CheckoutSessionRequest {
            amount_minor: 12_345,
            currency: "sar".into(),
            buyer_name: "Sara".into(),
            buyer_email: "sara@example.com".into(),
            success_url: "https://shop.example/orders".into(),
            cancel_url: "https://shop.example/cart".into(),
            reference: Uuid::new_v4().to_string(),
            metadata: BTreeMap::from([("city".to_string(), "Riyadh".to_string())]),
        }
    }

    #[test]
    fn test_sign_and_verify() {
        let payload = br#"{"type":"ping","data":{"object":{}}}"#;
        let header = verifier().sign(payload, 1_700_000_000).unwrap();
        assert!(header.starts_with("t=1700000000,v1="));
        verifier().verify(payload, &header, 1_700_000_100).unwrap();
    }

    #[test]
    fn test_verify_rejects_tampering() {
        let payload = br#"{"amount":1}"#;
        let header = verifier().sign(payload, 1_700_000_000).unwrap();

        let err = verifier()
            .verify(br#"{"amount":2}"#, &header, 1_700_000_000)
            .unwrap_err();
        assert!(matches!(err, ShopError::Unauthorized(_)));

        let other_secret = WebhookVerifier::new("whsec_other", 300);
        assert!(other_secret.verify(payload, &header, 1_700_000_000).is_err());
    }

    #[test]
    fn test_verify_rejects_stale_and_malformed_headers() {
        let payload = b"{}";
        let header = verifier().sign(payload, 1_700_000_000).unwrap();
        assert!(verifier().verify(payload, &header, 1_700_000_301).is_err());

        for bad in ["", "v1=abcd", "t=abc,v1=00", "t=1700000000,v1=zz"] {
            assert!(verifier().verify(payload, bad, 1_700_000_000).is_err(), "{bad}");
        }
    }

    #[test]
    fn test_verify_rejects_extreme_timestamps() {
        let payload = b"{}";
        for header in ["t=-9223372036854775808,v1=00", "t=9223372036854775807,v1=00"] {
            let err = verifier().verify(payload, header, 1_700_000_000).unwrap_err();
            assert!(matches!(err, ShopError::Unauthorized(_)), "{header}");
        }
        let err = verifier().verify(payload, "t=0,v1=00", i64::MIN).unwrap_err();
        assert!(matches!(err, ShopError::Unauthorized(_)));
    }

    #[test]
    fn test_parse_other_event() {
        let payload = br#"{"type":"payment_intent.created","data":{"object":{}}}"#;
        let event = parse_event(payload).unwrap();
        assert_eq!(event, GatewayEvent::Other("payment_intent.created".into()));
    }

    #[test]
    fn test_parse_completion_falls_back_to_customer_details() {
        let event = parse_event(
            br#"{"type":"checkout.session.completed","data":{"object":{
                "id":"cs_1","client_reference_id":"cart-1","customer_details":{"email":"a@b.c"},
                "amount_total":5000,"metadata":{"city":"Riyadh"}}}}"#,
        )
        .unwrap();

        match event {
            GatewayEvent::CheckoutCompleted(done) => {
                assert_eq!(done.session_id, "cs_1");
                assert_eq!(done.reference, "cart-1");
                assert_eq!(done.customer_email, "a@b.c");
                assert_eq!(done.amount_total, 5000);
                assert_eq!(done.metadata["city"], "Riyadh");
            }
            other => panic!("Expected completion, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_in_memory_gateway_round_trip() {
        let gateway = InMemoryPaymentGateway::new(verifier());
        let req = request();
        let session = gateway.create_checkout_session(req.clone()).await.unwrap();
        assert_eq!(session.amount_total, 12_345);
        assert_eq!(gateway.requests(), vec![req.clone()]);

        let (payload, signature) = gateway.signed_completion(&session.id).unwrap();
        match gateway.verify_event(&payload, &signature).unwrap() {
            GatewayEvent::CheckoutCompleted(done) => {
                assert_eq!(done.session_id, session.id);
                assert_eq!(done.reference, req.reference);
                assert_eq!(done.customer_email, "sara@example.com");
            }
            other => panic!("Expected completion, got {:?}", other),
        }

        assert!(gateway.verify_event(&payload, "t=1,v1=00").is_err());
    }
}
