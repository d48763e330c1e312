//! Collaborators behind narrow traits: payments, image storage and email

pub mod email;
pub mod images;
pub mod payment;
#[cfg(feature = "stripe")]
pub mod stripe;

pub use email::{Email, EmailSender, RecordingEmailSender, TracingEmailSender};
pub use images::{ImagePipeline, ImageStore, InMemoryImageStore, ProductImages};
pub use payment::{
    CheckoutSession, CheckoutSessionRequest, CompletedCheckout, GatewayEvent,
    InMemoryPaymentGateway, PaymentGateway, WebhookVerifier,
};
#[cfg(feature = "stripe")]
pub use stripe::{StripeConfig, StripeGateway};
