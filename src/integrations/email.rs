//! Outbound email

use crate::core::error::{Result, ShopError};
use async_trait::async_trait;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: Email) -> Result<()>;
}

/// Logs messages instead of delivering them
pub struct TracingEmailSender;

#[async_trait]
impl EmailSender for TracingEmailSender {
    async fn send(&self, email: Email) -> Result<()> {
        tracing::info!(to = %email.to, subject = %email.subject, "email queued");
        Ok(())
    }
}

/// Keeps sent messages in memory; optionally fails every send
#[derive(Default)]
pub struct RecordingEmailSender {
    sent: Mutex<Vec<Email>>,
    fail: bool,
}

impl RecordingEmailSender {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sender whose every delivery fails
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<Email> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl EmailSender for RecordingEmailSender {
    async fn send(&self, email: Email) -> Result<()> {
        if self.fail {
            return Err(ShopError::upstream("email", format!("delivery to {} failed", email.to)));
        }
        self.sent
            .lock()
            .map_err(|e| ShopError::Internal(format!("Failed to acquire lock: {}", e)))?
            .push(email);
        Ok(())
    }
}
