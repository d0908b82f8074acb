//! Transport collaborator and an in-memory implementation.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::message::Message;
use super::MailError;

/// Acknowledgement of one accepted message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryReceipt {
    pub message_id: String,
    /// Name of the mailer that delivered the message.
    pub mailer: String,
    /// Raw server response, when the transport has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
}

/// Async email sending trait.
///
/// Implement this trait to provide alternative email backends (e.g., SES, Mailgun).
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Send an assembled message immediately.
    async fn send(&self, message: &Message) -> Result<DeliveryReceipt, MailError>;
}

/// Transport that keeps every message in memory instead of sending it.
#[derive(Clone, Default)]
pub struct MemoryTransport {
    sent: Arc<Mutex<Vec<Message>>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<Message> {
        self.sent.lock().await.clone()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn send(&self, message: &Message) -> Result<DeliveryReceipt, MailError> {
        self.sent.lock().await.push(message.clone());
        Ok(DeliveryReceipt {
            message_id: Uuid::new_v4().to_string(),
            mailer: "memory".to_string(),
            response: None,
        })
    }
}
