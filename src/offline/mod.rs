//! Offline queue abstraction.
//!
//! Messages addressed to a name with no authenticated session are parked
//! here, one ordered queue per recipient, until that name authenticates.
//!
//! Contract shared by every backend:
//! - `enqueue` appends; insertion order is delivery order.
//! - `drain_all` returns and removes the whole queue atomically with respect
//!   to a concurrent `enqueue` for the same recipient.
//! - A failed read is "no entries". A failed write is an error and leaves the
//!   stored data untouched, so a failed drain removes nothing.

use async_trait::async_trait;
use chrono::Utc;
use relay_proto::ChatMessage;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::config::{OfflineBackend, OfflineConfig};

pub mod document;
pub mod memory;
pub mod redb;

#[derive(Debug, Error)]
pub enum OfflineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("redb database error: {0}")]
    Database(#[from] ::redb::DatabaseError),

    #[error("redb table error: {0}")]
    Table(#[from] ::redb::TableError),

    #[error("redb storage error: {0}")]
    Storage(#[from] ::redb::StorageError),

    #[error("redb transaction error: {0}")]
    Transaction(#[from] ::redb::TransactionError),

    #[error("redb commit error: {0}")]
    Commit(#[from] ::redb::CommitError),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl OfflineError {
    /// Static label for metrics.
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::Database(_) | Self::Table(_) | Self::Storage(_) => "database",
            Self::Transaction(_) | Self::Commit(_) => "transaction",
            Self::Serialization(_) => "serialization",
        }
    }
}

/// A message waiting for its recipient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedMessage {
    #[serde(flatten)]
    pub message: ChatMessage,
    /// When the message was parked (unix milliseconds).
    #[serde(default)]
    pub queued_at: i64,
}

impl QueuedMessage {
    pub fn new(message: ChatMessage) -> Self {
        Self {
            message,
            queued_at: Utc::now().timestamp_millis(),
        }
    }
}

#[async_trait]
pub trait OfflineStore: Send + Sync {
    /// Append a message to the recipient's queue, creating it if absent.
    async fn enqueue(&self, recipient: &str, message: QueuedMessage) -> Result<(), OfflineError>;

    /// Remove and return every queued message for the recipient, oldest first.
    async fn drain_all(&self, recipient: &str) -> Result<Vec<QueuedMessage>, OfflineError>;

    /// Number of messages waiting for the recipient.
    #[cfg(test)]
    async fn pending(&self, recipient: &str) -> usize;

    /// Backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Open the configured backend.
pub fn open(config: &OfflineConfig) -> Result<Arc<dyn OfflineStore>, OfflineError> {
    let store: Arc<dyn OfflineStore> = match config.backend {
        OfflineBackend::Redb => Arc::new(redb::RedbStore::open(&config.path)?),
        OfflineBackend::Json => Arc::new(document::DocumentStore::new(&config.path)),
        OfflineBackend::Memory => Arc::new(memory::MemoryStore::new()),
    };
    info!(backend = store.backend(), path = %config.path, "Offline store ready");
    Ok(store)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use serde_json::json;

    pub fn chat(sender: &str, recipient: &str, text: &str) -> QueuedMessage {
        QueuedMessage::new(ChatMessage {
            text: text.to_string(),
            sender: sender.to_string(),
            source: Some(json!(sender)),
            destination: Some(json!(recipient)),
        })
    }

    pub fn texts(queue: &[QueuedMessage]) -> Vec<&str> {
        queue.iter().map(|q| q.message.text.as_str()).collect()
    }

    /// Behaviour every backend must share.
    pub async fn exercise_contract(store: &dyn OfflineStore) {
        assert!(store.drain_all("bob").await.unwrap().is_empty());

        for text in ["m1", "m2", "m3"] {
            store.enqueue("bob", chat("alice", "bob", text)).await.unwrap();
        }
        store.enqueue("carol", chat("alice", "carol", "other")).await.unwrap();
        assert_eq!(store.pending("bob").await, 3);

        let drained = store.drain_all("bob").await.unwrap();
        assert_eq!(texts(&drained), vec!["m1", "m2", "m3"]);
        assert_eq!(store.pending("bob").await, 0);

        // Drain is exactly-once.
        assert!(store.drain_all("bob").await.unwrap().is_empty());

        // Other recipients are untouched.
        assert_eq!(store.pending("carol").await, 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn queued_message_flattens_chat_fields() {
        let queued = QueuedMessage {
            message: ChatMessage {
                text: "hi".into(),
                sender: "alice".into(),
                source: Some(json!("alice")),
                destination: Some(json!("bob")),
            },
            queued_at: 42,
        };
        let value = serde_json::to_value(&queued).unwrap();
        assert_eq!(
            value,
            json!({"text": "hi", "sender": "alice", "source": "alice", "destination": "bob", "queued_at": 42})
        );
        let back: QueuedMessage = serde_json::from_value(value).unwrap();
        assert_eq!(back, queued);
    }

    #[test]
    fn queued_at_defaults_when_missing() {
        let back: QueuedMessage =
            serde_json::from_value(json!({"text": "hi", "sender": "alice"})).unwrap();
        assert_eq!(back.queued_at, 0);
        assert!(back.message.destination.is_none());
    }

    #[tokio::test]
    async fn open_memory_backend() {
        let config = OfflineConfig {
            backend: OfflineBackend::Memory,
            path: String::new(),
        };
        let store = open(&config).unwrap();
        assert_eq!(store.backend(), "memory");
    }
}
