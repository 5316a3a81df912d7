//! In-process offline queue.
//!
//! Used by tests and by deployments that accept losing parked messages on
//! restart.

use super::{OfflineError, OfflineStore, QueuedMessage};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

#[derive(Default)]
pub struct MemoryStore {
    queues: Mutex<HashMap<String, Vec<QueuedMessage>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OfflineStore for MemoryStore {
    async fn enqueue(&self, recipient: &str, message: QueuedMessage) -> Result<(), OfflineError> {
        self.queues
            .lock()
            .entry(recipient.to_string())
            .or_default()
            .push(message);
        Ok(())
    }

    async fn drain_all(&self, recipient: &str) -> Result<Vec<QueuedMessage>, OfflineError> {
        Ok(self.queues.lock().remove(recipient).unwrap_or_default())
    }

    #[cfg(test)]
    async fn pending(&self, recipient: &str) -> usize {
        self.queues.lock().get(recipient).map_or(0, Vec::len)
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::testing::{chat, exercise_contract};
    use std::sync::Arc;

    #[tokio::test]
    async fn memory_store_contract() {
        exercise_contract(&MemoryStore::new()).await;
    }

    #[tokio::test]
    async fn concurrent_enqueue_and_drain_lose_nothing() {
        let store = Arc::new(MemoryStore::new());
        let writer = {
            let store = Arc::clone(&store);
            tokio::spawn(async move {
                for i in 0..200 {
                    store
                        .enqueue("bob", chat("alice", "bob", &i.to_string()))
                        .await
                        .unwrap();
                    tokio::task::yield_now().await;
                }
            })
        };

        let mut seen = Vec::new();
        while !writer.is_finished() {
            seen.extend(store.drain_all("bob").await.unwrap());
            tokio::task::yield_now().await;
        }
        writer.await.unwrap();
        seen.extend(store.drain_all("bob").await.unwrap());

        let numbers: Vec<usize> = seen
            .iter()
            .map(|q| q.message.text.parse().unwrap())
            .collect();
        assert_eq!(numbers, (0..200).collect::<Vec<_>>());
    }
}
