//! JSON document offline queue.
//!
//! The whole store is one JSON object keyed by recipient; each value is the
//! ordered list of messages waiting for that recipient:
//!
//! ```text
//! {
//!   "bob": [
//!     { "text": "hi", "sender": "alice", "source": "alice", "destination": "bob", "queued_at": 1700000000000 }
//!   ]
//! }
//! ```
//!
//! Every mutation reads the document, changes it and rewrites it in full.
//! The rewrite goes to a sibling temp file that is renamed over the original,
//! so a crash or failed write never leaves a half-written document behind.

use super::{OfflineError, OfflineStore, QueuedMessage};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, warn};

type Document = BTreeMap<String, Vec<QueuedMessage>>;

pub struct DocumentStore {
    path: PathBuf,
    /// Serialises read-modify-write cycles.
    lock: Mutex<()>,
}

impl DocumentStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }

    /// Read the document. Missing, unreadable or undecodable files are empty.
    async fn read(&self) -> Document {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "Offline document not created yet");
                return Document::new();
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to read offline document, treating as empty");
                return Document::new();
            }
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Document::new();
        }
        match serde_json::from_slice(&bytes) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Failed to decode offline document, treating as empty");
                Document::new()
            }
        }
    }

    async fn write(&self, doc: &Document) -> Result<(), OfflineError> {
        let bytes = serde_json::to_vec_pretty(doc)
            .map_err(|e| OfflineError::Serialization(e.to_string()))?;
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, &bytes).await?;
        if let Err(e) = tokio::fs::rename(&tmp, &self.path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }
        Ok(())
    }
}

#[async_trait]
impl OfflineStore for DocumentStore {
    async fn enqueue(&self, recipient: &str, message: QueuedMessage) -> Result<(), OfflineError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await;
        doc.entry(recipient.to_string()).or_default().push(message);
        self.write(&doc).await
    }

    async fn drain_all(&self, recipient: &str) -> Result<Vec<QueuedMessage>, OfflineError> {
        let _guard = self.lock.lock().await;
        let mut doc = self.read().await;
        let Some(queue) = doc.remove(recipient) else {
            return Ok(Vec::new());
        };
        self.write(&doc).await?;
        Ok(queue)
    }

    #[cfg(test)]
    async fn pending(&self, recipient: &str) -> usize {
        let _guard = self.lock.lock().await;
        self.read().await.get(recipient).map_or(0, Vec::len)
    }

    fn backend(&self) -> &'static str {
        "json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::testing::{chat, exercise_contract, texts};

    #[tokio::test]
    async fn document_store_contract() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path().join("offline.json"));
        exercise_contract(&store).await;
    }

    #[tokio::test]
    async fn document_is_keyed_by_recipient() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offline.json");
        let store = DocumentStore::new(&path);
        store.enqueue("bob", chat("alice", "bob", "hello")).await.unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(raw["bob"][0]["text"], "hello");
        assert_eq!(raw["bob"][0]["sender"], "alice");
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offline.json");
        DocumentStore::new(&path)
            .enqueue("bob", chat("alice", "bob", "persisted"))
            .await
            .unwrap();

        let reopened = DocumentStore::new(&path);
        assert_eq!(texts(&reopened.drain_all("bob").await.unwrap()), vec!["persisted"]);
    }

    #[tokio::test]
    async fn corrupt_document_reads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offline.json");
        std::fs::write(&path, b"{ this is not json").unwrap();
        let store = DocumentStore::new(&path);

        assert!(store.drain_all("bob").await.unwrap().is_empty());
        assert_eq!(store.pending("bob").await, 0);

        // Enqueue carries on from an empty document.
        store.enqueue("bob", chat("alice", "bob", "fresh")).await.unwrap();
        assert_eq!(texts(&store.drain_all("bob").await.unwrap()), vec!["fresh"]);
    }

    #[tokio::test]
    async fn write_failure_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path().join("missing-dir").join("offline.json"));
        let err = store
            .enqueue("bob", chat("alice", "bob", "lost"))
            .await
            .unwrap_err();
        assert!(matches!(err, OfflineError::Io(_)));
    }

    #[tokio::test]
    async fn failed_drain_keeps_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offline.json");
        let store = DocumentStore::new(&path);
        store.enqueue("bob", chat("alice", "bob", "keep me")).await.unwrap();

        // A directory squatting on the temp path makes the rewrite fail.
        std::fs::create_dir(store.temp_path()).unwrap();
        assert!(store.drain_all("bob").await.is_err());

        std::fs::remove_dir(store.temp_path()).unwrap();
        assert_eq!(texts(&store.drain_all("bob").await.unwrap()), vec!["keep me"]);
    }
}
