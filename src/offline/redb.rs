//! Redb-backed offline queue.
//!
//! # Schema
//!
//! ```text
//! OFFLINE_QUEUE: recipient -> [QueuedMessage, ...] (serde_json)
//! ```
//!
//! Each operation is a single write transaction, so a drain and an enqueue
//! for the same recipient can never interleave.

use super::{OfflineError, OfflineStore, QueuedMessage};
use async_trait::async_trait;
use redb::{Database, ReadableTable, TableDefinition};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info, warn};

const OFFLINE_QUEUE: TableDefinition<&str, &[u8]> = TableDefinition::new("offline_queue");

pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (or create) the database and make sure the table exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, OfflineError> {
        let db = Database::create(path.as_ref())?;
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(OFFLINE_QUEUE)?;
        }
        write_txn.commit()?;

        info!(path = %path.as_ref().display(), "Offline queue database opened");
        Ok(Self { db: Arc::new(db) })
    }

    fn decode(recipient: &str, bytes: &[u8]) -> Option<Vec<QueuedMessage>> {
        match serde_json::from_slice(bytes) {
            Ok(queue) => Some(queue),
            Err(e) => {
                warn!(%recipient, error = %e, "Undecodable offline queue, treating as empty");
                None
            }
        }
    }
}

#[async_trait]
impl OfflineStore for RedbStore {
    async fn enqueue(&self, recipient: &str, message: QueuedMessage) -> Result<(), OfflineError> {
        let write_txn = self.db.begin_write()?;
        {
            let mut table = write_txn.open_table(OFFLINE_QUEUE)?;
            let existing = table.get(recipient)?.map(|v| v.value().to_vec());
            let mut queue = existing
                .and_then(|bytes| Self::decode(recipient, &bytes))
                .unwrap_or_default();
            queue.push(message);
            let value = serde_json::to_vec(&queue)
                .map_err(|e| OfflineError::Serialization(e.to_string()))?;
            table.insert(recipient, value.as_slice())?;
        }
        write_txn.commit()?;
        debug!(%recipient, "Queued offline message");
        Ok(())
    }

    async fn drain_all(&self, recipient: &str) -> Result<Vec<QueuedMessage>, OfflineError> {
        let write_txn = self.db.begin_write()?;
        let removed = {
            let mut table = write_txn.open_table(OFFLINE_QUEUE)?;
            table.remove(recipient)?.map(|v| v.value().to_vec())
        };

        let Some(bytes) = removed else {
            write_txn.abort()?;
            return Ok(Vec::new());
        };
        let Some(queue) = Self::decode(recipient, &bytes) else {
            write_txn.abort()?;
            return Ok(Vec::new());
        };

        write_txn.commit()?;
        debug!(%recipient, count = queue.len(), "Drained offline queue");
        Ok(queue)
    }

    #[cfg(test)]
    async fn pending(&self, recipient: &str) -> usize {
        use redb::{ReadableDatabase, TableError};

        let read_txn = match self.db.begin_read() {
            Ok(txn) => txn,
            Err(e) => {
                warn!(error = %e, "Failed to open read transaction");
                return 0;
            }
        };
        let table = match read_txn.open_table(OFFLINE_QUEUE) {
            Ok(table) => table,
            Err(TableError::TableDoesNotExist(_)) => return 0,
            Err(e) => {
                warn!(error = %e, "Failed to open offline queue table");
                return 0;
            }
        };
        match table.get(recipient) {
            Ok(Some(v)) => Self::decode(recipient, v.value()).map_or(0, |q| q.len()),
            Ok(None) => 0,
            Err(e) => {
                warn!(%recipient, error = %e, "Failed to read offline queue");
                0
            }
        }
    }

    fn backend(&self) -> &'static str {
        "redb"
    }
}
