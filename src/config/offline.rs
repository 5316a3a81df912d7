//! Offline queue storage configuration.

use serde::Deserialize;

/// Storage medium for queued messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OfflineBackend {
    /// Embedded redb database.
    #[default]
    Redb,
    /// Single JSON document keyed by recipient.
    Json,
    /// In-process only; lost on restart.
    Memory,
}

impl OfflineBackend {
    /// Whether this backend writes to `path`.
    pub fn is_persistent(self) -> bool {
        !matches!(self, Self::Memory)
    }
}

/// Offline queue configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct OfflineConfig {
    /// Backend type: "redb", "json", "memory".
    #[serde(default)]
    pub backend: OfflineBackend,
    /// Path to the storage file (ignored by the memory backend).
    #[serde(default = "default_offline_path")]
    pub path: String,
}

impl Default for OfflineConfig {
    fn default() -> Self {
        Self {
            backend: OfflineBackend::default(),
            path: default_offline_path(),
        }
    }
}

fn default_offline_path() -> String {
    "offline.redb".to_string()
}
