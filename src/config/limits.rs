//! Per-session queue limits.

use serde::Deserialize;

/// Queue limits.
#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    /// Capacity of each session's outbound frame queue (default: 256).
    /// A full queue never stalls the lane: chat messages wait in the
    /// session backlog, announcements are dropped.
    #[serde(default = "default_outbound_queue")]
    pub outbound_queue: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            outbound_queue: default_outbound_queue(),
        }
    }
}

fn default_outbound_queue() -> usize {
    256
}
