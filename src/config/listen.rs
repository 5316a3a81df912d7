//! Client listener configuration.

use relay_proto::DEFAULT_MAX_LINE_LENGTH;
use serde::Deserialize;
use std::net::SocketAddr;

/// Plaintext TCP listener for clients.
#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// Address to bind (e.g., "127.0.0.1:7000").
    pub address: SocketAddr,
    /// Maximum length of one JSON line in bytes (default: 65536).
    /// Longer lines are a transport error and close the connection.
    #[serde(default = "default_max_line_length")]
    pub max_line_length: usize,
}

fn default_max_line_length() -> usize {
    DEFAULT_MAX_LINE_LENGTH
}
