//! Hosting configuration.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Connections served at once; further accepts wait for a free slot.
    pub max_connections: usize,
    /// Largest request body accepted, in bytes.
    pub max_body_bytes: usize,
    /// Largest request line plus header section accepted, in bytes.
    pub max_head_bytes: usize,
    /// Default `tracing` filter, overridden by `RUST_LOG`.
    pub log_filter: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_connections: 256,
            max_body_bytes: 1024 * 1024,
            max_head_bytes: 16 * 1024,
            log_filter: "sprig=info".to_string(),
        }
    }
}

impl ServerConfig {
    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }
}
