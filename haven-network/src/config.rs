use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BROADCAST_INTERVAL_S, DEFAULT_CHUNK_SIZE_BYTES, DEFAULT_DATA_PORT,
    DEFAULT_DISCOVERY_PORT, DEFAULT_MAX_TTL, DEFAULT_NODE_TIMEOUT_S,
};
use crate::error::NetworkError;

/// Every tunable named by the external-interfaces configuration list.
///
/// Constructed by the embedder (CLI, test harness, GUI shell — all out of
/// scope here) and handed to [`crate::node::MeshNode::new`]. There is no
/// global/singleton config; a process may run several nodes side by side
/// each with its own.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Fixed identity to reload keys for across restarts. `None` generates a
    /// fresh random id (and keypair) every launch.
    pub node_id: Option<String>,
    /// Human-readable name advertised in discovery beacons.
    pub hostname: String,
    /// Whether signing/verification/trust tracking are engaged.
    pub enable_auth: bool,
    /// Directory holding this node's PEM keypair.
    pub keys_directory: PathBuf,
    /// Path to the trust ledger's JSON persistence file.
    pub trust_file: PathBuf,
    /// Directory where reassembled files are written.
    pub save_directory: PathBuf,
    /// UDP discovery port.
    pub discovery_port: u16,
    /// TCP data port.
    pub data_port: u16,
    /// Discovery beacon cadence, in seconds.
    pub broadcast_interval_s: u64,
    /// Neighbor eviction timeout, in seconds.
    pub node_timeout_s: u64,
    /// TTL stamped on originated envelopes.
    pub max_ttl: u8,
    /// File chunk size, in bytes.
    pub chunk_size_bytes: usize,
    /// Shared passphrase used to derive the symmetric key, when `enable_auth` is set.
    pub shared_passphrase: String,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node_id: None,
            hostname: "haven-node".to_string(),
            enable_auth: true,
            keys_directory: PathBuf::from("./keys"),
            trust_file: PathBuf::from("./trust.json"),
            save_directory: PathBuf::from("./received_files"),
            discovery_port: DEFAULT_DISCOVERY_PORT,
            data_port: DEFAULT_DATA_PORT,
            broadcast_interval_s: DEFAULT_BROADCAST_INTERVAL_S,
            node_timeout_s: DEFAULT_NODE_TIMEOUT_S,
            max_ttl: DEFAULT_MAX_TTL,
            chunk_size_bytes: DEFAULT_CHUNK_SIZE_BYTES,
            shared_passphrase: "haven-default-passphrase".to_string(),
        }
    }
}

impl NodeConfig {
    /// Load a config from a JSON file, falling back to [`Default`] fields
    /// the document omits.
    pub fn from_file(path: &std::path::Path) -> Result<Self, NetworkError> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| NetworkError::Config(format!("reading {}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| NetworkError::Config(format!("parsing {}: {e}", path.display())))
    }

    /// Janitor sweep cadence: half the neighbor timeout, capped at 30s, so a
    /// timed-out neighbor is never visible for more than one extra sweep.
    pub fn janitor_interval_s(&self) -> u64 {
        (self.node_timeout_s / 2).min(30).max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_matches_protocol_constants() {
        let cfg = NodeConfig::default();
        assert_eq!(cfg.discovery_port, DEFAULT_DISCOVERY_PORT);
        assert_eq!(cfg.max_ttl, DEFAULT_MAX_TTL);
    }

    #[test]
    fn janitor_interval_is_capped_at_30s() {
        let mut cfg = NodeConfig::default();
        cfg.node_timeout_s = 1000;
        assert_eq!(cfg.janitor_interval_s(), 30);
        cfg.node_timeout_s = 10;
        assert_eq!(cfg.janitor_interval_s(), 5);
    }

    #[test]
    fn round_trips_through_json() {
        let cfg = NodeConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: NodeConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.hostname, back.hostname);
    }
}
