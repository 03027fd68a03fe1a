use std::net::IpAddr;
use std::time::Instant;

use serde::{Deserialize, Serialize};

/// A neighbor learned via discovery.
///
/// `last_seen` is process-local (an [`Instant`]) and deliberately not
/// serialized: it has no meaning outside this run, unlike the trust ledger
/// which does persist across restarts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeInfo {
    pub node_id: String,
    pub ip_address: IpAddr,
    pub port: u16,
    pub hostname: String,
    #[serde(skip, default = "Instant::now")]
    pub last_seen: Instant,
}

impl NodeInfo {
    pub fn new(node_id: String, ip_address: IpAddr, port: u16, hostname: String) -> Self {
        Self { node_id, ip_address, port, hostname, last_seen: Instant::now() }
    }

    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    pub fn is_stale(&self, timeout_s: u64) -> bool {
        self.last_seen.elapsed().as_secs() >= timeout_s
    }
}
