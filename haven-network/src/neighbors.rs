use std::collections::HashMap;

use parking_lot::RwLock;
use tracing::info;

use crate::node_info::NodeInfo;

/// Shared neighbor table, consulted by discovery, the router, the link-state
/// engine, and the node controller.
///
/// Guarded by [`parking_lot::RwLock`] rather than a tokio mutex: every
/// critical section here is synchronous bookkeeping with no `.await` inside,
/// so the cheaper non-async lock is the right tool, matching how the
/// discovery cache is guarded elsewhere in this workspace.
#[derive(Default)]
pub struct NeighborTable {
    inner: RwLock<HashMap<String, NodeInfo>>,
}

impl NeighborTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or refresh a neighbor. Logs only on first sighting.
    pub fn upsert(&self, info: NodeInfo) {
        let mut guard = self.inner.write();
        match guard.get_mut(&info.node_id) {
            Some(existing) => {
                existing.ip_address = info.ip_address;
                existing.port = info.port;
                existing.hostname = info.hostname;
                existing.touch();
            }
            None => {
                info!(node_id = %info.node_id, hostname = %info.hostname, "new neighbor discovered");
                guard.insert(info.node_id.clone(), info);
            }
        }
    }

    pub fn get(&self, node_id: &str) -> Option<NodeInfo> {
        self.inner.read().get(node_id).cloned()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.inner.read().contains_key(node_id)
    }

    pub fn snapshot(&self) -> Vec<NodeInfo> {
        self.inner.read().values().cloned().collect()
    }

    /// Drop every neighbor not seen within `timeout_s`, returning their ids.
    pub fn evict_stale(&self, timeout_s: u64) -> Vec<String> {
        let mut guard = self.inner.write();
        let stale: Vec<String> = guard
            .values()
            .filter(|n| n.is_stale(timeout_s))
            .map(|n| n.node_id.clone())
            .collect();
        for id in &stale {
            guard.remove(id);
        }
        stale
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
