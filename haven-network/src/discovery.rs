use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;
use tracing::{debug, warn};

use crate::linkstate::RoutingTable;
use crate::neighbors::NeighborTable;
use crate::node_info::NodeInfo;

/// Wire format of a discovery beacon.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Beacon {
    node_id: String,
    hostname: String,
    data_port: u16,
}

/// UDP broadcast discovery: periodically announces this node and learns
/// neighbors from their announcements.
pub struct DiscoveryAgent {
    socket: Arc<UdpSocket>,
    node_id: String,
    hostname: String,
    data_port: u16,
    broadcast_addr: SocketAddr,
}

impl DiscoveryAgent {
    pub async fn bind(
        discovery_port: u16,
        data_port: u16,
        node_id: String,
        hostname: String,
    ) -> Result<Self, std::io::Error> {
        let socket = UdpSocket::bind(("0.0.0.0", discovery_port)).await?;
        socket.set_broadcast(true)?;
        let broadcast_addr = SocketAddr::new(IpAddr::V4(std::net::Ipv4Addr::BROADCAST), discovery_port);
        Ok(Self { socket: Arc::new(socket), node_id, hostname, data_port, broadcast_addr })
    }

    /// Send one beacon immediately.
    pub async fn announce_once(&self) -> Result<(), std::io::Error> {
        let beacon = Beacon {
            node_id: self.node_id.clone(),
            hostname: self.hostname.clone(),
            data_port: self.data_port,
        };
        let bytes = serde_json::to_vec(&beacon).unwrap_or_default();
        self.socket.send_to(&bytes, self.broadcast_addr).await?;
        Ok(())
    }

    /// Run the periodic broadcaster until cancelled.
    pub async fn run_broadcaster(&self, interval_s: u64) {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_s));
        loop {
            ticker.tick().await;
            if let Err(e) = self.announce_once().await {
                warn!(error = %e, "failed to send discovery beacon");
            }
        }
    }

    /// Run the listener loop, recording every beacon that is not our own
    /// into `neighbors` and recomputing `routing` from the updated neighbor
    /// set, until cancelled.
    pub async fn run_listener(&self, neighbors: Arc<NeighborTable>, routing: Arc<RoutingTable>) {
        let mut buf = vec![0u8; 4096];
        loop {
            let (len, from) = match self.socket.recv_from(&mut buf).await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "discovery socket read failed");
                    continue;
                }
            };
            let Ok(beacon) = serde_json::from_slice::<Beacon>(&buf[..len]) else {
                debug!("dropped malformed discovery beacon");
                continue;
            };
            if beacon.node_id == self.node_id {
                continue;
            }
            neighbors.upsert(NodeInfo::new(beacon.node_id, from.ip(), beacon.data_port, beacon.hostname));
            routing.recompute_from_neighbors(&self.node_id, &neighbors);
        }
    }
}

/// Evict stale neighbors on a fixed cadence, recomputing `routing` whenever
/// an eviction changes the neighbor set, until cancelled.
pub async fn run_janitor(
    neighbors: Arc<NeighborTable>,
    routing: Arc<RoutingTable>,
    local_id: String,
    interval_s: u64,
    timeout_s: u64,
) {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_s));
    loop {
        ticker.tick().await;
        let evicted = neighbors.evict_stale(timeout_s);
        if evicted.is_empty() {
            continue;
        }
        for id in &evicted {
            debug!(node_id = %id, "evicted stale neighbor");
        }
        routing.recompute_from_neighbors(&local_id, &neighbors);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn announce_once_does_not_error_on_a_bound_socket() {
        let agent = DiscoveryAgent::bind(0, 5001, "node-a".to_string(), "host-a".to_string())
            .await
            .unwrap();
        agent.announce_once().await.unwrap();
    }

    #[tokio::test]
    async fn janitor_evicts_nothing_when_neighbors_are_fresh() {
        let neighbors = Arc::new(NeighborTable::new());
        neighbors.upsert(NodeInfo::new(
            "a".to_string(),
            IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            5001,
            "h".to_string(),
        ));
        let evicted = neighbors.evict_stale(3600);
        assert!(evicted.is_empty());
    }

    #[test]
    fn recompute_from_neighbors_builds_single_hop_star() {
        let neighbors = Arc::new(NeighborTable::new());
        neighbors.upsert(NodeInfo::new(
            "b".to_string(),
            IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
            5001,
            "h".to_string(),
        ));
        let routing = RoutingTable::new();
        routing.recompute_from_neighbors("a", &neighbors);
        assert_eq!(routing.next_hop("b"), Some("b".to_string()));
    }
}
