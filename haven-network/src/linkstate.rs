use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use parking_lot::RwLock;

use crate::constants::DEFAULT_LINK_LATENCY;
use crate::neighbors::NeighborTable;

/// A computed route to a destination.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteInfo {
    pub destination: String,
    pub next_hop: String,
    pub hop_count: u32,
    pub total_latency: f64,
}

#[derive(Debug, Clone, PartialEq)]
struct HeapEntry {
    node: String,
    latency: f64,
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap: lower latency pops first.
        other.latency.partial_cmp(&self.latency).unwrap_or(Ordering::Equal)
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Link-state routing table: recomputes shortest paths from this node
/// over the full neighbor graph whenever the topology changes.
#[derive(Default)]
pub struct RoutingTable {
    routes: RwLock<HashMap<String, RouteInfo>>,
}

impl RoutingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute every route from `source` given an adjacency map of
    /// `node -> [(neighbor, latency)]`. Missing latencies default to
    /// [`DEFAULT_LINK_LATENCY`].
    pub fn update_topology(&self, source: &str, adjacency: &HashMap<String, Vec<(String, f64)>>) {
        let routes = Self::compute_routes(source, adjacency);
        *self.routes.write() = routes;
    }

    fn compute_routes(source: &str, adjacency: &HashMap<String, Vec<(String, f64)>>) -> HashMap<String, RouteInfo> {
        let mut best_latency: HashMap<String, f64> = HashMap::new();
        let mut best_hops: HashMap<String, u32> = HashMap::new();
        let mut first_hop: HashMap<String, String> = HashMap::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut heap = BinaryHeap::new();

        best_latency.insert(source.to_string(), 0.0);
        best_hops.insert(source.to_string(), 0);
        heap.push(HeapEntry { node: source.to_string(), latency: 0.0 });

        while let Some(HeapEntry { node, latency }) = heap.pop() {
            if !visited.insert(node.clone()) {
                continue;
            }
            let hops = best_hops.get(&node).copied().unwrap_or(0);
            let Some(edges) = adjacency.get(&node) else { continue };

            for (neighbor, link_latency) in edges {
                let link_latency = if *link_latency > 0.0 { *link_latency } else { DEFAULT_LINK_LATENCY };
                let candidate_latency = latency + link_latency;
                let candidate_hops = hops + 1;
                let improves = best_latency
                    .get(neighbor)
                    .map(|existing| candidate_latency < *existing)
                    .unwrap_or(true);
                if improves {
                    best_latency.insert(neighbor.clone(), candidate_latency);
                    best_hops.insert(neighbor.clone(), candidate_hops);
                    let next_hop = if node == source { neighbor.clone() } else {
                        first_hop.get(&node).cloned().unwrap_or_else(|| neighbor.clone())
                    };
                    first_hop.insert(neighbor.clone(), next_hop);
                    heap.push(HeapEntry { node: neighbor.clone(), latency: candidate_latency });
                }
            }
        }

        first_hop
            .into_iter()
            .map(|(destination, next_hop)| {
                let total_latency = best_latency.get(&destination).copied().unwrap_or(DEFAULT_LINK_LATENCY);
                let hop_count = best_hops.get(&destination).copied().unwrap_or(1);
                (destination.clone(), RouteInfo { destination, next_hop, hop_count, total_latency })
            })
            .collect()
    }

    /// Rebuilds the table from the local node's current neighbor set,
    /// treating every known neighbor as a direct, single-hop edge. Called
    /// whenever the neighbor set changes (a beacon is seen, or a stale
    /// neighbor is evicted).
    pub fn recompute_from_neighbors(&self, local_id: &str, neighbors: &NeighborTable) {
        let edges = neighbors.snapshot().into_iter().map(|n| (n.node_id, DEFAULT_LINK_LATENCY)).collect();
        let mut adjacency = HashMap::new();
        adjacency.insert(local_id.to_string(), edges);
        self.update_topology(local_id, &adjacency);
    }

    pub fn next_hop(&self, destination: &str) -> Option<String> {
        self.routes.read().get(destination).map(|r| r.next_hop.clone())
    }

    pub fn route_to(&self, destination: &str) -> Option<RouteInfo> {
        self.routes.read().get(destination).cloned()
    }

    pub fn snapshot(&self) -> Vec<RouteInfo> {
        self.routes.read().values().cloned().collect()
    }
}
