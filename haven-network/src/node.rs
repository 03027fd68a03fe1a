use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use haven_crypto::CryptoService;
use haven_identity::IdentityService;

use crate::config::NodeConfig;
use crate::constants::MIN_TRUST_TO_RELAY;
use crate::discovery::{run_janitor, DiscoveryAgent};
use crate::duplicate_cache::DuplicateCache;
use crate::envelope::{Envelope, MessageKind};
use crate::error::NetworkError;
use crate::file_transfer::{split_into_chunks, FileChunk, FileTransferManager};
use crate::linkstate::RoutingTable;
use crate::neighbors::NeighborTable;
use crate::node_info::NodeInfo;
use crate::router::{ReceiveOutcome, Router};
use crate::trust::TrustLedger;

type MessageCallback = Box<dyn Fn(Envelope) + Send + Sync>;

/// Top-level controller: owns every other component and drives the
/// network, discovery, and housekeeping tasks.
pub struct MeshNode {
    node_id: String,
    config: NodeConfig,
    router: Arc<Router>,
    neighbors: Arc<NeighborTable>,
    routing: Arc<RoutingTable>,
    trust: Arc<TrustLedger>,
    file_transfer: Arc<FileTransferManager>,
    callbacks: Mutex<Vec<MessageCallback>>,
    shutdown: watch::Sender<bool>,
}

impl MeshNode {
    pub fn new(config: NodeConfig) -> Result<Arc<Self>, NetworkError> {
        let fixed_id = config
            .node_id
            .as_deref()
            .and_then(|s| s.parse::<haven_identity::NodeId>().ok());
        let chosen_id = fixed_id.unwrap_or_else(haven_identity::NodeId::generate);

        let identity = if config.enable_auth {
            Some(Arc::new(IdentityService::new(&config.keys_directory, chosen_id)?))
        } else {
            None
        };
        let node_id = identity.as_ref().map(|i| i.node_id().to_string()).unwrap_or_else(|| chosen_id.to_string());

        let crypto = if config.enable_auth { Some(CryptoService::new(&config.shared_passphrase)) } else { None };
        let trust = Arc::new(TrustLedger::new(config.trust_file.clone()));
        let dup_cache = Arc::new(DuplicateCache::new());

        let router = Arc::new(Router::new(
            node_id.clone(),
            crypto,
            identity,
            trust.clone(),
            dup_cache,
            config.max_ttl,
        ));

        let (shutdown, _) = watch::channel(false);

        let file_transfer = Arc::new(FileTransferManager::new(config.save_directory.clone()));
        file_transfer.register_completion_callback(|filename, path| {
            info!(filename = %filename, path = %path.display(), "file reassembly complete");
        });

        Ok(Arc::new(Self {
            node_id,
            config: config.clone(),
            router,
            neighbors: Arc::new(NeighborTable::new()),
            routing: Arc::new(RoutingTable::new()),
            trust,
            file_transfer,
            callbacks: Mutex::new(Vec::new()),
            shutdown,
        }))
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    /// Register a callback invoked with the full envelope for every delivered
    /// text or control message (`envelope.payload` already holds the
    /// decrypted cleartext).
    pub fn register_callback<F>(&self, callback: F)
    where
        F: Fn(Envelope) + Send + Sync + 'static,
    {
        self.callbacks.lock().push(Box::new(callback));
    }

    pub fn known_nodes(&self) -> Vec<NodeInfo> {
        self.neighbors.snapshot()
    }

    pub fn trust_info(&self) -> HashMap<String, i32> {
        self.trust.trust_info()
    }

    /// Start discovery, the housekeeping janitor, and the TCP listener as
    /// background tasks. Returns once they are spawned; call [`MeshNode::stop`]
    /// to request cooperative shutdown.
    pub async fn start(self: &Arc<Self>) -> Result<(), NetworkError> {
        let discovery = Arc::new(
            DiscoveryAgent::bind(
                self.config.discovery_port,
                self.config.data_port,
                self.node_id.clone(),
                self.config.hostname.clone(),
            )
            .await?,
        );

        let mut shutdown_rx = self.shutdown.subscribe();
        {
            let discovery = discovery.clone();
            let interval = self.config.broadcast_interval_s;
            let mut rx = shutdown_rx.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = discovery.run_broadcaster(interval) => {},
                    _ = rx.changed() => {},
                }
            });
        }
        {
            let discovery = discovery.clone();
            let neighbors = self.neighbors.clone();
            let routing = self.routing.clone();
            let mut rx = shutdown_rx.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = discovery.run_listener(neighbors, routing) => {},
                    _ = rx.changed() => {},
                }
            });
        }
        {
            let neighbors = self.neighbors.clone();
            let routing = self.routing.clone();
            let local_id = self.node_id.clone();
            let interval = self.config.janitor_interval_s();
            let timeout = self.config.node_timeout_s;
            let mut rx = shutdown_rx.clone();
            tokio::spawn(async move {
                tokio::select! {
                    _ = run_janitor(neighbors, routing, local_id, interval, timeout) => {},
                    _ = rx.changed() => {},
                }
            });
        }
        {
            let file_transfer = self.file_transfer.clone();
            let interval = self.config.janitor_interval_s();
            let mut rx = shutdown_rx.clone();
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval));
                loop {
                    tokio::select! {
                        _ = ticker.tick() => file_transfer.cleanup(),
                        _ = rx.changed() => break,
                    }
                }
            });
        }

        let listener = TcpListener::bind(("0.0.0.0", self.config.data_port)).await?;
        let node = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = node.accept_loop(listener) => {},
                _ = shutdown_rx.changed() => {},
            }
        });

        info!(node_id = %self.node_id, port = self.config.data_port, "mesh node started");
        Ok(())
    }

    pub fn stop(&self) {
        let _ = self.shutdown.send(true);
    }

    async fn accept_loop(self: Arc<Self>, listener: TcpListener) {
        loop {
            let (stream, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    warn!(error = %e, "accept failed");
                    continue;
                }
            };
            let node = self.clone();
            tokio::spawn(async move {
                if let Err(e) = node.handle_connection(stream).await {
                    debug!(peer = %peer, error = %e, "connection handler failed");
                }
            });
        }
    }

    async fn handle_connection(self: Arc<Self>, mut stream: TcpStream) -> Result<(), NetworkError> {
        let frame = crate::transport::read_frame(&mut stream).await?;
        let json = String::from_utf8_lossy(&frame);
        self.process_incoming(&json).await;
        Ok(())
    }

    async fn process_incoming(&self, raw_envelope_json: &str) {
        match self.router.receive(raw_envelope_json) {
            ReceiveOutcome::Deliver(envelope) => self.deliver(envelope).await,
            ReceiveOutcome::Forward(envelope) => self.forward(envelope).await,
            ReceiveOutcome::Dropped(reason) => {
                debug!(?reason, "envelope dropped");
            }
        }
    }

    async fn deliver(&self, envelope: Envelope) {
        match envelope.kind {
            MessageKind::Text | MessageKind::Control => {
                let callbacks = self.callbacks.lock();
                for callback in callbacks.iter() {
                    callback(envelope.clone());
                }
            }
            MessageKind::FileChunk => match serde_json::from_str::<FileChunk>(&envelope.payload) {
                Ok(chunk) => {
                    if let Err(e) = self.file_transfer.process_chunk(chunk) {
                        error!(error = %e, "failed to write reassembled file");
                    }
                }
                Err(e) => debug!(error = %e, "malformed file chunk payload"),
            },
        }
    }

    /// Relay a non-local envelope towards its destination, preferring a
    /// computed next hop and falling back to flooding every neighbor not
    /// already on the envelope's route.
    async fn forward(&self, envelope: Envelope) {
        if let Some(next_hop) = self.routing.next_hop(&envelope.dest_id) {
            if let Some(node) = self.neighbors.get(&next_hop) {
                if let Err(e) = self.send_to_node(&node, &envelope).await {
                    warn!(error = %e, next_hop = %next_hop, "relay to computed next hop failed");
                }
                return;
            }
        }

        for node in self.neighbors.snapshot() {
            if envelope.has_visited(&node.node_id) || node.node_id == envelope.source_id {
                continue;
            }
            if let Some(score) = self.trust.score(&node.node_id) {
                if score < MIN_TRUST_TO_RELAY {
                    continue;
                }
            }
            if let Err(e) = self.send_to_node(&node, &envelope).await {
                warn!(error = %e, neighbor = %node.node_id, "relay flood to neighbor failed");
            }
        }
    }

    async fn send_to_node(&self, node: &NodeInfo, envelope: &Envelope) -> Result<(), NetworkError> {
        let addr = std::net::SocketAddr::new(node.ip_address, node.port);
        let mut stream = crate::transport::connect(addr).await?;
        let bytes = serde_json::to_vec(envelope)?;
        crate::transport::write_frame(&mut stream, &bytes).await
    }

    /// Send a text message, unicasting if the destination is a known
    /// neighbor and flooding otherwise.
    pub async fn send(&self, dest_id: &str, message: &str) -> Result<(), NetworkError> {
        let envelope = self.router.build_outgoing(dest_id, MessageKind::Text, message);
        self.deliver_outgoing(dest_id, envelope).await
    }

    /// Chunk and send a file to `dest_id`.
    pub async fn send_file(&self, dest_id: &str, path: &Path) -> Result<(), NetworkError> {
        let data = tokio::fs::read(path)
            .await
            .map_err(|e| NetworkError::Storage(format!("reading {}: {e}", path.display())))?;
        let filename = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("transfer.bin")
            .to_string();

        for chunk in split_into_chunks(&filename, &data, self.config.chunk_size_bytes) {
            let payload = serde_json::to_string(&chunk)?;
            let envelope = self.router.build_outgoing(dest_id, MessageKind::FileChunk, &payload);
            self.deliver_outgoing(dest_id, envelope).await?;
        }
        Ok(())
    }

    async fn deliver_outgoing(&self, dest_id: &str, envelope: Envelope) -> Result<(), NetworkError> {
        if let Some(node) = self.neighbors.get(dest_id) {
            return self.send_to_node(&node, &envelope).await;
        }
        for node in self.neighbors.snapshot() {
            self.send_to_node(&node, &envelope).await?;
        }
        Ok(())
    }
}
