//! Offline peer-to-peer mesh networking core.
//!
//! Combines per-node identity and a shared symmetric cipher (from
//! `haven-crypto`/`haven-identity`) with UDP discovery, length-prefixed TCP
//! transport, a link-state router, a trust ledger, and chunked file
//! reassembly into a single node controller, [`MeshNode`].

pub mod config;
pub mod constants;
pub mod discovery;
pub mod duplicate_cache;
pub mod envelope;
pub mod error;
pub mod file_transfer;
pub mod linkstate;
pub mod neighbors;
pub mod node;
pub mod node_info;
pub mod router;
pub mod transport;
pub mod trust;

pub use config::NodeConfig;
pub use envelope::{Envelope, MessageKind};
pub use error::NetworkError;
pub use file_transfer::{FileChunk, FileTransferManager};
pub use linkstate::{RouteInfo, RoutingTable};
pub use node::MeshNode;
pub use node_info::NodeInfo;
pub use trust::TrustLedger;
