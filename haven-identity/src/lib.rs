//! Per-node ECDSA identity and signed-blob authentication for the haven mesh protocol.
//!
//! Generation and persistence of a per-node P-256 keypair, and
//! signing/verification of the `SignedBlob` that every authenticated message
//! carries as its plaintext.

mod error;
mod keys;
mod node_id;
mod signing;

pub use error::IdentityError;
pub use node_id::NodeId;
pub use signing::{IdentityService, SignedBlob, VerifyOutcome};
