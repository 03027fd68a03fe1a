use base64::{engine::general_purpose::STANDARD, Engine};
use p256::ecdsa::signature::{Signer, Verifier};
use p256::ecdsa::{Signature, SigningKey, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::debug;

use crate::error::IdentityError;
use crate::keys::{self, generate_or_load};
use crate::node_id::NodeId;

/// A signed cleartext payload, serialized as JSON before symmetric encryption.
///
/// Carries the signer's public key inline so a recipient who has never seen
/// this peer before can still verify the signature on first contact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedBlob {
    pub message: String,
    pub signer_id: String,
    pub public_key: String,
    pub signature: String,
}

/// Outcome of verifying a [`SignedBlob`].
#[derive(Debug, Clone)]
pub struct VerifyOutcome {
    pub ok: bool,
    pub cleartext: Option<String>,
    pub signer_id: Option<String>,
    /// Present only on success, for trust-ledger admission of a new signer.
    pub signer_public_key_pem: Option<String>,
}

impl VerifyOutcome {
    fn failure() -> Self {
        Self { ok: false, cleartext: None, signer_id: None, signer_public_key_pem: None }
    }
}

/// Per-node ECDSA P-256 identity: signs outgoing cleartext, persists its
/// keypair, and verifies signed blobs produced by any peer.
pub struct IdentityService {
    node_id: NodeId,
    signing_key: SigningKey,
    public_key_pem: String,
}

impl IdentityService {
    /// Load this node's keypair from `keys_directory`, generating one on first run.
    pub fn new(keys_directory: &Path, node_id: NodeId) -> Result<Self, IdentityError> {
        let (signing_key, verifying_key) = generate_or_load(keys_directory, node_id)?;
        let public_key_pem = keys::verifying_key_to_pem(&verifying_key)?;
        Ok(Self { node_id, signing_key, public_key_pem })
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    /// Sign `cleartext`, embedding this node's own public key for recipients.
    pub fn sign(&self, cleartext: &str) -> SignedBlob {
        let signature: Signature = self.signing_key.sign(cleartext.as_bytes());
        SignedBlob {
            message: cleartext.to_string(),
            signer_id: self.node_id.to_string(),
            public_key: STANDARD.encode(self.public_key_pem.as_bytes()),
            signature: STANDARD.encode(signature.to_bytes()),
        }
    }

    /// Verify a [`SignedBlob`] serialized as JSON. Never panics; every
    /// malformed-input or signature-mismatch case collapses to `ok = false`.
    pub fn verify(signed_blob_json: &str) -> VerifyOutcome {
        let blob: SignedBlob = match serde_json::from_str(signed_blob_json) {
            Ok(blob) => blob,
            Err(e) => {
                debug!(error = %e, "signed blob is not valid JSON");
                return VerifyOutcome::failure();
            }
        };

        let public_key_pem = match STANDARD.decode(&blob.public_key) {
            Ok(bytes) => match String::from_utf8(bytes) {
                Ok(pem) => pem,
                Err(_) => return VerifyOutcome::failure(),
            },
            Err(_) => return VerifyOutcome::failure(),
        };

        let verifying_key: VerifyingKey = match keys::verifying_key_from_pem(&public_key_pem) {
            Ok(key) => key,
            Err(e) => {
                debug!(error = %e, "embedded public key is malformed");
                return VerifyOutcome::failure();
            }
        };

        let signature_bytes = match STANDARD.decode(&blob.signature) {
            Ok(bytes) => bytes,
            Err(_) => return VerifyOutcome::failure(),
        };
        let signature = match Signature::from_slice(&signature_bytes) {
            Ok(sig) => sig,
            Err(_) => return VerifyOutcome::failure(),
        };

        match verifying_key.verify(blob.message.as_bytes(), &signature) {
            Ok(()) => VerifyOutcome {
                ok: true,
                cleartext: Some(blob.message),
                signer_id: Some(blob.signer_id),
                signer_public_key_pem: Some(public_key_pem),
            },
            Err(_) => VerifyOutcome::failure(),
        }
    }
}
