use std::fs;
use std::path::{Path, PathBuf};

use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use rand_core::OsRng;
use tracing::info;

use crate::error::IdentityError;
use crate::node_id::NodeId;

fn private_key_path(dir: &Path, node_id: NodeId) -> PathBuf {
    dir.join(format!("{node_id}_private.pem"))
}

fn public_key_path(dir: &Path, node_id: NodeId) -> PathBuf {
    dir.join(format!("{node_id}_public.pem"))
}

/// Load the persisted P-256 keypair for `node_id` from `keys_directory`,
/// generating and persisting a fresh one if no key files exist yet.
pub fn generate_or_load(
    keys_directory: &Path,
    node_id: NodeId,
) -> Result<(SigningKey, VerifyingKey), IdentityError> {
    fs::create_dir_all(keys_directory)?;

    let priv_path = private_key_path(keys_directory, node_id);
    let pub_path = public_key_path(keys_directory, node_id);

    if priv_path.exists() && pub_path.exists() {
        let signing_key = SigningKey::from_pkcs8_pem(&fs::read_to_string(&priv_path)?)
            .map_err(|e| IdentityError::KeyEncoding(e.to_string()))?;
        let verifying_key = VerifyingKey::from_public_key_pem(&fs::read_to_string(&pub_path)?)
            .map_err(|e| IdentityError::KeyEncoding(e.to_string()))?;
        info!(%node_id, "loaded existing keypair");
        return Ok((signing_key, verifying_key));
    }

    let signing_key = SigningKey::random(&mut OsRng);
    let verifying_key = *signing_key.verifying_key();

    let priv_pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| IdentityError::KeyEncoding(e.to_string()))?;
    let pub_pem = verifying_key
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| IdentityError::KeyEncoding(e.to_string()))?;

    fs::write(&priv_path, priv_pem.as_bytes())?;
    fs::write(&pub_path, pub_pem.as_bytes())?;
    info!(%node_id, "generated new keypair");

    Ok((signing_key, verifying_key))
}

/// Parse a PEM-encoded SEC1/PKCS8 public key, as carried inside a signed blob.
pub fn verifying_key_from_pem(pem: &str) -> Result<VerifyingKey, IdentityError> {
    VerifyingKey::from_public_key_pem(pem).map_err(|e| IdentityError::KeyEncoding(e.to_string()))
}

/// Render a public key as PEM for embedding in a signed blob.
pub fn verifying_key_to_pem(key: &VerifyingKey) -> Result<String, IdentityError> {
    key.to_public_key_pem(LineEnding::LF)
        .map_err(|e| IdentityError::KeyEncoding(e.to_string()))
}
