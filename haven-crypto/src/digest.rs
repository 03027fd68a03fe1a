use sha2::{Digest, Sha256};

/// SHA-256 of `msg`, rendered as lowercase hex.
pub fn sha256_hex(msg: &str) -> String {
    let digest = Sha256::digest(msg.as_bytes());
    digest.iter().map(|b| format!("{b:02x}")).collect()
}
