use thiserror::Error;

/// Failure modes for key management and signed-blob verification.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("failed to read or write key material: {0}")]
    KeyIo(#[from] std::io::Error),

    #[error("key material is malformed: {0}")]
    KeyEncoding(String),

    #[error("no private key is loaded for this node")]
    MissingPrivateKey,
}
