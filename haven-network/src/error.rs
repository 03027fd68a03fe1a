use haven_crypto::CryptoError;
use haven_identity::IdentityError;
use thiserror::Error;

/// The error taxonomy for the mesh core.
///
/// Within the receive pipeline every variant here is handled locally (the
/// envelope is dropped and a diagnostic is logged) — `NetworkError` exists so
/// that each call site can express *why* it failed, not so that callers
/// propagate it past the connection handler. The exceptions are `Config`
/// (raised to the caller of `send`) and `Storage` on the send path, which the
/// caller may also want to observe.
#[derive(Debug, Error)]
pub enum NetworkError {
    #[error("transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("framing error: {0}")]
    Framing(String),

    #[error("could not decode envelope: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("identity error: {0}")]
    Identity(#[from] IdentityError),

    #[error("routing error: {0}")]
    Routing(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),
}
