//! Symmetric payload cipher and digest primitives for the haven mesh protocol.
//!
//! A passphrase-derived AES-256-CBC cipher for envelope payloads, and the
//! SHA-256 digest helper used to derive file ids in the chunked file
//! transfer path.

mod cipher;
mod digest;
mod error;

pub use cipher::CryptoService;
pub use digest::sha256_hex;
pub use error::CryptoError;
