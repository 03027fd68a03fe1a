use thiserror::Error;

/// Failure modes for the symmetric payload cipher.
///
/// Every variant maps onto a caller action of "drop the envelope silently" —
/// none of them are meant to be surfaced to a human.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("ciphertext is not valid base64")]
    Base64(#[from] base64::DecodeError),

    #[error("ciphertext shorter than one AES block")]
    Truncated,

    #[error("PKCS#7 padding is invalid")]
    Padding,

    #[error("decrypted plaintext is not valid UTF-8")]
    Utf8(#[from] std::string::FromUtf8Error),
}
