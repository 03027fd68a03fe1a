use aes::Aes256;
use base64::{engine::general_purpose::STANDARD, Engine};
use cbc::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use pbkdf2::pbkdf2_hmac;
use rand::RngCore;
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::error::CryptoError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;
const PBKDF2_ROUNDS: u32 = 100_000;

/// Application-wide salt for the passphrase-derived symmetric key.
///
/// Fixed and public by design: the key secrecy comes entirely from the
/// shared passphrase, not from the salt.
const PBKDF2_SALT: &[u8] = b"haven-mesh-shared-key-salt-v1";

/// Symmetric payload cipher: AES-256-CBC with a PBKDF2-HMAC-SHA256 derived
/// key and a fresh random IV per call.
///
/// This construction authenticates nothing on its own — confidentiality only.
/// Tamper detection for payloads that need it comes from the signed blob
/// carried as plaintext (see `haven-identity`), not from this cipher. An AEAD
/// such as AES-256-GCM would fold both concerns together; this mesh keeps
/// them separate to match the protocol it was adapted from.
pub struct CryptoService {
    key: Zeroizing<[u8; KEY_LEN]>,
}

impl CryptoService {
    /// Derive the symmetric key once from a shared passphrase.
    pub fn new(shared_passphrase: &str) -> Self {
        let mut key = [0u8; KEY_LEN];
        pbkdf2_hmac::<Sha256>(shared_passphrase.as_bytes(), PBKDF2_SALT, PBKDF2_ROUNDS, &mut key);
        Self { key: Zeroizing::new(key) }
    }

    /// Encrypt `plaintext`, returning `base64(iv || ciphertext)`.
    pub fn encrypt(&self, plaintext: &str) -> String {
        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let ciphertext =
            Aes256CbcEnc::new(self.key.as_slice().into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext.as_bytes());

        let mut out = Vec::with_capacity(IV_LEN + ciphertext.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(&ciphertext);
        STANDARD.encode(out)
    }

    /// Decrypt a value produced by [`CryptoService::encrypt`].
    pub fn decrypt(&self, b64: &str) -> Result<String, CryptoError> {
        let data = STANDARD.decode(b64)?;
        if data.len() < IV_LEN {
            return Err(CryptoError::Truncated);
        }
        let (iv, ciphertext) = data.split_at(IV_LEN);

        let plaintext = Aes256CbcDec::new(self.key.as_slice().into(), iv.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| CryptoError::Padding)?;

        Ok(String::from_utf8(plaintext)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let svc = CryptoService::new("disaster-mesh-passphrase");
        let ct = svc.encrypt("hello mesh");
        assert_eq!(svc.decrypt(&ct).unwrap(), "hello mesh");
    }

    #[test]
    fn different_ivs_per_call() {
        let svc = CryptoService::new("disaster-mesh-passphrase");
        assert_ne!(svc.encrypt("same message"), svc.encrypt("same message"));
    }

    #[test]
    fn rejects_garbage_base64() {
        let svc = CryptoService::new("disaster-mesh-passphrase");
        assert!(svc.decrypt("not base64!!").is_err());
    }

    #[test]
    fn rejects_truncated_ciphertext() {
        let svc = CryptoService::new("disaster-mesh-passphrase");
        assert!(svc.decrypt(&STANDARD.encode(b"short")).is_err());
    }

    #[test]
    fn wrong_passphrase_fails_to_decrypt() {
        let a = CryptoService::new("correct-horse-battery-staple");
        let b = CryptoService::new("something-else");
        let ct = a.encrypt("secret");
        assert!(b.decrypt(&ct).is_err());
    }
}
