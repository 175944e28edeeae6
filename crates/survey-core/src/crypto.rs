//! PII cipher: AES-256-GCM over phone and email values.
//!
//! Values are encrypted before they enter the session (which may be logged)
//! and decrypted only at the point of handing them to the backend client.
//! The wire format is base64(nonce || ciphertext) with a random 96-bit nonce
//! per encryption. The key lives for the process lifetime unless supplied
//! via `SURVEY_PII_KEY` (base64, 32 bytes); without an external key,
//! ciphertext does not survive a restart.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;

use crate::error::CryptoError;

const KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

/// Symmetric cipher for personally identifiable fields.
pub struct PiiCipher {
    cipher: Aes256Gcm,
}

impl PiiCipher {
    /// Builds a cipher from raw key bytes (must be 32 bytes).
    pub fn new(key: &[u8]) -> Result<Self, CryptoError> {
        if key.len() != KEY_LEN {
            return Err(CryptoError::BadKeyLength(key.len()));
        }
        let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| CryptoError::Cipher)?;
        Ok(Self { cipher })
    }

    /// Builds a cipher with a fresh random key held only in memory.
    pub fn random() -> Self {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        Self::new(&key).expect("fixed-size key")
    }

    /// Uses the base64 key from `SURVEY_PII_KEY` when set, otherwise a
    /// process-lifetime random key.
    pub fn from_env_or_random() -> Result<Self, CryptoError> {
        match std::env::var("SURVEY_PII_KEY") {
            Ok(b64) => {
                let key = BASE64.decode(b64.trim())?;
                Self::new(&key)
            }
            Err(_) => Ok(Self::random()),
        }
    }

    /// Encrypts a value; empty input passes through as the empty string.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }
        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);
        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Cipher)?;
        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(out))
    }

    /// Decrypts a value produced by [`encrypt`](Self::encrypt); empty input
    /// passes through as the empty string.
    pub fn decrypt(&self, ciphertext: &str) -> Result<String, CryptoError> {
        if ciphertext.is_empty() {
            return Ok(String::new());
        }
        let raw = BASE64.decode(ciphertext)?;
        if raw.len() < NONCE_LEN {
            return Err(CryptoError::Truncated);
        }
        let (nonce_bytes, payload) = raw.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let plaintext = self
            .cipher
            .decrypt(nonce, payload)
            .map_err(|_| CryptoError::Cipher)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::Cipher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let cipher = PiiCipher::random();
        for value in ["+79991234567", "user@domain.com", "короткий текст"] {
            let encrypted = cipher.encrypt(value).unwrap();
            assert_ne!(encrypted, value);
            assert_eq!(cipher.decrypt(&encrypted).unwrap(), value);
        }
    }

    #[test]
    fn empty_passes_through() {
        let cipher = PiiCipher::random();
        assert_eq!(cipher.encrypt("").unwrap(), "");
        assert_eq!(cipher.decrypt("").unwrap(), "");
    }

    #[test]
    fn nonce_is_fresh_per_encryption() {
        let cipher = PiiCipher::random();
        let a = cipher.encrypt("+79991234567").unwrap();
        let b = cipher.encrypt("+79991234567").unwrap();
        assert_ne!(a, b);
        assert_eq!(cipher.decrypt(&a).unwrap(), cipher.decrypt(&b).unwrap());
    }

    #[test]
    fn different_key_fails_to_decrypt() {
        let a = PiiCipher::random();
        let b = PiiCipher::random();
        let encrypted = a.encrypt("+79991234567").unwrap();
        assert!(b.decrypt(&encrypted).is_err());
    }

    #[test]
    fn key_length_is_checked() {
        assert!(PiiCipher::new(&[0u8; 16]).is_err());
        assert!(PiiCipher::new(&[0u8; 32]).is_ok());
    }
}
