//! Symmetric encryption for account passwords at rest.
//!
//! Uses AES-256-GCM with a key supplied through configuration. Ciphertexts
//! are stored as base64 of `nonce || ciphertext`, so each encryption of the
//! same password yields a different stored value.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

/// Nonce size for AES-GCM (96 bits).
const NONCE_SIZE: usize = 12;

/// Key size for AES-256 (256 bits).
const KEY_SIZE: usize = 32;

/// Error type for credential operations.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// The configured key is not valid base64 or has the wrong length.
    #[error("Invalid encryption key: {0}")]
    InvalidKey(String),

    /// Encryption failed.
    #[error("Encryption failed")]
    Encrypt,

    /// Decryption failed (wrong key or corrupted ciphertext).
    #[error("Decryption failed")]
    Decrypt,

    /// Stored ciphertext is not in the expected format.
    #[error("Invalid ciphertext format: {0}")]
    InvalidFormat(String),
}

/// Result type for credential operations.
pub type CredentialResult<T> = std::result::Result<T, CredentialError>;

/// Encrypts and decrypts account passwords.
#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl CredentialCipher {
    /// Create a cipher from a base64-encoded 32-byte key.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidKey`] if the key is not base64 or
    /// does not decode to exactly 32 bytes.
    pub fn from_key(key_b64: &str) -> CredentialResult<Self> {
        let key = BASE64
            .decode(key_b64.trim())
            .map_err(|e| CredentialError::InvalidKey(e.to_string()))?;
        if key.len() != KEY_SIZE {
            return Err(CredentialError::InvalidKey(format!(
                "expected {KEY_SIZE} bytes, got {}",
                key.len()
            )));
        }
        let cipher = Aes256Gcm::new_from_slice(&key)
            .map_err(|e| CredentialError::InvalidKey(e.to_string()))?;
        Ok(Self { cipher })
    }

    /// Encrypt a password for storage.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::Encrypt`] if the cipher fails.
    pub fn encrypt(&self, plaintext: &str) -> CredentialResult<String> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|_| CredentialError::Encrypt)?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce);
        combined.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(combined))
    }

    /// Decrypt a stored password.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::InvalidFormat`] if the stored value is not
    /// base64 or too short, [`CredentialError::Decrypt`] if authentication
    /// fails (wrong key or tampered data).
    pub fn decrypt(&self, stored: &str) -> CredentialResult<String> {
        let combined = BASE64
            .decode(stored.trim())
            .map_err(|e| CredentialError::InvalidFormat(e.to_string()))?;
        if combined.len() <= NONCE_SIZE {
            return Err(CredentialError::InvalidFormat(
                "ciphertext shorter than nonce".to_string(),
            ));
        }

        let (nonce, ciphertext) = combined.split_at(NONCE_SIZE);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| CredentialError::Decrypt)?;
        String::from_utf8(plaintext).map_err(|e| CredentialError::InvalidFormat(e.to_string()))
    }
}

impl std::fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialCipher").finish_non_exhaustive()
    }
}
