//! AES-256-GCM encryption for values kept at rest or handed to the browser.
//!
//! Used for the stored admin password and for the session token placed in a
//! client-visible cookie. Output is base64 `nonce || ciphertext || tag`.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Nonce size for AES-256-GCM (12 bytes).
const NONCE_SIZE: usize = 12;
/// AES-256 key size (32 bytes).
const KEY_SIZE: usize = 32;
/// GCM tag size (16 bytes).
const TAG_SIZE: usize = 16;

/// Encryption errors.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Key init failed: {0}")]
    Key(String),

    #[error("Encryption failed: {0}")]
    Encrypt(String),

    #[error("Base64 decode failed: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Ciphertext too short")]
    TooShort,

    #[error("Decryption failed")]
    Decrypt,

    #[error("UTF-8 decode failed: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

/// Symmetric cipher bound to one passphrase.
#[derive(Clone)]
pub struct SecretBox {
    key: [u8; KEY_SIZE],
}

impl std::fmt::Debug for SecretBox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretBox").finish_non_exhaustive()
    }
}

impl SecretBox {
    /// Derive a 32-byte key from `passphrase` using SHA-256.
    pub fn new(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        let mut key = [0u8; KEY_SIZE];
        key.copy_from_slice(&digest);
        Self { key }
    }

    fn cipher(&self) -> Result<Aes256Gcm, CryptoError> {
        Aes256Gcm::new_from_slice(&self.key).map_err(|e| CryptoError::Key(e.to_string()))
    }

    /// Encrypt `plaintext`, returning base64 `nonce || ciphertext || tag`.
    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let cipher = self.cipher()?;

        let mut nonce_bytes = [0u8; NONCE_SIZE];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|e| CryptoError::Encrypt(e.to_string()))?;

        let mut combined = Vec::with_capacity(NONCE_SIZE + ciphertext.len());
        combined.extend_from_slice(&nonce_bytes);
        combined.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(&combined))
    }

    /// Decrypt a value produced by [`SecretBox::encrypt`].
    ///
    /// Fails for values that were never encrypted with this key.
    pub fn decrypt(&self, encrypted_b64: &str) -> Result<String, CryptoError> {
        let combined = STANDARD.decode(encrypted_b64)?;
        if combined.len() < NONCE_SIZE + TAG_SIZE {
            return Err(CryptoError::TooShort);
        }

        let cipher = self.cipher()?;
        let nonce = Nonce::from_slice(&combined[..NONCE_SIZE]);
        let plaintext = cipher
            .decrypt(nonce, &combined[NONCE_SIZE..])
            .map_err(|_| CryptoError::Decrypt)?;

        Ok(String::from_utf8(plaintext)?)
    }

    /// True when `value` decrypts under this key.
    pub fn is_encrypted(&self, value: &str) -> bool {
        self.decrypt(value).is_ok()
    }

    /// Encrypt `value` unless it is already encrypted under this key.
    pub fn ensure_encrypted(&self, value: &str) -> Result<String, CryptoError> {
        if self.is_encrypted(value) {
            Ok(value.to_string())
        } else {
            self.encrypt(value)
        }
    }
}
