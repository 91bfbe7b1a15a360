//! # AEAD-AES-256-GCM Decryption
//!
//! The platform ships its certificates (and callback payloads) encrypted
//! with AES-256-GCM under the merchant's "API v3 key". This module only ever
//! decrypts: the client never needs to produce ciphertext for the platform.
//!
//! ## Wire format
//!
//! Each encrypted object arrives as four strings:
//!
//! | Field             | Meaning                                        |
//! |-------------------|------------------------------------------------|
//! | `algorithm`       | Always `AEAD_AES_256_GCM`                       |
//! | `nonce`           | 12 ASCII characters, used as the raw GCM nonce  |
//! | `associated_data` | ASCII AAD, e.g. `certificate`                   |
//! | `ciphertext`      | base64 of `ciphertext || 16-byte tag`           |
//!
//! `aes-gcm` expects exactly that `ciphertext || tag` layout, so the decoded
//! bytes go in as-is.
//!
//! ## Failure modes
//!
//! GCM either authenticates the whole message or returns nothing. There is
//! no partial plaintext on failure, and we don't distinguish wrong key from
//! wrong nonce from tampered ciphertext.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use base64::{engine::general_purpose::STANDARD, Engine};
use thiserror::Error;

use crate::config::{AES_KEY_LENGTH, AES_NONCE_LENGTH, AES_TAG_LENGTH};

/// Errors that can occur while opening an AEAD envelope.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AeadError {
    #[error("invalid key length: expected {AES_KEY_LENGTH} bytes, got {0}")]
    InvalidKeyLength(usize),

    #[error("invalid nonce length: expected {AES_NONCE_LENGTH} bytes, got {0}")]
    InvalidNonceLength(usize),

    #[error("ciphertext is not valid base64")]
    MalformedCiphertext,

    #[error("ciphertext too short: must be at least {AES_TAG_LENGTH} bytes")]
    CiphertextTooShort,

    #[error("decryption failed -- wrong key, nonce, associated data or corrupted ciphertext")]
    DecryptFailed,

    #[error("decrypted plaintext is not valid UTF-8")]
    NotUtf8,
}

/// Decrypts AEAD-AES-256-GCM envelopes with the merchant's shared key.
#[derive(Clone)]
pub struct AeadDecryptor {
    key: [u8; AES_KEY_LENGTH],
}

impl std::fmt::Debug for AeadDecryptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AeadDecryptor").finish_non_exhaustive()
    }
}

impl AeadDecryptor {
    /// Build a decryptor from the raw key bytes. The API v3 key is a
    /// 32-character ASCII string; its bytes are the AES key.
    pub fn new(key: &[u8]) -> Result<Self, AeadError> {
        let key: [u8; AES_KEY_LENGTH] = key
            .try_into()
            .map_err(|_| AeadError::InvalidKeyLength(key.len()))?;
        Ok(Self { key })
    }

    /// Decrypt raw `ciphertext || tag` bytes.
    pub fn decrypt(
        &self,
        associated_data: &[u8],
        nonce: &[u8],
        ciphertext: &[u8],
    ) -> Result<Vec<u8>, AeadError> {
        // Nonce::from_slice panics on a bad length, so check first.
        if nonce.len() != AES_NONCE_LENGTH {
            return Err(AeadError::InvalidNonceLength(nonce.len()));
        }
        if ciphertext.len() < AES_TAG_LENGTH {
            return Err(AeadError::CiphertextTooShort);
        }

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|_| AeadError::InvalidKeyLength(self.key.len()))?;
        let payload = Payload {
            msg: ciphertext,
            aad: associated_data,
        };

        cipher
            .decrypt(Nonce::from_slice(nonce), payload)
            .map_err(|_| AeadError::DecryptFailed)
    }

    /// Decrypt the string form used on the wire: ASCII AAD and nonce, base64
    /// ciphertext, UTF-8 plaintext.
    pub fn decrypt_to_string(
        &self,
        associated_data: &str,
        nonce: &str,
        ciphertext_b64: &str,
    ) -> Result<String, AeadError> {
        let ciphertext = STANDARD
            .decode(ciphertext_b64.trim())
            .map_err(|_| AeadError::MalformedCiphertext)?;
        let plaintext = self.decrypt(associated_data.as_bytes(), nonce.as_bytes(), &ciphertext)?;
        String::from_utf8(plaintext).map_err(|_| AeadError::NotUtf8)
    }
}
