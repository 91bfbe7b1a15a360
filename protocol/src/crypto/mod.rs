//! # Cryptographic Primitives
//!
//! Thin, typed wrappers around audited implementations. The protocol needs
//! exactly three things:
//!
//! - **RSA PKCS#1 v1.5 with SHA-256** for request signatures and response
//!   verification (`rsa` + `sha2`).
//! - **AES-256-GCM** to open platform certificates delivered encrypted
//!   under the merchant's API v3 key (`aes-gcm`).
//! - **PEM/X.509 parsing** to load the merchant key and read serials and
//!   public keys out of certificates (`x509-cert`).
//!
//! Nothing here performs I/O.

pub mod aead;
pub mod keys;
pub mod signatures;

pub use aead::{AeadDecryptor, AeadError};
pub use keys::{load_private_key, parse_certificate, KeyError, ParsedCertificate};
pub use signatures::{sign_sha256_rsa, verify_sha256_rsa, SignatureError};
