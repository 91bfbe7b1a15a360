//! # SHA256-with-RSA Signatures
//!
//! Both directions of the protocol use the same primitive: RSASSA-PKCS1-v1_5
//! over a SHA-256 digest, base64-encoded for transport. The merchant signs
//! requests with its private key; the platform signs responses with the key
//! behind one of its rotating certificates.
//!
//! PKCS#1 v1.5 signing is deterministic, which is what lets tests pin exact
//! signature strings produced by other implementations.

use base64::{engine::general_purpose::STANDARD, Engine};
use rsa::pkcs1v15::{Signature, SigningKey, VerifyingKey};
use rsa::signature::{SignatureEncoding, Signer, Verifier};
use sha2::Sha256;
use thiserror::Error;

/// Errors during signature operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("signing failed: {0}")]
    SignFailed(String),

    #[error("signature is not valid base64 or has the wrong length")]
    MalformedSignature,
}

/// Sign `message` and return the base64 signature.
pub fn sign_sha256_rsa(key: &SigningKey<Sha256>, message: &[u8]) -> Result<String, SignatureError> {
    let signature = key
        .try_sign(message)
        .map_err(|e| SignatureError::SignFailed(e.to_string()))?;
    Ok(STANDARD.encode(signature.to_bytes()))
}

/// Verify a base64 signature over `message`.
///
/// Returns `Ok(true)` only when the RSA primitive accepts the signature.
/// A signature that doesn't decode at all is an error rather than `false`
/// so callers can tell a garbled header from a forged one in logs.
pub fn verify_sha256_rsa(
    key: &VerifyingKey<Sha256>,
    message: &[u8],
    signature_b64: &str,
) -> Result<bool, SignatureError> {
    let raw = STANDARD
        .decode(signature_b64.trim())
        .map_err(|_| SignatureError::MalformedSignature)?;
    let signature =
        Signature::try_from(raw.as_slice()).map_err(|_| SignatureError::MalformedSignature)?;
    Ok(key.verify(message, &signature).is_ok())
}
