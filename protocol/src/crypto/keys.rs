//! # RSA Keys & X.509 Certificates
//!
//! PEM parsing for the two kinds of key material the protocol handles:
//!
//! - the merchant's **private key** (PKCS#8 `BEGIN PRIVATE KEY`, which is
//!   what the merchant platform hands out; PKCS#1 `BEGIN RSA PRIVATE KEY` is
//!   accepted too), and
//! - **X.509 certificates**, both the merchant's own (we only need its serial)
//!   and the platform's (we need the public key and validity window).
//!
//! Certificate serials are rendered the way the platform prints them:
//! upper-case hex with no leading zero bytes.

use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey};
use rsa::{RsaPrivateKey, RsaPublicKey};
use thiserror::Error;
use x509_cert::der::{DecodePem, Encode};
use x509_cert::Certificate;

/// Errors raised while parsing key material.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("private key is not a PKCS#8 or PKCS#1 RSA key: {0}")]
    PrivateKey(String),

    #[error("certificate is not a valid PEM X.509 certificate: {0}")]
    Certificate(String),

    #[error("certificate does not carry an RSA public key: {0}")]
    PublicKey(String),
}

/// The parts of an X.509 certificate the protocol cares about.
#[derive(Debug, Clone)]
pub struct ParsedCertificate {
    /// Upper-case hex serial number.
    pub serial_no: String,
    /// Subject public key.
    pub public_key: RsaPublicKey,
    /// `notBefore` as unix seconds.
    pub not_before: i64,
    /// `notAfter` as unix seconds.
    pub not_after: i64,
}

/// Parse a PEM RSA private key.
pub fn load_private_key(pem: &str) -> Result<RsaPrivateKey, KeyError> {
    let pem = pem.trim();
    match RsaPrivateKey::from_pkcs8_pem(pem) {
        Ok(key) => Ok(key),
        Err(pkcs8_err) => RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|_| KeyError::PrivateKey(pkcs8_err.to_string())),
    }
}

/// Parse a PEM X.509 certificate and pull out its serial, RSA public key and
/// validity window.
pub fn parse_certificate(pem: &str) -> Result<ParsedCertificate, KeyError> {
    let cert = Certificate::from_pem(pem.trim().as_bytes())
        .map_err(|e| KeyError::Certificate(e.to_string()))?;
    let tbs = &cert.tbs_certificate;

    let spki_der = tbs
        .subject_public_key_info
        .to_der()
        .map_err(|e| KeyError::PublicKey(e.to_string()))?;
    let public_key = RsaPublicKey::from_public_key_der(&spki_der)
        .map_err(|e| KeyError::PublicKey(e.to_string()))?;

    Ok(ParsedCertificate {
        serial_no: serial_to_hex(tbs.serial_number.as_bytes()),
        public_key,
        not_before: tbs.validity.not_before.to_unix_duration().as_secs() as i64,
        not_after: tbs.validity.not_after.to_unix_duration().as_secs() as i64,
    })
}

/// DER integers carry a leading `0x00` when the high bit is set; the
/// platform's serials don't.
fn serial_to_hex(bytes: &[u8]) -> String {
    let start = bytes
        .iter()
        .position(|b| *b != 0)
        .unwrap_or(bytes.len().saturating_sub(1));
    hex::encode_upper(&bytes[start..])
}

/// Normalize a serial for comparison: trim, upper-case.
pub fn normalize_serial(serial: &str) -> String {
    serial.trim().to_ascii_uppercase()
}
