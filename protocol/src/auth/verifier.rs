//! # Response Verification
//!
//! The platform signs every response with the private key behind one of its
//! platform certificates. Four headers carry what we need:
//!
//! | Header                | Use                                       |
//! |-----------------------|-------------------------------------------|
//! | `Wechatpay-Timestamp` | line 1 of the verify string               |
//! | `Wechatpay-Nonce`     | line 2 of the verify string               |
//! | `Wechatpay-Signature` | base64 RSA-SHA256 signature               |
//! | `Wechatpay-Serial`    | which platform certificate signed it      |
//!
//! The verify string is `timestamp\nnonce\nbody\n`: same terminal-newline
//! rule as request signing, body as the exact bytes received.
//!
//! Verification fails closed. A missing header, an unparseable signature,
//! an expired certificate or a `false` from the RSA primitive all produce a
//! [`VerificationError`], and the body must not be acted upon.
//!
//! This module never fetches certificates. Looking one up, and refreshing
//! once when the serial is unknown, is the dispatcher's job.

use reqwest::header::HeaderMap;
use thiserror::Error;

use crate::certificates::PlatformCertificate;
use crate::config::{HEADER_NONCE, HEADER_SERIAL, HEADER_SIGNATURE, HEADER_TIMESTAMP};
use crate::crypto::keys::normalize_serial;
use crate::crypto::signatures::verify_sha256_rsa;

/// Reasons a response was rejected.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("missing response header: {0}")]
    MissingHeader(&'static str),

    #[error("no platform certificate with serial {0}")]
    UnknownSerial(String),

    /// The response named an unknown serial and the one certificate refresh
    /// it triggered failed. The response stays unverified.
    #[error("platform certificate {serial} unavailable, refresh failed: {reason}")]
    RefreshFailed { serial: String, reason: String },

    #[error("response names serial {response} but certificate is {certificate}")]
    SerialMismatch {
        response: String,
        certificate: String,
    },

    #[error("platform certificate {serial} expired at {not_after}")]
    CertificateExpired { serial: String, not_after: i64 },

    #[error("signature header is not valid base64")]
    MalformedSignature,

    #[error("response signature does not match platform certificate {0}")]
    SignatureMismatch(String),
}

/// What a response claims about its own authenticity. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationContext {
    pub timestamp: String,
    pub nonce: String,
    pub body: Vec<u8>,
    pub signature: String,
    pub serial: String,
}

impl VerificationContext {
    /// Pull the four signature headers out of a response. Header lookup is
    /// case-insensitive. Empty values count as missing.
    pub fn from_response(headers: &HeaderMap, body: &[u8]) -> Result<Self, VerificationError> {
        Ok(Self {
            timestamp: required_header(headers, HEADER_TIMESTAMP)?,
            nonce: required_header(headers, HEADER_NONCE)?,
            signature: required_header(headers, HEADER_SIGNATURE)?,
            serial: required_header(headers, HEADER_SERIAL)?,
            body: body.to_vec(),
        })
    }

    /// `timestamp\nnonce\nbody\n` as bytes.
    pub fn verify_string(&self) -> Vec<u8> {
        let mut out =
            Vec::with_capacity(self.timestamp.len() + self.nonce.len() + self.body.len() + 3);
        out.extend_from_slice(self.timestamp.as_bytes());
        out.push(b'\n');
        out.extend_from_slice(self.nonce.as_bytes());
        out.push(b'\n');
        out.extend_from_slice(&self.body);
        out.push(b'\n');
        out
    }
}

fn required_header(headers: &HeaderMap, name: &'static str) -> Result<String, VerificationError> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .ok_or(VerificationError::MissingHeader(name))
}

/// Checks response signatures against platform certificates.
#[derive(Debug, Clone, Copy)]
pub struct ResponseVerifier {
    enforce_validity: bool,
}

impl Default for ResponseVerifier {
    fn default() -> Self {
        Self::new(true)
    }
}

impl ResponseVerifier {
    /// `enforce_validity` rejects certificates past their X.509 `notAfter`.
    pub fn new(enforce_validity: bool) -> Self {
        Self { enforce_validity }
    }

    /// Verify against the current wall clock.
    pub fn verify(
        &self,
        context: &VerificationContext,
        certificate: &PlatformCertificate,
    ) -> Result<(), VerificationError> {
        self.verify_at(context, certificate, chrono::Utc::now().timestamp())
    }

    /// Verify as of `now` (unix seconds).
    pub fn verify_at(
        &self,
        context: &VerificationContext,
        certificate: &PlatformCertificate,
        now: i64,
    ) -> Result<(), VerificationError> {
        let serial = normalize_serial(&context.serial);
        if serial != certificate.serial_no() {
            return Err(VerificationError::SerialMismatch {
                response: serial,
                certificate: certificate.serial_no().to_string(),
            });
        }

        if self.enforce_validity && certificate.not_after() < now {
            return Err(VerificationError::CertificateExpired {
                serial,
                not_after: certificate.not_after(),
            });
        }

        let valid = verify_sha256_rsa(
            certificate.verifying_key(),
            &context.verify_string(),
            &context.signature,
        )
        .map_err(|_| VerificationError::MalformedSignature)?;

        if valid {
            Ok(())
        } else {
            tracing::warn!(serial = %serial, "response signature rejected");
            Err(VerificationError::SignatureMismatch(serial))
        }
    }
}
