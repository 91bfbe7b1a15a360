//! # Request Signing
//!
//! Every outbound request carries an `Authorization` header proving the
//! merchant holds its private key. The signature covers a canonical string
//! of five newline-terminated lines:
//!
//! ```text
//! POST\n
//! /v3/transfer/batches?x=1\n
//! 1700000000\n
//! 593BEC0C930BF1AFEB40B4A08C8FB242\n
//! {"out_batch_no":"plfk2020042013"}\n
//! ```
//!
//! Note the terminal newline after the body, even when the body is empty.
//! The path is everything after the host, including a `?`-prefixed query.
//! The body is the exact string sent on the wire; one re-serialized byte and
//! the platform answers `SIGN_ERROR`.
//!
//! The token placed after the scheme tag has a fixed field order:
//!
//! ```text
//! mchid="..",nonce_str="..",timestamp="..",serial_no="..",signature=".."
//! ```

use reqwest::Method;
use thiserror::Error;

use crate::config::AUTH_SCHEME;
use crate::credential::MerchantCredential;
use crate::crypto::signatures::sign_sha256_rsa;

/// The merchant key could not produce a signature.
#[derive(Debug, Error)]
pub enum SigningError {
    #[error("failed to sign request {method} {path}: {reason}")]
    SignFailed {
        method: String,
        path: String,
        reason: String,
    },
}

/// One outbound request, as seen by the signer. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    pub method: Method,
    /// Path plus `?query`, no scheme or host.
    pub path: String,
    /// Seconds since the unix epoch.
    pub timestamp: i64,
    pub nonce: String,
    /// Exact body bytes; empty for GET.
    pub body: String,
}

impl SignedRequest {
    /// A request stamped with the current time and a fresh nonce.
    pub fn new(method: Method, path: impl Into<String>, body: impl Into<String>) -> Self {
        Self::with_parts(
            method,
            path,
            chrono::Utc::now().timestamp(),
            generate_nonce(),
            body,
        )
    }

    /// A request with caller-chosen timestamp and nonce. Tests and replays
    /// only; production requests go through [`SignedRequest::new`].
    pub fn with_parts(
        method: Method,
        path: impl Into<String>,
        timestamp: i64,
        nonce: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            method,
            path: path.into(),
            timestamp,
            nonce: nonce.into(),
            body: body.into(),
        }
    }

    /// The exact string that gets signed.
    pub fn canonical_string(&self) -> String {
        format!(
            "{}\n{}\n{}\n{}\n{}\n",
            self.method.as_str(),
            self.path,
            self.timestamp,
            self.nonce,
            self.body
        )
    }
}

/// A computed authorization for one request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Authorization {
    /// The `mchid=..,signature=..` token, without the scheme.
    pub token: String,
    /// The bare base64 signature.
    pub signature: String,
}

impl Authorization {
    /// Full `Authorization` header value, scheme included.
    pub fn header_value(&self) -> String {
        format!("{} {}", AUTH_SCHEME, self.token)
    }
}

/// Sign the request's canonical string with the merchant key. Returns the
/// base64 signature.
pub fn sign(credential: &MerchantCredential, request: &SignedRequest) -> Result<String, SigningError> {
    sign_sha256_rsa(credential.signing_key(), request.canonical_string().as_bytes()).map_err(|e| {
        SigningError::SignFailed {
            method: request.method.to_string(),
            path: request.path.clone(),
            reason: e.to_string(),
        }
    })
}

/// Sign the request and assemble the authorization token.
pub fn authorize(
    credential: &MerchantCredential,
    request: &SignedRequest,
) -> Result<Authorization, SigningError> {
    let signature = sign(credential, request)?;
    let token = format!(
        r#"mchid="{}",nonce_str="{}",timestamp="{}",serial_no="{}",signature="{}""#,
        credential.mch_id(),
        request.nonce,
        request.timestamp,
        credential.serial_no(),
        signature
    );
    tracing::debug!(
        method = %request.method,
        path = %request.path,
        nonce = %request.nonce,
        "request signed"
    );
    Ok(Authorization { token, signature })
}

/// 45 chars: 13 hex digits of the microsecond clock followed by 128 random
/// bits. The clock prefix keeps nonces from one process monotonic; the random
/// tail keeps concurrent processes apart.
pub fn generate_nonce() -> String {
    let micros = chrono::Utc::now().timestamp_micros().max(0) as u64;
    format!("{:013x}{:032x}", micros, rand::random::<u128>())
}
