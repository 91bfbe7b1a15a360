// Copyright (c) 2026 WePay v3 Client Contributors. MIT License.
// See LICENSE for details.

//! # WePay v3 Protocol — Core Library
//!
//! Client side of the v3 merchant API's mutual authentication. Every request
//! leaves signed with the merchant's RSA key; every response that matters is
//! checked against the platform's rotating certificates before its body is
//! believed.
//!
//! ## Architecture
//!
//! Leaves first:
//!
//! - **cache** — key/value store with absolute expiry. File and in-memory
//!   backends behind one trait.
//! - **crypto** — RSA-SHA256 sign/verify, AES-256-GCM open, PEM/X.509
//!   parsing. No I/O.
//! - **credential** — the validated merchant identity.
//! - **auth** — canonical request/response strings, `Authorization` token,
//!   response signature check.
//! - **certificates** — download, decrypt and cache platform certificates.
//! - **transport** — the HTTP seam.
//! - **dispatcher** — sign, send, verify (refreshing certificates at most
//!   once), decode.
//! - **config** — wire constants and runtime knobs.
//! - **error** — the crate-wide error union.
//!
//! ## Quick start
//!
//! ```no_run
//! use wepay_protocol::{AuthenticatedDispatcher, ClientConfig, MerchantCredential, MerchantSettings};
//!
//! # async fn run() -> wepay_protocol::Result<()> {
//! let credential = MerchantCredential::from_settings(&MerchantSettings {
//!     mch_id: "1900000001".into(),
//!     mch_v3_key: "0123456789abcdefghijklmnopqrstuv".into(),
//!     cert_public: "certs/apiclient_cert.pem".into(),
//!     cert_private: "certs/apiclient_key.pem".into(),
//!     ..Default::default()
//! })?;
//! let dispatcher = AuthenticatedDispatcher::new(credential, ClientConfig::default())?;
//! let response = dispatcher
//!     .call(wepay_protocol::Method::GET, "/v3/certificates", "", false)
//!     .await?;
//! println!("{}", response.body);
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cache;
pub mod certificates;
pub mod config;
pub mod credential;
pub mod crypto;
pub mod dispatcher;
pub mod error;
pub mod transport;

pub use auth::{Authorization, ResponseVerifier, SignedRequest, VerificationContext, VerificationError};
pub use cache::{CacheError, CacheStore, FileCache, MemoryCache};
pub use certificates::{CertificateSource, CertificateStore, PlatformCertificate, RefreshOutcome};
pub use config::{BootstrapPolicy, ClientConfig};
pub use credential::{ConfigError, MerchantCredential, MerchantSettings};
pub use dispatcher::{AuthenticatedDispatcher, ParsedResponse};
pub use error::{ClientError, Result};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};

// Re-exported so callers don't need a direct reqwest dependency to name
// methods.
pub use reqwest::Method;
