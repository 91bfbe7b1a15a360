//! # Authenticated Dispatcher
//!
//! One call, one linear pass:
//!
//! ```text
//!   SIGN ──► SEND ──► verify? ──no──────────────────────────────► PARSE
//!                       │                                          ▲
//!                       yes                                        │
//!                       ▼                                          │
//!             cert for Wechatpay-Serial? ──hit──► VERIFY ──ok──────┘
//!                       │ miss                      ▲
//!                       ▼                           │
//!                 REFRESH (once) ──► lookup ──hit───┘
//!                   │                  │ miss
//!                   │ error            ▼
//!                   ▼          UnknownSerial (fail)
//!             RefreshFailed (fail)
//! ```
//!
//! Every failure on the verify path is a `VerificationError`, including a
//! refresh that failed on the network or was refused by the platform. The
//! original request was already delivered, so its outcome is unknown.
//!
//! The only retry is the single certificate refresh on an unknown serial, and
//! that refresh does not resend the original request. Any verification
//! failure discards the body.
//!
//! The certificate listing itself is fetched through this dispatcher with
//! verification off, since the client cannot yet hold the certificate that
//! would verify it. See [`BootstrapPolicy`](crate::config::BootstrapPolicy)
//! for how that response is trusted.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::signer::{authorize, SignedRequest};
use crate::auth::verifier::{ResponseVerifier, VerificationContext, VerificationError};
use crate::cache::{CacheStore, FileCache};
use crate::certificates::{CertificateSource, CertificateStore, FetchedListing, RefreshOutcome};
use crate::config::{ClientConfig, CERTIFICATES_PATH, HEADER_REQUEST_ID};
use crate::credential::{ConfigError, MerchantCredential};
use crate::crypto::keys::normalize_serial;
use crate::error::{ClientError, Result};
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

const APPLICATION_JSON: &str = "application/json";

/// A successful, optionally verified, decoded response.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedResponse {
    pub status: u16,
    /// Platform `Request-ID`, if sent.
    pub request_id: Option<String>,
    /// Decoded body; `Value::Null` when the body was empty (e.g. 204).
    pub body: Value,
}

impl ParsedResponse {
    /// Deserialize the body into a typed payload.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.body).map_err(|e| ClientError::Decode(e.to_string()))
    }
}

/// Business error body the platform returns with a non-2xx status.
#[derive(Debug, Deserialize)]
struct UpstreamErrorBody {
    code: String,
    #[serde(default)]
    message: String,
}

/// Signs, sends and verifies calls for one merchant credential.
///
/// `Send + Sync`; share it through an `Arc`. Each instance owns its
/// certificate store, so two dispatchers only share trusted certificates if
/// they were given the same [`CacheStore`].
pub struct AuthenticatedDispatcher {
    credential: MerchantCredential,
    config: ClientConfig,
    user_agent: HeaderValue,
    transport: Arc<dyn Transport>,
    certificates: CertificateStore,
    verifier: ResponseVerifier,
}

impl fmt::Debug for AuthenticatedDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthenticatedDispatcher")
            .field("credential", &self.credential)
            .field("base_url", &self.config.base_url)
            .field("certificates", &self.certificates)
            .finish_non_exhaustive()
    }
}

impl AuthenticatedDispatcher {
    /// Production wiring: `reqwest` transport and a file cache rooted at
    /// `config.cache_dir`.
    pub fn new(credential: MerchantCredential, config: ClientConfig) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        let cache = Arc::new(FileCache::new(config.cache_dir.clone()));
        Self::with_parts(credential, config, transport, cache)
    }

    /// Explicit wiring, for custom transports and shared caches.
    pub fn with_parts(
        credential: MerchantCredential,
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        cache: Arc<dyn CacheStore>,
    ) -> Result<Self> {
        let user_agent =
            HeaderValue::from_str(&config.user_agent).map_err(|e| ConfigError::InvalidSetting {
                field: "user_agent",
                reason: e.to_string(),
            })?;
        let verifier = ResponseVerifier::new(config.enforce_certificate_validity);
        let certificates = CertificateStore::new(cache, config.bootstrap_policy, verifier);

        Ok(Self {
            credential,
            config,
            user_agent,
            transport,
            certificates,
            verifier,
        })
    }

    pub fn credential(&self) -> &MerchantCredential {
        &self.credential
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn certificates(&self) -> &CertificateStore {
        &self.certificates
    }

    /// Sign and send `method path` with a pre-serialized body.
    ///
    /// `path` includes any `?query` and must be the exact string the platform
    /// will see. `body` is sent and signed byte for byte; pass `""` for GET.
    /// With `verify` set the response signature must check out against a
    /// known platform certificate before the body is decoded.
    pub async fn call(
        &self,
        method: Method,
        path: &str,
        body: &str,
        verify: bool,
    ) -> Result<ParsedResponse> {
        let response = self.send_signed(method, path, body).await?;
        if verify {
            self.verify_response(&response).await?;
        }
        parse_response(response)
    }

    /// Like [`call`](Self::call), serializing `payload` as compact JSON first.
    pub async fn call_json<T: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        payload: &T,
        verify: bool,
    ) -> Result<ParsedResponse> {
        let body = serde_json::to_string(payload)
            .map_err(|e| ClientError::Decode(format!("request body: {}", e)))?;
        self.call(method, path, &body, verify).await
    }

    /// Pull the current certificate listing into the cache.
    pub async fn refresh_certificates(&self) -> Result<RefreshOutcome> {
        self.certificates.refresh(&self.credential, self).await
    }

    async fn send_signed(&self, method: Method, path: &str, body: &str) -> Result<HttpResponse> {
        let request = SignedRequest::new(method, path, body);
        let authorization = authorize(&self.credential, &request)?;

        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static(APPLICATION_JSON));
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(APPLICATION_JSON));
        headers.insert(USER_AGENT, self.user_agent.clone());
        let value = HeaderValue::from_str(&authorization.header_value()).map_err(|e| {
            ConfigError::InvalidSetting {
                field: "mch_id",
                reason: e.to_string(),
            }
        })?;
        headers.insert(AUTHORIZATION, value);

        let url = self.config.url_for(&request.path);
        let response = self
            .transport
            .send(HttpRequest {
                method: request.method,
                url,
                headers,
                body: request.body.into_bytes(),
            })
            .await?;
        tracing::debug!(path, status = response.status, "exchange complete");
        Ok(response)
    }

    async fn verify_response(&self, response: &HttpResponse) -> Result<()> {
        let context = VerificationContext::from_response(&response.headers, &response.body)?;
        let serial = normalize_serial(&context.serial);

        let certificate = match self.certificates.get(&serial).await? {
            Some(certificate) => certificate,
            None => {
                tracing::info!(serial = %serial, "unknown platform serial, refreshing certificates");
                if let Err(e) = self.refresh_certificates().await {
                    tracing::warn!(serial = %serial, error = %e, "certificate refresh failed");
                    return Err(VerificationError::RefreshFailed {
                        serial,
                        reason: e.to_string(),
                    }
                    .into());
                }
                self.certificates
                    .get(&serial)
                    .await?
                    .ok_or_else(|| VerificationError::UnknownSerial(serial.clone()))?
            }
        };

        self.verifier.verify(&context, &certificate)?;
        Ok(())
    }
}

#[async_trait]
impl CertificateSource for AuthenticatedDispatcher {
    async fn fetch_certificates(&self) -> Result<FetchedListing> {
        let response = self.send_signed(Method::GET, CERTIFICATES_PATH, "").await?;
        if !response.is_success() {
            return Err(upstream_error(&response));
        }
        Ok(FetchedListing {
            headers: response.headers,
            body: response.body,
        })
    }
}

fn parse_response(response: HttpResponse) -> Result<ParsedResponse> {
    if !response.is_success() {
        return Err(upstream_error(&response));
    }

    let request_id = response
        .headers
        .get(HEADER_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let body = if response.body.iter().all(u8::is_ascii_whitespace) {
        Value::Null
    } else {
        serde_json::from_slice(&response.body).map_err(|e| ClientError::Decode(e.to_string()))?
    };

    Ok(ParsedResponse {
        status: response.status,
        request_id,
        body,
    })
}

fn upstream_error(response: &HttpResponse) -> ClientError {
    match serde_json::from_slice::<UpstreamErrorBody>(&response.body) {
        Ok(error) => ClientError::UpstreamApi {
            status: response.status,
            code: error.code,
            message: error.message,
        },
        Err(_) => ClientError::UpstreamApi {
            status: response.status,
            code: format!("HTTP_{}", response.status),
            message: String::from_utf8_lossy(&response.body).trim().to_string(),
        },
    }
}
