//! # Protocol Configuration & Constants
//!
//! Every wire-level constant of the v3 API lives here: the base host, the
//! authorization scheme tag, the response header names that carry the
//! platform signature, and the cache/timeout parameters. If you find a
//! header name spelled out somewhere else, move it here.
//!
//! [`ClientConfig`] holds the runtime knobs a host application may tune.
//! Everything in it has a sane default, so `ClientConfig::default()` talks to
//! production with the file cache rooted in `./cache`.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Production API host. Paths are appended verbatim.
pub const DEFAULT_BASE_URL: &str = "https://api.mch.weixin.qq.com";

/// Platform certificate listing endpoint.
pub const CERTIFICATES_PATH: &str = "/v3/certificates";

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

/// Scheme tag that prefixes the token in the `Authorization` header.
pub const AUTH_SCHEME: &str = "WECHATPAY2-SHA256-RSA2048";

/// Name of the only AEAD algorithm the platform uses for certificates.
pub const CERTIFICATE_AEAD_ALGORITHM: &str = "AEAD_AES_256_GCM";

/// User-Agent sent when the host doesn't configure one.
pub const DEFAULT_USER_AGENT: &str = concat!("wepay-protocol/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Response headers
// ---------------------------------------------------------------------------

/// Response timestamp (seconds since epoch, decimal).
pub const HEADER_TIMESTAMP: &str = "wechatpay-timestamp";

/// Response nonce.
pub const HEADER_NONCE: &str = "wechatpay-nonce";

/// Base64 RSA-SHA256 signature over the verify string.
pub const HEADER_SIGNATURE: &str = "wechatpay-signature";

/// Serial of the platform certificate that produced the signature.
pub const HEADER_SERIAL: &str = "wechatpay-serial";

/// Platform-side request identifier. Handy when filing a ticket.
pub const HEADER_REQUEST_ID: &str = "request-id";

// ---------------------------------------------------------------------------
// Cryptographic parameters
// ---------------------------------------------------------------------------

/// AES-256-GCM key length in bytes. The merchant "API v3 key" is exactly
/// this many ASCII characters.
pub const AES_KEY_LENGTH: usize = 32;

/// AES-256-GCM nonce length in bytes. The platform sends 12 ASCII chars.
pub const AES_NONCE_LENGTH: usize = 12;

/// AES-256-GCM authentication tag length in bytes.
pub const AES_TAG_LENGTH: usize = 16;

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// How long a decrypted platform certificate stays in the cache.
pub const CERTIFICATE_CACHE_TTL_SECS: u64 = 7_200;

/// Upper bound for a single HTTP exchange.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

// ---------------------------------------------------------------------------
// Runtime configuration
// ---------------------------------------------------------------------------

/// How the certificate listing response itself is trusted.
///
/// The listing is the bootstrap of the whole trust store: the client cannot
/// verify its signature with a certificate it has not downloaded yet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BootstrapPolicy {
    /// Trust the listing on the strength of TLS alone; no application-layer
    /// signature check. This is how the platform's reference clients work.
    #[default]
    TransportTrusted,
    /// Verify the listing's signature headers with the certificate it carries
    /// whose serial matches `Wechatpay-Serial`. Nothing is cached if that
    /// check fails. Proves consistency, not an out-of-band root of trust.
    SelfVerified,
}

/// Runtime knobs for an [`AuthenticatedDispatcher`](crate::dispatcher::AuthenticatedDispatcher).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Scheme + host, no trailing slash.
    pub base_url: String,
    /// Network timeout in seconds for one exchange.
    pub timeout_secs: u64,
    /// Directory for the default file-backed certificate cache.
    pub cache_dir: PathBuf,
    /// `User-Agent` header value.
    pub user_agent: String,
    /// Trust model for the certificate listing call.
    pub bootstrap_policy: BootstrapPolicy,
    /// Reject platform certificates past their X.509 `notAfter`.
    pub enforce_certificate_validity: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: DEFAULT_TIMEOUT.as_secs(),
            cache_dir: PathBuf::from("cache"),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            bootstrap_policy: BootstrapPolicy::default(),
            enforce_certificate_validity: true,
        }
    }
}

impl ClientConfig {
    /// The configured timeout as a `Duration`. Zero falls back to the default,
    /// an unbounded exchange is never what anyone wants.
    pub fn timeout(&self) -> Duration {
        if self.timeout_secs == 0 {
            DEFAULT_TIMEOUT
        } else {
            Duration::from_secs(self.timeout_secs)
        }
    }

    /// Joins the base URL and a path-and-query.
    pub fn url_for(&self, path_and_query: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path_and_query)
    }
}
