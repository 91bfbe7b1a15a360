//! Crate-wide error type.
//!
//! Each concern keeps its own narrow error enum next to the code that raises
//! it ([`ConfigError`], [`SigningError`], [`TransportError`],
//! [`VerificationError`], [`CacheError`]). [`ClientError`] is the union the
//! dispatcher hands back to callers. Nothing in this crate retries on error;
//! the only built-in retry is the single certificate refresh in
//! [`AuthenticatedDispatcher::call`](crate::dispatcher::AuthenticatedDispatcher::call).

use thiserror::Error;

use crate::auth::signer::SigningError;
use crate::auth::verifier::VerificationError;
use crate::cache::CacheError;
use crate::credential::ConfigError;
use crate::transport::TransportError;

/// Everything that can go wrong between "sign this request" and "here is a
/// verified response body".
#[derive(Debug, Error)]
pub enum ClientError {
    /// Credential or configuration rejected before any network activity.
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    /// The merchant key could not produce a signature.
    #[error("signing error: {0}")]
    Signing(#[from] SigningError),

    /// Network, TLS or timeout failure. Not retried.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The response could not be authenticated. Its body has been discarded.
    #[error("verification error: {0}")]
    Verification(#[from] VerificationError),

    /// Local cache persistence failed.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// A well-formed response carrying a business error from the platform.
    #[error("upstream API error (HTTP {status}): {code}: {message}")]
    UpstreamApi {
        /// HTTP status of the response.
        status: u16,
        /// Platform error code, e.g. `INVALID_REQUEST`.
        code: String,
        /// Human-readable message from the platform.
        message: String,
    },

    /// The body of an otherwise valid response was not the JSON we expected.
    #[error("malformed response body: {0}")]
    Decode(String),
}

impl ClientError {
    /// `true` for failures where the response must be treated as untrusted.
    pub fn is_verification(&self) -> bool {
        matches!(self, ClientError::Verification(_))
    }

    /// The platform error code, if this is an [`ClientError::UpstreamApi`].
    pub fn upstream_code(&self) -> Option<&str> {
        match self {
            ClientError::UpstreamApi { code, .. } => Some(code),
            _ => None,
        }
    }
}

/// Convenience alias used across the crate.
pub type Result<T> = std::result::Result<T, ClientError>;
