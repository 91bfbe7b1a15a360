//! # Platform Certificate Store
//!
//! The platform rotates the certificates it signs responses with. The client
//! learns about them from a signed listing endpoint that returns every
//! currently valid certificate, each one sealed under the merchant's API v3
//! key:
//!
//! ```text
//! {"data":[{"serial_no":"5157F0..","effective_time":"..","expire_time":"..",
//!           "encrypt_certificate":{"algorithm":"AEAD_AES_256_GCM",
//!                                  "nonce":"..","associated_data":"certificate",
//!                                  "ciphertext":"<base64>"}}]}
//! ```
//!
//! A refresh decrypts each entry, checks that the serial it was listed under
//! is the serial inside the X.509 certificate, and caches the PEM for
//! [`CERTIFICATE_CACHE_TTL_SECS`]. Entries are independent: one that fails to
//! open is logged and reported, the rest are still installed.
//!
//! The store never talks to the network itself. The listing comes from a
//! [`CertificateSource`], which in practice is the dispatcher making a signed,
//! unverified GET. Whether that unverified response is trusted on TLS alone
//! or checked against the certificates it carries is the
//! [`BootstrapPolicy`].
//!
//! Reads ([`CertificateStore::get`]) are cache-only.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::HeaderMap;
use rsa::pkcs1v15::VerifyingKey;
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::auth::verifier::{ResponseVerifier, VerificationContext, VerificationError};
use crate::cache::{CacheError, CacheStore};
use crate::config::{BootstrapPolicy, CERTIFICATE_AEAD_ALGORITHM, CERTIFICATE_CACHE_TTL_SECS};
use crate::credential::{ConfigError, MerchantCredential};
use crate::crypto::aead::AeadDecryptor;
use crate::crypto::keys::{normalize_serial, parse_certificate, KeyError};
use crate::error::ClientError;

// ---------------------------------------------------------------------------
// Platform certificate
// ---------------------------------------------------------------------------

/// A decrypted platform certificate, ready to verify responses.
#[derive(Clone)]
pub struct PlatformCertificate {
    serial_no: String,
    pem: String,
    effective_time: Option<String>,
    expire_time: Option<String>,
    not_after: i64,
    verifying_key: VerifyingKey<Sha256>,
}

impl PlatformCertificate {
    /// Parse a PEM certificate. The serial is taken from the certificate.
    pub fn from_pem(pem: &str) -> Result<Self, KeyError> {
        let parsed = parse_certificate(pem)?;
        Ok(Self {
            serial_no: parsed.serial_no,
            pem: pem.to_string(),
            effective_time: None,
            expire_time: None,
            not_after: parsed.not_after,
            verifying_key: VerifyingKey::<Sha256>::new(parsed.public_key),
        })
    }

    /// Attach the informational validity strings from the listing.
    pub fn with_listing_times(
        mut self,
        effective_time: Option<String>,
        expire_time: Option<String>,
    ) -> Self {
        self.effective_time = effective_time;
        self.expire_time = expire_time;
        self
    }

    /// Upper-case hex serial.
    pub fn serial_no(&self) -> &str {
        &self.serial_no
    }

    pub fn pem(&self) -> &str {
        &self.pem
    }

    /// As listed by the platform. `None` when loaded back from the cache.
    pub fn effective_time(&self) -> Option<&str> {
        self.effective_time.as_deref()
    }

    pub fn expire_time(&self) -> Option<&str> {
        self.expire_time.as_deref()
    }

    /// X.509 `notAfter`, unix seconds.
    pub fn not_after(&self) -> i64 {
        self.not_after
    }

    pub fn verifying_key(&self) -> &VerifyingKey<Sha256> {
        &self.verifying_key
    }
}

impl fmt::Debug for PlatformCertificate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformCertificate")
            .field("serial_no", &self.serial_no)
            .field("effective_time", &self.effective_time)
            .field("expire_time", &self.expire_time)
            .field("not_after", &self.not_after)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Listing wire format
// ---------------------------------------------------------------------------

/// Body of `GET /v3/certificates`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CertificateListing {
    #[serde(default)]
    pub data: Vec<CertificateEntry>,
}

/// One sealed certificate in the listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertificateEntry {
    pub serial_no: String,
    #[serde(default)]
    pub effective_time: Option<String>,
    #[serde(default)]
    pub expire_time: Option<String>,
    pub encrypt_certificate: EncryptCertificate,
}

/// The AEAD envelope around one certificate PEM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EncryptCertificate {
    pub algorithm: String,
    pub nonce: String,
    #[serde(default)]
    pub associated_data: String,
    pub ciphertext: String,
}

/// Raw listing response as handed over by a [`CertificateSource`].
#[derive(Debug, Clone)]
pub struct FetchedListing {
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

/// Where listings come from. The dispatcher implements this with a signed,
/// unverified GET against the listing endpoint.
#[async_trait]
pub trait CertificateSource: Send + Sync {
    async fn fetch_certificates(&self) -> Result<FetchedListing, ClientError>;
}

// ---------------------------------------------------------------------------
// Refresh outcome
// ---------------------------------------------------------------------------

/// An entry that could not be installed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFailure {
    pub serial_no: String,
    pub reason: String,
}

/// What a refresh did.
#[derive(Debug, Clone, Default)]
pub struct RefreshOutcome {
    /// Certificates now in the cache, in listing order.
    pub installed: Vec<PlatformCertificate>,
    pub failures: Vec<EntryFailure>,
}

impl RefreshOutcome {
    pub fn contains(&self, serial: &str) -> bool {
        let serial = normalize_serial(serial);
        self.installed.iter().any(|c| c.serial_no == serial)
    }
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

/// Serial-indexed cache of platform certificates.
pub struct CertificateStore {
    cache: Arc<dyn CacheStore>,
    policy: BootstrapPolicy,
    verifier: ResponseVerifier,
    ttl_secs: u64,
}

impl fmt::Debug for CertificateStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertificateStore")
            .field("policy", &self.policy)
            .field("verifier", &self.verifier)
            .field("ttl_secs", &self.ttl_secs)
            .finish_non_exhaustive()
    }
}

impl CertificateStore {
    pub fn new(cache: Arc<dyn CacheStore>, policy: BootstrapPolicy, verifier: ResponseVerifier) -> Self {
        Self {
            cache,
            policy,
            verifier,
            ttl_secs: CERTIFICATE_CACHE_TTL_SECS,
        }
    }

    /// Override the cache lifetime of installed certificates.
    pub fn with_ttl(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn policy(&self) -> BootstrapPolicy {
        self.policy
    }

    /// Fetch the listing, open every entry and cache what opened.
    ///
    /// Fails as a whole only when the listing can't be fetched or parsed,
    /// when a cache write fails, or when [`BootstrapPolicy::SelfVerified`] is
    /// in force and the listing doesn't verify. In that last case nothing is
    /// written.
    pub async fn refresh(
        &self,
        credential: &MerchantCredential,
        source: &dyn CertificateSource,
    ) -> Result<RefreshOutcome, ClientError> {
        let fetched = source.fetch_certificates().await?;
        let listing: CertificateListing = serde_json::from_slice(&fetched.body)
            .map_err(|e| ClientError::Decode(format!("certificate listing: {}", e)))?;

        let decryptor = AeadDecryptor::new(credential.api_v3_key())
            .map_err(|_| ConfigError::InvalidApiV3Key(credential.api_v3_key().len()))?;

        let mut outcome = RefreshOutcome::default();
        for entry in listing.data {
            let serial_no = normalize_serial(&entry.serial_no);
            match open_entry(&decryptor, entry) {
                Ok(certificate) => outcome.installed.push(certificate),
                Err(reason) => {
                    tracing::warn!(serial = %serial_no, %reason, "skipping platform certificate");
                    outcome.failures.push(EntryFailure { serial_no, reason });
                }
            }
        }

        if self.policy == BootstrapPolicy::SelfVerified {
            self.verify_listing(&fetched, &outcome)?;
        }

        for certificate in &outcome.installed {
            let value = STANDARD.encode(certificate.pem.as_bytes());
            self.cache
                .set(&certificate.serial_no, &value, self.ttl_secs)
                .await?;
        }

        tracing::info!(
            installed = outcome.installed.len(),
            failed = outcome.failures.len(),
            policy = ?self.policy,
            "platform certificates refreshed"
        );
        Ok(outcome)
    }

    fn verify_listing(
        &self,
        fetched: &FetchedListing,
        outcome: &RefreshOutcome,
    ) -> Result<(), VerificationError> {
        let context = VerificationContext::from_response(&fetched.headers, &fetched.body)?;
        let serial = normalize_serial(&context.serial);
        let signer = outcome
            .installed
            .iter()
            .find(|c| c.serial_no == serial)
            .ok_or_else(|| VerificationError::UnknownSerial(serial.clone()))?;
        self.verifier.verify(&context, signer)
    }

    /// Look up a certificate by serial. Cache only; a miss, an expired entry
    /// or an unreadable value all come back as `None`.
    pub async fn get(&self, serial: &str) -> Result<Option<PlatformCertificate>, CacheError> {
        let serial = normalize_serial(serial);
        let Some(value) = self.cache.get(&serial).await? else {
            return Ok(None);
        };

        let pem = match STANDARD
            .decode(value.as_bytes())
            .ok()
            .and_then(|bytes| String::from_utf8(bytes).ok())
        {
            Some(pem) => pem,
            None => {
                tracing::warn!(serial = %serial, "cached certificate is not base64 PEM");
                return Ok(None);
            }
        };

        match PlatformCertificate::from_pem(&pem) {
            Ok(certificate) => Ok(Some(certificate)),
            Err(e) => {
                tracing::warn!(serial = %serial, error = %e, "cached certificate does not parse");
                Ok(None)
            }
        }
    }
}

fn open_entry(decryptor: &AeadDecryptor, entry: CertificateEntry) -> Result<PlatformCertificate, String> {
    let sealed = &entry.encrypt_certificate;
    if sealed.algorithm != CERTIFICATE_AEAD_ALGORITHM {
        return Err(format!("unsupported algorithm {}", sealed.algorithm));
    }

    let pem = decryptor
        .decrypt_to_string(&sealed.associated_data, &sealed.nonce, &sealed.ciphertext)
        .map_err(|e| e.to_string())?;
    let certificate = PlatformCertificate::from_pem(&pem).map_err(|e| e.to_string())?;

    let listed = normalize_serial(&entry.serial_no);
    if listed != certificate.serial_no {
        return Err(format!(
            "listed as {} but certificate serial is {}",
            listed, certificate.serial_no
        ));
    }

    Ok(certificate.with_listing_times(entry.effective_time, entry.expire_time))
}
