//! # Merchant Credential
//!
//! Everything the client needs to authenticate as a merchant, validated once
//! at construction so that nothing downstream has to re-check it:
//!
//! - merchant id (`mchid`),
//! - the merchant's RSA private key (signs every request),
//! - the merchant's public certificate (only its serial is sent, as
//!   `serial_no` in the `Authorization` header),
//! - the API v3 key, the 32-byte shared secret that opens AEAD envelopes.
//!
//! Certificates and keys may be given as PEM content or as a path to a PEM
//! file. Anything that looks like PEM is used as-is; anything else is treated
//! as a path. A credential that constructs successfully can always sign.

use std::fmt;
use std::path::{Path, PathBuf};

use rsa::pkcs1v15::SigningKey;
use rsa::RsaPublicKey;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

use crate::config::AES_KEY_LENGTH;
use crate::crypto::keys::{load_private_key, parse_certificate};

const PEM_CERTIFICATE_MARKER: &str = "-----BEGIN CERTIFICATE-----";
const PEM_PRIVATE_KEY_MARKER: &str = "PRIVATE KEY-----";

/// Credential or configuration problems. Raised before any network I/O.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing config field: {0}")]
    MissingField(&'static str),

    #[error("file for {field} does not exist: {}", path.display())]
    FileNotFound { field: &'static str, path: PathBuf },

    #[error("failed to read {field} from {}: {source}", path.display())]
    Unreadable {
        field: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid merchant private key: {0}")]
    InvalidPrivateKey(String),

    #[error("failed to parse merchant certificate: {0}")]
    InvalidCertificate(String),

    #[error("merchant private key does not match the merchant certificate")]
    KeyPairMismatch,

    #[error("api v3 key must be exactly {AES_KEY_LENGTH} bytes, got {0}")]
    InvalidApiV3Key(usize),

    #[error("invalid value for {field}: {reason}")]
    InvalidSetting { field: &'static str, reason: String },
}

/// Raw merchant settings as they come out of a config file or CLI flags.
///
/// `cert_public` and `cert_private` hold PEM content or a file path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MerchantSettings {
    pub appid: Option<String>,
    pub mch_id: String,
    pub mch_v3_key: String,
    pub cert_public: String,
    pub cert_private: String,
}

/// A fully validated merchant identity. Immutable once built.
#[derive(Clone)]
pub struct MerchantCredential {
    mch_id: String,
    appid: Option<String>,
    certificate_pem: String,
    serial_no: String,
    api_v3_key: [u8; AES_KEY_LENGTH],
    signing_key: SigningKey<Sha256>,
}

impl MerchantCredential {
    /// Build a credential from PEM strings.
    pub fn new(
        mch_id: impl Into<String>,
        private_key_pem: &str,
        certificate_pem: &str,
        api_v3_key: &str,
    ) -> Result<Self, ConfigError> {
        let mch_id = mch_id.into();
        if mch_id.trim().is_empty() {
            return Err(ConfigError::MissingField("mch_id"));
        }
        if api_v3_key.is_empty() {
            return Err(ConfigError::MissingField("mch_v3_key"));
        }
        if private_key_pem.trim().is_empty() {
            return Err(ConfigError::MissingField("cert_private"));
        }
        if certificate_pem.trim().is_empty() {
            return Err(ConfigError::MissingField("cert_public"));
        }

        let api_v3_key: [u8; AES_KEY_LENGTH] = api_v3_key
            .as_bytes()
            .try_into()
            .map_err(|_| ConfigError::InvalidApiV3Key(api_v3_key.len()))?;

        let private_key = load_private_key(private_key_pem)
            .map_err(|e| ConfigError::InvalidPrivateKey(e.to_string()))?;
        let certificate = parse_certificate(certificate_pem)
            .map_err(|e| ConfigError::InvalidCertificate(e.to_string()))?;

        // A mismatched pair signs happily and then fails on every request
        // with an opaque SIGN_ERROR from the platform. Catch it here.
        if RsaPublicKey::from(&private_key) != certificate.public_key {
            return Err(ConfigError::KeyPairMismatch);
        }

        Ok(Self {
            mch_id,
            appid: None,
            certificate_pem: certificate_pem.trim().to_string(),
            serial_no: certificate.serial_no,
            api_v3_key,
            signing_key: SigningKey::<Sha256>::new(private_key),
        })
    }

    /// Build a credential from settings, reading PEM files where the settings
    /// hold paths.
    pub fn from_settings(settings: &MerchantSettings) -> Result<Self, ConfigError> {
        if settings.cert_public.trim().is_empty() {
            return Err(ConfigError::MissingField("cert_public"));
        }
        if settings.cert_private.trim().is_empty() {
            return Err(ConfigError::MissingField("cert_private"));
        }

        let certificate_pem =
            resolve_pem("cert_public", &settings.cert_public, PEM_CERTIFICATE_MARKER)?;
        let private_key_pem =
            resolve_pem("cert_private", &settings.cert_private, PEM_PRIVATE_KEY_MARKER)?;

        let credential = Self::new(
            settings.mch_id.clone(),
            &private_key_pem,
            &certificate_pem,
            &settings.mch_v3_key,
        )?;
        Ok(match &settings.appid {
            Some(appid) if !appid.is_empty() => credential.with_appid(appid.clone()),
            _ => credential,
        })
    }

    /// Attach the app id bound to this merchant. Business payloads need it,
    /// signing doesn't.
    pub fn with_appid(mut self, appid: impl Into<String>) -> Self {
        self.appid = Some(appid.into());
        self
    }

    pub fn mch_id(&self) -> &str {
        &self.mch_id
    }

    pub fn appid(&self) -> Option<&str> {
        self.appid.as_deref()
    }

    /// Serial of the merchant certificate, upper-case hex.
    pub fn serial_no(&self) -> &str {
        &self.serial_no
    }

    pub fn certificate_pem(&self) -> &str {
        &self.certificate_pem
    }

    pub(crate) fn api_v3_key(&self) -> &[u8] {
        &self.api_v3_key
    }

    pub(crate) fn signing_key(&self) -> &SigningKey<Sha256> {
        &self.signing_key
    }
}

impl fmt::Debug for MerchantCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MerchantCredential")
            .field("mch_id", &self.mch_id)
            .field("appid", &self.appid)
            .field("serial_no", &self.serial_no)
            .finish_non_exhaustive()
    }
}

/// Return `value` if it already contains PEM, otherwise read it as a path.
fn resolve_pem(field: &'static str, value: &str, marker: &str) -> Result<String, ConfigError> {
    if value.contains(marker) {
        return Ok(value.to_string());
    }

    let path = Path::new(value.trim());
    if !path.exists() {
        return Err(ConfigError::FileNotFound {
            field,
            path: path.to_path_buf(),
        });
    }
    std::fs::read_to_string(path).map_err(|source| ConfigError::Unreadable {
        field,
        path: path.to_path_buf(),
        source,
    })
}
