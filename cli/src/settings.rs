//! # Settings
//!
//! Resolves the merchant credential and client configuration from an
//! optional JSON file, then lets command-line flags (and their `WEPAY_*`
//! environment fallbacks) override individual fields.
//!
//! ```json
//! {
//!   "merchant": {
//!     "mch_id": "1900000001",
//!     "mch_v3_key": "...",
//!     "cert_public": "certs/apiclient_cert.pem",
//!     "cert_private": "certs/apiclient_key.pem"
//!   },
//!   "client": { "cache_dir": "/var/cache/wepay", "bootstrap_policy": "self_verified" }
//! }
//! ```
//!
//! Relative certificate paths in the file are taken relative to the file.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use wepay_protocol::{ClientConfig, MerchantSettings};

use crate::cli::GlobalArgs;

/// On-disk layout of the config file.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsFile {
    pub merchant: MerchantSettings,
    pub client: ClientConfig,
}

impl SettingsFile {
    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let mut file: SettingsFile = serde_json::from_str(&raw)
            .with_context(|| format!("invalid config file {}", path.display()))?;

        if let Some(base) = path.parent() {
            file.merchant.cert_public = rebase(base, &file.merchant.cert_public);
            file.merchant.cert_private = rebase(base, &file.merchant.cert_private);
        }
        Ok(file)
    }
}

/// Merge the config file (if any) with flag overrides.
pub fn resolve(args: &GlobalArgs) -> Result<(MerchantSettings, ClientConfig)> {
    let SettingsFile {
        mut merchant,
        mut client,
    } = match &args.config {
        Some(path) => SettingsFile::load(path)?,
        None => SettingsFile::default(),
    };

    if let Some(mch_id) = &args.mch_id {
        merchant.mch_id = mch_id.clone();
    }
    if let Some(appid) = &args.appid {
        merchant.appid = Some(appid.clone());
    }
    if let Some(key) = &args.api_v3_key {
        merchant.mch_v3_key = key.clone();
    }
    if let Some(cert) = &args.cert_public {
        merchant.cert_public = cert.clone();
    }
    if let Some(key) = &args.cert_private {
        merchant.cert_private = key.clone();
    }
    if let Some(dir) = &args.cache_dir {
        client.cache_dir = dir.clone();
    }
    if let Some(url) = &args.base_url {
        client.base_url = url.clone();
    }

    Ok((merchant, client))
}

/// PEM content passes through; a relative path is joined onto `base`.
fn rebase(base: &Path, value: &str) -> String {
    if value.is_empty() || value.contains("-----BEGIN") || Path::new(value).is_absolute() {
        return value.to_string();
    }
    base.join(value).to_string_lossy().into_owned()
}
