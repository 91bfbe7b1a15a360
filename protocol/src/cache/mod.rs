//! # Key/Value Cache with Expiry
//!
//! The certificate store persists decrypted platform certificates through a
//! small capability trait, [`CacheStore`], so a host can plug in whatever
//! key/value service it already runs. Two backends ship with the crate:
//!
//! ```text
//! file.rs   — one JSON file per key in a configured directory (default)
//! memory.rs — process-local DashMap, for tests and single-process hosts
//! ```
//!
//! ## Expiry semantics
//!
//! `set(name, value, ttl)` stores an absolute expiry of `now + ttl` seconds,
//! or `0` for "never". An entry is live while `expired == 0 || expired >= now`.
//! `get` treats anything else as absent and deletes it on the way out.
//!
//! ## Concurrency
//!
//! No locking across operations. Concurrent writers to the same key race and
//! the last write wins. Every value the certificate store writes is derived
//! deterministically from upstream data, so duplicate concurrent refreshes
//! converge on the same content.

pub mod file;
pub mod memory;

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use file::FileCache;
pub use memory::MemoryCache;

/// Local cache persistence failures.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("invalid cache key: {0:?}")]
    InvalidKey(String),

    #[error("cache I/O error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode cache entry {name}: {reason}")]
    Encode { name: String, reason: String },
}

/// One stored record. `expired` is absolute unix seconds, `0` = never.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub name: String,
    pub value: String,
    pub expired: i64,
}

impl CacheEntry {
    /// Build an entry expiring `ttl_secs` after `now`.
    pub fn new(name: &str, value: &str, ttl_secs: u64, now: i64) -> Self {
        let expired = if ttl_secs == 0 {
            0
        } else {
            now.saturating_add(ttl_secs.min(i64::MAX as u64) as i64)
        };
        Self {
            name: name.to_string(),
            value: value.to_string(),
            expired,
        }
    }

    /// Live while `expired == 0 || expired >= now`.
    pub fn is_live(&self, now: i64) -> bool {
        self.expired == 0 || self.expired >= now
    }
}

/// Pluggable key/value store with per-entry absolute expiry.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Store `value` under `name` for `ttl_secs` seconds (`0` = forever).
    async fn set(&self, name: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError>;

    /// Fetch a live value. Expired entries read as `None`.
    async fn get(&self, name: &str) -> Result<Option<String>, CacheError>;

    /// Remove `name`. Removing a missing key is not an error.
    async fn del(&self, name: &str) -> Result<(), CacheError>;
}

pub(crate) fn now_epoch() -> i64 {
    chrono::Utc::now().timestamp()
}
