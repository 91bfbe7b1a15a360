//! In-process cache backed by a `DashMap`.

use async_trait::async_trait;
use dashmap::DashMap;

use super::{now_epoch, CacheEntry, CacheError, CacheStore};

/// [`CacheStore`] that lives and dies with the process. Share it through an
/// `Arc` to give several dispatchers one trust store.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, live or not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn set(&self, name: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        if name.is_empty() {
            return Err(CacheError::InvalidKey(String::new()));
        }
        self.entries.insert(
            name.to_string(),
            CacheEntry::new(name, value, ttl_secs, now_epoch()),
        );
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<String>, CacheError> {
        let now = now_epoch();
        // Don't hold the shard guard across the removal.
        let expired = match self.entries.get(name) {
            Some(entry) if entry.is_live(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.entries.remove_if(name, |_, entry| !entry.is_live(now));
        }
        Ok(None)
    }

    async fn del(&self, name: &str) -> Result<(), CacheError> {
        self.entries.remove(name);
        Ok(())
    }
}
