//! File-backed cache: one JSON record per key.
//!
//! The directory comes from configuration and is created on first write.
//! Keys become file names, so anything that could escape the directory is
//! rejected. Writes go to a temp file and are renamed into place so a
//! concurrent reader never sees half a record.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{now_epoch, CacheEntry, CacheError, CacheStore};

/// Default [`CacheStore`]: `<dir>/<name>` holds `{"name","value","expired"}`.
#[derive(Debug, Clone)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// No I/O happens here; the directory is created on demand.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, name: &str) -> Result<PathBuf, CacheError> {
        let bad = name.is_empty()
            || name == "."
            || name.contains("..")
            || name.contains('/')
            || name.contains('\\')
            || name.contains('\0');
        if bad {
            return Err(CacheError::InvalidKey(name.to_string()));
        }
        Ok(self.dir.join(name))
    }

    async fn read_entry(&self, path: &Path) -> Result<Option<Vec<u8>>, CacheError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(CacheError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Delete `name` only if its file still holds `stale`. A `set` that
    /// landed after the read keeps its record, and a live one is returned.
    async fn evict_if_unchanged(
        &self,
        name: &str,
        path: &Path,
        stale: &[u8],
    ) -> Result<Option<String>, CacheError> {
        match self.read_entry(path).await? {
            Some(current) if current != stale => Ok(serde_json::from_slice::<CacheEntry>(&current)
                .ok()
                .filter(|entry| entry.is_live(now_epoch()))
                .map(|entry| entry.value)),
            Some(_) => {
                self.del(name).await?;
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

#[async_trait]
impl CacheStore for FileCache {
    async fn set(&self, name: &str, value: &str, ttl_secs: u64) -> Result<(), CacheError> {
        let path = self.path_for(name)?;
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|source| CacheError::Io {
                path: self.dir.clone(),
                source,
            })?;

        let entry = CacheEntry::new(name, value, ttl_secs, now_epoch());
        let bytes = serde_json::to_vec(&entry).map_err(|e| CacheError::Encode {
            name: name.to_string(),
            reason: e.to_string(),
        })?;

        let tmp = self
            .dir
            .join(format!(".{}.{:016x}.tmp", name, rand::random::<u64>()));
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|source| CacheError::Io {
                path: tmp.clone(),
                source,
            })?;
        if let Err(source) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(CacheError::Io { path, source });
        }

        tracing::debug!(name, expired = entry.expired, "cache entry written");
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Option<String>, CacheError> {
        let path = self.path_for(name)?;
        let Some(bytes) = self.read_entry(&path).await? else {
            return Ok(None);
        };

        match serde_json::from_slice::<CacheEntry>(&bytes) {
            Ok(entry) if entry.is_live(now_epoch()) => Ok(Some(entry.value)),
            Ok(_) => {
                tracing::debug!(name, "cache entry expired, evicting");
                self.evict_if_unchanged(name, &path, &bytes).await
            }
            Err(e) => {
                tracing::warn!(name, error = %e, "corrupt cache entry, evicting");
                self.evict_if_unchanged(name, &path, &bytes).await
            }
        }
    }

    async fn del(&self, name: &str) -> Result<(), CacheError> {
        let path = self.path_for(name)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(source) => Err(CacheError::Io { path, source }),
        }
    }
}
