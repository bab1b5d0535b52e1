//! Backend dispatch for the cache service.
//!
//! The backend is chosen once at startup and never switches afterwards. All
//! storage calls from the service go through [`CacheBackend`].

use log::{debug, error, info, warn};
use std::sync::Arc;

use super::cache_model::{BackendKind, CacheEntry, CacheStats};
use super::cache_traits::{DurableCacheStore, KeyValueStore};
use crate::constants::DURABLE_SIZE_UNAVAILABLE;
use crate::errors::{CacheError, Error, Result};
use crate::utils::format_bytes;

pub enum CacheBackend {
    Durable(Arc<dyn DurableCacheStore>),
    Fallback(FallbackStore),
}

impl CacheBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            CacheBackend::Durable(_) => BackendKind::Durable,
            CacheBackend::Fallback(_) => BackendKind::Fallback,
        }
    }

    pub async fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        match self {
            CacheBackend::Durable(store) => store.get_entry(key).await,
            CacheBackend::Fallback(store) => store.load(key),
        }
    }

    pub async fn store(&self, entry: CacheEntry) -> Result<()> {
        match self {
            CacheBackend::Durable(store) => store.put_entry(entry).await,
            CacheBackend::Fallback(store) => store.store(&entry),
        }
    }

    pub async fn remove(&self, key: &str) -> Result<()> {
        match self {
            CacheBackend::Durable(store) => store.delete_entry(key).await,
            CacheBackend::Fallback(store) => store.remove(key),
        }
    }

    pub async fn clear(&self) -> Result<usize> {
        match self {
            CacheBackend::Durable(store) => store.clear_entries().await,
            CacheBackend::Fallback(store) => store.clear(),
        }
    }

    pub async fn stats(&self, today_key: &str) -> Result<CacheStats> {
        match self {
            CacheBackend::Durable(store) => {
                let total_entries = store.count_entries().await?;
                let today_entries = store.count_entries_for_day(today_key).await?;
                Ok(CacheStats {
                    total_entries,
                    today_entries,
                    size: DURABLE_SIZE_UNAVAILABLE.to_string(),
                })
            }
            CacheBackend::Fallback(store) => store.stats(today_key),
        }
    }

    /// Sweeps expired and stale entries. The fallback store relies on lazy
    /// deletion instead and always reports zero.
    pub async fn sweep(&self, now_ms: i64, today_key: &str) -> Result<usize> {
        match self {
            CacheBackend::Durable(store) => store.sweep_expired(now_ms, today_key).await,
            CacheBackend::Fallback(_) => Ok(0),
        }
    }

    pub async fn close(&self) -> Result<()> {
        match self {
            CacheBackend::Durable(store) => store.close().await,
            CacheBackend::Fallback(_) => Ok(()),
        }
    }
}

/// Cache entries serialised as JSON inside a shared [`KeyValueStore`].
///
/// Every key is namespaced under `prefix` so that unrelated data sharing the
/// same store is never read, evicted or cleared.
pub struct FallbackStore {
    store: Arc<dyn KeyValueStore>,
    prefix: String,
}

impl FallbackStore {
    pub fn new(store: Arc<dyn KeyValueStore>, prefix: impl Into<String>) -> Self {
        Self {
            store,
            prefix: prefix.into(),
        }
    }

    fn storage_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key)
    }

    fn owned_keys(&self) -> Result<Vec<String>> {
        Ok(self
            .store
            .keys()?
            .into_iter()
            .filter(|k| k.starts_with(&self.prefix))
            .collect())
    }

    fn parse(storage_key: &str, raw: &str) -> Result<CacheEntry> {
        serde_json::from_str(raw).map_err(|e| {
            CacheError::MalformedEntry {
                key: storage_key.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    pub fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        let storage_key = self.storage_key(key);
        let Some(raw) = self.store.get_item(&storage_key)? else {
            return Ok(None);
        };

        match Self::parse(&storage_key, &raw) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!("Removing unreadable cache entry: {}", e);
                self.store.remove_item(&storage_key)?;
                Ok(None)
            }
        }
    }

    /// Writes an entry, evicting the oldest half of the cache and retrying
    /// once if the store is full.
    pub fn store(&self, entry: &CacheEntry) -> Result<()> {
        let storage_key = self.storage_key(&entry.key);
        let serialized = serde_json::to_string(entry)?;

        match self.store.set_item(&storage_key, &serialized) {
            Ok(()) => Ok(()),
            Err(Error::Cache(CacheError::WriteCapacityExceeded { .. })) => {
                warn!(
                    "Fallback cache is full while writing {}; evicting oldest entries",
                    entry.key
                );
                self.evict_oldest_half()?;
                self.store.set_item(&storage_key, &serialized).map_err(|e| {
                    error!("Cache write for {} failed after eviction: {}", entry.key, e);
                    e
                })
            }
            Err(e) => Err(e),
        }
    }

    pub fn remove(&self, key: &str) -> Result<()> {
        self.store.remove_item(&self.storage_key(key))
    }

    pub fn clear(&self) -> Result<usize> {
        let keys = self.owned_keys()?;
        for key in &keys {
            self.store.remove_item(key)?;
        }
        info!("Removed {} entries from the fallback cache", keys.len());
        Ok(keys.len())
    }

    pub fn stats(&self, today_key: &str) -> Result<CacheStats> {
        let mut total_entries = 0;
        let mut today_entries = 0;
        let mut size: u64 = 0;

        for key in self.owned_keys()? {
            let Some(raw) = self.store.get_item(&key)? else {
                continue;
            };
            total_entries += 1;
            size += raw.len() as u64;

            if let Ok(entry) = Self::parse(&key, &raw) {
                if entry.date_key == today_key {
                    today_entries += 1;
                }
            }
        }

        Ok(CacheStats {
            total_entries,
            today_entries,
            size: format_bytes(size),
        })
    }

    /// Removes the oldest `ceil(n / 2)` entries by write time. Malformed
    /// entries found during the scan are removed as well.
    fn evict_oldest_half(&self) -> Result<usize> {
        let mut items: Vec<(String, i64)> = Vec::new();

        for key in self.owned_keys()? {
            let Some(raw) = self.store.get_item(&key)? else {
                continue;
            };
            match Self::parse(&key, &raw) {
                Ok(entry) => items.push((key, entry.timestamp)),
                Err(e) => {
                    debug!("Dropping unreadable cache entry during eviction: {}", e);
                    self.store.remove_item(&key)?;
                }
            }
        }

        items.sort_by_key(|(_, timestamp)| *timestamp);
        let to_remove = items.len().div_ceil(2);

        for (key, _) in items.iter().take(to_remove) {
            self.store.remove_item(key)?;
        }

        info!("Evicted {} old entries from the fallback cache", to_remove);
        Ok(to_remove)
    }
}
