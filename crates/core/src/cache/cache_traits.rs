//! Storage traits for the cache backends.
//!
//! - `DurableCacheStore` - transactional, indexed store (implemented by `storage-sqlite`)
//! - `DurableStoreProvider` - opens (and creates on first run) a durable store
//! - `KeyValueStore` - small synchronous string store used as the fallback

use async_trait::async_trait;
use std::sync::Arc;

use super::cache_model::CacheEntry;
use crate::errors::Result;

/// A durable store keyed by `key`, with non-unique indexes on `date_key` and
/// `expires_at`.
#[async_trait]
pub trait DurableCacheStore: Send + Sync {
    /// Get an entry by key, regardless of validity.
    async fn get_entry(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Insert or fully replace the entry stored under `entry.key`.
    async fn put_entry(&self, entry: CacheEntry) -> Result<()>;

    /// Remove an entry. Removing a missing key is not an error.
    async fn delete_entry(&self, key: &str) -> Result<()>;

    /// Remove every entry, returning how many were removed.
    async fn clear_entries(&self) -> Result<usize>;

    /// Raw row count, including expired rows.
    async fn count_entries(&self) -> Result<usize>;

    /// Rows written on `date_key`, answered from the day index.
    async fn count_entries_for_day(&self, date_key: &str) -> Result<usize>;

    /// Delete rows with `expires_at <= now_ms` or a `date_key` other than `today_key`.
    async fn sweep_expired(&self, now_ms: i64, today_key: &str) -> Result<usize>;

    /// Release resources before shutdown.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

/// Opens the durable store for the cache service.
#[async_trait]
pub trait DurableStoreProvider: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    async fn open(&self) -> Result<Arc<dyn DurableCacheStore>>;
}

/// Synchronous string store with a small capacity ceiling.
pub trait KeyValueStore: Send + Sync {
    fn get_item(&self, key: &str) -> Result<Option<String>>;

    /// Fails with `CacheError::WriteCapacityExceeded` when the store is full.
    fn set_item(&self, key: &str, value: &str) -> Result<()>;

    fn remove_item(&self, key: &str) -> Result<()>;

    /// Every key currently stored, including keys the cache does not own.
    fn keys(&self) -> Result<Vec<String>>;
}
