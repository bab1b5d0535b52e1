//! Cache service implementation.
//!
//! The service chooses a storage backend once, lazily, and then answers
//! get/set/delete/clear/stats against it. Storage failures never reach the
//! caller: reads degrade to a miss and writes are dropped after being logged.

use log::{debug, error, info, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tokio::task::JoinHandle;

use super::backend::{CacheBackend, FallbackStore};
use super::cache_config::CacheConfig;
use super::cache_model::{BackendKind, CacheEntry, CacheStats, Namespace};
use super::cache_traits::{DurableStoreProvider, KeyValueStore};
use super::kv_store::MemoryKeyValueStore;
use crate::errors::{CacheError, Result};
use crate::utils::{Clock, SystemClock};

pub struct CacheService {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    durable_provider: Option<Arc<dyn DurableStoreProvider>>,
    fallback_store: Arc<dyn KeyValueStore>,
    backend: OnceCell<CacheBackend>,
}

impl CacheService {
    pub fn new(
        config: CacheConfig,
        durable_provider: Option<Arc<dyn DurableStoreProvider>>,
        fallback_store: Arc<dyn KeyValueStore>,
    ) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            durable_provider,
            fallback_store,
            backend: OnceCell::new(),
        }
    }

    /// A service that only ever uses an in-process fallback store.
    pub fn fallback_only(config: CacheConfig) -> Self {
        let store = Arc::new(MemoryKeyValueStore::with_capacity_bytes(
            config.fallback_capacity_bytes,
        ));
        Self::new(config, None, store)
    }

    /// Replaces the clock used for expiry and day-boundary checks.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Selects the backend if that has not happened yet.
    ///
    /// Concurrent callers share a single selection.
    pub async fn initialize(&self) -> BackendKind {
        self.ready().await.kind()
    }

    /// The selected backend, or `None` before initialization.
    pub fn backend_kind(&self) -> Option<BackendKind> {
        self.backend.get().map(CacheBackend::kind)
    }

    async fn ready(&self) -> &CacheBackend {
        self.backend
            .get_or_init(|| async { self.select_backend().await })
            .await
    }

    async fn select_backend(&self) -> CacheBackend {
        if self.config.durable_enabled {
            match &self.durable_provider {
                Some(provider) => match provider.open().await {
                    Ok(store) => {
                        info!("Cache using durable backend '{}'", provider.name());
                        let backend = CacheBackend::Durable(store);
                        self.run_sweep(&backend).await;
                        return backend;
                    }
                    Err(e) => {
                        let err = CacheError::BackendUnavailable(e.to_string());
                        warn!("{}. Falling back to the key/value store", err);
                    }
                },
                None => debug!("No durable cache backend configured"),
            }
        }

        info!(
            "Cache using fallback key/value store (prefix '{}')",
            self.config.key_prefix
        );
        CacheBackend::Fallback(FallbackStore::new(
            Arc::clone(&self.fallback_store),
            self.config.key_prefix.clone(),
        ))
    }

    async fn run_sweep(&self, backend: &CacheBackend) -> usize {
        let now_ms = self.clock.now_millis();
        let today_key = self.clock.today_key();

        match backend.sweep(now_ms, &today_key).await {
            Ok(removed) => {
                if removed > 0 {
                    info!("Removed {} expired cache entries", removed);
                }
                removed
            }
            Err(e) => {
                warn!("Expired cache entry sweep failed: {}", e);
                0
            }
        }
    }

    async fn load_entry(&self, backend: &CacheBackend, key: &str) -> Result<Option<CacheEntry>> {
        match self.config.read_timeout {
            Some(limit) => tokio::time::timeout(limit, backend.load(key))
                .await
                .map_err(|_| CacheError::ReadTimeout(key.to_string()))?,
            None => backend.load(key).await,
        }
    }

    async fn remove_quietly(&self, backend: &CacheBackend, key: &str) {
        if let Err(e) = backend.remove(key).await {
            warn!("Failed to remove cache entry {}: {}", key, e);
        }
    }

    /// Returns the cached value for `key` if it exists, has not expired and was
    /// written today. Invalid entries are deleted on the way out.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let backend = self.ready().await;

        let entry = match self.load_entry(backend, key).await {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("Cache miss: {}", key);
                return None;
            }
            Err(e) => {
                let err = CacheError::ReadFailure {
                    key: key.to_string(),
                    reason: e.to_string(),
                };
                warn!("{}", err);
                return None;
            }
        };

        if !entry.is_valid(self.clock.now_millis(), &self.clock.today_key()) {
            debug!("Cache entry expired: {}", key);
            self.remove_quietly(backend, key).await;
            return None;
        }

        match serde_json::from_value::<T>(entry.data) {
            Ok(data) => {
                debug!("Cache hit: {}", key);
                Some(data)
            }
            Err(e) => {
                let err = CacheError::MalformedEntry {
                    key: key.to_string(),
                    reason: e.to_string(),
                };
                warn!("{}", err);
                self.remove_quietly(backend, key).await;
                None
            }
        }
    }

    /// Stores `data` under `key`, replacing any previous entry.
    ///
    /// The entry expires after the namespace TTL or at local midnight,
    /// whichever comes first. Failures are logged, never returned.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, data: &T, namespace: Namespace) {
        match serde_json::to_value(data) {
            Ok(value) => self.write_value(key, value, namespace).await,
            Err(e) => warn!("Cache value for {} is not serializable: {}", key, e),
        }
    }

    /// Fire-and-forget variant of [`set`](Self::set).
    ///
    /// The value is serialized before this returns; the write itself runs on
    /// a spawned task that callers do not need to join.
    pub fn set_detached<T: Serialize + ?Sized>(
        self: &Arc<Self>,
        key: impl Into<String>,
        data: &T,
        namespace: Namespace,
    ) -> JoinHandle<()> {
        let key = key.into();
        let value = serde_json::to_value(data);
        let service = Arc::clone(self);

        tokio::spawn(async move {
            match value {
                Ok(value) => service.write_value(&key, value, namespace).await,
                Err(e) => warn!("Cache value for {} is not serializable: {}", key, e),
            }
        })
    }

    async fn write_value(&self, key: &str, value: Value, namespace: Namespace) {
        let backend = self.ready().await;
        let entry = CacheEntry::new(
            key,
            value,
            namespace,
            self.clock.now_millis(),
            self.clock.today_key(),
        );

        match backend.store(entry).await {
            Ok(()) => debug!("Cached {} ({})", key, namespace),
            Err(e) => error!("Dropping cache write for {}: {}", key, e),
        }
    }

    /// Removes one entry. Missing keys are ignored.
    pub async fn delete(&self, key: &str) {
        let backend = self.ready().await;
        self.remove_quietly(backend, key).await;
    }

    /// Removes every entry the service owns.
    pub async fn clear(&self) {
        let backend = self.ready().await;
        match backend.clear().await {
            Ok(removed) => info!("Cache cleared ({} entries)", removed),
            Err(e) => warn!("Failed to clear cache: {}", e),
        }
    }

    /// Raw entry counts and a human-readable size.
    pub async fn get_stats(&self) -> CacheStats {
        let backend = self.ready().await;
        match backend.stats(&self.clock.today_key()).await {
            Ok(stats) => stats,
            Err(e) => {
                warn!("Failed to read cache stats: {}", e);
                CacheStats::unknown()
            }
        }
    }

    /// Sweeps expired and stale entries on demand.
    ///
    /// The durable backend is already swept once at startup; the fallback
    /// store only cleans up lazily and reports zero here.
    pub async fn sweep_expired(&self) -> usize {
        let backend = self.ready().await;
        self.run_sweep(backend).await
    }

    /// Flushes and releases the backend, if one was selected.
    pub async fn shutdown(&self) {
        if let Some(backend) = self.backend.get() {
            if let Err(e) = backend.close().await {
                warn!("Failed to close cache backend: {}", e);
            }
        }
    }
}
