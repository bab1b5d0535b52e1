//! Cache module - persistent API response cache with TTL and day-bound expiry.
//!
//! ```text
//! CachedFetcher ──► CacheService ──► CacheBackend
//!                                      ├─ Durable  (DurableCacheStore, e.g. SQLite)
//!                                      └─ Fallback (KeyValueStore, prefixed keys)
//! ```
//!
//! The backend is selected once, on first use: the durable store when it can
//! be opened (followed by a sweep of expired rows), otherwise the fallback.

mod backend;
mod cache_config;
mod cache_keys;
mod cache_model;
mod cache_service;
mod cache_traits;
mod cached_fetch;
mod kv_store;
mod stats_monitor;


pub use cache_config::CacheConfig;
pub use cache_keys::{generate_key, KeyParam};
pub use cache_model::{BackendKind, CacheEntry, CacheStats, Namespace};
pub use cache_service::CacheService;
pub use cache_traits::{DurableCacheStore, DurableStoreProvider, KeyValueStore};
pub use cached_fetch::{CachedFetcher, Fetched};
pub use kv_store::{FileKeyValueStore, MemoryKeyValueStore};
pub use stats_monitor::spawn_stats_refresher;
