use std::time::Duration;

/// Prefix applied to every key the fallback store owns.
pub const DEFAULT_KEY_PREFIX: &str = "cache:";

/// Capacity ceiling of the volatile fallback store, in bytes.
pub const DEFAULT_FALLBACK_CAPACITY_BYTES: usize = 5 * 1024 * 1024;

/// File name of the durable cache database inside the data directory.
pub const CACHE_DB_FILE_NAME: &str = "fin-data-lab-cache.db";

/// File name of the persisted fallback key/value store.
pub const FALLBACK_STORE_FILE_NAME: &str = "fin-data-lab-cache-fallback.json";

/// Size reported by the durable backend, which does not scan for byte totals.
pub const DURABLE_SIZE_UNAVAILABLE: &str = "N/A (SQLite)";

/// Size reported when stats could not be read at all.
pub const SIZE_UNKNOWN: &str = "Unknown";

/// How often the status indicator refreshes cache stats.
pub const DEFAULT_STATS_REFRESH_INTERVAL: Duration = Duration::from_secs(30);

pub const HOUR_MS: i64 = 60 * 60 * 1000;
