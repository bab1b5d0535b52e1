use std::time::Duration;

use crate::constants::{DEFAULT_FALLBACK_CAPACITY_BYTES, DEFAULT_KEY_PREFIX};

/// Runtime options for [`super::CacheService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    /// Try the durable backend before falling back.
    pub durable_enabled: bool,
    /// Prefix for keys owned by the fallback store.
    pub key_prefix: String,
    /// Capacity ceiling of the in-process fallback store.
    pub fallback_capacity_bytes: usize,
    /// Treat reads slower than this as a miss. `None` waits indefinitely.
    pub read_timeout: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            durable_enabled: true,
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            fallback_capacity_bytes: DEFAULT_FALLBACK_CAPACITY_BYTES,
            read_timeout: None,
        }
    }
}
