use std::sync::Arc;

use fin_data_lab_core::cache::{
    CacheService, DurableStoreProvider, FileKeyValueStore, KeyValueStore, MemoryKeyValueStore,
};
use fin_data_lab_core::constants::FALLBACK_STORE_FILE_NAME;
use fin_data_lab_storage_sqlite::SqliteStoreProvider;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

/// Installs the global subscriber. `log` records from the library crates are
/// forwarded to it.
pub fn init_tracing(log_format: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false).with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

pub fn build_service(config: &Config) -> Arc<CacheService> {
    let cache_config = config.cache_config();
    let provider: Arc<dyn DurableStoreProvider> =
        Arc::new(SqliteStoreProvider::new(&config.data_dir));
    let fallback_path = config.data_dir.join(FALLBACK_STORE_FILE_NAME);
    let fallback: Arc<dyn KeyValueStore> =
        match FileKeyValueStore::open(&fallback_path, Some(cache_config.fallback_capacity_bytes)) {
            Ok(store) => Arc::new(store),
            Err(e) => {
                tracing::warn!(
                    "Fallback store at {} unavailable, keeping entries in memory: {}",
                    fallback_path.display(),
                    e
                );
                Arc::new(MemoryKeyValueStore::with_capacity_bytes(
                    cache_config.fallback_capacity_bytes,
                ))
            }
        };

    tracing::debug!("Cache data directory: {}", config.data_dir.display());
    Arc::new(CacheService::new(cache_config, Some(provider), fallback))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fin_data_lab_core::cache::{BackendKind, Namespace};
    use std::path::Path;

    fn fallback_config(data_dir: &Path) -> Config {
        Config {
            data_dir: data_dir.to_path_buf(),
            durable_enabled: false,
            key_prefix: "fdl:".into(),
            fallback_capacity_bytes: 64 * 1024,
            read_timeout: None,
            log_format: "text".into(),
        }
    }

    #[tokio::test]
    async fn test_fallback_entries_persist_in_data_dir() {
        let dir = tempfile::tempdir().expect("Failed to create temp directory");

        let first = build_service(&fallback_config(dir.path()));
        assert_eq!(first.initialize().await, BackendKind::Fallback);
        first
            .set("fundSearch:kinea", &serde_json::json!(["KNCR11"]), Namespace::FundSearch)
            .await;
        drop(first);

        assert!(dir.path().join(FALLBACK_STORE_FILE_NAME).exists());

        let second = build_service(&fallback_config(dir.path()));
        let value = second.get::<serde_json::Value>("fundSearch:kinea").await;
        assert_eq!(value, Some(serde_json::json!(["KNCR11"])));
    }
}
