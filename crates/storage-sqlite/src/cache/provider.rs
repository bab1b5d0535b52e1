use async_trait::async_trait;
use log::info;
use std::path::PathBuf;
use std::sync::Arc;

use fin_data_lab_core::cache::{DurableCacheStore, DurableStoreProvider};
use fin_data_lab_core::errors::{DatabaseError, Result};

use super::repository::SqliteCacheStore;
use crate::db::{create_pool, init, run_migrations, spawn_writer};

/// Opens the cache database under a data directory.
pub struct SqliteStoreProvider {
    data_dir: PathBuf,
}

impl SqliteStoreProvider {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }
}

#[async_trait]
impl DurableStoreProvider for SqliteStoreProvider {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn open(&self) -> Result<Arc<dyn DurableCacheStore>> {
        let data_dir = self.data_dir.to_string_lossy().into_owned();

        let pool = tokio::task::spawn_blocking(move || {
            let db_path = init(&data_dir)?;
            info!("Opening cache database at {}", db_path);
            let pool = create_pool(&db_path)?;
            run_migrations(&pool)?;
            Ok::<_, fin_data_lab_core::Error>(pool)
        })
        .await
        .map_err(|e| DatabaseError::ConnectionFailed(e.to_string()))??;

        let writer = spawn_writer((*pool).clone())?;
        Ok(Arc::new(SqliteCacheStore::new(pool, writer)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use fin_data_lab_core::cache::{
        BackendKind, CacheConfig, CacheService, MemoryKeyValueStore, Namespace,
    };
    use fin_data_lab_core::utils::ManualClock;
    use tempfile::tempdir;

    fn service_in(dir: &std::path::Path, clock: Arc<ManualClock>) -> CacheService {
        CacheService::new(
            CacheConfig::default(),
            Some(Arc::new(SqliteStoreProvider::new(dir))),
            Arc::new(MemoryKeyValueStore::new()),
        )
        .with_clock(clock)
    }

    #[tokio::test]
    async fn test_entries_survive_restart() {
        let dir = tempdir().expect("Failed to create temp directory");
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 10, 9, 0, 0).unwrap(),
        ));

        let first = service_in(dir.path(), clock.clone());
        assert_eq!(first.initialize().await, BackendKind::Durable);
        first
            .set("fundDetail:41_776_752_0001_26", &"Kinea Zeus", Namespace::FundDetail)
            .await;
        first.shutdown().await;
        drop(first);

        clock.advance(Duration::hours(2));
        let second = service_in(dir.path(), clock);
        assert_eq!(
            second.get::<String>("fundDetail:41_776_752_0001_26").await.as_deref(),
            Some("Kinea Zeus")
        );
        assert_eq!(second.get_stats().await.total_entries, 1);
    }

    #[tokio::test]
    async fn test_restart_on_a_new_day_sweeps_old_entries() {
        let dir = tempdir().expect("Failed to create temp directory");
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 10, 22, 0, 0).unwrap(),
        ));

        let first = service_in(dir.path(), clock.clone());
        first.set("fundMetrics:1", &vec![1, 2, 3], Namespace::FundMetrics).await;
        first.set("fundSuggest:k", &"k", Namespace::FundSuggest).await;
        first.shutdown().await;
        drop(first);

        clock.advance(Duration::hours(4));
        let second = service_in(dir.path(), clock);
        second.initialize().await;

        let stats = second.get_stats().await;
        assert_eq!(stats.total_entries, 0);
        assert_eq!(stats.today_entries, 0);
    }
}
