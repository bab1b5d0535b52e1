//! SQLite implementation of the durable cache store.

use async_trait::async_trait;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::SqliteConnection;
use log::{debug, warn};
use std::sync::Arc;

use fin_data_lab_core::cache::{CacheEntry, DurableCacheStore};
use fin_data_lab_core::errors::DatabaseError;
use fin_data_lab_core::Result;

use super::model::ApiCacheEntryDB;
use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::{IntoCore, StorageError};
use crate::schema::api_cache;

pub struct SqliteCacheStore {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl SqliteCacheStore {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    /// Runs a read on a pooled connection off the async worker threads.
    ///
    /// Pool checkout can block for the full connection timeout, so it must
    /// not happen inline in a future that callers wrap in a timeout.
    async fn read<T, F>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = Arc::clone(&self.pool);
        tokio::task::spawn_blocking(move || {
            let mut conn = get_connection(&pool)?;
            job(&mut conn)
        })
        .await
        .map_err(|e| DatabaseError::Internal(format!("cache read task failed: {}", e)))?
    }

    async fn get_entry_impl(&self, entry_key: &str) -> Result<Option<ApiCacheEntryDB>> {
        let entry_key = entry_key.to_string();
        self.read(move |conn| {
            api_cache::table
                .find(entry_key)
                .select(ApiCacheEntryDB::as_select())
                .first::<ApiCacheEntryDB>(conn)
                .optional()
                .into_core()
        })
        .await
    }

    async fn count_impl(&self, day: Option<&str>) -> Result<usize> {
        let day = day.map(str::to_string);
        let count: i64 = self
            .read(move |conn| {
                let counted = match day {
                    Some(day) => api_cache::table
                        .filter(api_cache::date_key.eq(day))
                        .count()
                        .get_result::<i64>(conn),
                    None => api_cache::table.count().get_result::<i64>(conn),
                };
                counted.into_core()
            })
            .await?;
        Ok(count.max(0) as usize)
    }
}

#[async_trait]
impl DurableCacheStore for SqliteCacheStore {
    async fn get_entry(&self, entry_key: &str) -> Result<Option<CacheEntry>> {
        let Some(row) = self.get_entry_impl(entry_key).await? else {
            return Ok(None);
        };

        match <CacheEntry>::try_from(row) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!("Removing unreadable cache row: {}", e);
                self.delete_entry(entry_key).await?;
                Ok(None)
            }
        }
    }

    async fn put_entry(&self, entry: CacheEntry) -> Result<()> {
        let row = ApiCacheEntryDB::try_from(&entry)?;

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::insert_into(api_cache::table)
                    .values(&row)
                    .on_conflict(api_cache::key)
                    .do_update()
                    .set(&row)
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn delete_entry(&self, entry_key: &str) -> Result<()> {
        let entry_key = entry_key.to_string();

        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<()> {
                diesel::delete(api_cache::table.find(entry_key))
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Ok(())
            })
            .await
    }

    async fn clear_entries(&self) -> Result<usize> {
        self.writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                Ok(diesel::delete(api_cache::table)
                    .execute(conn)
                    .map_err(StorageError::from)?)
            })
            .await
    }

    async fn count_entries(&self) -> Result<usize> {
        self.count_impl(None).await
    }

    async fn count_entries_for_day(&self, day: &str) -> Result<usize> {
        self.count_impl(Some(day)).await
    }

    async fn sweep_expired(&self, now_ms: i64, today_key: &str) -> Result<usize> {
        let today_key = today_key.to_string();

        let removed = self
            .writer
            .exec(move |conn: &mut SqliteConnection| -> Result<usize> {
                Ok(diesel::delete(
                    api_cache::table.filter(
                        api_cache::expires_at
                            .le(now_ms)
                            .or(api_cache::date_key.ne(today_key)),
                    ),
                )
                .execute(conn)
                .map_err(StorageError::from)?)
            })
            .await?;

        debug!("Swept {} cache rows", removed);
        Ok(removed)
    }

    /// Folds the WAL back into the main database file.
    async fn close(&self) -> Result<()> {
        self.read(|conn| {
            conn.batch_execute("PRAGMA wal_checkpoint(TRUNCATE);")
                .into_core()
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{create_pool, run_migrations, spawn_writer};
    use fin_data_lab_core::cache::{
        BackendKind, CacheConfig, CacheService, DurableStoreProvider, MemoryKeyValueStore,
        Namespace,
    };
    use serde_json::json;
    use std::time::{Duration, Instant};
    use tempfile::tempdir;

    const NOW: i64 = 1_704_888_000_000;
    const HOUR: i64 = 3_600_000;

    async fn create_test_store() -> (SqliteCacheStore, Arc<DbPool>, tempfile::TempDir) {
        let temp_dir = tempdir().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("cache.db");
        let db_path_str = db_path.to_string_lossy().to_string();

        let pool = create_pool(&db_path_str).expect("Failed to create pool");
        run_migrations(&pool).expect("Failed to run migrations");
        let writer = spawn_writer((*pool).clone()).expect("Failed to start writer");

        (SqliteCacheStore::new(Arc::clone(&pool), writer), pool, temp_dir)
    }

    fn entry(key: &str, data: serde_json::Value, ns: Namespace, at: i64, day: &str) -> CacheEntry {
        CacheEntry::new(key, data, ns, at, day)
    }

    #[tokio::test]
    async fn test_put_and_get_round_trip() {
        let (store, _pool, _dir) = create_test_store().await;
        let written = entry(
            "fundDetail:41_776_752_0001_26",
            json!({ "denom_social": "Kinea Zeus", "vl_patrim_liq": 1.5e9 }),
            Namespace::FundDetail,
            NOW,
            "2024-01-10",
        );

        store.put_entry(written.clone()).await.unwrap();
        let read = store.get_entry(&written.key).await.unwrap();

        assert_eq!(read, Some(written));
        assert_eq!(store.get_entry("fundDetail:other").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_put_replaces_existing_row() {
        let (store, _pool, _dir) = create_test_store().await;

        store
            .put_entry(entry("fundHistory:1", json!(1), Namespace::FundHistory, NOW, "2024-01-10"))
            .await
            .unwrap();
        store
            .put_entry(entry("fundHistory:1", json!(2), Namespace::FundHistory, NOW + HOUR, "2024-01-10"))
            .await
            .unwrap();

        let read = store.get_entry("fundHistory:1").await.unwrap().unwrap();
        assert_eq!(read.data, json!(2));
        assert_eq!(read.timestamp, NOW + HOUR);
        assert_eq!(store.count_entries().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_and_clear() {
        let (store, _pool, _dir) = create_test_store().await;
        for i in 0..3 {
            store
                .put_entry(entry(&format!("fundSearch:{}", i), json!([]), Namespace::FundSearch, NOW, "2024-01-10"))
                .await
                .unwrap();
        }

        store.delete_entry("fundSearch:0").await.unwrap();
        store.delete_entry("fundSearch:0").await.unwrap();
        assert_eq!(store.count_entries().await.unwrap(), 2);

        assert_eq!(store.clear_entries().await.unwrap(), 2);
        assert_eq!(store.count_entries().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_counts_by_day() {
        let (store, _pool, _dir) = create_test_store().await;
        store
            .put_entry(entry("a", json!(1), Namespace::FundDetail, NOW - 20 * HOUR, "2024-01-09"))
            .await
            .unwrap();
        store
            .put_entry(entry("b", json!(2), Namespace::FundDetail, NOW, "2024-01-10"))
            .await
            .unwrap();

        assert_eq!(store.count_entries().await.unwrap(), 2);
        assert_eq!(store.count_entries_for_day("2024-01-10").await.unwrap(), 1);
        assert_eq!(store.count_entries_for_day("2024-01-11").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_sweep_removes_expired_and_previous_day_rows() {
        let (store, _pool, _dir) = create_test_store().await;
        store
            .put_entry(entry("fresh", json!(1), Namespace::FundDetail, NOW, "2024-01-10"))
            .await
            .unwrap();
        store
            .put_entry(entry("expired", json!(2), Namespace::FundSuggest, NOW - 6 * HOUR, "2024-01-10"))
            .await
            .unwrap();
        store
            .put_entry(entry("yesterday", json!(3), Namespace::FundDetail, NOW - 13 * HOUR, "2024-01-09"))
            .await
            .unwrap();

        // `expired` sits exactly on its expiry instant.
        assert_eq!(store.sweep_expired(NOW, "2024-01-10").await.unwrap(), 2);
        assert_eq!(store.count_entries().await.unwrap(), 1);
        assert!(store.get_entry("fresh").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unreadable_row_is_dropped() {
        let (store, pool, _dir) = create_test_store().await;
        let mut conn = get_connection(&pool).unwrap();
        diesel::sql_query(
            "INSERT INTO api_cache (key, data, timestamp, expires_at, date_key) \
             VALUES ('fundDetail:bad', '{not json', 0, 9999999999999, '2024-01-10')",
        )
        .execute(&mut conn)
        .unwrap();

        assert_eq!(store.get_entry("fundDetail:bad").await.unwrap(), None);
        assert_eq!(store.count_entries().await.unwrap(), 0);
    }

    struct OpenedStore(Arc<SqliteCacheStore>);

    #[async_trait]
    impl DurableStoreProvider for OpenedStore {
        fn name(&self) -> &str {
            "sqlite"
        }

        async fn open(&self) -> Result<Arc<dyn DurableCacheStore>> {
            Ok(Arc::clone(&self.0) as Arc<dyn DurableCacheStore>)
        }
    }

    #[tokio::test]
    async fn test_read_timeout_applies_while_pool_is_exhausted() {
        let (store, pool, _dir) = create_test_store().await;
        let service = CacheService::new(
            CacheConfig {
                read_timeout: Some(Duration::from_millis(100)),
                ..CacheConfig::default()
            },
            Some(Arc::new(OpenedStore(Arc::new(store)))),
            Arc::new(MemoryKeyValueStore::new()),
        );
        assert_eq!(service.initialize().await, BackendKind::Durable);
        service
            .set("fundDetail:1", &"Kinea Zeus", Namespace::FundDetail)
            .await;

        // The writer owns the eighth connection.
        let held: Vec<_> = (0..7).map(|_| get_connection(&pool).unwrap()).collect();

        let started = Instant::now();
        assert_eq!(service.get::<String>("fundDetail:1").await, None);
        assert!(started.elapsed() < Duration::from_secs(5));

        drop(held);
        assert_eq!(
            service.get::<String>("fundDetail:1").await.as_deref(),
            Some("Kinea Zeus")
        );
    }

    #[tokio::test]
    async fn test_close_checkpoints_wal() {
        let (store, _pool, _dir) = create_test_store().await;
        store
            .put_entry(entry("a", json!(1), Namespace::FundDetail, NOW, "2024-01-10"))
            .await
            .unwrap();

        store.close().await.unwrap();
        assert!(store.get_entry("a").await.unwrap().is_some());
    }
}
