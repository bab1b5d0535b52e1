//! Database model for cached API responses.

use diesel::prelude::*;
use fin_data_lab_core::cache::CacheEntry;
use fin_data_lab_core::errors::{CacheError, Result};

/// One row of `api_cache`. The payload is stored as JSON text.
#[derive(
    Queryable, Identifiable, Insertable, AsChangeset, Selectable, PartialEq, Debug, Clone,
)]
#[diesel(table_name = crate::schema::api_cache)]
#[diesel(primary_key(key))]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct ApiCacheEntryDB {
    pub key: String,
    pub data: String,
    pub timestamp: i64,
    pub expires_at: i64,
    pub date_key: String,
}

impl TryFrom<&CacheEntry> for ApiCacheEntryDB {
    type Error = fin_data_lab_core::Error;

    fn try_from(entry: &CacheEntry) -> Result<Self> {
        Ok(Self {
            key: entry.key.clone(),
            data: serde_json::to_string(&entry.data)?,
            timestamp: entry.timestamp,
            expires_at: entry.expires_at,
            date_key: entry.date_key.clone(),
        })
    }
}

impl TryFrom<ApiCacheEntryDB> for CacheEntry {
    type Error = fin_data_lab_core::Error;

    fn try_from(db: ApiCacheEntryDB) -> Result<Self> {
        let data = serde_json::from_str(&db.data).map_err(|e| CacheError::MalformedEntry {
            key: db.key.clone(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            key: db.key,
            data,
            timestamp: db.timestamp,
            expires_at: db.expires_at,
            date_key: db.date_key,
        })
    }
}
