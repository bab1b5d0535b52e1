//! Durable cache storage.

pub mod model;
pub mod provider;
pub mod repository;

pub use model::ApiCacheEntryDB;
pub use provider::SqliteStoreProvider;
pub use repository::SqliteCacheStore;
