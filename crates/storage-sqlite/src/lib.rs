//! SQLite storage for the fin-data-lab response cache.
//!
//! This crate is the only place where Diesel is used. It implements the
//! durable store traits defined in `fin-data-lab-core`:
//! - connection pooling and WAL setup
//! - embedded Diesel migrations for the `api_cache` table
//! - a single-writer actor for serialized writes
//! - [`SqliteCacheStore`] and its [`SqliteStoreProvider`]

pub mod cache;
pub mod db;
pub mod errors;
pub mod schema;

pub use cache::{SqliteCacheStore, SqliteStoreProvider};
pub use db::{
    create_pool, get_connection, get_db_path, init, run_migrations, spawn_writer, DbConnection,
    DbPool, WriteHandle,
};
pub use errors::{IntoCore, StorageError};

pub use fin_data_lab_core::errors::{DatabaseError, Error, Result};
