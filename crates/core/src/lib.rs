//! fin-data-lab core - the API response cache used by the fund dashboard.
//!
//! This crate is database-agnostic. It defines the cache service, its
//! namespaces and key scheme, and the storage traits implemented by the
//! `storage-sqlite` crate.

pub mod cache;
pub mod constants;
pub mod errors;
pub mod utils;

// Re-export error types
pub use errors::Error;
pub use errors::Result;
