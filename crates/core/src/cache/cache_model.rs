//! Domain models for cached API responses.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::constants::HOUR_MS;
use crate::errors::Error;

/// Logical kind of cached data. Each kind carries its own TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Namespace {
    FundDetail,
    FundHistory,
    FundMetrics,
    FundComposition,
    FundPortfolio,
    FundStructure,
    FundTopAssets,
    FundSearch,
    FundSuggest,
    AllocatorFilters,
    AllocatorFlow,
    AllocatorPerf,
    AllocatorAlloc,
    #[default]
    Default,
}

impl Namespace {
    pub const ALL: [Namespace; 14] = [
        Namespace::FundDetail,
        Namespace::FundHistory,
        Namespace::FundMetrics,
        Namespace::FundComposition,
        Namespace::FundPortfolio,
        Namespace::FundStructure,
        Namespace::FundTopAssets,
        Namespace::FundSearch,
        Namespace::FundSuggest,
        Namespace::AllocatorFilters,
        Namespace::AllocatorFlow,
        Namespace::AllocatorPerf,
        Namespace::AllocatorAlloc,
        Namespace::Default,
    ];

    /// Name used as the first segment of generated keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Namespace::FundDetail => "fundDetail",
            Namespace::FundHistory => "fundHistory",
            Namespace::FundMetrics => "fundMetrics",
            Namespace::FundComposition => "fundComposition",
            Namespace::FundPortfolio => "fundPortfolio",
            Namespace::FundStructure => "fundStructure",
            Namespace::FundTopAssets => "fundTopAssets",
            Namespace::FundSearch => "fundSearch",
            Namespace::FundSuggest => "fundSuggest",
            Namespace::AllocatorFilters => "allocatorFilters",
            Namespace::AllocatorFlow => "allocatorFlow",
            Namespace::AllocatorPerf => "allocatorPerf",
            Namespace::AllocatorAlloc => "allocatorAlloc",
            Namespace::Default => "default",
        }
    }

    /// Time-to-live in milliseconds.
    pub fn duration_ms(&self) -> i64 {
        match self {
            Namespace::FundSuggest => 6 * HOUR_MS,
            Namespace::FundSearch
            | Namespace::AllocatorFlow
            | Namespace::AllocatorPerf
            | Namespace::AllocatorAlloc => 12 * HOUR_MS,
            Namespace::FundDetail
            | Namespace::FundHistory
            | Namespace::FundMetrics
            | Namespace::FundComposition
            | Namespace::FundPortfolio
            | Namespace::FundStructure
            | Namespace::FundTopAssets
            | Namespace::AllocatorFilters
            | Namespace::Default => 24 * HOUR_MS,
        }
    }

    pub fn duration(&self) -> chrono::Duration {
        chrono::Duration::milliseconds(self.duration_ms())
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Namespace {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Namespace::ALL
            .iter()
            .copied()
            .find(|ns| ns.as_str() == s)
            .ok_or_else(|| Error::InvalidConfigValue(format!("unknown cache namespace '{}'", s)))
    }
}

/// A stored cache entry.
///
/// `expires_at` is fixed when the entry is written; reads never extend it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry<T = serde_json::Value> {
    pub key: String,
    pub data: T,
    /// Write instant, epoch milliseconds.
    pub timestamp: i64,
    /// Absolute expiry, epoch milliseconds.
    pub expires_at: i64,
    /// Local calendar day of the write, `YYYY-MM-DD`.
    pub date_key: String,
}

impl<T> CacheEntry<T> {
    pub fn new(
        key: impl Into<String>,
        data: T,
        namespace: Namespace,
        now_ms: i64,
        date_key: impl Into<String>,
    ) -> Self {
        Self {
            key: key.into(),
            data,
            timestamp: now_ms,
            expires_at: now_ms + namespace.duration_ms(),
            date_key: date_key.into(),
        }
    }

    /// An entry is valid before its expiry and only on the day it was written.
    pub fn is_valid(&self, now_ms: i64, today_key: &str) -> bool {
        now_ms < self.expires_at && self.date_key == today_key
    }
}

/// Cache statistics shown by the status indicator.
///
/// `total_entries` is a raw row count and includes entries that have expired
/// but have not been swept or read yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheStats {
    pub total_entries: usize,
    pub today_entries: usize,
    pub size: String,
}

impl CacheStats {
    pub(crate) fn unknown() -> Self {
        Self {
            total_entries: 0,
            today_entries: 0,
            size: crate::constants::SIZE_UNKNOWN.to_string(),
        }
    }
}

/// Which storage backend the service selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Durable,
    Fallback,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendKind::Durable => f.write_str("durable"),
            BackendKind::Fallback => f.write_str("fallback"),
        }
    }
}
