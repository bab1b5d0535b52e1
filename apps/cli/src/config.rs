use anyhow::Context;
use std::path::PathBuf;
use std::time::Duration;

use fin_data_lab_core::cache::CacheConfig;
use fin_data_lab_core::constants::{DEFAULT_FALLBACK_CAPACITY_BYTES, DEFAULT_KEY_PREFIX};

pub struct Config {
    pub data_dir: PathBuf,
    pub durable_enabled: bool,
    pub key_prefix: String,
    pub fallback_capacity_bytes: usize,
    pub read_timeout: Option<Duration>,
    pub log_format: String,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let data_dir = var("FDL_DATA_DIR").unwrap_or_else(|| "./data".into());

        let durable_enabled = match var("FDL_CACHE_DURABLE") {
            Some(raw) => parse_bool(&raw).context("Invalid FDL_CACHE_DURABLE")?,
            None => true,
        };

        let key_prefix = var("FDL_CACHE_PREFIX").unwrap_or_else(|| DEFAULT_KEY_PREFIX.into());

        let fallback_capacity_bytes = match var("FDL_CACHE_FALLBACK_BYTES") {
            Some(raw) => raw
                .trim()
                .parse()
                .context("Invalid FDL_CACHE_FALLBACK_BYTES")?,
            None => DEFAULT_FALLBACK_CAPACITY_BYTES,
        };

        // 0 disables the timeout.
        let read_timeout = match var("FDL_CACHE_READ_TIMEOUT_MS") {
            Some(raw) => {
                let ms: u64 = raw
                    .trim()
                    .parse()
                    .context("Invalid FDL_CACHE_READ_TIMEOUT_MS")?;
                (ms > 0).then(|| Duration::from_millis(ms))
            }
            None => None,
        };

        let log_format = var("FDL_LOG_FORMAT").unwrap_or_else(|| "text".into());

        Ok(Self {
            data_dir: PathBuf::from(data_dir),
            durable_enabled,
            key_prefix,
            fallback_capacity_bytes,
            read_timeout,
            log_format,
        })
    }

    pub fn cache_config(&self) -> CacheConfig {
        CacheConfig {
            durable_enabled: self.durable_enabled,
            key_prefix: self.key_prefix.clone(),
            fallback_capacity_bytes: self.fallback_capacity_bytes,
            read_timeout: self.read_timeout,
        }
    }
}

fn parse_bool(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => anyhow::bail!("expected a boolean, got '{}'", other),
    }
}
