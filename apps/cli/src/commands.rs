use clap::{Parser, Subcommand};
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use fin_data_lab_core::cache::{generate_key, spawn_stats_refresher, CacheService, Namespace};
use fin_data_lab_core::constants::DEFAULT_STATS_REFRESH_INTERVAL;

#[derive(Parser)]
#[command(name = "fin-data-lab-cache")]
#[command(about = "Inspect and maintain the fin-data-lab response cache", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Print entry counts and storage size as JSON
    Stats {
        /// Keep printing fresh stats every N seconds (default 30) until interrupted
        #[arg(long, value_name = "SECONDS", num_args = 0..=1, default_missing_value = "0")]
        watch: Option<u64>,
    },
    /// Print the cached value for a key, or `null` on a miss
    Get { key: String },
    /// Remove one entry
    Delete { key: String },
    /// Remove every cache entry
    Clear,
    /// Print the cache key for a namespace and parameters
    Key {
        namespace: Namespace,
        params: Vec<String>,
    },
    /// Remove expired and previous-day entries now
    Sweep,
}

pub async fn run<W: Write>(
    command: Command,
    service: &Arc<CacheService>,
    out: &mut W,
) -> anyhow::Result<()> {
    match command {
        Command::Stats { watch: None } => {
            let stats = service.get_stats().await;
            writeln!(out, "{}", serde_json::to_string_pretty(&stats)?)?;
        }
        Command::Stats { watch: Some(secs) } => {
            let every = match secs {
                0 => DEFAULT_STATS_REFRESH_INTERVAL,
                secs => Duration::from_secs(secs),
            };
            let (mut rx, handle) = spawn_stats_refresher(Arc::clone(service), every);
            loop {
                tokio::select! {
                    changed = rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        let snapshot = rx.borrow_and_update().clone();
                        if let Some(stats) = snapshot {
                            writeln!(out, "{}", serde_json::to_string(&stats)?)?;
                            out.flush()?;
                        }
                    }
                    _ = tokio::signal::ctrl_c() => break,
                }
            }
            handle.abort();
        }
        Command::Get { key } => {
            let value = service.get::<serde_json::Value>(&key).await;
            writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
        }
        Command::Delete { key } => {
            service.delete(&key).await;
            writeln!(out, "Deleted {}", key)?;
        }
        Command::Clear => {
            service.clear().await;
            writeln!(out, "Cache cleared")?;
        }
        Command::Key { namespace, params } => {
            writeln!(out, "{}", generate_key(namespace, params))?;
        }
        Command::Sweep => {
            let removed = service.sweep_expired().await;
            writeln!(out, "Removed {} entries", removed)?;
        }
    }
    Ok(())
}
