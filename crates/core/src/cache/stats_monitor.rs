//! Periodic cache stats refresh for status indicators.

use log::{debug, info};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};

use super::cache_model::CacheStats;
use super::cache_service::CacheService;

/// Publishes fresh [`CacheStats`] every `every`, starting immediately.
///
/// The receiver holds `None` until the first refresh completes. The task stops
/// once every receiver has been dropped.
pub fn spawn_stats_refresher(
    service: Arc<CacheService>,
    every: Duration,
) -> (watch::Receiver<Option<CacheStats>>, JoinHandle<()>) {
    let (tx, rx) = watch::channel(None);

    let handle = tokio::spawn(async move {
        info!("Cache stats refresher started ({:?} interval)", every);
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let stats = service.get_stats().await;
            if tx.send(Some(stats)).is_err() {
                debug!("Cache stats receivers dropped, stopping refresher");
                break;
            }
        }
    });

    (rx, handle)
}
