//! Cache-first fetching with explicit hit reporting and single-flight misses.
//!
//! Call sites compute a key, ask the cache, and on a miss run the real fetch
//! and populate the cache without waiting for the write. Concurrent misses for
//! the same key share one in-flight fetch.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use futures::future::{BoxFuture, FutureExt, Shared};
use log::debug;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;

use super::cache_model::Namespace;
use super::cache_service::CacheService;
use crate::errors::{Error, Result};

type SharedFetch = Shared<BoxFuture<'static, std::result::Result<Arc<Value>, String>>>;

/// Fetched data together with where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Fetched<T> {
    pub data: T,
    pub from_cache: bool,
}

/// Clears the in-flight slot once its fetch has finished, or once the last
/// waiter has gone away without finishing it.
///
/// `handle` is never polled, so it keeps identifying the map entry after
/// `waiter` has driven the fetch to completion.
struct InFlightGuard<'a> {
    in_flight: &'a DashMap<String, SharedFetch>,
    key: String,
    handle: SharedFetch,
    waiter: SharedFetch,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let finished = self.handle.peek().is_some();
        // The map entry and `handle` count once each, `waiter` until it completes.
        let own = if self.waiter.strong_count().is_some() { 3 } else { 2 };
        let others_waiting = self
            .handle
            .strong_count()
            .is_some_and(|count| count > own);

        if finished || !others_waiting {
            self.in_flight
                .remove_if(&self.key, |_, current| current.ptr_eq(&self.handle));
        }
    }
}

pub struct CachedFetcher {
    cache: Arc<CacheService>,
    in_flight: DashMap<String, SharedFetch>,
}

impl CachedFetcher {
    pub fn new(cache: Arc<CacheService>) -> Self {
        Self {
            cache,
            in_flight: DashMap::new(),
        }
    }

    pub fn cache(&self) -> &Arc<CacheService> {
        &self.cache
    }

    /// Keys with a fetch currently in flight.
    pub fn pending_requests(&self) -> Vec<String> {
        self.in_flight.iter().map(|e| e.key().clone()).collect()
    }

    /// Returns the cached value for `key`, or runs `fetch_fn` and caches its
    /// result under `namespace`.
    ///
    /// `fetch_fn` is only invoked when this call leads a new fetch; callers
    /// that arrive while a fetch for the same key is running wait for it
    /// instead. Failed fetches are not cached.
    pub async fn fetch<T, F, Fut>(
        &self,
        key: &str,
        namespace: Namespace,
        fetch_fn: F,
    ) -> Result<Fetched<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = anyhow::Result<T>> + Send + 'static,
    {
        if let Some(data) = self.cache.get::<T>(key).await {
            return Ok(Fetched {
                data,
                from_cache: true,
            });
        }

        let (shared, leader) = match self.in_flight.entry(key.to_string()) {
            Entry::Occupied(existing) => {
                debug!("Joining in-flight fetch for {}", key);
                (existing.get().clone(), false)
            }
            Entry::Vacant(slot) => {
                let request = fetch_fn();
                let shared = async move {
                    let data = request.await.map_err(|e| format!("{:#}", e))?;
                    serde_json::to_value(&data)
                        .map(Arc::new)
                        .map_err(|e| e.to_string())
                }
                .boxed()
                .shared();
                slot.insert(shared.clone());
                (shared, true)
            }
        };

        let mut guard = InFlightGuard {
            in_flight: &self.in_flight,
            key: key.to_string(),
            handle: shared.clone(),
            waiter: shared,
        };
        let outcome = (&mut guard.waiter).await;
        drop(guard);

        let value = outcome.map_err(Error::Fetch)?;
        if leader {
            self.cache.set_detached(key, value.as_ref(), namespace);
        }

        let data = T::deserialize(value.as_ref())?;
        Ok(Fetched {
            data,
            from_cache: false,
        })
    }
}
