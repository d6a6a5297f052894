//! The query cache: in-memory results over durable write-through storage.
//!
//! Reads hit memory first, falling back to the entry store for entries that
//! survived a restart. Any store failure along the way degrades to a cache
//! miss -- the caller sees a normal (if slower) fetch, never a crash.
//! Writes land in memory immediately and reach durable storage in batches
//! on a throttle interval.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use feedstash_types::config::StashConfig;
use feedstash_types::error::StoreError;

use crate::store::BoxEntryStore;

use super::events::{CacheEvent, CacheEventBus};
use super::filter::PersistFilter;

/// Storage-key prefix for persisted query records, keeping them apart from
/// anything else sharing the store's table.
const QUERY_KEY_PREFIX: &str = "query:";

/// Error type produced by fetchers handed to [`QueryCache::get_or_fetch`].
pub type FetchError = Box<dyn std::error::Error + Send + Sync>;

/// Tunables for the query cache.
#[derive(Debug, Clone)]
pub struct QueryCacheConfig {
    /// Persisted entries older than this are discarded during hydration.
    pub hydrate_max_age: chrono::Duration,
    /// Entries older than this are served but flagged stale, triggering a
    /// background refetch. Independent of the physical storage TTL.
    pub stale_after: chrono::Duration,
    /// Throttle window for batched write-through flushes.
    pub flush_interval: std::time::Duration,
}

impl Default for QueryCacheConfig {
    fn default() -> Self {
        Self::from_stash(&StashConfig::default())
    }
}

impl QueryCacheConfig {
    pub fn from_stash(config: &StashConfig) -> Self {
        Self {
            hydrate_max_age: chrono::Duration::seconds(config.hydrate_max_age_secs),
            stale_after: chrono::Duration::seconds(config.stale_after_secs),
            flush_interval: std::time::Duration::from_millis(config.flush_interval_ms),
        }
    }
}

/// The unit kept in memory and persisted to the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct QueryRecord {
    value: serde_json::Value,
    updated_at: DateTime<Utc>,
}

/// A cache read: the value plus its staleness verdict.
#[derive(Debug, Clone)]
pub struct QueryLookup {
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
    /// Logically stale per `stale_after`; the value is still served, but a
    /// background refresh is warranted (stale-while-revalidate).
    pub is_stale: bool,
}

/// In-memory query cache persisted through an [`BoxEntryStore`].
///
/// Construct with [`QueryCache::new`], wrap in `Arc`, and call
/// [`QueryCache::start`] to run the background flusher. `shutdown` flushes
/// pending writes and stops the task. Explicit lifecycle, no module-level
/// singleton: tests create isolated instances per case.
pub struct QueryCache {
    entries: DashMap<String, QueryRecord>,
    dirty: DashMap<String, ()>,
    store: BoxEntryStore,
    filter: PersistFilter,
    config: QueryCacheConfig,
    events: CacheEventBus,
    cancel: CancellationToken,
    flusher: Mutex<Option<JoinHandle<()>>>,
}

impl QueryCache {
    pub fn new(store: BoxEntryStore, filter: PersistFilter, config: QueryCacheConfig) -> Self {
        Self {
            entries: DashMap::new(),
            dirty: DashMap::new(),
            store,
            filter,
            config,
            events: CacheEventBus::new(256),
            cancel: CancellationToken::new(),
            flusher: Mutex::new(None),
        }
    }

    /// Subscribe to cache change events.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<CacheEvent> {
        self.events.subscribe()
    }

    fn storage_key(key: &str) -> String {
        format!("{QUERY_KEY_PREFIX}{key}")
    }

    fn is_stale(&self, updated_at: DateTime<Utc>) -> bool {
        Utc::now() - updated_at > self.config.stale_after
    }

    /// Seed the in-memory cache from persisted entries.
    ///
    /// Entries whose `updated_at` is older than `hydrate_max_age` are
    /// discarded (and deleted from the store) regardless of their physical
    /// TTL. Store failures are swallowed: hydration is best-effort and the
    /// cache stays usable memory-only. Returns how many entries were seeded.
    pub async fn hydrate(&self) -> usize {
        let keys = match self.store.keys().await {
            Ok(keys) => keys,
            Err(err) => {
                tracing::warn!("hydration skipped, store unavailable: {err}");
                return 0;
            }
        };

        let query_keys: Vec<String> = keys
            .into_iter()
            .filter(|k| k.starts_with(QUERY_KEY_PREFIX))
            .collect();

        let persisted = match self.store.get_many(&query_keys).await {
            Ok(persisted) => persisted,
            Err(err) => {
                tracing::warn!("hydration skipped, batch read failed: {err}");
                return 0;
            }
        };

        let now = Utc::now();
        let mut restored = 0;
        for (storage_key, raw) in persisted {
            let record: QueryRecord = match serde_json::from_value(raw) {
                Ok(record) => record,
                Err(err) => {
                    tracing::debug!("dropping unparseable persisted query: {err}");
                    let _ = self.store.delete(&storage_key).await;
                    continue;
                }
            };

            let key = storage_key[QUERY_KEY_PREFIX.len()..].to_string();
            if now - record.updated_at > self.config.hydrate_max_age {
                tracing::debug!(key, "dropping over-age persisted query at hydration");
                let _ = self.store.delete(&storage_key).await;
                continue;
            }

            self.entries.insert(key, record);
            restored += 1;
        }

        self.events.publish(CacheEvent::Hydrated { restored });
        restored
    }

    /// Write a query result. Last-write-wins per key. The write lands in
    /// memory immediately; durable persistence happens at the next flush if
    /// the persist filter allows this key.
    pub fn put(&self, key: &str, value: serde_json::Value) {
        self.entries.insert(
            key.to_string(),
            QueryRecord {
                value,
                updated_at: Utc::now(),
            },
        );
        if self.filter.should_persist(key) {
            self.dirty.insert(key.to_string(), ());
        }
        self.events.publish(CacheEvent::Updated {
            key: key.to_string(),
        });
    }

    /// Memory-only read, no storage fallback.
    pub fn peek(&self, key: &str) -> Option<QueryLookup> {
        self.entries.get(key).map(|record| QueryLookup {
            value: record.value.clone(),
            updated_at: record.updated_at,
            is_stale: self.is_stale(record.updated_at),
        })
    }

    /// Read a cached query, falling back to the store for entries persisted
    /// by a previous session. A store error is treated as a miss.
    pub async fn get(&self, key: &str) -> Option<QueryLookup> {
        if let Some(found) = self.peek(key) {
            return Some(found);
        }

        let raw = match self.store.get(&Self::storage_key(key)).await {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                tracing::debug!(key, "store read failed, treating as miss: {err}");
                return None;
            }
        };

        let record: QueryRecord = match serde_json::from_value(raw) {
            Ok(record) => record,
            Err(err) => {
                tracing::debug!(key, "unparseable persisted query, treating as miss: {err}");
                return None;
            }
        };

        self.entries.insert(key.to_string(), record.clone());
        Some(QueryLookup {
            is_stale: self.is_stale(record.updated_at),
            value: record.value,
            updated_at: record.updated_at,
        })
    }

    /// Stale-while-revalidate read.
    ///
    /// - Fresh hit: returns the cached value.
    /// - Stale hit: returns the cached value immediately and spawns a
    ///   background refetch that updates the cache when it completes.
    /// - Miss: awaits the fetcher, caches, and returns its result.
    pub async fn get_or_fetch<F, Fut>(
        self: &Arc<Self>,
        key: &str,
        fetch: F,
    ) -> Result<serde_json::Value, FetchError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<serde_json::Value, FetchError>> + Send + 'static,
    {
        if let Some(found) = self.get(key).await {
            if found.is_stale {
                let cache = Arc::clone(self);
                let key = key.to_string();
                tokio::spawn(async move {
                    match fetch().await {
                        Ok(value) => cache.put(&key, value),
                        Err(err) => {
                            tracing::debug!(key, "background revalidation failed: {err}");
                        }
                    }
                });
            }
            return Ok(found.value);
        }

        let value = fetch().await?;
        self.put(key, value.clone());
        Ok(value)
    }

    /// Remove a query from memory and durable storage.
    pub async fn remove(&self, key: &str) {
        self.entries.remove(key);
        self.dirty.remove(key);
        if let Err(err) = self.store.delete(&Self::storage_key(key)).await {
            tracing::debug!(key, "store delete failed: {err}");
        }
        self.events.publish(CacheEvent::Removed {
            key: key.to_string(),
        });
    }

    /// Flush dirty entries to the store in one batch.
    ///
    /// On failure the keys are re-marked dirty for the next interval.
    pub async fn flush_dirty(&self) -> Result<usize, StoreError> {
        let keys: Vec<String> = self.dirty.iter().map(|e| e.key().clone()).collect();
        if keys.is_empty() {
            return Ok(0);
        }
        for key in &keys {
            self.dirty.remove(key);
        }

        let mut batch: HashMap<String, serde_json::Value> = HashMap::new();
        for key in &keys {
            if let Some(record) = self.entries.get(key) {
                match serde_json::to_value(record.value()) {
                    Ok(raw) => {
                        batch.insert(Self::storage_key(key), raw);
                    }
                    Err(err) => {
                        tracing::debug!(key, "skipping unserializable query record: {err}");
                    }
                }
            }
        }

        let ttl = self.config.hydrate_max_age.to_std().ok();
        if let Err(err) = self.store.set_many(&batch, ttl).await {
            for key in keys {
                self.dirty.insert(key, ());
            }
            return Err(err);
        }

        let written = batch.len();
        self.events.publish(CacheEvent::Flushed { written });
        Ok(written)
    }

    /// Spawn the background flusher. Idempotent: a second call replaces a
    /// finished task but never runs two flushers at once.
    pub fn start(self: &Arc<Self>) {
        let cache = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(cache.config.flush_interval);
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cache.cancel.cancelled() => break,
                    _ = interval.tick() => {
                        if let Err(err) = cache.flush_dirty().await {
                            tracing::warn!("write-through flush failed: {err}");
                        }
                    }
                }
            }
        });

        let mut slot = self.flusher.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(old) = slot.replace(handle) {
            old.abort();
        }
    }

    /// Stop the flusher and write out anything still pending.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let handle = self
            .flusher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(handle) = handle {
            let _ = handle.await;
        }
        if let Err(err) = self.flush_dirty().await {
            tracing::warn!("final flush failed: {err}");
        }
    }
}
