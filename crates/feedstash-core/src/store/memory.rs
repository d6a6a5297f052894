//! In-memory entry store.
//!
//! The fallback when durable storage is unavailable (`StoreError::Unavailable`
//! at open time): the application keeps working with memory-only caching and
//! every page load degrades to a network fetch. Implements the full
//! `EntryStore` contract including TTL expiry and quota eviction, so it is
//! also the reference implementation the higher layers are tested against.

use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;

use feedstash_types::config::{DEFAULT_EVICT_FRACTION, DEFAULT_QUOTA_BYTES};
use feedstash_types::entry::{StorageInfo, StoredEntry};
use feedstash_types::error::StoreError;

use super::entry_store::EntryStore;

/// TTL-aware in-memory key-value store.
pub struct MemoryEntryStore {
    entries: DashMap<String, StoredEntry>,
    quota_bytes: u64,
    evict_fraction: f64,
}

impl MemoryEntryStore {
    pub fn new() -> Self {
        Self::with_quota(DEFAULT_QUOTA_BYTES, DEFAULT_EVICT_FRACTION)
    }

    /// Store with an explicit byte budget and eviction fraction.
    pub fn with_quota(quota_bytes: u64, evict_fraction: f64) -> Self {
        Self {
            entries: DashMap::new(),
            quota_bytes,
            evict_fraction,
        }
    }

    fn entry_size(key: &str, value: &serde_json::Value) -> u64 {
        let value_len = serde_json::to_string(value).map_or(0, |s| s.len());
        (key.len() + value_len) as u64
    }

    fn used_bytes(&self) -> u64 {
        self.entries
            .iter()
            .map(|e| Self::entry_size(e.key(), &e.value))
            .sum()
    }

    /// Synchronous eviction shared by `set` and `remove_oldest_entries`.
    fn evict_oldest(&self, fraction: f64) -> u64 {
        let fraction = fraction.clamp(0.0, 1.0);
        let count = self.entries.len();
        let doomed = (count as f64 * fraction).ceil() as usize;
        if doomed == 0 {
            return 0;
        }

        let mut by_age: Vec<(String, chrono::DateTime<Utc>)> = self
            .entries
            .iter()
            .map(|e| (e.key().clone(), e.stored_at))
            .collect();
        by_age.sort_by_key(|(_, stored_at)| *stored_at);

        let mut removed = 0;
        for (key, _) in by_age.into_iter().take(doomed) {
            if self.entries.remove(&key).is_some() {
                removed += 1;
            }
        }
        removed
    }

    fn write_entry(&self, key: &str, value: &serde_json::Value, ttl: Option<Duration>) {
        let now = Utc::now();
        let expires_at = ttl.and_then(|t| {
            chrono::Duration::from_std(t)
                .ok()
                .map(|delta| now + delta)
        });
        self.entries.insert(
            key.to_string(),
            StoredEntry {
                key: key.to_string(),
                value: value.clone(),
                stored_at: now,
                expires_at,
            },
        );
    }

    /// Whether a write of `key`/`value` would fit in the quota, accounting
    /// for any existing entry being overwritten.
    fn fits(&self, key: &str, value: &serde_json::Value) -> (bool, u64) {
        let new_size = Self::entry_size(key, value);
        let old_size = self
            .entries
            .get(key)
            .map(|e| Self::entry_size(e.key(), &e.value))
            .unwrap_or(0);
        let needed = self.used_bytes() - old_size + new_size;
        (needed <= self.quota_bytes, needed)
    }
}

impl Default for MemoryEntryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryStore for MemoryEntryStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let expired = match self.entries.get(key) {
            Some(entry) => {
                if entry.is_expired(Utc::now()) {
                    true
                } else {
                    return Ok(Some(entry.value.clone()));
                }
            }
            None => return Ok(None),
        };

        // Lazy expiry: an expired read behaves as a miss and removes the row.
        if expired {
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(
        &self,
        key: &str,
        value: &serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let (fits, needed) = self.fits(key, value);
        if !fits {
            tracing::warn!(
                needed,
                quota = self.quota_bytes,
                "quota pressure, evicting oldest entries"
            );
            self.evict_oldest(self.evict_fraction);
            let (fits_after, needed_after) = self.fits(key, value);
            if !fits_after {
                return Err(StoreError::QuotaExceeded {
                    needed: needed_after,
                    quota: self.quota_bytes,
                });
            }
        }
        self.write_entry(key, value, ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.entries.clear();
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let now = Utc::now();
        let mut keys: Vec<String> = self
            .entries
            .iter()
            .filter(|e| !e.is_expired(now))
            .map(|e| e.key().clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn get_many(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, serde_json::Value>, StoreError> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let mut result = HashMap::new();
        for key in keys {
            if let Some(value) = self.get(key).await? {
                result.insert(key.clone(), value);
            }
        }
        Ok(result)
    }

    async fn set_many(
        &self,
        entries: &HashMap<String, serde_json::Value>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.set(key, value, ttl).await?;
        }
        Ok(())
    }

    async fn storage_info(&self) -> Result<StorageInfo, StoreError> {
        let oldest_entry = self.entries.iter().map(|e| e.stored_at).min();
        Ok(StorageInfo {
            count: self.entries.len() as u64,
            used_bytes: self.used_bytes(),
            quota_bytes: self.quota_bytes,
            oldest_entry,
        })
    }

    async fn cleanup(&self) -> Result<u64, StoreError> {
        let now = Utc::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        Ok((before - self.entries.len()) as u64)
    }

    async fn remove_oldest_entries(&self, fraction: f64) -> Result<u64, StoreError> {
        Ok(self.evict_oldest(fraction))
    }
}
