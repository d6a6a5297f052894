//! Entry store trait definition.

use std::collections::HashMap;
use std::time::Duration;

use feedstash_types::entry::StorageInfo;
use feedstash_types::error::StoreError;

/// Trait for TTL-aware key-value stores.
///
/// Uses RPITIT (native async fn in traits, Rust 2024 edition); implementations
/// live in `feedstash-infra`. Absence is `Ok(None)` or omission from batch
/// results, never an error. Every operation is atomic from the caller's
/// perspective: a `set` either lands the whole entry or leaves the prior
/// value unchanged.
pub trait EntryStore: Send + Sync {
    /// Get a value by key. Returns `None` if the key is absent or expired;
    /// an expired entry is deleted as a side effect before returning.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<serde_json::Value>, StoreError>> + Send;

    /// Upsert a value. `stored_at` is set to now; `expires_at` to
    /// `now + ttl` when a TTL is given. On quota exhaustion the store evicts
    /// its configured fraction of oldest entries and retries exactly once.
    fn set(
        &self,
        key: &str,
        value: &serde_json::Value,
        ttl: Option<Duration>,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Delete a key. No-op if the key does not exist.
    fn delete(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Remove every entry in this store.
    fn clear(&self) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// List the keys of all unexpired entries.
    fn keys(&self) -> impl std::future::Future<Output = Result<Vec<String>, StoreError>> + Send;

    /// Batch get. Absent and expired keys are omitted from the result.
    /// Empty input yields an empty map without touching storage.
    fn get_many(
        &self,
        keys: &[String],
    ) -> impl std::future::Future<Output = Result<HashMap<String, serde_json::Value>, StoreError>> + Send;

    /// Batch set with independent per-key error isolation: a failing key
    /// surfaces an error, but earlier successful writes stay committed.
    fn set_many(
        &self,
        entries: &HashMap<String, serde_json::Value>,
        ttl: Option<Duration>,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Occupancy snapshot: live entry count, approximate bytes used,
    /// configured quota, and the oldest surviving `stored_at`.
    fn storage_info(
        &self,
    ) -> impl std::future::Future<Output = Result<StorageInfo, StoreError>> + Send;

    /// Sweep-delete every expired entry, returning how many were removed.
    fn cleanup(&self) -> impl std::future::Future<Output = Result<u64, StoreError>> + Send;

    /// Delete the oldest `ceil(count * fraction)` entries by `stored_at`.
    /// The fraction is clamped to `0..=1`. Returns how many were removed.
    fn remove_oldest_entries(
        &self,
        fraction: f64,
    ) -> impl std::future::Future<Output = Result<u64, StoreError>> + Send;
}
