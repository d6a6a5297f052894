//! Storage entry types.
//!
//! These model the persisted record shape: an opaque JSON value plus the
//! timestamps that drive lazy expiry and oldest-first eviction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single persisted entry in a store.
///
/// `expires_at = None` means the entry has no TTL and persists until it is
/// explicitly deleted or evicted under quota pressure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEntry {
    pub key: String,
    pub value: serde_json::Value,
    /// Write time, used for oldest-first eviction ordering.
    pub stored_at: DateTime<Utc>,
    /// Absolute expiry. A read at or after this instant behaves as a miss.
    pub expires_at: Option<DateTime<Utc>>,
}

impl StoredEntry {
    /// Whether this entry is expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(expires_at) => now >= expires_at,
            None => false,
        }
    }
}

/// A snapshot of a store's occupancy, reported by `storage_info()`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageInfo {
    /// Number of live entries (expired-but-unswept rows included).
    pub count: u64,
    /// Approximate bytes used: sum of key and value lengths.
    pub used_bytes: u64,
    /// Configured byte budget for this store.
    pub quota_bytes: u64,
    /// `stored_at` of the oldest surviving entry, `None` when empty.
    pub oldest_entry: Option<DateTime<Utc>>,
}

/// Identity and limits for one logical store.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Database file name (one SQLite file per store).
    pub store_name: String,
    /// Table within the store. Clearing one table never touches another.
    pub table_name: String,
    /// Requested schema version; opening at a higher version runs additive
    /// migrations, never destroys existing entries.
    pub schema_version: u32,
    /// Byte budget before quota-driven eviction kicks in.
    pub quota_bytes: u64,
    /// Fraction of oldest entries removed per eviction pass (0..=1).
    pub evict_fraction: f64,
}

impl StoreOptions {
    /// Options with the default quota and eviction fraction.
    pub fn new(
        store_name: impl Into<String>,
        table_name: impl Into<String>,
        schema_version: u32,
    ) -> Self {
        Self {
            store_name: store_name.into(),
            table_name: table_name.into(),
            schema_version,
            quota_bytes: crate::config::DEFAULT_QUOTA_BYTES,
            evict_fraction: crate::config::DEFAULT_EVICT_FRACTION,
        }
    }

    pub fn with_quota(mut self, quota_bytes: u64) -> Self {
        self.quota_bytes = quota_bytes;
        self
    }

    pub fn with_evict_fraction(mut self, fraction: f64) -> Self {
        self.evict_fraction = fraction;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn entry_without_ttl_never_expires() {
        let entry = StoredEntry {
            key: "k".to_string(),
            value: serde_json::json!(1),
            stored_at: Utc::now(),
            expires_at: None,
        };
        assert!(!entry.is_expired(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn entry_expires_at_exact_instant() {
        let now = Utc::now();
        let entry = StoredEntry {
            key: "k".to_string(),
            value: serde_json::json!(1),
            stored_at: now,
            expires_at: Some(now + Duration::milliseconds(100)),
        };
        assert!(!entry.is_expired(now + Duration::milliseconds(99)));
        assert!(entry.is_expired(now + Duration::milliseconds(100)));
        assert!(entry.is_expired(now + Duration::milliseconds(150)));
    }

    #[test]
    fn store_options_builder() {
        let opts = StoreOptions::new("reader", "reader_view_cache", 2)
            .with_quota(1024)
            .with_evict_fraction(0.25);
        assert_eq!(opts.store_name, "reader");
        assert_eq!(opts.table_name, "reader_view_cache");
        assert_eq!(opts.schema_version, 2);
        assert_eq!(opts.quota_bytes, 1024);
        assert_eq!(opts.evict_fraction, 0.25);
    }

    #[test]
    fn stored_entry_serializes_round_trip() {
        let entry = StoredEntry {
            key: "feeds".to_string(),
            value: serde_json::json!({"titles": ["A", "B"]}),
            stored_at: Utc::now(),
            expires_at: None,
        };
        let json = serde_json::to_string(&entry).unwrap();
        let back: StoredEntry = serde_json::from_str(&json).unwrap();
        assert_eq!(back.key, "feeds");
        assert_eq!(back.value, entry.value);
        assert!(back.expires_at.is_none());
    }
}
