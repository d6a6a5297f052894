//! Configuration for the persistence layer.
//!
//! Deserialized from `{data_dir}/config.toml` by the loader in
//! `feedstash-infra`. Every field has a default so a missing or partial file
//! still yields a working configuration.

use serde::{Deserialize, Serialize};

/// Default per-store byte budget (50 MB).
pub const DEFAULT_QUOTA_BYTES: u64 = 50 * 1024 * 1024;

/// Default fraction of oldest entries evicted per quota-pressure pass.
pub const DEFAULT_EVICT_FRACTION: f64 = 0.15;

/// Default write-through flush interval in milliseconds.
pub const DEFAULT_FLUSH_INTERVAL_MS: u64 = 1_000;

/// Default maximum age accepted during query-cache hydration (24 hours).
pub const DEFAULT_HYDRATE_MAX_AGE_SECS: i64 = 24 * 60 * 60;

/// Default logical staleness window for cached queries (5 minutes).
pub const DEFAULT_STALE_AFTER_SECS: i64 = 5 * 60;

/// Default refresh threshold for auth tokens (5 minutes before expiry).
pub const DEFAULT_REFRESH_THRESHOLD_SECS: i64 = 5 * 60;

/// Maximum accepted token lifetime (90 days); anything longer is rejected
/// as a validation error.
pub const MAX_TOKEN_LIFETIME_SECS: i64 = 90 * 24 * 60 * 60;

/// Tunable settings for stores, the query cache, and the token persister.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StashConfig {
    /// Byte budget per store before eviction kicks in.
    pub quota_bytes: u64,
    /// Fraction of oldest entries removed per eviction pass (0..=1).
    pub evict_fraction: f64,
    /// Throttle window for batched write-through persistence.
    pub flush_interval_ms: u64,
    /// Persisted query entries older than this are dropped at hydration.
    pub hydrate_max_age_secs: i64,
    /// Cached query results older than this are served but flagged stale.
    pub stale_after_secs: i64,
    /// Tokens expiring within this window should be refreshed.
    pub refresh_threshold_secs: i64,
    /// Whether the encryption wrapper is inserted for sensitive stores.
    pub encrypt_at_rest: bool,
}

impl Default for StashConfig {
    fn default() -> Self {
        Self {
            quota_bytes: DEFAULT_QUOTA_BYTES,
            evict_fraction: DEFAULT_EVICT_FRACTION,
            flush_interval_ms: DEFAULT_FLUSH_INTERVAL_MS,
            hydrate_max_age_secs: DEFAULT_HYDRATE_MAX_AGE_SECS,
            stale_after_secs: DEFAULT_STALE_AFTER_SECS,
            refresh_threshold_secs: DEFAULT_REFRESH_THRESHOLD_SECS,
            encrypt_at_rest: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = StashConfig::default();
        assert_eq!(config.quota_bytes, 52_428_800);
        assert!(config.evict_fraction > 0.0 && config.evict_fraction <= 1.0);
        assert!(config.encrypt_at_rest);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let config: StashConfig = toml::from_str("quota_bytes = 1024\n").unwrap();
        assert_eq!(config.quota_bytes, 1024);
        assert_eq!(config.flush_interval_ms, DEFAULT_FLUSH_INTERVAL_MS);
        assert_eq!(config.stale_after_secs, DEFAULT_STALE_AFTER_SECS);
    }

    #[test]
    fn full_toml_round_trip() {
        let config = StashConfig {
            quota_bytes: 4096,
            evict_fraction: 0.2,
            flush_interval_ms: 250,
            hydrate_max_age_secs: 600,
            stale_after_secs: 60,
            refresh_threshold_secs: 120,
            encrypt_at_rest: false,
        };
        let rendered = toml::to_string(&config).unwrap();
        let back: StashConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(back.quota_bytes, 4096);
        assert_eq!(back.flush_interval_ms, 250);
        assert!(!back.encrypt_at_rest);
    }
}
