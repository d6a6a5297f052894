//! SQLite entry store implementation.
//!
//! Implements `EntryStore` from `feedstash-core` using sqlx with split
//! read/write pools. Values are stored as JSON text; timestamps as
//! fixed-width RFC 3339 UTC strings so lexicographic order matches
//! chronological order (eviction sorts on `stored_at` in SQL).
//!
//! Expiry is lazy on read plus an explicit `cleanup()` sweep. Quota is a
//! configured byte budget per store: a write that would exceed it triggers
//! one evict-oldest pass and one retry before `QuotaExceeded` surfaces.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::Row;

use feedstash_core::store::EntryStore;
use feedstash_types::entry::{StorageInfo, StoreOptions};
use feedstash_types::error::StoreError;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `EntryStore`.
pub struct SqliteEntryStore {
    pool: DatabasePool,
    table: String,
    quota_bytes: u64,
    evict_fraction: f64,
}

impl SqliteEntryStore {
    /// Open (or create) a store at `{data_dir}/{store_name}.db` and run
    /// schema migrations for its table.
    pub async fn open(data_dir: &Path, options: &StoreOptions) -> Result<Self, StoreError> {
        validate_identifier("store name", &options.store_name)?;
        validate_identifier("table name", &options.table_name)?;

        std::fs::create_dir_all(data_dir)
            .map_err(|e| StoreError::Unavailable(format!("cannot create data dir: {e}")))?;

        let db_path = data_dir.join(format!("{}.db", options.store_name));
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        let pool = DatabasePool::new(&url)
            .await
            .map_err(|e| StoreError::Unavailable(format!("cannot open database: {e}")))?;

        Self::with_pool(pool, options).await
    }

    /// Build a store over an existing pool (shared when several tables live
    /// in one store file). Runs migrations for this table.
    pub async fn with_pool(pool: DatabasePool, options: &StoreOptions) -> Result<Self, StoreError> {
        validate_identifier("table name", &options.table_name)?;
        migrate(&pool, &options.table_name, options.schema_version).await?;
        Ok(Self {
            pool,
            table: options.table_name.clone(),
            quota_bytes: options.quota_bytes,
            evict_fraction: options.evict_fraction,
        })
    }

    /// Capability probe: whether `data_dir` can host SQLite store files.
    pub fn is_supported(data_dir: &Path) -> bool {
        if std::fs::create_dir_all(data_dir).is_err() {
            return false;
        }
        let probe = data_dir.join(".feedstash-probe");
        match std::fs::write(&probe, b"probe") {
            Ok(()) => {
                let _ = std::fs::remove_file(&probe);
                true
            }
            Err(_) => false,
        }
    }

    /// Bytes the store would occupy after writing `value_str` at `key`,
    /// accounting for any existing row being overwritten.
    async fn prospective_usage(&self, key: &str, value_str: &str) -> Result<u64, StoreError> {
        let (used,): (i64,) = sqlx::query_as(&format!(
            "SELECT COALESCE(SUM(LENGTH(key) + LENGTH(value)), 0) FROM {}",
            self.table
        ))
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        let (old,): (i64,) = sqlx::query_as(&format!(
            "SELECT COALESCE(SUM(LENGTH(key) + LENGTH(value)), 0) FROM {} WHERE key = ?",
            self.table
        ))
        .bind(key)
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        let new_size = (key.len() + value_str.len()) as i64;
        Ok((used - old + new_size).max(0) as u64)
    }

    async fn upsert(
        &self,
        key: &str,
        value_str: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(), StoreError> {
        sqlx::query(&format!(
            "INSERT INTO {} (key, value, stored_at, expires_at)
             VALUES (?, ?, ?, ?)
             ON CONFLICT (key) DO UPDATE SET
                 value = excluded.value,
                 stored_at = excluded.stored_at,
                 expires_at = excluded.expires_at",
            self.table
        ))
        .bind(key)
        .bind(value_str)
        .bind(format_datetime(&Utc::now()))
        .bind(expires_at.as_ref().map(format_datetime))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(())
    }

    async fn delete_oldest(&self, fraction: f64) -> Result<u64, StoreError> {
        let fraction = fraction.clamp(0.0, 1.0);
        let (count,): (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM {}", self.table))
                .fetch_one(&self.pool.reader)
                .await
                .map_err(|e| StoreError::Query(e.to_string()))?;

        let doomed = (count as f64 * fraction).ceil() as i64;
        if doomed == 0 {
            return Ok(0);
        }

        let result = sqlx::query(&format!(
            "DELETE FROM {t} WHERE key IN
                 (SELECT key FROM {t} ORDER BY stored_at ASC LIMIT ?)",
            t = self.table
        ))
        .bind(doomed)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Table and store names are interpolated into SQL, so they must be plain
/// identifiers. Anything else is rejected before a connection is opened.
fn validate_identifier(what: &str, name: &str) -> Result<(), StoreError> {
    let mut chars = name.chars();
    let head_ok = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    let tail_ok = chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
    if head_ok && tail_ok {
        Ok(())
    } else {
        Err(StoreError::Unavailable(format!(
            "invalid {what}: {name:?}"
        )))
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| StoreError::Query(format!("invalid datetime: {e}")))
}

/// Fixed-width RFC 3339 with microseconds and a `Z` suffix, so string
/// comparison in SQL matches chronological order.
fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Additive schema migrations for one table, versioned per database via
/// `PRAGMA user_version`. Opening at a higher version runs the missing
/// steps; opening at a lower version than on disk leaves everything as-is.
/// No step ever drops data.
async fn migrate(pool: &DatabasePool, table: &str, requested: u32) -> Result<(), StoreError> {
    let (on_disk,): (i64,) = sqlx::query_as("PRAGMA user_version")
        .fetch_one(&pool.writer)
        .await
        .map_err(|e| StoreError::Unavailable(e.to_string()))?;

    // v1: base table. IF NOT EXISTS keeps this idempotent across tables
    // sharing a database file.
    sqlx::query(&format!(
        "CREATE TABLE IF NOT EXISTS {table} (
             key TEXT PRIMARY KEY,
             value TEXT NOT NULL,
             stored_at TEXT NOT NULL,
             expires_at TEXT
         )"
    ))
    .execute(&pool.writer)
    .await
    .map_err(|e| StoreError::Unavailable(e.to_string()))?;

    // v2: indexes for eviction ordering and expiry sweeps.
    if requested >= 2 {
        for (suffix, column) in [("stored_at", "stored_at"), ("expires_at", "expires_at")] {
            sqlx::query(&format!(
                "CREATE INDEX IF NOT EXISTS idx_{table}_{suffix} ON {table} ({column})"
            ))
            .execute(&pool.writer)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        }
    }

    if i64::from(requested) > on_disk {
        sqlx::query(&format!("PRAGMA user_version = {requested}"))
            .execute(&pool.writer)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// EntryStore implementation
// ---------------------------------------------------------------------------

impl EntryStore for SqliteEntryStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT value, expires_at FROM {} WHERE key = ?",
            self.table
        ))
        .bind(key)
        .fetch_optional(&self.pool.reader)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let expires_at: Option<String> = row
            .try_get("expires_at")
            .map_err(|e| StoreError::Query(e.to_string()))?;
        if let Some(expires_at) = expires_at {
            if Utc::now() >= parse_datetime(&expires_at)? {
                // Lazy expiry: remove the stale row before reporting a miss.
                self.delete(key).await?;
                return Ok(None);
            }
        }

        let value_str: String = row
            .try_get("value")
            .map_err(|e| StoreError::Query(e.to_string()))?;
        let value: serde_json::Value = serde_json::from_str(&value_str)
            .map_err(|e| StoreError::Serialization(format!("invalid JSON value: {e}")))?;
        Ok(Some(value))
    }

    async fn set(
        &self,
        key: &str,
        value: &serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let value_str = serde_json::to_string(value)
            .map_err(|e| StoreError::Serialization(format!("failed to serialize value: {e}")))?;

        let needed = self.prospective_usage(key, &value_str).await?;
        if needed > self.quota_bytes {
            tracing::warn!(
                needed,
                quota = self.quota_bytes,
                table = %self.table,
                "quota pressure, evicting oldest entries"
            );
            self.delete_oldest(self.evict_fraction).await?;

            let needed = self.prospective_usage(key, &value_str).await?;
            if needed > self.quota_bytes {
                return Err(StoreError::QuotaExceeded {
                    needed,
                    quota: self.quota_bytes,
                });
            }
        }

        let expires_at = ttl
            .and_then(|t| chrono::Duration::from_std(t).ok())
            .map(|delta| Utc::now() + delta);
        self.upsert(key, &value_str, expires_at).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        sqlx::query(&format!("DELETE FROM {} WHERE key = ?", self.table))
            .bind(key)
            .execute(&self.pool.writer)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), StoreError> {
        sqlx::query(&format!("DELETE FROM {}", self.table))
            .execute(&self.pool.writer)
            .await
            .map_err(|e| StoreError::Query(e.to_string()))?;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT key FROM {} WHERE expires_at IS NULL OR expires_at > ? ORDER BY key",
            self.table
        ))
        .bind(format_datetime(&Utc::now()))
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        let mut keys = Vec::with_capacity(rows.len());
        for row in &rows {
            let key: String = row
                .try_get("key")
                .map_err(|e| StoreError::Query(e.to_string()))?;
            keys.push(key);
        }
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
        // Per-key writes with independent error isolation: the first failure
        // propagates, earlier writes stay committed.
        for (key, value) in entries {
            self.set(key, value, ttl).await?;
        }
        Ok(())
    }

    async fn storage_info(&self) -> Result<StorageInfo, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT COUNT(*) AS count,
                    COALESCE(SUM(LENGTH(key) + LENGTH(value)), 0) AS used,
                    MIN(stored_at) AS oldest
             FROM {}",
            self.table
        ))
        .fetch_one(&self.pool.reader)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        let count: i64 = row
            .try_get("count")
            .map_err(|e| StoreError::Query(e.to_string()))?;
        let used: i64 = row
            .try_get("used")
            .map_err(|e| StoreError::Query(e.to_string()))?;
        let oldest: Option<String> = row
            .try_get("oldest")
            .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(StorageInfo {
            count: count.max(0) as u64,
            used_bytes: used.max(0) as u64,
            quota_bytes: self.quota_bytes,
            oldest_entry: oldest.as_deref().map(parse_datetime).transpose()?,
        })
    }

    async fn cleanup(&self) -> Result<u64, StoreError> {
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE expires_at IS NOT NULL AND expires_at <= ?",
            self.table
        ))
        .bind(format_datetime(&Utc::now()))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| StoreError::Query(e.to_string()))?;

        Ok(result.rows_affected())
    }

    async fn remove_oldest_entries(&self, fraction: f64) -> Result<u64, StoreError> {
        self.delete_oldest(fraction).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn open_store(quota: u64) -> (tempfile::TempDir, SqliteEntryStore) {
        let dir = tempfile::tempdir().unwrap();
        let options = StoreOptions::new("reader", "reader_view_cache", 2)
            .with_quota(quota)
            .with_evict_fraction(0.5);
        let store = SqliteEntryStore::open(dir.path(), &options).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn set_get_round_trip() {
        let (_dir, store) = open_store(1 << 20).await;
        let value = serde_json::json!({"titles": ["A", "B"]});

        store.set("feeds:a.com,b.com", &value, None).await.unwrap();
        let got = store.get("feeds:a.com,b.com").await.unwrap();
        assert_eq!(got, Some(value));
    }

    #[tokio::test]
    async fn get_nonexistent_returns_none() {
        let (_dir, store) = open_store(1 << 20).await;
        assert!(store.get("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ttl_expiry_is_a_miss_and_removes_the_row() {
        let (_dir, store) = open_store(1 << 20).await;
        store
            .set(
                "feeds:a.com,b.com",
                &serde_json::json!({"titles": ["A", "B"]}),
                Some(Duration::from_millis(100)),
            )
            .await
            .unwrap();

        assert_eq!(
            store.get("feeds:a.com,b.com").await.unwrap(),
            Some(serde_json::json!({"titles": ["A", "B"]}))
        );

        tokio::time::sleep(Duration::from_millis(150)).await;
        assert!(store.get("feeds:a.com,b.com").await.unwrap().is_none());
        assert_eq!(store.storage_info().await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn no_ttl_entry_survives() {
        let (_dir, store) = open_store(1 << 20).await;
        store
            .set("permanent", &serde_json::json!(true), None)
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(
            store.get("permanent").await.unwrap(),
            Some(serde_json::json!(true))
        );
    }

    #[tokio::test]
    async fn overwrite_keeps_only_latest() {
        let (_dir, store) = open_store(1 << 20).await;
        store.set("k", &serde_json::json!(1), None).await.unwrap();
        store.set("k", &serde_json::json!(2), None).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(serde_json::json!(2)));
    }

    #[tokio::test]
    async fn delete_nonexistent_is_noop() {
        let (_dir, store) = open_store(1 << 20).await;
        store.delete("nope").await.unwrap();
    }

    #[tokio::test]
    async fn get_many_mixed_presence() {
        let (_dir, store) = open_store(1 << 20).await;
        store.set("k1", &serde_json::json!(1), None).await.unwrap();
        store.set("k2", &serde_json::json!(2), None).await.unwrap();
        store
            .set("gone", &serde_json::json!(3), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let result = store
            .get_many(&[
                "k1".to_string(),
                "k2".to_string(),
                "gone".to_string(),
                "missing".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(result.len(), 2);
        assert!(result.contains_key("k1"));
        assert!(result.contains_key("k2"));
    }

    #[tokio::test]
    async fn get_many_empty_input() {
        let (_dir, store) = open_store(1 << 20).await;
        assert!(store.get_many(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_many_writes_all() {
        let (_dir, store) = open_store(1 << 20).await;
        let mut entries = HashMap::new();
        entries.insert("a".to_string(), serde_json::json!("1"));
        entries.insert("b".to_string(), serde_json::json!("2"));
        store.set_many(&entries, None).await.unwrap();

        assert_eq!(store.get("a").await.unwrap(), Some(serde_json::json!("1")));
        assert_eq!(store.get("b").await.unwrap(), Some(serde_json::json!("2")));
    }

    #[tokio::test]
    async fn clear_empties_only_this_table() {
        let dir = tempfile::tempdir().unwrap();
        let reader_opts = StoreOptions::new("shared", "reader_cache", 2);
        let auth_opts = StoreOptions::new("shared", "auth_tokens", 2);
        let reader_store = SqliteEntryStore::open(dir.path(), &reader_opts).await.unwrap();
        let auth_store =
            SqliteEntryStore::with_pool(reader_store.pool.clone(), &auth_opts).await.unwrap();

        reader_store
            .set("article", &serde_json::json!("body"), None)
            .await
            .unwrap();
        auth_store
            .set("tokens", &serde_json::json!("secret"), None)
            .await
            .unwrap();

        reader_store.clear().await.unwrap();
        assert!(reader_store.get("article").await.unwrap().is_none());
        // The other namespace is untouched.
        assert_eq!(
            auth_store.get("tokens").await.unwrap(),
            Some(serde_json::json!("secret"))
        );
    }

    #[tokio::test]
    async fn quota_pressure_evicts_oldest_then_write_succeeds() {
        // Budget fits roughly four entries of this size.
        let (_dir, store) = open_store(160).await;
        for i in 0..4 {
            store
                .set(
                    &format!("old{i}"),
                    &serde_json::json!("xxxxxxxxxxxxxxxxxxxxxxxxxxxxxx"),
                    None,
                )
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        store
            .set(
                "newest",
                &serde_json::json!("yyyyyyyyyyyyyyyyyyyyyyyyyyyyyy"),
                None,
            )
            .await
            .unwrap();

        assert!(store.get("newest").await.unwrap().is_some());
        // Oldest entries by stored_at went first.
        assert!(store.get("old0").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn oversized_write_fails_with_quota_error() {
        let (_dir, store) = open_store(64).await;
        let huge = serde_json::json!("z".repeat(500));
        let err = store.set("big", &huge, None).await.unwrap_err();
        assert!(matches!(err, StoreError::QuotaExceeded { quota: 64, .. }));
    }

    #[tokio::test]
    async fn cleanup_sweeps_without_reads() {
        let (_dir, store) = open_store(1 << 20).await;
        store
            .set("short", &serde_json::json!(1), Some(Duration::from_millis(10)))
            .await
            .unwrap();
        store.set("keep", &serde_json::json!(2), None).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(store.cleanup().await.unwrap(), 1);
        assert_eq!(store.storage_info().await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn remove_oldest_entries_fraction() {
        let (_dir, store) = open_store(1 << 20).await;
        for i in 0..10 {
            store
                .set(&format!("k{i}"), &serde_json::json!(i), None)
                .await
                .unwrap();
            tokio::time::sleep(Duration::from_millis(3)).await;
        }

        let removed = store.remove_oldest_entries(0.25).await.unwrap();
        assert_eq!(removed, 3);
        assert!(store.get("k0").await.unwrap().is_none());
        assert!(store.get("k3").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn storage_info_counts_and_oldest() {
        let (_dir, store) = open_store(4096).await;
        let empty = store.storage_info().await.unwrap();
        assert_eq!(empty.count, 0);
        assert!(empty.oldest_entry.is_none());

        store.set("a", &serde_json::json!("v"), None).await.unwrap();
        store.set("b", &serde_json::json!("v"), None).await.unwrap();

        let info = store.storage_info().await.unwrap();
        assert_eq!(info.count, 2);
        assert_eq!(info.quota_bytes, 4096);
        assert!(info.used_bytes > 0);
        assert!(info.oldest_entry.is_some());
    }

    #[tokio::test]
    async fn reopening_at_higher_version_preserves_entries() {
        let dir = tempfile::tempdir().unwrap();
        let v1 = StoreOptions::new("upgradable", "cache", 1);
        {
            let store = SqliteEntryStore::open(dir.path(), &v1).await.unwrap();
            store
                .set("kept", &serde_json::json!("survivor"), None)
                .await
                .unwrap();
            store.pool.close().await;
        }

        let v2 = StoreOptions::new("upgradable", "cache", 2);
        let store = SqliteEntryStore::open(dir.path(), &v2).await.unwrap();
        assert_eq!(
            store.get("kept").await.unwrap(),
            Some(serde_json::json!("survivor"))
        );
    }

    #[tokio::test]
    async fn rejects_hostile_table_names() {
        let dir = tempfile::tempdir().unwrap();
        for bad in ["drop table; --", "a b", "../escape", ""] {
            let options = StoreOptions::new("ok_store", bad, 1);
            let result = SqliteEntryStore::open(dir.path(), &options).await;
            assert!(matches!(result, Err(StoreError::Unavailable(_))), "{bad}");
        }
    }

    #[test]
    fn is_supported_on_writable_dir() {
        let dir = tempfile::tempdir().unwrap();
        assert!(SqliteEntryStore::is_supported(dir.path()));
    }

    #[test]
    fn datetime_format_sorts_lexicographically() {
        let early = Utc::now();
        let late = early + chrono::Duration::microseconds(1500);
        assert!(format_datetime(&early) < format_datetime(&late));
        // Round-trips through the parser.
        assert_eq!(parse_datetime(&format_datetime(&early)).unwrap(), early);
    }
}
