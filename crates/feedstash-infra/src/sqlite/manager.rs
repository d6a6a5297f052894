//! Store lifecycle manager.
//!
//! Hands out shared `SqliteEntryStore` instances, coalescing concurrent
//! opens of the same store/table so a database file is only ever opened
//! once. Stores sharing a `store_name` share one pool (one SQLite file,
//! several tables).

use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::OnceCell;

use feedstash_types::entry::StoreOptions;
use feedstash_types::error::StoreError;

use super::entry::SqliteEntryStore;
use super::pool::DatabasePool;

pub struct StoreManager {
    data_dir: PathBuf,
    pools: DashMap<String, Arc<OnceCell<DatabasePool>>>,
    stores: DashMap<String, Arc<OnceCell<Arc<SqliteEntryStore>>>>,
}

impl StoreManager {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            pools: DashMap::new(),
            stores: DashMap::new(),
        }
    }

    /// Open (or reuse) the store for `options`. Concurrent callers asking
    /// for the same store/table pair all receive the same instance; only
    /// one of them performs the actual open and migration.
    pub async fn open(&self, options: &StoreOptions) -> Result<Arc<SqliteEntryStore>, StoreError> {
        let store_key = format!("{}/{}", options.store_name, options.table_name);
        let cell = self
            .stores
            .entry(store_key)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let store = cell
            .get_or_try_init(|| async {
                let pool = self.pool_for(options).await?;
                let store = SqliteEntryStore::with_pool(pool, options).await?;
                Ok::<_, StoreError>(Arc::new(store))
            })
            .await?;

        Ok(store.clone())
    }

    async fn pool_for(&self, options: &StoreOptions) -> Result<DatabasePool, StoreError> {
        let cell = self
            .pools
            .entry(options.store_name.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone();

        let pool = cell
            .get_or_try_init(|| async {
                std::fs::create_dir_all(&self.data_dir).map_err(|e| {
                    StoreError::Unavailable(format!("cannot create data dir: {e}"))
                })?;
                let db_path = self.data_dir.join(format!("{}.db", options.store_name));
                let url = format!("sqlite://{}?mode=rwc", db_path.display());
                DatabasePool::new(&url)
                    .await
                    .map_err(|e| StoreError::Unavailable(format!("cannot open database: {e}")))
            })
            .await?;

        Ok(pool.clone())
    }

    /// Close every pool this manager opened. Stores handed out earlier
    /// become unusable; callers are expected to drop them first.
    pub async fn close_all(&self) {
        self.stores.clear();
        let pools: Vec<DatabasePool> = self
            .pools
            .iter()
            .filter_map(|entry| entry.value().get().cloned())
            .collect();
        self.pools.clear();
        for pool in pools {
            pool.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedstash_core::store::EntryStore;

    #[tokio::test]
    async fn concurrent_opens_coalesce_to_one_store() {
        let dir = tempfile::tempdir().unwrap();
        let manager = Arc::new(StoreManager::new(dir.path()));
        let options = StoreOptions::new("reader", "cache", 2);

        let mut handles = Vec::new();
        for _ in 0..8 {
            let manager = manager.clone();
            let options = options.clone();
            handles.push(tokio::spawn(
                async move { manager.open(&options).await },
            ));
        }

        let mut stores = Vec::new();
        for handle in handles {
            stores.push(handle.await.unwrap().unwrap());
        }
        for store in &stores[1..] {
            assert!(Arc::ptr_eq(&stores[0], store));
        }
    }

    #[tokio::test]
    async fn tables_in_one_store_share_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let manager = StoreManager::new(dir.path());

        let cache = manager
            .open(&StoreOptions::new("shared", "cache", 2))
            .await
            .unwrap();
        let auth = manager
            .open(&StoreOptions::new("shared", "auth_tokens", 2))
            .await
            .unwrap();

        cache.set("k", &serde_json::json!(1), None).await.unwrap();
        auth.set("k", &serde_json::json!(2), None).await.unwrap();

        // Same key in different tables, no collision.
        assert_eq!(cache.get("k").await.unwrap(), Some(serde_json::json!(1)));
        assert_eq!(auth.get("k").await.unwrap(), Some(serde_json::json!(2)));

        let db_files: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().is_some_and(|ext| ext == "db"))
            .collect();
        assert_eq!(db_files.len(), 1);
    }

    #[tokio::test]
    async fn close_all_allows_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let manager = StoreManager::new(dir.path());
        let options = StoreOptions::new("reader", "cache", 2);

        let store = manager.open(&options).await.unwrap();
        store
            .set("persisted", &serde_json::json!("v"), None)
            .await
            .unwrap();
        drop(store);
        manager.close_all().await;

        let store = manager.open(&options).await.unwrap();
        assert_eq!(
            store.get("persisted").await.unwrap(),
            Some(serde_json::json!("v"))
        );
    }
}
