//! BoxEntryStore -- object-safe dynamic dispatch wrapper for EntryStore.
//!
//! `EntryStore` uses RPITIT and cannot be a trait object directly. This
//! module follows the blanket-impl bridge pattern:
//! 1. Define an object-safe `EntryStoreDyn` trait with boxed futures
//! 2. Blanket-impl `EntryStoreDyn` for all `T: EntryStore`
//! 3. `BoxEntryStore` wraps `Arc<dyn EntryStoreDyn>` and delegates
//!
//! `BoxEntryStore` also carries the typed convenience surface
//! (`get_as`/`set_as`) so callers work with their own types instead of raw
//! `serde_json::Value`.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use feedstash_types::entry::StorageInfo;
use feedstash_types::error::StoreError;

use super::entry_store::EntryStore;

/// Object-safe version of [`EntryStore`] with boxed futures.
pub trait EntryStoreDyn: Send + Sync {
    fn get_boxed<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<serde_json::Value>, StoreError>> + Send + 'a>>;

    fn set_boxed<'a>(
        &'a self,
        key: &'a str,
        value: &'a serde_json::Value,
        ttl: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    fn delete_boxed<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    fn clear_boxed(&self)
    -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    fn keys_boxed(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, StoreError>> + Send + '_>>;

    fn get_many_boxed<'a>(
        &'a self,
        keys: &'a [String],
    ) -> Pin<
        Box<
            dyn Future<Output = Result<HashMap<String, serde_json::Value>, StoreError>>
                + Send
                + 'a,
        >,
    >;

    fn set_many_boxed<'a>(
        &'a self,
        entries: &'a HashMap<String, serde_json::Value>,
        ttl: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>>;

    fn storage_info_boxed(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<StorageInfo, StoreError>> + Send + '_>>;

    fn cleanup_boxed(&self)
    -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>>;

    fn remove_oldest_boxed(
        &self,
        fraction: f64,
    ) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>>;
}

/// Blanket implementation: any `EntryStore` automatically implements
/// `EntryStoreDyn`.
impl<T: EntryStore> EntryStoreDyn for T {
    fn get_boxed<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Option<serde_json::Value>, StoreError>> + Send + 'a>>
    {
        Box::pin(self.get(key))
    }

    fn set_boxed<'a>(
        &'a self,
        key: &'a str,
        value: &'a serde_json::Value,
        ttl: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(self.set(key, value, ttl))
    }

    fn delete_boxed<'a>(
        &'a self,
        key: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(self.delete(key))
    }

    fn clear_boxed(&self)
    -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(self.clear())
    }

    fn keys_boxed(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<String>, StoreError>> + Send + '_>> {
        Box::pin(self.keys())
    }

    fn get_many_boxed<'a>(
        &'a self,
        keys: &'a [String],
    ) -> Pin<
        Box<
            dyn Future<Output = Result<HashMap<String, serde_json::Value>, StoreError>>
                + Send
                + 'a,
        >,
    > {
        Box::pin(self.get_many(keys))
    }

    fn set_many_boxed<'a>(
        &'a self,
        entries: &'a HashMap<String, serde_json::Value>,
        ttl: Option<Duration>,
    ) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + 'a>> {
        Box::pin(self.set_many(entries, ttl))
    }

    fn storage_info_boxed(
        &self,
    ) -> Pin<Box<dyn Future<Output = Result<StorageInfo, StoreError>> + Send + '_>> {
        Box::pin(self.storage_info())
    }

    fn cleanup_boxed(&self)
    -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>> {
        Box::pin(self.cleanup())
    }

    fn remove_oldest_boxed(
        &self,
        fraction: f64,
    ) -> Pin<Box<dyn Future<Output = Result<u64, StoreError>> + Send + '_>> {
        Box::pin(self.remove_oldest_entries(fraction))
    }
}

/// Type-erased entry store handle.
///
/// Cheap to clone (shared `Arc`), usable where the concrete store type is
/// decided at runtime -- e.g. a plain SQLite store versus the same store
/// wrapped in encryption. Callers cannot tell the difference, which is the
/// point: encryption is fully transparent at this seam.
#[derive(Clone)]
pub struct BoxEntryStore {
    inner: Arc<dyn EntryStoreDyn>,
}

impl BoxEntryStore {
    /// Wrap a concrete `EntryStore` in a type-erased handle.
    pub fn new<T: EntryStore + 'static>(store: T) -> Self {
        Self {
            inner: Arc::new(store),
        }
    }

    /// Wrap an already-shared store without another allocation.
    pub fn from_arc<T: EntryStore + 'static>(store: Arc<T>) -> Self {
        Self { inner: store }
    }

    pub async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        self.inner.get_boxed(key).await
    }

    pub async fn set(
        &self,
        key: &str,
        value: &serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        self.inner.set_boxed(key, value, ttl).await
    }

    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete_boxed(key).await
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear_boxed().await
    }

    pub async fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.inner.keys_boxed().await
    }

    pub async fn get_many(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, serde_json::Value>, StoreError> {
        self.inner.get_many_boxed(keys).await
    }

    pub async fn set_many(
        &self,
        entries: &HashMap<String, serde_json::Value>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        self.inner.set_many_boxed(entries, ttl).await
    }

    pub async fn storage_info(&self) -> Result<StorageInfo, StoreError> {
        self.inner.storage_info_boxed().await
    }

    pub async fn cleanup(&self) -> Result<u64, StoreError> {
        self.inner.cleanup_boxed().await
    }

    pub async fn remove_oldest_entries(&self, fraction: f64) -> Result<u64, StoreError> {
        self.inner.remove_oldest_boxed(fraction).await
    }

    /// Typed get: deserialize the stored value into `T`.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.get(key).await? {
            Some(value) => {
                let typed = serde_json::from_value(value)
                    .map_err(|e| StoreError::Serialization(e.to_string()))?;
                Ok(Some(typed))
            }
            None => Ok(None),
        }
    }

    /// Typed set: serialize `value` before writing.
    pub async fn set_as<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let json =
            serde_json::to_value(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.set(key, &json, ttl).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryEntryStore;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Prefs {
        theme: String,
        font_size: u32,
    }

    #[tokio::test]
    async fn boxed_store_delegates() {
        let store = BoxEntryStore::new(MemoryEntryStore::new());

        store
            .set("k", &serde_json::json!({"a": 1}), None)
            .await
            .unwrap();
        let got = store.get("k").await.unwrap();
        assert_eq!(got, Some(serde_json::json!({"a": 1})));

        store.delete("k").await.unwrap();
        assert!(store.get("k").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn typed_round_trip() {
        let store = BoxEntryStore::new(MemoryEntryStore::new());
        let prefs = Prefs {
            theme: "dark".to_string(),
            font_size: 14,
        };

        store.set_as("prefs", &prefs, None).await.unwrap();
        let got: Option<Prefs> = store.get_as("prefs").await.unwrap();
        assert_eq!(got, Some(prefs));
    }

    #[tokio::test]
    async fn typed_get_with_wrong_shape_is_serialization_error() {
        let store = BoxEntryStore::new(MemoryEntryStore::new());
        store
            .set("prefs", &serde_json::json!("just a string"), None)
            .await
            .unwrap();

        let result: Result<Option<Prefs>, _> = store.get_as("prefs").await;
        assert!(matches!(result, Err(StoreError::Serialization(_))));
    }

    #[tokio::test]
    async fn clones_share_the_same_store() {
        let store = BoxEntryStore::new(MemoryEntryStore::new());
        let clone = store.clone();

        store.set("k", &serde_json::json!(42), None).await.unwrap();
        assert_eq!(clone.get("k").await.unwrap(), Some(serde_json::json!(42)));
    }
}
