//! Query-result caching over the entry store.
//!
//! An in-memory cache with stale-while-revalidate semantics, persisted
//! across restarts through an `EntryStore` (plain or encryption-wrapped).
//! Writes are batched in a throttle window; hydration at startup enforces a
//! maximum age independent of the physical TTL.

pub mod cache;
pub mod events;
pub mod filter;

pub use cache::{QueryCache, QueryCacheConfig, QueryLookup};
pub use events::{CacheEvent, CacheEventBus};
pub use filter::PersistFilter;
