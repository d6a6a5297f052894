//! SQLite storage layer.
//!
//! Entry stores backed by SQLite with WAL mode and split read/write
//! connection pools. One database file per store, one table per namespace.

pub mod entry;
pub mod manager;
pub mod pool;

pub use entry::SqliteEntryStore;
pub use manager::StoreManager;
pub use pool::DatabasePool;
