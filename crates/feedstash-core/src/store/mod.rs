//! Storage abstraction.
//!
//! `EntryStore` is the narrow contract every consumer programs against.
//! `BoxEntryStore` provides dynamic dispatch; `MemoryEntryStore` is the
//! fallback when no durable storage is available.

pub mod box_store;
pub mod entry_store;
pub mod memory;

pub use box_store::BoxEntryStore;
pub use entry_store::EntryStore;
pub use memory::MemoryEntryStore;
