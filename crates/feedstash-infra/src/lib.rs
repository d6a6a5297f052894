//! Infrastructure layer for feedstash.
//!
//! Contains implementations of the traits defined in `feedstash-core`:
//! SQLite entry storage with TTL and quota eviction, the store manager with
//! coalesced opens, AES-256-GCM encryption at rest, keychain-backed master
//! keys, SHA-256 cache-key derivation, and the TOML config loader.

pub mod config;
pub mod crypto;
pub mod sqlite;
