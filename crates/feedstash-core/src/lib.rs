//! Core logic for feedstash.
//!
//! Defines the `EntryStore` trait and its object-safe bridge, cache-key
//! derivation, the query cache with write-through batching, and the auth
//! token persister. Storage and crypto implementations live in
//! `feedstash-infra`; this crate depends only on `feedstash-types`.

pub mod auth;
pub mod cache_key;
pub mod query;
pub mod store;
