//! Shared domain types for feedstash.
//!
//! Plain data types and error enums used across the workspace. This crate
//! performs no I/O; storage and crypto implementations live in
//! `feedstash-infra`, business logic in `feedstash-core`.

pub mod config;
pub mod entry;
pub mod envelope;
pub mod error;
pub mod token;
