//! Auth token persistence.

pub mod persister;

pub use persister::{KeyCustodian, TokenPersister, TokenPersisterConfig};
