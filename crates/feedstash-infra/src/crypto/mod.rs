//! Cryptography: master key management, the encrypting store decorator,
//! and SHA-256 cache-key derivation.

pub mod cache_key;
pub mod encrypted_store;
pub mod master_key;

pub use cache_key::Sha256KeyDeriver;
pub use encrypted_store::EncryptedStore;
pub use master_key::{KeychainCustodian, MasterKey};
