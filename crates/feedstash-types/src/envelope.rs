//! Encrypted envelope format.
//!
//! When encryption is active, the storage layer persists this envelope in
//! place of the plaintext value. It carries everything needed to decrypt
//! except the key itself, and is opaque to the underlying store.

use serde::{Deserialize, Serialize};

/// Algorithm identifier written into every envelope.
pub const ENVELOPE_ALGORITHM: &str = "aes-256-gcm";

/// Wrapper persisted in place of a plaintext value when encryption is on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedEnvelope {
    /// Base64-encoded AES-256-GCM ciphertext (tag included).
    pub ciphertext: String,
    /// Base64-encoded 12-byte nonce, freshly generated per write.
    pub nonce: String,
    /// Cipher identifier, currently always `"aes-256-gcm"`.
    pub algorithm: String,
    /// How the symmetric key was obtained. Never contains key material.
    pub kdf: KdfParams,
}

/// Key-derivation metadata recorded in the envelope.
///
/// Enough to rebuild the key from its source (password prompt, keychain
/// lookup), but never the key or password itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "lowercase")]
pub enum KdfParams {
    /// Argon2id password derivation with the recorded cost parameters.
    Argon2id {
        memory_kib: u32,
        iterations: u32,
        parallelism: u32,
    },
    /// Random key held in the OS keychain.
    Keychain,
    /// Caller-supplied raw key; the embedder owns key management.
    Raw,
}
