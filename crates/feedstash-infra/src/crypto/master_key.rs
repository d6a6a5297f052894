//! Master key management for at-rest encryption.
//!
//! The AES-256-GCM key can come from:
//! - A raw 32-byte key supplied by the embedder
//! - A password (Argon2id key derivation)
//! - The OS keychain (auto-generated, zero-friction default)
//!
//! SECURITY: Error types never contain plaintext or key material.

use aes_gcm::aead::OsRng;

use feedstash_types::envelope::KdfParams;
use feedstash_types::error::CryptoError;

/// Service name used for keychain storage of the master key.
const KEYCHAIN_SERVICE: &str = "feedstash";
/// Keychain user/account for the master key.
const KEYCHAIN_USER: &str = "stash-master-key";

/// Argon2id cost parameters (OWASP recommended): 19 MiB memory,
/// 2 iterations, 1 lane.
const ARGON2_MEMORY_KIB: u32 = 19456;
const ARGON2_ITERATIONS: u32 = 2;
const ARGON2_PARALLELISM: u32 = 1;

/// A 32-byte AES-256-GCM key plus a record of how it was obtained.
///
/// The provenance is written into every envelope so a reader can tell
/// which key source is needed for decryption. It never includes the key.
pub struct MasterKey {
    bytes: [u8; 32],
    kdf: KdfParams,
}

impl MasterKey {
    /// Wrap a caller-supplied raw key. Key management stays with the caller.
    pub fn from_raw(key: [u8; 32]) -> Self {
        Self {
            bytes: key,
            kdf: KdfParams::Raw,
        }
    }

    /// Derive a key from a password with Argon2id.
    ///
    /// The salt is deterministic ("feedstash-vault-v1") so the same password
    /// always produces the same key. Acceptable here because the password
    /// provides the entropy and the output is used as an encryption key,
    /// not stored as a verification hash.
    pub fn from_password(password: &str) -> Result<Self, CryptoError> {
        use argon2::{Algorithm, Argon2, Params, Version};

        let params = Params::new(ARGON2_MEMORY_KIB, ARGON2_ITERATIONS, ARGON2_PARALLELISM, Some(32))
            .map_err(|_| CryptoError::KeyDerivationFailed)?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let salt = b"feedstash-vault-v1";
        let mut key = [0u8; 32];
        argon2
            .hash_password_into(password.as_bytes(), salt, &mut key)
            .map_err(|_| CryptoError::KeyDerivationFailed)?;

        Ok(Self {
            bytes: key,
            kdf: KdfParams::Argon2id {
                memory_kib: ARGON2_MEMORY_KIB,
                iterations: ARGON2_ITERATIONS,
                parallelism: ARGON2_PARALLELISM,
            },
        })
    }

    /// Load or auto-generate a master key from the OS keychain.
    ///
    /// 1. Try to load an existing key under service="feedstash"
    ///    user="stash-master-key"
    /// 2. If not found, generate a random 32-byte key and store it
    ///
    /// The key lives in the keychain as a hex string (64 chars = 32 bytes).
    pub fn from_keychain() -> Result<Self, CryptoError> {
        let entry = keyring::Entry::new(KEYCHAIN_SERVICE, KEYCHAIN_USER)
            .map_err(|e| CryptoError::KeychainUnavailable(e.to_string()))?;

        let bytes = match entry.get_password() {
            Ok(hex_key) => {
                let key_bytes = hex_decode(&hex_key).map_err(|_| {
                    CryptoError::KeychainError("corrupted key in keychain".to_string())
                })?;
                if key_bytes.len() != 32 {
                    return Err(CryptoError::KeychainError(
                        "invalid key length in keychain".to_string(),
                    ));
                }
                let mut key = [0u8; 32];
                key.copy_from_slice(&key_bytes);
                key
            }
            Err(keyring::Error::NoEntry) => {
                // No key yet -- generate a random one
                let key: [u8; 32] = rand_bytes();
                entry
                    .set_password(&hex_encode(&key))
                    .map_err(|e| CryptoError::KeychainError(e.to_string()))?;
                key
            }
            Err(e) => return Err(CryptoError::KeychainUnavailable(e.to_string())),
        };

        Ok(Self {
            bytes,
            kdf: KdfParams::Keychain,
        })
    }

    pub(crate) fn bytes(&self) -> &[u8; 32] {
        &self.bytes
    }

    /// Provenance metadata for envelopes. Never contains key material.
    pub fn kdf(&self) -> &KdfParams {
        &self.kdf
    }
}

/// Crypto-shredding handle for the keychain-held master key.
///
/// Destroying the key renders every envelope encrypted under it
/// permanently unreadable, without touching the stored rows.
pub struct KeychainCustodian;

impl feedstash_core::auth::KeyCustodian for KeychainCustodian {
    fn destroy(&self) -> Result<(), CryptoError> {
        let entry = keyring::Entry::new(KEYCHAIN_SERVICE, KEYCHAIN_USER)
            .map_err(|e| CryptoError::KeychainUnavailable(e.to_string()))?;
        match entry.delete_credential() {
            Ok(()) => Ok(()),
            // Nothing to shred is success: the key already does not exist.
            Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(CryptoError::KeychainError(e.to_string())),
        }
    }
}

/// Generate 32 random bytes using the OS CSPRNG.
fn rand_bytes() -> [u8; 32] {
    use aes_gcm::aead::rand_core::RngCore;
    let mut key = [0u8; 32];
    OsRng.fill_bytes(&mut key);
    key
}

/// Hex-encode bytes to string.
fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Hex-decode a string to bytes.
fn hex_decode(s: &str) -> Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err("odd length hex string".to_string());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&s[i..i + 2], 16)
                .map_err(|e| format!("invalid hex at position {i}: {e}"))
        })
        .collect()
}
