//! Error types for the persistence and caching layer.
//!
//! Absence is never an error: "not found" is `Ok(None)` or omission from a
//! batch result. The enums here cover the failures that must propagate:
//! storage unavailability, quota exhaustion, crypto failures, and input
//! validation.

use thiserror::Error;

/// Errors from store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The storage primitive is missing or the database failed to open.
    /// Callers should treat this as "persistence disabled" and fall back
    /// to memory-only operation.
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// A write still exceeded the store's byte budget after one
    /// evict-and-retry pass.
    #[error("quota exceeded: {needed} bytes needed, {quota} byte quota")]
    QuotaExceeded { needed: u64, quota: u64 },

    /// Value (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Underlying query/transaction failure.
    #[error("query error: {0}")]
    Query(String),

    /// Encryption-layer failure surfaced through the store contract.
    /// Distinct from a miss: the data exists but is unrecoverable.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}

/// Errors from the encryption wrapper and key management.
///
/// These errors never include plaintext, ciphertext, or key material in
/// their Display/Debug output.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("encryption failed")]
    EncryptionFailed,

    /// Wrong key, corrupted ciphertext, or tampering. Callers should clear
    /// the affected data rather than retry.
    #[error("decryption failed")]
    DecryptionFailed,

    /// The stored envelope is malformed or names an unsupported algorithm.
    #[error("invalid envelope: {0}")]
    InvalidEnvelope(String),

    #[error("key derivation failed")]
    KeyDerivationFailed,

    #[error("keychain unavailable: {0}")]
    KeychainUnavailable(String),

    #[error("keychain error: {0}")]
    KeychainError(String),
}

/// Errors from the auth token persister.
#[derive(Debug, Error)]
pub enum TokenError {
    /// Input violated a domain invariant. Raised before any storage I/O;
    /// invalid tokens are never partially persisted.
    #[error("invalid tokens: {0}")]
    Validation(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quota_error_display() {
        let err = StoreError::QuotaExceeded {
            needed: 2048,
            quota: 1024,
        };
        assert_eq!(
            err.to_string(),
            "quota exceeded: 2048 bytes needed, 1024 byte quota"
        );
    }

    #[test]
    fn crypto_error_passes_through_store_error() {
        let err = StoreError::from(CryptoError::DecryptionFailed);
        assert!(matches!(
            err,
            StoreError::Crypto(CryptoError::DecryptionFailed)
        ));
        assert_eq!(err.to_string(), "decryption failed");
    }

    #[test]
    fn token_validation_display() {
        let err = TokenError::Validation("non-positive lifetime".to_string());
        assert_eq!(err.to_string(), "invalid tokens: non-positive lifetime");
    }

    #[test]
    fn crypto_errors_never_contain_secrets() {
        let secret = "sk-super-secret-value-12345";
        let key_hex = "deadbeefcafebabe";

        let errors = [
            CryptoError::EncryptionFailed,
            CryptoError::DecryptionFailed,
            CryptoError::InvalidEnvelope("bad algorithm field".to_string()),
            CryptoError::KeyDerivationFailed,
            CryptoError::KeychainUnavailable("no keychain service".to_string()),
            CryptoError::KeychainError("credential store locked".to_string()),
        ];

        for err in &errors {
            let msg = err.to_string();
            assert!(!msg.contains(secret), "error leaks secret value: {msg}");
            assert!(!msg.contains(key_hex), "error leaks key material: {msg}");
        }
    }
}
