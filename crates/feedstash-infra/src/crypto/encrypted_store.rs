//! Transparent at-rest encryption decorator.
//!
//! `EncryptedStore` wraps any `EntryStore` and encrypts values with
//! AES-256-GCM before they reach it. The inner store only ever sees
//! `EncryptedEnvelope` JSON; keys, timestamps, TTLs, and quota accounting
//! pass through untouched. Each write generates a fresh random nonce, so
//! encrypting the same value twice produces different envelopes.
//!
//! SECURITY: Error types never contain plaintext or key material.

use std::collections::HashMap;
use std::time::Duration;

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;

use feedstash_core::store::EntryStore;
use feedstash_types::entry::StorageInfo;
use feedstash_types::envelope::{ENVELOPE_ALGORITHM, EncryptedEnvelope, KdfParams};
use feedstash_types::error::{CryptoError, StoreError};

use super::master_key::MasterKey;

/// AES-256-GCM nonce size (96 bits).
const NONCE_SIZE: usize = 12;

/// `EntryStore` decorator that encrypts every value before delegating.
pub struct EncryptedStore<S> {
    inner: S,
    cipher: Aes256Gcm,
    kdf: KdfParams,
}

impl<S: EntryStore> EncryptedStore<S> {
    pub fn new(inner: S, key: &MasterKey) -> Self {
        Self {
            inner,
            cipher: Aes256Gcm::new(key.bytes().into()),
            kdf: key.kdf().clone(),
        }
    }

    fn seal(&self, value: &serde_json::Value) -> Result<serde_json::Value, StoreError> {
        let plaintext = serde_json::to_vec(value)
            .map_err(|e| StoreError::Serialization(format!("failed to serialize value: {e}")))?;

        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_slice())
            .map_err(|_| CryptoError::EncryptionFailed)?;

        let envelope = EncryptedEnvelope {
            ciphertext: BASE64.encode(&ciphertext),
            nonce: BASE64.encode(nonce),
            algorithm: ENVELOPE_ALGORITHM.to_string(),
            kdf: self.kdf.clone(),
        };
        serde_json::to_value(&envelope)
            .map_err(|e| StoreError::Serialization(format!("failed to serialize envelope: {e}")))
    }

    fn open(&self, stored: serde_json::Value) -> Result<serde_json::Value, StoreError> {
        let envelope: EncryptedEnvelope = serde_json::from_value(stored)
            .map_err(|e| CryptoError::InvalidEnvelope(format!("not an envelope: {e}")))?;

        if envelope.algorithm != ENVELOPE_ALGORITHM {
            return Err(CryptoError::InvalidEnvelope(format!(
                "unsupported algorithm: {}",
                envelope.algorithm
            ))
            .into());
        }

        let nonce_bytes = BASE64
            .decode(&envelope.nonce)
            .map_err(|_| CryptoError::InvalidEnvelope("nonce is not base64".to_string()))?;
        if nonce_bytes.len() != NONCE_SIZE {
            return Err(
                CryptoError::InvalidEnvelope("nonce has wrong length".to_string()).into(),
            );
        }
        let ciphertext = BASE64
            .decode(&envelope.ciphertext)
            .map_err(|_| CryptoError::InvalidEnvelope("ciphertext is not base64".to_string()))?;

        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(&nonce_bytes), ciphertext.as_slice())
            .map_err(|_| CryptoError::DecryptionFailed)?;

        serde_json::from_slice(&plaintext)
            .map_err(|e| StoreError::Serialization(format!("decrypted value is not JSON: {e}")))
    }
}

impl<S: EntryStore> EntryStore for EncryptedStore<S> {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, StoreError> {
        match self.inner.get(key).await? {
            Some(stored) => Ok(Some(self.open(stored)?)),
            None => Ok(None),
        }
    }

    async fn set(
        &self,
        key: &str,
        value: &serde_json::Value,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let sealed = self.seal(value)?;
        self.inner.set(key, &sealed, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.inner.delete(key).await
    }

    async fn clear(&self) -> Result<(), StoreError> {
        self.inner.clear().await
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        self.inner.keys().await
    }

    async fn get_many(
        &self,
        keys: &[String],
    ) -> Result<HashMap<String, serde_json::Value>, StoreError> {
        let sealed = self.inner.get_many(keys).await?;
        let mut result = HashMap::with_capacity(sealed.len());
        for (key, stored) in sealed {
            result.insert(key, self.open(stored)?);
        }
        Ok(result)
    }

    async fn set_many(
        &self,
        entries: &HashMap<String, serde_json::Value>,
        ttl: Option<Duration>,
    ) -> Result<(), StoreError> {
        let mut sealed = HashMap::with_capacity(entries.len());
        for (key, value) in entries {
            sealed.insert(key.clone(), self.seal(value)?);
        }
        self.inner.set_many(&sealed, ttl).await
    }

    async fn storage_info(&self) -> Result<StorageInfo, StoreError> {
        self.inner.storage_info().await
    }

    async fn cleanup(&self) -> Result<u64, StoreError> {
        self.inner.cleanup().await
    }

    async fn remove_oldest_entries(&self, fraction: f64) -> Result<u64, StoreError> {
        self.inner.remove_oldest_entries(fraction).await
    }
}
