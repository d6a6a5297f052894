//! Auth token persister.
//!
//! Combines an entry store (expected to be encryption-wrapped) with token
//! validation and lifecycle rules. The persisted session moves through
//! `absent -> valid -> (should_refresh) -> valid -> expired -> absent`;
//! there is no invalid-but-present state, because expiry or validation
//! failure always ends in deletion.

use chrono::{Duration, Utc};

use feedstash_types::config::{DEFAULT_REFRESH_THRESHOLD_SECS, MAX_TOKEN_LIFETIME_SECS, StashConfig};
use feedstash_types::error::{CryptoError, TokenError};
use feedstash_types::token::{AuthTokens, TokenRecord};

use crate::store::BoxEntryStore;

/// Storage key for the persisted token record.
const TOKEN_RECORD_KEY: &str = "auth:tokens";

/// Handle over destroyable key material.
///
/// Implemented in `feedstash-infra` by the keychain-backed master key. When
/// the persister clears everything, destroying the key renders any residual
/// ciphertext permanently unrecoverable (crypto-shredding).
pub trait KeyCustodian: Send + Sync {
    fn destroy(&self) -> Result<(), CryptoError>;
}

/// Lifecycle thresholds for stored tokens.
#[derive(Debug, Clone)]
pub struct TokenPersisterConfig {
    /// Tokens expiring within this window should be refreshed.
    pub refresh_threshold: Duration,
    /// Reject tokens claiming a lifetime beyond this bound.
    pub max_lifetime: Duration,
}

impl Default for TokenPersisterConfig {
    fn default() -> Self {
        Self {
            refresh_threshold: Duration::seconds(DEFAULT_REFRESH_THRESHOLD_SECS),
            max_lifetime: Duration::seconds(MAX_TOKEN_LIFETIME_SECS),
        }
    }
}

impl TokenPersisterConfig {
    pub fn from_stash(config: &StashConfig) -> Self {
        Self {
            refresh_threshold: Duration::seconds(config.refresh_threshold_secs),
            max_lifetime: Duration::seconds(MAX_TOKEN_LIFETIME_SECS),
        }
    }
}

/// Persists auth tokens with validation, expiry, and crypto-shredding.
///
/// The store handed in should be the encryption-wrapped one; this type is
/// deliberately ignorant of whether encryption is active.
pub struct TokenPersister {
    store: BoxEntryStore,
    custodian: Option<Box<dyn KeyCustodian>>,
    config: TokenPersisterConfig,
}

impl TokenPersister {
    pub fn new(store: BoxEntryStore, config: TokenPersisterConfig) -> Self {
        Self {
            store,
            custodian: None,
            config,
        }
    }

    /// Attach the key custodian whose material `clear_all` destroys.
    pub fn with_custodian(mut self, custodian: Box<dyn KeyCustodian>) -> Self {
        self.custodian = Some(custodian);
        self
    }

    /// Validate and persist a token pair, computing absolute expiry.
    ///
    /// Validation happens before any storage I/O; invalid tokens are never
    /// partially persisted.
    pub async fn store_tokens(&self, tokens: AuthTokens) -> Result<(), TokenError> {
        if tokens.access_token.trim().is_empty() {
            return Err(TokenError::Validation("empty access token".to_string()));
        }
        if tokens.expires_in_secs <= 0 {
            return Err(TokenError::Validation(format!(
                "non-positive lifetime: {}s",
                tokens.expires_in_secs
            )));
        }
        let lifetime = Duration::seconds(tokens.expires_in_secs);
        if lifetime > self.config.max_lifetime {
            return Err(TokenError::Validation(format!(
                "lifetime {}s exceeds maximum {}s",
                tokens.expires_in_secs,
                self.config.max_lifetime.num_seconds()
            )));
        }

        let record = TokenRecord {
            expires_at: Utc::now() + lifetime,
            tokens,
        };
        let ttl = lifetime.to_std().ok();
        self.store
            .set_as(TOKEN_RECORD_KEY, &record, ttl)
            .await
            .map_err(TokenError::from)
    }

    /// Get the stored tokens, or `None` when absent or expired.
    ///
    /// An expired record is deleted on observation, so the session goes
    /// straight from expired to absent. The returned payload is stripped of
    /// internal bookkeeping.
    pub async fn get_tokens(&self) -> Result<Option<AuthTokens>, TokenError> {
        let record: TokenRecord = match self.store.get_as(TOKEN_RECORD_KEY).await? {
            Some(record) => record,
            None => return Ok(None),
        };

        if record.is_expired(Utc::now()) {
            tracing::debug!("stored tokens expired, deleting");
            self.store.delete(TOKEN_RECORD_KEY).await?;
            return Ok(None);
        }

        Ok(Some(record.tokens))
    }

    /// Seconds until the stored tokens expire; `None` when no valid session.
    pub async fn time_until_expiry(&self) -> Result<Option<i64>, TokenError> {
        let record: Option<TokenRecord> = self.store.get_as(TOKEN_RECORD_KEY).await?;
        Ok(record
            .map(|r| r.time_until_expiry(Utc::now()))
            .filter(|&secs| secs > 0))
    }

    /// The single refresh decision point: true when expiry is approaching
    /// but has not yet passed.
    pub async fn should_refresh(&self) -> Result<bool, TokenError> {
        match self.time_until_expiry().await? {
            Some(secs) => Ok(secs < self.config.refresh_threshold.num_seconds()),
            None => Ok(false),
        }
    }

    /// Delete all persisted auth state, then destroy key material.
    ///
    /// With an encryption-wrapped store, shredding the key makes any
    /// ciphertext that escaped deletion permanently unrecoverable.
    pub async fn clear_all(&self) -> Result<(), TokenError> {
        self.store.clear().await?;
        if let Some(custodian) = &self.custodian {
            custodian.destroy().map_err(feedstash_types::error::StoreError::from)?;
        }
        Ok(())
    }
}
