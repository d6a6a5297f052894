//! Auth token types.
//!
//! `AuthTokens` is what consumers hand in and get back; `TokenRecord` is the
//! persisted shape with the absolute expiry the persister computes. Debug
//! output masks token values so they never land in logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A token pair as exchanged with consumers.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Remaining lifetime in seconds at the time the tokens were issued.
    pub expires_in_secs: i64,
}

impl fmt::Debug for AuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthTokens")
            .field("access_token", &mask(&self.access_token))
            .field("refresh_token", &self.refresh_token.as_deref().map(mask))
            .field("expires_in_secs", &self.expires_in_secs)
            .finish()
    }
}

/// The persisted token record: payload plus bookkeeping.
///
/// `expires_at` is internal; `get_tokens()` strips it before returning the
/// payload to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub tokens: AuthTokens,
    /// Absolute expiry computed at store time.
    pub expires_at: DateTime<Utc>,
}

impl TokenRecord {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Seconds until expiry; negative when already expired.
    pub fn time_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }
}

/// Mask a token value, showing only the last 4 characters.
fn mask(value: &str) -> String {
    if value.len() <= 4 {
        "****".to_string()
    } else {
        format!("****{}", &value[value.len() - 4..])
    }
}
