//! Persisted-query allow/deny filtering.
//!
//! Not every query result belongs on disk: transient state (login attempts,
//! in-flight form data) stays memory-only. The filter decides per query key
//! whether write-through persistence applies.

/// Prefix-based allow/deny filter for persisted query keys.
///
/// Deny rules win over allow rules. With no allow list, everything not
/// denied is persisted.
#[derive(Debug, Clone, Default)]
pub struct PersistFilter {
    allow_prefixes: Option<Vec<String>>,
    deny_prefixes: Vec<String>,
}

impl PersistFilter {
    /// Persist everything.
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Restrict persistence to keys matching one of these prefixes.
    pub fn with_allowed(mut self, prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.allow_prefixes = Some(prefixes.into_iter().map(Into::into).collect());
        self
    }

    /// Exclude keys matching one of these prefixes.
    pub fn with_denied(mut self, prefixes: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.deny_prefixes
            .extend(prefixes.into_iter().map(Into::into));
        self
    }

    /// Whether a query under `key` should be written to durable storage.
    pub fn should_persist(&self, key: &str) -> bool {
        if self.deny_prefixes.iter().any(|p| key.starts_with(p)) {
            return false;
        }
        match &self.allow_prefixes {
            Some(allowed) => allowed.iter().any(|p| key.starts_with(p)),
            None => true,
        }
    }
}
