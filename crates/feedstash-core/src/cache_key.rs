//! Cache-key derivation.
//!
//! Cache keys are derived from semantic request parameters (feed URL lists,
//! endpoint + query tuples). Two logically-equivalent inputs must map to the
//! same key, so the parts are normalized, deduplicated, and sorted before
//! digesting. The digest itself is behind the `KeyDeriver` trait; the
//! SHA-256 implementation lives in `feedstash-infra`.
//!
//! Because the output is a fixed-format hex digest, no raw input bytes
//! (path separators, `..`, schemes) can ever survive into the key space.

/// Separator joined between normalized parts before digesting. A newline
/// cannot appear in a trimmed single-line part, so `["ab"]` and `["a","b"]`
/// digest differently.
pub const PART_SEPARATOR: char = '\n';

/// Trait for collision-resistant key digests.
///
/// Implementations must return a fixed-length lowercase hexadecimal string
/// (64 chars for a 256-bit digest). Pure: no side effects, safe on
/// attacker-controlled input.
pub trait KeyDeriver: Send + Sync {
    /// Derive a cache key from pre-normalized, joined input.
    ///
    /// Callers should go through [`derive_cache_key`] rather than call this
    /// directly, so normalization is never skipped.
    fn digest(&self, canonical: &str) -> String;
}

/// Normalize input parts: trim, ASCII-lowercase, deduplicate, sort.
///
/// Lowercasing is semantically safe for the inputs this layer sees (URLs and
/// endpoint identifiers); it makes `https://A.com` and `https://a.com`
/// derive the same key.
pub fn normalize_parts<S: AsRef<str>>(parts: &[S]) -> Vec<String> {
    let mut normalized: Vec<String> = parts
        .iter()
        .map(|p| p.as_ref().trim().to_ascii_lowercase())
        .filter(|p| !p.is_empty())
        .collect();
    normalized.sort();
    normalized.dedup();
    normalized
}

/// Derive a deterministic, order-independent cache key from `parts`.
pub fn derive_cache_key<S: AsRef<str>>(deriver: &dyn KeyDeriver, parts: &[S]) -> String {
    let canonical = normalize_parts(parts).join(&PART_SEPARATOR.to_string());
    deriver.digest(&canonical)
}
