//! SHA-256 cache-key derivation.
//!
//! Implements the `KeyDeriver` trait from `feedstash-core` using the
//! `sha2` crate (RustCrypto ecosystem).

use sha2::{Digest, Sha256};

use feedstash_core::cache_key::KeyDeriver;

/// SHA-256 implementation of `KeyDeriver`.
///
/// Produces lowercase hex digests, 64 chars. The fixed hex alphabet means
/// no input byte can survive into the derived key, so keys built from
/// attacker-controlled URLs are always safe to use as storage keys.
pub struct Sha256KeyDeriver;

impl Sha256KeyDeriver {
    pub fn new() -> Self {
        Self
    }
}

impl Default for Sha256KeyDeriver {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyDeriver for Sha256KeyDeriver {
    fn digest(&self, canonical: &str) -> String {
        let digest = Sha256::digest(canonical.as_bytes());
        format!("{:x}", digest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedstash_core::cache_key::derive_cache_key;

    #[test]
    fn digest_is_64_lowercase_hex_chars() {
        let deriver = Sha256KeyDeriver::new();
        let key = derive_cache_key(&deriver, &["https://a.com/feed.xml"]);
        assert_eq!(key.len(), 64);
        assert!(key.chars().all(|c| c.is_ascii_hexdigit()));
        assert!(key.chars().all(|c| !c.is_ascii_uppercase()));
    }

    #[test]
    fn known_empty_input_digest() {
        // SHA-256 of the empty string.
        let deriver = Sha256KeyDeriver::new();
        assert_eq!(
            deriver.digest(""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn equivalent_feed_lists_derive_the_same_key() {
        let deriver = Sha256KeyDeriver::new();
        let a = derive_cache_key(&deriver, &["https://B.com/rss", " https://a.com/rss "]);
        let b = derive_cache_key(&deriver, &["https://a.com/rss", "https://b.com/rss"]);
        assert_eq!(a, b);
    }

    #[test]
    fn different_feed_lists_derive_different_keys() {
        let deriver = Sha256KeyDeriver::new();
        let a = derive_cache_key(&deriver, &["https://a.com/rss"]);
        let b = derive_cache_key(&deriver, &["https://a.com/rss", "https://b.com/rss"]);
        assert_ne!(a, b);
    }

    #[test]
    fn hostile_inputs_cannot_escape_the_key_space() {
        let deriver = Sha256KeyDeriver::new();
        for hostile in ["../../../etc/passwd", "a\\b\\c", "key with spaces", "\u{0}"] {
            let key = derive_cache_key(&deriver, &[hostile]);
            assert_eq!(key.len(), 64);
            assert!(!key.contains('/'));
            assert!(!key.contains('\\'));
            assert!(!key.contains(' '));
        }
    }
}
