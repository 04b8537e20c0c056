//! Deterministic session identifiers derived from page URLs.
//!
//! The local id of a session is a 32-character lowercase hex digest of its
//! URL. It is used for map lookup and for finding the existing session of a
//! page the user revisits. It is *not* the remote primary key (see
//! [`Session::key`](crate::session::Session::key)).

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Length of every resolved id, in hex characters.
pub const ID_LENGTH: usize = 32;

/// Hash used by [`IdentityResolver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashAlgorithm {
    /// SHA-256 truncated to 128 bits.
    #[default]
    Sha256,
    /// Two seeded 64-bit FNV-1a passes.
    ///
    /// Reproducible across platforms but NOT collision resistant against
    /// adversarial input. Only meant for hosts where SHA-256 is unavailable.
    Fallback,
}

/// Maps a URL to its stable local session id.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver {
    algorithm: HashAlgorithm,
}

impl IdentityResolver {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Resolves `url` to a 32-character lowercase hex id.
    ///
    /// Pure and deterministic: the same input always yields the same id.
    pub fn resolve(&self, url: &str) -> String {
        match self.algorithm {
            HashAlgorithm::Sha256 => sha256_id(url),
            HashAlgorithm::Fallback => fallback_id(url),
        }
    }
}

fn sha256_id(url: &str) -> String {
    let digest = Sha256::digest(url.as_bytes());
    hex::encode(&digest[..ID_LENGTH / 2])
}

const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

fn fnv1a(seed: u64, bytes: &[u8]) -> u64 {
    bytes.iter().fold(FNV_OFFSET ^ seed, |hash, byte| {
        (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

fn fallback_id(url: &str) -> String {
    let bytes = url.as_bytes();
    let high = fnv1a(0, bytes);
    // Second pass is seeded with the length so prefixes diverge early.
    let low = fnv1a(0x9e37_79b9_7f4a_7c15 ^ bytes.len() as u64, bytes);
    format!("{high:016x}{low:016x}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn is_lower_hex(id: &str) -> bool {
        id.chars()
            .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
    }

    #[test]
    fn resolve_is_deterministic_and_fixed_length() {
        for algorithm in [HashAlgorithm::Sha256, HashAlgorithm::Fallback] {
            let resolver = IdentityResolver::new(algorithm);
            let a = resolver.resolve("https://example.com/docs?page=1");
            let b = resolver.resolve("https://example.com/docs?page=1");
            assert_eq!(a, b);
            assert_eq!(a.len(), ID_LENGTH);
            assert!(is_lower_hex(&a), "{a} is not lowercase hex");
        }
    }

    #[test]
    fn sha256_matches_known_digest_prefix() {
        let resolver = IdentityResolver::default();
        // sha256("") = e3b0c442 98fc1c14 9afbf4c8 996fb924 ...
        assert_eq!(resolver.resolve(""), "e3b0c44298fc1c149afbf4c8996fb924");
    }

    #[test]
    fn no_collisions_across_ten_thousand_urls() {
        for algorithm in [HashAlgorithm::Sha256, HashAlgorithm::Fallback] {
            let resolver = IdentityResolver::new(algorithm);
            let ids: HashSet<String> = (0..10_000)
                .map(|i| resolver.resolve(&format!("https://site{}.test/page/{}", i % 97, i)))
                .collect();
            assert_eq!(ids.len(), 10_000, "collision with {algorithm:?}");
        }
    }

    #[test]
    fn single_character_difference_changes_id() {
        let resolver = IdentityResolver::default();
        assert_ne!(
            resolver.resolve("https://a.test"),
            resolver.resolve("https://b.test")
        );
        let fallback = IdentityResolver::new(HashAlgorithm::Fallback);
        assert_ne!(
            fallback.resolve("https://a.test"),
            fallback.resolve("https://b.test")
        );
    }
}
