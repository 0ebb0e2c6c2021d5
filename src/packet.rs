//! The decoded shape of Interest and Data packets the core operates on.
//! See spec §3, §6.
//!
//! Full wire decoding (TLV parsing, signature fields) is the external
//! codec's job (spec §1); this mirrors the subset of
//! `fidinda-reto/src/packet.rs`'s `Interest`/`Data` structs the forwarding
//! core actually touches, made owned so packets can sit in the PIT past
//! the lifetime of the socket buffer they arrived in.

use sha2::{Digest as _, Sha256};

use crate::name::Name;

/// Selectors narrow which Data packets satisfy an Interest. The forwarding
/// core only needs enough of these to implement `matches_data` (spec
/// §4.3); full selector semantics (exclude filters, child selector, publisher
/// key locator) live in the codec/application layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selectors {
    pub min_suffix_components: Option<u32>,
    pub max_suffix_components: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interest {
    pub name: Name,
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
    pub selectors: Selectors,
    pub nonce: [u8; 4],
    /// Milliseconds; clamped per spec §5 (default 4s, max 120s) by the
    /// forwarder before being used as a PIT lifetime.
    pub interest_lifetime_ms: Option<u64>,
    pub hop_limit: Option<u8>,
}

impl Interest {
    /// `digest = SHA-256(TLV-encoded Name || TLV-encoded Selectors)`
    /// (spec §6). Selectors are approximated here by their structural
    /// fields, since full TLV selector encoding is the codec's concern.
    pub fn digest(&self) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(self.name.canonical_key());
        if let Some(v) = self.selectors.min_suffix_components {
            hasher.update(b"min");
            hasher.update(v.to_be_bytes());
        }
        if let Some(v) = self.selectors.max_suffix_components {
            hasher.update(b"max");
            hasher.update(v.to_be_bytes());
        }
        hasher.finalize().into()
    }

    /// An Interest's name must be a prefix of the Data's name, and the
    /// Data must satisfy the Interest's selectors (spec §4.3).
    pub fn matches_data(&self, data: &Data) -> bool {
        if !self.name.is_prefix_of(&data.name) {
            return false;
        }
        if let Some(min) = self.selectors.min_suffix_components {
            let suffix_len = (data.name.len() - self.name.len()) as u32;
            if suffix_len < min {
                return false;
            }
        }
        if let Some(max) = self.selectors.max_suffix_components {
            let suffix_len = (data.name.len() - self.name.len()) as u32;
            if suffix_len > max {
                return false;
            }
        }
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Data {
    pub name: Name,
    pub content: Vec<u8>,
    pub freshness_period_ms: Option<u64>,
    /// The `InterestDigestTag` the Data carries, identifying the PIT entry
    /// it satisfies (spec §4.3). `None` when the codec could not locate or
    /// compute the tag -- the forwarder logs a warning and treats the Data
    /// as matching nothing.
    pub interest_digest_tag: Option<[u8; 32]>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn interest(uri: &str) -> Interest {
        Interest {
            name: Name::parse_uri(uri).unwrap(),
            can_be_prefix: false,
            must_be_fresh: false,
            selectors: Selectors::default(),
            nonce: [1, 2, 3, 4],
            interest_lifetime_ms: None,
            hop_limit: None,
        }
    }

    #[test]
    fn digest_is_stable_for_same_inputs() {
        let i1 = interest("/a/b");
        let i2 = interest("/a/b");
        assert_eq!(i1.digest(), i2.digest());
    }

    #[test]
    fn digest_differs_by_name() {
        assert_ne!(interest("/a/b").digest(), interest("/a/c").digest());
    }

    #[test]
    fn matches_data_requires_prefix() {
        let i = interest("/a/b");
        let matching = Data {
            name: Name::parse_uri("/a/b/c").unwrap(),
            content: vec![],
            freshness_period_ms: None,
            interest_digest_tag: Some(i.digest()),
        };
        assert!(i.matches_data(&matching));

        let non_matching = Data {
            name: Name::parse_uri("/a/x").unwrap(),
            ..matching
        };
        assert!(!i.matches_data(&non_matching));
    }
}
