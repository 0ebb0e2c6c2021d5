//! Canonical hierarchical names. See spec §3.
//!
//! The teacher (`fidinda-reto/src/name.rs`) represents `Name` as a
//! zero-copy, lifetime-tied chain of slices into the original packet
//! buffer. The forwarding core's tables need names that outlive any single
//! packet -- NameTree/FIB/PIT/Measurements entries are long-lived -- so
//! components are owned here instead, while keeping the teacher's
//! component typing and TLV-varint framing.

use std::fmt;

use crate::error::NameError;
use crate::tlv::{encode_varint, varint_encoded_length};

/// Implementations must support names at least this deep (spec §4.1).
pub const IMPLEMENTATION_LIMIT_COMPONENTS: usize = 64;

const NAME_COMPONENT_TYPE_GENERIC: u16 = 8;
const NAME_COMPONENT_TYPE_IMPLICIT_SHA256: u16 = 1;
const NAME_COMPONENT_TYPE_PARAMETER_SHA256: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameComponentType {
    Generic,
    ImplicitSha256Digest,
    ParameterSha256Digest,
    Other(u16),
}

impl From<u16> for NameComponentType {
    fn from(value: u16) -> Self {
        match value {
            NAME_COMPONENT_TYPE_GENERIC => NameComponentType::Generic,
            NAME_COMPONENT_TYPE_IMPLICIT_SHA256 => NameComponentType::ImplicitSha256Digest,
            NAME_COMPONENT_TYPE_PARAMETER_SHA256 => NameComponentType::ParameterSha256Digest,
            other => NameComponentType::Other(other),
        }
    }
}

impl From<NameComponentType> for u16 {
    fn from(value: NameComponentType) -> Self {
        match value {
            NameComponentType::Generic => NAME_COMPONENT_TYPE_GENERIC,
            NameComponentType::ImplicitSha256Digest => NAME_COMPONENT_TYPE_IMPLICIT_SHA256,
            NameComponentType::ParameterSha256Digest => NAME_COMPONENT_TYPE_PARAMETER_SHA256,
            NameComponentType::Other(v) => v,
        }
    }
}

/// One opaque, typed name component. Ordering is first by type, then by
/// byte content -- this matches NDN's canonical component ordering.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct NameComponent {
    typ: u16,
    bytes: Vec<u8>,
}

impl NameComponent {
    pub fn new(typ: NameComponentType, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            typ: typ.into(),
            bytes: bytes.into(),
        }
    }

    pub fn generic(bytes: impl Into<Vec<u8>>) -> Self {
        Self::new(NameComponentType::Generic, bytes)
    }

    pub fn component_type(&self) -> NameComponentType {
        self.typ.into()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn encoded_length(&self) -> usize {
        varint_encoded_length(self.typ as u64)
            + varint_encoded_length(self.bytes.len() as u64)
            + self.bytes.len()
    }

    fn encode(&self, out: &mut Vec<u8>) {
        encode_varint(self.typ as u64, out);
        encode_varint(self.bytes.len() as u64, out);
        out.extend_from_slice(&self.bytes);
    }

    /// NDN URI-form rendering of one component: printable ASCII and a
    /// handful of reserved characters pass through, everything else is
    /// percent-encoded. A non-Generic type is prefixed as `type=`.
    fn write_uri(&self, out: &mut String) {
        if !matches!(self.component_type(), NameComponentType::Generic) {
            out.push_str(&u16::from(self.component_type()).to_string());
            out.push('=');
        }
        for &b in &self.bytes {
            let is_unreserved = b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~');
            if is_unreserved {
                out.push(b as char);
            } else {
                out.push('%');
                out.push_str(&format!("{:02X}", b));
            }
        }
    }
}

/// Owned, hierarchical NDN name: an ordered sequence of opaque components.
/// Equality and ordering are componentwise; the empty name is the root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Name {
    components: Vec<NameComponent>,
}

impl Name {
    pub fn root() -> Self {
        Name {
            components: Vec::new(),
        }
    }

    pub fn from_components(
        components: Vec<NameComponent>,
    ) -> Result<Self, NameError> {
        if components.len() > IMPLEMENTATION_LIMIT_COMPONENTS {
            return Err(NameError::NameTooLong {
                found: components.len(),
                limit: IMPLEMENTATION_LIMIT_COMPONENTS,
            });
        }
        Ok(Name { components })
    }

    /// Parses an NDN URI-form name such as `/a/b/c`. Percent-encoded bytes
    /// are decoded; a leading `ndn:` scheme, if present, is stripped.
    pub fn parse_uri(uri: &str) -> Result<Self, NameError> {
        let uri = uri.strip_prefix("ndn:").unwrap_or(uri);
        let uri = uri.strip_prefix('/').unwrap_or(uri);
        if uri.is_empty() {
            return Ok(Name::root());
        }
        let mut components = Vec::new();
        for part in uri.split('/') {
            components.push(Self::parse_uri_component(part)?);
        }
        Self::from_components(components)
    }

    fn parse_uri_component(part: &str) -> Result<NameComponent, NameError> {
        let (typ, rest) = match part.split_once('=') {
            Some((t, r)) if t.chars().all(|c| c.is_ascii_digit()) && !t.is_empty() => {
                (t.parse::<u16>().map_err(|_| NameError::MalformedComponent)?, r)
            }
            _ => (NAME_COMPONENT_TYPE_GENERIC, part),
        };
        let mut bytes = Vec::with_capacity(rest.len());
        let mut chars = rest.bytes();
        while let Some(b) = chars.next() {
            if b == b'%' {
                let hi = chars.next().ok_or(NameError::MalformedComponent)?;
                let lo = chars.next().ok_or(NameError::MalformedComponent)?;
                let hex = [hi, lo];
                let hex = std::str::from_utf8(&hex).map_err(|_| NameError::MalformedComponent)?;
                let byte = u8::from_str_radix(hex, 16).map_err(|_| NameError::MalformedComponent)?;
                bytes.push(byte);
            } else {
                bytes.push(b);
            }
        }
        Ok(NameComponent::new(typ.into(), bytes))
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[NameComponent] {
        &self.components
    }

    pub fn get(&self, index: usize) -> Option<&NameComponent> {
        self.components.get(index)
    }

    /// Returns this name with its last component removed, or `None` if this
    /// is already the root.
    pub fn parent(&self) -> Option<Name> {
        if self.components.is_empty() {
            return None;
        }
        Some(Name {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }

    /// Returns every ancestor from the immediate parent up to (and
    /// including) the root, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = Name> + '_ {
        (0..self.components.len()).rev().map(move |n| Name {
            components: self.components[..n].to_vec(),
        })
    }

    pub fn with_component(&self, component: NameComponent) -> Result<Name, NameError> {
        let mut components = self.components.clone();
        components.push(component);
        Self::from_components(components)
    }

    /// `self.is_prefix_of(other)` iff `|self| <= |other|` and the first
    /// `|self|` components are componentwise equal.
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        self.components.len() <= other.components.len()
            && self
                .components
                .iter()
                .zip(other.components.iter())
                .all(|(a, b)| a == b)
    }

    pub fn to_uri(&self) -> String {
        if self.components.is_empty() {
            return "/".to_string();
        }
        let mut out = String::new();
        for c in &self.components {
            out.push('/');
            c.write_uri(&mut out);
        }
        out
    }

    /// Canonical byte key used by NameTree's hash table: the concatenation
    /// of each component's TLV framing, i.e. the wire encoding of the Name
    /// value (without the outer Name TLV type/length).
    pub fn canonical_key(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.encoded_component_length());
        for c in &self.components {
            c.encode(&mut out);
        }
        out
    }

    fn encoded_component_length(&self) -> usize {
        self.components.iter().map(|c| c.encoded_length()).sum()
    }
}

impl PartialOrd for Name {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Name {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.components.cmp(&other.components)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_uri())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uri_round_trips() {
        let n = Name::parse_uri("/a/b/c").unwrap();
        assert_eq!(n.to_uri(), "/a/b/c");
        assert_eq!(n.len(), 3);
    }

    #[test]
    fn root_uri_is_slash() {
        assert_eq!(Name::root().to_uri(), "/");
        assert_eq!(Name::parse_uri("/").unwrap(), Name::root());
    }

    #[test]
    fn prefix_relation() {
        let a = Name::parse_uri("/a").unwrap();
        let ab = Name::parse_uri("/a/b").unwrap();
        assert!(a.is_prefix_of(&ab));
        assert!(!ab.is_prefix_of(&a));
        assert!(a.is_prefix_of(&a));
    }

    #[test]
    fn ordering_is_componentwise() {
        let a = Name::parse_uri("/a").unwrap();
        let b = Name::parse_uri("/b").unwrap();
        let ac = Name::parse_uri("/a/c").unwrap();
        assert!(a < b);
        assert!(a < ac);
    }

    #[test]
    fn percent_encoding_round_trips() {
        let n = Name::from_components(vec![NameComponent::generic(vec![0x00, 0x20, b'a'])]).unwrap();
        let uri = n.to_uri();
        let parsed = Name::parse_uri(&uri).unwrap();
        assert_eq!(n, parsed);
    }

    #[test]
    fn name_too_long_is_rejected() {
        let components = (0..IMPLEMENTATION_LIMIT_COMPONENTS + 1)
            .map(|i| NameComponent::generic(i.to_string().into_bytes()))
            .collect();
        assert!(matches!(
            Name::from_components(components),
            Err(NameError::NameTooLong { .. })
        ));
    }

    #[test]
    fn ancestors_are_nearest_first() {
        let n = Name::parse_uri("/a/b/c").unwrap();
        let ancestors: Vec<_> = n.ancestors().map(|a| a.to_uri()).collect();
        assert_eq!(ancestors, vec!["/a/b", "/a", "/"]);
    }
}
