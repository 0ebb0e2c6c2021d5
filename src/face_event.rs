//! FaceEventNotification encode/decode. See spec §6, §8 (scenario S9).
//!
//! Grounded on `original_source/src/mgmt/nfd/face-event-notification.cpp`'s
//! field order and all-required, in-order decode discipline (each element
//! either matches the next expected TLV-TYPE or decoding fails naming that
//! field). TLV-TYPE values here are this crate's own; the NFD management
//! TLV-TYPE registry lives in the external wire codec (spec §1).

use crate::face::{FaceId, FacePersistency, FaceScope};
use crate::tlv::{decode_varint, encode_varint, VarintDecodingError};

pub const TLV_FACE_EVENT_NOTIFICATION: u64 = 192;
const TLV_FACE_EVENT_KIND: u64 = 193;
const TLV_FACE_ID: u64 = 105;
const TLV_URI: u64 = 114;
const TLV_LOCAL_URI: u64 = 129;
const TLV_FACE_SCOPE: u64 = 132;
const TLV_FACE_PERSISTENCY: u64 = 133;
const TLV_LINK_TYPE: u64 = 147;
const TLV_FLAGS: u64 = 194;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaceEventKind {
    Created,
    Destroyed,
    Up,
    Down,
}

impl FaceEventKind {
    fn to_u64(self) -> u64 {
        match self {
            FaceEventKind::Created => 1,
            FaceEventKind::Destroyed => 2,
            FaceEventKind::Up => 3,
            FaceEventKind::Down => 4,
        }
    }

    fn from_u64(v: u64) -> Result<Self, FaceEventDecodingError> {
        match v {
            1 => Ok(FaceEventKind::Created),
            2 => Ok(FaceEventKind::Destroyed),
            3 => Ok(FaceEventKind::Up),
            4 => Ok(FaceEventKind::Down),
            _ => Err(FaceEventDecodingError::InvalidFieldValue("FaceEventKind")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkType {
    PointToPoint,
    MultiAccess,
    AdHoc,
}

impl LinkType {
    fn to_u64(self) -> u64 {
        match self {
            LinkType::PointToPoint => 0,
            LinkType::MultiAccess => 1,
            LinkType::AdHoc => 2,
        }
    }

    fn from_u64(v: u64) -> Result<Self, FaceEventDecodingError> {
        match v {
            0 => Ok(LinkType::PointToPoint),
            1 => Ok(LinkType::MultiAccess),
            2 => Ok(LinkType::AdHoc),
            _ => Err(FaceEventDecodingError::InvalidFieldValue("LinkType")),
        }
    }
}

fn face_scope_to_u64(scope: FaceScope) -> u64 {
    match scope {
        FaceScope::NonLocal => 0,
        FaceScope::Local => 1,
    }
}

fn face_scope_from_u64(v: u64) -> Result<FaceScope, FaceEventDecodingError> {
    match v {
        0 => Ok(FaceScope::NonLocal),
        1 => Ok(FaceScope::Local),
        _ => Err(FaceEventDecodingError::InvalidFieldValue("FaceScope")),
    }
}

fn face_persistency_to_u64(p: FacePersistency) -> u64 {
    match p {
        FacePersistency::Persistent => 0,
        FacePersistency::OnDemand => 1,
        FacePersistency::Permanent => 2,
    }
}

fn face_persistency_from_u64(v: u64) -> Result<FacePersistency, FaceEventDecodingError> {
    match v {
        0 => Ok(FacePersistency::Persistent),
        1 => Ok(FacePersistency::OnDemand),
        2 => Ok(FacePersistency::Permanent),
        _ => Err(FaceEventDecodingError::InvalidFieldValue("FacePersistency")),
    }
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum FaceEventDecodingError {
    #[error("missing required {0} field")]
    MissingField(&'static str),
    #[error("invalid value for {0} field")]
    InvalidFieldValue(&'static str),
    #[error("truncated varint")]
    TruncatedVarint,
    #[error("unexpected outer TLV-TYPE")]
    WrongOuterType,
}

impl From<VarintDecodingError> for FaceEventDecodingError {
    fn from(_: VarintDecodingError) -> Self {
        FaceEventDecodingError::TruncatedVarint
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FaceEventNotification {
    pub kind: FaceEventKind,
    pub face_id: FaceId,
    pub remote_uri: String,
    pub local_uri: String,
    pub face_scope: FaceScope,
    pub face_persistency: FacePersistency,
    pub link_type: LinkType,
    pub flags: u64,
}

fn write_number(out: &mut Vec<u8>, typ: u64, value: u64) {
    encode_varint(typ, out);
    let mut body = Vec::new();
    encode_varint(value, &mut body);
    encode_varint(body.len() as u64, out);
    out.extend_from_slice(&body);
}

fn write_bytes(out: &mut Vec<u8>, typ: u64, value: &[u8]) {
    encode_varint(typ, out);
    encode_varint(value.len() as u64, out);
    out.extend_from_slice(value);
}

/// Reads one `(type, length, value)` element from `input` at `*pos`,
/// requiring `type == expected` and advancing `*pos` past it.
fn read_element<'a>(
    input: &'a [u8],
    pos: &mut usize,
    expected: u64,
    name: &'static str,
) -> Result<&'a [u8], FaceEventDecodingError> {
    let (typ, typ_len) = decode_varint(&input[*pos..]).map_err(|_| FaceEventDecodingError::MissingField(name))?;
    if typ != expected {
        return Err(FaceEventDecodingError::MissingField(name));
    }
    let (len, len_len) = decode_varint(&input[*pos + typ_len..]).map_err(|_| FaceEventDecodingError::MissingField(name))?;
    let value_start = *pos + typ_len + len_len;
    let value_end = value_start
        .checked_add(len as usize)
        .ok_or(FaceEventDecodingError::MissingField(name))?;
    let value = input.get(value_start..value_end).ok_or(FaceEventDecodingError::MissingField(name))?;
    *pos = value_end;
    Ok(value)
}

fn read_number(input: &[u8], pos: &mut usize, expected: u64, name: &'static str) -> Result<u64, FaceEventDecodingError> {
    let bytes = read_element(input, pos, expected, name)?;
    let (v, consumed) = decode_varint(bytes).map_err(|_| FaceEventDecodingError::MissingField(name))?;
    if consumed != bytes.len() {
        return Err(FaceEventDecodingError::InvalidFieldValue(name));
    }
    Ok(v)
}

impl FaceEventNotification {
    pub fn encode(&self) -> Vec<u8> {
        let mut body = Vec::new();
        write_number(&mut body, TLV_FACE_EVENT_KIND, self.kind.to_u64());
        write_number(&mut body, TLV_FACE_ID, self.face_id.value());
        write_bytes(&mut body, TLV_URI, self.remote_uri.as_bytes());
        write_bytes(&mut body, TLV_LOCAL_URI, self.local_uri.as_bytes());
        write_number(&mut body, TLV_FACE_SCOPE, face_scope_to_u64(self.face_scope));
        write_number(&mut body, TLV_FACE_PERSISTENCY, face_persistency_to_u64(self.face_persistency));
        write_number(&mut body, TLV_LINK_TYPE, self.link_type.to_u64());
        write_number(&mut body, TLV_FLAGS, self.flags);

        let mut out = Vec::new();
        encode_varint(TLV_FACE_EVENT_NOTIFICATION, &mut out);
        encode_varint(body.len() as u64, &mut out);
        out.extend_from_slice(&body);
        out
    }

    pub fn decode(input: &[u8]) -> Result<Self, FaceEventDecodingError> {
        let mut pos = 0;
        let (outer_type, outer_type_len) = decode_varint(input)?;
        if outer_type != TLV_FACE_EVENT_NOTIFICATION {
            return Err(FaceEventDecodingError::WrongOuterType);
        }
        pos += outer_type_len;
        let (outer_len, outer_len_len) = decode_varint(&input[pos..])?;
        pos += outer_len_len;
        let body_end = pos
            .checked_add(outer_len as usize)
            .ok_or(FaceEventDecodingError::TruncatedVarint)?;
        let body = input.get(pos..body_end).ok_or(FaceEventDecodingError::TruncatedVarint)?;

        let mut p = 0;
        let kind = FaceEventKind::from_u64(read_number(body, &mut p, TLV_FACE_EVENT_KIND, "FaceEventKind")?)?;
        let face_id = FaceId::new(read_number(body, &mut p, TLV_FACE_ID, "FaceId")?);
        let remote_uri = String::from_utf8(read_element(body, &mut p, TLV_URI, "Uri")?.to_vec())
            .map_err(|_| FaceEventDecodingError::InvalidFieldValue("Uri"))?;
        let local_uri = String::from_utf8(read_element(body, &mut p, TLV_LOCAL_URI, "LocalUri")?.to_vec())
            .map_err(|_| FaceEventDecodingError::InvalidFieldValue("LocalUri"))?;
        let face_scope = face_scope_from_u64(read_number(body, &mut p, TLV_FACE_SCOPE, "FaceScope")?)?;
        let face_persistency =
            face_persistency_from_u64(read_number(body, &mut p, TLV_FACE_PERSISTENCY, "FacePersistency")?)?;
        let link_type = LinkType::from_u64(read_number(body, &mut p, TLV_LINK_TYPE, "LinkType")?)?;
        let flags = read_number(body, &mut p, TLV_FLAGS, "Flags")?;

        Ok(FaceEventNotification {
            kind,
            face_id,
            remote_uri,
            local_uri,
            face_scope,
            face_persistency,
            link_type,
            flags,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FaceEventNotification {
        FaceEventNotification {
            kind: FaceEventKind::Created,
            face_id: FaceId::new(300),
            remote_uri: "udp4://198.51.100.1:6363".into(),
            local_uri: "udp4://192.0.2.1:6363".into(),
            face_scope: FaceScope::NonLocal,
            face_persistency: FacePersistency::Persistent,
            link_type: LinkType::PointToPoint,
            flags: 0,
        }
    }

    #[test]
    fn round_trips() {
        let n = sample();
        let encoded = n.encode();
        let decoded = FaceEventNotification::decode(&encoded).unwrap();
        assert_eq!(n, decoded);
    }

    #[test]
    fn s9_truncation_after_face_scope_names_face_persistency() {
        let n = sample();
        let encoded = n.encode();

        // Find where FacePersistency's element starts by decoding up to
        // (and including) FaceScope, then truncate there.
        let mut pos = 0;
        let (_, l1) = decode_varint(&encoded).unwrap();
        pos += l1;
        let (outer_len, l2) = decode_varint(&encoded[pos..]).unwrap();
        pos += l2;
        let body = &encoded[pos..pos + outer_len as usize];

        let mut p = 0;
        for expected in [TLV_FACE_EVENT_KIND, TLV_FACE_ID, TLV_URI, TLV_LOCAL_URI, TLV_FACE_SCOPE] {
            read_element(body, &mut p, expected, "field").unwrap();
        }
        let truncated_body = &body[..p];

        let mut truncated = Vec::new();
        encode_varint(TLV_FACE_EVENT_NOTIFICATION, &mut truncated);
        encode_varint(truncated_body.len() as u64, &mut truncated);
        truncated.extend_from_slice(truncated_body);

        assert_eq!(
            FaceEventNotification::decode(&truncated),
            Err(FaceEventDecodingError::MissingField("FacePersistency"))
        );
    }

    #[test]
    fn wrong_outer_type_is_rejected() {
        let mut bogus = Vec::new();
        encode_varint(1, &mut bogus);
        encode_varint(0, &mut bogus);
        assert_eq!(
            FaceEventNotification::decode(&bogus),
            Err(FaceEventDecodingError::WrongOuterType)
        );
    }
}
