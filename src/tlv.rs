//! Minimal NDN TLV varint helpers.
//!
//! Full packet decoding lives in the external wire codec the core consumes
//! (spec §1); this module only carries the bits `Name` and
//! `FaceEventNotification` need to size and write themselves out.

/// Encodes `value` as an NDN TLV non-negative-integer varint (1, 2, 4, or 8
/// bytes, minimal encoding) and appends it to `out`.
pub fn encode_varint(value: u64, out: &mut Vec<u8>) {
    if value < 253 {
        out.push(value as u8);
    } else if value <= u16::MAX as u64 {
        out.push(253);
        out.extend_from_slice(&(value as u16).to_be_bytes());
    } else if value <= u32::MAX as u64 {
        out.push(254);
        out.extend_from_slice(&(value as u32).to_be_bytes());
    } else {
        out.push(255);
        out.extend_from_slice(&value.to_be_bytes());
    }
}

pub fn varint_encoded_length(value: u64) -> usize {
    if value < 253 {
        1
    } else if value <= u16::MAX as u64 {
        3
    } else if value <= u32::MAX as u64 {
        5
    } else {
        9
    }
}

#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
pub enum VarintDecodingError {
    #[error("buffer too short to decode varint")]
    BufferTooShort,
    #[error("non-minimal varint encoding")]
    NonMinimalEncoding,
}

/// Decodes a varint from the front of `input`, returning the value and the
/// number of bytes consumed.
pub fn decode_varint(input: &[u8]) -> Result<(u64, usize), VarintDecodingError> {
    let marker = *input.first().ok_or(VarintDecodingError::BufferTooShort)?;
    match marker {
        0..=252 => Ok((marker as u64, 1)),
        253 => {
            let bytes = input
                .get(1..3)
                .ok_or(VarintDecodingError::BufferTooShort)?;
            let v = u16::from_be_bytes(bytes.try_into().unwrap());
            if v < 253 {
                return Err(VarintDecodingError::NonMinimalEncoding);
            }
            Ok((v as u64, 3))
        }
        254 => {
            let bytes = input
                .get(1..5)
                .ok_or(VarintDecodingError::BufferTooShort)?;
            let v = u32::from_be_bytes(bytes.try_into().unwrap());
            if v <= u16::MAX as u32 {
                return Err(VarintDecodingError::NonMinimalEncoding);
            }
            Ok((v as u64, 5))
        }
        255 => {
            let bytes = input
                .get(1..9)
                .ok_or(VarintDecodingError::BufferTooShort)?;
            let v = u64::from_be_bytes(bytes.try_into().unwrap());
            if v <= u32::MAX as u64 {
                return Err(VarintDecodingError::NonMinimalEncoding);
            }
            Ok((v as u64, 9))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn varint_round_trips() {
        for v in [0u64, 1, 252, 253, 300, 65535, 65536, u32::MAX as u64, u32::MAX as u64 + 1, u64::MAX] {
            let mut out = Vec::new();
            encode_varint(v, &mut out);
            assert_eq!(out.len(), varint_encoded_length(v));
            let (decoded, consumed) = decode_varint(&out).unwrap();
            assert_eq!(decoded, v);
            assert_eq!(consumed, out.len());
        }
    }

    #[test]
    fn rejects_non_minimal_encoding() {
        let buf = [253u8, 0, 5];
        assert_eq!(
            decode_varint(&buf),
            Err(VarintDecodingError::NonMinimalEncoding)
        );
    }
}
