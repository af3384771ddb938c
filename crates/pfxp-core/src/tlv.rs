//! Tag/length/value payload encoding shared by every control frame.
//!
//! Layout per record: `tag: u8`, `len: u16` (big-endian), then `len` bytes
//! of value. A payload is simply records back to back with no trailing
//! terminator.

use crate::error::ProtocolError;

/// Encodes `items` as consecutive TLV records.
pub fn encode_tlvs<'a>(items: impl IntoIterator<Item = (u8, &'a [u8])>) -> Result<Vec<u8>, ProtocolError> {
    let mut out = Vec::new();
    for (tag, value) in items {
        if value.len() > u16::MAX as usize {
            return Err(ProtocolError::TlvValueTooLarge(value.len()));
        }
        out.push(tag);
        out.extend_from_slice(&(value.len() as u16).to_be_bytes());
        out.extend_from_slice(value);
    }
    Ok(out)
}

/// Decodes a flat TLV payload into a tag -> value map.
///
/// If the same tag appears more than once, the last occurrence wins,
/// matching the reference decoder this protocol was distilled from.
pub fn decode_tlvs(payload: &[u8]) -> Result<std::collections::BTreeMap<u8, &[u8]>, ProtocolError> {
    let mut out = std::collections::BTreeMap::new();
    let mut offset = 0usize;
    while offset < payload.len() {
        if offset + 3 > payload.len() {
            return Err(ProtocolError::TruncatedTlvHeader {
                remaining: payload.len() - offset,
            });
        }
        let tag = payload[offset];
        let len = u16::from_be_bytes([payload[offset + 1], payload[offset + 2]]) as usize;
        offset += 3;
        if offset + len > payload.len() {
            return Err(ProtocolError::TruncatedTlvValue {
                declared: len,
                remaining: payload.len() - offset,
            });
        }
        out.insert(tag, &payload[offset..offset + len]);
        offset += len;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_single_record() {
        let bytes = encode_tlvs([(0x01, b"hello".as_slice())]).unwrap();
        let decoded = decode_tlvs(&bytes).unwrap();
        assert_eq!(decoded.get(&0x01), Some(&b"hello".as_slice()));
    }

    #[test]
    fn round_trip_multiple_records() {
        let bytes = encode_tlvs([(0x01, b"a".as_slice()), (0x02, b"bb".as_slice()), (0x03, b"".as_slice())]).unwrap();
        let decoded = decode_tlvs(&bytes).unwrap();
        assert_eq!(decoded.len(), 3);
        assert_eq!(decoded.get(&0x02), Some(&b"bb".as_slice()));
        assert_eq!(decoded.get(&0x03), Some(&b"".as_slice()));
    }

    #[test]
    fn last_tag_wins_on_duplicate() {
        let bytes = encode_tlvs([(0x01, b"first".as_slice()), (0x01, b"second".as_slice())]).unwrap();
        let decoded = decode_tlvs(&bytes).unwrap();
        assert_eq!(decoded.get(&0x01), Some(&b"second".as_slice()));
    }

    #[test]
    fn rejects_truncated_header() {
        assert_eq!(
            decode_tlvs(&[0x01, 0x00]),
            Err(ProtocolError::TruncatedTlvHeader { remaining: 2 })
        );
    }

    #[test]
    fn rejects_truncated_value() {
        assert_eq!(
            decode_tlvs(&[0x01, 0x00, 0x05, b'h', b'i']),
            Err(ProtocolError::TruncatedTlvValue { declared: 5, remaining: 2 })
        );
    }

    proptest::proptest! {
        #[test]
        fn round_trip_arbitrary_records(tag in 0u8..=255, value in proptest::collection::vec(proptest::prelude::any::<u8>(), 0..64)) {
            let bytes = encode_tlvs([(tag, value.as_slice())]).unwrap();
            let decoded = decode_tlvs(&bytes).unwrap();
            proptest::prop_assert_eq!(decoded.get(&tag), Some(&value.as_slice()));
        }
    }
}
