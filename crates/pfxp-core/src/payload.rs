//! Payload builders and parsers for every frame type's TLV body.
//!
//! Tag numbers and field widths mirror the reference protocol exactly;
//! see each function for the tags it produces or expects.

use std::path::Path;

use crate::error::ProtocolError;
use crate::tlv::{decode_tlvs, encode_tlvs};

/// Transfer parameters exchanged in the OFFER frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Offer {
    pub filename: String,
    pub file_size: u64,
    pub chunk_size: u16,
    pub total_chunks: u32,
    pub hash_algorithm: String,
    pub hash_digest: Vec<u8>,
}

/// Rejects anything but a bare, non-empty file name: no `.`/`..`, no
/// directory separators, no absolute paths. Stricter than a plain
/// `Path::file_name()` extraction, since a malicious OFFER could otherwise
/// smuggle a path that escapes the destination directory.
pub fn sanitize_filename(raw: &str) -> Result<String, ProtocolError> {
    let name = Path::new(raw)
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("");

    if name.is_empty() || name == "." || name == ".." || name.contains('/') || name.contains('\\') {
        return Err(ProtocolError::UnsafeFilename(raw.to_string()));
    }
    Ok(name.to_string())
}

fn utf8(bytes: &[u8]) -> Result<String, ProtocolError> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|_| ProtocolError::InvalidUtf8)
}

fn get<'a>(
    tlvs: &std::collections::BTreeMap<u8, &'a [u8]>,
    tag: u8,
) -> Result<&'a [u8], ProtocolError> {
    tlvs.get(&tag).copied().ok_or(ProtocolError::MissingTag(tag))
}

// --- HELLO ---------------------------------------------------------------

const HELLO_TAG_CLIENT: u8 = 0x01;
const HELLO_TAG_CLIENT_VERSION: u8 = 0x02;
const HELLO_TAG_MAX_DATAGRAM: u8 = 0x03;
const HELLO_TAG_HASH_ALGO: u8 = 0x04;

pub fn build_hello_payload(max_datagram_size: u16) -> Vec<u8> {
    encode_tlvs([
        (HELLO_TAG_CLIENT, b"pfxp".as_slice()),
        (HELLO_TAG_CLIENT_VERSION, env!("CARGO_PKG_VERSION").as_bytes()),
        (HELLO_TAG_MAX_DATAGRAM, &max_datagram_size.to_be_bytes()),
        (HELLO_TAG_HASH_ALGO, b"sha256".as_slice()),
    ])
    .expect("hello payload fields are always within TLV size limits")
}

/// Returns the peer's advertised max datagram size, the only field the
/// sender side needs to act on.
pub fn parse_hello_payload(payload: &[u8]) -> Result<u16, ProtocolError> {
    let tlvs = decode_tlvs(payload)?;
    let raw = get(&tlvs, HELLO_TAG_MAX_DATAGRAM)?;
    if raw.len() != 2 {
        return Err(ProtocolError::MalformedField(HELLO_TAG_MAX_DATAGRAM));
    }
    Ok(u16::from_be_bytes([raw[0], raw[1]]))
}

// --- OFFER -----------------------------------------------------------------

const OFFER_TAG_FILENAME: u8 = 0x01;
const OFFER_TAG_FILE_SIZE: u8 = 0x02;
const OFFER_TAG_CHUNK_SIZE: u8 = 0x03;
const OFFER_TAG_TOTAL_CHUNKS: u8 = 0x04;
const OFFER_TAG_HASH_ALGO: u8 = 0x05;
const OFFER_TAG_HASH_DIGEST: u8 = 0x06;

pub fn build_offer_payload(offer: &Offer) -> Result<Vec<u8>, ProtocolError> {
    encode_tlvs([
        (OFFER_TAG_FILENAME, offer.filename.as_bytes()),
        (OFFER_TAG_FILE_SIZE, offer.file_size.to_be_bytes().as_slice()),
        (OFFER_TAG_CHUNK_SIZE, offer.chunk_size.to_be_bytes().as_slice()),
        (OFFER_TAG_TOTAL_CHUNKS, offer.total_chunks.to_be_bytes().as_slice()),
        (OFFER_TAG_HASH_ALGO, offer.hash_algorithm.as_bytes()),
        (OFFER_TAG_HASH_DIGEST, offer.hash_digest.as_slice()),
    ])
}

pub fn parse_offer_payload(payload: &[u8]) -> Result<Offer, ProtocolError> {
    let tlvs = decode_tlvs(payload)?;

    let filename_raw = utf8(get(&tlvs, OFFER_TAG_FILENAME)?)?;
    let filename = sanitize_filename(&filename_raw)?;

    let file_size_raw = get(&tlvs, OFFER_TAG_FILE_SIZE)?;
    let file_size = file_size_raw
        .try_into()
        .map(u64::from_be_bytes)
        .map_err(|_| ProtocolError::MalformedField(OFFER_TAG_FILE_SIZE))?;

    let chunk_size_raw = get(&tlvs, OFFER_TAG_CHUNK_SIZE)?;
    let chunk_size = chunk_size_raw
        .try_into()
        .map(u16::from_be_bytes)
        .map_err(|_| ProtocolError::MalformedField(OFFER_TAG_CHUNK_SIZE))?;

    let total_chunks_raw = get(&tlvs, OFFER_TAG_TOTAL_CHUNKS)?;
    let total_chunks = total_chunks_raw
        .try_into()
        .map(u32::from_be_bytes)
        .map_err(|_| ProtocolError::MalformedField(OFFER_TAG_TOTAL_CHUNKS))?;

    let hash_algorithm = utf8(get(&tlvs, OFFER_TAG_HASH_ALGO)?)?;
    let hash_digest = get(&tlvs, OFFER_TAG_HASH_DIGEST)?.to_vec();

    Ok(Offer {
        filename,
        file_size,
        chunk_size,
        total_chunks,
        hash_algorithm,
        hash_digest,
    })
}

// --- ACCEPT / REJECT ---------------------------------------------------------

const ACCEPT_TAG_DECISION: u8 = 0x01;
const ACCEPT_TAG_REASON: u8 = 0x02;

pub fn build_accept_payload(accepted: bool, reason: &str) -> Result<Vec<u8>, ProtocolError> {
    let decision = [if accepted { 1u8 } else { 0u8 }];
    if reason.is_empty() {
        encode_tlvs([(ACCEPT_TAG_DECISION, decision.as_slice())])
    } else {
        encode_tlvs([
            (ACCEPT_TAG_DECISION, decision.as_slice()),
            (ACCEPT_TAG_REASON, reason.as_bytes()),
        ])
    }
}

pub fn parse_accept_payload(payload: &[u8]) -> Result<(bool, String), ProtocolError> {
    let tlvs = decode_tlvs(payload)?;
    let decision = get(&tlvs, ACCEPT_TAG_DECISION)?;
    if decision.len() != 1 {
        return Err(ProtocolError::MalformedField(ACCEPT_TAG_DECISION));
    }
    let accepted = decision[0] == 1;
    let reason = tlvs
        .get(&ACCEPT_TAG_REASON)
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        .unwrap_or_default();
    Ok((accepted, reason))
}

// --- DATA --------------------------------------------------------------------

/// `DATA` carries a 4-byte big-endian offset prefix (the low 32 bits of
/// `seq * chunk_size`) followed by the raw chunk bytes. The offset is
/// advisory: the receiver always derives the authoritative write offset
/// from `seq * chunk_size` itself, so wraparound here is harmless.
pub fn build_data_payload(seq: u32, chunk_size: u16, chunk: &[u8]) -> Vec<u8> {
    let offset_low32 = (seq as u64).wrapping_mul(chunk_size as u64) as u32;
    let mut out = Vec::with_capacity(4 + chunk.len());
    out.extend_from_slice(&offset_low32.to_be_bytes());
    out.extend_from_slice(chunk);
    out
}

pub fn parse_data_payload(payload: &[u8]) -> Result<(u32, &[u8]), ProtocolError> {
    if payload.len() < 4 {
        return Err(ProtocolError::DataPayloadTooShort);
    }
    let offset_low32 = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
    Ok((offset_low32, &payload[4..]))
}

// --- ACK ranges ----------------------------------------------------------

pub fn build_ranges_payload(ranges: &[(u32, u32)]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + ranges.len() * 8);
    out.extend_from_slice(&(ranges.len() as u16).to_be_bytes());
    for (start, end) in ranges {
        out.extend_from_slice(&start.to_be_bytes());
        out.extend_from_slice(&end.to_be_bytes());
    }
    out
}

pub fn parse_ranges_payload(payload: &[u8]) -> Result<Vec<(u32, u32)>, ProtocolError> {
    if payload.len() < 2 {
        return Err(ProtocolError::MalformedRanges);
    }
    let count = u16::from_be_bytes([payload[0], payload[1]]) as usize;
    let expected = 2 + count * 8;
    if payload.len() != expected {
        return Err(ProtocolError::MalformedRanges);
    }
    let mut out = Vec::with_capacity(count);
    let mut offset = 2;
    for _ in 0..count {
        let start = u32::from_be_bytes(payload[offset..offset + 4].try_into().unwrap());
        let end = u32::from_be_bytes(payload[offset + 4..offset + 8].try_into().unwrap());
        offset += 8;
        out.push((start, end));
    }
    Ok(out)
}

// --- FIN / FIN_ACK ---------------------------------------------------------

const FIN_TAG_LAST_SEQ: u8 = 0x01;
const FIN_TAG_DIGEST: u8 = 0x02;

pub fn build_fin_payload(last_seq: u32, digest: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    encode_tlvs([
        (FIN_TAG_LAST_SEQ, last_seq.to_be_bytes().as_slice()),
        (FIN_TAG_DIGEST, digest),
    ])
}

pub fn parse_fin_payload(payload: &[u8]) -> Result<(u32, Vec<u8>), ProtocolError> {
    let tlvs = decode_tlvs(payload)?;
    let last_seq_raw = get(&tlvs, FIN_TAG_LAST_SEQ)?;
    if last_seq_raw.len() != 4 {
        return Err(ProtocolError::MalformedField(FIN_TAG_LAST_SEQ));
    }
    let last_seq = u32::from_be_bytes(last_seq_raw.try_into().unwrap());
    let digest = get(&tlvs, FIN_TAG_DIGEST)?.to_vec();
    Ok((last_seq, digest))
}

const FIN_ACK_TAG_VERIFIED: u8 = 0x01;
const FIN_ACK_TAG_DIGEST: u8 = 0x02;

pub fn build_fin_ack_payload(verified: bool, digest: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    let verified_byte = [if verified { 1u8 } else { 0u8 }];
    encode_tlvs([
        (FIN_ACK_TAG_VERIFIED, verified_byte.as_slice()),
        (FIN_ACK_TAG_DIGEST, digest),
    ])
}

pub fn parse_fin_ack_payload(payload: &[u8]) -> Result<(bool, Vec<u8>), ProtocolError> {
    let tlvs = decode_tlvs(payload)?;
    let verified_raw = get(&tlvs, FIN_ACK_TAG_VERIFIED)?;
    if verified_raw.len() != 1 {
        return Err(ProtocolError::MalformedField(FIN_ACK_TAG_VERIFIED));
    }
    let verified = verified_raw[0] == 1;
    let digest = get(&tlvs, FIN_ACK_TAG_DIGEST)?.to_vec();
    Ok((verified, digest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_plain_filename() {
        assert_eq!(sanitize_filename("report.pdf").unwrap(), "report.pdf");
    }

    #[test]
    fn sanitizes_path_to_basename() {
        assert_eq!(sanitize_filename("docs/report.pdf").unwrap(), "report.pdf");
    }

    #[test]
    fn rejects_traversal() {
        assert!(sanitize_filename("../../etc/passwd").is_ok());
        assert_eq!(sanitize_filename("../../etc/passwd").unwrap(), "passwd");
        assert!(sanitize_filename("..").is_err());
        assert!(sanitize_filename(".").is_err());
        assert!(sanitize_filename("").is_err());
        assert!(sanitize_filename("/").is_err());
    }

    #[test]
    fn offer_round_trip() {
        let offer = Offer {
            filename: "photo.png".to_string(),
            file_size: 123_456,
            chunk_size: 1024,
            total_chunks: 121,
            hash_algorithm: "sha256".to_string(),
            hash_digest: vec![0xab; 32],
        };
        let bytes = build_offer_payload(&offer).unwrap();
        let decoded = parse_offer_payload(&bytes).unwrap();
        assert_eq!(decoded, offer);
    }

    #[test]
    fn accept_round_trip_with_reason() {
        let bytes = build_accept_payload(false, "disk full").unwrap();
        let (accepted, reason) = parse_accept_payload(&bytes).unwrap();
        assert!(!accepted);
        assert_eq!(reason, "disk full");
    }

    #[test]
    fn accept_round_trip_without_reason() {
        let bytes = build_accept_payload(true, "").unwrap();
        let (accepted, reason) = parse_accept_payload(&bytes).unwrap();
        assert!(accepted);
        assert_eq!(reason, "");
    }

    #[test]
    fn data_round_trip() {
        let chunk = vec![7u8; 200];
        let bytes = build_data_payload(3, 1024, &chunk);
        let (offset, parsed_chunk) = parse_data_payload(&bytes).unwrap();
        assert_eq!(offset, 3 * 1024);
        assert_eq!(parsed_chunk, chunk.as_slice());
    }

    #[test]
    fn ranges_round_trip() {
        let ranges = vec![(0u32, 0u32), (2, 5), (10, 10)];
        let bytes = build_ranges_payload(&ranges);
        assert_eq!(parse_ranges_payload(&bytes).unwrap(), ranges);
    }

    #[test]
    fn ranges_round_trip_empty() {
        let bytes = build_ranges_payload(&[]);
        assert_eq!(parse_ranges_payload(&bytes).unwrap(), Vec::new());
    }

    #[test]
    fn fin_round_trip() {
        let digest = vec![0x11; 32];
        let bytes = build_fin_payload(99, &digest).unwrap();
        assert_eq!(parse_fin_payload(&bytes).unwrap(), (99, digest));
    }

    #[test]
    fn fin_ack_round_trip() {
        let digest = vec![0x22; 32];
        let bytes = build_fin_ack_payload(true, &digest).unwrap();
        assert_eq!(parse_fin_ack_payload(&bytes).unwrap(), (true, digest));
    }

    proptest::proptest! {
        #[test]
        fn ranges_round_trip_arbitrary(pairs in proptest::collection::vec((proptest::prelude::any::<u32>(), proptest::prelude::any::<u32>()), 0..32)) {
            let bytes = build_ranges_payload(&pairs);
            proptest::prop_assert_eq!(parse_ranges_payload(&bytes).unwrap(), pairs);
        }
    }
}
