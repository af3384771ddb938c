//! Fixed 24-byte frame header and the common framing envelope.
//!
//! Every PFXP datagram starts with this header, big-endian on the wire.
//! Multi-byte fields are stored as raw byte arrays rather than native
//! integers: `zerocopy`'s derives serialize in native endianness, and this
//! protocol is always network byte order regardless of host, so each field
//! carries a typed accessor built on `from_be_bytes`/`to_be_bytes` instead.

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

use crate::error::ProtocolError;

/// Protocol magic: the ASCII bytes `PFXP`.
pub const MAGIC: [u8; 4] = *b"PFXP";

/// The only protocol version this crate speaks.
pub const VERSION: u8 = 1;

/// Size in bytes of [`FrameHeader`] on the wire.
pub const HEADER_LEN: u8 = 24;

/// One PFXP control or data message kind.
///
/// `Nack`, `Abort`, `Ping`, `Pong` are reserved: this core must decode them
/// without error but never emits them and never transitions state on them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    Hello = 0x01,
    Offer = 0x02,
    Accept = 0x03,
    Data = 0x04,
    Ack = 0x05,
    Nack = 0x06,
    Fin = 0x07,
    FinAck = 0x08,
    Abort = 0x09,
    Ping = 0x0A,
    Pong = 0x0B,
}

impl FrameType {
    /// Maps a wire byte to a known frame type, `None` if unrecognized.
    #[must_use]
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0x01 => Some(Self::Hello),
            0x02 => Some(Self::Offer),
            0x03 => Some(Self::Accept),
            0x04 => Some(Self::Data),
            0x05 => Some(Self::Ack),
            0x06 => Some(Self::Nack),
            0x07 => Some(Self::Fin),
            0x08 => Some(Self::FinAck),
            0x09 => Some(Self::Abort),
            0x0A => Some(Self::Ping),
            0x0B => Some(Self::Pong),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// A short, stable name used in log fields and error messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Hello => "HELLO",
            Self::Offer => "OFFER",
            Self::Accept => "ACCEPT",
            Self::Data => "DATA",
            Self::Ack => "ACK",
            Self::Nack => "NACK",
            Self::Fin => "FIN",
            Self::FinAck => "FIN_ACK",
            Self::Abort => "ABORT",
            Self::Ping => "PING",
            Self::Pong => "PONG",
        }
    }
}

/// The fixed 24-byte frame header, big-endian on the wire.
///
/// ```text
/// magic(4) version(1) frame_type(1) flags(1) header_len(1)
/// transfer_id(8) seq(4) payload_len(4)
/// ```
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, FromZeroes, AsBytes)]
pub struct FrameHeader {
    magic: [u8; 4],
    version: u8,
    frame_type: u8,
    flags: u8,
    header_len: u8,
    transfer_id: [u8; 8],
    seq: [u8; 4],
    payload_len: [u8; 4],
}

assert_eq_size!(FrameHeader, [u8; 24]);

impl FrameHeader {
    /// Builds a header for `frame_type` addressed to `transfer_id`. `flags`
    /// is currently unused by any defined frame type but carried on the
    /// wire for forward compatibility.
    #[must_use]
    pub fn new(frame_type: FrameType, transfer_id: u64, seq: u32, payload_len: u32, flags: u8) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            frame_type: frame_type.as_u8(),
            flags,
            header_len: HEADER_LEN,
            transfer_id: transfer_id.to_be_bytes(),
            seq: seq.to_be_bytes(),
            payload_len: payload_len.to_be_bytes(),
        }
    }

    #[must_use]
    pub fn version(&self) -> u8 {
        self.version
    }

    #[must_use]
    pub fn frame_type_byte(&self) -> u8 {
        self.frame_type
    }

    #[must_use]
    pub fn frame_type(&self) -> Option<FrameType> {
        FrameType::from_u8(self.frame_type)
    }

    #[must_use]
    pub fn flags(&self) -> u8 {
        self.flags
    }

    #[must_use]
    pub fn header_len(&self) -> u8 {
        self.header_len
    }

    #[must_use]
    pub fn transfer_id(&self) -> u64 {
        u64::from_be_bytes(self.transfer_id)
    }

    #[must_use]
    pub fn seq(&self) -> u32 {
        u32::from_be_bytes(self.seq)
    }

    #[must_use]
    pub fn payload_len(&self) -> u32 {
        u32::from_be_bytes(self.payload_len)
    }
}

/// Encodes `header` followed by `payload` into one UDP datagram.
///
/// Fails if `payload` is larger than a `u32` can address, which in
/// practice never happens given this crate's chunk size limits.
pub fn encode_frame(header: &FrameHeader, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN as usize + payload.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(payload);
    out
}

/// Validates and decodes one datagram into its header and payload slice.
///
/// Validation order follows cheapest-to-check first: overall length, then
/// magic, then version, then the declared header/payload lengths, then the
/// frame type byte.
pub fn decode_frame(datagram: &[u8]) -> Result<(FrameHeader, &[u8]), ProtocolError> {
    if datagram.len() < HEADER_LEN as usize {
        return Err(ProtocolError::FrameTooShort);
    }

    let header = FrameHeader::read_from_prefix(datagram).ok_or(ProtocolError::FrameTooShort)?;

    if header.magic != MAGIC {
        return Err(ProtocolError::BadMagic);
    }
    if header.version != VERSION {
        return Err(ProtocolError::UnsupportedVersion(header.version));
    }
    if header.header_len < HEADER_LEN {
        return Err(ProtocolError::BadHeaderLength(header.header_len));
    }
    if datagram.len() < header.header_len as usize {
        return Err(ProtocolError::TruncatedHeader {
            header_len: header.header_len,
            actual: datagram.len(),
        });
    }

    let payload = &datagram[header.header_len as usize..];
    let declared = header.payload_len();
    if payload.len() as u32 != declared {
        return Err(ProtocolError::PayloadLengthMismatch {
            declared,
            actual: payload.len(),
        });
    }

    if FrameType::from_u8(header.frame_type).is_none() {
        return Err(ProtocolError::UnknownFrameType(header.frame_type));
    }

    Ok((header, payload))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_24_bytes() {
        assert_eq!(std::mem::size_of::<FrameHeader>(), 24);
    }

    #[test]
    fn round_trip_empty_payload() {
        let header = FrameHeader::new(FrameType::Hello, 0xdead_beef_0000_0001, 0, 0, 0);
        let bytes = encode_frame(&header, &[]);
        let (decoded, payload) = decode_frame(&bytes).unwrap();
        assert_eq!(decoded.frame_type(), Some(FrameType::Hello));
        assert_eq!(decoded.transfer_id(), 0xdead_beef_0000_0001);
        assert_eq!(decoded.seq(), 0);
        assert!(payload.is_empty());
    }

    #[test]
    fn round_trip_with_payload() {
        let payload = b"hello pfxp";
        let header = FrameHeader::new(FrameType::Data, 42, 7, payload.len() as u32, 0);
        let bytes = encode_frame(&header, payload);
        let (decoded, decoded_payload) = decode_frame(&bytes).unwrap();
        assert_eq!(decoded.seq(), 7);
        assert_eq!(decoded_payload, payload);
    }

    #[test]
    fn rejects_short_datagram() {
        assert_eq!(decode_frame(&[0u8; 10]), Err(ProtocolError::FrameTooShort));
    }

    #[test]
    fn rejects_bad_magic() {
        let header = FrameHeader::new(FrameType::Ping, 1, 0, 0, 0);
        let mut bytes = encode_frame(&header, &[]);
        bytes[0] = b'X';
        assert_eq!(decode_frame(&bytes), Err(ProtocolError::BadMagic));
    }

    #[test]
    fn rejects_unsupported_version() {
        let header = FrameHeader::new(FrameType::Ping, 1, 0, 0, 0);
        let mut bytes = encode_frame(&header, &[]);
        bytes[4] = 9;
        assert_eq!(decode_frame(&bytes), Err(ProtocolError::UnsupportedVersion(9)));
    }

    #[test]
    fn rejects_unknown_frame_type() {
        let header = FrameHeader::new(FrameType::Ping, 1, 0, 0, 0);
        let mut bytes = encode_frame(&header, &[]);
        bytes[5] = 0xFF;
        assert_eq!(decode_frame(&bytes), Err(ProtocolError::UnknownFrameType(0xFF)));
    }

    #[test]
    fn rejects_payload_length_mismatch() {
        let header = FrameHeader::new(FrameType::Data, 1, 0, 5, 0);
        let bytes = encode_frame(&header, &[1, 2, 3]);
        assert_eq!(
            decode_frame(&bytes),
            Err(ProtocolError::PayloadLengthMismatch { declared: 5, actual: 3 })
        );
    }
}
