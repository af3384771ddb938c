//! PFXP error categories.
//!
//! Per the protocol design: one categorical error for wire/session
//! violations, and a distinct category for retry-budget exhaustion or an
//! expected reply that never arrives. Both compose into [`PfxpError`], the
//! `Result` error type returned by every public entry point in this crate.

use thiserror::Error;

/// Wire-format violations, unexpected frame types, peer/transfer
/// mismatches mid-session, offer rejections, and digest mismatches.
///
/// Any deviation from the protocol that arrives as a reply (rather than
/// never arriving at all, which is a [`TimeoutError`]) falls in here.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("datagram shorter than the 24-byte common header")]
    FrameTooShort,

    #[error("invalid frame magic")]
    BadMagic,

    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u8),

    #[error("invalid header length: {0} (must be >= 24)")]
    BadHeaderLength(u8),

    #[error("datagram shorter than declared header length {header_len} (got {actual} bytes)")]
    TruncatedHeader { header_len: u8, actual: usize },

    #[error("declared payload length {declared} does not match actual payload size {actual}")]
    PayloadLengthMismatch { declared: u32, actual: usize },

    #[error("unknown frame type byte: 0x{0:02x}")]
    UnknownFrameType(u8),

    #[error("TLV tag value exceeds 65535 bytes: {0}")]
    TlvValueTooLarge(usize),

    #[error("truncated TLV header ({remaining} bytes remaining, need at least 3)")]
    TruncatedTlvHeader { remaining: usize },

    #[error("truncated TLV value (declared {declared}, {remaining} bytes remaining)")]
    TruncatedTlvValue { declared: usize, remaining: usize },

    #[error("payload missing required tag: {0}")]
    MissingTag(u8),

    #[error("payload field malformed for tag {0}")]
    MalformedField(u8),

    #[error("payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("filename is empty, a path component like '.' / '..', or carries a directory separator: {0:?}")]
    UnsafeFilename(String),

    #[error("data payload too short to carry the offset prefix")]
    DataPayloadTooShort,

    #[error("ranges payload malformed or size mismatch")]
    MalformedRanges,

    #[error("unexpected reply from {addr}: expected {expected}, got {got}")]
    UnexpectedReply {
        addr: std::net::SocketAddr,
        expected: &'static str,
        got: &'static str,
    },

    #[error("reply from unexpected peer {got}, expected {expected}")]
    UnexpectedPeer {
        expected: std::net::SocketAddr,
        got: std::net::SocketAddr,
    },

    #[error("reply carries transfer_id {got:#018x}, expected {expected:#018x}")]
    UnexpectedTransferId { expected: u64, got: u64 },

    #[error("receiver rejected transfer: {0}")]
    OfferRejected(String),

    #[error("receiver reported integrity failure")]
    IntegrityFailed,

    #[error("digest mismatch: local={local}, remote={remote}")]
    DigestMismatch { local: String, remote: String },
}

/// Retry-budget exhaustion, or an expected reply that never arrived at
/// all (as opposed to one that arrived malformed, which is a
/// [`ProtocolError`]).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TimeoutError {
    #[error("chunk {seq} not acknowledged after {retries} attempts")]
    ChunkNotAcknowledged { seq: u32, retries: u32 },

    #[error("timed out waiting for {0}")]
    NoReply(&'static str),
}

/// The top-level error returned by `send_file` and `receive_one`.
#[derive(Debug, Error)]
pub enum PfxpError {
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Timeout(#[from] TimeoutError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PfxpError>;
