//! Transfer defaults.
//!
//! PFXP's core has no environment variables and no persisted
//! configuration file: every knob here is a plain default that callers
//! (the CLI, or any embedder) can override per call.

use std::time::Duration;

/// Default UDP port both `send_file` and `receive_one` bind/target.
pub const DEFAULT_PORT: u16 = 40404;

/// Default chunk size in bytes. Fits comfortably under typical path MTUs
/// alongside the 24-byte header and TLV overhead; PMTU discovery is out of
/// scope for this core.
pub const DEFAULT_CHUNK_SIZE: u16 = 1024;

/// Default per-read socket timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(2);

/// Default number of send/await attempts per DATA chunk before giving up.
pub const DEFAULT_MAX_RETRIES: u32 = 8;

/// Advertised max-datagram-size hint carried in HELLO. Not enforced
/// against incoming datagrams in this core.
pub const DEFAULT_MAX_DATAGRAM_SIZE: u16 = 1200;

/// The only digest algorithm this core speaks.
pub const HASH_ALGORITHM: &str = "sha256";

/// Tunables for one transfer. Constructed with [`TransferConfig::default`]
/// and overridden field-by-field.
#[derive(Debug, Clone, Copy)]
pub struct TransferConfig {
    pub chunk_size: u16,
    pub timeout: Duration,
    pub max_retries: u32,
    pub max_datagram_size: u16,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            timeout: DEFAULT_TIMEOUT,
            max_retries: DEFAULT_MAX_RETRIES,
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
        }
    }
}
