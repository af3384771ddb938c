//! PFXP: a small reliable file-transfer protocol over UDP.
//!
//! One peer (sender) delivers a single file to another peer (receiver)
//! identified by host and port, then both agree the delivered bytes match
//! a sha256 digest of the original. See [`sender::send_file`] and
//! [`receiver::receive_one`] for the two entry points.

pub mod config;
pub mod error;
pub mod payload;
pub mod receiver;
pub mod sender;
pub mod tlv;
pub mod wire;

pub use config::TransferConfig;
pub use error::{PfxpError, ProtocolError, Result, TimeoutError};
pub use receiver::receive_one;
pub use sender::send_file;
