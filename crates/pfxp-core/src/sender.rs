//! Sender state machine: `send_file`.
//!
//! States, in order: `OPEN -> HELLO_SENT -> OFFER_SENT ->
//! TRANSFERRING(chunk=k) -> FIN_SENT -> DONE`, with an implicit ABORTED
//! exit at any point a `PfxpError` is returned.

use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::path::Path;

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::config::TransferConfig;
use crate::error::{PfxpError, ProtocolError, Result, TimeoutError};
use crate::payload;
use crate::wire::{self, FrameHeader, FrameType};

fn send_frame(
    socket: &UdpSocket,
    addr: SocketAddr,
    frame_type: FrameType,
    transfer_id: u64,
    seq: u32,
    payload: &[u8],
) -> Result<()> {
    let header = FrameHeader::new(frame_type, transfer_id, seq, payload.len() as u32, 0);
    let datagram = wire::encode_frame(&header, payload);
    tracing::trace!(frame = frame_type.name(), transfer_id, seq, len = payload.len(), "send");
    socket.send_to(&datagram, addr)?;
    Ok(())
}

/// Reads one raw datagram, `None` on timeout/would-block. Decoding is left
/// to the caller so the per-chunk ACK wait (which discards stray or
/// malformed traffic without spending a retry) can drop a decode failure
/// instead of treating it as a socket-level error.
fn recv_raw(socket: &UdpSocket) -> Result<Option<(Vec<u8>, SocketAddr)>> {
    let mut buf = [0u8; 65535];
    match socket.recv_from(&mut buf) {
        Ok((len, addr)) => Ok(Some((buf[..len].to_vec(), addr))),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Reads one datagram and decodes it. A socket-level timeout surfaces as
/// `Ok(None)` so callers can distinguish "nothing arrived" from
/// "something arrived but failed to decode".
fn recv_frame(socket: &UdpSocket) -> Result<Option<(FrameHeader, Vec<u8>, SocketAddr)>> {
    let Some((datagram, addr)) = recv_raw(socket)? else {
        return Ok(None);
    };
    let (header, payload) = wire::decode_frame(&datagram)?;
    Ok(Some((header, payload.to_vec(), addr)))
}

/// Reads exactly one reply and requires it to come from `expected_addr`,
/// carry `expected_transfer_id`, and be of `expected_type`. Used for every
/// wait state except the per-chunk DATA/ACK loop, which tolerates stray
/// traffic instead of failing outright.
fn recv_strict(
    socket: &UdpSocket,
    expected_addr: SocketAddr,
    expected_transfer_id: u64,
    expected_type: FrameType,
    waiting_for: &'static str,
) -> Result<Vec<u8>> {
    let (header, payload, addr) = recv_frame(socket)?.ok_or(TimeoutError::NoReply(waiting_for))?;

    if addr != expected_addr {
        return Err(ProtocolError::UnexpectedPeer { expected: expected_addr, got: addr }.into());
    }
    if header.transfer_id() != expected_transfer_id {
        return Err(ProtocolError::UnexpectedTransferId {
            expected: expected_transfer_id,
            got: header.transfer_id(),
        }
        .into());
    }
    match header.frame_type() {
        Some(ft) if ft == expected_type => Ok(payload),
        other => Err(ProtocolError::UnexpectedReply {
            addr,
            expected: expected_type.name(),
            got: other.map(FrameType::name).unwrap_or("UNKNOWN"),
        }
        .into()),
    }
}

/// Reads the source file, hands it to the receiver at `(host, port)`, and
/// blocks until the transfer completes or a protocol/timeout error occurs.
pub fn send_file(
    file_path: impl AsRef<Path>,
    host: &str,
    port: u16,
    config: &TransferConfig,
) -> Result<()> {
    let file_path = file_path.as_ref();
    let data = std::fs::read(file_path)?;
    let file_size = data.len() as u64;
    let digest = Sha256::digest(&data);
    let chunk_size = config.chunk_size;
    let total_chunks = if file_size == 0 {
        0
    } else {
        ((file_size + chunk_size as u64 - 1) / chunk_size as u64) as u32
    };
    let transfer_id = rand::thread_rng().next_u64();

    let remote_addr = (host, port)
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::InvalidInput, "host did not resolve"))?;

    let socket = UdpSocket::bind("0.0.0.0:0")?;
    socket.set_read_timeout(Some(config.timeout))?;

    tracing::info!(
        transfer_id = format!("{transfer_id:016x}"),
        %remote_addr,
        file = %file_path.display(),
        file_size,
        total_chunks,
        "starting transfer"
    );

    // HELLO / HELLO reply.
    send_frame(
        &socket,
        remote_addr,
        FrameType::Hello,
        transfer_id,
        0,
        &payload::build_hello_payload(config.max_datagram_size),
    )?;
    recv_strict(&socket, remote_addr, transfer_id, FrameType::Hello, "HELLO reply")?;

    // OFFER / ACCEPT.
    let filename = file_path
        .file_name()
        .and_then(|s| s.to_str())
        .ok_or_else(|| ProtocolError::UnsafeFilename(file_path.display().to_string()))?
        .to_string();
    let offer = payload::Offer {
        filename,
        file_size,
        chunk_size,
        total_chunks,
        hash_algorithm: crate::config::HASH_ALGORITHM.to_string(),
        hash_digest: digest.to_vec(),
    };
    send_frame(
        &socket,
        remote_addr,
        FrameType::Offer,
        transfer_id,
        0,
        &payload::build_offer_payload(&offer)?,
    )?;
    let accept_payload = recv_strict(&socket, remote_addr, transfer_id, FrameType::Accept, "ACCEPT")?;
    let (accepted, reason) = payload::parse_accept_payload(&accept_payload)?;
    if !accepted {
        let reason = if reason.is_empty() { "no reason provided".to_string() } else { reason };
        return Err(ProtocolError::OfferRejected(reason).into());
    }

    // Chunked DATA / ACK with per-chunk retry.
    for seq in 0..total_chunks {
        let start = seq as usize * chunk_size as usize;
        let end = (start + chunk_size as usize).min(data.len());
        let chunk = &data[start..end];
        let data_payload = payload::build_data_payload(seq, chunk_size, chunk);

        let mut acknowledged = false;
        for attempt in 0..config.max_retries {
            send_frame(&socket, remote_addr, FrameType::Data, transfer_id, seq, &data_payload)?;

            let Some((datagram, addr)) = recv_raw(&socket)? else {
                tracing::debug!(seq, attempt, "no reply before timeout, retrying");
                continue;
            };
            let (header, ack_payload) = match wire::decode_frame(&datagram) {
                Ok((header, payload)) => (header, payload),
                Err(e) => {
                    tracing::trace!(seq, attempt, %addr, error = %e, "discarding undecodable datagram");
                    continue;
                }
            };
            if addr != remote_addr || header.transfer_id() != transfer_id {
                continue;
            }
            if header.frame_type() != Some(FrameType::Ack) {
                continue;
            }
            let ranges = payload::parse_ranges_payload(ack_payload)?;
            if ranges.iter().any(|&(start, end)| start <= seq && seq <= end) {
                acknowledged = true;
                break;
            }
        }
        if !acknowledged {
            return Err(TimeoutError::ChunkNotAcknowledged { seq, retries: config.max_retries }.into());
        }
    }

    // FIN / FIN_ACK.
    let last_seq = total_chunks.saturating_sub(1);
    send_frame(
        &socket,
        remote_addr,
        FrameType::Fin,
        transfer_id,
        0,
        &payload::build_fin_payload(last_seq, &digest)?,
    )?;
    let fin_ack_payload = recv_strict(&socket, remote_addr, transfer_id, FrameType::FinAck, "FIN_ACK")?;
    let (verified, receiver_digest) = payload::parse_fin_ack_payload(&fin_ack_payload)?;
    if !verified {
        return Err(ProtocolError::IntegrityFailed.into());
    }
    if receiver_digest != digest.as_slice() {
        return Err(ProtocolError::DigestMismatch {
            local: hex::encode(digest),
            remote: hex::encode(receiver_digest),
        }
        .into());
    }

    tracing::info!(transfer_id = format!("{transfer_id:016x}"), "transfer complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::time::Duration;

    fn spawn_stub_receiver(expect_chunks: u32) -> (std::thread::JoinHandle<()>, u16) {
        let server = UdpSocket::bind("127.0.0.1:0").unwrap();
        let server_port = server.local_addr().unwrap().port();
        server.set_read_timeout(Some(Duration::from_secs(2))).unwrap();

        let handle = std::thread::spawn(move || {
            let mut buf = [0u8; 65535];

            // HELLO
            let (len, addr) = server.recv_from(&mut buf).unwrap();
            let (header, _) = wire::decode_frame(&buf[..len]).unwrap();
            let tid = header.transfer_id();
            send_frame(&server, addr, FrameType::Hello, tid, 0, &payload::build_hello_payload(1200)).unwrap();

            // OFFER
            let (len, _) = server.recv_from(&mut buf).unwrap();
            wire::decode_frame(&buf[..len]).unwrap();
            send_frame(&server, addr, FrameType::Accept, tid, 0, &payload::build_accept_payload(true, "").unwrap())
                .unwrap();

            // DATA x expect_chunks
            for _ in 0..expect_chunks {
                let (len, _) = server.recv_from(&mut buf).unwrap();
                let (header, _) = wire::decode_frame(&buf[..len]).unwrap();
                let seq = header.seq();
                let ranges = payload::build_ranges_payload(&[(seq, seq)]);
                send_frame(&server, addr, FrameType::Ack, tid, seq, &ranges).unwrap();
            }

            // FIN
            let (len, _) = server.recv_from(&mut buf).unwrap();
            let (_, fin_payload) = wire::decode_frame(&buf[..len]).unwrap();
            let (_, digest) = payload::parse_fin_payload(fin_payload).unwrap();
            let fin_ack = payload::build_fin_ack_payload(true, &digest).unwrap();
            send_frame(&server, addr, FrameType::FinAck, tid, 0, &fin_ack).unwrap();
        });

        (handle, server_port)
    }

    #[test]
    fn sends_small_file_successfully() {
        let mut tmp = tempfile_like();
        tmp.write_all(b"hello").unwrap();
        let path = tmp.path().to_path_buf();

        let (handle, port) = spawn_stub_receiver(1);
        let config = TransferConfig { timeout: Duration::from_secs(2), ..Default::default() };
        send_file(&path, "127.0.0.1", port, &config).unwrap();
        handle.join().unwrap();
    }

    // Minimal stand-in for `tempfile::NamedTempFile` without adding a new
    // dev-dependency: writes under `std::env::temp_dir()` and removes
    // itself on drop.
    struct ScratchFile {
        path: std::path::PathBuf,
        file: std::fs::File,
    }

    impl ScratchFile {
        fn path(&self) -> &Path {
            &self.path
        }
    }

    impl Write for ScratchFile {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.file.write(buf)
        }
        fn flush(&mut self) -> std::io::Result<()> {
            self.file.flush()
        }
    }

    impl Drop for ScratchFile {
        fn drop(&mut self) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    fn tempfile_like() -> ScratchFile {
        let path = std::env::temp_dir().join(format!("pfxp-sender-test-{}.bin", rand::thread_rng().next_u32()));
        let file = std::fs::File::create(&path).unwrap();
        ScratchFile { path, file }
    }
}
