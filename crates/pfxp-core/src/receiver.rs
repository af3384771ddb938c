//! Receiver state machine: `receive_one`.
//!
//! States, in order: `LISTENING -> HELLO_RECEIVED -> OFFER_RECEIVED ->
//! RECEIVING -> FIN_RECEIVED -> DONE`. Serves exactly one transfer and
//! returns the path it wrote.

use std::collections::HashSet;
use std::fs::OpenOptions;
use std::io::{Seek, SeekFrom, Write};
use std::net::{SocketAddr, UdpSocket};
use std::path::{Path, PathBuf};

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
/// to the caller so the DATA-gathering loop (which tolerates stray and
/// malformed traffic) can discard a decode failure without treating it as
/// a socket-level error.
fn recv_raw(socket: &UdpSocket) -> Result<Option<(Vec<u8>, SocketAddr)>> {
    let mut buf = [0u8; 65535];
    match socket.recv_from(&mut buf) {
        Ok((len, addr)) => Ok(Some((buf[..len].to_vec(), addr))),
        Err(e) if e.kind() == std::io::ErrorKind::WouldBlock || e.kind() == std::io::ErrorKind::TimedOut => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn recv_frame(socket: &UdpSocket) -> Result<Option<(FrameHeader, Vec<u8>, SocketAddr)>> {
    let Some((datagram, addr)) = recv_raw(socket)? else {
        return Ok(None);
    };
    let (header, payload) = wire::decode_frame(&datagram)?;
    Ok(Some((header, payload.to_vec(), addr)))
}

/// Reads exactly one frame and requires it to be `expected_type`,
/// optionally from `expected_peer`/`expected_transfer_id` if already
/// bound to a session. Used for every wait state except the DATA
/// gathering loop, which discards stray traffic instead of failing.
fn recv_strict(
    socket: &UdpSocket,
    expected_peer: Option<SocketAddr>,
    expected_transfer_id: Option<u64>,
    expected_type: FrameType,
    waiting_for: &'static str,
) -> Result<(FrameHeader, Vec<u8>, SocketAddr)> {
    let (header, payload, addr) = recv_frame(socket)?.ok_or(TimeoutError::NoReply(waiting_for))?;

    if let Some(peer) = expected_peer {
        if addr != peer {
            return Err(ProtocolError::UnexpectedPeer { expected: peer, got: addr }.into());
        }
    }
    if let Some(transfer_id) = expected_transfer_id {
        if header.transfer_id() != transfer_id {
            return Err(ProtocolError::UnexpectedTransferId { expected: transfer_id, got: header.transfer_id() }.into());
        }
    }
    match header.frame_type() {
        Some(ft) if ft == expected_type => Ok((header, payload, addr)),
        other => Err(ProtocolError::UnexpectedReply {
            addr,
            expected: expected_type.name(),
            got: other.map(FrameType::name).unwrap_or("UNKNOWN"),
        }
        .into()),
    }
}

/// Serves one transfer on `(bind_host, port)`, writing the delivered file
/// under `out_dir`, and returns the path written.
pub fn receive_one(bind_host: &str, port: u16, out_dir: impl AsRef<Path>, config: &TransferConfig) -> Result<PathBuf> {
    let out_dir = out_dir.as_ref();
    std::fs::create_dir_all(out_dir)?;

    let socket = UdpSocket::bind((bind_host, port))?;
    socket.set_read_timeout(Some(config.timeout))?;

    tracing::info!(%bind_host, port, "listening for one transfer");

    // HELLO.
    let (hello_header, _, peer_addr) = recv_strict(&socket, None, None, FrameType::Hello, "HELLO")?;
    let transfer_id = hello_header.transfer_id();
    tracing::info!(transfer_id = format!("{transfer_id:016x}"), %peer_addr, "handshake started");
    send_frame(&socket, peer_addr, FrameType::Hello, transfer_id, 0, &payload::build_hello_payload(config.max_datagram_size))?;

    // OFFER.
    let (_, offer_payload, _) = recv_strict(&socket, Some(peer_addr), Some(transfer_id), FrameType::Offer, "OFFER")?;
    let offer = payload::parse_offer_payload(&offer_payload)?;
    let output_path = out_dir.join(&offer.filename);

    {
        let file = OpenOptions::new().create(true).write(true).open(&output_path)?;
        file.set_len(offer.file_size)?;
    }

    send_frame(&socket, peer_addr, FrameType::Accept, transfer_id, 0, &payload::build_accept_payload(true, "")?)?;

    tracing::info!(
        filename = %offer.filename,
        file_size = offer.file_size,
        total_chunks = offer.total_chunks,
        "offer accepted"
    );

    // DATA gathering loop.
    let mut received: HashSet<u32> = HashSet::new();
    while (received.len() as u32) < offer.total_chunks {
        let Some((datagram, addr)) = recv_raw(&socket)? else {
            return Err(TimeoutError::NoReply("DATA").into());
        };
        let (header, data_payload) = match wire::decode_frame(&datagram) {
            Ok((header, payload)) => (header, payload),
            Err(e) => {
                tracing::trace!(%addr, error = %e, "dropping undecodable datagram during DATA loop");
                continue;
            }
        };
        if addr != peer_addr || header.transfer_id() != transfer_id {
            continue;
        }
        if header.frame_type() != Some(FrameType::Data) {
            continue;
        }

        let seq = header.seq();
        let (_, chunk) = payload::parse_data_payload(&data_payload)?;

        if !received.contains(&seq) {
            let mut file = OpenOptions::new().write(true).open(&output_path)?;
            file.seek(SeekFrom::Start(seq as u64 * offer.chunk_size as u64))?;
            file.write_all(chunk)?;
            received.insert(seq);
        }

        let ack_payload = payload::build_ranges_payload(&[(seq, seq)]);
        send_frame(&socket, peer_addr, FrameType::Ack, transfer_id, seq, &ack_payload)?;
    }

    // FIN / verification / FIN_ACK.
    let (_, fin_payload, _) = recv_strict(&socket, Some(peer_addr), Some(transfer_id), FrameType::Fin, "FIN")?;
    let (_, sender_digest) = payload::parse_fin_payload(&fin_payload)?;

    let file_bytes = std::fs::read(&output_path)?;
    let local_digest = Sha256::digest(&file_bytes);
    let verified = local_digest.as_slice() == offer.hash_digest.as_slice() && local_digest.as_slice() == sender_digest.as_slice();

    send_frame(
        &socket,
        peer_addr,
        FrameType::FinAck,
        transfer_id,
        0,
        &payload::build_fin_ack_payload(verified, &local_digest)?,
    )?;

    if !verified {
        return Err(ProtocolError::IntegrityFailed.into());
    }

    tracing::info!(path = %output_path.display(), "transfer complete");
    Ok(output_path)
}
