use anyhow::{Context, Result};
use bytes::Bytes;
use log::{debug, info, warn};
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncReadExt;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use super::packet::{AckPacket, DataPacket, DATA_PAYLOAD_SIZE};

/// How long to wait for an acknowledgment before resending a segment.
pub const ACK_TIMEOUT: Duration = Duration::from_secs(1);

/// Send `path` to `target` (host:port), one segment in flight at a time.
/// Returns the number of payload bytes sent.
pub async fn send_file(path: impl AsRef<Path>, target: &str) -> Result<u64> {
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket
        .connect(target)
        .await
        .with_context(|| format!("connecting to receiver at {}", target))?;
    send_file_over(&socket, path, ACK_TIMEOUT).await
}

/// Stop-and-wait send loop over an already-connected socket.
pub(crate) async fn send_file_over(
    socket: &UdpSocket,
    path: impl AsRef<Path>,
    ack_timeout: Duration,
) -> Result<u64> {
    let path = path.as_ref();
    let mut file = File::open(path)
        .await
        .with_context(|| format!("opening {}", path.display()))?;

    let mut seq: u32 = 0;
    let mut total: u64 = 0;
    let mut chunk = vec![0u8; DATA_PAYLOAD_SIZE];

    loop {
        let len = read_chunk(&mut file, &mut chunk).await?;
        let packet = DataPacket {
            seq,
            payload: Bytes::copy_from_slice(&chunk[..len]),
        };
        send_until_acked(socket, &packet, ack_timeout).await?;

        total += len as u64;
        seq = seq.wrapping_add(1);

        // A short segment tells the receiver the file is complete; a file
        // that fills its last segment exactly is closed by an empty one.
        if len < DATA_PAYLOAD_SIZE {
            break;
        }
    }

    info!("sent {} ({} bytes, {} segments)", path.display(), total, seq);
    Ok(total)
}

/// Fill `buf` from the file; a short count only happens at end of file.
async fn read_chunk(file: &mut File, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// Transmit one segment and repeat until the matching ack arrives.
async fn send_until_acked(
    socket: &UdpSocket,
    packet: &DataPacket,
    ack_timeout: Duration,
) -> Result<()> {
    let encoded = packet.encode();
    let wanted = packet.seq.wrapping_add(1);
    let mut buf = [0u8; 64];

    loop {
        socket.send(&encoded).await?;
        debug!("sent segment {} ({} bytes)", packet.seq, encoded.len());

        match timeout(ack_timeout, socket.recv(&mut buf)).await {
            Ok(Ok(len)) => match AckPacket::decode(&buf[..len]) {
                Ok(ack) if ack.seq == wanted => return Ok(()),
                Ok(ack) => debug!("stale ack {} while waiting for {}", ack.seq, wanted),
                Err(err) => warn!("ignoring undecodable ack: {}", err),
            },
            Ok(Err(err)) => return Err(err).context("receiving ack"),
            Err(_) => debug!("ack {} timed out, resending segment {}", wanted, packet.seq),
        }
    }
}
