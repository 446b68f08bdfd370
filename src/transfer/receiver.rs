use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::net::UdpSocket;
use tokio::time::timeout;

use super::packet::{AckPacket, DataPacket, DATA_PAYLOAD_SIZE, HEADER_LEN};

/// How long the receiver sits without traffic before giving up, or, once
/// the final segment is in, before calling the transfer done.
pub const IDLE_TIMEOUT: Duration = Duration::from_secs(4);

/// Receive one file on `port` and write it to `path`. Returns the number
/// of payload bytes written.
pub async fn receive_file(path: impl AsRef<Path>, port: u16) -> Result<u64> {
    let socket = UdpSocket::bind(("0.0.0.0", port))
        .await
        .with_context(|| format!("binding UDP port {}", port))?;
    info!("receiving on port {}", port);
    receive_file_over(&socket, path, IDLE_TIMEOUT).await
}

/// Stop-and-wait receive loop over an already-bound socket.
pub(crate) async fn receive_file_over(
    socket: &UdpSocket,
    path: impl AsRef<Path>,
    idle_timeout: Duration,
) -> Result<u64> {
    let path = path.as_ref();
    let mut file = File::create(path)
        .await
        .with_context(|| format!("creating {}", path.display()))?;

    let mut expected: u32 = 0;
    let mut total: u64 = 0;
    let mut finished = false;
    // One byte more than the largest valid packet, so oversized datagrams
    // arrive untruncated and fail decoding instead of passing silently.
    let mut buf = vec![0u8; HEADER_LEN + DATA_PAYLOAD_SIZE + 1];

    loop {
        let (len, peer) = match timeout(idle_timeout, socket.recv_from(&mut buf)).await {
            Ok(Ok(received)) => received,
            Ok(Err(err)) => return Err(err).context("receiving segment"),
            // The sender retransmits its last segment until our ack gets
            // through, so only silence after the final segment means done.
            Err(_) if finished => break,
            Err(_) => bail!(
                "transfer stalled: nothing received for {:?} while waiting for segment {}",
                idle_timeout,
                expected
            ),
        };

        let packet = match DataPacket::decode(&buf[..len]) {
            Ok(packet) => packet,
            Err(err) => {
                warn!("ignoring malformed datagram from {}: {}", peer, err);
                continue;
            }
        };

        if packet.seq == expected {
            file.write_all(&packet.payload)
                .await
                .with_context(|| format!("writing {}", path.display()))?;
            total += packet.payload.len() as u64;
            expected = expected.wrapping_add(1);
            if packet.is_final() {
                file.flush().await?;
                finished = true;
                debug!("final segment {} received", packet.seq);
            }
        } else if packet.seq < expected {
            // Already written; the ack must have been lost. Ack again,
            // write nothing.
            debug!("duplicate segment {} (expecting {})", packet.seq, expected);
        } else {
            warn!(
                "out-of-order segment {} (expecting {}), dropping",
                packet.seq, expected
            );
            continue;
        }

        let ack = AckPacket {
            seq: packet.seq.wrapping_add(1),
        };
        socket.send_to(&ack.encode(), peer).await?;
    }

    info!(
        "received {} ({} bytes, {} segments)",
        path.display(),
        total,
        expected
    );
    Ok(total)
}
