use std::path::PathBuf;
use std::time::Duration;

use bytes::Bytes;
use tokio::net::UdpSocket;

use super::packet::{AckPacket, DataPacket, DATA_PAYLOAD_SIZE};
use super::receiver::receive_file_over;
use super::sender::send_file_over;

fn temp_path(tag: &str) -> PathBuf {
    std::env::temp_dir().join(format!("dv-transfer-{}-{}", std::process::id(), tag))
}

#[test]
fn data_packet_round_trips() {
    let packet = DataPacket {
        seq: 7,
        payload: Bytes::from_static(b"hello"),
    };
    let encoded = packet.encode();
    assert_eq!(encoded.len(), 4 + 5);

    let decoded = DataPacket::decode(&encoded).unwrap();
    assert_eq!(decoded, packet);
    assert!(decoded.is_final());
}

#[test]
fn full_segment_is_not_final() {
    let packet = DataPacket {
        seq: 0,
        payload: Bytes::from(vec![0xAB; DATA_PAYLOAD_SIZE]),
    };
    assert!(!packet.is_final());
    assert!(!DataPacket::decode(&packet.encode()).unwrap().is_final());
}

#[test]
fn decode_rejects_malformed_packets() {
    assert!(DataPacket::decode(&[0, 1]).is_err());
    assert!(DataPacket::decode(&vec![0u8; 4 + DATA_PAYLOAD_SIZE + 1]).is_err());
    assert!(AckPacket::decode(&[1, 2, 3]).is_err());

    let ack = AckPacket { seq: 41 };
    assert_eq!(AckPacket::decode(&ack.encode()).unwrap(), ack);
}

#[tokio::test]
async fn transfers_a_file_over_loopback() {
    let source = temp_path("loopback-src");
    let dest = temp_path("loopback-dst");
    let content: Vec<u8> = (0..2500u32).map(|i| (i % 251) as u8).collect();
    tokio::fs::write(&source, &content).await.unwrap();

    let receiver_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = receiver_socket.local_addr().unwrap();
    let dest_for_task = dest.clone();
    let receiver = tokio::spawn(async move {
        receive_file_over(&receiver_socket, &dest_for_task, Duration::from_millis(500)).await
    });

    let sender_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender_socket.connect(addr).await.unwrap();
    let sent = send_file_over(&sender_socket, &source, Duration::from_millis(250))
        .await
        .unwrap();
    assert_eq!(sent, 2500);

    let received = receiver.await.unwrap().unwrap();
    assert_eq!(received, 2500);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), content);

    let _ = tokio::fs::remove_file(&source).await;
    let _ = tokio::fs::remove_file(&dest).await;
}

#[tokio::test]
async fn exact_multiple_is_closed_by_an_empty_segment() {
    let source = temp_path("exact-src");
    let dest = temp_path("exact-dst");
    let content = vec![0x5Au8; DATA_PAYLOAD_SIZE];
    tokio::fs::write(&source, &content).await.unwrap();

    let receiver_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = receiver_socket.local_addr().unwrap();
    let dest_for_task = dest.clone();
    let receiver = tokio::spawn(async move {
        receive_file_over(&receiver_socket, &dest_for_task, Duration::from_millis(500)).await
    });

    let sender_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender_socket.connect(addr).await.unwrap();
    let sent = send_file_over(&sender_socket, &source, Duration::from_millis(250))
        .await
        .unwrap();
    assert_eq!(sent, DATA_PAYLOAD_SIZE as u64);

    assert_eq!(receiver.await.unwrap().unwrap(), DATA_PAYLOAD_SIZE as u64);
    assert_eq!(tokio::fs::read(&dest).await.unwrap(), content);

    let _ = tokio::fs::remove_file(&source).await;
    let _ = tokio::fs::remove_file(&dest).await;
}

#[tokio::test]
async fn duplicate_segment_is_reacked_but_written_once() {
    let dest = temp_path("dup-dst");
    let receiver_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = receiver_socket.local_addr().unwrap();
    let dest_for_task = dest.clone();
    let receiver = tokio::spawn(async move {
        receive_file_over(&receiver_socket, &dest_for_task, Duration::from_millis(400)).await
    });

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.connect(addr).await.unwrap();
    let mut ack_buf = [0u8; 8];

    let first = DataPacket {
        seq: 0,
        payload: Bytes::from(vec![1u8; DATA_PAYLOAD_SIZE]),
    };
    sender.send(&first.encode()).await.unwrap();
    let len = sender.recv(&mut ack_buf).await.unwrap();
    assert_eq!(AckPacket::decode(&ack_buf[..len]).unwrap().seq, 1);

    // The same segment again: acked again, written only once.
    sender.send(&first.encode()).await.unwrap();
    let len = sender.recv(&mut ack_buf).await.unwrap();
    assert_eq!(AckPacket::decode(&ack_buf[..len]).unwrap().seq, 1);

    let last = DataPacket {
        seq: 1,
        payload: Bytes::from_static(b"tail"),
    };
    sender.send(&last.encode()).await.unwrap();
    let len = sender.recv(&mut ack_buf).await.unwrap();
    assert_eq!(AckPacket::decode(&ack_buf[..len]).unwrap().seq, 2);

    let total = receiver.await.unwrap().unwrap();
    assert_eq!(total, (DATA_PAYLOAD_SIZE + 4) as u64);
    let written = tokio::fs::read(&dest).await.unwrap();
    assert_eq!(written.len(), DATA_PAYLOAD_SIZE + 4);
    assert_eq!(&written[DATA_PAYLOAD_SIZE..], b"tail");

    let _ = tokio::fs::remove_file(&dest).await;
}

#[tokio::test]
async fn receiver_errors_when_the_transfer_stalls() {
    let dest = temp_path("stall-dst");
    let receiver_socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = receiver_socket.local_addr().unwrap();
    let dest_for_task = dest.clone();
    let receiver = tokio::spawn(async move {
        receive_file_over(&receiver_socket, &dest_for_task, Duration::from_millis(200)).await
    });

    // A full segment promises more data, then the sender goes silent.
    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.connect(addr).await.unwrap();
    let only = DataPacket {
        seq: 0,
        payload: Bytes::from(vec![9u8; DATA_PAYLOAD_SIZE]),
    };
    sender.send(&only.encode()).await.unwrap();

    assert!(receiver.await.unwrap().is_err());

    let _ = tokio::fs::remove_file(&dest).await;
}

#[tokio::test]
async fn sender_retransmits_until_acked() {
    let source = temp_path("retry-src");
    tokio::fs::write(&source, b"retry me").await.unwrap();

    let fake_receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = fake_receiver.local_addr().unwrap();
    let fake = tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        // Swallow the first copy, ack only the retransmission.
        let (len, _) = fake_receiver.recv_from(&mut buf).await.unwrap();
        let first = DataPacket::decode(&buf[..len]).unwrap();
        let (len, peer) = fake_receiver.recv_from(&mut buf).await.unwrap();
        let second = DataPacket::decode(&buf[..len]).unwrap();
        assert_eq!(first, second);

        let ack = AckPacket {
            seq: second.seq.wrapping_add(1),
        };
        fake_receiver.send_to(&ack.encode(), peer).await.unwrap();
    });

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.connect(addr).await.unwrap();
    let sent = send_file_over(&sender, &source, Duration::from_millis(100))
        .await
        .unwrap();
    assert_eq!(sent, 8);
    fake.await.unwrap();

    let _ = tokio::fs::remove_file(&source).await;
}

#[tokio::test]
async fn stale_ack_does_not_advance_the_sender() {
    let source = temp_path("stale-src");
    tokio::fs::write(&source, b"stale ack").await.unwrap();

    let fake_receiver = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let addr = fake_receiver.local_addr().unwrap();
    let fake = tokio::spawn(async move {
        let mut buf = [0u8; 2048];
        let (len, peer) = fake_receiver.recv_from(&mut buf).await.unwrap();
        let packet = DataPacket::decode(&buf[..len]).unwrap();

        // Wrong ack first: the sender must resend instead of moving on.
        let stale = AckPacket { seq: packet.seq };
        fake_receiver.send_to(&stale.encode(), peer).await.unwrap();

        let (len, peer) = fake_receiver.recv_from(&mut buf).await.unwrap();
        let resent = DataPacket::decode(&buf[..len]).unwrap();
        assert_eq!(resent, packet);

        let good = AckPacket {
            seq: packet.seq.wrapping_add(1),
        };
        fake_receiver.send_to(&good.encode(), peer).await.unwrap();
    });

    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    sender.connect(addr).await.unwrap();
    let sent = send_file_over(&sender, &source, Duration::from_millis(100))
        .await
        .unwrap();
    assert_eq!(sent, 9);
    fake.await.unwrap();

    let _ = tokio::fs::remove_file(&source).await;
}
