use anyhow::{bail, Result};
use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Payload bytes carried by a full data segment.
pub const DATA_PAYLOAD_SIZE: usize = 1000;
/// Big-endian sequence number in front of every packet.
pub const HEADER_LEN: usize = 4;

/// One data segment: sequence number, then up to [`DATA_PAYLOAD_SIZE`]
/// payload bytes. A short payload marks the last segment of the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataPacket {
    pub seq: u32,
    pub payload: Bytes,
}

impl DataPacket {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.payload.len());
        buf.put_u32(self.seq);
        buf.put_slice(&self.payload);
        buf.freeze()
    }

    pub fn decode(mut data: &[u8]) -> Result<DataPacket> {
        if data.len() < HEADER_LEN {
            bail!("data packet too short: {} bytes", data.len());
        }
        if data.len() > HEADER_LEN + DATA_PAYLOAD_SIZE {
            bail!("data packet too long: {} bytes", data.len());
        }
        let seq = data.get_u32();
        Ok(DataPacket {
            seq,
            payload: Bytes::copy_from_slice(data),
        })
    }

    /// True for the segment that ends the transfer.
    pub fn is_final(&self) -> bool {
        self.payload.len() < DATA_PAYLOAD_SIZE
    }
}

/// Acknowledgment naming the next sequence number the receiver expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AckPacket {
    pub seq: u32,
}

impl AckPacket {
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(HEADER_LEN);
        buf.put_u32(self.seq);
        buf.freeze()
    }

    pub fn decode(mut data: &[u8]) -> Result<AckPacket> {
        if data.len() != HEADER_LEN {
            bail!("ack packet must be {} bytes, got {}", HEADER_LEN, data.len());
        }
        Ok(AckPacket {
            seq: data.get_u32(),
        })
    }
}
