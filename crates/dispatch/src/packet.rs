//! Fixed 15-byte frame sent over the serial link:
//! `HEADER | PAYLOAD_LEN | 12 payload bytes | checksum`.

use shared::domain::Route;
use thiserror::Error;

pub const HEADER: u8 = 0xAA;
pub const PAYLOAD_LEN: usize = 12;
pub const FRAME_LEN: usize = PAYLOAD_LEN + 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("frame must be 15 bytes, got {0}")]
    FrameLength(usize),
    #[error("unexpected header byte {0:#04x}")]
    Header(u8),
    #[error("unexpected length byte {0}")]
    Length(u8),
    #[error("checksum mismatch: frame carries {carried:#04x}, payload sums to {computed:#04x}")]
    Checksum { carried: u8, computed: u8 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketFrame([u8; FRAME_LEN]);

impl PacketFrame {
    pub fn as_bytes(&self) -> &[u8; FRAME_LEN] {
        &self.0
    }

    pub fn payload(&self) -> &[u8] {
        &self.0[2..2 + PAYLOAD_LEN]
    }

    pub fn checksum(&self) -> u8 {
        self.0[FRAME_LEN - 1]
    }
}

pub fn checksum(payload: &[u8; PAYLOAD_LEN]) -> u8 {
    payload
        .iter()
        .fold(HEADER.wrapping_add(PAYLOAD_LEN as u8), |acc, b| acc.wrapping_add(*b))
}

/// Payload longer than 12 bytes is truncated, shorter is zero-padded.
pub fn encode_payload(data: &[u8]) -> PacketFrame {
    let mut payload = [0u8; PAYLOAD_LEN];
    let used = data.len().min(PAYLOAD_LEN);
    payload[..used].copy_from_slice(&data[..used]);

    let mut frame = [0u8; FRAME_LEN];
    frame[0] = HEADER;
    frame[1] = PAYLOAD_LEN as u8;
    frame[2..2 + PAYLOAD_LEN].copy_from_slice(&payload);
    frame[FRAME_LEN - 1] = checksum(&payload);
    PacketFrame(frame)
}

pub fn encode(route: &Route) -> PacketFrame {
    encode_payload(&route.to_bytes())
}

pub fn decode(bytes: &[u8]) -> Result<[u8; PAYLOAD_LEN], PacketError> {
    if bytes.len() != FRAME_LEN {
        return Err(PacketError::FrameLength(bytes.len()));
    }
    if bytes[0] != HEADER {
        return Err(PacketError::Header(bytes[0]));
    }
    if usize::from(bytes[1]) != PAYLOAD_LEN {
        return Err(PacketError::Length(bytes[1]));
    }

    let mut payload = [0u8; PAYLOAD_LEN];
    payload.copy_from_slice(&bytes[2..2 + PAYLOAD_LEN]);
    let computed = checksum(&payload);
    let carried = bytes[FRAME_LEN - 1];
    if carried != computed {
        return Err(PacketError::Checksum { carried, computed });
    }
    Ok(payload)
}
