use crate::error::LiveviewError;

/// First byte of every common header.
pub const COMMON_HEADER_START_BYTE: u8 = 0xFF;

/// First four bytes of every payload header.
pub const PAYLOAD_HEADER_START_CODE: [u8; 4] = [0x24, 0x35, 0x68, 0x79];

/// Size of the common header on the wire.
pub const COMMON_HEADER_SIZE: usize = 8;

/// Size of the payload header on the wire (start code, size, padding
/// size, reserved).
pub const PAYLOAD_HEADER_SIZE: usize = 128;

/// Reserved region at the end of the payload header, always skipped.
pub const PAYLOAD_HEADER_RESERVED_SIZE: usize = 120;

/// Body length of a frame-info payload, always skipped.
pub const FRAME_INFO_SIZE: usize = 16;

/// Largest body the 24-bit size field can declare.
pub const MAX_PAYLOAD_SIZE: u32 = 0x00FF_FFFF;

/// Payload type byte of the common header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PayloadType {
    /// JPEG image.
    Image = 0x01,
    /// Frame information (focus frames, face detection), not decoded.
    FrameInfo = 0x02,
}

impl TryFrom<u8> for PayloadType {
    type Error = LiveviewError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(Self::Image),
            0x02 => Ok(Self::FrameInfo),
            other => Err(LiveviewError::UnknownPayloadType(other)),
        }
    }
}

/// Fixed 8-byte prefix of every frame unit.
///
/// Returned by value from [`read_common_header`](super::read_common_header);
/// the sequence number and timestamp are informational only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommonHeader {
    /// Raw payload type byte. Not validated until the payload is read.
    pub payload_type: u8,
    /// 16-bit frame sequence number, wraps.
    pub sequence: u16,
    /// 32-bit camera timestamp in milliseconds.
    pub timestamp: u32,
}

impl CommonHeader {
    /// Decode the seven bytes that follow the start byte.
    pub fn from_bytes(bytes: &[u8; COMMON_HEADER_SIZE - 1]) -> Self {
        Self {
            payload_type: bytes[0],
            sequence: u16::from_be_bytes([bytes[1], bytes[2]]),
            timestamp: u32::from_be_bytes([bytes[3], bytes[4], bytes[5], bytes[6]]),
        }
    }
}

/// Variable fields of the payload header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PayloadHeader {
    /// Body length in bytes (24-bit on the wire).
    pub payload_size: u32,
    /// Bytes of padding after the body.
    pub padding_size: u8,
}

impl PayloadHeader {
    /// Decode the four bytes that follow the start code: a 24-bit size
    /// zero-extended to 32 bits, then the padding size.
    pub fn from_bytes(bytes: &[u8; 4]) -> Self {
        Self {
            payload_size: u32::from_be_bytes([0x00, bytes[0], bytes[1], bytes[2]]),
            padding_size: bytes[3],
        }
    }
}
