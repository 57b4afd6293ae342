//! Builders for well-formed liveview byte streams.
//!
//! Useful for exercising a decoder or standing in for a camera.

use super::header::{
    COMMON_HEADER_SIZE, COMMON_HEADER_START_BYTE, FRAME_INFO_SIZE, MAX_PAYLOAD_SIZE,
    PAYLOAD_HEADER_SIZE, PAYLOAD_HEADER_START_CODE, PayloadType,
};

pub fn common_header(payload_type: u8, sequence: u16, timestamp: u32) -> [u8; COMMON_HEADER_SIZE] {
    let mut header = [0u8; COMMON_HEADER_SIZE];
    header[0] = COMMON_HEADER_START_BYTE;
    header[1] = payload_type;
    header[2..4].copy_from_slice(&sequence.to_be_bytes());
    header[4..8].copy_from_slice(&timestamp.to_be_bytes());
    header
}

/// Payload header with a zeroed reserved region.
///
/// Only the low 24 bits of `payload_size` are written.
pub fn payload_header(payload_size: u32, padding_size: u8) -> [u8; PAYLOAD_HEADER_SIZE] {
    let mut header = [0u8; PAYLOAD_HEADER_SIZE];
    header[0..4].copy_from_slice(&PAYLOAD_HEADER_START_CODE);
    header[4..7].copy_from_slice(&payload_size.to_be_bytes()[1..4]);
    header[7] = padding_size;
    header
}

/// A complete image frame unit with `padding_size` zero bytes of padding.
///
/// # Panics
///
/// Panics if `jpeg` is longer than the 24-bit size field can describe.
pub fn image_frame(sequence: u16, timestamp: u32, jpeg: &[u8], padding_size: u8) -> Vec<u8> {
    assert!(
        jpeg.len() <= MAX_PAYLOAD_SIZE as usize,
        "image of {} bytes exceeds 24-bit payload size",
        jpeg.len()
    );
    let mut out = Vec::with_capacity(
        COMMON_HEADER_SIZE + PAYLOAD_HEADER_SIZE + jpeg.len() + padding_size as usize,
    );
    out.extend_from_slice(&common_header(PayloadType::Image as u8, sequence, timestamp));
    out.extend_from_slice(&payload_header(jpeg.len() as u32, padding_size));
    out.extend_from_slice(jpeg);
    out.resize(out.len() + padding_size as usize, 0);
    out
}

/// A complete frame-info unit with a zeroed 16-byte body.
pub fn frame_info(sequence: u16, timestamp: u32, padding_size: u8) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&common_header(PayloadType::FrameInfo as u8, sequence, timestamp));
    out.extend_from_slice(&payload_header(FRAME_INFO_SIZE as u32, padding_size));
    out.resize(out.len() + FRAME_INFO_SIZE + padding_size as usize, 0);
    out
}
