use std::io::{self, Read};

use super::header::{
    COMMON_HEADER_SIZE, COMMON_HEADER_START_BYTE, CommonHeader, FRAME_INFO_SIZE,
    PAYLOAD_HEADER_RESERVED_SIZE, PAYLOAD_HEADER_START_CODE, PayloadHeader, PayloadType,
};
use crate::error::{FramingErrorKind, LiveviewError, Result};

/// Initial allocation cap for image bodies. A corrupt size field must not
/// reserve 16 MiB before the stream proves it has the bytes.
const INITIAL_BODY_CAPACITY: usize = 256 * 1024;

/// A decoded JPEG image from the liveview stream.
///
/// Produced fresh by every successful [`fetch_frame`]; the decoder keeps no
/// reference to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub sequence: u16,
    pub timestamp: u32,
    /// Raw JPEG bytes, exactly as many as the payload header declared.
    pub jpeg: Vec<u8>,
}

impl Frame {
    /// Build a frame from a decoded unit; `None` for frame-info payloads.
    pub fn from_unit(common: CommonHeader, payload: Payload) -> Option<Self> {
        match payload {
            Payload::Image(jpeg) => {
                tracing::debug!(
                    sequence = common.sequence,
                    timestamp = common.timestamp,
                    size = jpeg.len(),
                    "image frame"
                );
                Some(Self {
                    sequence: common.sequence,
                    timestamp: common.timestamp,
                    jpeg,
                })
            }
            Payload::FrameInfo => None,
        }
    }

    pub fn len(&self) -> usize {
        self.jpeg.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jpeg.is_empty()
    }
}

/// Result of reading one payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Image(Vec<u8>),
    /// A frame-info payload was consumed; no image this time.
    FrameInfo,
}

/// Read and validate the 8-byte common header.
///
/// Fails with [`FramingErrorKind::BadStartByte`] after consuming only the
/// first byte if it is not `0xFF`.
pub fn read_common_header<R: Read>(reader: &mut R) -> Result<CommonHeader> {
    let mut start = [0u8; 1];
    reader.read_exact(&mut start)?;
    if start[0] != COMMON_HEADER_START_BYTE {
        return Err(LiveviewError::Framing {
            kind: FramingErrorKind::BadStartByte(start[0]),
        });
    }

    let mut rest = [0u8; COMMON_HEADER_SIZE - 1];
    reader.read_exact(&mut rest)?;
    let header = CommonHeader::from_bytes(&rest);

    tracing::trace!(
        payload_type = header.payload_type,
        sequence = header.sequence,
        timestamp = header.timestamp,
        "common header"
    );

    Ok(header)
}

/// Read and validate the 128-byte payload header, skipping the reserved
/// region.
pub fn read_payload_header<R: Read>(reader: &mut R) -> Result<PayloadHeader> {
    let mut start_code = [0u8; 4];
    reader.read_exact(&mut start_code)?;
    if start_code != PAYLOAD_HEADER_START_CODE {
        return Err(LiveviewError::Framing {
            kind: FramingErrorKind::BadPayloadMarker(start_code),
        });
    }

    let mut fields = [0u8; 4];
    reader.read_exact(&mut fields)?;
    let header = PayloadHeader::from_bytes(&fields);

    let mut reserved = [0u8; PAYLOAD_HEADER_RESERVED_SIZE];
    reader.read_exact(&mut reserved)?;

    Ok(header)
}

/// Read the payload header and body that follow `common`, then consume
/// any padding so the reader is left at the next common header.
pub fn read_payload<R: Read>(reader: &mut R, common: &CommonHeader) -> Result<Payload> {
    let header = read_payload_header(reader)?;
    let payload_type = PayloadType::try_from(common.payload_type)?;

    let payload = match payload_type {
        PayloadType::Image => Payload::Image(read_body(reader, header.payload_size as usize)?),
        PayloadType::FrameInfo => {
            skip(reader, FRAME_INFO_SIZE)?;
            tracing::trace!(sequence = common.sequence, "frame info skipped");
            Payload::FrameInfo
        }
    };

    if header.padding_size != 0 {
        skip(reader, header.padding_size as usize)?;
    }

    Ok(payload)
}

/// Read one complete frame unit: common header, payload header, body and
/// padding.
pub fn read_unit<R: Read>(reader: &mut R) -> Result<(CommonHeader, Payload)> {
    let common = read_common_header(reader)?;
    let payload = read_payload(reader, &common)?;
    Ok((common, payload))
}

/// Decode one frame unit.
///
/// Returns `Ok(None)` for frame-info payloads: nothing to show, but the
/// stream is still in sync and the next call starts at a fresh header.
/// Any error leaves the stream at an unknown offset.
pub fn fetch_frame<R: Read>(reader: &mut R) -> Result<Option<Frame>> {
    let (common, payload) = read_unit(reader)?;
    Ok(Frame::from_unit(common, payload))
}

fn read_body<R: Read>(reader: &mut R, size: usize) -> Result<Vec<u8>> {
    let mut body = Vec::with_capacity(size.min(INITIAL_BODY_CAPACITY));
    reader.by_ref().take(size as u64).read_to_end(&mut body)?;
    if body.len() != size {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    Ok(body)
}

fn skip<R: Read>(reader: &mut R, len: usize) -> Result<()> {
    let skipped = io::copy(&mut reader.by_ref().take(len as u64), &mut io::sink())?;
    if skipped != len as u64 {
        return Err(io::Error::from(io::ErrorKind::UnexpectedEof).into());
    }
    Ok(())
}
