use std::io::{self, BufRead, Read};

use super::ResponseHead;
use crate::error::{LiveviewError, ResponseErrorKind};

/// Longest chunk-size or trailer line accepted in a chunked body.
const MAX_CHUNK_LINE: u64 = 4096;

/// Response body reader.
///
/// Strips the HTTP message framing so callers see only payload bytes.
/// Chosen from the response head in this order:
///
/// 1. `Transfer-Encoding: chunked`
/// 2. `Content-Length`
/// 3. read until the server closes the connection
///
/// The liveview endpoint normally uses (1) or (3) since its body is
/// unbounded.
pub struct Body<R> {
    inner: R,
    framing: Framing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Framing {
    Length { remaining: u64 },
    Chunked(ChunkState),
    UntilClose,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChunkState {
    /// Expecting a chunk-size line.
    Size,
    /// Inside chunk data.
    Data { remaining: u64 },
    /// Expecting the CRLF that ends chunk data.
    DataEnd,
    /// Last chunk and trailers consumed.
    Done,
}

impl<R: BufRead> Body<R> {
    pub fn new(inner: R, head: &ResponseHead) -> Self {
        let framing = if head.is_chunked() {
            Framing::Chunked(ChunkState::Size)
        } else if let Some(len) = head.content_length() {
            Framing::Length { remaining: len }
        } else {
            Framing::UntilClose
        };
        tracing::trace!(?framing, "response body framing");
        Self { inner, framing }
    }

    fn read_line(&mut self) -> io::Result<String> {
        let mut line = String::new();
        let n = (&mut self.inner).take(MAX_CHUNK_LINE).read_line(&mut line)?;
        if n == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        if !line.ends_with('\n') {
            return Err(invalid_chunk());
        }
        Ok(line)
    }

    fn read_chunked(&mut self, mut state: ChunkState, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            match state {
                ChunkState::Done => return Ok(0),
                ChunkState::Size => {
                    let line = self.read_line()?;
                    let size_str = line.split(';').next().unwrap_or_default().trim();
                    let size = u64::from_str_radix(size_str, 16).map_err(|_| invalid_chunk())?;
                    state = if size == 0 {
                        while !self.read_line()?.trim().is_empty() {}
                        ChunkState::Done
                    } else {
                        ChunkState::Data { remaining: size }
                    };
                }
                ChunkState::Data { remaining } => {
                    let max = buf.len().min(remaining.min(usize::MAX as u64) as usize);
                    let n = self.inner.read(&mut buf[..max])?;
                    if n == 0 {
                        return Err(io::ErrorKind::UnexpectedEof.into());
                    }
                    let remaining = remaining - n as u64;
                    self.framing = Framing::Chunked(if remaining == 0 {
                        ChunkState::DataEnd
                    } else {
                        ChunkState::Data { remaining }
                    });
                    return Ok(n);
                }
                ChunkState::DataEnd => {
                    if !self.read_line()?.trim().is_empty() {
                        return Err(invalid_chunk());
                    }
                    state = ChunkState::Size;
                }
            }
            self.framing = Framing::Chunked(state);
        }
    }
}

impl<R: BufRead> Read for Body<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        match self.framing {
            Framing::UntilClose => self.inner.read(buf),
            Framing::Length { remaining } => {
                if remaining == 0 {
                    return Ok(0);
                }
                let max = buf.len().min(remaining.min(usize::MAX as u64) as usize);
                let n = self.inner.read(&mut buf[..max])?;
                if n == 0 {
                    return Err(io::ErrorKind::UnexpectedEof.into());
                }
                self.framing = Framing::Length {
                    remaining: remaining - n as u64,
                };
                Ok(n)
            }
            Framing::Chunked(state) => self.read_chunked(state, buf),
        }
    }
}

fn invalid_chunk() -> io::Error {
    io::Error::new(
        io::ErrorKind::InvalidData,
        LiveviewError::InvalidResponse {
            kind: ResponseErrorKind::InvalidChunkSize,
        },
    )
}
