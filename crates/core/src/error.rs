//! Error types for the liveview client library.

use std::fmt;

/// Errors that can occur in the liveview client library.
///
/// Variants map to specific failure modes across the stack:
///
/// - **Stream**: [`Io`](Self::Io), [`Framing`](Self::Framing),
///   [`UnknownPayloadType`](Self::UnknownPayloadType): the current
///   connection is unusable and must be re-established.
/// - **HTTP**: [`InvalidUrl`](Self::InvalidUrl),
///   [`InvalidResponse`](Self::InvalidResponse),
///   [`HttpStatus`](Self::HttpStatus).
/// - **Control**: [`Control`](Self::Control), [`Json`](Self::Json): the
///   camera rejected or garbled a command.
/// - **Client**: [`NotConnected`](Self::NotConnected),
///   [`Stopped`](Self::Stopped),
///   [`RetriesExhausted`](Self::RetriesExhausted).
#[derive(Debug, thiserror::Error)]
pub enum LiveviewError {
    /// Underlying I/O or socket error, including short reads.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A sentinel in the liveview stream did not match.
    #[error("framing error: {kind}")]
    Framing { kind: FramingErrorKind },

    /// Payload type other than image (0x01) or frame info (0x02).
    #[error("unknown payload type: {0:#04X}")]
    UnknownPayloadType(u8),

    /// Base URL could not be parsed or uses an unsupported scheme.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// The camera answered with something that is not HTTP/1.x.
    #[error("invalid HTTP response: {kind}")]
    InvalidResponse { kind: ResponseErrorKind },

    /// The camera answered with a non-2xx status.
    #[error("HTTP status {status} {reason}")]
    HttpStatus { status: u16, reason: String },

    /// The camera reported an error in the JSON response to a command.
    #[error("{method} failed with code {code}: {message}")]
    Control {
        method: String,
        code: i64,
        message: String,
    },

    /// JSON encoding of a command failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// [`Client::fetch_frame`](crate::Client::fetch_frame) was called without
    /// an open stream.
    #[error("stream not connected")]
    NotConnected,

    /// The client has been stopped and cannot be used again.
    #[error("client stopped")]
    Stopped,

    /// The reconnect policy gave up.
    #[error("gave up after {attempts} reconnect attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<LiveviewError>,
    },
}

impl LiveviewError {
    /// Whether this error means the current stream connection must be
    /// abandoned and a new one opened.
    pub fn is_stream_fault(&self) -> bool {
        matches!(
            self,
            Self::Io(_)
                | Self::Framing { .. }
                | Self::UnknownPayloadType(_)
                | Self::InvalidResponse { .. }
                | Self::HttpStatus { .. }
                | Self::NotConnected
        )
    }
}

/// Specific kind of framing violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FramingErrorKind {
    /// Common header did not begin with `0xFF`.
    BadStartByte(u8),
    /// Payload header did not begin with `24 35 68 79`.
    BadPayloadMarker([u8; 4]),
}

impl fmt::Display for FramingErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BadStartByte(b) => write!(f, "expected start byte 0xFF, got {:#04X}", b),
            Self::BadPayloadMarker(m) => write!(
                f,
                "expected payload marker 24 35 68 79, got {:02X} {:02X} {:02X} {:02X}",
                m[0], m[1], m[2], m[3]
            ),
        }
    }
}

/// Specific kind of malformed HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseErrorKind {
    /// Connection closed before a status line arrived.
    Empty,
    /// Status line did not have the expected `HTTP/1.x CODE REASON` format.
    InvalidStatusLine,
    /// A header line did not contain a colon separator.
    InvalidHeader,
    /// Response head exceeded the size limit.
    HeadTooLarge,
    /// A chunk-size line in a chunked body was not valid hex.
    InvalidChunkSize,
}

impl fmt::Display for ResponseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty response"),
            Self::InvalidStatusLine => write!(f, "invalid status line"),
            Self::InvalidHeader => write!(f, "invalid header"),
            Self::HeadTooLarge => write!(f, "response head too large"),
            Self::InvalidChunkSize => write!(f, "invalid chunk size"),
        }
    }
}

/// Convenience alias for `Result<T, LiveviewError>`.
pub type Result<T> = std::result::Result<T, LiveviewError>;
