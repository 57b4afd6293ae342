use std::io::{BufRead, Read};

use crate::error::{LiveviewError, ResponseErrorKind, Result};

/// Upper bound on the status line plus headers.
pub const MAX_HEAD_SIZE: usize = 64 * 1024;

/// A parsed HTTP/1.x response head (status line and headers).
///
/// Header lookup is case-insensitive. The body is not part of the head;
/// see [`Body`](super::Body).
#[derive(Debug)]
pub struct ResponseHead {
    /// Protocol version as sent (e.g. `HTTP/1.1`).
    pub version: String,
    pub status_code: u16,
    pub reason: String,
    /// Headers as ordered (name, value) pairs, names stored as received.
    pub headers: Vec<(String, String)>,
}

impl ResponseHead {
    /// Read a response head from `reader`, leaving it positioned at the
    /// first body byte.
    pub fn read_from<R: BufRead>(reader: &mut R) -> Result<Self> {
        let mut consumed = 0usize;
        let mut lines = Vec::new();

        loop {
            let mut line = String::new();
            let limit = (MAX_HEAD_SIZE - consumed + 1) as u64;
            let n = (&mut *reader).take(limit).read_line(&mut line)?;
            if n == 0 {
                if lines.is_empty() {
                    return Err(LiveviewError::InvalidResponse {
                        kind: ResponseErrorKind::Empty,
                    });
                }
                return Err(std::io::Error::from(std::io::ErrorKind::UnexpectedEof).into());
            }
            consumed += n;
            if consumed > MAX_HEAD_SIZE {
                return Err(LiveviewError::InvalidResponse {
                    kind: ResponseErrorKind::HeadTooLarge,
                });
            }
            if line == "\r\n" || line == "\n" {
                break;
            }
            lines.push(line);
        }

        Self::parse(&lines.concat())
    }

    /// Parse a response head from its text representation.
    pub fn parse(raw: &str) -> Result<Self> {
        let mut lines = raw.lines();

        let status_line = lines.next().ok_or(LiveviewError::InvalidResponse {
            kind: ResponseErrorKind::Empty,
        })?;

        let mut parts = status_line.splitn(3, ' ');
        let version = parts.next().unwrap_or_default();
        let code = parts.next().unwrap_or_default();
        let reason = parts.next().unwrap_or_default().trim();

        if !version.starts_with("HTTP/1.") {
            return Err(LiveviewError::InvalidResponse {
                kind: ResponseErrorKind::InvalidStatusLine,
            });
        }

        let status_code: u16 = code.parse().map_err(|_| LiveviewError::InvalidResponse {
            kind: ResponseErrorKind::InvalidStatusLine,
        })?;

        let mut headers = Vec::new();

        for line in lines {
            if line.is_empty() {
                break;
            }

            let colon_pos = line.find(':').ok_or(LiveviewError::InvalidResponse {
                kind: ResponseErrorKind::InvalidHeader,
            })?;

            let name = line[..colon_pos].trim().to_string();
            let value = line[colon_pos + 1..].trim().to_string();

            headers.push((name, value));
        }

        Ok(ResponseHead {
            version: version.to_string(),
            status_code,
            reason: reason.to_string(),
            headers,
        })
    }

    /// Look up a header value by name (case-insensitive).
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Parsed `Content-Length`, if present and valid.
    pub fn content_length(&self) -> Option<u64> {
        self.get_header("Content-Length")
            .and_then(|v| v.parse().ok())
    }

    /// Whether the body uses chunked transfer coding.
    pub fn is_chunked(&self) -> bool {
        self.get_header("Transfer-Encoding")
            .map(|v| {
                v.split(',')
                    .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
            })
            .unwrap_or(false)
    }
}
