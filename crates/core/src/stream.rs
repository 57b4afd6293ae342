//! Liveview stream session.
//!
//! One session is one `GET /liveview/liveviewstream` request whose response
//! body stays open for as long as the camera streams. Sessions are never
//! reused: after any read failure the session is dropped and a new one is
//! opened, which also resets decoding to "expect a common header".

use std::io::{self, BufReader, Read};
use std::net::{Shutdown, TcpStream};
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;
use crate::http::{self, BaseUrl, Body, HttpRequest};
use crate::protocol::{self, Frame};

/// Default liveview endpoint path.
pub const DEFAULT_STREAM_PATH: &str = "/liveview/liveviewstream";

/// Shuts down a session's socket from another thread.
///
/// Closing makes any blocked read on the session fail, which is the only way
/// to interrupt a read in progress.
#[derive(Debug, Clone)]
pub struct StreamHandle {
    socket: Arc<TcpStream>,
}

impl StreamHandle {
    pub fn close(&self) {
        if let Err(e) = self.socket.shutdown(Shutdown::Both) {
            if e.kind() != io::ErrorKind::NotConnected {
                tracing::debug!(error = %e, "stream shutdown failed");
            }
        }
    }
}

/// An open liveview response body.
///
/// Implements [`Read`] over the de-framed body bytes, so the frame decoder
/// can run against it directly.
pub struct StreamSession {
    body: Body<BufReader<TcpStream>>,
    handle: StreamHandle,
}

impl StreamSession {
    /// Open the liveview stream at `path` under `url`.
    ///
    /// `read_timeout` bounds how long a single read may block; `None`
    /// blocks until data arrives or the socket is closed.
    ///
    /// `on_open` receives the session's handle as soon as the TCP
    /// connection exists, before the request is sent, so the wait for the
    /// response head can be interrupted too.
    pub fn connect<F>(
        url: &BaseUrl,
        path: &str,
        connect_timeout: Duration,
        read_timeout: Option<Duration>,
        on_open: F,
    ) -> Result<Self>
    where
        F: FnOnce(&StreamHandle),
    {
        let stream = http::open(url, connect_timeout)?;
        stream.set_read_timeout(read_timeout)?;
        let handle = StreamHandle {
            socket: Arc::new(stream.try_clone()?),
        };
        on_open(&handle);

        let request = HttpRequest::get(&url.join(path), &url.authority()).add_header("Accept", "*/*");
        let (head, body) = http::exchange(stream, &request)?;

        tracing::info!(
            %url,
            path,
            chunked = head.is_chunked(),
            "liveview stream connected"
        );

        Ok(Self { body, handle })
    }

    /// Decode the next frame unit from this session.
    pub fn fetch_frame(&mut self) -> Result<Option<Frame>> {
        protocol::fetch_frame(self)
    }

    /// Release the connection.
    pub fn close(self) {
        tracing::debug!("liveview stream closed");
    }
}

impl Read for StreamSession {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.body.read(buf)
    }
}

impl Drop for StreamSession {
    fn drop(&mut self) {
        self.handle.close();
    }
}
