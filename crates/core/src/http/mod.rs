//! Minimal HTTP/1.1 client transport.
//!
//! The camera exposes two kinds of endpoints, both plain HTTP/1.1:
//!
//! - **Control** (`POST /sony/camera`): a short JSON request/response
//!   round trip on its own connection (`Connection: close`).
//! - **Liveview** (`GET /liveview/liveviewstream`): a response whose body
//!   never ends during normal operation and carries the framed JPEG stream.
//!
//! Only what those two exchanges need is implemented: request
//! serialization, response head parsing, and a body reader that handles
//! `Content-Length`, `Transfer-Encoding: chunked`, and read-until-close.
//!
//! ```text
//! POST /sony/camera HTTP/1.1\r\n
//! Host: 192.168.122.1:8080\r\n
//! Content-Type: application/json\r\n
//! Content-Length: 56\r\n
//! \r\n
//! {"method":"startLiveview","params":[],"id":1,"version":"1.0"}
//! ```

pub mod body;
pub mod request;
pub mod response;
pub mod url;

use std::io::{BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use crate::error::{LiveviewError, Result};

pub use body::Body;
pub use request::HttpRequest;
pub use response::ResponseHead;
pub use self::url::BaseUrl;

/// Open a TCP connection to the host named by `url`.
///
/// Every resolved address is tried in turn; the last error is returned if
/// none accepts within `timeout`.
pub fn open(url: &BaseUrl, timeout: Duration) -> Result<TcpStream> {
    let mut last_err = None;
    for addr in (url.host(), url.port()).to_socket_addrs()? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(e) => last_err = Some(e),
        }
    }
    Err(match last_err {
        Some(e) => LiveviewError::Io(e),
        None => LiveviewError::InvalidUrl(format!("{} did not resolve", url.host())),
    })
}

/// Send `request` on `stream` and parse the response head.
///
/// Returns the head and a reader positioned at the first body byte.
/// Non-2xx responses are turned into [`LiveviewError::HttpStatus`].
pub fn exchange(
    mut stream: TcpStream,
    request: &HttpRequest,
) -> Result<(ResponseHead, Body<BufReader<TcpStream>>)> {
    stream.write_all(&request.serialize())?;
    stream.flush()?;

    let mut reader = BufReader::new(stream);
    let head = ResponseHead::read_from(&mut reader)?;

    tracing::debug!(
        method = request.method,
        path = %request.path,
        version = %head.version,
        status = head.status_code,
        "HTTP exchange"
    );

    if !head.is_success() {
        return Err(LiveviewError::HttpStatus {
            status: head.status_code,
            reason: head.reason.clone(),
        });
    }

    let body = Body::new(reader, &head);
    Ok((head, body))
}
