//! Camera control channel.
//!
//! Commands are JSON-RPC-like objects POSTed to the control endpoint, one
//! connection per command:
//!
//! ```text
//! POST /sony/camera
//! {"method":"startLiveview","params":[],"id":1,"version":"1.0"}
//!
//! 200 OK
//! {"result":["http://192.168.122.1:8080/liveview/liveviewstream"],"id":1}
//! ```
//!
//! The camera reports failures in-band as `{"error":[code,"message"],"id":1}`.
//! Bodies that are empty or not JSON are accepted as success.

use std::io::Read;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{LiveviewError, Result};
use crate::http::{self, BaseUrl, HttpRequest};

/// Default control endpoint path.
pub const DEFAULT_CONTROL_PATH: &str = "/sony/camera";

/// Switches the camera into remote capture mode.
pub const START_REC_MODE: &str = "startRecMode";
/// Starts the liveview stream.
pub const START_LIVEVIEW: &str = "startLiveview";
/// Stops the liveview stream.
pub const STOP_LIVEVIEW: &str = "stopLiveview";

/// Largest control response body that is read.
const MAX_RESPONSE_BODY: u64 = 1024 * 1024;

const API_VERSION: &str = "1.0";
const REQUEST_ID: u32 = 1;

#[derive(Debug, Serialize)]
struct CommandRequest<'a> {
    method: &'a str,
    params: &'a [Value],
    id: u32,
    version: &'static str,
}

impl<'a> CommandRequest<'a> {
    fn new(method: &'a str) -> Self {
        Self {
            method,
            params: &[],
            id: REQUEST_ID,
            version: API_VERSION,
        }
    }
}

#[derive(Debug, Deserialize)]
struct CommandResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<(i64, String)>,
}

/// Sends commands to the camera's control endpoint.
#[derive(Debug, Clone)]
pub struct ControlChannel {
    url: BaseUrl,
    path: String,
    connect_timeout: Duration,
    io_timeout: Duration,
}

impl ControlChannel {
    pub fn new(url: BaseUrl, path: &str, connect_timeout: Duration, io_timeout: Duration) -> Self {
        Self {
            url,
            path: path.to_string(),
            connect_timeout,
            io_timeout,
        }
    }

    /// Send `method` with empty params.
    ///
    /// Returns the `result` value of the response, or `Value::Null` when
    /// the camera sent none. Network failures, non-2xx statuses and in-band
    /// camera errors are returned as errors.
    pub fn send_command(&self, method: &str) -> Result<Value> {
        let body = serde_json::to_vec(&CommandRequest::new(method))?;

        let stream = http::open(&self.url, self.connect_timeout)?;
        stream.set_read_timeout(Some(self.io_timeout))?;
        stream.set_write_timeout(Some(self.io_timeout))?;

        let request = HttpRequest::post(&self.url.join(&self.path), &self.url.authority())
            .add_header("Content-Type", "application/json")
            .add_header("Accept", "application/json")
            .add_header("Connection", "close")
            .with_body(body);

        let (_head, body) = http::exchange(stream, &request)?;

        let mut raw = Vec::new();
        if let Err(e) = body.take(MAX_RESPONSE_BODY).read_to_end(&mut raw) {
            tracing::debug!(method, error = %e, "control response body unreadable");
            return Ok(Value::Null);
        }

        let result = interpret_response(method, &raw)?;
        tracing::debug!(method, %result, "control command sent");
        Ok(result)
    }
}

/// Turn a control response body into its `result`, or a
/// [`LiveviewError::Control`] if the camera reported an error.
fn interpret_response(method: &str, raw: &[u8]) -> Result<Value> {
    let response: CommandResponse = match serde_json::from_slice(raw) {
        Ok(response) => response,
        Err(e) => {
            tracing::debug!(method, error = %e, "control response is not a command response");
            return Ok(Value::Null);
        }
    };

    if let Some((code, message)) = response.error {
        return Err(LiveviewError::Control {
            method: method.to_string(),
            code,
            message,
        });
    }

    Ok(response.result.unwrap_or(Value::Null))
}
