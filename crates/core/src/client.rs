use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::backoff::{Backoff, ReconnectPolicy};
use crate::control::{
    ControlChannel, DEFAULT_CONTROL_PATH, START_LIVEVIEW, START_REC_MODE, STOP_LIVEVIEW,
};
use crate::error::{LiveviewError, Result};
use crate::http::BaseUrl;
use crate::protocol::{self, CommonHeader, Frame};
use crate::stream::{DEFAULT_STREAM_PATH, StreamHandle, StreamSession};

/// Client-level configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Timeout for establishing any TCP connection to the camera.
    pub connect_timeout: Duration,
    /// Read/write timeout for control commands.
    pub control_timeout: Duration,
    /// Read timeout on the liveview stream. A stream that stays silent this
    /// long is treated as broken. `None` blocks indefinitely.
    pub stream_read_timeout: Option<Duration>,
    /// Control endpoint path under the base URL.
    pub control_path: String,
    /// Liveview endpoint path under the base URL.
    pub stream_path: String,
    /// Pacing of reconnects in [`Client::run`].
    pub reconnect: ReconnectPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            control_timeout: Duration::from_secs(10),
            stream_read_timeout: Some(Duration::from_secs(10)),
            control_path: DEFAULT_CONTROL_PATH.to_string(),
            stream_path: DEFAULT_STREAM_PATH.to_string(),
            reconnect: ReconnectPolicy::default(),
        }
    }
}

/// Client lifecycle.
///
/// ```text
/// start()            -> Ready
/// connect()          -> Streaming
/// fetch_frame() err  -> Ready      (connect again)
/// stop()             -> Stopped    (terminal)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientState {
    /// Remote mode and liveview enabled, no stream open.
    Ready,
    /// A stream session is open.
    Streaming,
    /// Liveview disabled; the client cannot be used again.
    Stopped,
}

/// Receives decoded frames from [`Client::run`].
///
/// This is where a display, recorder, or encoder plugs in. Return
/// [`ControlFlow::Break`] to end the run.
pub trait FrameSink {
    fn on_frame(&mut self, frame: Frame) -> ControlFlow<()>;
}

impl<F> FrameSink for F
where
    F: FnMut(Frame) -> ControlFlow<()>,
{
    fn on_frame(&mut self, frame: Frame) -> ControlFlow<()> {
        self(frame)
    }
}

struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
    active: Mutex<Option<StreamHandle>>,
}

/// Requests a running [`Client::run`] loop to exit.
///
/// Sets the stop flag, wakes a pending reconnect delay, and closes the
/// active stream so that a blocked read returns.
#[derive(Clone)]
pub struct StopHandle {
    signal: Arc<StopSignal>,
}

impl StopHandle {
    pub fn stop(&self) {
        *self.signal.stopped.lock() = true;
        self.signal.wake.notify_all();
        if let Some(handle) = self.signal.active.lock().as_ref() {
            handle.close();
        }
        tracing::debug!("stop requested");
    }

    pub fn is_stopped(&self) -> bool {
        *self.signal.stopped.lock()
    }
}

enum PumpExit {
    SinkDone,
    Failed(LiveviewError),
}

/// Liveview client.
///
/// Composes the control channel (one-shot commands) and the stream session
/// (persistent byte source) into the start / connect / fetch / stop
/// lifecycle. Only one stream session exists at a time and it is read by a
/// single caller.
pub struct Client {
    url: BaseUrl,
    config: ClientConfig,
    control: ControlChannel,
    session: Option<StreamSession>,
    state: ClientState,
    last_header: Option<CommonHeader>,
    signal: Arc<StopSignal>,
}

impl Client {
    /// Enable remote mode and start liveview on the camera at `url`.
    pub fn start(url: &str) -> Result<Self> {
        Self::start_with_config(url, ClientConfig::default())
    }

    /// Like [`start`](Self::start), with custom configuration.
    ///
    /// Fails if either `startRecMode` or `startLiveview` fails.
    pub fn start_with_config(url: &str, config: ClientConfig) -> Result<Self> {
        let url = BaseUrl::parse(url)?;
        let control = ControlChannel::new(
            url.clone(),
            &config.control_path,
            config.connect_timeout,
            config.control_timeout,
        );

        control.send_command(START_REC_MODE)?;
        control.send_command(START_LIVEVIEW)?;

        tracing::info!(%url, "liveview started");

        Ok(Self {
            url,
            config,
            control,
            session: None,
            state: ClientState::Ready,
            last_header: None,
            signal: Arc::new(StopSignal {
                stopped: Mutex::new(false),
                wake: Condvar::new(),
                active: Mutex::new(None),
            }),
        })
    }

    /// Open a new stream session, replacing any existing one.
    pub fn connect(&mut self) -> Result<()> {
        self.ensure_usable()?;
        self.disconnect();

        let signal = &self.signal;
        let session = StreamSession::connect(
            &self.url,
            &self.config.stream_path,
            self.config.connect_timeout,
            self.config.stream_read_timeout,
            |handle| {
                *signal.active.lock() = Some(handle.clone());
                if *signal.stopped.lock() {
                    handle.close();
                }
            },
        );
        let session = match session {
            Ok(session) => session,
            Err(e) => {
                *self.signal.active.lock() = None;
                return Err(e);
            }
        };

        self.session = Some(session);
        self.set_state(ClientState::Streaming);
        Ok(())
    }

    /// Close the current stream session, if any.
    pub fn disconnect(&mut self) {
        *self.signal.active.lock() = None;
        if let Some(session) = self.session.take() {
            session.close();
        }
        if self.state == ClientState::Streaming {
            self.set_state(ClientState::Ready);
        }
    }

    /// Decode the next frame unit from the current session.
    ///
    /// Returns `Ok(None)` for frame-info payloads. On any error the session
    /// is dropped and the client returns to [`ClientState::Ready`].
    pub fn fetch_frame(&mut self) -> Result<Option<Frame>> {
        if self.state == ClientState::Stopped {
            return Err(LiveviewError::Stopped);
        }
        let session = self.session.as_mut().ok_or(LiveviewError::NotConnected)?;

        match protocol::read_unit(session) {
            Ok((header, payload)) => {
                self.last_header = Some(header);
                Ok(Frame::from_unit(header, payload))
            }
            Err(e) => {
                self.disconnect();
                Err(e)
            }
        }
    }

    /// Decode until the next image frame, skipping frame-info payloads.
    pub fn next_frame(&mut self) -> Result<Frame> {
        loop {
            if let Some(frame) = self.fetch_frame()? {
                return Ok(frame);
            }
        }
    }

    /// Supervised fetch loop.
    ///
    /// Connects, hands every image frame to `sink`, and reconnects with
    /// backoff on stream faults. Returns `Ok(())` when the sink breaks or a
    /// [`StopHandle`] fires, and [`LiveviewError::RetriesExhausted`] when the
    /// reconnect policy gives up.
    pub fn run<S: FrameSink + ?Sized>(&mut self, sink: &mut S) -> Result<()> {
        self.ensure_usable()?;
        let mut backoff = Backoff::new(self.config.reconnect.clone());

        while !self.stop_requested() {
            let failure = match self.connect() {
                Ok(()) => match self.pump(sink, &mut backoff) {
                    PumpExit::SinkDone => break,
                    PumpExit::Failed(e) => e,
                },
                Err(e) => e,
            };

            if self.stop_requested() {
                break;
            }
            if !failure.is_stream_fault() {
                self.disconnect();
                return Err(failure);
            }

            match backoff.next_delay() {
                Some(delay) => {
                    tracing::warn!(
                        error = %failure,
                        attempt = backoff.attempts(),
                        delay_ms = delay.as_millis() as u64,
                        "liveview stream interrupted, reconnecting"
                    );
                    if self.wait(delay) {
                        break;
                    }
                }
                None => {
                    self.disconnect();
                    return Err(LiveviewError::RetriesExhausted {
                        attempts: backoff.attempts(),
                        last: Box::new(failure),
                    });
                }
            }
        }

        self.disconnect();
        Ok(())
    }

    fn pump<S: FrameSink + ?Sized>(&mut self, sink: &mut S, backoff: &mut Backoff) -> PumpExit {
        loop {
            match self.fetch_frame() {
                Ok(Some(frame)) => {
                    backoff.reset();
                    if sink.on_frame(frame).is_break() {
                        return PumpExit::SinkDone;
                    }
                }
                Ok(None) => {}
                Err(e) => return PumpExit::Failed(e),
            }
        }
    }

    /// Disable liveview and release the stream.
    ///
    /// A failing `stopLiveview` is logged, not returned: shutdown always
    /// completes.
    pub fn stop(&mut self) {
        if self.state == ClientState::Stopped {
            return;
        }

        if let Err(e) = self.control.send_command(STOP_LIVEVIEW) {
            tracing::warn!(url = %self.url, error = %e, "stopLiveview failed");
        }

        *self.signal.stopped.lock() = true;
        self.signal.wake.notify_all();
        self.disconnect();
        self.set_state(ClientState::Stopped);

        tracing::info!(url = %self.url, "liveview stopped");
    }

    /// A handle for stopping [`run`](Self::run) from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            signal: self.signal.clone(),
        }
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn url(&self) -> &BaseUrl {
        &self.url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Common header of the most recently decoded frame unit.
    pub fn last_header(&self) -> Option<CommonHeader> {
        self.last_header
    }

    fn ensure_usable(&self) -> Result<()> {
        if self.state == ClientState::Stopped || self.stop_requested() {
            return Err(LiveviewError::Stopped);
        }
        Ok(())
    }

    fn stop_requested(&self) -> bool {
        *self.signal.stopped.lock()
    }

    /// Sleep for `delay` unless stopped first. Returns whether a stop was
    /// requested.
    fn wait(&self, delay: Duration) -> bool {
        let deadline = Instant::now() + delay;
        let mut stopped = self.signal.stopped.lock();
        while !*stopped {
            if self.signal.wake.wait_until(&mut stopped, deadline).timed_out() {
                break;
            }
        }
        *stopped
    }

    fn set_state(&mut self, state: ClientState) {
        tracing::debug!(old_state = ?self.state, new_state = ?state, "state transition");
        self.state = state;
    }
}
