//! Client for the camera liveview streaming protocol.
//!
//! A camera is switched into remote mode and told to start liveview through
//! JSON commands on its control endpoint. It then serves an endless HTTP
//! response on its liveview endpoint, carrying framed JPEG images that
//! [`protocol`] decodes one at a time.
//!
//! ```no_run
//! use liveview::Client;
//!
//! let mut client = Client::start("http://192.168.122.1:8080")?;
//! client.connect()?;
//! let frame = client.next_frame()?;
//! println!("frame {} ({} bytes)", frame.sequence, frame.len());
//! client.stop();
//! # Ok::<(), liveview::LiveviewError>(())
//! ```

pub mod backoff;
pub mod client;
pub mod control;
pub mod error;
pub mod http;
pub mod protocol;
pub mod stream;

pub use backoff::{Backoff, ReconnectPolicy};
pub use client::{Client, ClientConfig, ClientState, FrameSink, StopHandle};
pub use error::{LiveviewError, Result};
pub use protocol::{CommonHeader, Frame};
