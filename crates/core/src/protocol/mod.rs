//! Liveview stream framing.
//!
//! The body of `GET /liveview/liveviewstream` is an unbounded sequence of
//! frame units. Every unit is a fixed 8-byte common header followed by a
//! 128-byte payload header, the payload body, and optional padding.
//! All multi-byte integers are big-endian.
//!
//! ```text
//!  common header (8 bytes)
//! +------+------+-------------+---------------------------+
//! | 0xFF | type | sequence:16 |       timestamp:32        |
//! +------+------+-------------+---------------------------+
//!
//!  payload header (128 bytes)
//! +-------------------+-------------+---------+-----------------+
//! | 24 35 68 79       | size:24     | pad:8   | reserved (120)  |
//! +-------------------+-------------+---------+-----------------+
//!
//!  payload
//! +--------------------------------------+------------------+
//! | body (size bytes, or 16 for type 2)  | padding (pad)    |
//! +--------------------------------------+------------------+
//! ```
//!
//! ## Payload types
//!
//! | Type | Meaning | Body |
//! |------|---------|------|
//! | 0x01 | Image | `size` bytes of JPEG |
//! | 0x02 | Frame info | 16 bytes, discarded |
//!
//! Any other type is rejected: the body length of an unknown payload is not
//! defined, so the stream cannot be resynchronized.
//!
//! Decoding never tries to resynchronize. Any sentinel mismatch or short
//! read leaves the stream at an unknown offset and the connection must be
//! replaced.

pub mod decoder;
pub mod encode;
pub mod header;

pub use decoder::{
    Frame, Payload, fetch_frame, read_common_header, read_payload, read_payload_header,
    read_unit,
};
pub use header::{CommonHeader, PayloadHeader, PayloadType};
