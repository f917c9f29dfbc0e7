//! # Connections Module
//!
//! Opening upstream connections. The session takes ownership of whatever is
//! returned here; nothing in this module retries.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// WebSocket connector for the webcast push endpoint.
pub mod ws_connector;

/// Serialized writes shared by the session's tasks.
pub mod frame_writer;

pub use frame_writer::{FrameWriter, WebcastConnection};
