//! # Core Engine Module
//!
//! Pieces shared by every session task.
//!
//! ## Core Components:
//!
//! - **`errors`**: the crate-wide [`WebcastError`](errors::WebcastError) and its
//!   coarse [`ErrorKind`](errors::ErrorKind).
//! - **`channels`**: the error channel plus one bounded delivery channel per
//!   recognized message kind, with cancellable publishing.
//! - **`dispatcher`**: the single consumer of those channels, decoding payloads
//!   and calling the caller's [`WebcastHandler`](dispatcher::WebcastHandler).

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Error types reported by the connector, codec and session tasks.
pub mod errors;
/// Error and per-kind delivery channels shared by the session tasks.
pub mod channels;
/// The consumer loop that decodes deliveries and invokes handlers.
pub mod dispatcher;

// --- Public API Re-exports ---
pub use dispatcher::{LogHandler, WebcastHandler};
pub use errors::{ErrorKind, FrameLayer, WebcastError};
