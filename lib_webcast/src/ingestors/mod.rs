//! # Data Ingestors Module
//!
//! Long-lived clients that keep an upstream connection open and turn what
//! arrives on it into typed events.
//!
//! ## Contained Modules:
//! - **`webcast_session`**: one live room over one push connection. It runs
//!   the heartbeat, read/decode and dispatcher tasks and owns their shutdown.
//!
//! The primary structs are re-exported so callers can reach them via
//! `lib_webcast::ingestors::...`.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// The webcast push session and its task set.
pub mod webcast_session;

// --- Public API Re-exports ---
pub use webcast_session::{Session, SessionState};
