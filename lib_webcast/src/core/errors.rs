//! # Webcast Error Types
//!
//! A single error enum covers every failure the connector, codec, session tasks
//! and room discovery can report. Fatal errors (`Connect`, `InvalidTarget`,
//! `Discovery`, `Http`) are returned directly to the caller; everything else is
//! published on the session error channel and never stops the session.

use std::fmt;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

use crate::datafeeds::webcast::events::MessageKind;

/// The protocol layer at which a decode failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameLayer {
    /// The outer `PushFrame`.
    Outer,
    /// The decompressed `Response` envelope.
    Envelope,
    /// A per-kind sub-message payload.
    Payload(MessageKind),
}

impl fmt::Display for FrameLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameLayer::Outer => write!(f, "outer frame"),
            FrameLayer::Envelope => write!(f, "envelope"),
            FrameLayer::Payload(kind) => write!(f, "{} payload", kind.as_str()),
        }
    }
}

/// Coarse classification, used for log fields and test assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connect,
    Read,
    Decode,
    Decompress,
    Send,
    UnrecognizedMethod,
    ReadErrorLimit,
    Discovery,
}

impl ErrorKind {
    /// Stable string form.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Connect => "connect",
            ErrorKind::Read => "read",
            ErrorKind::Decode => "decode",
            ErrorKind::Decompress => "decompress",
            ErrorKind::Send => "send",
            ErrorKind::UnrecognizedMethod => "unrecognized_method",
            ErrorKind::ReadErrorLimit => "read_error_limit",
            ErrorKind::Discovery => "discovery",
        }
    }
}

#[derive(Debug, Error)]
pub enum WebcastError {
    #[error("Invalid connect target: {0}")]
    InvalidTarget(String),

    #[error("WebSocket connect failed: {0}")]
    Connect(#[source] tungstenite::Error),

    #[error("WebSocket read failed: {0}")]
    Read(#[source] tungstenite::Error),

    #[error("WebSocket stream closed by remote host")]
    ConnectionClosed,

    #[error("Failed to decode {layer}: {source}")]
    Decode {
        layer: FrameLayer,
        #[source]
        source: prost::DecodeError,
    },

    #[error("Failed to decompress payload: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("Failed to send {frame} frame: {source}")]
    Send {
        frame: &'static str,
        #[source]
        source: tungstenite::Error,
    },

    #[error("Unrecognized sub-message method: {0}")]
    UnrecognizedMethod(String),

    #[error("Giving up after {0} consecutive read errors")]
    ReadErrorLimit(u32),

    #[error("Room discovery failed: {0}")]
    Discovery(String),

    #[error("Room discovery request failed: {0}")]
    Http(#[from] reqwest_middleware::Error),
}

impl WebcastError {
    /// Maps the error to its [`ErrorKind`].
    pub fn kind(&self) -> ErrorKind {
        match self {
            WebcastError::InvalidTarget(_) | WebcastError::Connect(_) => ErrorKind::Connect,
            WebcastError::Read(_) | WebcastError::ConnectionClosed => ErrorKind::Read,
            WebcastError::Decode { .. } => ErrorKind::Decode,
            WebcastError::Decompress(_) => ErrorKind::Decompress,
            WebcastError::Send { .. } => ErrorKind::Send,
            WebcastError::UnrecognizedMethod(_) => ErrorKind::UnrecognizedMethod,
            WebcastError::ReadErrorLimit(_) => ErrorKind::ReadErrorLimit,
            WebcastError::Discovery(_) | WebcastError::Http(_) => ErrorKind::Discovery,
        }
    }
}

impl From<reqwest::Error> for WebcastError {
    fn from(e: reqwest::Error) -> Self {
        WebcastError::Http(reqwest_middleware::Error::Reqwest(e))
    }
}
