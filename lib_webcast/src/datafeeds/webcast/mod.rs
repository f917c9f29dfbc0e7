//! # Webcast Push Protocol
//!
//! The live room pushes binary WebSocket messages that nest four layers deep:
//!
//! 1. `PushFrame`
//! 2. gzip-compressed payload
//! 3. `Response` batch with an optional acknowledgment request
//! 4. per-kind sub-messages (`WebcastChatMessage`, `WebcastGiftMessage`, ...)
//!
//! `proto_handler` declares the messages, `codec` peels the layers, `events`
//! holds the typed values handed to consumers.

/// Internal Protobuf models of the push protocol.
pub mod proto_handler;
/// Typed events and the recognized method tags.
pub mod events;
/// Layered decode/encode functions.
pub mod codec;

pub use codec::{HEARTBEAT_PAYLOAD_TYPE, ACK_PAYLOAD_TYPE};
pub use proto_handler::{PushFrame, Response, SubMessage};
