//! # Webcast Wire Codec
//!
//! Inbound data is layered: a binary WebSocket message holds a [`PushFrame`],
//! whose payload is a gzip stream, which inflates to a [`Response`] envelope,
//! which carries [`SubMessage`](super::proto_handler::SubMessage)s whose payloads
//! are decoded per kind. Each layer has its own function here so the read task
//! can report which one failed. Malformed input is always a typed error.

use std::io::{self, Read};

use flate2::read::GzDecoder;
use prost::Message;

use super::events::{ChatEvent, GiftEvent, LikeEvent, MemberEvent, MessageKind};
use super::proto_handler::{ChatMessage, GiftMessage, LikeMessage, MemberMessage, PushFrame, Response};
use crate::configs::session_config::AckFormat;
use crate::core::errors::{FrameLayer, WebcastError};

/// Payload type of client keep-alive frames (and of the server's echoes).
pub const HEARTBEAT_PAYLOAD_TYPE: &str = "hb";

/// Payload type used by [`AckFormat::TaggedPayload`].
pub const ACK_PAYLOAD_TYPE: &str = "ack";

/// Upper bound on an inflated envelope.
pub const DEFAULT_MAX_DECOMPRESSED_BYTES: usize = 8 * 1024 * 1024;

/// Decodes the outer frame of a binary WebSocket message.
pub fn decode_outer(bytes: &[u8]) -> Result<PushFrame, WebcastError> {
    PushFrame::decode(bytes).map_err(|source| WebcastError::Decode {
        layer: FrameLayer::Outer,
        source,
    })
}

/// Inflates a gzip payload, refusing output larger than `limit` bytes.
pub fn decompress(bytes: &[u8], limit: usize) -> Result<Vec<u8>, WebcastError> {
    let mut out = Vec::new();
    GzDecoder::new(bytes)
        .take((limit as u64).saturating_add(1))
        .read_to_end(&mut out)
        .map_err(WebcastError::Decompress)?;

    if out.len() > limit {
        return Err(WebcastError::Decompress(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("decompressed payload exceeds {} bytes", limit),
        )));
    }
    Ok(out)
}

/// Decodes the batch envelope from an inflated payload.
pub fn decode_envelope(bytes: &[u8]) -> Result<Response, WebcastError> {
    Response::decode(bytes).map_err(|source| WebcastError::Decode {
        layer: FrameLayer::Envelope,
        source,
    })
}

/// Serializes an outbound frame.
pub fn encode_outer(frame: &PushFrame) -> Vec<u8> {
    frame.encode_to_vec()
}

/// A keep-alive frame: heartbeat tag, no payload.
pub fn heartbeat_frame() -> PushFrame {
    PushFrame {
        payload_type: HEARTBEAT_PAYLOAD_TYPE.to_string(),
        ..Default::default()
    }
}

/// Builds the acknowledgment for an inbound frame.
pub fn ack_frame(log_id: u64, internal_ext: &str, format: AckFormat) -> PushFrame {
    match format {
        AckFormat::ExtAsPayloadType => PushFrame {
            log_id,
            payload_type: internal_ext.to_string(),
            ..Default::default()
        },
        AckFormat::TaggedPayload => PushFrame {
            log_id,
            payload_type: ACK_PAYLOAD_TYPE.to_string(),
            payload: internal_ext.as_bytes().to_vec(),
            ..Default::default()
        },
    }
}

/// True for the server's heartbeat echoes, which carry nothing to decode.
pub fn is_heartbeat(frame: &PushFrame) -> bool {
    frame.payload_type == HEARTBEAT_PAYLOAD_TYPE && frame.payload.is_empty()
}

fn payload_error(kind: MessageKind) -> impl FnOnce(prost::DecodeError) -> WebcastError {
    move |source| WebcastError::Decode {
        layer: FrameLayer::Payload(kind),
        source,
    }
}

pub fn decode_chat(payload: &[u8]) -> Result<ChatEvent, WebcastError> {
    ChatMessage::decode(payload)
        .map(ChatEvent::from)
        .map_err(payload_error(MessageKind::Chat))
}

pub fn decode_gift(payload: &[u8]) -> Result<GiftEvent, WebcastError> {
    GiftMessage::decode(payload)
        .map(GiftEvent::from)
        .map_err(payload_error(MessageKind::Gift))
}

pub fn decode_like(payload: &[u8]) -> Result<LikeEvent, WebcastError> {
    LikeMessage::decode(payload)
        .map(LikeEvent::from)
        .map_err(payload_error(MessageKind::Like))
}

pub fn decode_member(payload: &[u8]) -> Result<MemberEvent, WebcastError> {
    MemberMessage::decode(payload)
        .map(MemberEvent::from)
        .map_err(payload_error(MessageKind::Member))
}
