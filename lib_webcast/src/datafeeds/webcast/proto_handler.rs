//! # Webcast Protobuf Handler
//!
//! Rust representations of the webcast push protocol messages. Everything is
//! declared by hand with `prost` derives, so no build script or `.proto` file
//! is needed. Only the fields this crate reads are declared; `prost` skips
//! unknown tags when decoding.

use prost::Message;

/// The outer wire unit of the push connection.
///
/// Inbound frames carry a gzip-compressed [`Response`] in `payload`. Outbound
/// heartbeat and acknowledgment frames reuse the same shape.
#[derive(Clone, PartialEq, Message)]
pub struct PushFrame {
    #[prost(uint64, tag = "1")]
    pub seq_id: u64,

    /// Log identifier, echoed back in the acknowledgment frame.
    #[prost(uint64, tag = "2")]
    pub log_id: u64,

    #[prost(string, tag = "6")]
    pub payload_encoding: String,

    /// Payload type tag (`"msg"` inbound, `"hb"` for heartbeats).
    #[prost(string, tag = "7")]
    pub payload_type: String,

    #[prost(bytes = "vec", tag = "8")]
    pub payload: Vec<u8>,
}

/// The batch envelope found inside a decompressed [`PushFrame`] payload.
#[derive(Clone, PartialEq, Message)]
pub struct Response {
    /// Sub-messages, in delivery order.
    #[prost(message, repeated, tag = "1")]
    pub messages: Vec<SubMessage>,

    #[prost(string, tag = "2")]
    pub cursor: String,

    /// Opaque server extension string, echoed back in the acknowledgment.
    #[prost(string, tag = "5")]
    pub internal_ext: String,

    /// Set when the server expects an acknowledgment for this frame.
    #[prost(bool, tag = "9")]
    pub need_ack: bool,
}

/// One event inside a [`Response`], tagged by its method name.
#[derive(Clone, PartialEq, Message)]
pub struct SubMessage {
    /// e.g. `"WebcastChatMessage"`.
    #[prost(string, tag = "1")]
    pub method: String,

    #[prost(bytes = "vec", tag = "2")]
    pub payload: Vec<u8>,

    #[prost(int64, tag = "3")]
    pub msg_id: i64,
}

/// The sender of an event.
#[derive(Clone, PartialEq, Message)]
pub struct User {
    #[prost(uint64, tag = "1")]
    pub id: u64,

    /// Display name.
    #[prost(string, tag = "3")]
    pub nickname: String,
}

/// Gift metadata embedded in a gift message.
#[derive(Clone, PartialEq, Message)]
pub struct GiftStruct {
    #[prost(uint64, tag = "5")]
    pub id: u64,

    #[prost(string, tag = "16")]
    pub name: String,
}

/// Payload of `WebcastChatMessage`.
#[derive(Clone, PartialEq, Message)]
pub struct ChatMessage {
    #[prost(message, optional, tag = "2")]
    pub user: Option<User>,

    #[prost(string, tag = "3")]
    pub content: String,
}

/// Payload of `WebcastGiftMessage`.
#[derive(Clone, PartialEq, Message)]
pub struct GiftMessage {
    #[prost(uint64, tag = "2")]
    pub gift_id: u64,

    #[prost(uint64, tag = "5")]
    pub repeat_count: u64,

    #[prost(message, optional, tag = "7")]
    pub user: Option<User>,

    #[prost(message, optional, tag = "15")]
    pub gift: Option<GiftStruct>,
}

/// Payload of `WebcastLikeMessage`.
#[derive(Clone, PartialEq, Message)]
pub struct LikeMessage {
    #[prost(uint64, tag = "2")]
    pub count: u64,

    #[prost(uint64, tag = "3")]
    pub total: u64,

    #[prost(message, optional, tag = "5")]
    pub user: Option<User>,
}

/// Payload of `WebcastMemberMessage` (a viewer entering the room).
#[derive(Clone, PartialEq, Message)]
pub struct MemberMessage {
    #[prost(message, optional, tag = "2")]
    pub user: Option<User>,

    #[prost(uint64, tag = "3")]
    pub member_count: u64,
}
