//! Typed events handed to a [`WebcastHandler`](crate::core::dispatcher::WebcastHandler).

use serde::Serialize;

use super::proto_handler::{ChatMessage, GiftMessage, LikeMessage, MemberMessage, User};

/// The recognized sub-message kinds. Each one has its own delivery channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Chat,
    Gift,
    Like,
    Member,
}

impl MessageKind {
    /// Every recognized kind, in channel order.
    pub const ALL: [MessageKind; 4] = [
        MessageKind::Chat,
        MessageKind::Gift,
        MessageKind::Like,
        MessageKind::Member,
    ];

    /// Resolves a sub-message method tag. Unknown tags yield `None`.
    pub fn from_method(method: &str) -> Option<Self> {
        match method {
            "WebcastChatMessage" => Some(MessageKind::Chat),
            "WebcastGiftMessage" => Some(MessageKind::Gift),
            "WebcastLikeMessage" => Some(MessageKind::Like),
            "WebcastMemberMessage" => Some(MessageKind::Member),
            _ => None,
        }
    }

    /// The method tag used on the wire.
    pub fn method(self) -> &'static str {
        match self {
            MessageKind::Chat => "WebcastChatMessage",
            MessageKind::Gift => "WebcastGiftMessage",
            MessageKind::Like => "WebcastLikeMessage",
            MessageKind::Member => "WebcastMemberMessage",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MessageKind::Chat => "chat",
            MessageKind::Gift => "gift",
            MessageKind::Like => "like",
            MessageKind::Member => "member",
        }
    }
}

fn nickname(user: Option<User>) -> String {
    user.map(|u| u.nickname).unwrap_or_default()
}

/// A chat comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatEvent {
    pub nickname: String,
    pub content: String,
}

impl From<ChatMessage> for ChatEvent {
    fn from(msg: ChatMessage) -> Self {
        Self {
            nickname: nickname(msg.user),
            content: msg.content,
        }
    }
}

/// A gift sent to the streamer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GiftEvent {
    pub nickname: String,
    pub gift_name: String,
}

impl From<GiftMessage> for GiftEvent {
    fn from(msg: GiftMessage) -> Self {
        Self {
            nickname: nickname(msg.user),
            gift_name: msg.gift.map(|g| g.name).unwrap_or_default(),
        }
    }
}

/// A burst of likes from one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LikeEvent {
    pub nickname: String,
    pub count: u64,
}

impl From<LikeMessage> for LikeEvent {
    fn from(msg: LikeMessage) -> Self {
        Self {
            nickname: nickname(msg.user),
            count: msg.count,
        }
    }
}

/// A viewer entering the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemberEvent {
    pub nickname: String,
}

impl From<MemberMessage> for MemberEvent {
    fn from(msg: MemberMessage) -> Self {
        Self {
            nickname: nickname(msg.user),
        }
    }
}
