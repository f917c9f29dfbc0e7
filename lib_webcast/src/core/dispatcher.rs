//! # Webcast Event Dispatcher
//!
//! The `Dispatcher` is the only reader of a session's error channel and its four
//! delivery channels. For each raw payload it runs the per-kind decoder and
//! calls the matching [`WebcastHandler`] method; errors go to
//! [`WebcastHandler::on_error`]. Handling an error never changes session state.
//!
//! The loop ends when the session is cancelled or every sender is gone. Errors
//! still queued at cancellation are handed to the handler before it returns.

use tokio_util::sync::CancellationToken;

use crate::core::channels::Inbox;
use crate::core::errors::WebcastError;
use crate::datafeeds::webcast::codec;
use crate::datafeeds::webcast::events::{ChatEvent, GiftEvent, LikeEvent, MemberEvent, MessageKind};

/// Caller-supplied handling, one method per recognized message kind.
///
/// Methods run on the dispatcher task, one at a time. A slow handler
/// backpressures the read task through the bounded channels.
pub trait WebcastHandler: Send + 'static {
    fn on_chat(&mut self, _event: ChatEvent) {}

    fn on_gift(&mut self, _event: GiftEvent) {}

    fn on_like(&mut self, _event: LikeEvent) {}

    fn on_member(&mut self, _event: MemberEvent) {}

    /// Receives every non-fatal session error, plus payloads that failed to decode.
    fn on_error(&mut self, error: WebcastError) {
        log::warn!("Session error [{}]: {}", error.kind().as_str(), error);
    }
}

/// Logs every event and error through the `log` facade.
#[derive(Debug, Default, Clone)]
pub struct LogHandler;

impl WebcastHandler for LogHandler {
    fn on_chat(&mut self, event: ChatEvent) {
        log::info!("[chat] {}: {}", event.nickname, event.content);
    }

    fn on_gift(&mut self, event: GiftEvent) {
        log::info!("[gift] {} sent {}", event.nickname, event.gift_name);
    }

    fn on_like(&mut self, event: LikeEvent) {
        log::info!("[like] {} liked x{}", event.nickname, event.count);
    }

    fn on_member(&mut self, event: MemberEvent) {
        log::info!("[member] {} entered the room", event.nickname);
    }
}

pub(crate) struct Dispatcher<H> {
    handler: H,
    inbox: Inbox,
    cancel: CancellationToken,
}

impl<H: WebcastHandler> Dispatcher<H> {
    pub(crate) fn new(handler: H, inbox: Inbox, cancel: CancellationToken) -> Self {
        Self { handler, inbox, cancel }
    }

    pub(crate) async fn run(mut self) {
        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    self.drain_errors();
                    break;
                }
                Some(error) = self.inbox.errors.recv() => self.handler.on_error(error),
                Some(payload) = self.inbox.chat.recv() => self.dispatch(MessageKind::Chat, &payload),
                Some(payload) = self.inbox.gift.recv() => self.dispatch(MessageKind::Gift, &payload),
                Some(payload) = self.inbox.like.recv() => self.dispatch(MessageKind::Like, &payload),
                Some(payload) = self.inbox.member.recv() => self.dispatch(MessageKind::Member, &payload),
                else => break,
            }
        }
        log::debug!("Dispatcher stopped");
    }

    /// Hands errors already queued at shutdown to the handler.
    fn drain_errors(&mut self) {
        while let Ok(error) = self.inbox.errors.try_recv() {
            self.handler.on_error(error);
        }
    }

    fn dispatch(&mut self, kind: MessageKind, payload: &[u8]) {
        let result = match kind {
            MessageKind::Chat => codec::decode_chat(payload).map(|e| self.handler.on_chat(e)),
            MessageKind::Gift => codec::decode_gift(payload).map(|e| self.handler.on_gift(e)),
            MessageKind::Like => codec::decode_like(payload).map(|e| self.handler.on_like(e)),
            MessageKind::Member => codec::decode_member(payload).map(|e| self.handler.on_member(e)),
        };
        if let Err(error) = result {
            log::debug!("Dropping undecodable {} payload", kind.as_str());
            self.handler.on_error(error);
        }
    }
}
