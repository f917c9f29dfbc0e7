//! # Session Channels
//!
//! One error channel and four delivery channels (chat, gift, like, member).
//! All are bounded at the configured capacity, so a slow dispatcher stalls the
//! producers. Every send also watches the session's cancellation token, so a
//! producer blocked on a full channel still stops when the session closes.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::errors::WebcastError;
use crate::datafeeds::webcast::events::MessageKind;

/// Sending side, cloned into the heartbeat and read tasks.
#[derive(Clone)]
pub(crate) struct Publisher {
    errors: mpsc::Sender<WebcastError>,
    chat: mpsc::Sender<Vec<u8>>,
    gift: mpsc::Sender<Vec<u8>>,
    like: mpsc::Sender<Vec<u8>>,
    member: mpsc::Sender<Vec<u8>>,
    cancel: CancellationToken,
}

/// Receiving side, owned by the dispatcher.
pub(crate) struct Inbox {
    pub(crate) errors: mpsc::Receiver<WebcastError>,
    pub(crate) chat: mpsc::Receiver<Vec<u8>>,
    pub(crate) gift: mpsc::Receiver<Vec<u8>>,
    pub(crate) like: mpsc::Receiver<Vec<u8>>,
    pub(crate) member: mpsc::Receiver<Vec<u8>>,
}

/// Creates the channel set. A zero capacity is raised to 1.
pub(crate) fn session_channels(capacity: usize, cancel: CancellationToken) -> (Publisher, Inbox) {
    let capacity = capacity.max(1);
    let (errors_tx, errors_rx) = mpsc::channel(capacity);
    let (chat_tx, chat_rx) = mpsc::channel(capacity);
    let (gift_tx, gift_rx) = mpsc::channel(capacity);
    let (like_tx, like_rx) = mpsc::channel(capacity);
    let (member_tx, member_rx) = mpsc::channel(capacity);

    let publisher = Publisher {
        errors: errors_tx,
        chat: chat_tx,
        gift: gift_tx,
        like: like_tx,
        member: member_tx,
        cancel,
    };
    let inbox = Inbox {
        errors: errors_rx,
        chat: chat_rx,
        gift: gift_rx,
        like: like_rx,
        member: member_rx,
    };
    (publisher, inbox)
}

impl Publisher {
    /// Publishes a non-fatal error. Returns `false` once the session is closing.
    pub(crate) async fn report(&self, error: WebcastError) -> bool {
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.errors.send(error) => sent.is_ok(),
        }
    }

    /// Delivers a raw sub-message payload on its kind's channel.
    /// Returns `false` once the session is closing.
    pub(crate) async fn deliver(&self, kind: MessageKind, payload: Vec<u8>) -> bool {
        let channel = match kind {
            MessageKind::Chat => &self.chat,
            MessageKind::Gift => &self.gift,
            MessageKind::Like => &self.like,
            MessageKind::Member => &self.member,
        };
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = channel.send(payload) => sent.is_ok(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_deliver_routes_by_kind() {
        let cancel = CancellationToken::new();
        let (publisher, mut inbox) = session_channels(4, cancel);

        assert!(publisher.deliver(MessageKind::Like, vec![1]).await);
        assert!(publisher.deliver(MessageKind::Chat, vec![2]).await);

        assert_eq!(inbox.like.recv().await, Some(vec![1]));
        assert_eq!(inbox.chat.recv().await, Some(vec![2]));
        assert!(inbox.gift.try_recv().is_err());
        assert!(inbox.member.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_blocked_send_stops_on_cancel() {
        let cancel = CancellationToken::new();
        let (publisher, _inbox) = session_channels(1, cancel.clone());

        // Fill the single slot; the next send has to wait for the dispatcher.
        assert!(publisher.report(WebcastError::ConnectionClosed).await);

        let blocked = tokio::spawn({
            let publisher = publisher.clone();
            async move { publisher.report(WebcastError::ConnectionClosed).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!blocked.is_finished());

        cancel.cancel();
        let sent = tokio::time::timeout(Duration::from_secs(1), blocked).await.unwrap().unwrap();
        assert!(!sent);
    }
}
