//! # Frame Writer
//!
//! The heartbeat task and the read task (for acknowledgments) both write to the
//! same connection. All writes go through one mutex-guarded sink half, so each
//! frame reaches the wire as a single intact binary message.

use std::sync::Arc;

use futures_util::stream::SplitSink;
use futures_util::{Sink, SinkExt, Stream};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::{self, Message};

use crate::datafeeds::webcast::codec;
use crate::datafeeds::webcast::PushFrame;

/// Any duplex WebSocket stream a session can run on.
///
/// [`WebcastStream`](super::ws_connector::WebcastStream) is the production one;
/// tests use streams accepted from a local listener.
pub trait WebcastConnection:
    Stream<Item = Result<Message, tungstenite::Error>>
    + Sink<Message, Error = tungstenite::Error>
    + Unpin
    + Send
    + 'static
{
}

impl<S> WebcastConnection for S where
    S: Stream<Item = Result<Message, tungstenite::Error>>
        + Sink<Message, Error = tungstenite::Error>
        + Unpin
        + Send
        + 'static
{
}

/// Shared handle to the write half of a connection.
pub struct FrameWriter<S: WebcastConnection> {
    sink: Arc<Mutex<SplitSink<S, Message>>>,
}

impl<S: WebcastConnection> Clone for FrameWriter<S> {
    fn clone(&self) -> Self {
        Self { sink: Arc::clone(&self.sink) }
    }
}

impl<S: WebcastConnection> FrameWriter<S> {
    pub fn new(sink: SplitSink<S, Message>) -> Self {
        Self { sink: Arc::new(Mutex::new(sink)) }
    }

    /// Encodes `frame` and sends it as one binary message.
    pub async fn write(&self, frame: &PushFrame) -> Result<(), tungstenite::Error> {
        let bytes = codec::encode_outer(frame);
        let mut sink = self.sink.lock().await;
        sink.send(Message::Binary(bytes.into())).await
    }

    /// Sends a close frame and flushes the sink.
    pub async fn close(&self) -> Result<(), tungstenite::Error> {
        let mut sink = self.sink.lock().await;
        sink.close().await
    }
}
