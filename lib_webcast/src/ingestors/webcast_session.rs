//! # Webcast Session
//!
//! A `Session` owns one push connection and the tasks running over it:
//!
//! - **heartbeat**: writes a keep-alive frame, then sleeps the configured interval.
//! - **read**: reads frames, decodes them layer by layer, acknowledges when the
//!   envelope asks for it, and delivers sub-messages to their kind's channel.
//! - **dispatcher**: drains the channels into the caller's [`WebcastHandler`].
//! - **closer**: once the session is cancelled, sends the close frame.
//!
//! The write half is shared by heartbeat and acknowledgment through one
//! [`FrameWriter`]. The read half belongs to the read task alone. Every await
//! point selects on the session's `CancellationToken`.
//!
//! Errors never stop the session. The only way out of `Active` other than
//! [`Session::close`] is a bounded [`ReadErrorPolicy`] running out.

use std::any::Any;
use std::mem;
use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures_util::stream::SplitStream;
use futures_util::{FutureExt, StreamExt};
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_util::sync::CancellationToken;

use crate::configs::session_config::{ReadErrorPolicy, SessionConfig, UnknownMethodPolicy};
use crate::connections::frame_writer::{FrameWriter, WebcastConnection};
use crate::core::channels::{session_channels, Publisher};
use crate::core::dispatcher::{Dispatcher, WebcastHandler};
use crate::core::errors::WebcastError;
use crate::datafeeds::webcast::codec;
use crate::datafeeds::webcast::events::MessageKind;
use crate::datafeeds::webcast::{PushFrame, Response};

/// Upper bound on sending the close frame during shutdown.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of a started session. Connecting is the pending
/// [`connect`](crate::connections::ws_connector::connect) future, so a
/// `Session` value is never in that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Closed,
}

/// One live room over one push connection.
///
/// Dropping a `Session` cancels its tasks without waiting for them; use
/// [`close`](Session::close) to wait.
pub struct Session {
    room_id: String,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl Session {
    /// Takes ownership of `connection` and spawns the session tasks.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start<S, H>(room_id: impl Into<String>, connection: S, config: SessionConfig, handler: H) -> Self
    where
        S: WebcastConnection,
        H: WebcastHandler,
    {
        let room_id = room_id.into();
        let cancel = CancellationToken::new();
        let (publisher, inbox) = session_channels(config.channel_capacity, cancel.clone());
        let (sink, stream) = connection.split();
        let writer = FrameWriter::new(sink);

        log::info!(
            "Starting session for room {} (heartbeat every {:?})",
            room_id,
            config.heartbeat_interval
        );

        let heartbeat = tokio::spawn(heartbeat_loop(
            writer.clone(),
            publisher.clone(),
            cancel.clone(),
            config.heartbeat_interval,
        ));

        let reader = ReadTask {
            stream,
            writer: writer.clone(),
            publisher,
            cancel: cancel.clone(),
            config,
        };
        let read = tokio::spawn(async move {
            if let Err(panic) = AssertUnwindSafe(reader.run()).catch_unwind().await {
                log::error!("Read task panicked: {}", panic_message(&*panic));
            }
        });

        let dispatcher = tokio::spawn(Dispatcher::new(handler, inbox, cancel.clone()).run());

        let closer = tokio::spawn({
            let cancel = cancel.clone();
            async move {
                cancel.cancelled().await;
                match tokio::time::timeout(CLOSE_TIMEOUT, writer.close()).await {
                    Ok(Ok(())) => log::debug!("Close frame sent"),
                    Ok(Err(e)) => log::debug!("Close frame not delivered: {}", e),
                    Err(_) => log::warn!("Timed out sending close frame"),
                }
            }
        });

        Self {
            room_id,
            cancel,
            tasks: vec![heartbeat, read, dispatcher, closer],
        }
    }

    pub fn room_id(&self) -> &str {
        &self.room_id
    }

    pub fn state(&self) -> SessionState {
        if self.cancel.is_cancelled() {
            SessionState::Closed
        } else {
            SessionState::Active
        }
    }

    /// A handle that closes the session when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Resolves once the session has been closed, by the caller or by itself.
    pub async fn closed(&self) {
        self.cancel.cancelled().await;
    }

    /// Cancels every task, sends the close frame and waits for all tasks to finish.
    pub async fn close(mut self) {
        log::info!("Closing session for room {}", self.room_id);
        self.cancel.cancel();
        for task in mem::take(&mut self.tasks) {
            if let Err(e) = task.await {
                log::error!("Session task failed: {}", e);
            }
        }
        log::info!("Session for room {} closed", self.room_id);
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn heartbeat_loop<S: WebcastConnection>(
    writer: FrameWriter<S>,
    publisher: Publisher,
    cancel: CancellationToken,
    interval: Duration,
) {
    let frame = codec::heartbeat_frame();
    loop {
        let result = tokio::select! {
            _ = cancel.cancelled() => break,
            result = writer.write(&frame) => result,
        };
        match result {
            Ok(()) => log::trace!("Heartbeat sent"),
            Err(source) => {
                log::warn!("Heartbeat send failed: {}", source);
                let error = WebcastError::Send { frame: "heartbeat", source };
                if !publisher.report(error).await {
                    break;
                }
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(interval) => {}
        }
    }
    log::debug!("Heartbeat task stopped");
}

struct ReadTask<S: WebcastConnection> {
    stream: SplitStream<S>,
    writer: FrameWriter<S>,
    publisher: Publisher,
    cancel: CancellationToken,
    config: SessionConfig,
}

impl<S: WebcastConnection> ReadTask<S> {
    async fn run(mut self) {
        let mut consecutive: u32 = 0;
        let mut peer_closed = false;
        loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => break,
                next = self.stream.next() => next,
            };

            let error = match next {
                Some(Ok(message)) => {
                    consecutive = 0;
                    peer_closed |= matches!(message, Message::Close(_));
                    if !self.handle_message(message).await {
                        break;
                    }
                    continue;
                }
                Some(Err(e)) => WebcastError::Read(e),
                None => WebcastError::ConnectionClosed,
            };

            // Nothing more can arrive after these, so reading on would spin.
            let ended = peer_closed
                || matches!(
                    error,
                    WebcastError::ConnectionClosed
                        | WebcastError::Read(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed)
                );
            consecutive = consecutive.saturating_add(1);
            log::warn!("Read failed ({} in a row): {}", consecutive, error);
            if !self.publisher.report(error).await {
                break;
            }

            let bounded = matches!(self.config.read_errors, ReadErrorPolicy::Bounded { .. });
            if self.config.read_errors.exhausted(consecutive) || (ended && bounded) {
                log::error!("Closing session after {} consecutive read errors", consecutive);
                self.publisher.report(WebcastError::ReadErrorLimit(consecutive)).await;
                self.cancel.cancel();
                break;
            }
            if ended {
                log::warn!("Push stream ended, read task stopping");
                break;
            }
        }
        log::debug!("Read task stopped");
    }

    /// Returns `false` once the session is closing.
    async fn handle_message(&self, message: Message) -> bool {
        match message {
            Message::Binary(bytes) => self.handle_frame(&bytes).await,
            Message::Close(frame) => {
                log::info!("Remote host sent close frame: {:?}", frame);
                true
            }
            _ => true,
        }
    }

    async fn handle_frame(&self, bytes: &[u8]) -> bool {
        let (frame, envelope) = match self.decode(bytes) {
            Ok(Some(decoded)) => decoded,
            Ok(None) => return true,
            Err(error) => {
                log::debug!("Dropping frame: {}", error);
                return self.publisher.report(error).await;
            }
        };

        if envelope.need_ack && !self.acknowledge(frame.log_id, &envelope.internal_ext).await {
            return false;
        }

        for message in envelope.messages {
            let delivered = match MessageKind::from_method(&message.method) {
                Some(kind) => self.publisher.deliver(kind, message.payload).await,
                None => match self.config.unknown_method {
                    UnknownMethodPolicy::Ignore => {
                        log::trace!("Ignoring sub-message {}", message.method);
                        true
                    }
                    UnknownMethodPolicy::Report => {
                        self.publisher
                            .report(WebcastError::UnrecognizedMethod(message.method))
                            .await
                    }
                },
            };
            if !delivered {
                return false;
            }
        }
        true
    }

    /// Runs the three inbound layers. `None` marks a heartbeat echo.
    fn decode(&self, bytes: &[u8]) -> Result<Option<(PushFrame, Response)>, WebcastError> {
        let frame = codec::decode_outer(bytes)?;
        if codec::is_heartbeat(&frame) {
            return Ok(None);
        }
        let inflated = codec::decompress(&frame.payload, self.config.max_decompressed_bytes)?;
        let envelope = codec::decode_envelope(&inflated)?;
        Ok(Some((frame, envelope)))
    }

    async fn acknowledge(&self, log_id: u64, internal_ext: &str) -> bool {
        let ack = codec::ack_frame(log_id, internal_ext, self.config.ack_format);
        let result = tokio::select! {
            _ = self.cancel.cancelled() => return false,
            result = self.writer.write(&ack) => result,
        };
        match result {
            Ok(()) => {
                log::trace!("Acknowledged frame {}", log_id);
                true
            }
            Err(source) => {
                log::warn!("Ack for frame {} failed: {}", log_id, source);
                self.publisher.report(WebcastError::Send { frame: "ack", source }).await
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}
