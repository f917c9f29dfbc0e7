//! Shared fixtures for the session integration tests: a one-connection mock
//! push server, frame builders, and a handler that forwards what it sees.

use std::io::Write;
use std::time::Duration;

use anyhow::{anyhow, Result};
use flate2::write::GzEncoder;
use flate2::Compression;
use futures_util::StreamExt;
use lib_webcast::datafeeds::webcast::proto_handler::{ChatMessage, LikeMessage, User};
use lib_webcast::datafeeds::webcast::{codec, PushFrame, Response, SubMessage};
use lib_webcast::{
    ChatEvent, ConnectTarget, ErrorKind, GiftEvent, LikeEvent, MemberEvent, RoomInfo, WebcastError, WebcastHandler,
};
use prost::Message as _;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

pub type ServerStream = WebSocketStream<TcpStream>;

/// Binds a random local port and accepts exactly one WebSocket client.
///
/// Returns a connect target pointing at it and the pending server side.
pub async fn mock_push_server() -> Result<(ConnectTarget, JoinHandle<Result<ServerStream>>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let port = listener.local_addr()?.port();

    let accept = tokio::spawn(async move {
        let (tcp, _) = listener.accept().await?;
        let ws = accept_async(tcp).await?;
        Ok(ws)
    });

    let room = RoomInfo {
        room_id: "7353122286687308582".to_string(),
        session_cookie: "test-cookie".to_string(),
        source_url: "https://live.example.com/456066026839".to_string(),
    };
    let target = ConnectTarget::new(room, format!("ws://127.0.0.1:{}/webcast/im/push/v2/?room_id=%s", port));
    Ok((target, accept))
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut enc = GzEncoder::new(Vec::new(), Compression::default());
    // Writing into a Vec cannot fail.
    let _ = enc.write_all(bytes);
    enc.finish().unwrap_or_default()
}

pub fn user(nickname: &str) -> Option<User> {
    Some(User { id: 1, nickname: nickname.to_string() })
}

pub fn sub_message(method: &str, payload: Vec<u8>) -> SubMessage {
    SubMessage {
        method: method.to_string(),
        payload,
        msg_id: 0,
    }
}

pub fn chat(nickname: &str, content: &str) -> SubMessage {
    let payload = ChatMessage { user: user(nickname), content: content.to_string() };
    sub_message("WebcastChatMessage", payload.encode_to_vec())
}

pub fn like(nickname: &str, count: u64) -> SubMessage {
    let payload = LikeMessage { count, total: count, user: user(nickname) };
    sub_message("WebcastLikeMessage", payload.encode_to_vec())
}

/// An envelope with the given sub-messages and acknowledgment request.
pub fn envelope(messages: Vec<SubMessage>, need_ack: Option<&str>) -> Response {
    Response {
        messages,
        internal_ext: need_ack.unwrap_or_default().to_string(),
        need_ack: need_ack.is_some(),
        ..Default::default()
    }
}

/// Encodes a full inbound binary message around `envelope`.
pub fn inbound_frame(log_id: u64, envelope: &Response) -> Message {
    let frame = PushFrame {
        log_id,
        payload_encoding: "gzip".to_string(),
        payload_type: "msg".to_string(),
        payload: gzip(&envelope.encode_to_vec()),
        ..Default::default()
    };
    Message::Binary(codec::encode_outer(&frame).into())
}

/// An inbound frame whose payload is not gzip.
pub fn corrupt_frame(log_id: u64) -> Message {
    let frame = PushFrame {
        log_id,
        payload_type: "msg".to_string(),
        payload: b"definitely not gzip".to_vec(),
        ..Default::default()
    };
    Message::Binary(codec::encode_outer(&frame).into())
}

/// Reads the next binary frame the client wrote, within `wait`.
pub async fn next_frame<S>(server: &mut S, wait: Duration) -> Result<Option<PushFrame>>
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let deadline = tokio::time::Instant::now() + wait;
    loop {
        let next = match tokio::time::timeout_at(deadline, server.next()).await {
            Ok(next) => next,
            Err(_) => return Ok(None),
        };
        match next {
            Some(Ok(Message::Binary(bytes))) => return Ok(Some(codec::decode_outer(&bytes)?)),
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(anyhow!("server read failed: {}", e)),
            None => return Ok(None),
        }
    }
}

/// Collects every non-heartbeat frame the client writes during `wait`.
pub async fn collect_non_heartbeats<S>(server: &mut S, wait: Duration) -> Result<Vec<PushFrame>>
where
    S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    let deadline = tokio::time::Instant::now() + wait;
    let mut frames = Vec::new();
    loop {
        let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
        match next_frame(server, remaining).await? {
            Some(frame) if codec::is_heartbeat(&frame) => {}
            Some(frame) => frames.push(frame),
            None => return Ok(frames),
        }
    }
}

/// What a [`Recorder`] saw, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum Recorded {
    Chat(ChatEvent),
    Gift(GiftEvent),
    Like(LikeEvent),
    Member(MemberEvent),
    Error(ErrorKind, String),
}

/// Forwards every callback to a channel read by the test body.
pub struct Recorder {
    tx: mpsc::UnboundedSender<Recorded>,
}

impl Recorder {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Recorded>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl WebcastHandler for Recorder {
    fn on_chat(&mut self, event: ChatEvent) {
        let _ = self.tx.send(Recorded::Chat(event));
    }

    fn on_gift(&mut self, event: GiftEvent) {
        let _ = self.tx.send(Recorded::Gift(event));
    }

    fn on_like(&mut self, event: LikeEvent) {
        let _ = self.tx.send(Recorded::Like(event));
    }

    fn on_member(&mut self, event: MemberEvent) {
        let _ = self.tx.send(Recorded::Member(event));
    }

    fn on_error(&mut self, error: WebcastError) {
        let _ = self.tx.send(Recorded::Error(error.kind(), error.to_string()));
    }
}

/// Everything recorded within `wait`.
pub async fn drain(rx: &mut mpsc::UnboundedReceiver<Recorded>, wait: Duration) -> Vec<Recorded> {
    let deadline = tokio::time::Instant::now() + wait;
    let mut seen = Vec::new();
    while let Ok(Some(item)) = tokio::time::timeout_at(deadline, rx.recv()).await {
        seen.push(item);
    }
    seen
}

/// Waits for the first recording matching `pred`, returning everything seen up to it.
pub async fn wait_for(
    rx: &mut mpsc::UnboundedReceiver<Recorded>,
    wait: Duration,
    pred: impl Fn(&Recorded) -> bool,
) -> Result<Vec<Recorded>> {
    let deadline = tokio::time::Instant::now() + wait;
    let mut seen = Vec::new();
    loop {
        match tokio::time::timeout_at(deadline, rx.recv()).await {
            Ok(Some(item)) => {
                let done = pred(&item);
                seen.push(item);
                if done {
                    return Ok(seen);
                }
            }
            Ok(None) => return Err(anyhow!("handler dropped; saw {:?}", seen)),
            Err(_) => return Err(anyhow!("timed out; saw {:?}", seen)),
        }
    }
}
