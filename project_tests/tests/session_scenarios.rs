use std::collections::HashSet;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use lib_webcast::datafeeds::webcast::codec;
use lib_webcast::{
    connect, AckFormat, ChatEvent, ErrorKind, LikeEvent, ReadErrorPolicy, Session, SessionConfig, SessionState,
    UnknownMethodPolicy, WebcastError,
};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, Message};
use project_tests::{
    chat, collect_non_heartbeats, corrupt_frame, drain, envelope, inbound_frame, like, mock_push_server,
    next_frame, sub_message, wait_for, Recorded, Recorder, ServerStream,
};

const SHORT: Duration = Duration::from_millis(300);
const LONG: Duration = Duration::from_secs(3);

/// Heartbeats far enough apart to stay out of the way.
fn quiet_config() -> SessionConfig {
    SessionConfig {
        heartbeat_interval: Duration::from_secs(60),
        ..Default::default()
    }
}

async fn start_session(config: SessionConfig) -> (Session, ServerStream, tokio::sync::mpsc::UnboundedReceiver<Recorded>) {
    let (target, accept) = mock_push_server().await.unwrap();
    let stream = connect(&target).await.unwrap();
    let server = accept.await.unwrap().unwrap();
    let (recorder, rx) = Recorder::new();
    let session = Session::start(target.room.room_id.clone(), stream, config, recorder);
    (session, server, rx)
}

#[tokio::test]
async fn like_and_chat_in_one_frame_are_delivered_once() {
    let (session, mut server, mut rx) = start_session(quiet_config()).await;

    let batch = envelope(vec![like("A", 5), chat("B", "hi")], None);
    server.send(inbound_frame(1, &batch)).await.unwrap();

    let seen = drain(&mut rx, SHORT).await;
    assert_eq!(seen.len(), 2, "saw {:?}", seen);
    assert!(seen.contains(&Recorded::Like(LikeEvent { nickname: "A".to_string(), count: 5 })));
    assert!(seen.contains(&Recorded::Chat(ChatEvent { nickname: "B".to_string(), content: "hi".to_string() })));

    // No ack was requested.
    assert!(collect_non_heartbeats(&mut server, SHORT).await.unwrap().is_empty());
    session.close().await;
}

#[tokio::test]
async fn same_kind_keeps_envelope_order() {
    let (session, mut server, mut rx) = start_session(quiet_config()).await;

    let batch = envelope(vec![chat("A", "one"), chat("B", "two"), chat("C", "three")], None);
    server.send(inbound_frame(1, &batch)).await.unwrap();

    let seen = drain(&mut rx, SHORT).await;
    let contents: Vec<_> = seen
        .iter()
        .map(|r| match r {
            Recorded::Chat(c) => c.content.as_str(),
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(contents, vec!["one", "two", "three"]);
    session.close().await;
}

#[tokio::test]
async fn need_ack_produces_exactly_one_matching_ack() {
    let (session, mut server, mut rx) = start_session(quiet_config()).await;

    let batch = envelope(vec![chat("B", "hi")], Some("ext-1"));
    server.send(inbound_frame(42, &batch)).await.unwrap();

    let acks = collect_non_heartbeats(&mut server, SHORT).await.unwrap();
    assert_eq!(acks.len(), 1, "got {:?}", acks);
    assert_eq!(acks[0].log_id, 42);
    assert_eq!(acks[0].payload_type, "ext-1");
    assert!(acks[0].payload.is_empty());

    // The sub-message is still delivered after the ack.
    let seen = drain(&mut rx, SHORT).await;
    assert_eq!(seen, vec![Recorded::Chat(ChatEvent { nickname: "B".to_string(), content: "hi".to_string() })]);
    session.close().await;
}

#[tokio::test]
async fn tagged_ack_format_carries_ext_in_payload() {
    let config = SessionConfig {
        ack_format: AckFormat::TaggedPayload,
        ..quiet_config()
    };
    let (session, mut server, _rx) = start_session(config).await;

    server.send(inbound_frame(7, &envelope(vec![], Some("ext-7")))).await.unwrap();

    let acks = collect_non_heartbeats(&mut server, SHORT).await.unwrap();
    assert_eq!(acks.len(), 1);
    assert_eq!(acks[0].log_id, 7);
    assert_eq!(acks[0].payload_type, "ack");
    assert_eq!(acks[0].payload, b"ext-7".to_vec());
    session.close().await;
}

#[tokio::test]
async fn corrupt_payload_is_reported_and_next_frame_still_processed() {
    let (session, mut server, mut rx) = start_session(quiet_config()).await;

    server.send(corrupt_frame(1)).await.unwrap();
    server.send(inbound_frame(2, &envelope(vec![chat("B", "after")], None))).await.unwrap();

    // Errors and chats travel on different channels, so only membership is checked.
    let seen = drain(&mut rx, SHORT).await;
    assert_eq!(seen.len(), 2, "saw {:?}", seen);
    assert!(seen.iter().any(|r| matches!(r, Recorded::Error(ErrorKind::Decompress, _))));
    assert!(seen.contains(&Recorded::Chat(ChatEvent { nickname: "B".to_string(), content: "after".to_string() })));
    assert_eq!(session.state(), SessionState::Active);
    session.close().await;
}

#[tokio::test]
async fn malformed_outer_frame_is_decode_error() {
    let (session, mut server, mut rx) = start_session(quiet_config()).await;

    server
        .send(Message::Binary(vec![0x0a, 0xff, 0xff].into()))
        .await
        .unwrap();

    let seen = wait_for(&mut rx, LONG, |r| matches!(r, Recorded::Error(..))).await.unwrap();
    assert!(matches!(&seen[0], Recorded::Error(ErrorKind::Decode, msg) if msg.contains("outer frame")));
    session.close().await;
}

#[tokio::test]
async fn unrecognized_method_is_silently_dropped_by_default() {
    let (session, mut server, mut rx) = start_session(quiet_config()).await;

    let batch = envelope(vec![sub_message("WebcastRoomUserSeqMessage", vec![1, 2, 3])], None);
    server.send(inbound_frame(1, &batch)).await.unwrap();

    assert!(drain(&mut rx, SHORT).await.is_empty());
    session.close().await;
}

#[tokio::test]
async fn unrecognized_method_is_reported_under_report_policy() {
    let config = SessionConfig {
        unknown_method: UnknownMethodPolicy::Report,
        ..quiet_config()
    };
    let (session, mut server, mut rx) = start_session(config).await;

    let batch = envelope(vec![sub_message("WebcastRoomUserSeqMessage", vec![]), like("A", 1)], None);
    server.send(inbound_frame(1, &batch)).await.unwrap();

    let seen = drain(&mut rx, SHORT).await;
    assert_eq!(seen.len(), 2, "saw {:?}", seen);
    assert!(seen.iter().any(|r| matches!(
        r,
        Recorded::Error(ErrorKind::UnrecognizedMethod, msg) if msg.contains("WebcastRoomUserSeqMessage")
    )));
    assert!(seen.contains(&Recorded::Like(LikeEvent { nickname: "A".to_string(), count: 1 })));
    session.close().await;
}

#[tokio::test]
async fn heartbeats_keep_cadence_through_read_errors() {
    let config = SessionConfig {
        heartbeat_interval: Duration::from_millis(100),
        ..Default::default()
    };
    let (session, server, _rx) = start_session(config).await;
    let (mut sink, mut stream) = server.split();

    let noise = tokio::spawn(async move {
        for id in 0..5 {
            if sink.send(corrupt_frame(id)).await.is_err() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        sink
    });

    let window = Duration::from_millis(550);
    let started = tokio::time::Instant::now();
    let mut heartbeats = 0;
    while started.elapsed() < window {
        match next_frame(&mut stream, window.saturating_sub(started.elapsed())).await.unwrap() {
            Some(frame) if codec::is_heartbeat(&frame) => heartbeats += 1,
            Some(frame) => panic!("unexpected frame {:?}", frame),
            None => break,
        }
    }
    assert!((4..=7).contains(&heartbeats), "saw {} heartbeats", heartbeats);

    let _sink = noise.await.unwrap();
    session.close().await;
}

#[tokio::test]
async fn concurrent_heartbeats_and_acks_never_interleave() {
    let config = SessionConfig {
        heartbeat_interval: Duration::from_millis(1),
        ..Default::default()
    };
    let (session, server, _rx) = start_session(config).await;
    let (mut sink, mut stream) = server.split();

    const FRAMES: u64 = 50;
    let sender = tokio::spawn(async move {
        for id in 1..=FRAMES {
            let ext = format!("ext-{}", id);
            sink.send(inbound_frame(id, &envelope(vec![like("A", id)], Some(&ext))))
                .await
                .unwrap();
        }
        sink
    });

    let mut acked = HashSet::new();
    let mut heartbeats = 0;
    while acked.len() < FRAMES as usize {
        // Every frame has to decode; a torn write would fail here.
        let frame = next_frame(&mut stream, LONG).await.unwrap().expect("client stopped writing");
        if codec::is_heartbeat(&frame) {
            heartbeats += 1;
            continue;
        }
        assert_eq!(frame.payload_type, format!("ext-{}", frame.log_id));
        assert!(acked.insert(frame.log_id), "duplicate ack for {}", frame.log_id);
    }
    assert!(heartbeats > 0);

    let _sink = sender.await.unwrap();
    session.close().await;
}

#[tokio::test]
async fn bounded_read_policy_closes_the_session() {
    let config = SessionConfig {
        read_errors: ReadErrorPolicy::Bounded { max_consecutive: 3 },
        ..quiet_config()
    };
    let (session, mut server, mut rx) = start_session(config).await;

    server.close(None).await.unwrap();
    drop(server);

    tokio::time::timeout(LONG, session.closed()).await.expect("session stayed active");
    assert_eq!(session.state(), SessionState::Closed);

    let seen = drain(&mut rx, SHORT).await;
    let kinds: Vec<_> = seen
        .iter()
        .filter_map(|r| match r {
            Recorded::Error(kind, _) => Some(*kind),
            _ => None,
        })
        .collect();
    assert!(kinds.contains(&ErrorKind::Read), "saw {:?}", seen);
    assert_eq!(kinds.last(), Some(&ErrorKind::ReadErrorLimit));

    tokio::time::timeout(Duration::from_secs(6), session.close()).await.unwrap();
}

#[tokio::test]
async fn unbounded_policy_survives_stream_end() {
    let (session, mut server, mut rx) = start_session(quiet_config()).await;

    server.close(None).await.unwrap();
    drop(server);

    let seen = wait_for(&mut rx, LONG, |r| matches!(r, Recorded::Error(ErrorKind::Read, _))).await.unwrap();
    assert!(!seen.is_empty());
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session.state(), SessionState::Active);

    tokio::time::timeout(Duration::from_secs(6), session.close()).await.unwrap();
}

#[tokio::test]
async fn close_terminates_every_task() {
    let config = SessionConfig {
        heartbeat_interval: Duration::from_millis(20),
        ..Default::default()
    };
    let (session, mut server, mut rx) = start_session(config).await;

    // Leave a delivery pending so the read task is blocked on a send.
    server.send(inbound_frame(1, &envelope(vec![like("A", 1), like("B", 2), like("C", 3)], None))).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    tokio::time::timeout(Duration::from_secs(6), session.close())
        .await
        .expect("close did not finish");

    // The handler was dropped with the dispatcher.
    let _ = drain(&mut rx, SHORT).await;
    assert!(rx.recv().await.is_none());

    // The server sees the close frame or the end of the stream.
    let mut saw_close = false;
    while let Ok(next) = tokio::time::timeout(LONG, server.next()).await {
        match next {
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                saw_close = true;
                break;
            }
            Some(Ok(_)) => continue,
        }
    }
    assert!(saw_close);
}

#[tokio::test]
async fn connect_refused_is_fatal() {
    let (target, accept) = mock_push_server().await.unwrap();
    accept.abort();
    let _ = accept.await;

    let err = connect(&target).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Connect);
    assert!(matches!(err, WebcastError::Connect(_)));
}

/// Yields one ping, then panics on the next read. Writes go to `written`.
struct FaultyConnection {
    served: bool,
    written: mpsc::UnboundedSender<Message>,
}

impl Stream for FaultyConnection {
    type Item = Result<Message, tungstenite::Error>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.served {
            panic!("stream fault after first message");
        }
        self.served = true;
        Poll::Ready(Some(Ok(Message::Ping(Vec::new().into()))))
    }
}

impl Sink<Message> for FaultyConnection {
    type Error = tungstenite::Error;

    fn poll_ready(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn start_send(self: Pin<&mut Self>, item: Message) -> Result<(), Self::Error> {
        let _ = self.written.send(item);
        Ok(())
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn poll_close(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }
}

#[tokio::test]
async fn read_task_panic_leaves_heartbeats_running() {
    let (written_tx, mut written) = mpsc::unbounded_channel();
    let connection = FaultyConnection { served: false, written: written_tx };
    let config = SessionConfig {
        heartbeat_interval: Duration::from_millis(20),
        ..Default::default()
    };
    let (recorder, _rx) = Recorder::new();
    let session = Session::start("1", connection, config, recorder);

    // The read task faults on its second poll, right after start.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(session.state(), SessionState::Active);

    // Only heartbeats written after the fault count.
    while written.try_recv().is_ok() {}
    for _ in 0..3 {
        let message = tokio::time::timeout(LONG, written.recv())
            .await
            .expect("heartbeats stopped after the read task panicked")
            .unwrap();
        let frame = codec::decode_outer(&message.into_data()).unwrap();
        assert!(codec::is_heartbeat(&frame));
    }
    assert_eq!(session.state(), SessionState::Active);

    tokio::time::timeout(Duration::from_secs(6), session.close()).await.unwrap();
}
