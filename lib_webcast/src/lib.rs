//! # lib_webcast
//!
//! Building blocks for ingesting a live webcast room: HTTP room discovery, the
//! WebSocket connector, the nested protobuf/gzip wire codec, and the session
//! that runs heartbeat, read/decode and dispatch tasks over one connection.

#![forbid(unsafe_code)]

// Declare the modules to re-export
pub mod configs;
pub mod connections;
pub mod core;
pub mod datafeeds;
pub mod ingestors;
pub mod retrieve;

// Re-export everything
pub use crate::configs::session_config::{AckFormat, ReadErrorPolicy, SessionConfig, UnknownMethodPolicy};
pub use crate::connections::ws_connector::{connect, ConnectTarget, WebcastStream};
pub use crate::core::dispatcher::{LogHandler, WebcastHandler};
pub use crate::core::errors::{ErrorKind, FrameLayer, WebcastError};
pub use crate::datafeeds::webcast::events::{ChatEvent, GiftEvent, LikeEvent, MemberEvent, MessageKind};
pub use crate::ingestors::webcast_session::{Session, SessionState};
pub use crate::retrieve::room_discovery::{DiscoveryOptions, RoomDiscovery, RoomInfo};
