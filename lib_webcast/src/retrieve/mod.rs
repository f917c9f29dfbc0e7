//! # Data Retrieval Module
//!
//! HTTP-side helpers that run before a push connection exists.
//!
//! ## Contained Modules:
//!
//! - **`room_discovery`**: fetches a live room page through `reqwest` with
//!   `reqwest-middleware` exponential-backoff retries, and extracts the room id
//!   and session cookie the connector needs.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Resolves a live page URL into a [`RoomInfo`](room_discovery::RoomInfo).
pub mod room_discovery;
