//! # Data Feeds Module
//!
//! Wire-level models and codecs for the upstream data sources. Each submodule
//! owns one protocol; nothing here touches sockets or tasks.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// The webcast push protocol: protobuf models, typed events and the layered codec.
pub mod webcast;
