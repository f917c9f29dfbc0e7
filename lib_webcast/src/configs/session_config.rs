use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::datafeeds::webcast::codec::DEFAULT_MAX_DECOMPRESSED_BYTES;

/// What the read task does with a sub-message whose method tag is not recognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownMethodPolicy {
    /// Drop silently. The push protocol carries many kinds this crate does not model.
    #[default]
    Ignore,
    /// Drop, and publish `WebcastError::UnrecognizedMethod` on the error channel.
    Report,
}

/// How many consecutive read failures the read task tolerates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReadErrorPolicy {
    /// Report every failure and keep reading until the session is closed.
    #[default]
    Unbounded,
    /// After `max_consecutive` failures in a row, report `ReadErrorLimit` and close
    /// the session. A successful read resets the count.
    Bounded { max_consecutive: u32 },
}

impl ReadErrorPolicy {
    /// True once `consecutive` failures exhaust the policy.
    pub fn exhausted(&self, consecutive: u32) -> bool {
        match self {
            ReadErrorPolicy::Unbounded => false,
            ReadErrorPolicy::Bounded { max_consecutive } => consecutive >= *max_consecutive,
        }
    }
}

/// Shape of the acknowledgment frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AckFormat {
    /// The inbound `internal_ext` becomes the ack's payload type, payload empty.
    #[default]
    ExtAsPayloadType,
    /// Payload type `"ack"`, with `internal_ext` carried as the payload bytes.
    TaggedPayload,
}

/// Tuning for one [`Session`](crate::ingestors::webcast_session::Session).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Pause between keep-alive frames.
    pub heartbeat_interval: Duration,
    /// Capacity of the error and delivery channels. 1 keeps them as close to a
    /// rendezvous as tokio allows, so a slow dispatcher throttles the reader.
    pub channel_capacity: usize,
    pub unknown_method: UnknownMethodPolicy,
    pub read_errors: ReadErrorPolicy,
    pub ack_format: AckFormat,
    /// Largest inflated envelope accepted.
    pub max_decompressed_bytes: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: Duration::from_secs(10),
            channel_capacity: 1,
            unknown_method: UnknownMethodPolicy::default(),
            read_errors: ReadErrorPolicy::default(),
            ack_format: AckFormat::default(),
            max_decompressed_bytes: DEFAULT_MAX_DECOMPRESSED_BYTES,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.heartbeat_interval, Duration::from_secs(10));
        assert_eq!(config.channel_capacity, 1);
        assert_eq!(config.unknown_method, UnknownMethodPolicy::Ignore);
        assert_eq!(config.read_errors, ReadErrorPolicy::Unbounded);
        assert_eq!(config.ack_format, AckFormat::ExtAsPayloadType);
    }

    #[test]
    fn test_read_error_policy_exhaustion() {
        assert!(!ReadErrorPolicy::Unbounded.exhausted(u32::MAX));

        let bounded = ReadErrorPolicy::Bounded { max_consecutive: 3 };
        assert!(!bounded.exhausted(2));
        assert!(bounded.exhausted(3));
    }

    #[test]
    fn test_policies_deserialize_from_json() {
        let policy: ReadErrorPolicy =
            serde_json::from_str(r#"{"bounded":{"max_consecutive":5}}"#).unwrap();
        assert_eq!(policy, ReadErrorPolicy::Bounded { max_consecutive: 5 });

        let ack: AckFormat = serde_json::from_str(r#""tagged_payload""#).unwrap();
        assert_eq!(ack, AckFormat::TaggedPayload);
    }
}
