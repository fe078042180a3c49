//! Error types for the MQTT link and the message decoders

use thiserror::Error;

/// Failures talking to the broker. Never fatal; they surface as connection state
/// or as a diagnostic.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The broker connection failed or dropped
    #[error("Connection error: {0}")]
    Connection(String),

    /// A publish could not be queued
    #[error("Publish to {topic} failed: {reason}")]
    Publish { topic: String, reason: String },

    /// A subscribe or unsubscribe request could not be queued
    #[error("Subscription change for {topic} failed: {reason}")]
    Subscription { topic: String, reason: String },
}

/// A telemetry payload that did not match the snapshot shape.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Malformed payload on {topic}: {reason}")]
pub struct DecodeError {
    pub topic: String,
    pub reason: String,
}
