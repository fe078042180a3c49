use chrono::{DateTime, Local};
use std::fmt;

/// An inbound publish as handed from the link to the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MQTTMessage {
    topic: String,
    content: String,
    timestamp: DateTime<Local>,
}

impl fmt::Display for MQTTMessage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let preview: String = self.content.chars().take(40).collect();
        write!(
            f,
            "{} - {}: {}",
            self.timestamp.format("%H:%M:%S%.3f"),
            self.topic,
            preview
        )
    }
}

impl MQTTMessage {
    pub fn from_topic(topic: impl Into<String>, content: impl Into<String>) -> Self {
        MQTTMessage {
            topic: topic.into(),
            content: content.into(),
            timestamp: Local::now(),
        }
    }

    /// Builds a message from a raw payload; invalid UTF-8 is replaced, not rejected.
    pub fn from_payload(topic: impl Into<String>, payload: &[u8]) -> Self {
        Self::from_topic(topic, String::from_utf8_lossy(payload).into_owned())
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Local arrival time
    pub fn timestamp(&self) -> DateTime<Local> {
        self.timestamp
    }
}
