//! Broker double for unit tests.

use super::error::TransportError;
use super::subscriber::Publisher;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recorded {
    Publish { topic: String, payload: String },
    Subscribe(String),
    Unsubscribe(String),
    Disconnect,
}

/// Records every request instead of talking to a broker. Clones share the log.
#[derive(Debug, Clone, Default)]
pub struct RecordingPublisher {
    log: Arc<Mutex<Vec<Recorded>>>,
    fail_next: Arc<AtomicBool>,
}

impl RecordingPublisher {
    /// Makes the next request fail with a transport error.
    pub fn fail_next(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.log.lock().unwrap().clone()
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.recorded()
            .into_iter()
            .filter_map(|r| match r {
                Recorded::Publish { topic, payload } => Some((topic, payload)),
                _ => None,
            })
            .collect()
    }

    pub fn subscribe_count(&self, topic: &str) -> usize {
        self.recorded()
            .iter()
            .filter(|r| matches!(r, Recorded::Subscribe(t) if t == topic))
            .count()
    }

    fn record(&self, entry: Recorded) -> Result<(), TransportError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(TransportError::Connection("request queue closed".to_string()));
        }
        self.log.lock().unwrap().push(entry);
        Ok(())
    }
}

impl Publisher for RecordingPublisher {
    fn queue_publish(&self, topic: &str, payload: &str) -> Result<(), TransportError> {
        self.record(Recorded::Publish {
            topic: topic.to_string(),
            payload: payload.to_string(),
        })
    }

    fn queue_subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.record(Recorded::Subscribe(topic.to_string()))
    }

    fn queue_unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.record(Recorded::Unsubscribe(topic.to_string()))
    }

    fn queue_disconnect(&self) -> Result<(), TransportError> {
        self.record(Recorded::Disconnect)
    }
}
