//! Topic subscription, inbound routing and outbound publishing.

use super::config::TopicConfig;
use super::error::{DecodeError, TransportError};
use super::message_manager::MQTTMessage;
use crate::state::SensorSnapshot;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Literal the device understands as "pump on", both inbound and outbound.
pub const PUMP_ON: &str = "ON";

/// Non-blocking access to the broker session.
///
/// Implementations only queue the request; delivery is the link's job.
pub trait Publisher {
    fn queue_publish(&self, topic: &str, payload: &str) -> Result<(), TransportError>;
    fn queue_subscribe(&self, topic: &str) -> Result<(), TransportError>;
    fn queue_unsubscribe(&self, topic: &str) -> Result<(), TransportError>;
    fn queue_disconnect(&self) -> Result<(), TransportError>;
}

/// A decoded device message.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Telemetry(SensorSnapshot),
    PumpStatus(bool),
}

pub struct TopicSubscriber<P: Publisher> {
    publisher: P,
    topics: TopicConfig,
    // Abos der aktuellen Verbindung
    active: BTreeSet<String>,
}

impl<P: Publisher> TopicSubscriber<P> {
    pub fn new(publisher: P, topics: TopicConfig) -> Self {
        Self {
            publisher,
            topics,
            active: BTreeSet::new(),
        }
    }

    pub fn topics(&self) -> &TopicConfig {
        &self.topics
    }

    pub fn publisher(&self) -> &P {
        &self.publisher
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.active.contains(topic)
    }

    /// Subscribes to every inbound topic not yet subscribed on this connection.
    ///
    /// Returns the number of new subscriptions. Every missing topic is attempted even
    /// if an earlier one fails; the first failure is returned and the failed topics
    /// stay missing until the next call.
    pub fn subscribe_all(&mut self) -> Result<usize, TransportError> {
        let mut added = 0;
        let mut first_error = None;
        for topic in self.topics.inbound() {
            if self.active.contains(topic) {
                debug!("Already subscribed to {}", topic);
                continue;
            }
            match self.publisher.queue_subscribe(topic) {
                Ok(()) => {
                    info!("Subscribed to {}", topic);
                    self.active.insert(topic.to_string());
                    added += 1;
                }
                Err(e) => {
                    warn!("Subscribing to {} failed: {}", topic, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(added),
        }
    }

    /// True once every inbound topic is subscribed on the current connection.
    pub fn is_complete(&self) -> bool {
        self.topics
            .inbound()
            .iter()
            .all(|topic| self.active.contains(*topic))
    }

    /// Forgets the subscriptions of a connection that is gone.
    pub fn on_disconnected(&mut self) {
        if !self.active.is_empty() {
            debug!("Dropping {} subscriptions of lost connection", self.active.len());
        }
        self.active.clear();
    }

    /// Unsubscribes everything; used on teardown.
    pub fn release(&mut self) {
        for topic in std::mem::take(&mut self.active) {
            match self.publisher.queue_unsubscribe(&topic) {
                Ok(()) => debug!("Unsubscribed from {}", topic),
                Err(e) => warn!("Unable to unsubscribe from {}: {}", topic, e),
            }
        }
    }

    pub fn publish(&self, topic: &str, payload: &str) -> Result<(), TransportError> {
        debug!("Publishing {:?} to {}", payload, topic);
        self.publisher.queue_publish(topic, payload)
    }

    /// Routes a message to its decoder. `None` for topics this client does not know.
    pub fn route(&self, msg: &MQTTMessage) -> Option<Result<Inbound, DecodeError>> {
        let topic = msg.topic();
        if topic == self.topics.sensors {
            Some(decode_sensors(topic, msg.content()).map(Inbound::Telemetry))
        } else if topic == self.topics.pump_status {
            Some(Ok(Inbound::PumpStatus(decode_pump_status(msg.content()))))
        } else {
            debug!("Ignoring message on unknown topic {}", topic);
            None
        }
    }
}

pub fn decode_sensors(topic: &str, payload: &str) -> Result<SensorSnapshot, DecodeError> {
    serde_json::from_str(payload).map_err(|e| DecodeError {
        topic: topic.to_string(),
        reason: e.to_string(),
    })
}

/// Exactly `ON` means running; everything else, including `on` and ` ON`, does not.
pub fn decode_pump_status(payload: &str) -> bool {
    payload == PUMP_ON
}
