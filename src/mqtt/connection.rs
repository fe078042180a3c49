//! Connection lifecycle as seen by the session loop.
//!
//! The link task reports raw connection events; [`ConnectionManager`] folds them
//! into a [`ConnectionState`] and tells the caller when a fresh connection has been
//! opened, which is the cue to (re)subscribe.

use std::fmt;
use tracing::{info, warn};

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
    /// Transport failure; counts as disconnected for the gate and the UI
    Errored,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "Disconnected"),
            ConnectionState::Connected => write!(f, "Connected"),
            ConnectionState::Errored => write!(f, "Error"),
        }
    }
}

/// Connection events emitted by the link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectionEvent {
    /// Broker accepted the handshake
    Open,
    Error(String),
    Close,
}

/// Result of feeding one event into the manager.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Transition {
    /// A new connection is up; subscriptions must be (re)established
    Opened,
    /// The connection is gone; broker-side subscriptions are lost
    Lost,
    Unchanged,
}

#[derive(Debug, Default)]
pub struct ConnectionManager {
    state: ConnectionState,
    last_error: Option<String>,
    connections: usize,
}

impl ConnectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Number of connections opened so far
    #[cfg(test)]
    pub fn connections(&self) -> usize {
        self.connections
    }

    pub fn on_event(&mut self, event: &ConnectionEvent) -> Transition {
        match event {
            ConnectionEvent::Open => {
                if self.is_connected() {
                    // doppelter ConnAck, gleiche Verbindung
                    return Transition::Unchanged;
                }
                self.connections += 1;
                self.state = ConnectionState::Connected;
                self.last_error = None;
                info!("Broker connection established (#{})", self.connections);
                Transition::Opened
            }
            ConnectionEvent::Error(reason) => {
                let was_connected = self.is_connected();
                warn!("Broker connection error: {}", reason);
                self.state = ConnectionState::Errored;
                self.last_error = Some(reason.clone());
                if was_connected {
                    Transition::Lost
                } else {
                    Transition::Unchanged
                }
            }
            ConnectionEvent::Close => {
                let was_connected = self.is_connected();
                if was_connected {
                    info!("Broker connection closed");
                }
                self.state = ConnectionState::Disconnected;
                if was_connected {
                    Transition::Lost
                } else {
                    Transition::Unchanged
                }
            }
        }
    }
}
