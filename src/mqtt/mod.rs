//! # MQTT Integration Module
//!
//! Everything between the broker and the session loop: the rumqttc link, the
//! connection lifecycle, topic subscriptions and the message decoders.
//!
//! ## Module Architecture
//!
//! ```text
//! mqtt/
//! ├── config.rs           - Broker endpoint, credentials and topic names
//! ├── connection.rs       - ConnectionState and the connection manager
//! ├── error.rs            - Transport and decode errors
//! ├── message_manager.rs  - Inbound message representation
//! ├── mqtt_handler.rs     - rumqttc event loop (statum link: Configured → Polling)
//! └── subscriber.rs       - Subscriptions, routing, decoders, publishing
//! ```
//!
//! ## Event Flow
//!
//! The link does not call into the rest of the application. It pushes
//! [`ClientEvent`]s into one bounded channel and the session loop consumes them in
//! arrival order, one at a time:
//!
//! ```text
//! broker ──► MqttLink<Polling> ──[ClientEvent]──► Session ──► ViewModel
//!    ▲                                               │
//!    └──────────── AsyncClient (try_publish) ◄───────┘
//! ```

pub mod config;
pub mod connection;
pub mod error;
pub mod message_manager;
pub mod mqtt_handler;
pub mod subscriber;

#[cfg(test)]
pub(crate) mod testing;

use connection::ConnectionEvent;
use message_manager::MQTTMessage;

/// Everything the link reports to the session loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    Connection(ConnectionEvent),
    Message(MQTTMessage),
}
