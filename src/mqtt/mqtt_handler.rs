//! Broker link: owns the rumqttc event loop and turns its output into
//! [`ClientEvent`]s for the session loop.
//!
//! # State Machine
//!
//! ```text
//! Configured ──start()──► Polling ──run()──► (cancelled / session gone)
//! ```
//!
//! The link never touches view state. It reports what happened on the wire and keeps
//! polling after transport errors, which is how rumqttc reconnects.
//!
//! Nothing from a dead connection is carried into the next one: rumqttc would replay
//! unacked publishes and queued requests after the next CONNACK, so the link drops
//! them before reconnecting. A pump command is only ever sent for the request that
//! passed the gate, and subscriptions are re-issued by the session.

use std::collections::VecDeque;
use std::time::Duration;

use rumqttc::{
    AsyncClient, ConnectReturnCode, ConnectionError, Event, EventLoop, MqttOptions, Outgoing,
    Packet, QoS, Request, Transport,
};
use statum::{machine, state};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::config::{BrokerEndpoint, MqttConfig};
use super::connection::ConnectionEvent;
use super::error::TransportError;
use super::message_manager::MQTTMessage;
use super::subscriber::Publisher;
use super::ClientEvent;
use crate::config::ConfigError;

/// How long a cancelled link keeps polling to flush the DISCONNECT packet.
const SHUTDOWN_FLUSH: Duration = Duration::from_millis(500);

#[state]
#[derive(Debug, Clone)]
pub enum LinkState {
    Configured, // Client built, nothing on the wire yet
    Polling,    // Event loop running
}

#[machine]
pub struct MqttLink<S: LinkState> {
    eventloop: EventLoop,
    events: mpsc::Sender<ClientEvent>,
    reconnect_delay: Duration,
    endpoint: BrokerEndpoint,
}

impl<S: LinkState> MqttLink<S> {
    pub fn endpoint(&self) -> &BrokerEndpoint {
        &self.endpoint
    }
}

impl MqttLink<Configured> {
    /// Builds the rumqttc client for the configured endpoint.
    ///
    /// Returns the link and the client handle the session publishes through. Nothing
    /// is sent until the link is started and polled.
    pub fn connect(
        config: &MqttConfig,
        events: mpsc::Sender<ClientEvent>,
    ) -> Result<(Self, AsyncClient), ConfigError> {
        let endpoint = config.endpoint()?;
        info!("Configuring MQTT link to {}", config);

        let mut options = match &endpoint {
            BrokerEndpoint::Tcp { host, port } => {
                MqttOptions::new(config.client_id.clone(), host.clone(), *port)
            }
            BrokerEndpoint::WebSocket { url, port } => {
                let mut options = MqttOptions::new(config.client_id.clone(), url.clone(), *port);
                options.set_transport(Transport::Ws);
                options
            }
        };

        options
            .set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)))
            .set_clean_session(true);
        if config.has_credentials() {
            options.set_credentials(config.user.clone(), config.pw.clone());
        }

        let (client, eventloop) = AsyncClient::new(options, config.channel_capacity.max(10));
        debug!("MQTT client created for {}", endpoint);

        let link = Self::new(
            eventloop,
            events,
            Duration::from_millis(config.reconnect_delay_ms),
            endpoint,
        );
        Ok((link, client))
    }

    pub fn start(self) -> MqttLink<Polling> {
        info!("Starting MQTT link to {}", self.endpoint);
        self.transition()
    }
}

impl MqttLink<Polling> {
    /// Polls the broker until cancelled or until the session stops listening.
    pub async fn run(mut self, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("MQTT link cancelled");
                    self.flush_disconnect().await;
                    break;
                }
                event = self.eventloop.poll() => {
                    let failed = event.is_err();
                    if let Some(client_event) = translate(event) {
                        if self.events.send(client_event).await.is_err() {
                            info!("Session loop gone, stopping MQTT link");
                            break;
                        }
                    }

                    if failed {
                        // rumqttc verbindet beim nächsten poll() neu
                        tokio::select! {
                            _ = cancel.cancelled() => {
                                info!("MQTT link cancelled while waiting to reconnect");
                                break;
                            }
                            _ = tokio::time::sleep(self.reconnect_delay) => {
                                debug!("Reconnecting to {}", self.endpoint);
                            }
                        }
                        self.discard_stale_requests();
                    }
                }
            }
        }
    }

    fn discard_stale_requests(&mut self) {
        // zieht auch die noch nicht gesendeten Requests aus dem Kanal
        self.eventloop.clean();
        let dropped = drop_stale_requests(&mut self.eventloop.pending);
        if dropped > 0 {
            warn!("Dropped {} requests of the lost connection", dropped);
        }
    }

    async fn flush_disconnect(&mut self) {
        let flush = async {
            loop {
                match self.eventloop.poll().await {
                    Ok(Event::Outgoing(Outgoing::Disconnect)) => break,
                    Ok(_) => {}
                    Err(e) => {
                        debug!("Link closed during shutdown: {}", e);
                        break;
                    }
                }
            }
        };
        if tokio::time::timeout(SHUTDOWN_FLUSH, flush).await.is_err() {
            warn!("Disconnect not flushed within {:?}", SHUTDOWN_FLUSH);
        }
    }
}

/// Removes publishes and (un)subscribes left over from a previous connection.
/// Returns how many were removed.
pub fn drop_stale_requests(pending: &mut VecDeque<Request>) -> usize {
    let before = pending.len();
    pending.retain(|request| {
        !matches!(
            request,
            Request::Publish(_) | Request::Subscribe(_) | Request::Unsubscribe(_)
        )
    });
    before - pending.len()
}

/// Maps one rumqttc poll result to a client event. Packets the session does not
/// care about (acks, pings, outgoing traffic) map to `None`.
pub fn translate(event: Result<Event, ConnectionError>) -> Option<ClientEvent> {
    match event {
        Ok(Event::Incoming(Packet::ConnAck(ack))) => {
            if ack.code == ConnectReturnCode::Success {
                Some(ClientEvent::Connection(ConnectionEvent::Open))
            } else {
                Some(ClientEvent::Connection(ConnectionEvent::Error(format!(
                    "connection refused: {:?}",
                    ack.code
                ))))
            }
        }
        Ok(Event::Incoming(Packet::Publish(publish))) => Some(ClientEvent::Message(
            MQTTMessage::from_payload(publish.topic.clone(), &publish.payload),
        )),
        Ok(Event::Incoming(Packet::Disconnect)) | Ok(Event::Outgoing(Outgoing::Disconnect)) => {
            Some(ClientEvent::Connection(ConnectionEvent::Close))
        }
        Ok(_) => None,
        Err(e) => {
            error!("MQTT transport error: {}", e);
            Some(ClientEvent::Connection(ConnectionEvent::Error(e.to_string())))
        }
    }
}

impl Publisher for AsyncClient {
    fn queue_publish(&self, topic: &str, payload: &str) -> Result<(), TransportError> {
        // QoS 0: ein Befehl wird nie wiederholt
        self.try_publish(topic, QoS::AtMostOnce, false, payload.as_bytes().to_vec())
            .map_err(|e| TransportError::Publish {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    fn queue_subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.try_subscribe(topic, QoS::AtLeastOnce)
            .map_err(|e| TransportError::Subscription {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    fn queue_unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.try_unsubscribe(topic)
            .map_err(|e| TransportError::Subscription {
                topic: topic.to_string(),
                reason: e.to_string(),
            })
    }

    fn queue_disconnect(&self) -> Result<(), TransportError> {
        self.try_disconnect()
            .map_err(|e| TransportError::Connection(e.to_string()))
    }
}
