//! # Session Loop
//!
//! The single consumer of everything that happens to the client. Broker events and
//! user commands arrive on two channels; each one is handled to completion before
//! the next is taken, so the view model never changes halfway through a message.
//!
//! ```text
//!            ┌──────────── ClientEvent (mpsc) ◄── MqttLink<Polling>
//!            ▼
//! Session ───┼──► ConnectionManager ─► TopicSubscriber ─► StateReconciler
//!            ▲                                                  │
//!            └──────────── UserCommand (mpsc) ◄── UI            ▼
//!                                                     watch::Sender<ViewModel>
//! ```
//!
//! Readers never touch the reconciler. They get finished [`ViewModel`] copies through
//! a `watch` channel and problems through a `broadcast` channel of [`Diagnostic`]s.

use std::time::Duration;

use rumqttc::AsyncClient;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ConfigError;
use crate::gate::{CommandGate, Dispatch, GateRejection};
use crate::mqtt::config::{MqttConfig, TopicConfig};
use crate::mqtt::connection::{ConnectionEvent, ConnectionManager, ConnectionState, Transition};
use crate::mqtt::error::{DecodeError, TransportError};
use crate::mqtt::message_manager::MQTTMessage;
use crate::mqtt::mqtt_handler::MqttLink;
use crate::mqtt::subscriber::{Inbound, Publisher, TopicSubscriber};
use crate::mqtt::ClientEvent;
use crate::state::reconciler::StateReconciler;
use crate::state::ViewModel;

const DIAGNOSTICS_CAPACITY: usize = 64;
const COMMAND_CAPACITY: usize = 16;
/// Interval for re-trying subscriptions that failed on a live connection.
const SUBSCRIBE_RETRY: Duration = Duration::from_secs(1);

/// Something went wrong that the view model does not show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Diagnostic {
    /// Telemetry payload dropped
    Decode(DecodeError),
    Transport(TransportError),
}

/// Requests from the user interface.
#[derive(Debug)]
pub enum UserCommand {
    ActivatePump {
        response_tx: oneshot::Sender<Result<Dispatch, GateRejection>>,
    },
}

pub struct Session<P: Publisher> {
    connection: ConnectionManager,
    subscriber: TopicSubscriber<P>,
    reconciler: StateReconciler,
    gate: CommandGate,
    view_tx: watch::Sender<ViewModel>,
    diagnostics: broadcast::Sender<Diagnostic>,
}

impl<P: Publisher> Session<P> {
    pub fn new(publisher: P, topics: TopicConfig) -> (Self, watch::Receiver<ViewModel>) {
        let reconciler = StateReconciler::new();
        let (view_tx, view_rx) = watch::channel(reconciler.current_view().clone());
        let (diagnostics, _) = broadcast::channel(DIAGNOSTICS_CAPACITY);

        let session = Self {
            connection: ConnectionManager::new(),
            subscriber: TopicSubscriber::new(publisher, topics),
            reconciler,
            gate: CommandGate,
            view_tx,
            diagnostics,
        };
        (session, view_rx)
    }

    pub fn current_view(&self) -> &ViewModel {
        self.reconciler.current_view()
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn subscriber(&self) -> &TopicSubscriber<P> {
        &self.subscriber
    }

    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.diagnostics.subscribe()
    }

    pub fn watch_view(&self) -> watch::Receiver<ViewModel> {
        self.view_tx.subscribe()
    }

    /// Applies one broker event and publishes the resulting view.
    pub fn handle_event(&mut self, event: ClientEvent) {
        match event {
            ClientEvent::Connection(event) => self.handle_connection(event),
            ClientEvent::Message(msg) => self.handle_message(&msg),
        }
        self.ensure_subscribed();
        self.publish_view();
    }

    fn handle_message(&mut self, msg: &MQTTMessage) {
        debug!("Received {}", msg);
        match self.subscriber.route(msg) {
            Some(Ok(Inbound::Telemetry(snapshot))) => {
                self.reconciler
                    .apply_sensor_snapshot(snapshot, msg.timestamp());
            }
            Some(Ok(Inbound::PumpStatus(active))) => {
                self.reconciler.apply_pump_status(active, msg.timestamp());
            }
            Some(Err(e)) => {
                warn!("Dropping telemetry: {}", e);
                self.raise(Diagnostic::Decode(e));
            }
            None => {}
        }
    }

    fn handle_connection(&mut self, event: ConnectionEvent) {
        match self.connection.on_event(&event) {
            Transition::Opened => debug!("New connection, subscribing"),
            Transition::Lost => self.subscriber.on_disconnected(),
            Transition::Unchanged => {}
        }

        if let ConnectionEvent::Error(reason) = event {
            self.raise(Diagnostic::Transport(TransportError::Connection(reason)));
        }

        self.reconciler.set_connection(
            self.connection.state(),
            self.connection.last_error().map(str::to_string),
        );
    }

    /// Subscribes whatever is still missing on the live connection.
    fn ensure_subscribed(&mut self) {
        if !self.connection.is_connected() || self.subscriber.is_complete() {
            return;
        }
        if let Err(e) = self.subscriber.subscribe_all() {
            error!("Subscribing failed: {}", e);
            self.raise(Diagnostic::Transport(e));
        }
    }

    /// Runs the command gate against the current view.
    pub fn request_pump_activation(&mut self) -> Result<Dispatch, GateRejection> {
        let result = self
            .gate
            .request_pump_activation(self.reconciler.current_view(), &self.subscriber);
        if let Ok(Dispatch::Dropped(e)) = &result {
            self.raise(Diagnostic::Transport(e.clone()));
        }
        result
    }

    pub fn handle_command(&mut self, command: UserCommand) {
        match command {
            UserCommand::ActivatePump { response_tx } => {
                self.ensure_subscribed();
                let result = self.request_pump_activation();
                if response_tx.send(result).is_err() {
                    debug!("Activation requester went away before the answer");
                }
            }
        }
    }

    /// Releases subscriptions and closes the connection. Pending publishes are not
    /// waited for.
    pub fn shutdown(&mut self) {
        info!("Shutting down session");
        self.subscriber.release();
        if let Err(e) = self.subscriber.publisher().queue_disconnect() {
            warn!("Unable to queue disconnect: {}", e);
        }
        self.connection.on_event(&ConnectionEvent::Close);
        self.reconciler
            .set_connection(self.connection.state(), None);
        self.publish_view();
    }

    /// Consumes events and commands in arrival order until cancelled, until the link
    /// stops, or until the UI drops its command sender. Subscriptions missing on a
    /// live connection are retried every [`SUBSCRIBE_RETRY`].
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<ClientEvent>,
        mut commands: mpsc::Receiver<UserCommand>,
        cancel: CancellationToken,
    ) {
        info!("Session loop started");
        let mut retry = tokio::time::interval(SUBSCRIBE_RETRY);
        retry.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Session cancelled");
                    break;
                }
                event = events.recv() => match event {
                    Some(event) => self.handle_event(event),
                    None => {
                        info!("MQTT link stopped");
                        break;
                    }
                },
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => {
                        info!("UI closed");
                        break;
                    }
                },
                _ = retry.tick() => self.ensure_subscribed(),
            }
        }
        self.shutdown();
    }

    fn raise(&self, diagnostic: Diagnostic) {
        // Fehler nur, wenn niemand zuhört
        let _ = self.diagnostics.send(diagnostic);
    }

    fn publish_view(&self) {
        let current = self.reconciler.current_view();
        self.view_tx.send_if_modified(|view| {
            if view != current {
                *view = current.clone();
                true
            } else {
                false
            }
        });
    }
}

/// Handles to a running session: what the UI reads and where it writes.
pub struct SessionHandle {
    pub view: watch::Receiver<ViewModel>,
    pub commands: mpsc::Sender<UserCommand>,
    diagnostics: broadcast::Sender<Diagnostic>,
    pub cancel: CancellationToken,
    pub link_task: JoinHandle<()>,
    pub session_task: JoinHandle<()>,
}

impl SessionHandle {
    /// Connects to the configured broker and spawns the link and session tasks.
    ///
    /// Must be called inside a tokio runtime.
    pub fn spawn(config: &MqttConfig, cancel: CancellationToken) -> Result<Self, ConfigError> {
        let (event_tx, event_rx) = mpsc::channel(config.channel_capacity.max(1));
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);

        let (link, client) = MqttLink::connect(config, event_tx)?;
        let (session, view) = Session::<AsyncClient>::new(client, config.topics.clone());
        let diagnostics = session.diagnostics.clone();

        let link_task = tokio::spawn(link.start().run(cancel.clone()));
        let session_task = tokio::spawn(session.run(event_rx, command_rx, cancel.clone()));
        info!("Session spawned for {}", config);

        Ok(Self {
            view,
            commands: command_tx,
            diagnostics,
            cancel,
            link_task,
            session_task,
        })
    }

    /// A fresh receiver for session diagnostics.
    pub fn diagnostics(&self) -> broadcast::Receiver<Diagnostic> {
        self.diagnostics.subscribe()
    }

    /// Cancels both tasks and waits for the session to release its resources.
    pub async fn shutdown(self) {
        self.cancel.cancel();
        if let Err(e) = self.session_task.await {
            error!("Session task failed: {}", e);
        }
        if let Err(e) = self.link_task.await {
            error!("Link task failed: {}", e);
        }
    }
}
