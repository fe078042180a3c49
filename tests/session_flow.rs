//! End-to-end flow through the session loop with a fake broker.

use std::sync::{Arc, Mutex};

use sirambro::gate::{Dispatch, GateRejection};
use sirambro::mqtt::config::TopicConfig;
use sirambro::mqtt::connection::{ConnectionEvent, ConnectionState};
use sirambro::mqtt::error::TransportError;
use sirambro::mqtt::message_manager::MQTTMessage;
use sirambro::mqtt::subscriber::Publisher;
use sirambro::mqtt::ClientEvent;
use sirambro::session::{Diagnostic, Session, UserCommand};
use sirambro::ui::dashboard::Dashboard;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct FakeBroker {
    requests: Arc<Mutex<Vec<String>>>,
}

impl FakeBroker {
    fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.starts_with(prefix))
            .count()
    }
}

impl Publisher for FakeBroker {
    fn queue_publish(&self, topic: &str, payload: &str) -> Result<(), TransportError> {
        self.requests
            .lock()
            .unwrap()
            .push(format!("PUB {} {}", topic, payload));
        Ok(())
    }

    fn queue_subscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.requests.lock().unwrap().push(format!("SUB {}", topic));
        Ok(())
    }

    fn queue_unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.requests.lock().unwrap().push(format!("UNSUB {}", topic));
        Ok(())
    }

    fn queue_disconnect(&self) -> Result<(), TransportError> {
        self.requests.lock().unwrap().push("DISCONNECT".to_string());
        Ok(())
    }
}

fn telemetry(moisture: i64, pump_active: bool) -> ClientEvent {
    ClientEvent::Message(MQTTMessage::from_topic(
        "sirambro/sensors",
        format!(
            r#"{{"moisture":{},"distance":21.5,"batteryVoltage":3.7,"batteryPercent":55,"pumpActive":{}}}"#,
            moisture, pump_active
        ),
    ))
}

fn status(payload: &str) -> ClientEvent {
    ClientEvent::Message(MQTTMessage::from_topic("sirambro/pump/status", payload))
}

async fn activate(commands: &mpsc::Sender<UserCommand>) -> Result<Dispatch, GateRejection> {
    let (response_tx, response_rx) = oneshot::channel();
    commands
        .send(UserCommand::ActivatePump { response_tx })
        .await
        .unwrap();
    response_rx.await.unwrap()
}

#[tokio::test]
async fn watering_cycle_through_the_loop() {
    let broker = FakeBroker::default();
    let (session, mut view) = Session::new(broker.clone(), TopicConfig::default());
    let mut diagnostics = session.diagnostics();

    let (event_tx, event_rx) = mpsc::channel(32);
    let (command_tx, command_rx) = mpsc::channel(4);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(session.run(event_rx, command_rx, cancel.clone()));

    // Noch keine Verbindung
    assert_eq!(activate(&command_tx).await, Err(GateRejection::NotConnected));
    assert_eq!(
        Dashboard::from_view(&view.borrow()).cards[0].value,
        "--%".to_string()
    );

    event_tx
        .send(ClientEvent::Connection(ConnectionEvent::Open))
        .await
        .unwrap();
    event_tx.send(telemetry(31, false)).await.unwrap();
    view.wait_for(|v| v.snapshot.is_some()).await.unwrap();
    assert_eq!(broker.count("SUB "), 2);

    assert_eq!(activate(&command_tx).await, Ok(Dispatch::Sent));

    // Gerät meldet Pumpe an: weitere Anfragen werden abgelehnt
    event_tx.send(status("ON")).await.unwrap();
    view.wait_for(|v| v.pump_active).await.unwrap();
    assert_eq!(activate(&command_tx).await, Err(GateRejection::AlreadyActive));
    assert!(!Dashboard::from_view(&view.borrow()).activation_enabled);

    // Müll auf dem Telemetrie-Topic ändert nichts
    let before = view.borrow().clone();
    event_tx
        .send(ClientEvent::Message(MQTTMessage::from_topic(
            "sirambro/sensors",
            "<html>",
        )))
        .await
        .unwrap();
    let diagnostic = diagnostics.recv().await.unwrap();
    assert!(matches!(diagnostic, Diagnostic::Decode(_)));
    assert_eq!(*view.borrow(), before);

    event_tx.send(telemetry(64, false)).await.unwrap();
    view.wait_for(|v| !v.pump_active).await.unwrap();
    assert_eq!(view.borrow().snapshot.as_ref().unwrap().moisture, 64);

    // Verbindungsabbruch, danach erneut verbunden
    event_tx
        .send(ClientEvent::Connection(ConnectionEvent::Error(
            "connection reset".to_string(),
        )))
        .await
        .unwrap();
    view.wait_for(|v| v.connection_state == ConnectionState::Errored)
        .await
        .unwrap();
    assert_eq!(activate(&command_tx).await, Err(GateRejection::NotConnected));

    event_tx
        .send(ClientEvent::Connection(ConnectionEvent::Open))
        .await
        .unwrap();
    view.wait_for(|v| v.is_connected()).await.unwrap();
    assert_eq!(broker.count("SUB "), 4);
    assert_eq!(activate(&command_tx).await, Ok(Dispatch::Sent));

    cancel.cancel();
    task.await.unwrap();

    assert_eq!(broker.count("PUB sirambro/pump/control ON"), 2);
    assert_eq!(broker.count("PUB "), 2);
    assert_eq!(broker.count("UNSUB "), 2);
    assert_eq!(broker.requests().last().map(String::as_str), Some("DISCONNECT"));
    assert_eq!(view.borrow().connection_state, ConnectionState::Disconnected);
}
