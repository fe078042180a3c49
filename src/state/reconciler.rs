use super::{PumpSource, SensorSnapshot, ViewModel};
use crate::mqtt::connection::ConnectionState;
use chrono::{DateTime, Local};
use tracing::debug;

/// Sole owner and writer of the [`ViewModel`].
#[derive(Debug, Default)]
pub struct StateReconciler {
    view: ViewModel,
}

impl StateReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current_view(&self) -> &ViewModel {
        &self.view
    }

    /// Replaces the held snapshot and takes its pump state.
    pub fn apply_sensor_snapshot(&mut self, snapshot: SensorSnapshot, received: DateTime<Local>) {
        let pump_active = snapshot.pump_active;
        self.view.snapshot = Some(snapshot);
        self.record_pump_active(pump_active, PumpSource::Telemetry, received);
    }

    /// Overrides the pump flag only; the snapshot's own `pump_active` may now disagree
    /// until the next message on either topic.
    pub fn apply_pump_status(&mut self, active: bool, received: DateTime<Local>) {
        self.record_pump_active(active, PumpSource::StatusChannel, received);
    }

    pub fn set_connection(&mut self, state: ConnectionState, last_error: Option<String>) {
        if state == ConnectionState::Connected {
            self.view.last_error = None;
        } else if last_error.is_some() {
            self.view.last_error = last_error;
        }
        self.view.connection_state = state;
    }

    // Einziger Schreibpfad für das Pumpen-Flag
    fn record_pump_active(&mut self, active: bool, source: PumpSource, received: DateTime<Local>) {
        if self.view.pump_active != active {
            debug!("Pump flag {} -> {} via {:?}", self.view.pump_active, active, source);
        }
        self.view.pump_active = active;
        self.view.pump_source = Some(source);
        self.view.last_update = Some(received);
    }
}
