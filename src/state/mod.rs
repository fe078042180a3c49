//! # View State
//!
//! The single view model of the remote device as seen by this client, and the
//! reconciler that owns it.
//!
//! ## Two producers, one flag
//!
//! Whether the pump runs is reported twice: inside every telemetry snapshot and on
//! the plain-text status topic. There are no sequence numbers on the wire, so the
//! flag follows whichever message *arrived* last. Both producers write through
//! [`reconciler::StateReconciler`]'s single mutation point.
//!
//! ```text
//! sirambro/sensors ──► SensorSnapshot ──┐
//!                                       ├──► StateReconciler ──► ViewModel
//! sirambro/pump/status ──► bool ────────┘
//! ```

pub mod reconciler;

use crate::mqtt::connection::ConnectionState;
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

/// One complete telemetry reading from the device.
///
/// Values pass through unmodified; a moisture of 140 is shown as 140.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorSnapshot {
    /// Soil moisture in percent
    pub moisture: i64,
    /// Distance to the water surface in centimeters
    pub distance: f64,
    pub battery_voltage: f64,
    pub battery_percent: i64,
    /// Pump state as reported alongside the readings
    pub pump_active: bool,
}

/// Which producer wrote the pump flag last.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpSource {
    Telemetry,
    StatusChannel,
}

/// Everything the dashboard and the command gate read.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewModel {
    pub connection_state: ConnectionState,
    /// Last transport error, kept until the next successful connect
    pub last_error: Option<String>,
    /// `None` until the first valid telemetry message
    pub snapshot: Option<SensorSnapshot>,
    pub pump_active: bool,
    pub pump_source: Option<PumpSource>,
    /// Arrival time of the last applied device message
    pub last_update: Option<DateTime<Local>>,
}

impl ViewModel {
    pub fn is_connected(&self) -> bool {
        self.connection_state == ConnectionState::Connected
    }
}
