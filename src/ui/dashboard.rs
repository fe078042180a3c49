//! Render model of the dashboard.
//!
//! Pure function of the [`ViewModel`]; the egui layer only draws what is in here.
//! Unknown readings show `--`, never a zero.

use crate::gate::CommandGate;
use crate::mqtt::connection::ConnectionState;
use crate::state::ViewModel;

const UNKNOWN: &str = "--";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardKind {
    Moisture,
    WaterLevel,
    Voltage,
    Battery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorCard {
    pub kind: CardKind,
    pub title: &'static str,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dashboard {
    pub connected: bool,
    pub connection_label: String,
    pub cards: [SensorCard; 4],
    pub pump_running: bool,
    pub pump_button_label: &'static str,
    pub pump_hint: &'static str,
    /// Same rule as the command gate, so button and gate never disagree
    pub activation_enabled: bool,
}

impl Dashboard {
    pub fn from_view(view: &ViewModel) -> Self {
        let snapshot = view.snapshot.as_ref();

        let moisture = snapshot.map(|s| s.moisture.to_string());
        let distance = snapshot.map(|s| s.distance.to_string());
        let voltage = snapshot.map(|s| format!("{:.2}", s.battery_voltage));
        let battery = snapshot.map(|s| s.battery_percent.to_string());

        let cards = [
            SensorCard {
                kind: CardKind::Moisture,
                title: "💧 Soil Moisture",
                value: with_unit(moisture, "%"),
            },
            SensorCard {
                kind: CardKind::WaterLevel,
                title: "🪣 Water Level",
                value: with_unit(distance, " cm"),
            },
            SensorCard {
                kind: CardKind::Voltage,
                title: "⚡ Voltage",
                value: with_unit(voltage, " V"),
            },
            SensorCard {
                kind: CardKind::Battery,
                title: "🔋 Battery",
                value: with_unit(battery, "%"),
            },
        ];

        let (pump_button_label, pump_hint) = if view.pump_active {
            ("💦 Watering... (3s)", "Pump is running for 3 seconds")
        } else {
            ("💧 Water Now", "Press to water plants for 3 seconds")
        };

        Self {
            connected: view.is_connected(),
            connection_label: connection_label(view),
            cards,
            pump_running: view.pump_active,
            pump_button_label,
            pump_hint,
            activation_enabled: CommandGate::check(view).is_ok(),
        }
    }
}

fn with_unit(value: Option<String>, unit: &str) -> String {
    format!("{}{}", value.as_deref().unwrap_or(UNKNOWN), unit)
}

fn connection_label(view: &ViewModel) -> String {
    match (&view.connection_state, &view.last_error) {
        (ConnectionState::Connected, _) => "Connected".to_string(),
        (ConnectionState::Errored, Some(reason)) => format!("Disconnected ({})", reason),
        _ => "Disconnected".to_string(),
    }
}
