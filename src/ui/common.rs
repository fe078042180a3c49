//! Shared styling for the dashboard.

use super::dashboard::CardKind;
use eframe::egui::{Color32, Frame, Stroke};

/// Color palette of the dashboard (dark theme).
pub struct UiColors;

impl UiColors {
    /// Primary background color for main content areas (RGB: 30, 30, 30)
    pub const MAIN_BG: Color32 = Color32::from_rgb(30, 30, 30);

    /// Background of the sensor cards (RGB: 25, 25, 25)
    pub const INNER_BG: Color32 = Color32::from_rgb(25, 25, 25);

    /// Connected indicator (green)
    pub const ACTIVE: Color32 = Color32::from_rgb(50, 200, 20);

    /// Disconnected indicator and problem messages (red)
    pub const INACTIVE: Color32 = Color32::from_rgb(200, 50, 20);

    pub const MOISTURE: Color32 = Color32::from_rgb(34, 160, 90);
    pub const WATER: Color32 = Color32::from_rgb(40, 120, 220);
    pub const VOLTAGE: Color32 = Color32::from_rgb(220, 190, 40);
    pub const BATTERY: Color32 = Color32::from_rgb(235, 130, 30);
    pub const PUMP: Color32 = Color32::from_rgb(20, 180, 200);

    pub fn accent(kind: CardKind) -> Color32 {
        match kind {
            CardKind::Moisture => Self::MOISTURE,
            CardKind::WaterLevel => Self::WATER,
            CardKind::Voltage => Self::VOLTAGE,
            CardKind::Battery => Self::BATTERY,
        }
    }
}

/// Card frame with the given accent border.
pub fn card_frame(border_color: Color32) -> Frame {
    Frame::new()
        .stroke(Stroke::new(1.0, border_color))
        .fill(UiColors::INNER_BG)
        .inner_margin(8)
        .outer_margin(2)
}
