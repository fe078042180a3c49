//! SiramBro viewer: live telemetry and pump control for a remote watering device
//! over MQTT.
//!
//! ```text
//! config ──► mqtt (link, connection, subscriber) ──► session ──► state
//!                                                      │           │
//!                                                    gate ◄── ui ◄─┘
//! ```

pub mod config;
pub mod gate;
pub mod mqtt;
pub mod session;
pub mod state;
pub mod ui;
