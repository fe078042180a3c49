//! # SiramBro User Interface
//!
//! A single egui window showing the device dashboard: connection indicator, four
//! sensor cards and the pump button.
//!
//! ## Read-only by construction
//!
//! The UI never owns device state. Every frame it takes the latest [`ViewModel`]
//! from the session's `watch` channel, turns it into a [`Dashboard`] and draws that.
//! The only thing it writes is a [`UserCommand`] into the session's command channel;
//! whether the pump actually starts is decided by the gate in the session loop and,
//! ultimately, by the device.
//!
//! Dropping the UI drops the command sender, which ends the session loop.

pub mod common;
pub mod dashboard;

use eframe::egui::{self, vec2, Button, RichText};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tracing::{debug, info, warn};

use crate::config::UiConfig;
use crate::gate::{Dispatch, GateRejection};
use crate::session::{Diagnostic, UserCommand};
use crate::state::ViewModel;

use self::common::{card_frame, UiColors};
use self::dashboard::{Dashboard, SensorCard};

pub struct SiramBroUI {
    view: watch::Receiver<ViewModel>,
    commands: mpsc::Sender<UserCommand>,
    diagnostics: broadcast::Receiver<Diagnostic>,
    pending: Option<oneshot::Receiver<Result<Dispatch, GateRejection>>>,
    // letzte Rückmeldung für den Nutzer
    status_line: Option<String>,
    refresh: Duration,
}

impl SiramBroUI {
    pub fn new(
        _cc: &eframe::CreationContext<'_>,
        view: watch::Receiver<ViewModel>,
        commands: mpsc::Sender<UserCommand>,
        diagnostics: broadcast::Receiver<Diagnostic>,
        config: &UiConfig,
    ) -> Self {
        info!("Creating dashboard UI");
        Self {
            view,
            commands,
            diagnostics,
            pending: None,
            status_line: None,
            refresh: Duration::from_millis(config.refresh_ms.max(16)),
        }
    }

    fn request_activation(&mut self) {
        let (response_tx, response_rx) = oneshot::channel();
        match self
            .commands
            .try_send(UserCommand::ActivatePump { response_tx })
        {
            Ok(()) => {
                debug!("Activation request queued");
                self.pending = Some(response_rx);
            }
            Err(e) => {
                warn!("Unable to queue activation request: {}", e);
                self.status_line = Some("Session is not responding".to_string());
            }
        }
    }

    fn poll_feedback(&mut self) {
        let outcome = match self.pending.as_mut() {
            Some(rx) => rx.try_recv(),
            None => Err(oneshot::error::TryRecvError::Empty),
        };
        match outcome {
            Ok(Ok(Dispatch::Sent)) => {
                self.status_line = None;
                self.pending = None;
            }
            Ok(Ok(Dispatch::Dropped(e))) => {
                self.status_line = Some(format!("Command not sent: {}", e));
                self.pending = None;
            }
            Ok(Err(rejection)) => {
                self.status_line = Some(rejection.to_string());
                self.pending = None;
            }
            Err(oneshot::error::TryRecvError::Empty) => {}
            Err(oneshot::error::TryRecvError::Closed) => self.pending = None,
        }

        loop {
            match self.diagnostics.try_recv() {
                Ok(Diagnostic::Decode(e)) => self.status_line = Some(e.to_string()),
                Ok(Diagnostic::Transport(e)) => self.status_line = Some(e.to_string()),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    debug!("UI skipped {} diagnostics", skipped);
                }
                Err(_) => break,
            }
        }
    }

    fn card(ui: &mut egui::Ui, card: &SensorCard, width: f32) {
        let accent = UiColors::accent(card.kind);
        card_frame(accent).show(ui, |ui| {
            ui.set_width(width);
            ui.colored_label(accent, card.title);
            ui.label(RichText::new(&card.value).size(28.0).strong());
        });
    }
}

impl eframe::App for SiramBroUI {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_feedback();
        let dashboard = Dashboard::from_view(&self.view.borrow());

        egui::CentralPanel::default()
            .frame(egui::Frame::new().fill(UiColors::MAIN_BG).inner_margin(16))
            .show(ctx, |ui| {
                ui.vertical_centered(|ui| {
                    ui.heading(RichText::new("🌱 SiramBro").size(32.0));
                    ui.label("Smart Plant Watering System");
                    ui.horizontal(|ui| {
                        let status_color = if dashboard.connected {
                            UiColors::ACTIVE
                        } else {
                            UiColors::INACTIVE
                        };
                        ui.colored_label(status_color, "\u{2B24}");
                        ui.label(dashboard.connection_label.as_str());
                    });
                });
                ui.add_space(12.0);

                let card_width = (ui.available_width() - 24.0) / 2.0;
                egui::Grid::new("sensor_cards")
                    .num_columns(2)
                    .spacing([8.0, 8.0])
                    .show(ui, |ui| {
                        for (index, card) in dashboard.cards.iter().enumerate() {
                            Self::card(ui, card, card_width);
                            if index % 2 == 1 {
                                ui.end_row();
                            }
                        }
                    });
                ui.add_space(12.0);

                card_frame(UiColors::PUMP).show(ui, |ui| {
                    ui.colored_label(UiColors::PUMP, "🚿 Water Pump Control");
                    let button = Button::new(RichText::new(dashboard.pump_button_label).size(20.0))
                        .min_size(vec2(ui.available_width(), 56.0));
                    if ui.add_enabled(dashboard.activation_enabled, button).clicked() {
                        self.request_activation();
                    }
                    ui.label(dashboard.pump_hint);
                });

                if let Some(status) = &self.status_line {
                    ui.colored_label(UiColors::INACTIVE, status.as_str());
                }
            });

        ctx.request_repaint_after(self.refresh);
    }
}
