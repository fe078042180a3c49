//! Command gate for the one actuator this client controls.
//!
//! The device decides whether the pump runs; the client only asks. A request goes
//! out when the broker connection is up and the last known pump state is idle.
//! Nothing is changed locally after sending: the flag flips when the device says so.
//! Until that status arrives a second request could slip through; that window is
//! accepted.

use crate::mqtt::error::TransportError;
use crate::mqtt::subscriber::{Publisher, TopicSubscriber, PUMP_ON};
use crate::state::ViewModel;
use thiserror::Error;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum GateRejection {
    #[error("Not connected to the broker")]
    NotConnected,

    #[error("Pump is already running")]
    AlreadyActive,
}

/// Outcome of a permitted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// The command was queued for the broker
    Sent,
    /// The gate allowed it but the transport refused to queue it
    Dropped(TransportError),
}

#[derive(Debug, Default, Clone, Copy)]
pub struct CommandGate;

impl CommandGate {
    /// The eligibility rule, without side effects. The dashboard uses this too.
    pub fn check(view: &ViewModel) -> Result<(), GateRejection> {
        if !view.is_connected() {
            return Err(GateRejection::NotConnected);
        }
        if view.pump_active {
            return Err(GateRejection::AlreadyActive);
        }
        Ok(())
    }

    /// Publishes one `ON` to the control topic if [`CommandGate::check`] allows it.
    pub fn request_pump_activation<P: Publisher>(
        &self,
        view: &ViewModel,
        subscriber: &TopicSubscriber<P>,
    ) -> Result<Dispatch, GateRejection> {
        if let Err(rejection) = Self::check(view) {
            warn!("Pump activation rejected: {}", rejection);
            return Err(rejection);
        }

        let topic = &subscriber.topics().pump_control;
        match subscriber.publish(topic, PUMP_ON) {
            Ok(()) => {
                info!("Pump activation sent to {}", topic);
                Ok(Dispatch::Sent)
            }
            Err(e) => {
                error!("Pump activation could not be queued: {}", e);
                Ok(Dispatch::Dropped(e))
            }
        }
    }
}
