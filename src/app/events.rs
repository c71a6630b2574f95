//! Outbound application events.
//!
//! The [`AppService`](super::service::AppService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Adapters on the other
//! side decide what to do with them: log to serial, publish to the farm
//! API, etc.

use chrono::{DateTime, Utc};

use crate::drivers::door::DoorState;
use crate::error::Error;
use crate::fsm::StateId;
use crate::gateway::dto::AlertDto;
use crate::ledger::{ConsumptionRecord, Rfid};

/// Structured events emitted by the application core.
#[derive(Debug, Clone, PartialEq)]
pub enum AppEvent {
    /// Point-in-time telemetry snapshot.
    Telemetry(TelemetryData),

    /// The FSM transitioned between states.
    StateChanged { from: StateId, to: StateId },

    /// A tag was read from an animal in the stall; its plan is requested.
    RfidIdentified(Rfid),

    /// A session was finalized.
    ConsumptionLogged {
        record: ConsumptionRecord,
        logged_at: DateTime<Utc>,
    },

    /// Operational alert for the farm API.
    Alert(AlertDto),

    /// One or more hardware faults were raised (bitmask of new faults).
    FaultDetected(u8),

    /// All hardware faults have been cleared.
    FaultCleared,

    /// Automation stopped on a fatal error.
    Halted(Error),

    /// The application service has started (carries initial state).
    Started(StateId),
}

/// A point-in-time telemetry snapshot suitable for logging or transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TelemetryData {
    pub state: StateId,
    pub presence: bool,
    pub entry_door: DoorState,
    pub separation_door: DoorState,
    pub consumed_grams: u32,
    pub daily_limit_grams: Option<u32>,
    pub fault_flags: u8,
    pub halted: bool,
}
