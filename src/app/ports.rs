//! Port traits: the hexagonal boundary between domain logic and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ AppService (domain)
//! ```
//!
//! Driven adapters (interlock hardware, clock, event sinks) implement these
//! traits.  The [`AppService`](super::service::AppService) consumes them via
//! generics, so the domain core never touches hardware directly.

use chrono::{DateTime, Utc};

use crate::drivers::door::{DoorId, DoorState};
use crate::drivers::feeder_motor::DispenseStatus;
use crate::error::ActuatorError;
use crate::ledger::Rfid;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read-side port: point-in-time sensor reads.
pub trait SensorPort {
    /// True while an animal occupies the stall.
    fn read_presence(&mut self) -> bool;

    /// Next complete tag from the reader, if one arrived.
    fn read_tag(&mut self) -> Option<Rfid>;

    /// Door position from its limit switches.
    fn door_state(&mut self, door: DoorId) -> DoorState;
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// Write-side port: every motor output goes through the interlock layer
/// behind this trait.
pub trait ActuatorPort {
    fn open_door(&mut self, door: DoorId) -> Result<(), ActuatorError>;

    fn close_door(&mut self, door: DoorId) -> Result<(), ActuatorError>;

    fn stop_door(&mut self, door: DoorId) -> Result<(), ActuatorError>;

    /// Start or continue a timed feeder pulse.  Must be called every tick
    /// while dispensing.
    fn dispense_feed(&mut self, duration_ms: u64, now_ms: u64)
    -> Result<DispenseStatus, ActuatorError>;

    /// Abort any dispense in progress.
    fn stop_feeder(&mut self) -> Result<(), ActuatorError>;

    /// Both doors and the feeder de-energised: safe state.
    fn all_off(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Time source.  Timers run on the monotonic clock; ledger and payload
/// timestamps use wall-clock UTC.
pub trait Clock {
    fn uptime_ms(&self) -> u64;

    fn now_utc(&self) -> DateTime<Utc>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → logging / gateway)
// ───────────────────────────────────────────────────────────────

/// The domain emits structured [`AppEvent`](super::events::AppEvent)s
/// through this port.  Adapters decide where they go (serial log, MQTT
/// outbox, etc.).
pub trait EventSink {
    fn emit(&mut self, event: &super::events::AppEvent);
}

/// Fan out to two sinks, e.g. `(LogEventSink, Outbox<_>)`.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &super::events::AppEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}
