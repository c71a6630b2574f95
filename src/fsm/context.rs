//! Shared mutable context threaded through every FSM handler.
//!
//! `FsmContext` is the single struct that state handlers read from and
//! write to.  It contains the latest sensor snapshot, actuator command
//! outputs, timing information, the configuration snapshot, the current
//! feeding session and the events produced during the tick.  Think of it
//! as the "blackboard" in a blackboard architecture.

use chrono::{DateTime, Utc};
use log::{error, warn};

use crate::app::events::AppEvent;
use crate::config::FeederConfig;
use crate::drivers::door::DoorState;
use crate::drivers::feeder_motor::DispenseStatus;
use crate::gateway::dto::{AlertDto, AlertType, DailyPlanDto};
use crate::ledger::{FeedingSession, Rfid};

// ---------------------------------------------------------------------------
// Sensor snapshot (read-only to state handlers; written by the service)
// ---------------------------------------------------------------------------

/// Inputs gathered before each FSM tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SensorSnapshot {
    /// Animal in the stall.
    pub presence: bool,
    /// Tag read this tick (only polled while presence is asserted).
    pub tag: Option<Rfid>,
    pub entry_door: DoorState,
    pub separation_door: DoorState,
    /// Daily plan taken from the inbound queue this tick.  Only drained
    /// while a plan is being awaited.
    pub plan: Option<DailyPlanDto>,
}

impl Default for SensorSnapshot {
    fn default() -> Self {
        Self {
            presence: false,
            tag: None,
            entry_door: DoorState::Moving(None),
            separation_door: DoorState::Moving(None),
            plan: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Actuator commands (written by state handlers; applied by the service)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorCommand {
    Open,
    Close,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeederCommand {
    Off,
    /// Keep polling the current dispense pulse.
    Dispense,
}

/// Commands persist across ticks and are re-applied every tick, so a door
/// keeps driving until its limit switch asserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuatorCommands {
    pub entry_door: DoorCommand,
    pub separation_door: DoorCommand,
    pub feeder: FeederCommand,
}

impl Default for ActuatorCommands {
    fn default() -> Self {
        Self::all_off()
    }
}

impl ActuatorCommands {
    /// All actuators off: safe default.
    pub fn all_off() -> Self {
        Self {
            entry_door: DoorCommand::Stop,
            separation_door: DoorCommand::Stop,
            feeder: FeederCommand::Off,
        }
    }
}

// ---------------------------------------------------------------------------
// Admission progress
// ---------------------------------------------------------------------------

/// Progress of identifying the animal in the stall before it may feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// Stall empty.
    Vacant,
    /// Animal present, no usable tag yet.
    Identifying { since_ms: u64, reported: bool },
    /// Tag published, waiting for the daily plan answering it.
    AwaitingPlan {
        rfid: Rfid,
        since_ms: u64,
        reported: bool,
    },
}

// ---------------------------------------------------------------------------
// FsmContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct FsmContext {
    // -- Timing --
    /// Monotonic time of this tick (ms).
    pub now_ms: u64,
    /// Wall-clock time of this tick.
    pub now_utc: DateTime<Utc>,
    /// Monotonic time the current state was entered (ms).
    pub state_entered_ms: u64,
    /// Ticks elapsed since the current state was entered.
    pub ticks_in_state: u64,
    /// Monotonic total tick count.
    pub total_ticks: u64,

    // -- Inputs / outputs --
    pub sensors: SensorSnapshot,
    pub commands: ActuatorCommands,
    /// Result of the last `dispense_feed` call, if the feeder was polled.
    pub last_dispense: Option<DispenseStatus>,

    // -- Configuration --
    /// Snapshot taken at the start of the tick.
    pub config: FeederConfig,

    // -- Session --
    pub ledger: Option<FeedingSession>,
    pub admission: Admission,

    // -- Feeding progress --
    /// When the next portion is due (start-to-start).
    pub next_portion_at_ms: u64,
    /// A dispense pulse has been started and not yet credited.
    pub portion_in_flight: bool,
    /// Start of the current continuous presence dropout.
    pub absent_since_ms: Option<u64>,

    // -- Exit progress --
    /// When the animal left the stall, once it has.
    pub exited_at_ms: Option<u64>,

    // -- Station --
    /// Monotonic time of the last finalized session (boot counts as one).
    pub last_feeding_ms: u64,
    /// NoFeeding alert already raised since the last session.
    pub no_feeding_reported: bool,
    /// Accumulated hardware fault bitmask (see `HardwareFault::mask()`).
    pub fault_flags: u8,

    /// Events raised by handlers during this tick; drained by the service.
    pub events: Vec<AppEvent>,
}

impl FsmContext {
    pub fn new(config: FeederConfig, now_ms: u64, now_utc: DateTime<Utc>) -> Self {
        Self {
            now_ms,
            now_utc,
            state_entered_ms: now_ms,
            ticks_in_state: 0,
            total_ticks: 0,
            sensors: SensorSnapshot::default(),
            commands: ActuatorCommands::all_off(),
            last_dispense: None,
            config,
            ledger: None,
            admission: Admission::Vacant,
            next_portion_at_ms: now_ms,
            portion_in_flight: false,
            absent_since_ms: None,
            exited_at_ms: None,
            last_feeding_ms: now_ms,
            no_feeding_reported: false,
            fault_flags: 0,
            events: Vec::new(),
        }
    }

    /// Milliseconds since the current state was entered.
    pub fn ms_in_state(&self) -> u64 {
        self.now_ms.saturating_sub(self.state_entered_ms)
    }

    pub fn emit(&mut self, event: AppEvent) {
        self.events.push(event);
    }

    /// Confinement of the current session, for alert context.
    pub fn confinement_id(&self) -> Option<u32> {
        self.ledger.as_ref().and_then(FeedingSession::confinement_id)
    }

    /// Queue a `Pending` alert tagged with the current confinement.
    pub fn raise_alert(&mut self, alert_type: AlertType, description: &str) {
        self.raise_alert_for(alert_type, description, self.confinement_id());
    }

    pub fn raise_alert_for(
        &mut self,
        alert_type: AlertType,
        description: &str,
        confinement_id: Option<u32>,
    ) {
        warn!("alert {:?}: {}", alert_type, description);
        match AlertDto::pending(alert_type, description, confinement_id, self.now_utc) {
            Ok(alert) => self.emit(AppEvent::Alert(alert)),
            Err(e) => error!("alert {:?} dropped: {}", alert_type, e),
        }
    }

    /// Tags are taken from the entry reader with the stall empty only while
    /// the previous animal has left and the next one queues outside.
    pub fn accepts_queued_tag(&self) -> bool {
        self.exited_at_ms.is_some()
    }

    /// Returns `true` if **any** hardware fault is active.
    pub fn has_faults(&self) -> bool {
        self.fault_flags != 0
    }
}
