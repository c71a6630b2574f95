//! Safety supervisor.
//!
//! The supervisor runs **every tick before the FSM** and accumulates a
//! hardware fault bitmask.  While any bit is set the service stops every
//! motor and freezes the FSM in its current state.
//!
//! ## Fault lifecycle
//!
//! 1. A condition triggers a fault (e.g. both limit switches of a door
//!    assert at once).
//! 2. The supervisor sets the corresponding bit and logs it once.
//! 3. The service de-energises all outputs and skips the FSM tick.
//! 4. Each tick the supervisor re-evaluates.  If the condition clears, it
//!    unsets the bit.
//! 5. When the mask is zero the FSM resumes where it was.
//!
//! This supports **multiple simultaneous faults**: automation does not
//! resume until *every* fault is resolved.

use crate::config::FeederConfig;
use crate::drivers::door::DoorState;
use crate::error::HardwareFault;
use crate::fsm::context::SensorSnapshot;
use log::{error, info};

/// Presence held this many times the maximum feeding time is treated as a
/// stuck sensor.
const PRESENCE_STUCK_FACTOR: u64 = 2;

/// Safety supervisor.
#[derive(Debug, Default)]
pub struct SafetySupervisor {
    /// Latched fault bitmask.
    faults: u8,
    /// Start of the current continuous presence episode.
    presence_since_ms: Option<u64>,
}

impl SafetySupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Evaluate all safety conditions against the latest sensor snapshot.
    /// Returns the updated fault bitmask.
    pub fn evaluate(&mut self, snap: &SensorSnapshot, config: &FeederConfig, now_ms: u64) -> u8 {
        // ── Door limit switches ───────────────────────────────────
        self.eval_fault(
            HardwareFault::EntryDoorSwitches,
            snap.entry_door == DoorState::Fault,
        );
        self.eval_fault(
            HardwareFault::SeparationDoorSwitches,
            snap.separation_door == DoorState::Fault,
        );

        // ── Presence sensor stuck ─────────────────────────────────
        let stuck = if snap.presence {
            let since = *self.presence_since_ms.get_or_insert(now_ms);
            now_ms.saturating_sub(since) > config.max_feeding_ms() * PRESENCE_STUCK_FACTOR
        } else {
            self.presence_since_ms = None;
            false
        };
        self.eval_fault(HardwareFault::PresenceStuck, stuck);

        self.faults
    }

    /// True if **any** fault is active.
    pub fn has_faults(&self) -> bool {
        self.faults != 0
    }

    /// Check if a specific fault is active.
    pub fn has_fault(&self, fault: HardwareFault) -> bool {
        self.faults & fault.mask() != 0
    }

    // ── Internal ──────────────────────────────────────────────────

    /// Set or clear a fault bit based on a boolean condition.
    fn eval_fault(&mut self, fault: HardwareFault, condition: bool) {
        if condition {
            if self.faults & fault.mask() == 0 {
                error!("HARDWARE FAULT SET: {fault}");
            }
            self.faults |= fault.mask();
        } else {
            if self.faults & fault.mask() != 0 {
                info!("HARDWARE FAULT CLEARED: {fault}");
            }
            self.faults &= !fault.mask();
        }
    }
}
