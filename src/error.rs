//! Unified error types for the feeding station.
//!
//! A single `Error` enum that every subsystem converts into, keeping the
//! control loop's error handling uniform.  All variants are `Copy` so they
//! can be passed through the safety supervisor and FSM without allocation.

use crate::fsm::StateId;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation in the controller funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    /// A session ledger mutation was rejected.
    #[error("ledger: {0}")]
    Ledger(#[from] LedgerError),
    /// An actuator output could not be driven.
    #[error("actuator: {0}")]
    Actuator(#[from] ActuatorError),
    /// A hardware interlock fault is active.
    #[error("hardware fault: {0}")]
    Hardware(#[from] HardwareFault),
    /// The gateway transport failed.
    #[error("comms: {0}")]
    Comms(#[from] CommsError),
    /// A configuration update was rejected.
    #[error("config: {0}")]
    Config(#[from] ConfigError),
    /// The FSM was asked to traverse an edge outside the transition graph.
    #[error("illegal transition {from:?} -> {to:?}")]
    IllegalTransition { from: StateId, to: StateId },
    /// Automation was halted by an earlier fatal error.
    #[error("automation halted")]
    Halted,
}

// ---------------------------------------------------------------------------
// Ledger validation errors
// ---------------------------------------------------------------------------

/// Recoverable rejections from the feeding-session ledger.  The ledger is
/// left exactly as it was before the rejected call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// A set-once field already holds a value.
    #[error("field already bound")]
    AlreadyBound,
    /// A value is outside its permitted range.
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),
    /// Exit time is not strictly after entry time.
    #[error("exit time not after entry time")]
    OutOfOrder,
    /// Accepting the amount would exceed the daily limit.
    #[error("daily quota exceeded")]
    QuotaExceeded,
    /// Finalize called before entry and exit were both recorded.
    #[error("session incomplete")]
    Incomplete,
}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ActuatorError {
    /// GPIO set failed.
    #[error("GPIO write failed")]
    GpioWriteFailed,
    /// The door is in a fault state and refuses to move.
    #[error("door faulted")]
    DoorFaulted,
}

// ---------------------------------------------------------------------------
// Hardware faults
// ---------------------------------------------------------------------------

/// Hardware faults are accumulated in a bitfield by the safety supervisor
/// so that multiple simultaneous faults can be tracked and individually
/// cleared.  While any is active the FSM is frozen and all motors are off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[repr(u8)]
pub enum HardwareFault {
    /// Both entry-door limit switches assert at once.
    #[error("entry door limit switches contradictory")]
    EntryDoorSwitches = 0b0000_0001,
    /// Both separation-door limit switches assert at once.
    #[error("separation door limit switches contradictory")]
    SeparationDoorSwitches = 0b0000_0010,
    /// Presence sensor asserted far longer than any feeding session.
    #[error("presence sensor stuck")]
    PresenceStuck = 0b0000_0100,
}

impl HardwareFault {
    pub const ALL: [HardwareFault; 3] = [
        Self::EntryDoorSwitches,
        Self::SeparationDoorSwitches,
        Self::PresenceStuck,
    ];

    /// Return the bitmask for this fault.
    pub const fn mask(self) -> u8 {
        self as u8
    }
}

// ---------------------------------------------------------------------------
// Communications errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CommsError {
    #[error("broker not connected")]
    NotConnected,
    #[error("publish failed")]
    PublishFailed,
    #[error("payload encoding failed")]
    Encode,
    #[error("payload decoding failed")]
    Decode,
    #[error("payload failed validation: {0}")]
    InvalidPayload(&'static str),
    #[error("unknown topic")]
    UnknownTopic,
    #[error("inbound queue full")]
    QueueFull,
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    #[error("validation failed: {0}")]
    ValidationFailed(&'static str),
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
