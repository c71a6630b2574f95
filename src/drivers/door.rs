//! Motorised door driver with limit-switch interlock.
//!
//! Each door has two motor-direction outputs and two end-of-travel limit
//! switches.  Entry and separation doors run the same protocol through two
//! instances of [`DoorDriver`].
//!
//! ## Safety contract
//!
//! - The two direction outputs are never high at the same time.  Before a
//!   direction is energised the opposite output is driven low; if that
//!   write fails the requested output is left untouched.
//! - Asking for a direction whose limit switch already asserts stops the
//!   motor instead.
//! - Both switches asserting at once is a hardware fault: the motor is
//!   de-energised and the door refuses to move until the fault clears.
//!   A switch that cannot be read is treated the same way.

use embedded_hal::digital::{InputPin, OutputPin};
use log::{error, info};

use crate::error::ActuatorError;

/// Direction of travel for a door motor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Opening,
    Closing,
}

/// Door position derived from the limit switches on every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorState {
    Open,
    Closed,
    /// Between the limits.  Carries the energised direction, `None` when the
    /// motor is off mid-travel.
    Moving(Option<Direction>),
    Fault,
}

/// Which of the two station doors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoorId {
    Entry,
    Separation,
}

impl DoorId {
    pub fn name(self) -> &'static str {
        match self {
            Self::Entry => "entry",
            Self::Separation => "separation",
        }
    }
}

pub struct DoorDriver<O, I> {
    id: DoorId,
    motor_open: O,
    motor_close: O,
    switch_open: I,
    switch_closed: I,
    energised: Option<Direction>,
    faulted: bool,
}

impl<O: OutputPin, I: InputPin> DoorDriver<O, I> {
    pub fn new(id: DoorId, motor_open: O, motor_close: O, switch_open: I, switch_closed: I) -> Self {
        Self {
            id,
            motor_open,
            motor_close,
            switch_open,
            switch_closed,
            energised: None,
            faulted: false,
        }
    }

    /// Drive towards the open limit, or stop if already there.
    pub fn open(&mut self) -> Result<(), ActuatorError> {
        match self.state() {
            DoorState::Fault => Err(ActuatorError::DoorFaulted),
            DoorState::Open => self.stop(),
            _ => self.drive(Direction::Opening),
        }
    }

    /// Drive towards the closed limit, or stop if already there.
    pub fn close(&mut self) -> Result<(), ActuatorError> {
        match self.state() {
            DoorState::Fault => Err(ActuatorError::DoorFaulted),
            DoorState::Closed => self.stop(),
            _ => self.drive(Direction::Closing),
        }
    }

    /// De-energise both directions.  Both writes are attempted even if the
    /// first one fails.
    pub fn stop(&mut self) -> Result<(), ActuatorError> {
        let open_ok = self.motor_open.set_low().is_ok();
        let close_ok = self.motor_close.set_low().is_ok();
        self.energised = None;
        if open_ok && close_ok {
            Ok(())
        } else {
            error!("door {}: stop write failed", self.id.name());
            Err(ActuatorError::GpioWriteFailed)
        }
    }

    /// Recompute the door state from the switches.  Enters `Fault` (and
    /// stops the motor) when both switches assert or a read fails.
    pub fn state(&mut self) -> DoorState {
        let open = self.switch_open.is_high();
        let closed = self.switch_closed.is_high();

        let state = match (&open, &closed) {
            (Ok(true), Ok(true)) | (Err(_), _) | (_, Err(_)) => DoorState::Fault,
            (Ok(true), Ok(false)) => DoorState::Open,
            (Ok(false), Ok(true)) => DoorState::Closed,
            (Ok(false), Ok(false)) => DoorState::Moving(self.energised),
        };

        if state == DoorState::Fault {
            if !self.faulted {
                error!(
                    "door {}: limit switch fault (open={:?}, closed={:?}), motor off",
                    self.id.name(),
                    open.ok(),
                    closed.ok()
                );
            }
            self.faulted = true;
            let _ = self.stop();
        } else if self.faulted {
            info!("door {}: limit switch fault cleared", self.id.name());
            self.faulted = false;
        }

        state
    }

    fn drive(&mut self, dir: Direction) -> Result<(), ActuatorError> {
        let (off, on) = match dir {
            Direction::Opening => (&mut self.motor_close, &mut self.motor_open),
            Direction::Closing => (&mut self.motor_open, &mut self.motor_close),
        };
        if off.set_low().is_err() {
            let _ = self.stop();
            return Err(ActuatorError::GpioWriteFailed);
        }
        if on.set_high().is_err() {
            let _ = self.stop();
            return Err(ActuatorError::GpioWriteFailed);
        }
        if self.energised != Some(dir) {
            info!("door {}: motor {:?}", self.id.name(), dir);
        }
        self.energised = Some(dir);
        Ok(())
    }
}
