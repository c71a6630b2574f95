//! Feeder auger motor driver.
//!
//! Single digital output energising the dispensing motor.  One portion is a
//! timed on-pulse; the caller polls [`FeederMotor::dispense_feed`] every tick
//! until it reports [`DispenseStatus::Completed`].
//!
//! ## Safety contract
//!
//! The motor never stays on past the requested duration as long as the
//! control loop keeps polling.  If the off-write fails the cycle stays
//! active so the next poll retries it.

use embedded_hal::digital::OutputPin;
use log::{debug, error};

use crate::error::ActuatorError;

/// Progress of a single dispense cycle as reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispenseStatus {
    /// Motor switched on by this call.
    Started,
    /// Motor on, pulse not finished.
    Running,
    /// Pulse finished and motor switched off by this call.
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DispenseCycle {
    Idle,
    Dispensing { start_ms: u64, duration_ms: u64 },
}

pub struct FeederMotor<O> {
    pin: O,
    cycle: DispenseCycle,
}

impl<O: OutputPin> FeederMotor<O> {
    pub fn new(pin: O) -> Self {
        Self {
            pin,
            cycle: DispenseCycle::Idle,
        }
    }

    /// Start or continue a timed dispense pulse.
    pub fn dispense_feed(
        &mut self,
        duration_ms: u64,
        now_ms: u64,
    ) -> Result<DispenseStatus, ActuatorError> {
        match self.cycle {
            DispenseCycle::Idle => {
                if self.pin.set_high().is_err() {
                    let _ = self.pin.set_low();
                    error!("feeder: motor on-write failed");
                    return Err(ActuatorError::GpioWriteFailed);
                }
                debug!("feeder: motor on for {} ms", duration_ms);
                self.cycle = DispenseCycle::Dispensing {
                    start_ms: now_ms,
                    duration_ms,
                };
                Ok(DispenseStatus::Started)
            }
            DispenseCycle::Dispensing {
                start_ms,
                duration_ms,
            } => {
                if now_ms.saturating_sub(start_ms) < duration_ms {
                    return Ok(DispenseStatus::Running);
                }
                if self.pin.set_low().is_err() {
                    error!("feeder: motor off-write failed, will retry");
                    return Err(ActuatorError::GpioWriteFailed);
                }
                debug!("feeder: portion complete");
                self.cycle = DispenseCycle::Idle;
                Ok(DispenseStatus::Completed)
            }
        }
    }

    /// Abort any cycle in progress.  The aborted portion is not reported
    /// as completed.
    pub fn stop(&mut self) -> Result<(), ActuatorError> {
        if self.pin.set_low().is_err() {
            error!("feeder: stop write failed");
            return Err(ActuatorError::GpioWriteFailed);
        }
        if self.is_running() {
            debug!("feeder: cycle aborted");
        }
        self.cycle = DispenseCycle::Idle;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        matches!(self.cycle, DispenseCycle::Dispensing { .. })
    }
}
