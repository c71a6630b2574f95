//! Feeding station configuration.
//!
//! [`FeederConfig`] is the snapshot the FSM reads each tick.  The gateway
//! delivers it in two partial payloads (feeder settings and alert
//! parameters); each is applied atomically between ticks and rejected whole
//! if the resulting configuration fails validation.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::gateway::dto::{AlertParametersDto, FeederSettingsDto};

/// Core station configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeederConfig {
    // --- Dispensing ---
    /// Feeder motor on-time for one portion (seconds).
    pub motor_feed_on_time_secs: u32,
    /// Feed released by one portion (grams).
    pub portion_amount_grams: u32,
    /// Interval between portion starts (seconds).
    pub portion_interval_secs: u32,
    /// Wait after an animal leaves before admitting the next (seconds).
    pub entry_door_delay_secs: u32,

    // --- Alert thresholds ---
    /// Longest a single feeding session may last (minutes).
    pub max_feeding_time_minutes: u32,
    /// Longest the station may go without a completed session (hours).
    pub max_interval_without_feeding_hours: u32,
    /// Grace period for tag reads and presence dropouts (seconds).
    pub rfid_read_tolerance_secs: u32,
    /// Sessions consuming less than this raise a LowConsumption alert (grams).
    pub min_amount_without_alert_grams: u32,

    // --- Timing ---
    /// Control loop interval (milliseconds).
    pub control_loop_interval_ms: u32,
}

impl Default for FeederConfig {
    fn default() -> Self {
        Self {
            motor_feed_on_time_secs: 3,
            portion_amount_grams: 250,
            portion_interval_secs: 20,
            entry_door_delay_secs: 10,

            max_feeding_time_minutes: 30,
            max_interval_without_feeding_hours: 24,
            rfid_read_tolerance_secs: 5,
            min_amount_without_alert_grams: 500,

            control_loop_interval_ms: 200, // 5 Hz
        }
    }
}

impl FeederConfig {
    /// Range-check every field.  Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.motor_feed_on_time_secs == 0 {
            return Err(ConfigError::ValidationFailed("motor_feed_on_time_secs must be > 0"));
        }
        if self.portion_amount_grams == 0 {
            return Err(ConfigError::ValidationFailed("portion_amount_grams must be > 0"));
        }
        if self.portion_interval_secs < self.motor_feed_on_time_secs {
            return Err(ConfigError::ValidationFailed(
                "portion_interval_secs must cover the motor on-time",
            ));
        }
        if self.max_feeding_time_minutes == 0 {
            return Err(ConfigError::ValidationFailed("max_feeding_time_minutes must be > 0"));
        }
        if self.max_interval_without_feeding_hours == 0 {
            return Err(ConfigError::ValidationFailed(
                "max_interval_without_feeding_hours must be > 0",
            ));
        }
        if self.rfid_read_tolerance_secs == 0 {
            return Err(ConfigError::ValidationFailed("rfid_read_tolerance_secs must be > 0"));
        }
        if !(10..=1000).contains(&self.control_loop_interval_ms) {
            return Err(ConfigError::ValidationFailed(
                "control_loop_interval_ms must be within 10..=1000",
            ));
        }
        Ok(())
    }

    /// Apply a feeder-settings payload.  On rejection `self` is untouched.
    pub fn apply_settings(&mut self, dto: &FeederSettingsDto) -> Result<(), ConfigError> {
        let candidate = Self {
            motor_feed_on_time_secs: non_negative(dto.motor_feed_on_time_seconds, "motorFeedOnTimeSeconds")?,
            portion_amount_grams: non_negative(dto.portion_amount_grams, "portionAmountGrams")?,
            portion_interval_secs: non_negative(dto.portion_interval_seconds, "portionIntervalSeconds")?,
            entry_door_delay_secs: non_negative(dto.entry_door_delay_seconds, "entryDoorDelaySeconds")?,
            ..*self
        };
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    /// Apply an alert-parameters payload.  On rejection `self` is untouched.
    pub fn apply_alert_parameters(&mut self, dto: &AlertParametersDto) -> Result<(), ConfigError> {
        let candidate = Self {
            max_feeding_time_minutes: non_negative(dto.max_feeding_time_minutes, "maxFeedingTimeMinutes")?,
            max_interval_without_feeding_hours: non_negative(
                dto.max_interval_without_feeding_hours,
                "maxIntervalWithoutFeedingHours",
            )?,
            rfid_read_tolerance_secs: non_negative(dto.rfid_read_tolerance_seconds, "rfidReadToleranceSeconds")?,
            min_amount_without_alert_grams: non_negative(
                dto.min_amount_without_alert_grams,
                "minAmountWithoutAlertGrams",
            )?,
            ..*self
        };
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    // ── Derived durations (milliseconds) ──────────────────────

    pub fn motor_on_ms(&self) -> u64 {
        u64::from(self.motor_feed_on_time_secs) * 1000
    }

    pub fn portion_interval_ms(&self) -> u64 {
        u64::from(self.portion_interval_secs) * 1000
    }

    pub fn entry_door_delay_ms(&self) -> u64 {
        u64::from(self.entry_door_delay_secs) * 1000
    }

    pub fn max_feeding_ms(&self) -> u64 {
        u64::from(self.max_feeding_time_minutes) * 60_000
    }

    pub fn max_interval_without_feeding_ms(&self) -> u64 {
        u64::from(self.max_interval_without_feeding_hours) * 3_600_000
    }

    pub fn rfid_tolerance_ms(&self) -> u64 {
        u64::from(self.rfid_read_tolerance_secs) * 1000
    }
}

fn non_negative(value: i64, field: &'static str) -> Result<u32, ConfigError> {
    u32::try_from(value).map_err(|_| ConfigError::ValidationFailed(field))
}
