//! Gateway payloads.
//!
//! Inbound payloads accept the camelCase field names and the snake_case
//! names the farm API also emits.  Outbound payloads are always camelCase
//! and are validated on construction, so an invalid record never reaches
//! the outbox.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CommsError;
use crate::ledger::{ConsumptionRecord, Rfid};

/// Longest alert description carried on the wire.
pub const ALERT_DESCRIPTION_MAX: usize = 128;

// ───────────────────────────────────────────────────────────────
// Inbound
// ───────────────────────────────────────────────────────────────

/// Machine settings update.  Range checks happen when the settings are
/// applied to [`FeederConfig`](crate::config::FeederConfig).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeederSettingsDto {
    #[serde(alias = "motor_feed_on_time_seconds")]
    pub motor_feed_on_time_seconds: i64,
    #[serde(alias = "portion_amount_grams")]
    pub portion_amount_grams: i64,
    #[serde(alias = "portion_interval_seconds")]
    pub portion_interval_seconds: i64,
    #[serde(alias = "entry_door_delay_seconds")]
    pub entry_door_delay_seconds: i64,
}

/// Today's quota for the animal whose tag was last published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyPlanDto {
    #[serde(alias = "confinement_id")]
    pub confinement_id: u32,
    #[serde(alias = "feed_amount_grams")]
    pub feed_amount_grams: i64,
    #[serde(default, alias = "ear_tag_number")]
    pub ear_tag_number: Option<u32>,
}

impl DailyPlanDto {
    pub fn validate(&self) -> Result<(), CommsError> {
        if self.confinement_id == 0 {
            return Err(CommsError::InvalidPayload("confinementId must be > 0"));
        }
        if self.feed_amount_grams < 0 {
            return Err(CommsError::InvalidPayload("feedAmountGrams must be >= 0"));
        }
        Ok(())
    }
}

/// Alert thresholds update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertParametersDto {
    #[serde(alias = "max_feeding_time_minutes")]
    pub max_feeding_time_minutes: i64,
    #[serde(alias = "max_interval_without_feeding_hours")]
    pub max_interval_without_feeding_hours: i64,
    #[serde(alias = "rfidReadTolerance", alias = "rfid_read_tolerance_seconds")]
    pub rfid_read_tolerance_seconds: i64,
    #[serde(alias = "min_amount_without_alert_grams")]
    pub min_amount_without_alert_grams: i64,
}

// ───────────────────────────────────────────────────────────────
// Outbound
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RfidDto {
    pub rfid: Rfid,
}

impl RfidDto {
    /// Tags of five characters or fewer are not accepted by the farm API.
    pub fn new(rfid: &str) -> Result<Self, CommsError> {
        if rfid.chars().count() <= 5 {
            return Err(CommsError::InvalidPayload("rfid must be longer than 5 chars"));
        }
        let rfid = Rfid::try_from(rfid)
            .map_err(|_| CommsError::InvalidPayload("rfid too long"))?;
        Ok(Self { rfid })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsumptionLogDto {
    pub entry_date_time: DateTime<Utc>,
    pub exit_date_time: DateTime<Utc>,
    pub amount_consumed: u32,
    pub confinement_id: u32,
}

impl ConsumptionLogDto {
    /// Build the log entry for a finalized session.  `now` bounds the
    /// entry time from above.
    pub fn from_record(record: &ConsumptionRecord, now: DateTime<Utc>) -> Result<Self, CommsError> {
        let dto = Self {
            entry_date_time: record.entry_time(),
            exit_date_time: record.exit_time(),
            amount_consumed: record.consumed_grams(),
            confinement_id: record.confinement_id(),
        };
        dto.validate(now)?;
        Ok(dto)
    }

    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), CommsError> {
        if self.amount_consumed == 0 {
            return Err(CommsError::InvalidPayload("amountConsumed must be > 0"));
        }
        if self.confinement_id == 0 {
            return Err(CommsError::InvalidPayload("confinementId must be > 0"));
        }
        if self.exit_date_time <= self.entry_date_time {
            return Err(CommsError::InvalidPayload("exitDateTime must follow entryDateTime"));
        }
        if self.entry_date_time > now {
            return Err(CommsError::InvalidPayload("entryDateTime in the future"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertType {
    NoFeeding,
    FeederTimeExceeded,
    ReadFailure,
    LowConsumption,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlertStatus {
    Pending,
    Resolved,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertDto {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confinement_id: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feeding_record_id: Option<u32>,
    #[serde(rename = "type")]
    pub alert_type: AlertType,
    pub description: heapless::String<ALERT_DESCRIPTION_MAX>,
    pub status: AlertStatus,
    pub created_at: DateTime<Utc>,
}

impl AlertDto {
    /// New `Pending` alert.  The description must not be blank; anything
    /// past [`ALERT_DESCRIPTION_MAX`] bytes is cut at a char boundary.
    pub fn pending(
        alert_type: AlertType,
        description: &str,
        confinement_id: Option<u32>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, CommsError> {
        let description = description.trim();
        if description.is_empty() {
            return Err(CommsError::InvalidPayload("alert description empty"));
        }
        let mut text = heapless::String::new();
        for c in description.chars() {
            if text.push(c).is_err() {
                break;
            }
        }
        Ok(Self {
            confinement_id,
            feeding_record_id: None,
            alert_type,
            description: text,
            status: AlertStatus::Pending,
            created_at,
        })
    }
}
