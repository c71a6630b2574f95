//! Feeding-session ledger.
//!
//! One [`FeedingSession`] exists per admitted animal.  Identity, quota and
//! the entry/exit timestamps are set-once; consumption only grows through
//! [`FeedingSession::add_consumed`] and never passes the daily limit.
//! [`FeedingSession::finalize`] consumes the session and yields an
//! immutable [`ConsumptionRecord`] for the gateway.

use chrono::{DateTime, Utc};
use heapless::String;

use crate::error::LedgerError;

/// Shortest RFID accepted by the ledger.
pub const RFID_MIN_LEN: usize = 5;
/// Longest RFID accepted by the ledger.
pub const RFID_MAX_LEN: usize = 25;

/// Fixed-capacity RFID tag string.
pub type Rfid = String<RFID_MAX_LEN>;

/// Identity and quota bound on a successful tag read.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Identity {
    confinement_id: u32,
    sow_rfid: Rfid,
    ear_tag_number: u32,
    daily_feed_limit_grams: u32,
}

/// Per-animal feeding session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedingSession {
    identity: Option<Identity>,
    entry_time: Option<DateTime<Utc>>,
    exit_time: Option<DateTime<Utc>>,
    consumed_grams: u32,
}

impl FeedingSession {
    /// A fresh, empty session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind identity and quota.  All-or-nothing: either every field is
    /// set or the session is left untouched.
    pub fn bind_identity(
        &mut self,
        confinement_id: u32,
        rfid: &str,
        ear_tag_number: u32,
        daily_limit_grams: i64,
    ) -> Result<(), LedgerError> {
        if self.identity.is_some() {
            return Err(LedgerError::AlreadyBound);
        }
        let len = rfid.chars().count();
        if !(RFID_MIN_LEN..=RFID_MAX_LEN).contains(&len) {
            return Err(LedgerError::InvalidValue("rfid length outside 5..=25"));
        }
        if daily_limit_grams < 0 {
            return Err(LedgerError::InvalidValue("daily limit negative"));
        }
        let daily_feed_limit_grams = u32::try_from(daily_limit_grams)
            .map_err(|_| LedgerError::InvalidValue("daily limit too large"))?;
        let sow_rfid =
            Rfid::try_from(rfid).map_err(|_| LedgerError::InvalidValue("rfid too long"))?;

        self.identity = Some(Identity {
            confinement_id,
            sow_rfid,
            ear_tag_number,
            daily_feed_limit_grams,
        });
        Ok(())
    }

    pub fn record_entry(&mut self, time: DateTime<Utc>) -> Result<(), LedgerError> {
        if self.entry_time.is_some() {
            return Err(LedgerError::AlreadyBound);
        }
        self.entry_time = Some(time);
        Ok(())
    }

    /// Record the exit time.  Must be strictly after the recorded entry.
    pub fn record_exit(&mut self, time: DateTime<Utc>) -> Result<(), LedgerError> {
        if self.exit_time.is_some() {
            return Err(LedgerError::AlreadyBound);
        }
        match self.entry_time {
            Some(entry) if time > entry => {
                self.exit_time = Some(time);
                Ok(())
            }
            _ => Err(LedgerError::OutOfOrder),
        }
    }

    /// Credit dispensed feed.  Rejected calls leave the total unchanged.
    pub fn add_consumed(&mut self, amount_grams: u32) -> Result<(), LedgerError> {
        let limit = self
            .daily_feed_limit_grams()
            .ok_or(LedgerError::InvalidValue("identity not bound"))?;
        let total = self
            .consumed_grams
            .checked_add(amount_grams)
            .ok_or(LedgerError::QuotaExceeded)?;
        if total > limit {
            return Err(LedgerError::QuotaExceeded);
        }
        self.consumed_grams = total;
        Ok(())
    }

    /// Grams that can still be credited today.
    pub fn remaining_grams(&self) -> u32 {
        self.daily_feed_limit_grams()
            .map_or(0, |limit| limit - self.consumed_grams)
    }

    /// True once consumption has reached the daily limit.
    pub fn quota_reached(&self) -> bool {
        self.identity.is_some() && self.remaining_grams() == 0
    }

    /// Close the session.  Requires identity, entry and exit.
    pub fn finalize(self) -> Result<ConsumptionRecord, LedgerError> {
        let (Some(identity), Some(entry_time), Some(exit_time)) =
            (self.identity, self.entry_time, self.exit_time)
        else {
            return Err(LedgerError::Incomplete);
        };
        if exit_time <= entry_time {
            return Err(LedgerError::OutOfOrder);
        }
        Ok(ConsumptionRecord {
            confinement_id: identity.confinement_id,
            sow_rfid: identity.sow_rfid,
            ear_tag_number: identity.ear_tag_number,
            daily_feed_limit_grams: identity.daily_feed_limit_grams,
            entry_time,
            exit_time,
            consumed_grams: self.consumed_grams,
        })
    }

    // ── Accessors ─────────────────────────────────────────────

    pub fn confinement_id(&self) -> Option<u32> {
        self.identity.as_ref().map(|i| i.confinement_id)
    }

    pub fn sow_rfid(&self) -> Option<&str> {
        self.identity.as_ref().map(|i| i.sow_rfid.as_str())
    }

    pub fn ear_tag_number(&self) -> Option<u32> {
        self.identity.as_ref().map(|i| i.ear_tag_number)
    }

    pub fn daily_feed_limit_grams(&self) -> Option<u32> {
        self.identity.as_ref().map(|i| i.daily_feed_limit_grams)
    }

    pub fn entry_time(&self) -> Option<DateTime<Utc>> {
        self.entry_time
    }

    pub fn exit_time(&self) -> Option<DateTime<Utc>> {
        self.exit_time
    }

    pub fn consumed_grams(&self) -> u32 {
        self.consumed_grams
    }
}

/// Immutable snapshot of a completed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumptionRecord {
    confinement_id: u32,
    sow_rfid: Rfid,
    ear_tag_number: u32,
    daily_feed_limit_grams: u32,
    entry_time: DateTime<Utc>,
    exit_time: DateTime<Utc>,
    consumed_grams: u32,
}

impl ConsumptionRecord {
    pub fn confinement_id(&self) -> u32 {
        self.confinement_id
    }

    pub fn sow_rfid(&self) -> &str {
        &self.sow_rfid
    }

    pub fn ear_tag_number(&self) -> u32 {
        self.ear_tag_number
    }

    pub fn daily_feed_limit_grams(&self) -> u32 {
        self.daily_feed_limit_grams
    }

    pub fn entry_time(&self) -> DateTime<Utc> {
        self.entry_time
    }

    pub fn exit_time(&self) -> DateTime<Utc> {
        self.exit_time
    }

    pub fn consumed_grams(&self) -> u32 {
        self.consumed_grams
    }
}
