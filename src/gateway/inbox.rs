//! Inbound gateway queues.
//!
//! The transport callback parses each message and deposits it here; the
//! control loop drains the queues without blocking once per tick.
//!
//! ```text
//! ┌──────────────┐  route()   ┌──────────────┐  try_next_*()  ┌──────────────┐
//! │ MQTT callback│──────────▶│ GatewayInbox │──────────────▶│ Control loop │
//! └──────────────┘            └──────────────┘                └──────────────┘
//! ```

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use log::{debug, warn};

use super::dto::{AlertParametersDto, DailyPlanDto, FeederSettingsDto};
use super::topics::Topic;
use crate::error::CommsError;

const SETTINGS_DEPTH: usize = 4;
const PLAN_DEPTH: usize = 8;
const ALERT_PARAMS_DEPTH: usize = 4;

pub struct GatewayInbox {
    settings: Channel<CriticalSectionRawMutex, FeederSettingsDto, SETTINGS_DEPTH>,
    plans: Channel<CriticalSectionRawMutex, DailyPlanDto, PLAN_DEPTH>,
    alert_params: Channel<CriticalSectionRawMutex, AlertParametersDto, ALERT_PARAMS_DEPTH>,
}

impl Default for GatewayInbox {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewayInbox {
    /// `const` so the inbox can live in a `static` shared with the
    /// transport callback.
    pub const fn new() -> Self {
        Self {
            settings: Channel::new(),
            plans: Channel::new(),
            alert_params: Channel::new(),
        }
    }

    /// Parse an inbound message and enqueue it.  Unknown or outbound
    /// topics, malformed JSON, invalid plans and full queues are rejected
    /// with a warning; nothing partial is enqueued.
    pub fn route(&self, topic: &str, payload: &[u8]) -> Result<(), CommsError> {
        let result = match Topic::parse(topic) {
            Some(Topic::FeederSettings) => parse(payload).and_then(|dto| {
                self.settings.try_send(dto).map_err(|_| CommsError::QueueFull)
            }),
            Some(Topic::DailyPlan) => parse::<DailyPlanDto>(payload).and_then(|dto| {
                dto.validate()?;
                self.plans.try_send(dto).map_err(|_| CommsError::QueueFull)
            }),
            Some(Topic::AlertParameters) => parse(payload).and_then(|dto| {
                self.alert_params.try_send(dto).map_err(|_| CommsError::QueueFull)
            }),
            _ => Err(CommsError::UnknownTopic),
        };
        match &result {
            Ok(()) => debug!("inbox: queued message from {}", topic),
            Err(e) => warn!("inbox: rejected message on {}: {}", topic, e),
        }
        result
    }

    pub fn try_next_settings(&self) -> Option<FeederSettingsDto> {
        self.settings.try_receive().ok()
    }

    pub fn try_next_plan(&self) -> Option<DailyPlanDto> {
        self.plans.try_receive().ok()
    }

    pub fn try_next_alert_parameters(&self) -> Option<AlertParametersDto> {
        self.alert_params.try_receive().ok()
    }

    /// Drop plans queued before the current identification request.
    /// Returns how many were discarded.
    pub fn clear_plans(&self) -> usize {
        let mut n = 0;
        while self.plans.try_receive().is_ok() {
            n += 1;
        }
        if n > 0 {
            debug!("inbox: discarded {} stale plan(s)", n);
        }
        n
    }
}

fn parse<T: serde::de::DeserializeOwned>(payload: &[u8]) -> Result<T, CommsError> {
    serde_json::from_slice(payload).map_err(|_| CommsError::Decode)
}
