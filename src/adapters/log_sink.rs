//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the ESP-IDF logger (which goes to UART / USB-CDC in production).  The
//! gateway outbox implements the same trait; `main` fans out to both.

use log::{error, info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`AppEvent`] to the serial console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | state={:?} | presence={} | entry={:?} sep={:?} | \
                     fed={}/{}g | faults=0b{:08b}{}",
                    t.state,
                    t.presence,
                    t.entry_door,
                    t.separation_door,
                    t.consumed_grams,
                    t.daily_limit_grams.map_or(-1, i64::from),
                    t.fault_flags,
                    if t.halted { " | HALTED" } else { "" },
                );
            }
            AppEvent::StateChanged { from, to } => {
                info!("STATE | {:?} -> {:?}", from, to);
            }
            AppEvent::RfidIdentified(rfid) => {
                info!("RFID  | {}", rfid);
            }
            AppEvent::ConsumptionLogged { record, .. } => {
                info!(
                    "FEED  | confinement={} rfid={} consumed={}/{}g",
                    record.confinement_id(),
                    record.sow_rfid(),
                    record.consumed_grams(),
                    record.daily_feed_limit_grams(),
                );
            }
            AppEvent::Alert(alert) => {
                warn!("ALERT | {:?} | {}", alert.alert_type, alert.description);
            }
            AppEvent::FaultDetected(flags) => {
                info!("FAULT | detected, flags=0b{:08b}", flags);
            }
            AppEvent::FaultCleared => {
                info!("FAULT | all cleared");
            }
            AppEvent::Halted(e) => {
                error!("HALT  | {}", e);
            }
            AppEvent::Started(state) => {
                info!("START | initial_state={:?}", state);
            }
        }
    }
}
