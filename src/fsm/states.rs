//! Concrete state handler functions and table builder.
//!
//! Each state is defined by three plain `fn` pointers: no closures, no
//! dynamic dispatch.
//!
//! ```text
//!  WAITING ──[tag read + plan bound]──▶ FEEDING
//!     ▲                                    │
//!     │              [quota reached | presence lost | time exceeded]
//!     │                                    ▼
//!     └──────[delay elapsed]────────── EXITING
//!                                          │
//!           FEEDING ◀──[next animal ready]─┘
//! ```

use super::context::{Admission, DoorCommand, FeederCommand, FsmContext};
use super::{StateDescriptor, StateId};
use crate::app::events::AppEvent;
use crate::drivers::feeder_motor::DispenseStatus;
use crate::error::LedgerError;
use crate::gateway::dto::AlertType;
use crate::ledger::{FeedingSession, RFID_MIN_LEN};
use log::{debug, error, info, warn};

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0: Waiting
        StateDescriptor {
            id: StateId::Waiting,
            name: "Waiting",
            on_enter: Some(waiting_enter),
            on_exit: None,
            on_update: waiting_update,
        },
        // Index 1: Feeding
        StateDescriptor {
            id: StateId::Feeding,
            name: "Feeding",
            on_enter: Some(feeding_enter),
            on_exit: Some(feeding_exit),
            on_update: feeding_update,
        },
        // Index 2: Exiting
        StateDescriptor {
            id: StateId::Exiting,
            name: "Exiting",
            on_enter: Some(exiting_enter),
            on_exit: None,
            on_update: exiting_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  WAITING state
// ═══════════════════════════════════════════════════════════════════════════

fn waiting_enter(ctx: &mut FsmContext) {
    ctx.commands.entry_door = DoorCommand::Open;
    ctx.commands.separation_door = DoorCommand::Close;
    ctx.commands.feeder = FeederCommand::Off;
    ctx.exited_at_ms = None;
    info!("Waiting: entry door open, stall ready");
}

fn waiting_update(ctx: &mut FsmContext) -> Option<StateId> {
    check_no_feeding(ctx);
    let present = ctx.sensors.presence;
    if advance_admission(ctx, present) {
        return Some(StateId::Feeding);
    }
    None
}

/// Raise one NoFeeding alert once the station has gone too long without a
/// finished session.  Re-armed by the next finished session.
fn check_no_feeding(ctx: &mut FsmContext) {
    if ctx.no_feeding_reported {
        return;
    }
    let idle_ms = ctx.now_ms.saturating_sub(ctx.last_feeding_ms);
    if idle_ms > ctx.config.max_interval_without_feeding_ms() {
        ctx.no_feeding_reported = true;
        let desc = format!(
            "no animal fed for more than {} h",
            ctx.config.max_interval_without_feeding_hours
        );
        ctx.raise_alert(AlertType::NoFeeding, &desc);
    }
}

/// Drive identification of the animal at the reader: tag read, plan
/// request, plan bind.  `at_reader` is whether an animal is there to be
/// identified.  Returns `true` once a session is bound and stored in
/// `ctx.ledger`.
fn advance_admission(ctx: &mut FsmContext, at_reader: bool) -> bool {
    if !at_reader {
        if ctx.admission != Admission::Vacant {
            debug!("admission: animal gone");
        }
        ctx.admission = Admission::Vacant;
        return false;
    }

    let now = ctx.now_ms;
    let tolerance = ctx.config.rfid_tolerance_ms();

    if ctx.admission == Admission::Vacant {
        debug!("admission: animal present, reading tag");
        ctx.admission = Admission::Identifying {
            since_ms: now,
            reported: false,
        };
    }

    match ctx.admission.clone() {
        Admission::Vacant => false,
        Admission::Identifying { since_ms, reported } => {
            match ctx.sensors.tag.take() {
                Some(tag) if tag.chars().count() > RFID_MIN_LEN => {
                    info!("admission: tag {} read, requesting plan", tag);
                    ctx.emit(AppEvent::RfidIdentified(tag.clone()));
                    ctx.admission = Admission::AwaitingPlan {
                        rfid: tag,
                        since_ms: now,
                        reported: false,
                    };
                }
                Some(tag) => warn!("admission: tag {} too short, ignored", tag),
                None => {
                    if !reported && now.saturating_sub(since_ms) > tolerance {
                        ctx.admission = Admission::Identifying {
                            since_ms,
                            reported: true,
                        };
                        let desc = format!(
                            "animal present but RFID not read within {} s",
                            ctx.config.rfid_read_tolerance_secs
                        );
                        ctx.raise_alert(AlertType::ReadFailure, &desc);
                    }
                }
            }
            false
        }
        Admission::AwaitingPlan {
            rfid,
            since_ms,
            reported,
        } => {
            if let Some(plan) = ctx.sensors.plan.take() {
                let mut session = FeedingSession::new();
                match session.bind_identity(
                    plan.confinement_id,
                    &rfid,
                    plan.ear_tag_number.unwrap_or(0),
                    plan.feed_amount_grams,
                ) {
                    Ok(()) => {
                        info!(
                            "admission: {} bound to confinement {}, quota {} g",
                            rfid, plan.confinement_id, plan.feed_amount_grams
                        );
                        ctx.ledger = Some(session);
                        ctx.admission = Admission::Vacant;
                        return true;
                    }
                    Err(e) => {
                        warn!("admission: plan for {} rejected: {}", rfid, e);
                        ctx.admission = Admission::Identifying {
                            since_ms: now,
                            reported: true,
                        };
                    }
                }
            } else if !reported && now.saturating_sub(since_ms) > tolerance {
                ctx.admission = Admission::AwaitingPlan {
                    rfid: rfid.clone(),
                    since_ms,
                    reported: true,
                };
                let desc = format!(
                    "no feeding plan received for {} within {} s",
                    rfid, ctx.config.rfid_read_tolerance_secs
                );
                ctx.raise_alert(AlertType::ReadFailure, &desc);
            }
            false
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  FEEDING state
// ═══════════════════════════════════════════════════════════════════════════

fn feeding_enter(ctx: &mut FsmContext) {
    ctx.commands.entry_door = DoorCommand::Close;
    ctx.commands.separation_door = DoorCommand::Close;
    ctx.commands.feeder = FeederCommand::Off;
    ctx.next_portion_at_ms = ctx.now_ms;
    ctx.portion_in_flight = false;
    ctx.absent_since_ms = None;
    ctx.last_dispense = None;
    ctx.exited_at_ms = None;
    ctx.admission = Admission::Vacant;

    let now = ctx.now_utc;
    match ctx.ledger.as_mut() {
        Some(session) => {
            if let Err(e) = session.record_entry(now) {
                warn!("Feeding: entry time not recorded: {}", e);
            }
            info!(
                "Feeding: {} admitted, quota {} g",
                session.sow_rfid().unwrap_or("?"),
                session.daily_feed_limit_grams().unwrap_or(0)
            );
        }
        None => error!("Feeding: entered without a bound session"),
    }
}

fn feeding_update(ctx: &mut FsmContext) -> Option<StateId> {
    let now = ctx.now_ms;

    // Credit the portion whose pulse finished on the previous tick.
    if ctx.portion_in_flight && ctx.last_dispense == Some(DispenseStatus::Completed) {
        ctx.portion_in_flight = false;
        ctx.commands.feeder = FeederCommand::Off;
        credit_portion(ctx);
    }
    ctx.last_dispense = None;

    // Presence dropout.
    if ctx.sensors.presence {
        if ctx.absent_since_ms.take().is_some() {
            debug!("Feeding: presence restored");
        }
    } else {
        let since = *ctx.absent_since_ms.get_or_insert(now);
        if now.saturating_sub(since) > ctx.config.rfid_tolerance_ms() {
            info!("Feeding: presence lost, releasing");
            return Some(StateId::Exiting);
        }
    }

    // Session time limit.
    if ctx.ms_in_state() > ctx.config.max_feeding_ms() {
        let desc = format!(
            "feeding exceeded {} min",
            ctx.config.max_feeding_time_minutes
        );
        ctx.raise_alert(AlertType::FeederTimeExceeded, &desc);
        return Some(StateId::Exiting);
    }

    // Quota.
    let portion = ctx.config.portion_amount_grams;
    let quota_done = ctx
        .ledger
        .as_ref()
        .is_none_or(|s| s.quota_reached() || s.remaining_grams() < portion);
    if quota_done && !ctx.portion_in_flight {
        info!("Feeding: quota reached");
        return Some(StateId::Exiting);
    }

    // Next portion.
    if !ctx.portion_in_flight && !quota_done && ctx.sensors.presence && now >= ctx.next_portion_at_ms
    {
        ctx.portion_in_flight = true;
        ctx.next_portion_at_ms = now + ctx.config.portion_interval_ms();
        ctx.commands.feeder = FeederCommand::Dispense;
        debug!("Feeding: portion started");
    }

    None
}

fn feeding_exit(ctx: &mut FsmContext) {
    if ctx.portion_in_flight {
        warn!("Feeding: portion aborted, not credited");
    }
    ctx.commands.feeder = FeederCommand::Off;
    ctx.portion_in_flight = false;
    ctx.absent_since_ms = None;
    ctx.last_dispense = None;
}

fn credit_portion(ctx: &mut FsmContext) {
    let portion = ctx.config.portion_amount_grams;
    let Some(session) = ctx.ledger.as_mut() else {
        return;
    };
    match session.add_consumed(portion) {
        Ok(()) => info!(
            "Feeding: portion credited, {} / {} g",
            session.consumed_grams(),
            session.daily_feed_limit_grams().unwrap_or(0)
        ),
        Err(LedgerError::QuotaExceeded) => {
            warn!("Feeding: portion of {} g exceeds quota, not credited", portion);
        }
        Err(e) => warn!("Feeding: portion not credited: {}", e),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  EXITING state
// ═══════════════════════════════════════════════════════════════════════════

fn exiting_enter(ctx: &mut FsmContext) {
    ctx.commands.entry_door = DoorCommand::Close;
    ctx.commands.separation_door = DoorCommand::Open;
    ctx.commands.feeder = FeederCommand::Off;
    ctx.exited_at_ms = None;
    ctx.admission = Admission::Vacant;
    info!("Exiting: separation door open");
}

fn exiting_update(ctx: &mut FsmContext) -> Option<StateId> {
    let Some(exited_at) = ctx.exited_at_ms else {
        if ctx.sensors.presence || !close_session(ctx) {
            return None;
        }
        ctx.exited_at_ms = Some(ctx.now_ms);
        ctx.commands.separation_door = DoorCommand::Close;
        return None;
    };

    // Identify the next animal queued at the entry while the door is held.
    if ctx.ledger.is_none() {
        let at_reader = ctx.sensors.presence
            || ctx.sensors.tag.is_some()
            || ctx.admission != Admission::Vacant;
        advance_admission(ctx, at_reader);
    }

    let since_exit = ctx.now_ms.saturating_sub(exited_at);
    let delay = ctx.config.entry_door_delay_ms();
    if since_exit < delay {
        return None;
    }
    if ctx.ledger.is_none() {
        return Some(StateId::Waiting);
    }

    if ctx.commands.entry_door != DoorCommand::Open {
        info!("Exiting: next animal identified, entry door open");
        ctx.commands.entry_door = DoorCommand::Open;
    }
    if ctx.sensors.presence {
        info!("Exiting: next animal in the stall");
        return Some(StateId::Feeding);
    }
    if since_exit - delay > ctx.config.rfid_tolerance_ms() {
        warn!("Exiting: identified animal did not enter, session dropped");
        ctx.ledger = None;
        return Some(StateId::Waiting);
    }
    None
}

/// Record the exit, finalize the session and hand it to the gateway.
/// Returns `false` when the exit could not be recorded yet (wall clock not
/// past the entry time); the session is kept for the next tick.
fn close_session(ctx: &mut FsmContext) -> bool {
    let Some(mut session) = ctx.ledger.take() else {
        warn!("Exiting: no session to close");
        return true;
    };

    match session.record_exit(ctx.now_utc) {
        Ok(()) | Err(LedgerError::AlreadyBound) => {}
        Err(e) => {
            warn!("Exiting: exit time not recorded ({}), retrying", e);
            ctx.ledger = Some(session);
            return false;
        }
    }

    match session.finalize() {
        Ok(record) => {
            info!(
                "Exiting: {} consumed {} g of {} g",
                record.sow_rfid(),
                record.consumed_grams(),
                record.daily_feed_limit_grams()
            );
            if record.consumed_grams() < ctx.config.min_amount_without_alert_grams {
                let desc = format!(
                    "{} consumed {} g, below {} g",
                    record.sow_rfid(),
                    record.consumed_grams(),
                    ctx.config.min_amount_without_alert_grams
                );
                ctx.raise_alert_for(
                    AlertType::LowConsumption,
                    &desc,
                    Some(record.confinement_id()),
                );
            }
            ctx.emit(AppEvent::ConsumptionLogged {
                record,
                logged_at: ctx.now_utc,
            });
        }
        Err(e) => error!("Exiting: session discarded: {}", e),
    }

    ctx.last_feeding_ms = ctx.now_ms;
    ctx.no_feeding_reported = false;
    true
}
