//! End-to-end feeding cycles through AppService → FSM → mock station.

use crate::mock_hw::{ActuatorCall, Harness};

use swinefeeder::app::commands::AppCommand;
use swinefeeder::app::events::AppEvent;
use swinefeeder::config::FeederConfig;
use swinefeeder::drivers::door::{DoorId, DoorState};
use swinefeeder::error::Error;
use swinefeeder::fsm::StateId;
use swinefeeder::gateway::dto::AlertType;
use swinefeeder::gateway::topics;

const MINUTE_MS: u64 = 60_000;

fn portion_500() -> FeederConfig {
    FeederConfig {
        portion_amount_grams: 500,
        ..FeederConfig::default()
    }
}

#[test]
fn starts_waiting_with_entry_open() {
    let mut h = Harness::new(FeederConfig::default());
    h.step().unwrap();
    assert_eq!(h.app.state(), StateId::Waiting);
    assert_eq!(h.hw.door(DoorId::Entry), DoorState::Open);
    assert_eq!(h.hw.door(DoorId::Separation), DoorState::Closed);
    assert!(!h.hw.feeder_on);
}

#[test]
fn full_quota_in_five_portions_then_release() {
    let mut h = Harness::new(portion_500());
    h.admit("PIG00123", br#"{"confinementId":7,"feedAmountGrams":2500}"#);
    assert!(h.sink.events.contains(&AppEvent::RfidIdentified(
        swinefeeder::ledger::Rfid::try_from("PIG00123").unwrap()
    )));
    assert_eq!(h.hw.door(DoorId::Entry), DoorState::Closed);

    h.step_until(10 * MINUTE_MS, |h| h.app.state() == StateId::Exiting);

    let session = h.app.session().expect("session still open until exit");
    assert_eq!(session.consumed_grams(), 2500);
    assert_eq!(h.hw.pulses, 5);
    assert_eq!(h.sink.alerts(AlertType::FeederTimeExceeded), 0);
    assert_eq!(h.hw.door(DoorId::Separation), DoorState::Open);
    assert!(!h.hw.feeder_on);

    // Animal walks out.
    h.hw.presence = false;
    h.step().unwrap();
    let logged = h
        .sink
        .events
        .iter()
        .find_map(|e| match e {
            AppEvent::ConsumptionLogged { record, .. } => Some(record.clone()),
            _ => None,
        })
        .expect("consumption logged");
    assert_eq!(logged.consumed_grams(), 2500);
    assert_eq!(logged.confinement_id(), 7);
    assert_eq!(logged.sow_rfid(), "PIG00123");
    assert!(logged.exit_time() > logged.entry_time());
    assert_eq!(h.sink.alerts(AlertType::LowConsumption), 0);
    assert_eq!(h.hw.door(DoorId::Separation), DoorState::Closed);

    // Entry door re-opens after the delay.
    h.step_until(MINUTE_MS, |h| h.app.state() == StateId::Waiting);
    assert_eq!(h.hw.door(DoorId::Entry), DoorState::Open);
}

/// Feed PIG00123 to its 2500 g quota and let it walk out.
fn first_animal_leaves(h: &mut Harness) {
    h.admit("PIG00123", br#"{"confinementId":7,"feedAmountGrams":2500}"#);
    h.step_until(10 * MINUTE_MS, |h| h.app.state() == StateId::Exiting);
    h.hw.presence = false;
    h.step().unwrap();
    assert!(h.app.session().is_none());
    assert_eq!(h.hw.door(DoorId::Separation), DoorState::Closed);
}

#[test]
fn queued_animal_goes_straight_to_feeding() {
    let mut h = Harness::new(portion_500());
    first_animal_leaves(&mut h);
    h.sink.events.clear();

    h.hw.queue_tag("PIG00456");
    h.step().unwrap();
    assert!(h.sink.events.contains(&AppEvent::RfidIdentified(
        swinefeeder::ledger::Rfid::try_from("PIG00456").unwrap()
    )));
    h.inbox
        .route(topics::DAILY_PLAN, br#"{"confinementId":9,"feedAmountGrams":1500}"#)
        .unwrap();
    h.step().unwrap();
    assert_eq!(h.app.state(), StateId::Exiting);
    assert_eq!(h.hw.door(DoorId::Entry), DoorState::Closed);

    // Entry door opens for the identified animal once the delay is over.
    h.step_until(MINUTE_MS, |h| h.hw.door(DoorId::Entry) == DoorState::Open);
    assert_eq!(h.app.state(), StateId::Exiting);

    h.hw.presence = true;
    h.step().unwrap();
    assert_eq!(h.app.state(), StateId::Feeding);
    assert!(!h.sink.entered(StateId::Waiting));

    let session = h.app.session().expect("fresh session bound");
    assert_eq!(session.sow_rfid(), Some("PIG00456"));
    assert_eq!(session.confinement_id(), Some(9));
    assert_eq!(session.daily_feed_limit_grams(), Some(1500));
    assert_eq!(session.consumed_grams(), 0);
    assert!(session.entry_time().is_some());
    assert_eq!(h.hw.door(DoorId::Entry), DoorState::Closed);
}

#[test]
fn empty_entry_returns_to_waiting() {
    let mut h = Harness::new(portion_500());
    first_animal_leaves(&mut h);
    h.sink.events.clear();

    h.step_until(MINUTE_MS, |h| h.app.state() != StateId::Exiting);
    assert_eq!(h.app.state(), StateId::Waiting);
    assert!(!h.sink.entered(StateId::Feeding));
    assert!(h.app.session().is_none());
    assert_eq!(h.hw.door(DoorId::Entry), DoorState::Open);
}

#[test]
fn brief_presence_dropout_does_not_end_session() {
    let mut h = Harness::new(portion_500());
    h.admit("PIG00123", br#"{"confinementId":7,"feedAmountGrams":2500}"#);

    // Two seconds of feeding, then the sensor drops out.
    for _ in 0..10 {
        h.step().unwrap();
    }
    h.hw.presence = false;

    // Default tolerance is 5 s: still feeding after exactly 5 s of absence.
    for _ in 0..26 {
        h.step().unwrap();
        assert_eq!(h.app.state(), StateId::Feeding);
    }
    h.step().unwrap();
    assert_eq!(h.app.state(), StateId::Exiting);
}

#[test]
fn presence_restored_within_tolerance_keeps_feeding() {
    let mut h = Harness::new(portion_500());
    h.admit("PIG00123", br#"{"confinementId":7,"feedAmountGrams":2500}"#);
    h.hw.presence = false;
    for _ in 0..20 {
        h.step().unwrap();
    }
    h.hw.presence = true;
    for _ in 0..40 {
        h.step().unwrap();
    }
    assert_eq!(h.app.state(), StateId::Feeding);
}

#[test]
fn session_time_limit_raises_alert_and_releases() {
    let config = FeederConfig {
        max_feeding_time_minutes: 1,
        portion_amount_grams: 100,
        ..FeederConfig::default()
    };
    let mut h = Harness::new(config);
    h.admit("PIG00999", br#"{"confinement_id":3,"feed_amount_grams":5000}"#);

    h.step_until(2 * MINUTE_MS, |h| h.app.state() == StateId::Exiting);
    assert_eq!(h.sink.alerts(AlertType::FeederTimeExceeded), 1);
    assert!(h.app.session().unwrap().consumed_grams() < 5000);
}

#[test]
fn low_consumption_is_reported_with_confinement() {
    let mut h = Harness::new(portion_500());
    h.admit("PIG00123", br#"{"confinementId":9,"feedAmountGrams":2500}"#);

    // First portion completes, then the animal leaves.
    h.step_until(MINUTE_MS, |h| {
        h.app.session().is_some_and(|s| s.consumed_grams() == 500)
    });
    h.hw.presence = false;
    h.step_until(MINUTE_MS, |h| h.app.state() == StateId::Waiting);

    // 500 g is not below the default 500 g threshold.
    assert_eq!(h.sink.alerts(AlertType::LowConsumption), 0);

    let config = FeederConfig {
        min_amount_without_alert_grams: 1000,
        ..portion_500()
    };
    let mut h = Harness::new(config);
    h.admit("PIG00123", br#"{"confinementId":9,"feedAmountGrams":2500}"#);
    h.step_until(MINUTE_MS, |h| {
        h.app.session().is_some_and(|s| s.consumed_grams() == 500)
    });
    h.hw.presence = false;
    h.step_until(MINUTE_MS, |h| h.app.state() == StateId::Waiting);
    let alert = h
        .sink
        .events
        .iter()
        .find_map(|e| match e {
            AppEvent::Alert(a) if a.alert_type == AlertType::LowConsumption => Some(a.clone()),
            _ => None,
        })
        .expect("low consumption alert");
    assert_eq!(alert.confinement_id, Some(9));
}

#[test]
fn unread_tag_raises_one_read_failure() {
    let mut h = Harness::new(FeederConfig::default());
    h.hw.presence = true;
    for _ in 0..100 {
        h.step().unwrap();
    }
    assert_eq!(h.app.state(), StateId::Waiting);
    assert_eq!(h.sink.alerts(AlertType::ReadFailure), 1);
}

#[test]
fn stale_plan_is_not_bound_to_next_animal() {
    let mut h = Harness::new(FeederConfig::default());
    h.inbox
        .route(topics::DAILY_PLAN, br#"{"confinementId":1,"feedAmountGrams":1000}"#)
        .unwrap();
    h.hw.present_tag("PIG00123");
    h.step().unwrap();
    h.step().unwrap();
    assert_eq!(h.app.state(), StateId::Waiting);
}

#[test]
fn settings_update_changes_portion_size() {
    let mut h = Harness::new(FeederConfig::default());
    h.inbox
        .route(
            topics::FEEDER_SETTINGS,
            br#"{"motor_feed_on_time_seconds":2,"portion_amount_grams":1000,"portion_interval_seconds":5,"entry_door_delay_seconds":3}"#,
        )
        .unwrap();
    h.admit("PIG00123", br#"{"confinementId":7,"feedAmountGrams":2000}"#);
    h.step_until(MINUTE_MS, |h| h.app.state() == StateId::Exiting);
    assert_eq!(h.hw.pulses, 2);
    assert_eq!(h.app.session().unwrap().consumed_grams(), 2000);
}

#[test]
fn illegal_transition_halts_automation() {
    let mut h = Harness::new(FeederConfig::default());
    h.step().unwrap();

    let err = h
        .app
        .handle_command(AppCommand::RequestState(StateId::Exiting), &mut h.hw, &mut h.sink)
        .unwrap_err();
    assert_eq!(
        err,
        Error::IllegalTransition {
            from: StateId::Waiting,
            to: StateId::Exiting
        }
    );
    assert_eq!(h.hw.last_call(), Some(ActuatorCall::AllOff));
    assert_eq!(h.sink.alerts(AlertType::ReadFailure), 1);

    h.hw.present_tag("PIG00123");
    for _ in 0..5 {
        assert_eq!(h.step(), Err(Error::Halted));
        assert_eq!(h.hw.last_call(), Some(ActuatorCall::AllOff));
    }
    assert_eq!(h.app.state(), StateId::Waiting);
}
