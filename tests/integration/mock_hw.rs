//! Mock station hardware for integration tests.
//!
//! Records every actuator call so tests can assert on the full command
//! history without touching real GPIO.  Doors travel instantly; the feeder
//! pulse follows the same timing contract as the real motor driver.

use core::cell::Cell;
use std::collections::VecDeque;

use chrono::{DateTime, Duration, TimeZone, Utc};

use swinefeeder::app::events::AppEvent;
use swinefeeder::app::ports::{ActuatorPort, Clock, EventSink, SensorPort};
use swinefeeder::app::service::AppService;
use swinefeeder::config::FeederConfig;
use swinefeeder::drivers::door::{DoorId, DoorState};
use swinefeeder::drivers::feeder_motor::DispenseStatus;
use swinefeeder::error::{ActuatorError, Error};
use swinefeeder::fsm::StateId;
use swinefeeder::gateway::GatewayInbox;
use swinefeeder::gateway::dto::AlertType;
use swinefeeder::ledger::Rfid;

// ── Actuator call record ──────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorCall {
    OpenDoor(DoorId),
    CloseDoor(DoorId),
    StopDoor(DoorId),
    Dispense,
    StopFeeder,
    AllOff,
}

// ── MockStation ───────────────────────────────────────────────

pub struct MockStation {
    pub presence: bool,
    pub tags: VecDeque<Rfid>,
    pub faulted: Option<DoorId>,
    pub calls: Vec<ActuatorCall>,
    doors: [DoorState; 2],
    dispense_started: Option<u64>,
    pub feeder_on: bool,
    /// Dispense pulses started.
    pub pulses: u32,
}

#[allow(dead_code)]
impl MockStation {
    pub fn new() -> Self {
        Self {
            presence: false,
            tags: VecDeque::new(),
            faulted: None,
            calls: Vec::new(),
            doors: [DoorState::Closed; 2],
            dispense_started: None,
            feeder_on: false,
            pulses: 0,
        }
    }

    pub fn present_tag(&mut self, tag: &str) {
        self.presence = true;
        self.tags.push_back(Rfid::try_from(tag).unwrap());
    }

    /// Next animal waiting outside at the entry reader; stall presence is
    /// left as it is.
    pub fn queue_tag(&mut self, tag: &str) {
        self.tags.push_back(Rfid::try_from(tag).unwrap());
    }

    pub fn door(&self, id: DoorId) -> DoorState {
        self.doors[id as usize]
    }

    pub fn last_call(&self) -> Option<ActuatorCall> {
        self.calls.last().copied()
    }

    fn check(&self, id: DoorId) -> Result<(), ActuatorError> {
        if self.faulted == Some(id) {
            Err(ActuatorError::DoorFaulted)
        } else {
            Ok(())
        }
    }
}

impl Default for MockStation {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorPort for MockStation {
    fn read_presence(&mut self) -> bool {
        self.presence
    }

    fn read_tag(&mut self) -> Option<Rfid> {
        self.tags.pop_front()
    }

    fn door_state(&mut self, door: DoorId) -> DoorState {
        if self.faulted == Some(door) {
            DoorState::Fault
        } else {
            self.doors[door as usize]
        }
    }
}

impl ActuatorPort for MockStation {
    fn open_door(&mut self, door: DoorId) -> Result<(), ActuatorError> {
        self.calls.push(ActuatorCall::OpenDoor(door));
        self.check(door)?;
        self.doors[door as usize] = DoorState::Open;
        Ok(())
    }

    fn close_door(&mut self, door: DoorId) -> Result<(), ActuatorError> {
        self.calls.push(ActuatorCall::CloseDoor(door));
        self.check(door)?;
        self.doors[door as usize] = DoorState::Closed;
        Ok(())
    }

    fn stop_door(&mut self, door: DoorId) -> Result<(), ActuatorError> {
        self.calls.push(ActuatorCall::StopDoor(door));
        Ok(())
    }

    fn dispense_feed(
        &mut self,
        duration_ms: u64,
        now_ms: u64,
    ) -> Result<DispenseStatus, ActuatorError> {
        self.calls.push(ActuatorCall::Dispense);
        match self.dispense_started {
            None => {
                self.dispense_started = Some(now_ms);
                self.feeder_on = true;
                self.pulses += 1;
                Ok(DispenseStatus::Started)
            }
            Some(start) if now_ms.saturating_sub(start) >= duration_ms => {
                self.dispense_started = None;
                self.feeder_on = false;
                Ok(DispenseStatus::Completed)
            }
            Some(_) => Ok(DispenseStatus::Running),
        }
    }

    fn stop_feeder(&mut self) -> Result<(), ActuatorError> {
        self.calls.push(ActuatorCall::StopFeeder);
        self.dispense_started = None;
        self.feeder_on = false;
        Ok(())
    }

    fn all_off(&mut self) {
        self.calls.push(ActuatorCall::AllOff);
        self.dispense_started = None;
        self.feeder_on = false;
    }
}

// ── MockClock ─────────────────────────────────────────────────

pub struct MockClock {
    ms: Cell<u64>,
    base: DateTime<Utc>,
}

#[allow(dead_code)]
impl MockClock {
    pub fn new() -> Self {
        Self {
            ms: Cell::new(0),
            base: Utc.with_ymd_and_hms(2025, 6, 1, 6, 0, 0).unwrap(),
        }
    }

    pub fn advance(&self, ms: u64) {
        self.ms.set(self.ms.get() + ms);
    }
}

impl Clock for MockClock {
    fn uptime_ms(&self) -> u64 {
        self.ms.get()
    }

    fn now_utc(&self) -> DateTime<Utc> {
        self.base + Duration::milliseconds(self.ms.get() as i64)
    }
}

// ── RecordingSink ─────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<AppEvent>,
}

#[allow(dead_code)]
impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn alerts(&self, kind: AlertType) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, AppEvent::Alert(a) if a.alert_type == kind))
            .count()
    }

    pub fn entered(&self, state: StateId) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, AppEvent::StateChanged { to, .. } if *to == state))
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &AppEvent) {
        self.events.push(event.clone());
    }
}

// ── Harness ───────────────────────────────────────────────────

/// Service wired to mock adapters, stepped one control tick at a time.
pub struct Harness<S: EventSink = RecordingSink> {
    pub app: AppService,
    pub hw: MockStation,
    pub clock: MockClock,
    pub inbox: GatewayInbox,
    pub sink: S,
    step_ms: u64,
}

#[allow(dead_code)]
impl Harness<RecordingSink> {
    pub fn new(config: FeederConfig) -> Self {
        Self::with_sink(config, RecordingSink::new())
    }
}

#[allow(dead_code)]
impl<S: EventSink> Harness<S> {
    pub fn with_sink(config: FeederConfig, mut sink: S) -> Self {
        let clock = MockClock::new();
        let mut app = AppService::new(config);
        app.start(&clock, &mut sink);
        Self {
            app,
            hw: MockStation::new(),
            clock,
            inbox: GatewayInbox::new(),
            sink,
            step_ms: u64::from(config.control_loop_interval_ms),
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.clock.uptime_ms()
    }

    /// Advance one control interval and tick.
    pub fn step(&mut self) -> Result<(), Error> {
        self.clock.advance(self.step_ms);
        self.app
            .tick(&mut self.hw, &self.clock, &self.inbox, &mut self.sink)
    }

    /// Step until `done` holds, panicking after `limit_ms` of simulated time.
    pub fn step_until(&mut self, limit_ms: u64, mut done: impl FnMut(&Self) -> bool) {
        let deadline = self.now_ms() + limit_ms;
        while !done(self) {
            assert!(self.now_ms() < deadline, "condition not reached within {limit_ms} ms");
            self.step().unwrap();
        }
    }

    /// Present a tagged animal, answer its plan request and step into Feeding.
    pub fn admit(&mut self, tag: &str, plan_json: &[u8]) {
        self.hw.present_tag(tag);
        self.step().unwrap();
        assert_eq!(self.app.state(), StateId::Waiting);
        self.inbox
            .route(swinefeeder::gateway::topics::DAILY_PLAN, plan_json)
            .unwrap();
        self.step().unwrap();
        assert_eq!(self.app.state(), StateId::Feeding);
    }
}
