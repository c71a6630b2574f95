//! Hardware interlock behaviour through the real `InterlockAdapter` and
//! drivers, running over simulated GPIO levels.

use core::cell::Cell;
use core::convert::Infallible;
use std::collections::VecDeque;
use std::rc::Rc;

use embedded_hal::digital::{ErrorType, InputPin, OutputPin};

use crate::mock_hw::{Harness, MockClock, RecordingSink};

use swinefeeder::adapters::hardware::InterlockAdapter;
use swinefeeder::app::events::AppEvent;
use swinefeeder::app::service::AppService;
use swinefeeder::config::FeederConfig;
use swinefeeder::drivers::door::{DoorDriver, DoorId};
use swinefeeder::drivers::feeder_motor::FeederMotor;
use swinefeeder::error::{Error, HardwareFault};
use swinefeeder::fsm::StateId;
use swinefeeder::gateway::GatewayInbox;
use swinefeeder::gateway::dto::AlertType;
use swinefeeder::sensors::presence::PresenceSensor;
use swinefeeder::sensors::rfid::{ByteSource, RfidReader};

// ── Simulated GPIO ────────────────────────────────────────────

#[derive(Clone, Default)]
struct Line(Rc<Cell<bool>>);

impl Line {
    fn high(&self) -> bool {
        self.0.get()
    }

    fn set(&self, level: bool) {
        self.0.set(level);
    }
}

impl ErrorType for Line {
    type Error = Infallible;
}

impl OutputPin for Line {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.0.set(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.0.set(true);
        Ok(())
    }
}

impl InputPin for Line {
    fn is_high(&mut self) -> Result<bool, Infallible> {
        Ok(self.0.get())
    }

    fn is_low(&mut self) -> Result<bool, Infallible> {
        Ok(!self.0.get())
    }
}

#[derive(Clone, Default)]
struct SerialLine(Rc<std::cell::RefCell<VecDeque<u8>>>);

impl SerialLine {
    fn send(&self, bytes: &[u8]) {
        self.0.borrow_mut().extend(bytes.iter().copied());
    }
}

impl ByteSource for SerialLine {
    fn read_byte(&mut self) -> Option<u8> {
        self.0.borrow_mut().pop_front()
    }
}

#[derive(Default)]
struct DoorLines {
    motor_open: Line,
    motor_close: Line,
    limit_open: Line,
    limit_closed: Line,
}

impl DoorLines {
    fn driver(&self, id: DoorId) -> DoorDriver<Line, Line> {
        DoorDriver::new(
            id,
            self.motor_open.clone(),
            self.motor_close.clone(),
            self.limit_open.clone(),
            self.limit_closed.clone(),
        )
    }

    fn motors_off(&self) -> bool {
        !self.motor_open.high() && !self.motor_close.high()
    }

    /// Let the door reach whichever limit its motor drives towards.
    fn settle(&self) {
        if self.motor_open.high() {
            self.limit_open.set(true);
            self.limit_closed.set(false);
        } else if self.motor_close.high() {
            self.limit_open.set(false);
            self.limit_closed.set(true);
        }
    }
}

struct Rig {
    app: AppService,
    hw: InterlockAdapter<Line, Line, SerialLine>,
    clock: MockClock,
    inbox: GatewayInbox,
    sink: RecordingSink,
    entry: DoorLines,
    separation: DoorLines,
    feeder: Line,
    presence: Line,
    serial: SerialLine,
}

impl Rig {
    fn new() -> Self {
        let entry = DoorLines::default();
        let separation = DoorLines::default();
        entry.limit_closed.set(true);
        separation.limit_closed.set(true);
        let feeder = Line::default();
        let presence = Line::default();
        let serial = SerialLine::default();
        let hw = InterlockAdapter::new(
            entry.driver(DoorId::Entry),
            separation.driver(DoorId::Separation),
            FeederMotor::new(feeder.clone()),
            PresenceSensor::new(presence.clone()),
            RfidReader::new(serial.clone()),
        );
        let clock = MockClock::new();
        let mut sink = RecordingSink::new();
        let mut app = AppService::new(FeederConfig::default());
        app.start(&clock, &mut sink);
        Self {
            app,
            hw,
            clock,
            inbox: GatewayInbox::new(),
            sink,
            entry,
            separation,
            feeder,
            presence,
            serial,
        }
    }

    fn step(&mut self) -> Result<(), Error> {
        self.clock.advance(200);
        let result = self
            .app
            .tick(&mut self.hw, &self.clock, &self.inbox, &mut self.sink);
        self.entry.settle();
        self.separation.settle();
        result
    }
}

// ── Tests ─────────────────────────────────────────────────────

#[test]
fn contradictory_entry_switches_stop_everything() {
    let mut rig = Rig::new();
    rig.step().unwrap();
    assert!(rig.entry.motor_open.high() || rig.entry.limit_open.high());

    rig.entry.limit_open.set(true);
    rig.entry.limit_closed.set(true);
    assert_eq!(
        rig.step(),
        Err(Error::Hardware(HardwareFault::EntryDoorSwitches))
    );
    assert!(rig.entry.motors_off());
    assert!(rig.separation.motors_off());
    assert!(!rig.feeder.high());
    assert_eq!(rig.sink.alerts(AlertType::ReadFailure), 1);
    assert!(rig.sink.events.contains(&AppEvent::FaultDetected(
        HardwareFault::EntryDoorSwitches.mask()
    )));

    // Frozen while the fault persists; no repeated alert.
    for _ in 0..10 {
        assert!(rig.step().is_err());
        assert!(rig.entry.motors_off());
    }
    assert_eq!(rig.sink.alerts(AlertType::ReadFailure), 1);

    rig.entry.limit_closed.set(false);
    rig.step().unwrap();
    assert!(rig.sink.events.contains(&AppEvent::FaultCleared));
    assert_eq!(rig.app.state(), StateId::Waiting);
}

#[test]
fn feeding_never_drives_both_directions_of_a_door() {
    let mut rig = Rig::new();
    rig.presence.set(true);
    rig.serial.send(b"PIG00123\r\n");
    rig.step().unwrap();
    rig.inbox
        .route(
            swinefeeder::gateway::topics::DAILY_PLAN,
            br#"{"confinementId":7,"feedAmountGrams":500}"#,
        )
        .unwrap();

    for _ in 0..400 {
        rig.step().unwrap();
        for door in [&rig.entry, &rig.separation] {
            assert!(!(door.motor_open.high() && door.motor_close.high()));
        }
        if rig.app.state() == StateId::Exiting {
            break;
        }
    }
    assert_eq!(rig.app.state(), StateId::Exiting);
    assert_eq!(rig.app.session().unwrap().consumed_grams(), 500);
    assert!(rig.separation.limit_open.high());
    assert!(rig.entry.limit_closed.high());
    assert!(!rig.feeder.high());
}

#[test]
fn door_fault_in_mock_station_freezes_fsm() {
    let mut h = Harness::new(FeederConfig::default());
    h.step().unwrap();
    h.hw.faulted = Some(DoorId::Separation);
    assert_eq!(
        h.step(),
        Err(Error::Hardware(HardwareFault::SeparationDoorSwitches))
    );
    assert!(!h.hw.feeder_on);

    // An animal arriving during the fault is not processed.
    h.hw.present_tag("PIG00123");
    let _ = h.step();
    assert!(!h.sink.events.iter().any(|e| matches!(e, AppEvent::RfidIdentified(_))));

    h.hw.faulted = None;
    h.step().unwrap();
    assert_eq!(h.app.fault_flags(), 0);
}
