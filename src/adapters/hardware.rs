//! Interlock adapter: bridges the station peripherals to domain port traits.
//!
//! Owns both door drivers, the feeder motor, the presence sensor and the
//! RFID reader, exposing them through [`SensorPort`] and [`ActuatorPort`].
//! This is the only module in the system that touches actual hardware.
//! Pin types are generic over `embedded-hal`, so host tests run the same
//! adapter over simulated pins.

use embedded_hal::digital::{InputPin, OutputPin};
use log::error;

use crate::app::ports::{ActuatorPort, SensorPort};
use crate::drivers::door::{DoorDriver, DoorId, DoorState};
use crate::drivers::feeder_motor::{DispenseStatus, FeederMotor};
use crate::error::ActuatorError;
use crate::ledger::Rfid;
use crate::sensors::presence::PresenceSensor;
use crate::sensors::rfid::{ByteSource, RfidReader};

/// Concrete adapter that combines all station hardware behind port traits.
pub struct InterlockAdapter<O, I, S> {
    entry: DoorDriver<O, I>,
    separation: DoorDriver<O, I>,
    feeder: FeederMotor<O>,
    presence: PresenceSensor<I>,
    rfid: RfidReader<S>,
}

impl<O: OutputPin, I: InputPin, S: ByteSource> InterlockAdapter<O, I, S> {
    pub fn new(
        entry: DoorDriver<O, I>,
        separation: DoorDriver<O, I>,
        feeder: FeederMotor<O>,
        presence: PresenceSensor<I>,
        rfid: RfidReader<S>,
    ) -> Self {
        Self {
            entry,
            separation,
            feeder,
            presence,
            rfid,
        }
    }

    fn door(&mut self, id: DoorId) -> &mut DoorDriver<O, I> {
        match id {
            DoorId::Entry => &mut self.entry,
            DoorId::Separation => &mut self.separation,
        }
    }
}

// ── SensorPort implementation ─────────────────────────────────

impl<O: OutputPin, I: InputPin, S: ByteSource> SensorPort for InterlockAdapter<O, I, S> {
    fn read_presence(&mut self) -> bool {
        self.presence.read()
    }

    fn read_tag(&mut self) -> Option<Rfid> {
        self.rfid.poll()
    }

    fn door_state(&mut self, door: DoorId) -> DoorState {
        self.door(door).state()
    }
}

// ── ActuatorPort implementation ───────────────────────────────

impl<O: OutputPin, I: InputPin, S: ByteSource> ActuatorPort for InterlockAdapter<O, I, S> {
    fn open_door(&mut self, door: DoorId) -> Result<(), ActuatorError> {
        self.door(door).open()
    }

    fn close_door(&mut self, door: DoorId) -> Result<(), ActuatorError> {
        self.door(door).close()
    }

    fn stop_door(&mut self, door: DoorId) -> Result<(), ActuatorError> {
        self.door(door).stop()
    }

    fn dispense_feed(
        &mut self,
        duration_ms: u64,
        now_ms: u64,
    ) -> Result<DispenseStatus, ActuatorError> {
        self.feeder.dispense_feed(duration_ms, now_ms)
    }

    fn stop_feeder(&mut self) -> Result<(), ActuatorError> {
        self.feeder.stop()
    }

    fn all_off(&mut self) {
        if let Err(e) = self.feeder.stop() {
            error!("all_off: feeder: {}", e);
        }
        for id in [DoorId::Entry, DoorId::Separation] {
            if let Err(e) = self.door(id).stop() {
                error!("all_off: {} door: {}", id.name(), e);
            }
        }
    }
}
