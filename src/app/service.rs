//! Application service: the hexagonal core.
//!
//! [`AppService`] owns the FSM, safety supervisor, live configuration and
//! shared context.  All I/O flows through port traits injected at call
//! sites, making the entire service testable with mock adapters.
//!
//! ```text
//!  SensorPort ──▶ ┌────────────────────────┐ ──▶ EventSink
//!  Clock ───────▶ │      AppService        │
//! ActuatorPort ◀──│  Safety · FSM · Ledger │
//!  GatewayInbox ─▶└────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use log::{error, info, warn};

use crate::config::FeederConfig;
use crate::drivers::door::DoorId;
use crate::error::{Error, HardwareFault};
use crate::fsm::context::{ActuatorCommands, Admission, DoorCommand, FeederCommand, FsmContext};
use crate::fsm::states::build_state_table;
use crate::fsm::{Fsm, StateId};
use crate::gateway::GatewayInbox;
use crate::gateway::dto::AlertType;
use crate::ledger::FeedingSession;
use crate::safety::SafetySupervisor;

use super::commands::AppCommand;
use super::events::{AppEvent, TelemetryData};
use super::ports::{ActuatorPort, Clock, EventSink, SensorPort};

// ───────────────────────────────────────────────────────────────
// AppService
// ───────────────────────────────────────────────────────────────

/// The application service orchestrates all domain logic.
pub struct AppService {
    fsm: Fsm,
    ctx: FsmContext,
    safety: SafetySupervisor,
    /// Live configuration.  Copied into the context once per tick.
    config: FeederConfig,
    /// Set once a fatal error stops automation.
    halted: Option<Error>,
    tick_count: u64,
}

impl AppService {
    /// Construct the service from configuration.
    ///
    /// Does **not** start the FSM: call [`start`](Self::start) next.
    pub fn new(config: FeederConfig) -> Self {
        let ctx = FsmContext::new(config, 0, DateTime::<Utc>::default());
        let fsm = Fsm::new(build_state_table(), StateId::Waiting);
        Self {
            fsm,
            ctx,
            safety: SafetySupervisor::new(),
            config,
            halted: None,
            tick_count: 0,
        }
    }

    // ── Lifecycle ─────────────────────────────────────────────

    /// Start the FSM in its initial state (Waiting).  Boot counts as the
    /// last feeding for the NoFeeding alert.
    pub fn start(&mut self, clock: &impl Clock, sink: &mut impl EventSink) {
        self.ctx.now_ms = clock.uptime_ms();
        self.ctx.now_utc = clock.now_utc();
        self.ctx.last_feeding_ms = self.ctx.now_ms;
        self.fsm.start(&mut self.ctx);
        self.flush_events(None, sink);
        sink.emit(&AppEvent::Started(self.fsm.current_state()));
        info!("AppService started in {:?}", self.fsm.current_state());
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one full control cycle:
    /// config → clock → sensors → safety → FSM → actuators → events.
    ///
    /// The `hw` parameter satisfies **both** [`SensorPort`] and
    /// [`ActuatorPort`], which avoids a double mutable borrow while
    /// keeping the port boundary explicit.
    ///
    /// Returns `Err(Error::Hardware(_))` while a fault freezes the FSM and
    /// `Err(Error::Halted)` on every tick after a fatal error.
    pub fn tick(
        &mut self,
        hw: &mut (impl SensorPort + ActuatorPort),
        clock: &impl Clock,
        inbox: &GatewayInbox,
        sink: &mut impl EventSink,
    ) -> Result<(), Error> {
        self.tick_count += 1;

        if self.halted.is_some() {
            hw.all_off();
            return Err(Error::Halted);
        }

        // 1. Configuration snapshot for this tick
        self.drain_config_updates(inbox);
        self.ctx.config = self.config;

        // 2. Time
        self.ctx.now_ms = clock.uptime_ms();
        self.ctx.now_utc = clock.now_utc();

        // 3. Sensors via SensorPort.  The reader is drained every tick so
        //    stale tags never linger; a tag only counts while present or
        //    while the next animal queues at the entry after an exit.
        let presence = hw.read_presence();
        let tag = hw.read_tag();
        let queued = self.ctx.accepts_queued_tag();
        self.ctx.sensors.presence = presence;
        self.ctx.sensors.tag = tag.filter(|_| presence || queued);
        self.ctx.sensors.entry_door = hw.door_state(DoorId::Entry);
        self.ctx.sensors.separation_door = hw.door_state(DoorId::Separation);
        self.ctx.sensors.plan = None;

        // 4. Safety evaluation
        if let Some(fault) = self.evaluate_safety(sink) {
            hw.all_off();
            self.flush_events(Some(inbox), sink);
            return Err(Error::Hardware(fault));
        }

        // 5. Daily plan, only while one is awaited
        if matches!(self.ctx.admission, Admission::AwaitingPlan { .. }) {
            self.ctx.sensors.plan = inbox.try_next_plan();
        }

        // 6. FSM tick (pure state logic)
        let prev_state = self.fsm.current_state();
        if let Err(e) = self.fsm.tick(&mut self.ctx) {
            self.flush_events(Some(inbox), sink);
            self.halt(e, hw, sink);
            return Err(e);
        }

        // 7. Apply actuator commands via ActuatorPort
        self.apply_actuators(hw);

        // 8. Events raised by the handlers, then the transition
        self.flush_events(Some(inbox), sink);
        let new_state = self.fsm.current_state();
        if new_state != prev_state {
            sink.emit(&AppEvent::StateChanged {
                from: prev_state,
                to: new_state,
            });
        }

        Ok(())
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        hw: &mut impl ActuatorPort,
        sink: &mut impl EventSink,
    ) -> Result<(), Error> {
        match cmd {
            AppCommand::RequestState(target) => {
                if self.halted.is_some() {
                    return Err(Error::Halted);
                }
                let prev = self.fsm.current_state();
                if let Err(e) = self.fsm.request_transition(target, &mut self.ctx) {
                    self.halt(e, hw, sink);
                    return Err(e);
                }
                self.apply_actuators(hw);
                self.flush_events(None, sink);
                sink.emit(&AppEvent::StateChanged {
                    from: prev,
                    to: target,
                });
            }
            AppCommand::ReplaceConfig(new_config) => {
                new_config.validate()?;
                self.config = new_config;
                info!("Configuration replaced at runtime");
            }
            AppCommand::ReportTelemetry => {
                sink.emit(&AppEvent::Telemetry(self.build_telemetry()));
            }
        }
        Ok(())
    }

    // ── Queries ───────────────────────────────────────────────

    /// Build a telemetry snapshot from the current context.
    pub fn build_telemetry(&self) -> TelemetryData {
        let session = self.ctx.ledger.as_ref();
        TelemetryData {
            state: self.fsm.current_state(),
            presence: self.ctx.sensors.presence,
            entry_door: self.ctx.sensors.entry_door,
            separation_door: self.ctx.sensors.separation_door,
            consumed_grams: session.map_or(0, FeedingSession::consumed_grams),
            daily_limit_grams: session.and_then(FeedingSession::daily_feed_limit_grams),
            fault_flags: self.ctx.fault_flags,
            halted: self.halted.is_some(),
        }
    }

    /// Current FSM state.
    pub fn state(&self) -> StateId {
        self.fsm.current_state()
    }

    /// Total control ticks executed since startup.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }

    /// Current active fault bitmask (0 = no faults).
    pub fn fault_flags(&self) -> u8 {
        self.ctx.fault_flags
    }

    /// The fatal error that halted automation, if any.
    pub fn halted(&self) -> Option<Error> {
        self.halted
    }

    /// Live configuration.
    pub fn config(&self) -> FeederConfig {
        self.config
    }

    /// Session of the animal currently admitted, if any.
    pub fn session(&self) -> Option<&FeedingSession> {
        self.ctx.ledger.as_ref()
    }

    // ── Internal ──────────────────────────────────────────────

    fn drain_config_updates(&mut self, inbox: &GatewayInbox) {
        while let Some(dto) = inbox.try_next_settings() {
            match self.config.apply_settings(&dto) {
                Ok(()) => info!("Feeder settings updated: {:?}", dto),
                Err(e) => warn!("Feeder settings rejected: {}", e),
            }
        }
        while let Some(dto) = inbox.try_next_alert_parameters() {
            match self.config.apply_alert_parameters(&dto) {
                Ok(()) => info!("Alert parameters updated: {:?}", dto),
                Err(e) => warn!("Alert parameters rejected: {}", e),
            }
        }
    }

    /// Run the supervisor, report fault edges, and return the lowest active
    /// fault if any.
    fn evaluate_safety(&mut self, sink: &mut impl EventSink) -> Option<HardwareFault> {
        let prev = self.ctx.fault_flags;
        let faults = self
            .safety
            .evaluate(&self.ctx.sensors, &self.ctx.config, self.ctx.now_ms);
        self.ctx.fault_flags = faults;

        let raised = faults & !prev;
        if raised != 0 {
            warn!("Hardware fault! flags=0b{:08b}", faults);
            sink.emit(&AppEvent::FaultDetected(raised));
            for fault in HardwareFault::ALL {
                if raised & fault.mask() != 0 {
                    let desc = format!("hardware fault: {fault}, motors stopped");
                    self.ctx.raise_alert(AlertType::ReadFailure, &desc);
                }
            }
        }
        if !self.safety.has_faults() && prev != 0 {
            info!("All hardware faults cleared, resuming in {:?}", self.fsm.current_state());
            sink.emit(&AppEvent::FaultCleared);
        }

        HardwareFault::ALL
            .into_iter()
            .find(|f| self.safety.has_fault(*f))
    }

    /// Translate FSM actuator commands into port calls.
    fn apply_actuators(&mut self, hw: &mut impl ActuatorPort) {
        let cmds = self.ctx.commands;

        for (door, cmd) in [
            (DoorId::Entry, cmds.entry_door),
            (DoorId::Separation, cmds.separation_door),
        ] {
            let result = match cmd {
                DoorCommand::Open => hw.open_door(door),
                DoorCommand::Close => hw.close_door(door),
                DoorCommand::Stop => hw.stop_door(door),
            };
            if let Err(e) = result {
                warn!("{} door {:?} failed: {}", door.name(), cmd, e);
            }
        }

        match cmds.feeder {
            FeederCommand::Dispense => {
                match hw.dispense_feed(self.ctx.config.motor_on_ms(), self.ctx.now_ms) {
                    Ok(status) => self.ctx.last_dispense = Some(status),
                    Err(e) => {
                        warn!("feeder dispense failed: {}", e);
                        self.ctx.last_dispense = None;
                    }
                }
            }
            FeederCommand::Off => {
                if let Err(e) = hw.stop_feeder() {
                    warn!("feeder stop failed: {}", e);
                }
            }
        }
    }

    /// Forward events raised by the handlers.  Plans queued before a tag
    /// is published cannot answer it and are discarded first.
    fn flush_events(&mut self, inbox: Option<&GatewayInbox>, sink: &mut impl EventSink) {
        for event in core::mem::take(&mut self.ctx.events) {
            if let (AppEvent::RfidIdentified(_), Some(inbox)) = (&event, inbox) {
                inbox.clear_plans();
            }
            sink.emit(&event);
        }
    }

    /// Stop everything and refuse further automation.
    fn halt(&mut self, e: Error, hw: &mut impl ActuatorPort, sink: &mut impl EventSink) {
        error!("Automation halted: {}", e);
        hw.all_off();
        self.ctx.commands = ActuatorCommands::all_off();
        self.halted = Some(e);
        let desc = format!("automation halted: {e}");
        self.ctx.raise_alert(AlertType::ReadFailure, &desc);
        self.flush_events(None, sink);
        sink.emit(&AppEvent::Halted(e));
    }
}
