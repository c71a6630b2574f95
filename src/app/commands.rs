//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (maintenance
//! console, provisioning, tests) that the
//! [`AppService`](super::service::AppService) interprets and acts upon.
//! Gateway payloads do not come through here; they are drained from the
//! [`GatewayInbox`](crate::gateway::GatewayInbox) every tick.

use crate::config::FeederConfig;
use crate::fsm::StateId;

/// Commands that external adapters can send into the application core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    /// Ask the FSM to move to `target`.  Validated against the transition
    /// graph; an illegal edge halts automation.
    RequestState(StateId),

    /// Replace the whole configuration (validated first).
    ReplaceConfig(FeederConfig),

    /// Emit a telemetry snapshot now.
    ReportTelemetry,
}
