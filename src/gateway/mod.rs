//! Farm API gateway: topic table, payloads, and the inbound/outbound
//! queues between the transport and the control loop.

pub mod dto;
pub mod inbox;
pub mod outbox;
pub mod topics;

pub use inbox::GatewayInbox;
pub use outbox::{Outbox, Publisher};
