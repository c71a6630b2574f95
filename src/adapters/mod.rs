//! Adapters: concrete implementations of the hexagonal port traits.
//!
//! | Adapter     | Implements    | Connects to                    |
//! |-------------|---------------|--------------------------------|
//! | `hardware`  | SensorPort    | limit switches, presence, UART |
//! |             | ActuatorPort  | door motors, feeder motor      |
//! | `log_sink`  | EventSink     | Serial log output              |
//! | `time`      | Clock         | ESP32 system timer, SNTP clock |
//!
//! The gateway [`Outbox`](crate::gateway::Outbox) is the other
//! `EventSink`.

pub mod hardware;
pub mod log_sink;
pub mod time;
