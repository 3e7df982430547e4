//! # padstream
//!
//! Streams a gamepad's buttons and axes as named JSON messages onto an MQTT broker.
//!
//! ```text
//! controller/ ──[DeviceSnapshot]──► streaming/ ──[Payload]──► mqtt/
//!  (gilrs)                           (scheduler,             (rumqttc)
//!                                     session, runner)
//!                    mapping/ ─────────────┘
//!              (table, deadzone, payload, latches)
//! ```
//!
//! The `streaming` module owns all timing decisions; the other modules are either
//! pure (`mapping`) or adapters to external collaborators (`controller`, `mqtt`).

pub mod config;
pub mod controller;
pub mod mapping;
pub mod mqtt;
pub mod streaming;
