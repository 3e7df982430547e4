//! # MQTT transport
//!
//! Publishes streaming payloads to a broker. The session only sees the
//! [`Transport`] trait; [`MqttLink`] is the rumqttc implementation.
//!
//! ```text
//! mqtt/
//! ├── config.rs        - broker address, credentials, topic
//! ├── message.rs       - last sent message record
//! ├── mqtt_handler.rs  - connection lifecycle and event pump
//! └── transport.rs     - publish seam and its errors
//! ```
//!
//! Payloads are sent with QoS 0 and no retain. A lost connection is not re-established
//! here; the session drops back to idle and the caller decides whether to reconnect.

pub mod config;
pub mod message;
pub mod mqtt_handler;
pub mod transport;

pub use config::{MqttConfig, MqttServer};
pub use message::SentMessage;
pub use mqtt_handler::{Closed, Configured, Connected, ConnectionState, MqttLink};
pub use transport::{Transport, TransportError};
