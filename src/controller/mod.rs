//! Device input subsystem
//!
//! 1. [`snapshot`] - snapshot type and the [`DeviceSource`] polling seam
//! 2. [`gilrs_source`] - gamepads via gilrs
//!
//! # Architecture
//!
//! ```text
//! Gamepad ──► GilrsSource ──snapshot(id)──► SessionRunner (once per frame)
//! ```
//!
//! Sources are pulled, never pushed: the runner asks for the selected device once
//! per frame and treats `None` as the device having gone away.

pub mod gilrs_source;
pub mod snapshot;

pub use gilrs_source::{GilrsSource, SourceError};
pub use snapshot::{DeviceId, DeviceInfo, DeviceSnapshot, DeviceSource};
