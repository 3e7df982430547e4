//! Channel-to-field mapping and the pure transformations applied to each snapshot.
//!
//! - [`field_mapping`] - ordered mapping table, unique per `(kind, index)`
//! - [`deadzone`] - axis noise filter
//! - [`payload`] - snapshot projection into the wire record
//! - [`change_detector`] - last-published latches for change-driven streaming
//!
//! Nothing in here touches time or I/O; the streaming module decides when these run.

pub mod change_detector;
pub mod deadzone;
pub mod field_mapping;
pub mod payload;

pub use change_detector::ChangeDetector;
pub use deadzone::{apply_deadzone, AXIS_DEADZONE};
pub use field_mapping::{ChannelKind, FieldMapping, MappingChange, MappingTable};
pub use payload::{Payload, PayloadValue};
