//! Input-to-message streaming engine
//!
//! - [`config`] - publish timing settings
//! - [`scheduler`] - `Idle | ChangeDetect | IntervalDriven` state machine
//! - [`session`] - aggregate owning transport, device, mappings and scheduler
//! - [`handle`] - single-task runner plus a cloneable command/status handle

pub mod config;
pub mod handle;
pub mod scheduler;
pub mod session;

pub use config::StreamingConfig;
pub use handle::{SessionCommand, SessionHandle, SessionRunner, SessionStatus};
pub use scheduler::{IntervalTicker, PublishScheduler, SchedulerState};
pub use session::{PublishStats, SessionError, StreamingSession};
