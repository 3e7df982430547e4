//! Streaming session: the aggregate that decides what goes out and when
//!
//! Owns the transport, selected device, mapping table, streaming config, scheduler
//! and latest snapshot. It is driven by exactly one caller (the session runner), which
//! serializes frame samples, timer fires and external commands; no method blocks.
//!
//! # Per-frame flow
//!
//! ```text
//! on_frame(snapshot) ─► store latest ─► ChangeDetect? ─► any channel changed? ─► publish full payload
//! on_interval_tick()  ─► IntervalDriven? ─► build from latest ─► publish
//! ```
//!
//! A publish failure is counted and logged; the scheduler state is not touched and the
//! payload is not retried. In change mode the latches only move when a payload went
//! out, so the next frame sends the then-current state.

use crate::controller::snapshot::{DeviceId, DeviceSnapshot};
use crate::mapping::{ChannelKind, FieldMapping, MappingChange, MappingTable, Payload};
use crate::mqtt::message::SentMessage;
use crate::mqtt::transport::Transport;
use crate::streaming::config::StreamingConfig;
use crate::streaming::scheduler::{PublishScheduler, SchedulerState};
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("Transport is not connected")]
    NotConnected,

    #[error("No device selected")]
    NoDevice,

    #[error("No channel mappings configured")]
    NoMappings,

    #[error("Not allowed while streaming; stop streaming first")]
    Streaming,

    #[error("Session runner has stopped")]
    Closed,
}

/// Publish counters for the current session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishStats {
    pub sent: u64,
    pub failed: u64,
    pub last_error: Option<String>,
}

pub struct StreamingSession<T: Transport> {
    topic: String,
    transport: Option<T>,
    device: Option<DeviceId>,
    mappings: MappingTable,
    config: StreamingConfig,
    scheduler: PublishScheduler,
    latest: Option<DeviceSnapshot>,
    last_message: Option<SentMessage>,
    stats: PublishStats,
}

impl<T: Transport> StreamingSession<T> {
    pub fn new(topic: impl Into<String>, mappings: MappingTable, config: StreamingConfig) -> Self {
        Self {
            topic: topic.into(),
            transport: None,
            device: None,
            mappings,
            config: config.clamped(),
            scheduler: PublishScheduler::Idle,
            latest: None,
            last_message: None,
            stats: PublishStats::default(),
        }
    }

    // ---- transport ----

    /// Attaches a connected transport, closing any previous one
    pub fn attach_transport(&mut self, transport: T) {
        if let Some(previous) = self.detach_transport() {
            debug!("Replacing existing transport");
            previous.close();
        }
        info!("Transport attached");
        self.transport = Some(transport);
    }

    /// Removes the transport; streaming stops
    pub fn detach_transport(&mut self) -> Option<T> {
        if self.transport.is_some() {
            self.enter_idle("transport detached");
        }
        self.transport.take()
    }

    pub fn disconnect(&mut self) {
        if let Some(transport) = self.detach_transport() {
            info!("Closing transport");
            transport.close();
        }
    }

    pub fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_connected())
    }

    // ---- device ----

    /// Selects the device to sample. Changing devices while streaming stops the stream.
    pub fn select_device(&mut self, device: Option<DeviceId>) {
        if self.device == device {
            return;
        }
        if self.is_streaming() {
            self.enter_idle("device changed");
        }
        match device {
            Some(id) => info!("Selected device {}", id),
            None => info!("Device deselected"),
        }
        self.device = device;
        self.latest = None;
    }

    pub fn device(&self) -> Option<DeviceId> {
        self.device
    }

    // ---- mappings ----

    /// Maps a channel to a field; an empty name clears the channel.
    ///
    /// Allowed while streaming. A newly mapped or cleared channel loses its latch, so
    /// it is published as a first observation when mapped again.
    pub fn map_channel(&mut self, kind: ChannelKind, index: usize, field_name: &str) -> MappingChange {
        let change = self.mappings.set(kind, index, field_name);
        if matches!(change, MappingChange::Added | MappingChange::Removed) {
            self.scheduler.forget(kind, index);
        }
        change
    }

    pub fn unmap_channel(&mut self, kind: ChannelKind, index: usize) -> Option<FieldMapping> {
        let removed = self.mappings.remove(kind, index);
        if let Some(mapping) = &removed {
            debug!("Unmapped {}", mapping);
            self.scheduler.forget(kind, index);
        }
        removed
    }

    pub fn mappings(&self) -> &MappingTable {
        &self.mappings
    }

    // ---- config ----

    /// Replaces the streaming config; rejected while streaming
    pub fn set_config(&mut self, config: StreamingConfig) -> Result<(), SessionError> {
        if self.is_streaming() {
            warn!("Rejected streaming config change while streaming");
            return Err(SessionError::Streaming);
        }
        self.config = config.clamped();
        debug!("Streaming config set to {:?}", self.config);
        Ok(())
    }

    pub fn config(&self) -> StreamingConfig {
        self.config
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    // ---- lifecycle ----

    /// Starts streaming in the mode chosen by the config.
    ///
    /// Requires a connected transport, a selected device and at least one mapping.
    /// Starting while already streaming is a no-op.
    pub fn start_streaming(&mut self) -> Result<(), SessionError> {
        if self.is_streaming() {
            debug!("Already streaming ({})", self.scheduler.state());
            return Ok(());
        }
        if !self.is_connected() {
            return Err(SessionError::NotConnected);
        }
        if self.device.is_none() {
            return Err(SessionError::NoDevice);
        }
        if self.mappings.is_empty() {
            return Err(SessionError::NoMappings);
        }

        self.scheduler = PublishScheduler::start(&self.config, self.latest.as_ref());
        info!(
            "Streaming started: {} to '{}' ({} mappings)",
            self.scheduler.state(),
            self.topic,
            self.mappings.len()
        );
        Ok(())
    }

    pub fn stop_streaming(&mut self) {
        self.enter_idle("stopped");
    }

    pub fn state(&self) -> SchedulerState {
        self.scheduler.state()
    }

    pub fn is_streaming(&self) -> bool {
        self.scheduler.is_streaming()
    }

    // ---- ticks ----

    /// Handles one frame sample of the selected device.
    ///
    /// `None` means the device is gone, which ends streaming. In change mode the
    /// full payload is published when any mapped channel changed.
    pub fn on_frame(&mut self, snapshot: Option<DeviceSnapshot>) {
        let Some(snapshot) = snapshot else {
            self.latest = None;
            if self.is_streaming() {
                warn!("Selected device lost");
                self.enter_idle("device lost");
            }
            return;
        };
        self.latest = Some(snapshot);

        if !self.is_streaming() || !self.ensure_connected() {
            return;
        }

        let changed = match &self.latest {
            Some(latest) => self.scheduler.frame_changed(latest, &self.mappings),
            None => false,
        };
        if !changed {
            return;
        }
        let Some(latest) = &self.latest else {
            return;
        };
        let payload = Payload::build(latest, &self.mappings);
        if self.publish(payload) {
            if let Some(latest) = &self.latest {
                self.scheduler.frame_sent(latest, &self.mappings);
            }
        }
    }

    /// Handles one interval timer fire: publishes the current payload unconditionally
    pub fn on_interval_tick(&mut self) {
        if self.scheduler.state() != SchedulerState::IntervalDriven || !self.ensure_connected() {
            return;
        }
        match &self.latest {
            Some(latest) => {
                let payload = Payload::build(latest, &self.mappings);
                self.publish(payload);
            }
            None => debug!("No snapshot sampled yet, skipping interval publish"),
        }
    }

    /// See [`PublishScheduler::next_interval_tick`]
    pub async fn next_interval_tick(&mut self) {
        self.scheduler.next_interval_tick().await
    }

    // ---- observables ----

    pub fn last_message(&self) -> Option<&SentMessage> {
        self.last_message.as_ref()
    }

    pub fn stats(&self) -> &PublishStats {
        &self.stats
    }

    pub fn latest_snapshot(&self) -> Option<&DeviceSnapshot> {
        self.latest.as_ref()
    }

    /// What would be sent for the latest snapshot, for display
    pub fn preview_payload(&self) -> Option<Payload> {
        self.latest
            .as_ref()
            .map(|latest| Payload::build(latest, &self.mappings))
    }

    // ---- internals ----

    fn enter_idle(&mut self, reason: &str) {
        if self.is_streaming() {
            info!("Streaming stopped ({}): {} → idle", reason, self.scheduler.state());
        }
        self.scheduler = PublishScheduler::Idle;
    }

    /// Stops streaming if the transport dropped; returns whether it is still up
    fn ensure_connected(&mut self) -> bool {
        let connected = self.is_connected();
        if !connected {
            warn!("Transport disconnected");
            self.enter_idle("transport disconnected");
        }
        connected
    }

    /// Returns whether the payload went out
    fn publish(&mut self, payload: Payload) -> bool {
        let bytes = match payload.to_json_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                error!("Failed to encode payload: {}", e);
                self.record_failure(e.to_string());
                return false;
            }
        };

        let result = match &self.transport {
            Some(transport) => transport.publish(&self.topic, bytes),
            None => return false,
        };

        match result {
            Ok(()) => {
                self.stats.sent += 1;
                debug!("Published to '{}': {}", self.topic, payload);
                self.last_message = Some(SentMessage::new(&self.topic, payload));
                true
            }
            Err(e) => {
                warn!("Publish to '{}' failed: {}", self.topic, e);
                self.record_failure(e.to_string());
                false
            }
        }
    }

    fn record_failure(&mut self, error: String) {
        self.stats.failed += 1;
        self.stats.last_error = Some(error);
    }
}
