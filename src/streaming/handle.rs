//! Session runner and its handle
//!
//! The runner is the only place the session is touched. Three wake sources are
//! serialized through one `select!`:
//!
//! ```text
//! frame interval (≈60 Hz) ──► source.snapshot(device) ──► session.on_frame
//! scheduler timer         ─────────────────────────────► session.on_interval_tick
//! SessionHandle commands  ──[mpsc]─────────────────────► session.<command>
//!                                                              │
//!                                   watch::Sender<SessionStatus> ◄┘
//! ```
//!
//! The handle is cheap to clone and can be used from any task.

use crate::controller::snapshot::{DeviceId, DeviceSource};
use crate::mapping::{ChannelKind, MappingTable};
use crate::mqtt::message::SentMessage;
use crate::mqtt::transport::Transport;
use crate::streaming::config::StreamingConfig;
use crate::streaming::scheduler::SchedulerState;
use crate::streaming::session::{PublishStats, SessionError, StreamingSession};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Snapshot of everything a presentation layer shows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionStatus {
    pub state: SchedulerState,
    pub connected: bool,
    pub device: Option<DeviceId>,
    pub mappings: MappingTable,
    pub config: StreamingConfig,
    pub last_message: Option<SentMessage>,
    pub stats: PublishStats,
}

impl SessionStatus {
    fn of<T: Transport>(session: &StreamingSession<T>) -> Self {
        Self {
            state: session.state(),
            connected: session.is_connected(),
            device: session.device(),
            mappings: session.mappings().clone(),
            config: session.config(),
            last_message: session.last_message().cloned(),
            stats: session.stats().clone(),
        }
    }
}

pub enum SessionCommand<T> {
    Start(oneshot::Sender<Result<(), SessionError>>),
    Stop,
    MapChannel {
        kind: ChannelKind,
        index: usize,
        field_name: String,
    },
    UnmapChannel {
        kind: ChannelKind,
        index: usize,
    },
    SetConfig(StreamingConfig, oneshot::Sender<Result<(), SessionError>>),
    SelectDevice(Option<DeviceId>),
    Attach(T),
    Disconnect,
}

pub struct SessionHandle<T> {
    commands: mpsc::Sender<SessionCommand<T>>,
    status: watch::Receiver<SessionStatus>,
}

impl<T> Clone for SessionHandle<T> {
    fn clone(&self) -> Self {
        Self {
            commands: self.commands.clone(),
            status: self.status.clone(),
        }
    }
}

impl<T: Transport> SessionHandle<T> {
    /// Wraps a session; the returned runner must be driven with [`SessionRunner::run`]
    pub fn new(
        session: StreamingSession<T>,
        sample_interval: Duration,
    ) -> (Self, SessionRunner<T>) {
        let (command_tx, command_rx) = mpsc::channel(100);
        let (status_tx, status_rx) = watch::channel(SessionStatus::of(&session));

        let handle = Self {
            commands: command_tx,
            status: status_rx,
        };
        let runner = SessionRunner {
            session,
            commands: command_rx,
            status: status_tx,
            sample_interval: sample_interval.max(Duration::from_millis(1)),
        };
        (handle, runner)
    }

    pub async fn start(&self) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::Start(reply_tx)).await?;
        reply_rx.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn stop(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Stop).await
    }

    pub async fn map_channel(
        &self,
        kind: ChannelKind,
        index: usize,
        field_name: impl Into<String>,
    ) -> Result<(), SessionError> {
        self.send(SessionCommand::MapChannel {
            kind,
            index,
            field_name: field_name.into(),
        })
        .await
    }

    pub async fn unmap_channel(&self, kind: ChannelKind, index: usize) -> Result<(), SessionError> {
        self.send(SessionCommand::UnmapChannel { kind, index }).await
    }

    pub async fn set_config(&self, config: StreamingConfig) -> Result<(), SessionError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(SessionCommand::SetConfig(config, reply_tx)).await?;
        reply_rx.await.map_err(|_| SessionError::Closed)?
    }

    pub async fn select_device(&self, device: Option<DeviceId>) -> Result<(), SessionError> {
        self.send(SessionCommand::SelectDevice(device)).await
    }

    /// Hands a connected transport to the session
    pub async fn attach(&self, transport: T) -> Result<(), SessionError> {
        self.send(SessionCommand::Attach(transport)).await
    }

    pub async fn disconnect(&self) -> Result<(), SessionError> {
        self.send(SessionCommand::Disconnect).await
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    async fn send(&self, command: SessionCommand<T>) -> Result<(), SessionError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| SessionError::Closed)
    }
}

pub struct SessionRunner<T: Transport> {
    session: StreamingSession<T>,
    commands: mpsc::Receiver<SessionCommand<T>>,
    status: watch::Sender<SessionStatus>,
    sample_interval: Duration,
}

impl<T: Transport> SessionRunner<T> {
    /// Runs until `shutdown` is cancelled or every handle is dropped.
    ///
    /// Streaming is stopped on exit; the session is handed back so the caller can
    /// close its transport.
    pub async fn run<D: DeviceSource>(
        mut self,
        mut source: D,
        shutdown: CancellationToken,
    ) -> StreamingSession<T> {
        info!(
            "Session runner started, sampling every {} ms",
            self.sample_interval.as_millis()
        );
        let mut frames = tokio::time::interval(self.sample_interval);
        frames.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    debug!("Session runner cancelled");
                    break;
                }
                _ = frames.tick() => {
                    if let Some(device) = self.session.device() {
                        let snapshot = source.snapshot(device);
                        self.session.on_frame(snapshot);
                    }
                }
                _ = self.session.next_interval_tick() => {
                    self.session.on_interval_tick();
                }
                command = self.commands.recv() => match command {
                    Some(command) => self.apply(command),
                    None => {
                        debug!("All session handles dropped");
                        break;
                    }
                }
            }
            self.publish_status();
        }

        self.session.stop_streaming();
        self.publish_status();
        info!("Session runner stopped");
        self.session
    }

    fn apply(&mut self, command: SessionCommand<T>) {
        match command {
            SessionCommand::Start(reply) => {
                let result = self.session.start_streaming();
                if let Err(e) = &result {
                    warn!("Cannot start streaming: {}", e);
                }
                let _ = reply.send(result);
            }
            SessionCommand::Stop => self.session.stop_streaming(),
            SessionCommand::MapChannel {
                kind,
                index,
                field_name,
            } => {
                self.session.map_channel(kind, index, &field_name);
            }
            SessionCommand::UnmapChannel { kind, index } => {
                self.session.unmap_channel(kind, index);
            }
            SessionCommand::SetConfig(config, reply) => {
                let _ = reply.send(self.session.set_config(config));
            }
            SessionCommand::SelectDevice(device) => self.session.select_device(device),
            SessionCommand::Attach(transport) => self.session.attach_transport(transport),
            SessionCommand::Disconnect => self.session.disconnect(),
        }
    }

    fn publish_status(&self) {
        let next = SessionStatus::of(&self.session);
        self.status.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
