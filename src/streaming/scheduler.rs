//! Publish scheduler
//!
//! ```text
//!            start (send_by_interval = false)
//!   Idle ─────────────────────────────────────► ChangeDetect(latches)
//!    ▲  │                                             │
//!    │  │  start (send_by_interval = true)            │
//!    │  └─────────────────────────► IntervalDriven(timer)
//!    │                                     │          │
//!    └─────── stop / disconnect / device lost ────────┘
//! ```
//!
//! Each streaming variant owns its resources. Going back to `Idle` drops the latches
//! or the timer in the same assignment, so a running timer outside interval mode, or
//! stale latches after a restart, cannot exist.

use crate::controller::snapshot::DeviceSnapshot;
use crate::mapping::{ChangeDetector, ChannelKind, MappingTable};
use crate::streaming::config::StreamingConfig;
use std::fmt;
use std::time::Duration;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Observable scheduler state, without the owned resources
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SchedulerState {
    #[default]
    Idle,
    ChangeDetect,
    IntervalDriven,
}

impl fmt::Display for SchedulerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SchedulerState::Idle => write!(f, "idle"),
            SchedulerState::ChangeDetect => write!(f, "streaming on change"),
            SchedulerState::IntervalDriven => write!(f, "streaming on interval"),
        }
    }
}

/// Fixed-period timer for interval mode
///
/// First fire is one period after arming. Missed ticks are not queued; a late tick
/// pushes the following ones back instead of bursting to catch up.
#[derive(Debug)]
pub struct IntervalTicker {
    interval: Interval,
}

impl IntervalTicker {
    pub fn arm(period: Duration) -> Self {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }

    pub async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

#[derive(Debug, Default)]
pub enum PublishScheduler {
    #[default]
    Idle,
    ChangeDetect(ChangeDetector),
    IntervalDriven(IntervalTicker),
}

impl PublishScheduler {
    /// Enters the streaming variant selected by `config`.
    ///
    /// Latches are sized from `latest` when the device topology is already known.
    pub fn start(config: &StreamingConfig, latest: Option<&DeviceSnapshot>) -> Self {
        if config.send_by_interval {
            PublishScheduler::IntervalDriven(IntervalTicker::arm(config.period()))
        } else {
            PublishScheduler::ChangeDetect(ChangeDetector::for_snapshot(latest))
        }
    }

    pub fn state(&self) -> SchedulerState {
        match self {
            PublishScheduler::Idle => SchedulerState::Idle,
            PublishScheduler::ChangeDetect(_) => SchedulerState::ChangeDetect,
            PublishScheduler::IntervalDriven(_) => SchedulerState::IntervalDriven,
        }
    }

    pub fn is_streaming(&self) -> bool {
        !matches!(self, PublishScheduler::Idle)
    }

    /// Change-mode decision for one frame; always `false` in the other states
    pub fn frame_changed(&self, snapshot: &DeviceSnapshot, mappings: &MappingTable) -> bool {
        match self {
            PublishScheduler::ChangeDetect(detector) => detector.has_changed(snapshot, mappings),
            _ => false,
        }
    }

    /// Latches a frame whose payload went out
    pub fn frame_sent(&mut self, snapshot: &DeviceSnapshot, mappings: &MappingTable) {
        if let PublishScheduler::ChangeDetect(detector) = self {
            detector.commit(snapshot, mappings);
        }
    }

    /// Drops the latch for a channel whose mapping was added or removed
    pub fn forget(&mut self, kind: ChannelKind, index: usize) {
        if let PublishScheduler::ChangeDetect(detector) = self {
            detector.forget(kind, index);
        }
    }

    /// Resolves on the next timer fire; never resolves outside interval mode
    pub async fn next_interval_tick(&mut self) {
        match self {
            PublishScheduler::IntervalDriven(ticker) => ticker.tick().await,
            _ => std::future::pending::<()>().await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_follows_config() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let _guard = rt.enter();

        let change = PublishScheduler::start(&StreamingConfig::on_change(), None);
        assert_eq!(change.state(), SchedulerState::ChangeDetect);

        let interval = PublishScheduler::start(&StreamingConfig::on_interval(20), None);
        assert_eq!(interval.state(), SchedulerState::IntervalDriven);
        match interval {
            PublishScheduler::IntervalDriven(ticker) => {
                assert_eq!(ticker.period(), Duration::from_millis(50))
            }
            other => panic!("unexpected scheduler {:?}", other.state()),
        }
    }

    #[test]
    fn idle_never_reports_changes() {
        let mut mappings = MappingTable::new();
        mappings.set(ChannelKind::Button, 0, "fire");
        let snapshot = DeviceSnapshot::new(vec![true], vec![]);

        let scheduler = PublishScheduler::Idle;
        assert!(!scheduler.frame_changed(&snapshot, &mappings));
        assert!(!scheduler.is_streaming());
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_fires_at_rate_without_catch_up() {
        let mut ticker = IntervalTicker::arm(Duration::from_millis(100));
        let start = Instant::now();

        ticker.tick().await;
        assert_eq!(start.elapsed(), Duration::from_millis(100));

        // A slow consumer misses several periods
        tokio::time::advance(Duration::from_millis(350)).await;
        ticker.tick().await;
        let late = start.elapsed();
        ticker.tick().await;
        assert_eq!(start.elapsed() - late, Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn idle_tick_never_resolves() {
        let mut scheduler = PublishScheduler::Idle;
        let fired = tokio::time::timeout(Duration::from_secs(5), scheduler.next_interval_tick()).await;
        assert!(fired.is_err());
    }
}
