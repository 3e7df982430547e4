use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const MIN_SEND_HZ: u32 = 1;
pub const MAX_SEND_HZ: u32 = 100;

/// Publish timing chosen before streaming starts
///
/// `send_hz` only matters when `send_by_interval` is set. The session rejects
/// changes while streaming.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamingConfig {
    pub send_by_interval: bool,
    pub send_hz: u32,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            send_by_interval: false,
            send_hz: 10,
        }
    }
}

impl StreamingConfig {
    /// Change-driven publishing
    pub fn on_change() -> Self {
        Self {
            send_by_interval: false,
            ..Self::default()
        }
    }

    /// Fixed-rate publishing; `send_hz` is clamped to `1..=100`
    pub fn on_interval(send_hz: u32) -> Self {
        Self {
            send_by_interval: true,
            send_hz,
        }
        .clamped()
    }

    pub fn clamped(self) -> Self {
        Self {
            send_hz: self.send_hz.clamp(MIN_SEND_HZ, MAX_SEND_HZ),
            ..self
        }
    }

    /// Timer period for interval mode
    pub fn period(&self) -> Duration {
        let hz = self.send_hz.clamp(MIN_SEND_HZ, MAX_SEND_HZ);
        Duration::from_micros(1_000_000 / u64::from(hz))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_hz_is_clamped_not_rejected() {
        assert_eq!(StreamingConfig::on_interval(0).send_hz, 1);
        assert_eq!(StreamingConfig::on_interval(500).send_hz, 100);
        assert_eq!(StreamingConfig::on_interval(30).send_hz, 30);
    }

    #[test]
    fn period_follows_rate() {
        assert_eq!(StreamingConfig::on_interval(10).period(), Duration::from_millis(100));
        assert_eq!(StreamingConfig::on_interval(100).period(), Duration::from_millis(10));
        assert_eq!(StreamingConfig::on_interval(1).period(), Duration::from_secs(1));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let config: StreamingConfig = toml::from_str("send_by_interval = true").unwrap();
        assert_eq!(config, StreamingConfig { send_by_interval: true, send_hz: 10 });
    }
}
