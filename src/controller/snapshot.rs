//! Device snapshots and the device-source seam

use std::fmt;
use std::time::Instant;

/// Opaque identifier of a connected input device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(pub usize);

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Enumeration entry for a detected device
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub id: DeviceId,
    pub name: String,
    pub button_count: usize,
    pub axis_count: usize,
}

impl fmt::Display for DeviceInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ({} buttons, {} axes)",
            self.id, self.name, self.button_count, self.axis_count
        )
    }
}

/// One complete read of a device's channels
///
/// Buttons are pressed states, axes are in `[-1.0, 1.0]`. Channel order is fixed
/// by the source, so mapping indices stay stable between reads.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceSnapshot {
    pub buttons: Vec<bool>,
    pub axes: Vec<f64>,
    pub timestamp: Instant,
}

impl DeviceSnapshot {
    pub fn new(buttons: Vec<bool>, axes: Vec<f64>) -> Self {
        Self {
            buttons,
            axes,
            timestamp: Instant::now(),
        }
    }

    /// Out-of-range indices read as not pressed
    pub fn button(&self, index: usize) -> bool {
        self.buttons.get(index).copied().unwrap_or(false)
    }

    /// Out-of-range indices read as centred
    pub fn axis(&self, index: usize) -> f64 {
        self.axes.get(index).copied().unwrap_or(0.0)
    }
}

/// Pull-style access to device state
///
/// Implementations are polled once per frame by the session runner.
pub trait DeviceSource {
    /// Currently connected devices
    fn devices(&mut self) -> Vec<DeviceInfo>;

    /// Latest state of `id`, or `None` if the device is gone
    fn snapshot(&mut self, id: DeviceId) -> Option<DeviceSnapshot>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_range_reads_default() {
        let snapshot = DeviceSnapshot::new(vec![true], vec![0.5, -0.5, 0.0, 0.25]);
        assert!(snapshot.button(0));
        assert!(!snapshot.button(7));
        assert_eq!(snapshot.axis(1), -0.5);
        assert_eq!(snapshot.axis(99), 0.0);
    }
}
