//! Per-channel latches of the last published values
//!
//! Only consulted while the scheduler is in change-detection mode. The detector is
//! owned by that scheduler variant, so stopping streaming drops every latch and the
//! next run starts from scratch.

use crate::controller::snapshot::DeviceSnapshot;
use crate::mapping::deadzone::apply_deadzone;
use crate::mapping::field_mapping::{ChannelKind, MappingTable};
use std::collections::HashMap;
use tracing::debug;

/// Storage for one channel kind's latches
///
/// Dense when the device topology is known up front, sparse otherwise. Indices past
/// the known topology go to the overflow map, so a mapping can name any index.
#[derive(Debug, Clone)]
enum ChannelLatch<T> {
    Dense {
        slots: Vec<Option<T>>,
        overflow: HashMap<usize, T>,
    },
    Sparse(HashMap<usize, T>),
}

impl<T: Copy> ChannelLatch<T> {
    fn with_topology(channel_count: Option<usize>) -> Self {
        match channel_count {
            Some(count) => ChannelLatch::Dense {
                slots: vec![None; count],
                overflow: HashMap::new(),
            },
            None => ChannelLatch::Sparse(HashMap::new()),
        }
    }

    fn get(&self, index: usize) -> Option<T> {
        match self {
            ChannelLatch::Dense { slots, overflow } => match slots.get(index) {
                Some(slot) => *slot,
                None => overflow.get(&index).copied(),
            },
            ChannelLatch::Sparse(map) => map.get(&index).copied(),
        }
    }

    fn set(&mut self, index: usize, value: T) {
        match self {
            ChannelLatch::Dense { slots, overflow } => match slots.get_mut(index) {
                Some(slot) => *slot = Some(value),
                None => {
                    overflow.insert(index, value);
                }
            },
            ChannelLatch::Sparse(map) => {
                map.insert(index, value);
            }
        }
    }

    fn forget(&mut self, index: usize) {
        match self {
            ChannelLatch::Dense { slots, overflow } => match slots.get_mut(index) {
                Some(slot) => *slot = None,
                None => {
                    overflow.remove(&index);
                }
            },
            ChannelLatch::Sparse(map) => {
                map.remove(&index);
            }
        }
    }

    fn is_dense(&self) -> bool {
        matches!(self, ChannelLatch::Dense { .. })
    }
}

/// Decides whether a snapshot differs from what was last published
#[derive(Debug, Clone)]
pub struct ChangeDetector {
    buttons: ChannelLatch<bool>,
    axes: ChannelLatch<f64>,
}

impl Default for ChangeDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeDetector {
    /// Sparse latches for unknown device topology
    pub fn new() -> Self {
        Self {
            buttons: ChannelLatch::with_topology(None),
            axes: ChannelLatch::with_topology(None),
        }
    }

    /// Dense latches sized to the device's channel counts
    pub fn with_topology(button_count: usize, axis_count: usize) -> Self {
        Self {
            buttons: ChannelLatch::with_topology(Some(button_count)),
            axes: ChannelLatch::with_topology(Some(axis_count)),
        }
    }

    /// Sized from a snapshot when one is available
    pub fn for_snapshot(snapshot: Option<&DeviceSnapshot>) -> Self {
        match snapshot {
            Some(s) => Self::with_topology(s.buttons.len(), s.axes.len()),
            None => Self::new(),
        }
    }

    pub fn is_dense(&self) -> bool {
        self.buttons.is_dense() && self.axes.is_dense()
    }

    /// Returns `true` if any mapped channel differs from its latch.
    ///
    /// A channel without a latch counts as changed. Axis comparison uses the
    /// deadzone-filtered value before rounding. Latches are left alone; call
    /// [`commit`](Self::commit) once the payload has actually been sent.
    pub fn has_changed(&self, snapshot: &DeviceSnapshot, mappings: &MappingTable) -> bool {
        mappings.iter().any(|mapping| match mapping.kind {
            ChannelKind::Button => {
                self.buttons.get(mapping.index) != Some(snapshot.button(mapping.index))
            }
            ChannelKind::Axis => {
                let current = apply_deadzone(snapshot.axis(mapping.index));
                self.axes.get(mapping.index) != Some(current)
            }
        })
    }

    /// Latches every mapped channel to its value in `snapshot`
    pub fn commit(&mut self, snapshot: &DeviceSnapshot, mappings: &MappingTable) {
        for mapping in mappings {
            match mapping.kind {
                ChannelKind::Button => self
                    .buttons
                    .set(mapping.index, snapshot.button(mapping.index)),
                ChannelKind::Axis => self
                    .axes
                    .set(mapping.index, apply_deadzone(snapshot.axis(mapping.index))),
            }
        }
        debug!("Latched {} mapped channels", mappings.len());
    }

    /// Drops the latch for one channel so its next observation counts as first
    pub fn forget(&mut self, kind: ChannelKind, index: usize) {
        match kind {
            ChannelKind::Button => self.buttons.forget(index),
            ChannelKind::Axis => self.axes.forget(index),
        }
    }
}
