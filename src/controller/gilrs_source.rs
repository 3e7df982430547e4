//! gilrs-backed device source
//!
//! Reads connected gamepads in the standard gamepad layout so that channel indices
//! are the same for every controller gilrs recognises.

use crate::controller::snapshot::{DeviceId, DeviceInfo, DeviceSnapshot, DeviceSource};
use gilrs::{Axis, Button, Event, EventType, Gamepad, GamepadId, Gilrs};
use tracing::{debug, error, info, warn};

/// Button order of the standard layout; the position is the channel index
pub const STANDARD_BUTTONS: [Button; 17] = [
    Button::South,
    Button::East,
    Button::West,
    Button::North,
    Button::LeftTrigger,
    Button::RightTrigger,
    Button::LeftTrigger2,
    Button::RightTrigger2,
    Button::Select,
    Button::Start,
    Button::LeftThumb,
    Button::RightThumb,
    Button::DPadUp,
    Button::DPadDown,
    Button::DPadLeft,
    Button::DPadRight,
    Button::Mode,
];

/// Axis order of the standard layout
pub const STANDARD_AXES: [Axis; 4] = [
    Axis::LeftStickX,
    Axis::LeftStickY,
    Axis::RightStickX,
    Axis::RightStickY,
];

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to initialize gilrs: {0}")]
    InitializationError(String),
}

pub struct GilrsSource {
    gilrs: Gilrs,
}

impl GilrsSource {
    pub fn new() -> Result<Self, SourceError> {
        info!("Initializing gilrs controller interface");
        let gilrs = match Gilrs::new() {
            Ok(g) => {
                info!("Successfully initialized gilrs");
                g
            }
            Err(e) => {
                error!("Failed to initialize gilrs: {}", e);
                return Err(SourceError::InitializationError(e.to_string()));
            }
        };
        Ok(Self { gilrs })
    }

    /// Picks a device whose name contains `preferred_name` (case-insensitive),
    /// otherwise the first connected gamepad
    pub fn select(&mut self, preferred_name: Option<&str>) -> Option<DeviceInfo> {
        let devices = self.devices();
        if devices.is_empty() {
            warn!("No gamepad connected");
            return None;
        }

        info!("Found {} gamepads:", devices.len());
        for (idx, device) in devices.iter().enumerate() {
            info!("  [{}] {}", idx, device);
        }

        let preferred = preferred_name.map(str::to_lowercase);
        let chosen = preferred
            .as_deref()
            .and_then(|wanted| {
                devices
                    .iter()
                    .find(|d| d.name.to_lowercase().contains(wanted))
            })
            .or_else(|| {
                if let Some(wanted) = preferred_name {
                    warn!("No gamepad matching '{}', using the first one", wanted);
                }
                devices.first()
            })
            .cloned();

        if let Some(device) = &chosen {
            info!("Selected gamepad: {}", device);
        }
        chosen
    }

    /// Drains pending events so gamepad state is current
    fn pump_events(&mut self) {
        while let Some(Event { id, event, .. }) = self.gilrs.next_event() {
            match event {
                EventType::Connected => info!("Controller connected: {}", id),
                EventType::Disconnected => warn!("Controller disconnected: {}", id),
                _ => {}
            }
        }
    }

    fn find(&self, id: DeviceId) -> Option<Gamepad<'_>> {
        self.gilrs
            .gamepads()
            .find(|(gamepad_id, _)| usize::from(*gamepad_id) == id.0)
            .map(|(_, gamepad)| gamepad)
    }
}

/// Non-finite readings are treated as centred
fn axis_value(raw: f32) -> f64 {
    let value = f64::from(raw);
    if value.is_finite() {
        value.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

fn device_info(id: GamepadId, gamepad: &Gamepad<'_>) -> DeviceInfo {
    DeviceInfo {
        id: DeviceId(usize::from(id)),
        name: gamepad.name().to_string(),
        button_count: STANDARD_BUTTONS.len(),
        axis_count: STANDARD_AXES.len(),
    }
}

impl DeviceSource for GilrsSource {
    fn devices(&mut self) -> Vec<DeviceInfo> {
        self.pump_events();
        self.gilrs
            .gamepads()
            .map(|(id, gamepad)| device_info(id, &gamepad))
            .collect()
    }

    fn snapshot(&mut self, id: DeviceId) -> Option<DeviceSnapshot> {
        self.pump_events();

        let gamepad = match self.find(id) {
            Some(g) if g.is_connected() => g,
            _ => {
                debug!("Gamepad {} not present", id);
                return None;
            }
        };

        let buttons = STANDARD_BUTTONS
            .iter()
            .map(|button| gamepad.is_pressed(*button))
            .collect();
        let axes = STANDARD_AXES
            .iter()
            .map(|axis| axis_value(gamepad.value(*axis)))
            .collect();

        Some(DeviceSnapshot::new(buttons, axes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_values_are_clamped() {
        assert_eq!(axis_value(0.25), 0.25);
        assert_eq!(axis_value(1.5), 1.0);
        assert_eq!(axis_value(-3.0), -1.0);
    }

    #[test]
    fn garbage_axis_reads_as_centred() {
        assert_eq!(axis_value(f32::NAN), 0.0);
        assert_eq!(axis_value(f32::INFINITY), 0.0);
        assert_eq!(axis_value(f32::NEG_INFINITY), 0.0);
    }
}
