//! Payload builder: snapshot × mapping table → flat JSON record

use crate::controller::snapshot::DeviceSnapshot;
use crate::mapping::deadzone::apply_deadzone;
use crate::mapping::field_mapping::{ChannelKind, MappingTable};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::fmt;

/// A single field value on the wire
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PayloadValue {
    /// Serialized as integer `0` / `1`
    Button(bool),
    /// Already filtered and rounded to two decimals
    Axis(f64),
}

impl Serialize for PayloadValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            PayloadValue::Button(pressed) => serializer.serialize_u8(u8::from(*pressed)),
            PayloadValue::Axis(value) => serializer.serialize_f64(*value),
        }
    }
}

impl fmt::Display for PayloadValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PayloadValue::Button(pressed) => write!(f, "{}", u8::from(*pressed)),
            PayloadValue::Axis(value) => write!(f, "{:.2}", value),
        }
    }
}

/// Named field set for one publish, in mapping order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Payload {
    fields: Vec<(String, PayloadValue)>,
}

impl Payload {
    /// Projects `snapshot` through `mappings`.
    ///
    /// Total: out-of-range channels degrade to `0` and never fail.
    pub fn build(snapshot: &DeviceSnapshot, mappings: &MappingTable) -> Self {
        let mut payload = Payload::default();
        for mapping in mappings {
            let value = match mapping.kind {
                ChannelKind::Button => PayloadValue::Button(snapshot.button(mapping.index)),
                ChannelKind::Axis => {
                    PayloadValue::Axis(round_2dp(apply_deadzone(snapshot.axis(mapping.index))))
                }
            };
            payload.insert(&mapping.field_name, value);
        }
        payload
    }

    /// Inserts a field; an existing key keeps its position and takes the new value
    pub fn insert(&mut self, field: &str, value: PayloadValue) {
        match self.fields.iter_mut().find(|(name, _)| name == field) {
            Some((_, existing)) => *existing = value,
            None => self.fields.push((field.to_string(), value)),
        }
    }

    pub fn get(&self, field: &str) -> Option<PayloadValue> {
        self.fields
            .iter()
            .find(|(name, _)| name == field)
            .map(|(_, value)| *value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, PayloadValue)> {
        self.fields.iter().map(|(name, value)| (name.as_str(), *value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (name, value) in &self.fields {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (name, value)) in self.fields.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", name, value)?;
        }
        write!(f, "}}")
    }
}

/// Round half away from zero to two decimal places
fn round_2dp(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(entries: &[(ChannelKind, usize, &str)]) -> MappingTable {
        let mut table = MappingTable::new();
        for (kind, index, name) in entries {
            table.set(*kind, *index, name);
        }
        table
    }

    #[test]
    fn button_and_axis_scenario() {
        let mappings = table(&[(ChannelKind::Button, 0, "fire"), (ChannelKind::Axis, 0, "turn")]);
        let snapshot = DeviceSnapshot::new(vec![true], vec![-0.32]);

        let payload = Payload::build(&snapshot, &mappings);
        assert_eq!(payload.to_json().unwrap(), r#"{"fire":1,"turn":-0.32}"#);
    }

    #[test]
    fn unpressed_button_is_zero() {
        let mappings = table(&[(ChannelKind::Button, 0, "fire")]);
        let snapshot = DeviceSnapshot::new(vec![false], vec![]);
        assert_eq!(Payload::build(&snapshot, &mappings).to_json().unwrap(), r#"{"fire":0}"#);
    }

    #[test]
    fn out_of_range_axis_is_zero() {
        let mappings = table(&[(ChannelKind::Axis, 99, "far"), (ChannelKind::Button, 40, "b")]);
        let snapshot = DeviceSnapshot::new(vec![true; 4], vec![0.9, 0.9, 0.9, 0.9]);

        let payload = Payload::build(&snapshot, &mappings);
        assert_eq!(payload.get("far"), Some(PayloadValue::Axis(0.0)));
        assert_eq!(payload.get("b"), Some(PayloadValue::Button(false)));
    }

    #[test]
    fn axis_rounding_and_deadzone() {
        let mappings = table(&[
            (ChannelKind::Axis, 0, "a"),
            (ChannelKind::Axis, 1, "b"),
            (ChannelKind::Axis, 2, "c"),
            (ChannelKind::Axis, 3, "d"),
        ]);
        let snapshot = DeviceSnapshot::new(vec![], vec![0.123, 0.124, 0.04, -0.675]);

        let payload = Payload::build(&snapshot, &mappings);
        assert_eq!(payload.get("a"), Some(PayloadValue::Axis(0.12)));
        assert_eq!(payload.get("b"), Some(PayloadValue::Axis(0.12)));
        assert_eq!(payload.get("c"), Some(PayloadValue::Axis(0.0)));
        assert_eq!(payload.get("d"), Some(PayloadValue::Axis(-0.68)));
    }

    #[test]
    fn shared_field_name_last_mapping_wins_in_first_position() {
        let mappings = table(&[
            (ChannelKind::Button, 0, "x"),
            (ChannelKind::Axis, 0, "y"),
            (ChannelKind::Button, 1, "x"),
        ]);
        let snapshot = DeviceSnapshot::new(vec![false, true], vec![0.5]);

        let payload = Payload::build(&snapshot, &mappings);
        assert_eq!(payload.len(), 2);
        assert_eq!(payload.to_json().unwrap(), r#"{"x":1,"y":0.5}"#);
    }

    #[test]
    fn empty_table_builds_empty_object() {
        let payload = Payload::build(&DeviceSnapshot::new(vec![true], vec![1.0]), &MappingTable::new());
        assert!(payload.is_empty());
        assert_eq!(payload.to_json().unwrap(), "{}");
    }

    #[test]
    fn display_uses_two_decimals() {
        let mut payload = Payload::default();
        payload.insert("fire", PayloadValue::Button(true));
        payload.insert("turn", PayloadValue::Axis(0.5));
        assert_eq!(payload.to_string(), "{fire: 1, turn: 0.50}");
    }
}
