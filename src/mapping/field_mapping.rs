//! Field mapping table: device channel → application field name

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

/// Kind of device channel a mapping refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelKind {
    Button,
    Axis,
}

impl fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelKind::Button => write!(f, "button"),
            ChannelKind::Axis => write!(f, "axis"),
        }
    }
}

/// One association from a device channel to a payload field
///
/// Identity is the `(kind, index)` pair. Two mappings may share a `field_name`;
/// the later one in table order then wins in the payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldMapping {
    pub kind: ChannelKind,
    pub index: usize,
    pub field_name: String,
}

impl FieldMapping {
    /// Returns `None` if the field name is empty after trimming
    pub fn new(kind: ChannelKind, index: usize, field_name: &str) -> Option<Self> {
        let field_name = field_name.trim();
        if field_name.is_empty() {
            return None;
        }
        Some(Self {
            kind,
            index,
            field_name: field_name.to_string(),
        })
    }
}

impl fmt::Display for FieldMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} → {}", self.kind, self.index, self.field_name)
    }
}

/// Result of [`MappingTable::set`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MappingChange {
    /// A new `(kind, index)` pair was added
    Added,
    /// An existing pair got a new field name
    Renamed,
    /// An empty field name cleared an existing pair
    Removed,
    /// Empty field name for an unmapped pair, or the same name again
    Unchanged,
}

/// Ordered mapping table, unique per `(kind, index)`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MappingTable {
    entries: Vec<FieldMapping>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from arbitrary entries, applying the same rules as [`set`](Self::set)
    pub fn from_entries(entries: impl IntoIterator<Item = FieldMapping>) -> Self {
        let mut table = Self::new();
        for entry in entries {
            table.set(entry.kind, entry.index, &entry.field_name);
        }
        table
    }

    /// Maps a channel to a field name.
    ///
    /// An existing pair is replaced in place, keeping its position. An empty or
    /// whitespace-only name removes the pair if it is mapped and is otherwise a no-op.
    pub fn set(&mut self, kind: ChannelKind, index: usize, field_name: &str) -> MappingChange {
        let position = self.position(kind, index);

        match (FieldMapping::new(kind, index, field_name), position) {
            (Some(mapping), Some(pos)) => {
                if self.entries[pos] == mapping {
                    return MappingChange::Unchanged;
                }
                debug!("Renaming mapping: {} (was {})", mapping, self.entries[pos].field_name);
                self.entries[pos] = mapping;
                MappingChange::Renamed
            }
            (Some(mapping), None) => {
                debug!("Adding mapping: {}", mapping);
                self.entries.push(mapping);
                MappingChange::Added
            }
            (None, Some(pos)) => {
                let removed = self.entries.remove(pos);
                debug!("Cleared mapping: {}", removed);
                MappingChange::Removed
            }
            (None, None) => {
                debug!("Ignoring empty field name for unmapped {} {}", kind, index);
                MappingChange::Unchanged
            }
        }
    }

    /// Removes the mapping for a channel, returning it if present
    pub fn remove(&mut self, kind: ChannelKind, index: usize) -> Option<FieldMapping> {
        let pos = self.position(kind, index)?;
        Some(self.entries.remove(pos))
    }

    pub fn get(&self, kind: ChannelKind, index: usize) -> Option<&FieldMapping> {
        self.position(kind, index).map(|pos| &self.entries[pos])
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldMapping> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    fn position(&self, kind: ChannelKind, index: usize) -> Option<usize> {
        self.entries
            .iter()
            .position(|m| m.kind == kind && m.index == index)
    }
}

impl<'a> IntoIterator for &'a MappingTable {
    type Item = &'a FieldMapping;
    type IntoIter = std::slice::Iter<'a, FieldMapping>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_pair_keeps_one_entry_equal_to_the_second() {
        let mut table = MappingTable::new();
        table.set(ChannelKind::Button, 0, "fire");
        table.set(ChannelKind::Button, 0, "jump");

        assert_eq!(table.len(), 1);
        assert_eq!(
            table.get(ChannelKind::Button, 0).map(|m| m.field_name.as_str()),
            Some("jump")
        );
    }

    #[test]
    fn replacement_keeps_table_position() {
        let mut table = MappingTable::new();
        table.set(ChannelKind::Button, 0, "a");
        table.set(ChannelKind::Axis, 0, "b");
        assert_eq!(table.set(ChannelKind::Button, 0, "c"), MappingChange::Renamed);

        let names: Vec<_> = table.iter().map(|m| m.field_name.as_str()).collect();
        assert_eq!(names, vec!["c", "b"]);
    }

    #[test]
    fn button_and_axis_with_same_index_are_distinct() {
        let mut table = MappingTable::new();
        table.set(ChannelKind::Button, 3, "x");
        table.set(ChannelKind::Axis, 3, "x");
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn empty_name_is_noop_for_unmapped_pair() {
        let mut table = MappingTable::new();
        assert_eq!(table.set(ChannelKind::Axis, 1, "   "), MappingChange::Unchanged);
        assert!(table.is_empty());
    }

    #[test]
    fn empty_name_clears_mapped_pair() {
        let mut table = MappingTable::new();
        table.set(ChannelKind::Axis, 1, "turn");
        assert_eq!(table.set(ChannelKind::Axis, 1, ""), MappingChange::Removed);
        assert!(table.get(ChannelKind::Axis, 1).is_none());
    }

    #[test]
    fn field_names_are_trimmed() {
        let mut table = MappingTable::new();
        table.set(ChannelKind::Button, 2, "  boost ");
        assert_eq!(table.get(ChannelKind::Button, 2).unwrap().field_name, "boost");
    }

    #[test]
    fn from_entries_collapses_duplicates() {
        let table = MappingTable::from_entries(vec![
            FieldMapping {
                kind: ChannelKind::Button,
                index: 0,
                field_name: "fire".into(),
            },
            FieldMapping {
                kind: ChannelKind::Button,
                index: 0,
                field_name: "shoot".into(),
            },
            FieldMapping {
                kind: ChannelKind::Axis,
                index: 0,
                field_name: "".into(),
            },
        ]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(ChannelKind::Button, 0).unwrap().field_name, "shoot");
    }

    #[test]
    fn table_round_trips_through_toml() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            mappings: MappingTable,
        }

        let mut table = MappingTable::new();
        table.set(ChannelKind::Button, 0, "fire");
        table.set(ChannelKind::Axis, 2, "turn");

        let text = toml::to_string(&Wrapper { mappings: table.clone() }).unwrap();
        assert!(text.contains("kind = \"axis\""));
        let back: Wrapper = toml::from_str(&text).unwrap();
        assert_eq!(back.mappings, table);
    }
}
