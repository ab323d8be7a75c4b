//! Ordered entries for one (module, section) pair.

use serde_json::Value;

use crate::metrics::entry::{ConstructionError, MetricEntry, TileSpec};
use crate::parser::schema::Section;

/// Whether a collection holds graph-based or tile-based entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionKind {
    GraphBased,
    TileBased,
}

impl CollectionKind {
    pub fn for_section(section: Section) -> Self {
        match section {
            Section::Graphs => CollectionKind::GraphBased,
            Section::Tiles => CollectionKind::TileBased,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            CollectionKind::GraphBased => "graph-based",
            CollectionKind::TileBased => "tile-based",
        }
    }
}

/// Entries in document order. Order decides precedence during resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricCollection {
    kind: CollectionKind,
    entries: Vec<MetricEntry>,
}

impl MetricCollection {
    pub fn new(kind: CollectionKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    /// Append an entry; its shape must match the collection kind.
    pub fn push(&mut self, entry: MetricEntry) -> Result<(), ConstructionError> {
        let entry_kind = if entry.is_graph_based() {
            CollectionKind::GraphBased
        } else {
            CollectionKind::TileBased
        };
        if entry_kind != self.kind {
            return Err(ConstructionError::KindMismatch {
                section: match entry_kind {
                    CollectionKind::GraphBased => Section::Graphs,
                    CollectionKind::TileBased => Section::Tiles,
                },
                collection: self.kind.name(),
            });
        }
        self.entries.push(entry);
        Ok(())
    }

    pub fn kind(&self) -> CollectionKind {
        self.kind
    }

    pub fn is_graph_based(&self) -> bool {
        self.kind == CollectionKind::GraphBased
    }

    pub fn is_tile_based(&self) -> bool {
        self.kind == CollectionKind::TileBased
    }

    pub fn entries(&self) -> &[MetricEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// First entry carrying the all-tiles marker.
    pub fn first_all_tiles(&self) -> Option<&MetricEntry> {
        self.entries.iter().find(|e| e.is_all_tiles())
    }

    /// First graph-based entry for every graph and every entity.
    pub fn first_all_graphs(&self) -> Option<&MetricEntry> {
        self.entries.iter().find(|e| e.is_all_graphs())
    }

    pub fn ranges(&self) -> impl Iterator<Item = &MetricEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.tile_spec(), Some(TileSpec::Range { .. })))
    }

    pub fn singles(&self) -> impl Iterator<Item = &MetricEntry> {
        self.entries
            .iter()
            .filter(|e| matches!(e.tile_spec(), Some(TileSpec::Single { .. })))
    }

    pub fn to_json(&self) -> Value {
        Value::Array(self.entries.iter().map(MetricEntry::to_json).collect())
    }
}
