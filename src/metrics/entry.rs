//! One user monitoring directive.
//!
//! Entries come in two shapes:
//!
//! ```text
//! GraphBased  { graph, entity, metric, channels?, bytes? }
//!               "all" or a (hierarchical) name for graph and entity
//!
//! TileBased   { spec, metric, channels?, bytes? }
//!               spec = AllTiles | Single { col, row } | Range { start, end }
//! ```
//!
//! Entries are built from already-validated document subtrees by
//! [`MetricEntry::from_json`]. A `(section, module)` pair with no entry shape
//! is a [`ConstructionError`]: it means the caller wired the wrong module
//! into the factory, not that the user wrote something odd.

use std::fmt;

use serde_json::{json, Map, Value};
use smallvec::SmallVec;
use thiserror::Error;

use crate::parser::schema::{as_bool, as_coordinate, as_int, as_string, Section};
use crate::plugin::ModuleKey;
use crate::topology::ALL;

/// Up to two stream channels.
pub type Channels = SmallVec<[u8; 2]>;

/// Programmer-level failure while building entries or collections.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConstructionError {
    #[error("no metric entry shape for module '{module}' in section '{section}'")]
    UnsupportedType { section: Section, module: ModuleKey },

    #[error("malformed {section} entry for module '{module}': {reason}")]
    Malformed {
        section: Section,
        module: ModuleKey,
        reason: String,
    },

    #[error("{section}-based entry cannot be added to a {collection} collection")]
    KindMismatch {
        section: Section,
        collection: &'static str,
    },
}

/// Where an entry came from: section plus module key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MetricType {
    pub section: Section,
    pub module: ModuleKey,
}

impl MetricType {
    pub fn new(section: Section, module: ModuleKey) -> Self {
        Self { section, module }
    }
}

/// Design object a graph-based entry names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Kernel,
    Buffer,
    Port,
}

impl EntityKind {
    /// Field name used in the settings document.
    pub const fn field_name(&self) -> &'static str {
        match self {
            EntityKind::Kernel => "kernel",
            EntityKind::Buffer => "buffer",
            EntityKind::Port => "port",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.field_name())
    }
}

/// Which tiles a tile-based entry addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileSpec {
    AllTiles,
    /// Logical coordinate; row offsets are applied during expansion.
    Single { col: u8, row: u8 },
    /// Inclusive logical `(col, row)` corners.
    Range { start: (u8, u8), end: (u8, u8) },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetricEntry {
    GraphBased {
        graph: String,
        entity_kind: EntityKind,
        entity: String,
        metric: String,
        channels: Option<Channels>,
        bytes: Option<String>,
    },
    TileBased {
        spec: TileSpec,
        metric: String,
        channels: Option<Channels>,
        bytes: Option<String>,
    },
}

impl MetricEntry {
    /// Build an entry from a validated document subtree.
    pub fn from_json(ty: MetricType, value: &Value) -> Result<Self, ConstructionError> {
        let malformed = |reason: &str| ConstructionError::Malformed {
            section: ty.section,
            module: ty.module,
            reason: reason.to_string(),
        };

        let metric = value
            .get("metric")
            .and_then(as_string)
            .ok_or_else(|| malformed("missing 'metric'"))?;
        let streams = ty.module.has_stream_fields();
        let channels = match value.get("channels").filter(|_| streams) {
            Some(v) => Some(parse_channels(v).ok_or_else(|| malformed("bad 'channels'"))?),
            None => None,
        };
        let bytes = value.get("bytes").filter(|_| streams).and_then(as_string);

        match ty.section {
            Section::Graphs => {
                let entity_kind = ty.module.entity_kind().ok_or(ConstructionError::UnsupportedType {
                    section: ty.section,
                    module: ty.module,
                })?;
                let text = |key: &str| {
                    value
                        .get(key)
                        .and_then(as_string)
                        .unwrap_or_else(|| ALL.to_string())
                };
                Ok(MetricEntry::GraphBased {
                    graph: text("graph"),
                    entity_kind,
                    entity: text(entity_kind.field_name()),
                    metric,
                    channels,
                    bytes,
                })
            }
            Section::Tiles => {
                let spec = if value.get("all_tiles").and_then(as_bool) == Some(true) {
                    TileSpec::AllTiles
                } else if let Some(start) = value.get("start") {
                    let start = as_coordinate(start).ok_or_else(|| malformed("bad 'start'"))?;
                    let end = match value.get("end") {
                        Some(end) => as_coordinate(end).ok_or_else(|| malformed("bad 'end'"))?,
                        None => start,
                    };
                    TileSpec::Range { start, end }
                } else if let Some(col) = value.get("col") {
                    let coord = |v: &Value| as_int(v).and_then(|n| u8::try_from(n).ok());
                    let col = coord(col).ok_or_else(|| malformed("bad 'col'"))?;
                    let row = match value.get("row") {
                        Some(row) => coord(row).ok_or_else(|| malformed("bad 'row'"))?,
                        None if ty.module.is_column_addressed() => 0,
                        None => return Err(malformed("missing 'row'")),
                    };
                    TileSpec::Single { col, row }
                } else {
                    return Err(malformed("no tile specification"));
                };
                Ok(MetricEntry::TileBased {
                    spec,
                    metric,
                    channels,
                    bytes,
                })
            }
        }
    }

    pub fn metric(&self) -> &str {
        match self {
            MetricEntry::GraphBased { metric, .. } | MetricEntry::TileBased { metric, .. } => metric,
        }
    }

    pub fn channels(&self) -> Option<&Channels> {
        match self {
            MetricEntry::GraphBased { channels, .. } | MetricEntry::TileBased { channels, .. } => {
                channels.as_ref()
            }
        }
    }

    /// First channel, if any were given.
    pub fn channel0(&self) -> Option<u8> {
        self.channels().and_then(|c| c.first().copied())
    }

    /// Second channel; repeats the first when only one was given.
    pub fn channel1(&self) -> Option<u8> {
        let channels = self.channels()?;
        channels.get(1).or_else(|| channels.first()).copied()
    }

    pub fn bytes(&self) -> Option<&str> {
        match self {
            MetricEntry::GraphBased { bytes, .. } | MetricEntry::TileBased { bytes, .. } => {
                bytes.as_deref()
            }
        }
    }

    pub fn is_graph_based(&self) -> bool {
        matches!(self, MetricEntry::GraphBased { .. })
    }

    pub fn tile_spec(&self) -> Option<TileSpec> {
        match self {
            MetricEntry::TileBased { spec, .. } => Some(*spec),
            MetricEntry::GraphBased { .. } => None,
        }
    }

    pub fn is_all_tiles(&self) -> bool {
        self.tile_spec() == Some(TileSpec::AllTiles)
    }

    /// Graph-based entry naming every graph and every entity.
    pub fn is_all_graphs(&self) -> bool {
        matches!(self, MetricEntry::GraphBased { graph, entity, .. } if graph == ALL && entity == ALL)
    }

    /// Render the entry back into its document shape.
    pub fn to_json(&self) -> Value {
        let mut obj = Map::new();
        match self {
            MetricEntry::GraphBased {
                graph,
                entity_kind,
                entity,
                ..
            } => {
                obj.insert("graph".into(), json!(graph));
                obj.insert(entity_kind.field_name().into(), json!(entity));
            }
            MetricEntry::TileBased { spec, .. } => match spec {
                TileSpec::AllTiles => {
                    obj.insert("all_tiles".into(), json!(true));
                }
                TileSpec::Single { col, row } => {
                    obj.insert("col".into(), json!(col));
                    obj.insert("row".into(), json!(row));
                }
                TileSpec::Range { start, end } => {
                    obj.insert("start".into(), json!([start.0, start.1]));
                    obj.insert("end".into(), json!([end.0, end.1]));
                }
            },
        }
        obj.insert("metric".into(), json!(self.metric()));
        if let Some(channels) = self.channels() {
            obj.insert("channels".into(), json!(channels.as_slice()));
        }
        if let Some(bytes) = self.bytes() {
            obj.insert("bytes".into(), json!(bytes));
        }
        Value::Object(obj)
    }
}

fn parse_channels(value: &Value) -> Option<Channels> {
    let items = value.as_array()?;
    if items.is_empty() || items.len() > 2 {
        return None;
    }
    items
        .iter()
        .map(|v| as_int(v).and_then(|n| u8::try_from(n).ok()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiles(module: ModuleKey) -> MetricType {
        MetricType::new(Section::Tiles, module)
    }

    fn graphs(module: ModuleKey) -> MetricType {
        MetricType::new(Section::Graphs, module)
    }

    #[test]
    fn test_graph_entry_defaults_to_all() {
        let e = MetricEntry::from_json(graphs(ModuleKey::Aie), &json!({"metric": "stalls"})).unwrap();
        assert!(e.is_all_graphs());
        assert_eq!(e.metric(), "stalls");
        assert_eq!(e.channel0(), None);
    }

    #[test]
    fn test_graph_entry_entity_field_per_module() {
        let e = MetricEntry::from_json(
            graphs(ModuleKey::MemoryTile),
            &json!({"graph": "g1", "buffer": "buf_a", "kernel": "ignored", "metric": "input_channels"}),
        )
        .unwrap();
        match e {
            MetricEntry::GraphBased {
                entity_kind, entity, ..
            } => {
                assert_eq!(entity_kind, EntityKind::Buffer);
                assert_eq!(entity, "buf_a");
            }
            _ => panic!("expected graph-based entry"),
        }
    }

    #[test]
    fn test_tile_specs() {
        let all = MetricEntry::from_json(tiles(ModuleKey::Aie), &json!({"metric": "m", "all_tiles": true})).unwrap();
        assert!(all.is_all_tiles());

        let single = MetricEntry::from_json(tiles(ModuleKey::Aie), &json!({"metric": "m", "col": 2, "row": "1"})).unwrap();
        assert_eq!(single.tile_spec(), Some(TileSpec::Single { col: 2, row: 1 }));

        let range = MetricEntry::from_json(tiles(ModuleKey::Aie), &json!({"metric": "m", "start": [1, 0]})).unwrap();
        assert_eq!(
            range.tile_spec(),
            Some(TileSpec::Range { start: (1, 0), end: (1, 0) })
        );

        let uc = MetricEntry::from_json(tiles(ModuleKey::Microcontroller), &json!({"metric": "execution", "col": 3})).unwrap();
        assert_eq!(uc.tile_spec(), Some(TileSpec::Single { col: 3, row: 0 }));
    }

    #[test]
    fn test_channel1_defaults_to_channel0() {
        let e = MetricEntry::from_json(tiles(ModuleKey::Aie), &json!({"metric": "m", "all_tiles": true, "channels": [3]})).unwrap();
        assert_eq!(e.channel0(), Some(3));
        assert_eq!(e.channel1(), Some(3));

        let e = MetricEntry::from_json(tiles(ModuleKey::Aie), &json!({"metric": "m", "all_tiles": true, "channels": [0, 1]})).unwrap();
        assert_eq!(e.channel1(), Some(1));
    }

    #[test]
    fn test_microcontroller_ignores_stream_fields() {
        let e = MetricEntry::from_json(
            tiles(ModuleKey::Microcontroller),
            &json!({"metric": "execution", "col": 0, "channels": [999], "bytes": "1K"}),
        )
        .unwrap();
        assert_eq!(e.channels(), None);
        assert_eq!(e.bytes(), None);
    }

    #[test]
    fn test_unsupported_type_is_construction_error() {
        let err = MetricEntry::from_json(graphs(ModuleKey::Microcontroller), &json!({"metric": "execution"})).unwrap_err();
        assert_eq!(
            err,
            ConstructionError::UnsupportedType {
                section: Section::Graphs,
                module: ModuleKey::Microcontroller
            }
        );
    }

    #[test]
    fn test_unvalidated_shape_is_construction_error() {
        let err = MetricEntry::from_json(tiles(ModuleKey::Aie), &json!({"metric": "m", "col": 1})).unwrap_err();
        assert!(matches!(err, ConstructionError::Malformed { .. }));
        assert!(err.to_string().contains("missing 'row'"));
    }

    #[test]
    fn test_to_json_shape() {
        let value = json!({"graph": "g", "port": "p", "metric": "input_throughputs", "channels": [0, 1], "bytes": "4K"});
        let e = MetricEntry::from_json(graphs(ModuleKey::InterfaceTile), &value).unwrap();
        assert_eq!(e.to_json(), value);

        let e = MetricEntry::from_json(tiles(ModuleKey::Aie), &json!({"start": [0, 0], "end": [1, 1], "metric": "stalls"})).unwrap();
        assert_eq!(e.to_json(), json!({"start": [0, 0], "end": [1, 1], "metric": "stalls"}));
    }
}
