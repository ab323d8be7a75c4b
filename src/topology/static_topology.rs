//! Topology reader backed by a JSON description of a compiled design.
//!
//! Used by the command-line tool and by tests. Kernel and memory-tile rows are
//! stored as logical rows and translated to physical rows on the way out.
//!
//! ```json
//! {
//!   "hw_generation": 2,
//!   "aie_tile_row_offset": 2,
//!   "kernels": [
//!     { "graph": "top.g", "function": "top.g.k0", "column": 0, "row": 0 }
//!   ],
//!   "memory_tiles": [ { "graph": "top.g", "buffers": ["buf0"], "column": 0, "row": 0 } ],
//!   "interface_tiles": [
//!     { "graph": "top.g", "port": "in0", "column": 0, "channel": 0,
//!       "direction": "input", "io_type": "plio" }
//!   ],
//!   "microcontrollers": [0, 1]
//! }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{matches_any, name_matches, IoType, ModuleType, Tile, TopologyReader, MEM_TILE_ROW_OFFSET};

/// Errors loading a topology description.
#[derive(Debug, Error)]
pub enum TopologyError {
    #[error("failed to read topology {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid topology description: {0}")]
    Parse(#[from] serde_json::Error),
}

fn default_true() -> bool {
    true
}

fn default_hw_generation() -> u32 {
    2
}

fn default_row_offset() -> u8 {
    2
}

/// Kernel-to-tile mapping entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KernelMapping {
    /// Graph name(s), space separated.
    pub graph: String,
    /// Fully qualified function name(s), space separated.
    pub function: String,
    pub column: u8,
    /// Logical row.
    pub row: u8,
    #[serde(default = "default_true")]
    pub core_used: bool,
    #[serde(default = "default_true")]
    pub dma_used: bool,
}

/// Buffers placed in a memory tile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryTileMapping {
    pub graph: String,
    #[serde(default)]
    pub buffers: Vec<String>,
    pub column: u8,
    /// Logical memory-tile row.
    #[serde(default)]
    pub row: u8,
}

/// Stream direction of an interface port, seen from the array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortDirection {
    Input,
    Output,
}

/// One PLIO/GMIO port routed through a shim tile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfacePort {
    pub graph: String,
    pub port: String,
    pub column: u8,
    #[serde(default)]
    pub channel: u8,
    pub direction: PortDirection,
    pub io_type: IoType,
}

/// Static, fully in-memory topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticTopology {
    #[serde(default = "default_hw_generation")]
    pub hw_generation: u32,
    #[serde(default = "default_row_offset")]
    pub aie_tile_row_offset: u8,
    /// Explicit graph list; derived from the mappings when empty.
    #[serde(default)]
    pub graphs: Vec<String>,
    #[serde(default)]
    pub kernels: Vec<KernelMapping>,
    #[serde(default)]
    pub memory_tiles: Vec<MemoryTileMapping>,
    #[serde(default)]
    pub interface_tiles: Vec<InterfacePort>,
    /// Columns that carry a microcontroller.
    #[serde(default)]
    pub microcontrollers: Vec<u8>,
}

impl StaticTopology {
    pub fn from_json_str(text: &str) -> Result<Self, TopologyError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, TopologyError> {
        let text = std::fs::read_to_string(path).map_err(|source| TopologyError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let topology = Self::from_json_str(&text)?;
        log::info!(
            "Loaded topology from {}: {} kernels, {} memory tiles, {} interface ports",
            path.display(),
            topology.kernels.len(),
            topology.memory_tiles.len(),
            topology.interface_tiles.len()
        );
        Ok(topology)
    }

    fn kernel_tiles(&self, graph: &str, module: ModuleType, kernel: &str) -> Vec<Tile> {
        let tiles = self
            .kernels
            .iter()
            .filter(|k| module != ModuleType::Core || k.core_used)
            .filter(|k| name_matches(graph, &k.graph) && name_matches(kernel, &k.function))
            .map(|k| Tile {
                col: k.column,
                row: k.row.saturating_add(self.aie_tile_row_offset),
                active_core: k.core_used,
                active_memory: k.dma_used,
                subtype: None,
            });
        dedup(tiles)
    }

    fn mem_tiles(&self, graph: &str, buffer: &str) -> Vec<Tile> {
        let tiles = self
            .memory_tiles
            .iter()
            .filter(|m| name_matches(graph, &m.graph) && matches_any(buffer, &m.buffers_or_all()))
            .map(|m| Tile {
                col: m.column,
                row: m.row.saturating_add(MEM_TILE_ROW_OFFSET),
                active_core: false,
                active_memory: true,
                subtype: None,
            });
        dedup(tiles)
    }
}

impl MemoryTileMapping {
    /// Buffer names to match against; a tile without named buffers only
    /// answers to `"all"`.
    fn buffers_or_all(&self) -> Vec<String> {
        if self.buffers.is_empty() {
            vec![super::ALL.to_string()]
        } else {
            self.buffers.clone()
        }
    }
}

/// Direction implied by a metric set name, if any.
fn metric_direction(metric: &str) -> Option<PortDirection> {
    let input = metric.contains("input") || metric.contains("s2mm");
    let output = metric.contains("output") || metric.contains("mm2s");
    match (input, output) {
        (true, false) => Some(PortDirection::Input),
        (false, true) => Some(PortDirection::Output),
        _ => None,
    }
}

/// Keep the first occurrence of each tile, preserving order.
fn dedup(tiles: impl Iterator<Item = Tile>) -> Vec<Tile> {
    let mut out: Vec<Tile> = Vec::new();
    for tile in tiles {
        if !out.contains(&tile) {
            out.push(tile);
        }
    }
    out
}

fn push_unique(names: &mut Vec<String>, name: &str) {
    if !name.is_empty() && !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}

impl TopologyReader for StaticTopology {
    fn tiles(&self, graph: &str, module: ModuleType, entity: &str) -> Vec<Tile> {
        match module {
            ModuleType::Core | ModuleType::Dma => self.kernel_tiles(graph, module, entity),
            ModuleType::MemTile => self.mem_tiles(graph, entity),
            ModuleType::Shim => self.interface_tiles(graph, entity, "", None, None),
            ModuleType::Uc => self.microcontrollers(None),
        }
    }

    fn interface_tiles(
        &self,
        graph: &str,
        port: &str,
        metric: &str,
        channel: Option<u8>,
        columns: Option<(u8, u8)>,
    ) -> Vec<Tile> {
        let direction = metric_direction(metric);
        let tiles = self
            .interface_tiles
            .iter()
            .filter(|p| name_matches(graph, &p.graph) && name_matches(port, &p.port))
            .filter(|p| columns.map_or(true, |(lo, hi)| (lo..=hi).contains(&p.column)))
            .filter(|p| channel.map_or(true, |c| p.channel == c))
            .filter(|p| direction.map_or(true, |d| p.direction == d))
            .map(|p| Tile {
                col: p.column,
                row: 0,
                active_core: false,
                active_memory: true,
                subtype: Some(p.io_type),
            });
        dedup(tiles)
    }

    fn microcontrollers(&self, columns: Option<(u8, u8)>) -> Vec<Tile> {
        let tiles = self
            .microcontrollers
            .iter()
            .copied()
            .filter(|col| columns.map_or(true, |(lo, hi)| (lo..=hi).contains(col)))
            .map(|col| Tile {
                col,
                row: 0,
                active_core: true,
                active_memory: false,
                subtype: None,
            });
        dedup(tiles)
    }

    fn valid_graphs(&self) -> Vec<String> {
        if !self.graphs.is_empty() {
            return self.graphs.clone();
        }
        let mut graphs = Vec::new();
        let fields = self
            .kernels
            .iter()
            .map(|k| k.graph.as_str())
            .chain(self.memory_tiles.iter().map(|m| m.graph.as_str()))
            .chain(self.interface_tiles.iter().map(|p| p.graph.as_str()));
        for field in fields {
            for name in field.split_whitespace() {
                push_unique(&mut graphs, name);
            }
        }
        graphs
    }

    /// Every dot-separated component of each function name, followed by the
    /// full name itself.
    fn valid_kernels(&self) -> Vec<String> {
        let mut kernels = Vec::new();
        for mapping in &self.kernels {
            for function in mapping.function.split_whitespace() {
                for part in function.split('.') {
                    push_unique(&mut kernels, part);
                }
            }
            push_unique(&mut kernels, &mapping.function);
        }
        kernels
    }

    fn valid_buffers(&self) -> Vec<String> {
        let mut buffers = Vec::new();
        for buffer in self.memory_tiles.iter().flat_map(|m| m.buffers.iter()) {
            push_unique(&mut buffers, buffer);
        }
        buffers
    }

    fn valid_ports(&self) -> Vec<String> {
        let mut ports = Vec::new();
        for port in &self.interface_tiles {
            push_unique(&mut ports, &port.port);
        }
        ports
    }

    fn aie_tile_row_offset(&self) -> u8 {
        self.aie_tile_row_offset
    }

    fn hardware_generation(&self) -> u32 {
        self.hw_generation
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DESIGN: &str = r#"{
        "hw_generation": 2,
        "aie_tile_row_offset": 2,
        "kernels": [
            { "graph": "top.g1", "function": "top.g1.k0", "column": 0, "row": 0 },
            { "graph": "top.g1", "function": "top.g1.k1", "column": 0, "row": 1, "core_used": false },
            { "graph": "top.g2", "function": "top.g2.k0", "column": 1, "row": 0 }
        ],
        "memory_tiles": [
            { "graph": "top.g1", "buffers": ["buf_a"], "column": 0 },
            { "graph": "top.g2", "buffers": ["buf_b"], "column": 1 }
        ],
        "interface_tiles": [
            { "graph": "top.g1", "port": "in0", "column": 0, "channel": 0, "direction": "input", "io_type": "plio" },
            { "graph": "top.g1", "port": "out0", "column": 0, "channel": 1, "direction": "output", "io_type": "plio" },
            { "graph": "top.g2", "port": "ddr0", "column": 2, "channel": 0, "direction": "input", "io_type": "gmio" }
        ],
        "microcontrollers": [0, 1, 2]
    }"#;

    fn design() -> StaticTopology {
        StaticTopology::from_json_str(DESIGN).unwrap()
    }

    #[test]
    fn test_kernel_tiles_apply_row_offset() {
        let topo = design();
        let tiles = topo.tiles("all", ModuleType::Dma, "all");
        assert_eq!(tiles, vec![Tile::new(0, 2), Tile::new(0, 3), Tile::new(1, 2)]);

        // Core module skips tiles whose core is unused
        let cores = topo.tiles("all", ModuleType::Core, "all");
        assert_eq!(cores, vec![Tile::new(0, 2), Tile::new(1, 2)]);
    }

    #[test]
    fn test_kernel_tiles_by_graph_and_kernel() {
        let topo = design();
        assert_eq!(topo.tiles("g2", ModuleType::Core, "all"), vec![Tile::new(1, 2)]);
        assert_eq!(topo.tiles("all", ModuleType::Dma, "k1"), vec![Tile::new(0, 3)]);
        assert_eq!(
            topo.tiles("top.g1", ModuleType::Dma, "k0"),
            vec![Tile::new(0, 2)]
        );
        assert!(topo.tiles("nope", ModuleType::Dma, "all").is_empty());
    }

    #[test]
    fn test_mem_tiles() {
        let topo = design();
        assert_eq!(
            topo.tiles("all", ModuleType::MemTile, "all"),
            vec![Tile::new(0, 1), Tile::new(1, 1)]
        );
        assert_eq!(
            topo.tiles("all", ModuleType::MemTile, "buf_b"),
            vec![Tile::new(1, 1)]
        );
    }

    #[test]
    fn test_interface_tiles_filtering() {
        let topo = design();
        let all = topo.interface_tiles("all", "all", "", None, None);
        assert_eq!(all, vec![Tile::new(0, 0), Tile::new(2, 0)]);

        let outputs = topo.interface_tiles("all", "all", "output_throughputs", None, None);
        assert_eq!(outputs, vec![Tile::new(0, 0)]);

        let windowed = topo.interface_tiles("all", "all", "input_throughputs", None, Some((1, 2)));
        assert_eq!(windowed.len(), 1);
        assert_eq!(windowed[0].subtype, Some(IoType::Gmio));

        assert!(topo
            .interface_tiles("all", "all", "input_throughputs", Some(1), None)
            .is_empty());
    }

    #[test]
    fn test_microcontrollers() {
        let topo = design();
        assert_eq!(topo.microcontrollers(None).len(), 3);
        assert_eq!(topo.microcontrollers(Some((1, 1))), vec![Tile::new(1, 0)]);
    }

    #[test]
    fn test_valid_names() {
        let topo = design();
        assert_eq!(topo.valid_graphs(), vec!["top.g1", "top.g2"]);
        let kernels = topo.valid_kernels();
        assert!(kernels.contains(&"k0".to_string()));
        assert!(kernels.contains(&"top.g1.k1".to_string()));
        assert_eq!(topo.valid_buffers(), vec!["buf_a", "buf_b"]);
        assert_eq!(topo.valid_ports(), vec!["in0", "out0", "ddr0"]);
    }

    #[test]
    fn test_metric_direction() {
        assert_eq!(metric_direction("input_throughputs"), Some(PortDirection::Input));
        assert_eq!(metric_direction("mm2s_throughputs"), Some(PortDirection::Output));
        assert_eq!(metric_direction("packets"), None);
        assert_eq!(metric_direction("input_output_ports"), None);
    }

    #[test]
    fn test_defaults_and_bad_input() {
        let topo = StaticTopology::from_json_str("{}").unwrap();
        assert_eq!(topo.hardware_generation(), 2);
        assert_eq!(topo.aie_tile_row_offset(), 2);
        assert!(StaticTopology::from_json_str("{ not json").is_err());
    }
}
