//! Physical topology as seen by the metric resolver.
//!
//! The resolver never inspects the device directly. Everything it needs to
//! know about which tiles exist, which graphs/kernels/buffers/ports were
//! compiled into the design, and how logical rows map to physical rows comes
//! through the [`TopologyReader`] trait.
//!
//! ```text
//!     Col 0    Col 1    Col 2    Col 3
//!   +--------+--------+--------+--------+
//! 3 |  Core  |  Core  |  Core  |  Core  |   aie / aie_memory / aie_tile
//!   +--------+--------+--------+--------+
//! 2 |  Core  |  Core  |  Core  |  Core  |   <- row offset (2 on AIE2)
//!   +--------+--------+--------+--------+
//! 1 |MemTile |MemTile |MemTile |MemTile |   memory_tile (offset 1)
//!   +--------+--------+--------+--------+
//! 0 |  Shim  |  Shim  |  Shim  |  Shim  |   interface_tile / microcontroller
//!   +--------+--------+--------+--------+
//! ```

pub mod static_topology;

pub use static_topology::{StaticTopology, TopologyError};

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Wildcard accepted for graph and entity names.
pub const ALL: &str = "all";

/// Physical row of logical memory-tile row 0.
pub const MEM_TILE_ROW_OFFSET: u8 = 1;

/// Hardware module a metric set is programmed into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModuleType {
    /// AIE core module.
    Core,
    /// AIE memory module (DMA, locks, conflicts).
    Dma,
    /// Interface (shim) tile.
    Shim,
    /// Memory tile.
    MemTile,
    /// Microcontroller.
    Uc,
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModuleType::Core => "core",
            ModuleType::Dma => "dma",
            ModuleType::Shim => "shim",
            ModuleType::MemTile => "mem_tile",
            ModuleType::Uc => "uc",
        };
        write!(f, "{}", s)
    }
}

/// Kind of external connection behind an interface tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IoType {
    /// Programmable-logic stream.
    Plio,
    /// Global memory (DDR) path.
    Gmio,
}

/// One physical monitoring unit.
///
/// Equality, ordering and hashing only look at `(col, row)`; the activity
/// flags and subtype are descriptive.
#[derive(Debug, Clone, Copy)]
pub struct Tile {
    pub col: u8,
    pub row: u8,
    pub active_core: bool,
    pub active_memory: bool,
    pub subtype: Option<IoType>,
}

impl Tile {
    /// A tile with both core and memory marked active.
    pub fn new(col: u8, row: u8) -> Self {
        Self {
            col,
            row,
            active_core: true,
            active_memory: true,
            subtype: None,
        }
    }

    pub fn with_subtype(mut self, subtype: IoType) -> Self {
        self.subtype = Some(subtype);
        self
    }

    fn key(&self) -> (u8, u8) {
        (self.col, self.row)
    }
}

impl PartialEq for Tile {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Tile {}

impl Hash for Tile {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Tile {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Tile {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl fmt::Display for Tile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{})", self.col, self.row)
    }
}

/// Read-only view of the compiled design and the array it runs on.
///
/// All row values returned by a reader are physical rows.
pub trait TopologyReader {
    /// Tiles used by `graph` (pattern) and `entity` (kernel or buffer
    /// pattern) for the given module. `"all"` matches everything.
    fn tiles(&self, graph: &str, module: ModuleType, entity: &str) -> Vec<Tile>;

    /// Interface tiles serving `graph`/`port`.
    ///
    /// * `metric` - metric set being configured; lets the reader pick
    ///   input or output ports.
    /// * `channel` - restrict to ports on this stream channel.
    /// * `columns` - inclusive column window.
    fn interface_tiles(
        &self,
        graph: &str,
        port: &str,
        metric: &str,
        channel: Option<u8>,
        columns: Option<(u8, u8)>,
    ) -> Vec<Tile>;

    /// Microcontroller tiles, optionally restricted to an inclusive column window.
    fn microcontrollers(&self, columns: Option<(u8, u8)>) -> Vec<Tile>;

    fn valid_graphs(&self) -> Vec<String>;

    fn valid_kernels(&self) -> Vec<String>;

    fn valid_buffers(&self) -> Vec<String>;

    fn valid_ports(&self) -> Vec<String>;

    /// Physical row of logical AIE row 0.
    fn aie_tile_row_offset(&self) -> u8;

    /// 1 = AIE1, 2 = AIE2 (AIE-ML), ...
    fn hardware_generation(&self) -> u32;
}

/// Match a user pattern against a compiled design name.
///
/// Design names are hierarchical (`top.subgraph.kernel`) and a metadata field
/// may carry several names separated by spaces. A pattern matches when it is
/// `"all"` or is contained in one of the names, which includes matching any
/// single dot-separated component.
pub fn name_matches(pattern: &str, name: &str) -> bool {
    if pattern == ALL {
        return true;
    }
    name.split_whitespace().any(|candidate| candidate.contains(pattern))
}

/// True if `pattern` matches at least one of `names`.
pub fn matches_any(pattern: &str, names: &[String]) -> bool {
    names.iter().any(|name| name_matches(pattern, name))
}
