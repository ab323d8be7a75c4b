//! Metric-set tables for each plugin.
//!
//! Supported set names, per-module defaults, complementary pairings and the
//! special-cased sets are plain data handed to the resolver, so independent
//! resolutions never share mutable state.

use std::collections::{BTreeMap, HashMap};

use crate::plugin::{ModuleKey, Plugin};

/// Supported sets and default for one module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleMetricSets {
    pub supported: Vec<String>,
    pub default: String,
}

impl ModuleMetricSets {
    pub fn new(supported: &[&str], default: &str) -> Self {
        Self {
            supported: supported.iter().map(|s| s.to_string()).collect(),
            default: default.to_string(),
        }
    }

    pub fn supports(&self, metric: &str) -> bool {
        self.supported.iter().any(|s| s == metric)
    }
}

/// Complementary set implied on a sibling module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pairing {
    pub module: ModuleKey,
    pub metric: String,
}

#[derive(Debug, Clone)]
pub struct MetricSetTables {
    plugin: Plugin,
    modules: BTreeMap<ModuleKey, ModuleMetricSets>,
    pairings: HashMap<(ModuleKey, String), Pairing>,
    byte_count_metric: Option<String>,
    gmio_only: Vec<String>,
}

const AIE_SETS: &[&str] = &[
    "heat_map",
    "stalls",
    "execution",
    "floating_point",
    "stream_put_get",
    "aie_trace",
    "write_throughputs",
    "read_throughputs",
    "s2mm_throughputs",
    "mm2s_throughputs",
];

const AIE_MEMORY_SETS: &[&str] = &[
    "conflicts",
    "dma_locks",
    "dma_stalls_s2mm",
    "dma_stalls_mm2s",
    "write_throughputs",
    "read_throughputs",
    "s2mm_throughputs",
    "mm2s_throughputs",
];

const PROFILE_INTERFACE_SETS: &[&str] = &[
    "input_throughputs",
    "output_throughputs",
    "input_stalls",
    "output_stalls",
    "packets",
    "ddr_bandwidth",
    "read_bandwidths",
    "write_bandwidths",
    "start_to_bytes_transferred",
    "interface_tile_latency",
];

const PROFILE_MEM_TILE_SETS: &[&str] = &[
    "input_channels",
    "input_channels_details",
    "output_channels",
    "output_channels_details",
    "memory_stats",
    "mem_trace",
    "input_throughputs",
    "output_throughputs",
    "conflict_stats1",
    "conflict_stats2",
    "conflict_stats3",
    "conflict_stats4",
];

const MICROCONTROLLER_SETS: &[&str] = &["execution"];

/// Sets on both `aie` and `aie_memory` that need their twin on the other module.
const DMA_PAIRED_SETS: &[&str] = &[
    "s2mm_throughputs",
    "mm2s_throughputs",
    "write_throughputs",
    "read_throughputs",
];

const GMIO_ONLY_SETS: &[&str] = &["ddr_bandwidth", "read_bandwidths", "write_bandwidths"];

const TRACE_AIE_TILE_SETS: &[&str] = &[
    "functions",
    "functions_partial_stalls",
    "functions_all_stalls",
    "all",
    "all_stalls",
    "all_dma",
    "all_stalls_dma",
    "s2mm_channels",
    "mm2s_channels",
    "s2mm_channels_stalls",
    "mm2s_channels_stalls",
];

const TRACE_MEM_TILE_SETS: &[&str] = &[
    "input_channels",
    "input_channels_stalls",
    "output_channels",
    "output_channels_stalls",
    "memory_conflicts1",
    "memory_conflicts2",
];

const TRACE_INTERFACE_SETS: &[&str] = &[
    "input_ports",
    "output_ports",
    "input_ports_stalls",
    "output_ports_stalls",
    "input_ports_details",
    "output_ports_details",
];

impl MetricSetTables {
    /// Empty tables; populate with the `with_*` builders.
    pub fn new(plugin: Plugin) -> Self {
        Self {
            plugin,
            modules: BTreeMap::new(),
            pairings: HashMap::new(),
            byte_count_metric: None,
            gmio_only: Vec::new(),
        }
    }

    pub fn aie_profile() -> Self {
        let mut tables = Self::new(Plugin::AieProfile)
            .with_module(ModuleKey::Aie, ModuleMetricSets::new(AIE_SETS, "heat_map"))
            .with_module(ModuleKey::AieMemory, ModuleMetricSets::new(AIE_MEMORY_SETS, "conflicts"))
            .with_module(
                ModuleKey::InterfaceTile,
                ModuleMetricSets::new(PROFILE_INTERFACE_SETS, "input_throughputs"),
            )
            .with_module(
                ModuleKey::MemoryTile,
                ModuleMetricSets::new(PROFILE_MEM_TILE_SETS, "input_channels"),
            )
            .with_module(
                ModuleKey::Microcontroller,
                ModuleMetricSets::new(MICROCONTROLLER_SETS, "execution"),
            )
            .with_byte_count_metric("start_to_bytes_transferred")
            .with_gmio_only(GMIO_ONLY_SETS);

        for set in DMA_PAIRED_SETS {
            tables = tables
                .with_pairing(ModuleKey::Aie, set, ModuleKey::AieMemory, set)
                .with_pairing(ModuleKey::AieMemory, set, ModuleKey::Aie, set);
        }
        tables
    }

    pub fn aie_trace() -> Self {
        Self::new(Plugin::AieTrace)
            .with_module(ModuleKey::AieTile, ModuleMetricSets::new(TRACE_AIE_TILE_SETS, "functions"))
            .with_module(
                ModuleKey::MemoryTile,
                ModuleMetricSets::new(TRACE_MEM_TILE_SETS, "input_channels"),
            )
            .with_module(
                ModuleKey::InterfaceTile,
                ModuleMetricSets::new(TRACE_INTERFACE_SETS, "input_ports"),
            )
    }

    pub fn for_plugin(plugin: Plugin) -> Self {
        match plugin {
            Plugin::AieProfile => Self::aie_profile(),
            Plugin::AieTrace => Self::aie_trace(),
        }
    }

    pub fn with_module(mut self, module: ModuleKey, sets: ModuleMetricSets) -> Self {
        self.modules.insert(module, sets);
        self
    }

    /// `metric` on `module` implies `paired_metric` on `paired_module`.
    pub fn with_pairing(
        mut self,
        module: ModuleKey,
        metric: &str,
        paired_module: ModuleKey,
        paired_metric: &str,
    ) -> Self {
        self.pairings.insert(
            (module, metric.to_string()),
            Pairing {
                module: paired_module,
                metric: paired_metric.to_string(),
            },
        );
        self
    }

    pub fn with_byte_count_metric(mut self, metric: &str) -> Self {
        self.byte_count_metric = Some(metric.to_string());
        self
    }

    pub fn with_gmio_only(mut self, metrics: &[&str]) -> Self {
        self.gmio_only.extend(metrics.iter().map(|s| s.to_string()));
        self
    }

    pub fn plugin(&self) -> Plugin {
        self.plugin
    }

    pub fn module(&self, module: ModuleKey) -> Option<&ModuleMetricSets> {
        self.modules.get(&module)
    }

    pub fn is_supported(&self, module: ModuleKey, metric: &str) -> bool {
        self.module(module).is_some_and(|m| m.supports(metric))
    }

    pub fn default_for(&self, module: ModuleKey) -> Option<&str> {
        self.module(module).map(|m| m.default.as_str())
    }

    pub fn pairing(&self, module: ModuleKey, metric: &str) -> Option<&Pairing> {
        self.pairings.get(&(module, metric.to_string()))
    }

    pub fn is_byte_count(&self, metric: &str) -> bool {
        self.byte_count_metric.as_deref() == Some(metric)
    }

    pub fn is_gmio_only(&self, metric: &str) -> bool {
        self.gmio_only.iter().any(|m| m == metric)
    }
}
