//! Resolution engine: metric collections in, per-tile tables out.
//!
//! Each module of the plugin is resolved in module order:
//!
//! ```text
//!   MetricCollection
//!         |
//!         v
//!   +-----------------+   tile-based:  all_tiles  >  ranges  >  singles
//!   |      merge      |   graph-based: all/all    >  named graphs/entities
//!   +-----------------+
//!         |  expand entries through the TopologyReader, assign metric,
//!         |  channels and byte thresholds
//!         v
//!   +-----------------+   "" / "off"      -> marked, removed at the end
//!   |   final pass    |   protected tile  -> earlier pairing restored
//!   |                 |   unsupported set -> module default
//!   |                 |   paired set      -> sibling module updated
//!   +-----------------+   GMIO-only set on PLIO tile -> dropped
//!         |
//!         v
//!   ResolvedConfig[module]
//! ```
//!
//! Broader directives win over narrower ones within a collection: the first
//! all-tiles entry settles the whole module, otherwise every range entry
//! applies, and single-tile entries are only considered when no range entry
//! produced a tile.
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use xdna_profile_config::diagnostics::Diagnostics;
//! use xdna_profile_config::parser::SettingsParser;
//! use xdna_profile_config::plugin::{ModuleKey, Plugin};
//! use xdna_profile_config::resolve::{MetricSetTables, ResolutionEngine};
//! use xdna_profile_config::topology::StaticTopology;
//!
//! let topology = StaticTopology::from_json_str(r#"{
//!     "kernels": [{ "graph": "g", "function": "g.k", "column": 0, "row": 0 }]
//! }"#)?;
//! let doc = json!({"aie_profile": {"tiles": {"aie": [{"metric": "stalls", "all_tiles": true}]}}});
//!
//! let mut diags = Diagnostics::new();
//! let settings = SettingsParser::new()
//!     .parse_document(&doc, Plugin::AieProfile, &mut diags)
//!     .unwrap();
//! let manager = settings.build_collections()?;
//!
//! let engine = ResolutionEngine::new(&topology, MetricSetTables::aie_profile());
//! let config = engine.resolve(&manager, &mut diags);
//! assert_eq!(config.metric_names(ModuleKey::Aie).len(), 1);
//! # Ok::<(), anyhow::Error>(())
//! ```

use std::collections::BTreeSet;

use crate::diagnostics::Diagnostics;
use crate::metrics::{EntityKind, MetricCollection, MetricEntry, MetricsCollectionManager, TileSpec};
use crate::plugin::ModuleKey;
use crate::resolve::bytes::parse_byte_threshold;
use crate::resolve::output::{MetricSetting, ModuleTables, Origin, ResolvedConfig};
use crate::resolve::tables::{MetricSetTables, Pairing};
use crate::topology::{
    matches_any, IoType, ModuleType, Tile, TopologyReader, ALL, MEM_TILE_ROW_OFFSET,
};

/// Metric set value that switches a tile off.
pub const OFF: &str = "off";

/// Resolves collections against one topology with one set of tables.
pub struct ResolutionEngine<'a, R: TopologyReader + ?Sized> {
    reader: &'a R,
    tables: MetricSetTables,
}

impl<'a, R: TopologyReader + ?Sized> ResolutionEngine<'a, R> {
    pub fn new(reader: &'a R, tables: MetricSetTables) -> Self {
        Self { reader, tables }
    }

    pub fn tables(&self) -> &MetricSetTables {
        &self.tables
    }

    /// Resolve every module of the plugin into fresh output tables.
    pub fn resolve(&self, manager: &MetricsCollectionManager, diags: &mut Diagnostics) -> ResolvedConfig {
        let mut config = ResolvedConfig::new();
        for &module in self.tables.plugin().modules() {
            match manager.get(module.module_type(), module.as_str()) {
                Some(collection) => self.resolve_module(module, collection, &mut config, diags),
                None => diags.debug(format!(
                    "No {} settings for module {}",
                    self.tables.plugin(),
                    module
                )),
            }
        }
        config
    }

    /// Merge one module's collection into `config` and run its final pass.
    pub fn resolve_module(
        &self,
        module: ModuleKey,
        collection: &MetricCollection,
        config: &mut ResolvedConfig,
        diags: &mut Diagnostics,
    ) {
        if self.tables.module(module).is_none() {
            diags.warn(format!(
                "Module {} has no metric sets in plugin {}; its settings are ignored",
                module,
                self.tables.plugin()
            ));
            return;
        }
        if module == ModuleKey::MemoryTile && self.reader.hardware_generation() == 1 {
            diags.warn("Memory tiles are not available on this hardware generation; memory_tile settings are ignored");
            return;
        }

        let tables = config.module_mut(module);
        if collection.is_graph_based() {
            self.merge_graph_based(module, collection, tables, diags);
        } else {
            self.merge_tile_based(module, collection, tables, diags);
        }

        self.finalize_module(module, config, diags);
    }

    fn merge_tile_based(
        &self,
        module: ModuleKey,
        collection: &MetricCollection,
        out: &mut ModuleTables,
        diags: &mut Diagnostics,
    ) {
        if let Some(entry) = collection.first_all_tiles() {
            let tiles = self.expand(module, entry, diags);
            if tiles.is_empty() {
                diags.warn(format!("No valid tiles found for module {}", module));
            }
            self.assign(module, entry, &tiles, out, diags);
            if collection.len() > 1 {
                diags.debug(format!(
                    "{}: all_tiles entry overrides {} other entries",
                    module,
                    collection.len() - 1
                ));
            }
            return;
        }

        let mut range_fired = false;
        for entry in collection.ranges() {
            let tiles = self.expand(module, entry, diags);
            range_fired |= !tiles.is_empty();
            self.assign(module, entry, &tiles, out, diags);
        }
        if range_fired {
            let skipped = collection.singles().count();
            if skipped > 0 {
                diags.debug(format!(
                    "{}: {} single-tile entries ignored in favour of range entries",
                    module, skipped
                ));
            }
            return;
        }

        for entry in collection.singles() {
            let tiles = self.expand(module, entry, diags);
            self.assign(module, entry, &tiles, out, diags);
        }
    }

    fn merge_graph_based(
        &self,
        module: ModuleKey,
        collection: &MetricCollection,
        out: &mut ModuleTables,
        diags: &mut Diagnostics,
    ) {
        if let Some(entry) = collection.first_all_graphs() {
            let tiles = self.expand(module, entry, diags);
            if tiles.is_empty() {
                diags.warn(format!("No valid tiles found for module {}", module));
            }
            self.assign(module, entry, &tiles, out, diags);
            return;
        }

        for entry in collection.entries() {
            if !self.check_names(module, entry, diags) {
                continue;
            }
            let tiles = self.expand(module, entry, diags);
            if tiles.is_empty() {
                if let MetricEntry::GraphBased {
                    graph,
                    entity_kind,
                    entity,
                    ..
                } = entry
                {
                    diags.warn(format!(
                        "No {} tiles found for graph {} {} {}",
                        module, graph, entity_kind, entity
                    ));
                }
                continue;
            }
            self.assign(module, entry, &tiles, out, diags);
        }
    }

    /// Concrete tiles an entry denotes for `module`.
    pub fn expand(&self, module: ModuleKey, entry: &MetricEntry, diags: &mut Diagnostics) -> Vec<Tile> {
        let metric = entry.metric();
        let channel = entry.channel0();
        match entry {
            MetricEntry::GraphBased { graph, entity, .. } => match module.module_type() {
                ModuleType::Shim => self.reader.interface_tiles(graph, entity, metric, channel, None),
                ModuleType::Uc => self.reader.microcontrollers(None),
                ty => self.reader.tiles(graph, ty, entity),
            },
            MetricEntry::TileBased { spec, .. } => match *spec {
                TileSpec::AllTiles => match module.module_type() {
                    ModuleType::Shim => self.reader.interface_tiles(ALL, ALL, metric, channel, None),
                    ModuleType::Uc => self.reader.microcontrollers(None),
                    ty => self.reader.tiles(ALL, ty, ALL),
                },
                TileSpec::Single { col, row } => {
                    self.tiles_in_range(module, (col, row), (col, row), metric, channel, diags)
                }
                TileSpec::Range { start, end } => {
                    self.tiles_in_range(module, start, end, metric, channel, diags)
                }
            },
        }
    }

    fn tiles_in_range(
        &self,
        module: ModuleKey,
        start: (u8, u8),
        end: (u8, u8),
        metric: &str,
        channel: Option<u8>,
        diags: &mut Diagnostics,
    ) -> Vec<Tile> {
        if start.0 > end.0 || start.1 > end.1 {
            diags.warn(format!(
                "Invalid {} tile range [{}, {}] to [{}, {}]; skipped",
                module, start.0, start.1, end.0, end.1
            ));
            return Vec::new();
        }

        let columns = Some((start.0, end.0));
        let tiles = match module.module_type() {
            ModuleType::Shim => self.reader.interface_tiles(ALL, ALL, metric, channel, columns),
            ModuleType::Uc => self.reader.microcontrollers(columns),
            ty => return self.grid_tiles(module, ty, start, end, diags),
        };
        if tiles.is_empty() {
            diags.warn(format!(
                "No {} tiles found in columns {} to {}",
                module, start.0, end.0
            ));
        }
        tiles
    }

    /// Logical grid coordinates checked against the module's valid tiles.
    fn grid_tiles(
        &self,
        module: ModuleKey,
        ty: ModuleType,
        start: (u8, u8),
        end: (u8, u8),
        diags: &mut Diagnostics,
    ) -> Vec<Tile> {
        let offset = self.row_offset(module);
        let valid: BTreeSet<Tile> = self.reader.tiles(ALL, ty, ALL).into_iter().collect();

        let mut tiles = Vec::new();
        for col in start.0..=end.0 {
            for row in start.1..=end.1 {
                let Some(physical) = row.checked_add(offset) else {
                    diags.warn(format!(
                        "Specified {} tile ({},{}) is outside the array. Hence skipped.",
                        module, col, row
                    ));
                    continue;
                };
                match valid.get(&Tile::new(col, physical)) {
                    Some(tile) => tiles.push(*tile),
                    None => diags.warn(format!(
                        "Specified {} tile ({},{}) is not active. Hence skipped.",
                        module, col, physical
                    )),
                }
            }
        }
        tiles
    }

    fn row_offset(&self, module: ModuleKey) -> u8 {
        match module {
            ModuleKey::MemoryTile => MEM_TILE_ROW_OFFSET,
            ModuleKey::Aie | ModuleKey::AieMemory | ModuleKey::AieTile => {
                self.reader.aie_tile_row_offset()
            }
            ModuleKey::InterfaceTile | ModuleKey::Microcontroller => 0,
        }
    }

    /// Graph and entity names of a graph-based entry must exist in the design.
    fn check_names(&self, module: ModuleKey, entry: &MetricEntry, diags: &mut Diagnostics) -> bool {
        let MetricEntry::GraphBased {
            graph,
            entity_kind,
            entity,
            ..
        } = entry
        else {
            return true;
        };

        if graph != ALL {
            let graphs = self.reader.valid_graphs();
            if !matches_any(graph, &graphs) {
                diags.warn(format!(
                    "Could not find graph {}, as specified in graphs.{} setting. The following graphs are valid: {}",
                    graph,
                    module,
                    graphs.join(", ")
                ));
                return false;
            }
        }

        if entity != ALL {
            let names = match entity_kind {
                EntityKind::Kernel => self.reader.valid_kernels(),
                EntityKind::Buffer => self.reader.valid_buffers(),
                EntityKind::Port => self.reader.valid_ports(),
            };
            if !matches_any(entity, &names) {
                diags.warn(format!(
                    "Could not find {} {}, as specified in graphs.{} setting. The following {}s are valid: {}",
                    entity_kind,
                    entity,
                    module,
                    entity_kind,
                    names.join(", ")
                ));
                return false;
            }
        }

        true
    }

    fn assign(
        &self,
        module: ModuleKey,
        entry: &MetricEntry,
        tiles: &[Tile],
        out: &mut ModuleTables,
        diags: &mut Diagnostics,
    ) {
        if tiles.is_empty() {
            return;
        }

        let metric = entry.metric();
        let channels = entry.channel0().zip(entry.channel1());
        for tile in tiles {
            out.metrics.insert(*tile, MetricSetting::new(metric, Origin::Entry));
            if let Some((ch0, ch1)) = channels {
                out.channel0.insert(*tile, ch0);
                out.channel1.insert(*tile, ch1);
            }
        }

        if self.tables.is_byte_count(metric) {
            match entry.bytes() {
                Some(text) => match parse_byte_threshold(text) {
                    Some(bytes) => {
                        for tile in tiles {
                            out.bytes.insert(*tile, bytes);
                        }
                    }
                    None => diags.warn(format!(
                        "Byte threshold '{}' for {} metric set {} is not a positive byte count; no threshold applied",
                        text, module, metric
                    )),
                },
                None => diags.warn(format!(
                    "Byte threshold for {} metric set {} is not set; no threshold applied",
                    module, metric
                )),
            }
        }

        diags.debug(format!("{}: {} assigned to {} tile(s)", module, metric, tiles.len()));
    }

    /// Off-tile removal, protection, defaulting and pairing for one module.
    fn finalize_module(&self, module: ModuleKey, config: &mut ResolvedConfig, diags: &mut Diagnostics) {
        let Some(sets) = self.tables.module(module) else {
            return;
        };

        let tiles: Vec<Tile> = config
            .module(module)
            .map(|t| t.metrics.keys().copied().collect())
            .unwrap_or_default();

        let mut off_tiles = Vec::new();
        let mut unsupported = BTreeSet::new();
        let mut gmio_only = BTreeSet::new();

        for tile in tiles {
            let Some(current) = config
                .module(module)
                .and_then(|t| t.metrics.get(&tile))
                .cloned()
            else {
                continue;
            };

            if current.metric.is_empty() || current.metric == OFF {
                off_tiles.push(tile);
                continue;
            }

            if tile.subtype == Some(IoType::Plio) && self.tables.is_gmio_only(&current.metric) {
                diags.debug(format!(
                    "{} tile {} is a PLIO tile; metric set {} removed",
                    module, tile, current.metric
                ));
                gmio_only.insert(current.metric.clone());
                off_tiles.push(tile);
                continue;
            }

            let mut setting = current.clone();
            if let Some(protected) = config.pair_metrics.get(module, &tile) {
                if protected.metric != setting.metric {
                    diags.warn(format!(
                        "Replacing metric set {} with complementary set {} for tile {} on module {}",
                        setting.metric, protected.metric, tile, module
                    ));
                    setting = MetricSetting::new(
                        protected.metric.clone(),
                        Origin::Protected {
                            from: protected.source,
                        },
                    );
                }
            }

            if !sets.supports(&setting.metric) {
                if unsupported.insert(setting.metric.clone()) {
                    diags.warn(format!(
                        "Unable to find {} metric set {}. Using default of {}.",
                        module, setting.metric, sets.default
                    ));
                }
                setting = MetricSetting::new(sets.default.clone(), Origin::Default);
            }

            if setting != current {
                config.module_mut(module).metrics.insert(tile, setting.clone());
            }

            if let Some(pairing) = self.tables.pairing(module, &setting.metric) {
                self.apply_pairing(module, tile, pairing, config, diags);
            }
        }

        if !gmio_only.is_empty() {
            diags.warn(format!(
                "Metric sets {} are only available on GMIO {} tiles; removed from PLIO tiles",
                gmio_only.into_iter().collect::<Vec<_>>().join(", "),
                module
            ));
        }

        if !off_tiles.is_empty() {
            let tables = config.module_mut(module);
            for tile in &off_tiles {
                tables.metrics.remove(tile);
            }
            diags.debug(format!("{}: {} tile(s) switched off", module, off_tiles.len()));
        }
    }

    /// Put the complementary set on the sibling module unless an earlier
    /// pairing already claimed that tile.
    fn apply_pairing(
        &self,
        source: ModuleKey,
        tile: Tile,
        pairing: &Pairing,
        config: &mut ResolvedConfig,
        diags: &mut Diagnostics,
    ) {
        let valid = self.reader.tiles(ALL, pairing.module.module_type(), ALL);
        if !valid.contains(&tile) {
            diags.debug(format!(
                "Tile {} is not a valid {} tile; complementary set {} from {} not applied",
                tile, pairing.module, pairing.metric, source
            ));
            return;
        }

        let record = config
            .pair_metrics
            .protect(pairing.module, tile, &pairing.metric, source)
            .clone();
        if record.metric != pairing.metric {
            diags.warn(format!(
                "Tile {} on module {} is already paired with {} by {}; ignoring complementary set {} from {}",
                tile, pairing.module, record.metric, record.source, pairing.metric, source
            ));
            return;
        }

        let sibling = config.module_mut(pairing.module);
        let prior = sibling.metrics.get(&tile).map(|s| s.metric.clone());
        if prior.as_deref() == Some(pairing.metric.as_str()) {
            return;
        }
        if let Some(prior) = prior {
            diags.warn(format!(
                "Replacing metric set {} with complementary set {} for tile {} on module {}",
                prior, pairing.metric, tile, pairing.module
            ));
        }
        sibling.metrics.insert(
            tile,
            MetricSetting::new(pairing.metric.clone(), Origin::Paired { from: source }),
        );
    }
}
