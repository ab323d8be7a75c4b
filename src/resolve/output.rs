//! Resolved per-module tables handed to the hardware programming layer.
//!
//! Every metric-set assignment carries an [`Origin`] so tests and callers can
//! see whether a value came straight from an entry, from defaulting, or from
//! complementary pairing.

use std::collections::BTreeMap;
use std::fmt;

use crate::plugin::ModuleKey;
use crate::topology::Tile;

/// Why a tile holds its metric set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Requested by a settings entry.
    Entry,
    /// Requested set was unsupported; the module default replaced it.
    Default,
    /// Implied by a complementary set on `from`.
    Paired { from: ModuleKey },
    /// Restored from an earlier pairing established by `from`.
    Protected { from: ModuleKey },
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Origin::Entry => write!(f, "entry"),
            Origin::Default => write!(f, "default"),
            Origin::Paired { from } => write!(f, "paired from {}", from),
            Origin::Protected { from } => write!(f, "protected by {}", from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricSetting {
    pub metric: String,
    pub origin: Origin,
}

impl MetricSetting {
    pub fn new(metric: impl Into<String>, origin: Origin) -> Self {
        Self {
            metric: metric.into(),
            origin,
        }
    }
}

/// Tile to metric set, for one module.
pub type ConfigMetrics = BTreeMap<Tile, MetricSetting>;

/// Tile to stream channel.
pub type ConfigChannel = BTreeMap<Tile, u8>;

/// Tile to byte threshold.
pub type UserSpecifiedBytes = BTreeMap<Tile, u32>;

/// The four output maps of one module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleTables {
    pub metrics: ConfigMetrics,
    pub channel0: ConfigChannel,
    pub channel1: ConfigChannel,
    pub bytes: UserSpecifiedBytes,
}

impl ModuleTables {
    pub fn metric(&self, tile: &Tile) -> Option<&str> {
        self.metrics.get(tile).map(|s| s.metric.as_str())
    }

    /// Metric set names without provenance.
    pub fn metric_names(&self) -> BTreeMap<Tile, String> {
        self.metrics
            .iter()
            .map(|(tile, s)| (*tile, s.metric.clone()))
            .collect()
    }

    /// Drop channel and byte entries for tiles without a metric set.
    pub fn prune_orphans(&mut self) -> usize {
        let before = self.channel0.len() + self.channel1.len() + self.bytes.len();
        let metrics = &self.metrics;
        self.channel0.retain(|tile, _| metrics.contains_key(tile));
        self.channel1.retain(|tile, _| metrics.contains_key(tile));
        self.bytes.retain(|tile, _| metrics.contains_key(tile));
        before - (self.channel0.len() + self.channel1.len() + self.bytes.len())
    }
}

/// A pairing recorded on a tile of a sibling module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtectedSetting {
    pub metric: String,
    /// Module whose set implied this one.
    pub source: ModuleKey,
}

/// Protection records keyed by (paired module, tile). First write wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PairConfigMetrics {
    records: BTreeMap<(ModuleKey, Tile), ProtectedSetting>,
}

impl PairConfigMetrics {
    pub fn get(&self, module: ModuleKey, tile: &Tile) -> Option<&ProtectedSetting> {
        self.records.get(&(module, *tile))
    }

    /// Record a pairing unless one already exists; returns the record in force.
    pub fn protect(&mut self, module: ModuleKey, tile: Tile, metric: &str, source: ModuleKey) -> &ProtectedSetting {
        self.records
            .entry((module, tile))
            .or_insert_with(|| ProtectedSetting {
                metric: metric.to_string(),
                source,
            })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModuleKey, &Tile, &ProtectedSetting)> {
        self.records.iter().map(|((m, t), s)| (*m, t, s))
    }
}

/// Output of one resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolvedConfig {
    modules: BTreeMap<ModuleKey, ModuleTables>,
    pub pair_metrics: PairConfigMetrics,
}

impl ResolvedConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn module(&self, module: ModuleKey) -> Option<&ModuleTables> {
        self.modules.get(&module)
    }

    pub fn module_mut(&mut self, module: ModuleKey) -> &mut ModuleTables {
        self.modules.entry(module).or_default()
    }

    /// Metric set names for `module`; empty when nothing resolved.
    pub fn metric_names(&self, module: ModuleKey) -> BTreeMap<Tile, String> {
        self.module(module)
            .map(ModuleTables::metric_names)
            .unwrap_or_default()
    }

    pub fn modules(&self) -> impl Iterator<Item = (ModuleKey, &ModuleTables)> {
        self.modules.iter().map(|(k, t)| (*k, t))
    }

    /// Prune orphan channel/byte entries in every module.
    pub fn prune_orphans(&mut self) -> usize {
        self.modules.values_mut().map(ModuleTables::prune_orphans).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protect_first_write_wins() {
        let mut pairs = PairConfigMetrics::default();
        let tile = Tile::new(0, 2);
        pairs.protect(ModuleKey::AieMemory, tile, "s2mm_throughputs", ModuleKey::Aie);
        let kept = pairs.protect(ModuleKey::AieMemory, tile, "mm2s_throughputs", ModuleKey::Aie);
        assert_eq!(kept.metric, "s2mm_throughputs");
        assert_eq!(pairs.len(), 1);
        assert!(pairs.get(ModuleKey::Aie, &tile).is_none());
    }

    #[test]
    fn test_prune_orphans() {
        let mut config = ResolvedConfig::new();
        let kept = Tile::new(0, 0);
        let dropped = Tile::new(1, 0);
        let tables = config.module_mut(ModuleKey::InterfaceTile);
        tables.metrics.insert(kept, MetricSetting::new("input_throughputs", Origin::Entry));
        tables.channel0.insert(kept, 0);
        tables.channel0.insert(dropped, 0);
        tables.channel1.insert(dropped, 1);
        tables.bytes.insert(dropped, 4096);

        assert_eq!(config.prune_orphans(), 3);
        let tables = config.module(ModuleKey::InterfaceTile).unwrap();
        assert_eq!(tables.channel0.len(), 1);
        assert!(tables.channel1.is_empty());
        assert!(tables.bytes.is_empty());
    }

    #[test]
    fn test_metric_names() {
        let mut config = ResolvedConfig::new();
        config
            .module_mut(ModuleKey::Aie)
            .metrics
            .insert(Tile::new(0, 2), MetricSetting::new("heat_map", Origin::Default));
        let names = config.metric_names(ModuleKey::Aie);
        assert_eq!(names.get(&Tile::new(0, 2)).map(String::as_str), Some("heat_map"));
        assert!(config.metric_names(ModuleKey::MemoryTile).is_empty());
        assert_eq!(Origin::Paired { from: ModuleKey::Aie }.to_string(), "paired from aie");
    }
}
