//! Turn metric collections into per-tile tables.
//!
//! - [`tables`] - supported sets, defaults and pairings per plugin
//! - [`engine`] - expansion, precedence, defaulting and pairing
//! - [`output`] - the resolved tables
//! - [`bytes`] - byte-threshold parsing

pub mod bytes;
pub mod engine;
pub mod output;
pub mod tables;

pub use engine::ResolutionEngine;
pub use output::{MetricSetting, ModuleTables, Origin, PairConfigMetrics, ResolvedConfig};
pub use tables::{MetricSetTables, ModuleMetricSets, Pairing};

use serde_json::Value;

use crate::diagnostics::Diagnostics;
use crate::metrics::ConstructionError;
use crate::parser::{PluginSettings, SettingsParser};
use crate::plugin::Plugin;
use crate::topology::TopologyReader;

/// Resolve parsed plugin settings with the plugin's built-in tables.
pub fn resolve_settings<R: TopologyReader + ?Sized>(
    settings: &PluginSettings,
    reader: &R,
    diags: &mut Diagnostics,
) -> Result<ResolvedConfig, ConstructionError> {
    let manager = settings.build_collections()?;
    let engine = ResolutionEngine::new(reader, MetricSetTables::for_plugin(settings.plugin));
    Ok(engine.resolve(&manager, diags))
}

/// Parse `doc` for `plugin` and resolve it.
///
/// A document without settings for `plugin` resolves to empty tables.
pub fn resolve_document<R: TopologyReader + ?Sized>(
    doc: &Value,
    plugin: Plugin,
    reader: &R,
    diags: &mut Diagnostics,
) -> Result<ResolvedConfig, ConstructionError> {
    match SettingsParser::new().parse_document(doc, plugin, diags) {
        Some(settings) => resolve_settings(&settings, reader, diags),
        None => Ok(ResolvedConfig::new()),
    }
}
