//! Walk a settings document for one plugin.
//!
//! ```text
//! {
//!   "version": "1.0",
//!   "aie_profile": {                       <- plugin
//!     "interval_us": 100,                  <- scalar settings
//!     "tiles":  { "aie": [ {...}, ... ] }, <- section -> module -> entries
//!     "graphs": { "interface_tile": [ ... ] }
//!   },
//!   "aie_trace": { ... }
//! }
//! ```
//!
//! Nothing in the document is fatal. Unknown plugins, sections and modules
//! are reported and skipped; invalid entries are dropped one at a time while
//! their siblings are kept.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;

use crate::diagnostics::Diagnostics;
use crate::metrics::{
    CollectionKind, ConstructionError, MetricCollection, MetricEntry, MetricType,
    MetricsCollectionManager,
};
use crate::parser::document::{load_document, write_document, LoadError};
use crate::parser::schema::{as_int, as_string, SchemaValidator, Section};
use crate::plugin::{ModuleKey, Plugin};

/// How a profiling run decides when to start collecting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartType {
    Time,
    Iteration,
}

/// Plugin-level scalar settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PluginOptions {
    pub interval_us: Option<u32>,
    pub start_type: Option<StartType>,
    pub start_iteration: Option<u32>,
}

/// Validated entries of one module, from the section that configured it.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleSettings {
    pub section: Section,
    pub module: ModuleKey,
    pub entries: Vec<Value>,
}

/// Everything one plugin takes from a settings document.
#[derive(Debug, Clone, PartialEq)]
pub struct PluginSettings {
    pub plugin: Plugin,
    pub options: PluginOptions,
    /// Modules in document order.
    pub modules: Vec<ModuleSettings>,
    /// False when the plugin body yielded no usable module.
    pub is_valid: bool,
}

impl PluginSettings {
    fn new(plugin: Plugin) -> Self {
        Self {
            plugin,
            options: PluginOptions::default(),
            modules: Vec::new(),
            is_valid: true,
        }
    }

    pub fn module(&self, module: ModuleKey) -> Option<&ModuleSettings> {
        self.modules.iter().find(|m| m.module == module)
    }

    /// Turn the validated entries into typed collections.
    ///
    /// Fails only on an internal mismatch between a module and the entry
    /// shapes it supports.
    pub fn build_collections(&self) -> Result<MetricsCollectionManager, ConstructionError> {
        let mut manager = MetricsCollectionManager::new();
        for settings in &self.modules {
            let ty = MetricType::new(settings.section, settings.module);
            let mut collection = MetricCollection::new(CollectionKind::for_section(settings.section));
            for entry in &settings.entries {
                collection.push(MetricEntry::from_json(ty, entry)?)?;
            }
            manager.add(settings.module.module_type(), settings.module.as_str(), collection);
        }
        Ok(manager)
    }
}

/// Document walker; owns the schema tables.
#[derive(Debug, Clone, Default)]
pub struct SettingsParser {
    validator: SchemaValidator,
}

impl SettingsParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validator(&self) -> &SchemaValidator {
        &self.validator
    }

    /// Load `path` and extract the settings for `plugin`.
    pub fn parse_file(&self, path: &Path, plugin: Plugin, diags: &mut Diagnostics) -> Option<PluginSettings> {
        let result = load_document(path, diags);
        self.parse_document(&result.tree, plugin, diags)
    }

    /// Extract the settings for `plugin` from a loaded document.
    ///
    /// Returns `None` when the document has no body for `plugin`.
    pub fn parse_document(&self, doc: &Value, plugin: Plugin, diags: &mut Diagnostics) -> Option<PluginSettings> {
        let Some(root) = doc.as_object() else {
            diags.warn("Settings document must be an object; ignoring it");
            return None;
        };

        let mut found = None;
        for (key, body) in root {
            if key == "version" {
                let version = as_string(body).unwrap_or_else(|| body.to_string());
                diags.info(format!("Settings document version {}", version));
                continue;
            }
            match Plugin::from_name(key) {
                None => diags.warn(format!("Unknown plugin '{}' in settings document; skipped", key)),
                Some(p) if p != plugin => diags.debug(format!("Skipping settings for plugin {}", p)),
                Some(_) => found = Some(self.parse_plugin(plugin, body, diags)),
            }
        }

        if found.is_none() {
            diags.debug(format!("No settings for plugin {}; defaults apply", plugin));
        }
        found
    }

    fn parse_plugin(&self, plugin: Plugin, body: &Value, diags: &mut Diagnostics) -> PluginSettings {
        let mut settings = PluginSettings::new(plugin);

        let Some(body) = body.as_object() else {
            diags.warn(format!("Settings for plugin {} must be an object; skipped", plugin));
            settings.is_valid = false;
            return settings;
        };

        let mut seen: HashMap<ModuleKey, Section> = HashMap::new();

        for (key, value) in body {
            if self.validator.is_plugin_setting(key) {
                self.parse_option(plugin, key, value, &mut settings.options, diags);
                continue;
            }

            let Some(section) = Section::from_key(key) else {
                diags.warn(format!("Unknown section '{}' in plugin {}; skipped", key, plugin));
                continue;
            };
            let Some(modules) = value.as_object() else {
                diags.warn(format!(
                    "Section '{}' in plugin {} must map module names to entry arrays; skipped",
                    section, plugin
                ));
                continue;
            };

            for (name, entries) in modules {
                let Some(module) = ModuleKey::from_key(name).filter(|m| plugin.supports(*m)) else {
                    diags.warn(format!(
                        "Unknown module '{}' in {}.{}; skipped",
                        name, plugin, section
                    ));
                    continue;
                };
                if !self.validator.supports(section, module) {
                    diags.warn(format!(
                        "Module '{}' is not supported in section '{}'; skipped",
                        module, section
                    ));
                    continue;
                }
                if let Some(first) = seen.get(&module) {
                    diags.warn(format!(
                        "Module '{}' already configured in section '{}'; ignoring its '{}' settings",
                        module, first, section
                    ));
                    continue;
                }
                seen.insert(module, section);

                let Some(entries) = entries.as_array() else {
                    diags.warn(format!(
                        "Settings for module '{}' must be an array of entries; skipped",
                        module
                    ));
                    continue;
                };

                let valid: Vec<Value> = entries
                    .iter()
                    .filter(|entry| {
                        let result = self.validator.validate(section, module, entry);
                        diags.extend_validation(module.as_str(), &result);
                        result.is_valid
                    })
                    .cloned()
                    .collect();

                if valid.is_empty() {
                    diags.warn(format!("No valid metrics found for module {}", module));
                    continue;
                }

                log::debug!(
                    "{}.{}.{}: {} of {} entries accepted",
                    plugin,
                    section,
                    module,
                    valid.len(),
                    entries.len()
                );
                settings.modules.push(ModuleSettings {
                    section,
                    module,
                    entries: valid,
                });
            }
        }

        if settings.modules.is_empty() {
            settings.is_valid = false;
            diags.error(format!("No valid module settings found for plugin {}", plugin));
        }

        settings
    }

    fn parse_option(
        &self,
        plugin: Plugin,
        key: &str,
        value: &Value,
        options: &mut PluginOptions,
        diags: &mut Diagnostics,
    ) {
        let result = self.validator.validate_plugin_setting(key, value);
        if !result.is_valid {
            diags.warn(format!(
                "Invalid {} setting for plugin {}: {}; ignored",
                key,
                plugin,
                result.errors.join("; ")
            ));
            return;
        }

        let as_u32 = |v: &Value| as_int(v).and_then(|n| u32::try_from(n).ok());
        match key {
            "interval_us" => options.interval_us = as_u32(value),
            "start_iteration" => options.start_iteration = as_u32(value),
            "start_type" => {
                options.start_type = match as_string(value).as_deref() {
                    Some("time") => Some(StartType::Time),
                    Some("iteration") => Some(StartType::Iteration),
                    _ => None,
                }
            }
            _ => {}
        }
    }
}

/// Write a collection back out in document shape.
pub fn write_collection(path: &Path, collection: &MetricCollection) -> Result<(), LoadError> {
    write_document(path, &collection.to_json())?;
    log::info!("Wrote {} entries to {}", collection.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use crate::topology::ModuleType;
    use serde_json::json;

    fn parse(doc: Value, plugin: Plugin) -> (Option<PluginSettings>, Diagnostics) {
        let mut diags = Diagnostics::new();
        let settings = SettingsParser::new().parse_document(&doc, plugin, &mut diags);
        (settings, diags)
    }

    #[test]
    fn test_plugin_options() {
        let (settings, diags) = parse(
            json!({"aie_profile": {
                "interval_us": "250",
                "start_type": "iteration",
                "start_iteration": 4,
                "tiles": {"aie": [{"metric": "heat_map", "all_tiles": true}]}
            }}),
            Plugin::AieProfile,
        );
        let settings = settings.unwrap();
        assert!(settings.is_valid);
        assert_eq!(
            settings.options,
            PluginOptions {
                interval_us: Some(250),
                start_type: Some(StartType::Iteration),
                start_iteration: Some(4),
            }
        );
        assert_eq!(diags.count(Severity::Warning), 0);
    }

    #[test]
    fn test_invalid_option_is_warning() {
        let (settings, diags) = parse(
            json!({"aie_profile": {
                "start_type": "kernel",
                "tiles": {"aie": [{"metric": "heat_map", "all_tiles": true}]}
            }}),
            Plugin::AieProfile,
        );
        assert_eq!(settings.unwrap().options.start_type, None);
        assert!(diags.warnings().any(|w| w.contains("start_type")));
    }

    #[test]
    fn test_version_and_other_plugins() {
        let (settings, diags) = parse(
            json!({
                "version": "1.0",
                "aie_trace": {"tiles": {"aie_tile": [{"metric": "functions", "all_tiles": true}]}},
                "aie_status": {},
                "aie_profile": {"tiles": {"aie": [{"metric": "stalls", "all_tiles": true}]}}
            }),
            Plugin::AieProfile,
        );
        assert_eq!(settings.unwrap().modules.len(), 1);
        assert_eq!(diags.count(Severity::Info), 1);
        assert_eq!(diags.warnings().collect::<Vec<_>>(), vec![
            "Unknown plugin 'aie_status' in settings document; skipped"
        ]);
    }

    #[test]
    fn test_missing_plugin() {
        let (settings, diags) = parse(json!({"aie_trace": {}}), Plugin::AieProfile);
        assert!(settings.is_none());
        assert!(!diags.has_errors());
    }

    #[test]
    fn test_unknown_section_and_module() {
        let (settings, diags) = parse(
            json!({"aie_profile": {
                "kernels": {},
                "tiles": {
                    "aie_tile": [{"metric": "functions", "all_tiles": true}],
                    "shim": [],
                    "aie": [{"metric": "stalls", "all_tiles": true}]
                }
            }}),
            Plugin::AieProfile,
        );
        let settings = settings.unwrap();
        assert_eq!(settings.modules.len(), 1);
        assert_eq!(diags.count(Severity::Warning), 3);
    }

    #[test]
    fn test_first_section_wins() {
        let (settings, diags) = parse(
            json!({"aie_profile": {
                "graphs": {"aie": [{"graph": "all", "kernel": "all", "metric": "stalls"}]},
                "tiles": {"aie": [{"metric": "heat_map", "all_tiles": true}]}
            }}),
            Plugin::AieProfile,
        );
        let settings = settings.unwrap();
        let aie = settings.module(ModuleKey::Aie).unwrap();
        assert_eq!(aie.section, Section::Graphs);
        assert!(diags.warnings().any(|w| w.contains("already configured in section 'graphs'")));
    }

    #[test]
    fn test_invalid_entry_dropped_siblings_kept() {
        let (settings, diags) = parse(
            json!({"aie_profile": {"tiles": {"aie": [
                {"metric": "stalls", "col": 5},
                {"metric": "heat_map", "col": 1, "row": 0}
            ]}}}),
            Plugin::AieProfile,
        );
        let settings = settings.unwrap();
        assert_eq!(settings.module(ModuleKey::Aie).unwrap().entries.len(), 1);
        let error = diags.errors().next().unwrap();
        assert!(error.contains("'all_tiles': true, 'col'/'row' pair, or 'start'/'end' range"));
    }

    #[test]
    fn test_all_entries_invalid() {
        let (settings, diags) = parse(
            json!({"aie_profile": {"tiles": {"aie": [{"all_tiles": true}]}}}),
            Plugin::AieProfile,
        );
        let settings = settings.unwrap();
        assert!(!settings.is_valid);
        assert!(diags.warnings().any(|w| w == "No valid metrics found for module aie"));
    }

    #[test]
    fn test_microcontroller_graphs_rejected() {
        let (settings, diags) = parse(
            json!({"aie_profile": {
                "graphs": {"microcontroller": [{"metric": "execution"}]},
                "tiles": {"microcontroller": [{"metric": "execution", "col": 0}]}
            }}),
            Plugin::AieProfile,
        );
        let settings = settings.unwrap();
        assert_eq!(settings.module(ModuleKey::Microcontroller).unwrap().section, Section::Tiles);
        assert!(diags.warnings().any(|w| w.contains("not supported in section 'graphs'")));
    }

    #[test]
    fn test_build_collections() {
        let (settings, _) = parse(
            json!({"aie_trace": {
                "tiles": {"aie_tile": [
                    {"metric": "functions", "start": [0, 0], "end": [1, 1]},
                    {"metric": "all", "col": 2, "row": 0}
                ]},
                "graphs": {"interface_tile": [{"port": "in0", "metric": "input_ports", "channels": [1]}]}
            }}),
            Plugin::AieTrace,
        );
        let manager = settings.unwrap().build_collections().unwrap();
        assert_eq!(manager.len(), 2);
        let tiles = manager.get(ModuleType::Dma, "aie_tile").unwrap();
        assert!(tiles.is_tile_based());
        assert_eq!(tiles.len(), 2);
        let graphs = manager.get(ModuleType::Shim, "interface_tile").unwrap();
        assert_eq!(graphs.entries()[0].channel1(), Some(1));
    }

    #[test]
    fn test_build_rejects_unsupported_shape() {
        let settings = PluginSettings {
            plugin: Plugin::AieProfile,
            options: PluginOptions::default(),
            modules: vec![ModuleSettings {
                section: Section::Graphs,
                module: ModuleKey::Microcontroller,
                entries: vec![json!({"metric": "execution"})],
            }],
            is_valid: true,
        };
        assert!(matches!(
            settings.build_collections(),
            Err(ConstructionError::UnsupportedType { .. })
        ));
    }

    #[test]
    fn test_parse_file_and_write_collection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("xdp.json");
        std::fs::write(
            &path,
            r#"{"aie_profile": {"tiles": {"memory_tile": [{"metric": "input_channels", "start": [0, 0], "end": [2, 0], "channels": [0, 1]}]}}}"#,
        )
        .unwrap();

        let parser = SettingsParser::new();
        let mut diags = Diagnostics::new();
        let settings = parser.parse_file(&path, Plugin::AieProfile, &mut diags).unwrap();
        let manager = settings.build_collections().unwrap();
        let collection = manager.get(ModuleType::MemTile, "memory_tile").unwrap();

        let out = dir.path().join("memory_tile.json");
        write_collection(&out, collection).unwrap();
        let written: Value = serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(written, json!([{"start": [0, 0], "end": [2, 0], "metric": "input_channels", "channels": [0, 1]}]));
    }

    #[test]
    fn test_write_collection_reports_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let collection = MetricCollection::new(CollectionKind::TileBased);
        let err = write_collection(&dir.path().join("missing/out.json"), &collection).unwrap_err();
        assert!(matches!(err, LoadError::Write { .. }));
    }
}
