//! Configuration management for xdna-profile-config.
//!
//! Configuration is loaded from multiple sources in priority order:
//! 1. Environment variables (XDP_SETTINGS_PATH, XDP_TOPOLOGY_PATH, XDP_PLUGIN)
//! 2. Project-local config file (`./xdna-profile-config.toml`)
//! 3. User config file (`~/.config/xdna-profile-config/config.toml`)
//! 4. Built-in defaults
//!
//! # Config File Format
//!
//! ```toml
//! # xdna-profile-config.toml
//!
//! # Settings document to resolve
//! settings_path = "xdp.json"
//!
//! # JSON description of the compiled design
//! topology_path = "build/topology.json"
//!
//! # aie_profile or aie_trace
//! plugin = "aie_trace"
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::plugin::Plugin;

/// Global cached configuration.
static CONFIG: OnceLock<Config> = OnceLock::new();

const APP_DIR: &str = "xdna-profile-config";
const LOCAL_FILE: &str = "xdna-profile-config.toml";

/// xdna-profile-config configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Settings document (JSON).
    pub settings_path: Option<String>,

    /// Topology description (JSON). Required to resolve anything.
    pub topology_path: Option<String>,

    /// Plugin whose settings are resolved.
    pub plugin: Option<String>,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables
    /// 2. Project-local `xdna-profile-config.toml`
    /// 3. User config `~/.config/xdna-profile-config/config.toml`
    /// 4. Defaults
    pub fn load() -> Self {
        let mut config = Self::default();

        if let Some(user_config) = Self::load_user_config() {
            config.merge(user_config);
        }

        if let Some(local_config) = Self::load_from_file(Path::new(LOCAL_FILE)) {
            config.merge(local_config);
        }

        config.apply_env_overrides();

        config
    }

    /// Get the cached global configuration.
    pub fn get() -> &'static Config {
        CONFIG.get_or_init(|| {
            let config = Self::load();
            log::debug!("Loaded configuration: {:?}", config);
            config
        })
    }

    /// Settings document path, `xdp.json` when unset.
    pub fn settings_path(&self) -> PathBuf {
        PathBuf::from(self.settings_path.as_deref().unwrap_or("xdp.json"))
    }

    pub fn topology_path(&self) -> Option<PathBuf> {
        self.topology_path.as_ref().map(PathBuf::from)
    }

    /// Configured plugin, `aie_profile` when unset or unrecognised.
    pub fn plugin(&self) -> Plugin {
        match self.plugin.as_deref() {
            None => Plugin::AieProfile,
            Some(name) => Plugin::from_name(name).unwrap_or_else(|| {
                log::warn!("Unknown plugin '{}' in configuration; using aie_profile", name);
                Plugin::AieProfile
            }),
        }
    }

    fn load_user_config() -> Option<Self> {
        Self::load_from_file(&Self::user_config_path()?)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Option<Self> {
        if !path.exists() {
            return None;
        }

        match std::fs::read_to_string(path) {
            Ok(content) => match toml::from_str(&content) {
                Ok(config) => {
                    log::info!("Loaded config from {}", path.display());
                    Some(config)
                }
                Err(e) => {
                    log::warn!("Failed to parse {}: {}", path.display(), e);
                    None
                }
            },
            Err(e) => {
                log::warn!("Failed to read {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Merge another config into this one.
    /// Only overrides fields that are Some in the other config.
    fn merge(&mut self, other: Self) {
        if other.settings_path.is_some() {
            self.settings_path = other.settings_path;
        }
        if other.topology_path.is_some() {
            self.topology_path = other.topology_path;
        }
        if other.plugin.is_some() {
            self.plugin = other.plugin;
        }
    }

    fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(path) = lookup("XDP_SETTINGS_PATH") {
            log::info!("Using XDP_SETTINGS_PATH from environment: {}", path);
            self.settings_path = Some(path);
        }
        if let Some(path) = lookup("XDP_TOPOLOGY_PATH") {
            log::info!("Using XDP_TOPOLOGY_PATH from environment: {}", path);
            self.topology_path = Some(path);
        }
        if let Some(plugin) = lookup("XDP_PLUGIN") {
            log::info!("Using XDP_PLUGIN from environment: {}", plugin);
            self.plugin = Some(plugin);
        }
    }

    /// Get the path to the user config file (for display/creation).
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
    }

    /// Generate a sample config file content.
    pub fn sample_config() -> String {
        r#"# xdna-profile-config configuration
# Place this file at ~/.config/xdna-profile-config/config.toml or ./xdna-profile-config.toml

# Settings document to resolve (defaults to ./xdp.json)
settings_path = "xdp.json"

# JSON description of the compiled design
# topology_path = "build/topology.json"

# Plugin to resolve: aie_profile or aie_trace
# plugin = "aie_profile"
"#
        .to_string()
    }
}
