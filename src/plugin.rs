//! Plugins and the module keys they accept.
//!
//! A settings document is organised as `plugin -> section -> module -> [entries]`.
//! The module key (`"aie"`, `"memory_tile"`, ...) decides which hardware module
//! the metric sets are programmed into and which entity field
//! (`kernel`/`buffer`/`port`) graph-based entries use.

use std::fmt;

use crate::metrics::entry::EntityKind;
use crate::topology::ModuleType;

/// Consumer of a settings document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Plugin {
    AieProfile,
    AieTrace,
}

const PROFILE_MODULES: &[ModuleKey] = &[
    ModuleKey::Aie,
    ModuleKey::AieMemory,
    ModuleKey::InterfaceTile,
    ModuleKey::MemoryTile,
    ModuleKey::Microcontroller,
];

const TRACE_MODULES: &[ModuleKey] = &[
    ModuleKey::AieTile,
    ModuleKey::MemoryTile,
    ModuleKey::InterfaceTile,
];

impl Plugin {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "aie_profile" => Some(Plugin::AieProfile),
            "aie_trace" => Some(Plugin::AieTrace),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Plugin::AieProfile => "aie_profile",
            Plugin::AieTrace => "aie_trace",
        }
    }

    /// Modules accepted by this plugin, in module-index order.
    pub fn modules(&self) -> &'static [ModuleKey] {
        match self {
            Plugin::AieProfile => PROFILE_MODULES,
            Plugin::AieTrace => TRACE_MODULES,
        }
    }

    pub fn supports(&self, module: ModuleKey) -> bool {
        self.modules().contains(&module)
    }

    /// Index of `module` within [`Plugin::modules`].
    pub fn module_index(&self, module: ModuleKey) -> Option<usize> {
        self.modules().iter().position(|m| *m == module)
    }
}

impl fmt::Display for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Module name as written in a settings document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ModuleKey {
    /// AIE core module (profile).
    Aie,
    /// AIE memory module (profile).
    AieMemory,
    /// Whole AIE tile, core and memory together (trace).
    AieTile,
    InterfaceTile,
    MemoryTile,
    Microcontroller,
}

impl ModuleKey {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "aie" => Some(ModuleKey::Aie),
            "aie_memory" => Some(ModuleKey::AieMemory),
            "aie_tile" => Some(ModuleKey::AieTile),
            "interface_tile" => Some(ModuleKey::InterfaceTile),
            "memory_tile" => Some(ModuleKey::MemoryTile),
            "microcontroller" => Some(ModuleKey::Microcontroller),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ModuleKey::Aie => "aie",
            ModuleKey::AieMemory => "aie_memory",
            ModuleKey::AieTile => "aie_tile",
            ModuleKey::InterfaceTile => "interface_tile",
            ModuleKey::MemoryTile => "memory_tile",
            ModuleKey::Microcontroller => "microcontroller",
        }
    }

    /// Hardware module the key's metric sets are programmed into.
    pub fn module_type(&self) -> ModuleType {
        match self {
            ModuleKey::Aie => ModuleType::Core,
            ModuleKey::AieMemory | ModuleKey::AieTile => ModuleType::Dma,
            ModuleKey::InterfaceTile => ModuleType::Shim,
            ModuleKey::MemoryTile => ModuleType::MemTile,
            ModuleKey::Microcontroller => ModuleType::Uc,
        }
    }

    /// Entity field used by graph-based entries; `None` when the module has
    /// no graph-based form.
    pub fn entity_kind(&self) -> Option<EntityKind> {
        match self {
            ModuleKey::Aie | ModuleKey::AieMemory | ModuleKey::AieTile => Some(EntityKind::Kernel),
            ModuleKey::MemoryTile => Some(EntityKind::Buffer),
            ModuleKey::InterfaceTile => Some(EntityKind::Port),
            ModuleKey::Microcontroller => None,
        }
    }

    /// Modules addressed by column only (no row component).
    pub fn is_column_addressed(&self) -> bool {
        matches!(self, ModuleKey::InterfaceTile | ModuleKey::Microcontroller)
    }

    /// Whether entries carry `channels` and `bytes`.
    pub fn has_stream_fields(&self) -> bool {
        *self != ModuleKey::Microcontroller
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plugin_names_round_trip() {
        for plugin in [Plugin::AieProfile, Plugin::AieTrace] {
            assert_eq!(Plugin::from_name(plugin.name()), Some(plugin));
        }
        assert_eq!(Plugin::from_name("aie_status"), None);
    }

    #[test]
    fn test_plugin_modules() {
        assert_eq!(Plugin::AieProfile.modules().len(), 5);
        assert!(Plugin::AieProfile.supports(ModuleKey::Microcontroller));
        assert!(!Plugin::AieProfile.supports(ModuleKey::AieTile));
        assert!(Plugin::AieTrace.supports(ModuleKey::AieTile));
        assert_eq!(Plugin::AieProfile.module_index(ModuleKey::InterfaceTile), Some(2));
        assert_eq!(Plugin::AieTrace.module_index(ModuleKey::Aie), None);
    }

    #[test]
    fn test_module_mapping() {
        assert_eq!(ModuleKey::Aie.module_type(), ModuleType::Core);
        assert_eq!(ModuleKey::AieTile.module_type(), ModuleType::Dma);
        assert_eq!(ModuleKey::MemoryTile.entity_kind(), Some(EntityKind::Buffer));
        assert_eq!(ModuleKey::InterfaceTile.entity_kind(), Some(EntityKind::Port));
        assert_eq!(ModuleKey::Microcontroller.entity_kind(), None);
        assert!(!ModuleKey::Microcontroller.has_stream_fields());
        assert!(ModuleKey::MemoryTile.has_stream_fields());
        assert_eq!(ModuleKey::from_key("memory_tile"), Some(ModuleKey::MemoryTile));
        assert_eq!(ModuleKey::from_key("shim"), None);
    }
}
