//! Hand-off store between settings parsing and resolution.

use std::collections::BTreeMap;

use crate::metrics::collection::MetricCollection;
use crate::topology::ModuleType;

/// Collections keyed by hardware module type and setting name.
///
/// The setting name is the document's module key (`"aie_memory"`,
/// `"aie_tile"`, ...), which keeps modules sharing a hardware type apart.
#[derive(Debug, Clone, Default)]
pub struct MetricsCollectionManager {
    collections: BTreeMap<(ModuleType, String), MetricCollection>,
}

impl MetricsCollectionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `collection`, replacing any earlier one under the same key.
    pub fn add(&mut self, module: ModuleType, setting: impl Into<String>, collection: MetricCollection) {
        let setting = setting.into();
        log::debug!(
            "Adding {} entries for {} ({})",
            collection.len(),
            setting,
            module
        );
        self.collections.insert((module, setting), collection);
    }

    pub fn get(&self, module: ModuleType, setting: &str) -> Option<&MetricCollection> {
        self.collections.get(&(module, setting.to_string()))
    }

    pub fn contains(&self, module: ModuleType, setting: &str) -> bool {
        self.get(module, setting).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModuleType, &str, &MetricCollection)> {
        self.collections
            .iter()
            .map(|((module, setting), c)| (*module, setting.as_str(), c))
    }

    pub fn len(&self) -> usize {
        self.collections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }
}
