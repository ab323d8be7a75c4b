//! Typed metric entries and the collections they are grouped into.
//!
//! - [`entry`] - one directive (graph-based or tile-based)
//! - [`collection`] - ordered entries for one module/section
//! - [`manager`] - collections keyed for the resolver

pub mod collection;
pub mod entry;
pub mod manager;

pub use collection::{CollectionKind, MetricCollection};
pub use entry::{Channels, ConstructionError, EntityKind, MetricEntry, MetricType, TileSpec};
pub use manager::MetricsCollectionManager;
