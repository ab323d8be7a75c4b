//! xdna-profile-config library
//!
//! Resolves AIE profile and trace settings documents into per-tile metric
//! set tables.
//!
//! - [`parser`] - document loading, schema validation, plugin walk
//! - [`metrics`] - typed entries and collections
//! - [`resolve`] - expansion and conflict resolution
//! - [`topology`] - what the compiled design and the array look like
//! - [`diagnostics`] - everything reported along the way

pub mod config;
pub mod diagnostics;
pub mod metrics;
pub mod parser;
pub mod plugin;
pub mod resolve;
pub mod topology;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use plugin::{ModuleKey, Plugin};
pub use resolve::{resolve_document, resolve_settings, ResolvedConfig};
