//! Settings document parsing.
//!
//! - [`document`] - load the JSON document from disk
//! - [`schema`] - per-module field tables and entry validation
//! - [`settings`] - plugin/section/module walk and collection building

pub mod document;
pub mod schema;
pub mod settings;

pub use document::{load_document, LoadError, ParseResult};
pub use schema::{SchemaValidator, Section, ValidationResult};
pub use settings::{PluginOptions, PluginSettings, SettingsParser, StartType};
