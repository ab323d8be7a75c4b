//! Per-module schema for settings entries.
//!
//! Every `(section, module)` pair has a table of [`SchemaField`] rows. An
//! entry is checked field by field, then tile-based entries get a structural
//! check that exactly one tile specification style is present.
//!
//! ```text
//! tiles.aie[i]                         graphs.interface_tile[i]
//! +-----------+---------+-------+      +---------+---------+--------+
//! | metric    | string  | req   |      | graph   | string  | opt    |
//! | all_tiles | bool    | opt   |      | port    | string  | opt    |
//! | col / row | int     | opt   |      | metric  | string  | req    |
//! | start/end | array   | opt   |      | channels| array   | opt    |
//! | channels  | array   | opt   |      | bytes   | string  | opt    |
//! | bytes     | string  | opt   |      +---------+---------+--------+
//! +-----------+---------+-------+
//! ```
//!
//! Errors reject the entry. Warnings keep it and report the anomaly.
//! The tables are built once per [`SchemaValidator`] and never mutated.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;

use crate::plugin::ModuleKey;

/// Settings section an entry was found under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Section {
    /// Coordinate-based entries.
    Tiles,
    /// Name-based entries.
    Graphs,
}

impl Section {
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "tiles" => Some(Section::Tiles),
            "graphs" => Some(Section::Graphs),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Section::Tiles => "tiles",
            Section::Graphs => "graphs",
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Expected JSON shape of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Int,
    Bool,
    Array,
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FieldType::String => "string",
            FieldType::Int => "integer",
            FieldType::Bool => "boolean",
            FieldType::Array => "array",
        };
        write!(f, "{}", s)
    }
}

/// One row of a schema table.
#[derive(Debug, Clone)]
pub struct SchemaField {
    pub name: &'static str,
    pub required: bool,
    pub ty: FieldType,
    /// Accepted values for string fields; empty means unrestricted.
    pub allowed_values: &'static [&'static str],
    /// Inclusive bounds for integer fields.
    pub bounds: Option<(i64, i64)>,
}

impl SchemaField {
    const fn new(name: &'static str, required: bool, ty: FieldType) -> Self {
        Self {
            name,
            required,
            ty,
            allowed_values: &[],
            bounds: None,
        }
    }

    const fn string(name: &'static str, required: bool) -> Self {
        Self::new(name, required, FieldType::String)
    }

    const fn coordinate(name: &'static str) -> Self {
        Self {
            bounds: Some((0, u8::MAX as i64)),
            ..Self::new(name, false, FieldType::Int)
        }
    }

    const fn array(name: &'static str) -> Self {
        Self::new(name, false, FieldType::Array)
    }

    const fn flag(name: &'static str) -> Self {
        Self::new(name, false, FieldType::Bool)
    }
}

/// Outcome of validating one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }
}

impl ValidationResult {
    pub fn add_error(&mut self, message: impl Into<String>) {
        self.is_valid = false;
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn merge(&mut self, other: ValidationResult) {
        self.is_valid &= other.is_valid;
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }
}

// ---------------------------------------------------------------------------
// Coercion helpers
// ---------------------------------------------------------------------------

/// Integer from a JSON integer or a decimal string.
pub fn as_int(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Boolean from a JSON boolean or `"true"`/`"false"`.
pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// String from any scalar.
pub fn as_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// A `[col, row]` pair with both components in 0..=255.
pub fn as_coordinate(value: &Value) -> Option<(u8, u8)> {
    let items = value.as_array()?;
    if items.len() != 2 {
        return None;
    }
    let col = u8::try_from(as_int(&items[0])?).ok()?;
    let row = u8::try_from(as_int(&items[1])?).ok()?;
    Some((col, row))
}

fn render(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Schema tables
// ---------------------------------------------------------------------------

const START_TYPES: &[&str] = &["time", "iteration"];

fn tile_fields(module: ModuleKey) -> Vec<SchemaField> {
    let mut fields = vec![
        SchemaField::string("metric", true),
        SchemaField::flag("all_tiles"),
        SchemaField::coordinate("col"),
        SchemaField::coordinate("row"),
        SchemaField::array("start"),
        SchemaField::array("end"),
    ];
    if module.has_stream_fields() {
        fields.push(SchemaField::array("channels"));
        fields.push(SchemaField::string("bytes", false));
    }
    fields
}

fn graph_fields(module: ModuleKey) -> Option<Vec<SchemaField>> {
    let entity = module.entity_kind()?.field_name();
    Some(vec![
        SchemaField::string("graph", false),
        SchemaField::string(entity, false),
        SchemaField::string("metric", true),
        SchemaField::array("channels"),
        SchemaField::string("bytes", false),
    ])
}

/// Validates plugin scalar settings and module entries.
#[derive(Debug, Clone)]
pub struct SchemaValidator {
    schemas: HashMap<(Section, ModuleKey), Vec<SchemaField>>,
    plugin_fields: Vec<SchemaField>,
}

impl Default for SchemaValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaValidator {
    pub fn new() -> Self {
        const MODULES: [ModuleKey; 6] = [
            ModuleKey::Aie,
            ModuleKey::AieMemory,
            ModuleKey::AieTile,
            ModuleKey::InterfaceTile,
            ModuleKey::MemoryTile,
            ModuleKey::Microcontroller,
        ];

        let mut schemas = HashMap::new();
        for module in MODULES {
            schemas.insert((Section::Tiles, module), tile_fields(module));
            if let Some(fields) = graph_fields(module) {
                schemas.insert((Section::Graphs, module), fields);
            }
        }

        let plugin_fields = vec![
            SchemaField {
                bounds: Some((0, u32::MAX as i64)),
                ..SchemaField::new("interval_us", false, FieldType::Int)
            },
            SchemaField {
                allowed_values: START_TYPES,
                ..SchemaField::string("start_type", false)
            },
            SchemaField {
                bounds: Some((0, u32::MAX as i64)),
                ..SchemaField::new("start_iteration", false, FieldType::Int)
            },
        ];

        Self {
            schemas,
            plugin_fields,
        }
    }

    /// Whether `module` may appear under `section`.
    pub fn supports(&self, section: Section, module: ModuleKey) -> bool {
        self.schemas.contains_key(&(section, module))
    }

    pub fn fields(&self, section: Section, module: ModuleKey) -> Option<&[SchemaField]> {
        self.schemas.get(&(section, module)).map(Vec::as_slice)
    }

    /// Names of the plugin-level scalar settings.
    pub fn is_plugin_setting(&self, key: &str) -> bool {
        self.plugin_fields.iter().any(|f| f.name == key)
    }

    /// Validate one plugin-level scalar setting.
    pub fn validate_plugin_setting(&self, key: &str, value: &Value) -> ValidationResult {
        let mut result = ValidationResult::default();
        match self.plugin_fields.iter().find(|f| f.name == key) {
            Some(field) => check_field(field, value, &mut result),
            None => result.add_error(format!("unknown plugin setting '{}'", key)),
        }
        result
    }

    /// Validate one entry of `module` under `section`.
    pub fn validate(&self, section: Section, module: ModuleKey, entry: &Value) -> ValidationResult {
        let mut result = ValidationResult::default();

        let Some(fields) = self.fields(section, module) else {
            result.add_error(format!(
                "module '{}' is not supported in section '{}'",
                module, section
            ));
            return result;
        };

        let Some(object) = entry.as_object() else {
            result.add_error(format!("entry must be an object, found: {}", entry));
            return result;
        };

        for field in fields {
            match object.get(field.name) {
                Some(value) => check_field(field, value, &mut result),
                None if field.required => {
                    result.add_error(format!("required field '{}' is missing", field.name))
                }
                None => {}
            }
        }

        for key in object.keys() {
            if !fields.iter().any(|f| f.name == key) {
                result.add_warning(format!("unknown field '{}' ignored", key));
            }
        }

        if section == Section::Tiles {
            result.merge(check_tile_spec(module, entry));
        }

        result
    }
}

fn check_field(field: &SchemaField, value: &Value, result: &mut ValidationResult) {
    match field.ty {
        FieldType::String => match as_string(value) {
            Some(s) => {
                if !field.allowed_values.is_empty() && !field.allowed_values.contains(&s.as_str()) {
                    result.add_error(format!(
                        "invalid value '{}' for field '{}'. Allowed values: {}",
                        s,
                        field.name,
                        field.allowed_values.join(", ")
                    ));
                }
            }
            None => result.add_error(type_error(field, value)),
        },
        FieldType::Int => match as_int(value) {
            Some(n) => {
                if let Some((lo, hi)) = field.bounds {
                    if n < lo || n > hi {
                        result.add_error(format!(
                            "field '{}' value {} is out of range ({}-{})",
                            field.name, n, lo, hi
                        ));
                    }
                }
            }
            None => result.add_error(type_error(field, value)),
        },
        FieldType::Bool => {
            if as_bool(value).is_none() {
                result.add_error(type_error(field, value));
            }
        }
        FieldType::Array => match value.as_array() {
            Some(items) => match field.name {
                "channels" => check_channels(items, result),
                "start" | "end" => check_coordinate(field.name, items, result),
                _ => {}
            },
            None => result.add_error(type_error(field, value)),
        },
    }
}

fn type_error(field: &SchemaField, value: &Value) -> String {
    format!(
        "field '{}' must be of type {} (found: {})",
        field.name, field.ty, value
    )
}

fn check_channels(items: &[Value], result: &mut ValidationResult) {
    if items.is_empty() || items.len() > 2 {
        result.add_error(format!(
            "field 'channels' must hold 1 or 2 entries (found {})",
            items.len()
        ));
        return;
    }

    let valid = |v: &Value| as_int(v).is_some_and(|n| (0..=255).contains(&n));
    if items.iter().all(valid) {
        return;
    }

    let listed: Vec<String> = items
        .iter()
        .map(|v| {
            if valid(v) {
                render(v)
            } else {
                format!("{} (invalid)", render(v))
            }
        })
        .collect();
    result.add_error(format!(
        "field 'channels' entries must be integers 0-255: [{}]",
        listed.join(", ")
    ));
}

fn check_coordinate(name: &str, items: &[Value], result: &mut ValidationResult) {
    if items.len() != 2 {
        result.add_error(format!(
            "field '{}' must hold exactly 2 integers [col, row] (found {})",
            name,
            items.len()
        ));
        return;
    }
    for (axis, item) in ["column", "row"].iter().zip(items) {
        match as_int(item) {
            Some(n) if (0..=255).contains(&n) => {}
            Some(n) => result.add_error(format!(
                "field '{}' {} {} is out of range (0-255)",
                name, axis, n
            )),
            None => result.add_error(format!(
                "field '{}' {} must be an integer (found: {})",
                name, axis, item
            )),
        }
    }
}

/// Exactly one tile specification style, and a well-ordered range.
fn check_tile_spec(module: ModuleKey, entry: &Value) -> ValidationResult {
    let mut result = ValidationResult::default();

    let has_all = entry.get("all_tiles").and_then(as_bool) == Some(true);
    let has_col = entry.get("col").is_some();
    let has_row = entry.get("row").is_some();
    let has_range = entry.get("start").is_some();
    let has_single = if module.is_column_addressed() {
        has_col
    } else {
        has_col && has_row
    };

    let mut styles = Vec::new();
    if has_all {
        styles.push("'all_tiles'");
    }
    if has_single {
        styles.push(if has_row { "'col'/'row'" } else { "'col'" });
    }
    if has_range {
        styles.push("'start'/'end'");
    }

    match styles.len() {
        0 => {
            let mut current = Vec::new();
            if has_col {
                current.push("'col'");
            }
            if has_row {
                current.push("'row'");
            }
            if entry.get("end").is_some() {
                current.push("'end'");
            }
            let current = if current.is_empty() {
                "none".to_string()
            } else {
                current.join(", ")
            };
            let pair = if module.is_column_addressed() {
                "'col' (with optional 'row')"
            } else {
                "'col'/'row' pair"
            };
            result.add_error(format!(
                "incomplete tile specification (found: {}). Use either 'all_tiles': true, {}, or 'start'/'end' range",
                current, pair
            ));
        }
        1 => {}
        _ => result.add_error(format!(
            "conflicting tile specifications {}. Use exactly one of 'all_tiles', 'col'/'row' or 'start'/'end'",
            styles.join(", ")
        )),
    }

    if !styles.is_empty() && !has_single {
        if has_col {
            result.add_warning("field 'col' has no effect without 'row'");
        } else if has_row {
            result.add_warning("field 'row' has no effect without 'col'");
        }
    }

    if entry.get("end").is_some() && !has_range {
        result.add_warning("field 'end' has no effect without 'start'");
    }

    if has_range {
        let start = entry.get("start").and_then(as_coordinate);
        let end = match entry.get("end") {
            Some(v) => as_coordinate(v),
            None => start,
        };
        if let (Some(start), Some(end)) = (start, end) {
            let bad = if start.0 > end.0 {
                Some(("column", start.0, end.0))
            } else if start.1 > end.1 {
                Some(("row", start.1, end.1))
            } else {
                None
            };
            if let Some((axis, s, e)) = bad {
                result.add_error(format!(
                    "invalid tile range: start [{}, {}] exceeds end [{}, {}] ({} {} > {})",
                    start.0, start.1, end.0, end.1, axis, s, e
                ));
            }
        }
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validate(section: Section, module: ModuleKey, entry: Value) -> ValidationResult {
        SchemaValidator::new().validate(section, module, &entry)
    }

    #[test]
    fn test_all_tiles_entry_is_valid() {
        let r = validate(
            Section::Tiles,
            ModuleKey::Aie,
            json!({"metric": "heat_map", "all_tiles": true}),
        );
        assert!(r.is_valid, "{:?}", r.errors);
        assert!(r.warnings.is_empty());
    }

    #[test]
    fn test_missing_metric() {
        let r = validate(Section::Tiles, ModuleKey::Aie, json!({"all_tiles": true}));
        assert!(!r.is_valid);
        assert!(r.errors[0].contains("'metric'"));
    }

    #[test]
    fn test_col_without_row_names_three_forms() {
        let r = validate(Section::Tiles, ModuleKey::Aie, json!({"metric": "stalls", "col": 5}));
        assert!(!r.is_valid);
        let msg = &r.errors[0];
        assert!(msg.contains("'all_tiles': true"));
        assert!(msg.contains("'col'/'row' pair"));
        assert!(msg.contains("'start'/'end' range"));
        assert!(msg.contains("'col'"));
    }

    #[test]
    fn test_microcontroller_accepts_col_alone() {
        let r = validate(
            Section::Tiles,
            ModuleKey::Microcontroller,
            json!({"metric": "execution", "col": 1}),
        );
        assert!(r.is_valid, "{:?}", r.errors);
    }

    #[test]
    fn test_inverted_range_names_column() {
        let r = validate(
            Section::Tiles,
            ModuleKey::Aie,
            json!({"metric": "stalls", "start": [2, 1], "end": [1, 3]}),
        );
        assert!(!r.is_valid);
        assert!(r.errors.iter().any(|e| e.contains("column 2 > 1")), "{:?}", r.errors);
    }

    #[test]
    fn test_inverted_range_names_row() {
        let r = validate(
            Section::Tiles,
            ModuleKey::AieMemory,
            json!({"metric": "conflicts", "start": [0, 4], "end": [1, 3]}),
        );
        assert!(r.errors.iter().any(|e| e.contains("row 4 > 3")), "{:?}", r.errors);
    }

    #[test]
    fn test_range_without_end() {
        let r = validate(
            Section::Tiles,
            ModuleKey::MemoryTile,
            json!({"metric": "input_channels", "start": [1, 0]}),
        );
        assert!(r.is_valid, "{:?}", r.errors);
    }

    #[test]
    fn test_range_shape_errors() {
        let r = validate(
            Section::Tiles,
            ModuleKey::Aie,
            json!({"metric": "stalls", "start": [1], "end": [1, -1]}),
        );
        assert!(!r.is_valid);
        assert!(r.errors.iter().any(|e| e.contains("exactly 2")));
        assert!(r.errors.iter().any(|e| e.contains("row -1")));
    }

    #[test]
    fn test_conflicting_styles() {
        let r = validate(
            Section::Tiles,
            ModuleKey::Aie,
            json!({"metric": "stalls", "all_tiles": true, "col": 0, "row": 0}),
        );
        assert!(!r.is_valid);
        assert!(r.errors[0].contains("conflicting"));
    }

    #[test]
    fn test_stray_col_is_warning() {
        let r = validate(
            Section::Tiles,
            ModuleKey::Aie,
            json!({"metric": "stalls", "all_tiles": true, "col": 3}),
        );
        assert!(r.is_valid, "{:?}", r.errors);
        assert_eq!(r.warnings, vec!["field 'col' has no effect without 'row'".to_string()]);

        let r = validate(
            Section::Tiles,
            ModuleKey::MemoryTile,
            json!({"metric": "input_channels", "start": [0, 0], "row": 1}),
        );
        assert!(r.is_valid, "{:?}", r.errors);
        assert_eq!(r.warnings, vec!["field 'row' has no effect without 'col'".to_string()]);
    }

    #[test]
    fn test_all_tiles_false_is_not_a_style() {
        let r = validate(
            Section::Tiles,
            ModuleKey::Aie,
            json!({"metric": "stalls", "all_tiles": false, "col": 0, "row": 0}),
        );
        assert!(r.is_valid, "{:?}", r.errors);
    }

    #[test]
    fn test_channels_marks_invalid_elements() {
        let r = validate(
            Section::Graphs,
            ModuleKey::InterfaceTile,
            json!({"metric": "input_throughputs", "channels": [0, 300]}),
        );
        assert!(!r.is_valid);
        assert!(r.errors[0].contains("[0, 300 (invalid)]"), "{:?}", r.errors);

        let r = validate(
            Section::Graphs,
            ModuleKey::InterfaceTile,
            json!({"metric": "input_throughputs", "channels": [0, 1, 2]}),
        );
        assert!(r.errors[0].contains("1 or 2"));
    }

    #[test]
    fn test_coercion_from_strings() {
        let r = validate(
            Section::Tiles,
            ModuleKey::Aie,
            json!({"metric": "stalls", "col": "3", "row": "0", "channels": ["1"]}),
        );
        assert!(r.is_valid, "{:?}", r.errors);

        let r = validate(
            Section::Tiles,
            ModuleKey::Aie,
            json!({"metric": "stalls", "all_tiles": "yes"}),
        );
        assert!(!r.is_valid);
    }

    #[test]
    fn test_graph_entry_defaults() {
        let r = validate(Section::Graphs, ModuleKey::MemoryTile, json!({"metric": "input_channels"}));
        assert!(r.is_valid, "{:?}", r.errors);
    }

    #[test]
    fn test_wrong_entity_field_is_warning() {
        let r = validate(
            Section::Graphs,
            ModuleKey::Aie,
            json!({"graph": "all", "port": "all", "metric": "stalls"}),
        );
        assert!(r.is_valid);
        assert!(r.warnings[0].contains("'port'"));
    }

    #[test]
    fn test_microcontroller_has_no_graph_schema() {
        let v = SchemaValidator::new();
        assert!(!v.supports(Section::Graphs, ModuleKey::Microcontroller));
        assert!(v.supports(Section::Tiles, ModuleKey::Microcontroller));
        let r = v.validate(Section::Graphs, ModuleKey::Microcontroller, &json!({"metric": "execution"}));
        assert!(!r.is_valid);
    }

    #[test]
    fn test_plugin_settings() {
        let v = SchemaValidator::new();
        assert!(v.validate_plugin_setting("interval_us", &json!(100)).is_valid);
        assert!(!v.validate_plugin_setting("interval_us", &json!(-1)).is_valid);
        assert!(v.validate_plugin_setting("start_type", &json!("iteration")).is_valid);
        let r = v.validate_plugin_setting("start_type", &json!("kernel"));
        assert!(r.errors[0].contains("time, iteration"));
        assert!(v.is_plugin_setting("start_iteration"));
        assert!(!v.is_plugin_setting("tiles"));
    }

    #[test]
    fn test_non_object_entry() {
        let r = validate(Section::Tiles, ModuleKey::Aie, json!("heat_map"));
        assert!(!r.is_valid);
    }
}
