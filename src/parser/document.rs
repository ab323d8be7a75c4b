//! Settings document loader.
//!
//! A missing or unusable document is never fatal: the loader reports what
//! went wrong and hands back an empty object so every module falls back to
//! its defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use thiserror::Error;

use crate::diagnostics::Diagnostics;

/// Errors reading or writing a settings document.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{0} does not exist")]
    NotFound(PathBuf),

    #[error("{0} is not a regular file")]
    NotAFile(PathBuf),

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {path}: {source}")]
    Syntax {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("top level of {0} must be an object")]
    NotAnObject(PathBuf),
}

/// A loaded document and how the load went.
#[derive(Debug)]
pub struct ParseResult {
    /// Always an object; empty when loading failed.
    pub tree: Value,
    pub error: Option<LoadError>,
}

impl ParseResult {
    fn ok(tree: Value) -> Self {
        Self { tree, error: None }
    }

    fn failed(error: LoadError) -> Self {
        Self {
            tree: Value::Object(Map::new()),
            error: Some(error),
        }
    }

    pub fn success(&self) -> bool {
        self.error.is_none()
    }

    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(|e| e.to_string())
    }
}

/// Read and parse `path` without reporting anything.
pub fn read_document(path: &Path) -> Result<Value, LoadError> {
    let meta = fs::metadata(path).map_err(|e| match e.kind() {
        std::io::ErrorKind::NotFound => LoadError::NotFound(path.to_path_buf()),
        _ => LoadError::Read {
            path: path.to_path_buf(),
            source: e,
        },
    })?;
    if !meta.is_file() {
        return Err(LoadError::NotAFile(path.to_path_buf()));
    }

    let text = fs::read_to_string(path).map_err(|e| LoadError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let tree: Value = serde_json::from_str(&text).map_err(|e| LoadError::Syntax {
        path: path.to_path_buf(),
        source: e,
    })?;

    if !tree.is_object() {
        return Err(LoadError::NotAnObject(path.to_path_buf()));
    }
    Ok(tree)
}

/// Load `path`, recording the outcome in `diags`.
///
/// A missing file is informational; anything else that prevents loading is a
/// warning. Either way the returned tree is an (empty) object.
pub fn load_document(path: &Path, diags: &mut Diagnostics) -> ParseResult {
    match read_document(path) {
        Ok(tree) => {
            diags.debug(format!("Loaded settings document {}", path.display()));
            ParseResult::ok(tree)
        }
        Err(e @ LoadError::NotFound(_)) => {
            diags.info(format!("Settings document {}; using defaults", e));
            ParseResult::failed(e)
        }
        Err(e) => {
            diags.warn(format!("Unable to load settings document: {}; using defaults", e));
            ParseResult::failed(e)
        }
    }
}

/// Write `value` to `path` as pretty-printed JSON.
pub fn write_document(path: &Path, value: &Value) -> Result<(), LoadError> {
    let mut text = serde_json::to_string_pretty(value).map_err(|e| LoadError::Syntax {
        path: path.to_path_buf(),
        source: e,
    })?;
    text.push('\n');
    fs::write(path, text).map_err(|e| LoadError::Write {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::Severity;
    use std::io::Write;

    #[test]
    fn test_load_valid_document() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"aie_profile": {{"interval_us": 100}}}}"#).unwrap();

        let mut diags = Diagnostics::new();
        let result = load_document(file.path(), &mut diags);
        assert!(result.success());
        assert_eq!(result.tree["aie_profile"]["interval_us"], 100);
        assert_eq!(diags.count(Severity::Warning), 0);
    }

    #[test]
    fn test_missing_file_is_info() {
        let dir = tempfile::tempdir().unwrap();
        let mut diags = Diagnostics::new();
        let result = load_document(&dir.path().join("xdp.json"), &mut diags);

        assert!(!result.success());
        assert!(matches!(result.error, Some(LoadError::NotFound(_))));
        assert_eq!(result.tree, Value::Object(Map::new()));
        assert_eq!(diags.count(Severity::Info), 1);
        assert_eq!(diags.count(Severity::Warning), 0);
    }

    #[test]
    fn test_malformed_file_is_warning() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"aie_profile": "#).unwrap();

        let mut diags = Diagnostics::new();
        let result = load_document(file.path(), &mut diags);
        assert!(matches!(result.error, Some(LoadError::Syntax { .. })));
        assert!(result.tree.as_object().unwrap().is_empty());
        assert_eq!(diags.count(Severity::Warning), 1);
    }

    #[test]
    fn test_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut diags = Diagnostics::new();
        let result = load_document(dir.path(), &mut diags);
        assert!(matches!(result.error, Some(LoadError::NotAFile(_))));
        assert!(result.error_message().unwrap().contains("not a regular file"));
    }

    #[test]
    fn test_top_level_array_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[1, 2]").unwrap();
        assert!(matches!(read_document(file.path()), Err(LoadError::NotAnObject(_))));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let value = serde_json::json!({"b": 1, "a": [true]});
        write_document(&path, &value).unwrap();
        assert_eq!(read_document(&path).unwrap(), value);
    }
}
