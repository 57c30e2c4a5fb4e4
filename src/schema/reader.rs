//! Schema file reader
//!
//! Reads YAML or JSON schema definitions, dispatching on the file extension.

use std::fs;
use std::path::Path;

use crate::schema::definition::SchemaDefinition;
use crate::schema::error::{SchemaError, SchemaResult};

/// File extensions accepted by [`read_definition`]
pub const SUPPORTED_EXTENSIONS: [&str; 3] = ["yaml", "yml", "json"];

/// Check if a file extension names a supported schema format
pub fn supports_extension(ext: &str) -> bool {
    SUPPORTED_EXTENSIONS
        .iter()
        .any(|e| e.eq_ignore_ascii_case(ext))
}

/// Read a schema definition from disk
pub fn read_definition(path: &Path) -> SchemaResult<SchemaDefinition> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| SchemaError::UnknownExtension(path.display().to_string()))?;
    if !supports_extension(ext) {
        return Err(SchemaError::UnsupportedFormat(ext.to_string()));
    }

    let content = fs::read_to_string(path)?;
    if ext.eq_ignore_ascii_case("json") {
        serde_json::from_str(&content).map_err(|e| SchemaError::Parse(e.to_string()))
    } else {
        parse_yaml(&content)
    }
}

/// Parse a YAML schema definition
pub fn parse_yaml(content: &str) -> SchemaResult<SchemaDefinition> {
    serde_yaml::from_str(content).map_err(|e| SchemaError::Parse(e.to_string()))
}
