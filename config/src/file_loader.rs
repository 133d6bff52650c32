//! # Configuration File Loading
//!
//! Locates the well-known config file in a directory and reads its top-level
//! keys as raw values.
//!
//! Supports YAML (`yaml` feature) and TOML (`toml` feature), detected from
//! the file extension. Values are not coerced here.

use crate::value::RawValue;
use std::path::{Path, PathBuf};

/// Well-known config file names, in lookup order.
pub const CONFIG_FILE_NAMES: [&str; 3] = [
    ".parajit_config.yaml",
    ".parajit_config.yml",
    ".parajit_config.toml",
];

/// Configuration file loading error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    TomlParse(String),

    #[error("Failed to parse YAML: {0}")]
    YamlParse(String),

    #[error("Top-level document is not a key/value mapping")]
    NotAMapping,

    #[error("Config file has no extension")]
    NoExtension,

    #[error("Unsupported config file format: {0}")]
    UnsupportedFormat(String),

    #[error("{format} support is not compiled in")]
    FormatUnavailable { format: &'static str },
}

/// Find the first existing well-known config file in `dir`.
pub fn locate(dir: &Path) -> Option<PathBuf> {
    CONFIG_FILE_NAMES
        .iter()
        .map(|name| dir.join(name))
        .find(|path| path.is_file())
}

/// Load top-level keys from a config file, auto-detecting the format.
///
/// ## Supported Formats
/// - `.yaml` / `.yml`: YAML, requires the `yaml` feature
/// - `.toml`: TOML, requires the `toml` feature
///
/// Keys are returned as written; callers apply the prefix and upper-casing.
/// An empty document yields no entries.
pub fn load_from_file(path: &Path) -> Result<Vec<(String, RawValue)>, ConfigFileError> {
    let extension = path
        .extension()
        .and_then(|s| s.to_str())
        .ok_or(ConfigFileError::NoExtension)?;

    match extension.to_lowercase().as_str() {
        "yaml" | "yml" => load_from_yaml(path),
        "toml" => load_from_toml(path),
        other => Err(ConfigFileError::UnsupportedFormat(other.to_string())),
    }
}

#[cfg(feature = "yaml")]
pub fn load_from_yaml(path: &Path) -> Result<Vec<(String, RawValue)>, ConfigFileError> {
    use serde_yaml::Value;

    let contents = std::fs::read_to_string(path)?;
    let document: Value =
        serde_yaml::from_str(&contents).map_err(|e| ConfigFileError::YamlParse(e.to_string()))?;

    let mapping = match document {
        Value::Null => return Ok(Vec::new()),
        Value::Mapping(mapping) => mapping,
        _ => return Err(ConfigFileError::NotAMapping),
    };

    Ok(mapping
        .into_iter()
        .map(|(key, value)| (yaml_key(&key), yaml_raw(&value)))
        .collect())
}

#[cfg(not(feature = "yaml"))]
pub fn load_from_yaml(_path: &Path) -> Result<Vec<(String, RawValue)>, ConfigFileError> {
    Err(ConfigFileError::FormatUnavailable { format: "YAML" })
}

#[cfg(feature = "yaml")]
fn yaml_key(key: &serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s.clone(),
        other => yaml_raw(other).to_string(),
    }
}

#[cfg(feature = "yaml")]
fn yaml_raw(value: &serde_yaml::Value) -> RawValue {
    use serde_yaml::Value;

    match value {
        Value::Null => RawValue::Null,
        Value::Bool(b) => RawValue::Bool(*b),
        Value::Number(n) => match n.as_i64() {
            Some(i) => RawValue::Int(i),
            None => RawValue::Float(n.as_f64().unwrap_or(f64::NAN)),
        },
        Value::String(s) => RawValue::Text(s.clone()),
        Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_) => {
            RawValue::Text(serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}")))
        }
    }
}

#[cfg(feature = "toml")]
pub fn load_from_toml(path: &Path) -> Result<Vec<(String, RawValue)>, ConfigFileError> {
    let contents = std::fs::read_to_string(path)?;
    let table: toml::Table =
        toml::from_str(&contents).map_err(|e| ConfigFileError::TomlParse(e.to_string()))?;

    Ok(table
        .into_iter()
        .map(|(key, value)| (key, toml_raw(&value)))
        .collect())
}

#[cfg(not(feature = "toml"))]
pub fn load_from_toml(_path: &Path) -> Result<Vec<(String, RawValue)>, ConfigFileError> {
    Err(ConfigFileError::FormatUnavailable { format: "TOML" })
}

#[cfg(feature = "toml")]
fn toml_raw(value: &toml::Value) -> RawValue {
    use toml::Value;

    match value {
        Value::String(s) => RawValue::Text(s.clone()),
        Value::Integer(i) => RawValue::Int(*i),
        Value::Float(x) => RawValue::Float(*x),
        Value::Boolean(b) => RawValue::Bool(*b),
        Value::Datetime(dt) => RawValue::Text(dt.to_string()),
        Value::Array(_) | Value::Table(_) => {
            RawValue::Text(serde_json::to_string(value).unwrap_or_else(|_| value.to_string()))
        }
    }
}
