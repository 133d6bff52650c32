//! # Source Merger
//!
//! Builds the pending environment for a reload attempt from the config file
//! and the process environment.
//!
//! # Precedence Order
//! 1. `PARAJIT_*` environment variables (highest priority)
//! 2. Well-known config file in the base directory
//! 3. Parameter defaults (applied later by the typed reader)

use crate::file_loader::{self, ConfigFileError};
use crate::value::RawValue;
use crate::warning::ConfigWarning;
use std::collections::{BTreeMap, HashMap};
use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Prefix shared by environment variables and file keys.
pub const ENV_PREFIX: &str = "PARAJIT";

/// Where environment variables come from.
pub trait EnvironmentSource: Send + Sync {
    /// All `(name, value)` pairs. Values that are not valid unicode are
    /// skipped.
    fn vars(&self) -> Vec<(String, String)>;
}

/// The real process environment.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessEnvironment;

impl EnvironmentSource for ProcessEnvironment {
    fn vars(&self) -> Vec<(String, String)> {
        env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect()
    }
}

impl EnvironmentSource for HashMap<String, String> {
    fn vars(&self) -> Vec<(String, String)> {
        self.iter().map(|(k, v)| (k.clone(), v.clone())).collect()
    }
}

/// Snapshot of raw values for one reload attempt.
///
/// Keys are full variable names (`PARAJIT_DEBUG`). Equality ignores
/// warnings so two merges of the same sources compare equal.
#[derive(Debug, Clone, Default)]
pub struct PendingEnvironment {
    values: BTreeMap<String, RawValue>,
    warnings: Vec<ConfigWarning>,
    file: Option<PathBuf>,
}

impl PartialEq for PendingEnvironment {
    fn eq(&self, other: &Self) -> bool {
        self.values == other.values
    }
}

impl PendingEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from already-prefixed pairs, as an embedder or test would.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<RawValue>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            ..Self::default()
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: RawValue) {
        self.values.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&RawValue> {
        self.values.get(key)
    }

    /// Raw value for parameter `name` under `prefix`.
    pub fn raw_for(&self, prefix: &str, name: &str) -> Option<&RawValue> {
        self.values.get(&format!("{prefix}_{name}"))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.values.keys().map(String::as_str)
    }

    /// Warnings raised while reading the sources.
    pub fn warnings(&self) -> &[ConfigWarning] {
        &self.warnings
    }

    /// Config file the values were read from, if any.
    pub fn file(&self) -> Option<&Path> {
        self.file.as_deref()
    }

    pub(crate) fn take_warnings(&mut self) -> Vec<ConfigWarning> {
        std::mem::take(&mut self.warnings)
    }
}

/// Reads the config file and the environment into a [`PendingEnvironment`].
#[derive(Clone)]
pub struct SourceMerger {
    prefix: String,
    base_dir: PathBuf,
    environment: Arc<dyn EnvironmentSource>,
}

impl std::fmt::Debug for SourceMerger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceMerger")
            .field("prefix", &self.prefix)
            .field("base_dir", &self.base_dir)
            .finish_non_exhaustive()
    }
}

impl Default for SourceMerger {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceMerger {
    /// Merger over the process environment and the working directory.
    pub fn new() -> Self {
        Self {
            prefix: ENV_PREFIX.to_string(),
            base_dir: PathBuf::from("."),
            environment: Arc::new(ProcessEnvironment),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Directory searched for the well-known config file.
    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn with_environment(mut self, environment: impl EnvironmentSource + 'static) -> Self {
        self.environment = Arc::new(environment);
        self
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Build a fresh pending environment.
    ///
    /// File problems never fail the merge: they become warnings (logged here
    /// and kept on the result) and the file is treated as absent.
    pub fn merge(&self) -> PendingEnvironment {
        let mut pending = PendingEnvironment::new();

        if let Some(path) = file_loader::locate(&self.base_dir) {
            match file_loader::load_from_file(&path) {
                Ok(entries) => {
                    for (key, value) in entries {
                        pending.insert(format!("{}_{}", self.prefix, key.to_uppercase()), value);
                    }
                    pending.file = Some(path);
                }
                Err(e) => {
                    let warning = file_warning(path, e);
                    warning.emit();
                    pending.warnings.push(warning);
                }
            }
        }

        // clobber file based config with any locally defined env vars
        let var_prefix = format!("{}_", self.prefix);
        for (name, value) in self.environment.vars() {
            if name.starts_with(&var_prefix) {
                pending.insert(name, RawValue::Text(value));
            }
        }

        pending
    }
}

fn file_warning(path: PathBuf, error: ConfigFileError) -> ConfigWarning {
    match error {
        ConfigFileError::FormatUnavailable { format } => {
            ConfigWarning::FileFormatUnavailable { path, format }
        }
        ConfigFileError::Io(e) => ConfigWarning::FileUnreadable {
            path,
            reason: e.to_string(),
        },
        other => ConfigWarning::FileInvalid {
            path,
            reason: other.to_string(),
        },
    }
}
