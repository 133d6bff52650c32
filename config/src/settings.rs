//! # Runtime Settings
//!
//! Typed, validated view over the parameters the compiler pipeline and the
//! threading layer consult most.

use crate::catalog::names;
use crate::store::ConfigSnapshot;
use crate::value::ConfigValue;
use parajit_errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use validator::Validate;

/// Threading layers the runtime accepts.
pub const THREADING_LAYERS: &[&str] = &[
    "default",
    "safe",
    "threadsafe",
    "forksafe",
    "workqueue",
    "omp",
    "tbb",
];

/// Settings read from one [`ConfigSnapshot`].
///
/// ## Validation
/// - `opt`: 0-3
/// - `threading_layer`: one of [`THREADING_LAYERS`]
/// - `num_threads`: at least 1
#[derive(Debug, Clone, Serialize, Deserialize, Validate, PartialEq)]
pub struct RuntimeSettings {
    pub debug: bool,

    #[validate(range(min = 0, max = 3))]
    pub opt: i64,

    #[validate(custom(function = "validate_threading_layer"))]
    pub threading_layer: String,

    #[validate(range(min = 1))]
    pub num_threads: i64,

    /// `None` when caching goes to the default location.
    pub cache_dir: Option<PathBuf>,

    pub enable_avx: bool,
    pub disable_jit: bool,
}

fn validate_threading_layer(value: &str) -> Result<(), validator::ValidationError> {
    if THREADING_LAYERS.contains(&value) {
        Ok(())
    } else {
        Err(validator::ValidationError::new("Invalid threading layer"))
    }
}

impl RuntimeSettings {
    pub fn from_snapshot(snapshot: &ConfigSnapshot) -> Result<Self, ConfigError> {
        let settings = Self {
            debug: flag(snapshot, names::DEBUG)?,
            opt: int(snapshot, names::OPT)?,
            threading_layer: string(snapshot, names::THREADING_LAYER)?,
            num_threads: int(snapshot, names::NUM_THREADS)?,
            cache_dir: Some(string(snapshot, names::CACHE_DIR)?)
                .filter(|dir| !dir.is_empty())
                .map(PathBuf::from),
            enable_avx: flag(snapshot, names::ENABLE_AVX)?,
            disable_jit: flag(snapshot, names::DISABLE_JIT)?,
        };

        settings
            .validate()
            .map_err(|e| ConfigError::InvalidSettings {
                reason: e.to_string(),
            })?;
        Ok(settings)
    }
}

fn lookup<'a>(snapshot: &'a ConfigSnapshot, name: &str) -> Result<&'a ConfigValue, ConfigError> {
    snapshot
        .get(name)
        .ok_or_else(|| ConfigError::UnknownParameter {
            name: name.to_string(),
        })
}

fn int(snapshot: &ConfigSnapshot, name: &str) -> Result<i64, ConfigError> {
    let value = lookup(snapshot, name)?;
    value.as_int().ok_or_else(|| ConfigError::TypeMismatch {
        name: name.to_string(),
        expected: "int",
        actual: value.kind(),
    })
}

fn flag(snapshot: &ConfigSnapshot, name: &str) -> Result<bool, ConfigError> {
    Ok(int(snapshot, name)? != 0)
}

fn string(snapshot: &ConfigSnapshot, name: &str) -> Result<String, ConfigError> {
    match lookup(snapshot, name)? {
        ConfigValue::Str(s) => Ok(s.clone()),
        other => Err(ConfigError::TypeMismatch {
            name: name.to_string(),
            expected: "str",
            actual: other.kind(),
        }),
    }
}
