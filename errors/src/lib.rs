//! # parajit Errors
//!
//! Error handling for the runtime configuration and thread-count control
//! layer.
//!
//! - Uses `thiserror` for structured error definitions
//! - Every variant carries named fields so callers can match on them
//! - Recoverable conditions (malformed values, unusable config files) are
//!   not errors; they are reported as warnings by the config crate

use thiserror::Error;

/// Configuration store errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    /// A parameter whose reload policy forbids it was asked to change value.
    ///
    /// `message` is already formatted from the parameter's template.
    #[error("{message}")]
    ReloadForbidden {
        name: String,
        current: String,
        new: String,
        message: String,
    },

    #[error("Unknown configuration parameter: {name}")]
    UnknownParameter { name: String },

    #[error("Configuration parameter {name} holds {actual}, expected {expected}")]
    TypeMismatch {
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Invalid value {value:?} for {name}: {reason}")]
    InvalidValue {
        name: String,
        value: String,
        reason: String,
    },

    #[error("Configuration parameter declared twice: {name}")]
    DuplicateParameter { name: String },

    #[error("Invalid runtime settings: {reason}")]
    InvalidSettings { reason: String },
}

impl ConfigError {
    /// Name of the parameter the error is about, if any.
    pub fn parameter(&self) -> Option<&str> {
        match self {
            Self::ReloadForbidden { name, .. }
            | Self::UnknownParameter { name }
            | Self::TypeMismatch { name, .. }
            | Self::InvalidValue { name, .. }
            | Self::DuplicateParameter { name } => Some(name),
            Self::InvalidSettings { .. } => None,
        }
    }
}

/// Thread-count controller errors
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ThreadingError {
    #[error("Number of threads must be at least 1, got {requested}")]
    InvalidThreadCount { requested: i64 },

    #[error(
        "Thread count cannot be reseeded once the worker pool has launched with {physical} threads"
    )]
    AlreadyLaunched { physical: usize },

    #[error("Failed to launch worker pool of {threads} threads: {reason}")]
    PoolLaunch { threads: usize, reason: String },
}

/// Errors surfaced by the combined runtime surface
#[derive(Debug, Error, Clone, PartialEq)]
pub enum RuntimeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Threading(#[from] ThreadingError),
}
