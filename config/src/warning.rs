//! # Configuration Warnings
//!
//! Recoverable conditions. Each one is logged once through `tracing` when it
//! is raised and also returned to the caller in the apply report.

use crate::value::RawValue;
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigWarning {
    /// A raw value failed its parameter's coercion; the default was used.
    MalformedValue {
        name: String,
        raw: RawValue,
        reason: String,
    },

    /// A config file exists but support for its format is not compiled in.
    FileFormatUnavailable { path: PathBuf, format: &'static str },

    /// A config file exists but could not be read.
    FileUnreadable { path: PathBuf, reason: String },

    /// A config file was read but is not a key/value document.
    FileInvalid { path: PathBuf, reason: String },
}

impl ConfigWarning {
    /// Log this warning through `tracing`.
    pub fn emit(&self) {
        tracing::warn!("{}", self);
    }

    pub fn parameter(&self) -> Option<&str> {
        match self {
            Self::MalformedValue { name, .. } => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MalformedValue { name, raw, reason } => write!(
                f,
                "Environment {} defined but failed to parse '{}' ({}); using default",
                name, raw, reason
            ),
            Self::FileFormatUnavailable { path, format } => write!(
                f,
                "Config file {:?} found but {} parsing support is not compiled in; ignoring it",
                path, format
            ),
            Self::FileUnreadable { path, reason } => {
                write!(f, "Config file {:?} could not be read: {}", path, reason)
            }
            Self::FileInvalid { path, reason } => {
                write!(f, "Config file {:?} ignored: {}", path, reason)
            }
        }
    }
}
