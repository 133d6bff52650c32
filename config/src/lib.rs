//! # Configuration System
//!
//! Runtime parameter store for the parajit parallel JIT runtime.
//!
//! This crate provides:
//! - Parameter declarations with typed coercion, computed defaults and
//!   per-parameter reload policies
//! - Source merging: an optional `.parajit_config.{yaml,yml,toml}` file
//!   overlaid by `PARAJIT_*` environment variables
//! - The [`ConfigStore`], re-materialized on every `reload()` when sources
//!   changed
//! - A validated [`RuntimeSettings`] view
//! - Hot reload of the config file
//!
//! ```rust,no_run
//! use parajit_config::{Catalog, ConfigStore, SourceMerger, names};
//!
//! let store = ConfigStore::new(Catalog::standard(|| false), SourceMerger::new());
//! let opt = store.get_int(names::OPT)?;
//! # Ok::<(), parajit_errors::ConfigError>(())
//! ```

pub mod catalog;
pub mod coerce;
pub mod file_loader;
pub mod hot_reload;
pub mod parameter;
pub mod platform;
pub mod reader;
pub mod settings;
pub mod sources;
pub mod store;
pub mod value;
pub mod warning;

pub use catalog::{Catalog, names};
pub use file_loader::{CONFIG_FILE_NAMES, ConfigFileError, load_from_file};
pub use hot_reload::{ConfigReloadEvent, watch_config};
pub use parameter::{DefaultValue, Parameter, ReloadPolicy, Resolved};
pub use settings::{RuntimeSettings, THREADING_LAYERS};
pub use sources::{ENV_PREFIX, EnvironmentSource, PendingEnvironment, ProcessEnvironment, SourceMerger};
pub use store::{ApplyReport, ConfigSnapshot, ConfigStore};
pub use value::{ConfigValue, RawValue};
pub use warning::ConfigWarning;
pub use parajit_errors::ConfigError;
pub use validator::Validate;
