//! # Parameter Declarations
//!
//! A parameter is declared once by the subsystem that owns it and lives for
//! the process lifetime. Its value may be materialized many times, subject to
//! its [`ReloadPolicy`].

use crate::coerce::{self, CoerceError, Coercion};
use crate::value::{ConfigValue, RawValue};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Values materialized so far in the current pass.
///
/// Handed to computed defaults so one parameter can default to another that
/// is declared earlier.
#[derive(Debug, Clone, Copy)]
pub struct Resolved<'a> {
    values: &'a BTreeMap<String, ConfigValue>,
}

impl<'a> Resolved<'a> {
    pub fn new(values: &'a BTreeMap<String, ConfigValue>) -> Self {
        Self { values }
    }

    pub fn get(&self, name: &str) -> Option<&'a ConfigValue> {
        self.values.get(name)
    }

    /// Integer value of `name`, `0` when missing or not an integer.
    pub fn int(&self, name: &str) -> i64 {
        self.get(name).and_then(ConfigValue::as_int).unwrap_or(0)
    }

    pub fn str(&self, name: &str) -> Option<&'a str> {
        self.get(name).and_then(ConfigValue::as_str)
    }
}

/// Default of a parameter.
#[derive(Clone)]
pub enum DefaultValue {
    Fixed(ConfigValue),
    Computed(Arc<dyn Fn(Resolved<'_>) -> ConfigValue + Send + Sync>),
}

impl DefaultValue {
    pub fn computed(f: impl Fn(Resolved<'_>) -> ConfigValue + Send + Sync + 'static) -> Self {
        Self::Computed(Arc::new(f))
    }

    pub fn resolve(&self, resolved: Resolved<'_>) -> ConfigValue {
        match self {
            Self::Fixed(value) => value.clone(),
            Self::Computed(f) => f(resolved),
        }
    }
}

impl fmt::Debug for DefaultValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(value) => f.debug_tuple("Fixed").field(value).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// Whether a materialized value may be replaced by a different one.
#[derive(Clone)]
pub enum ReloadPolicy {
    Always,
    Never,
    /// Evaluated lazily, only when a change is attempted.
    ConditionalOn(Arc<dyn Fn() -> bool + Send + Sync>),
}

impl ReloadPolicy {
    pub fn conditional_on(predicate: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        Self::ConditionalOn(Arc::new(predicate))
    }

    pub fn allows_reload(&self) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::ConditionalOn(predicate) => predicate(),
        }
    }
}

impl fmt::Debug for ReloadPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::Never => f.write_str("Never"),
            Self::ConditionalOn(_) => f.write_str("ConditionalOn(..)"),
        }
    }
}

/// A named, typed, independently reload-policed configuration value.
#[derive(Clone)]
pub struct Parameter {
    name: String,
    coerce: Coercion,
    default: DefaultValue,
    reload: ReloadPolicy,
    reload_error_message: Option<String>,
}

impl Parameter {
    pub fn new(
        name: impl Into<String>,
        coerce: impl Fn(&RawValue) -> Result<ConfigValue, CoerceError> + Send + Sync + 'static,
        default: DefaultValue,
    ) -> Self {
        Self {
            name: name.into(),
            coerce: coerce::shared(coerce),
            default,
            reload: ReloadPolicy::Always,
            reload_error_message: None,
        }
    }

    pub fn int(name: impl Into<String>, default: i64) -> Self {
        Self::new(name, coerce::int, DefaultValue::Fixed(ConfigValue::Int(default)))
    }

    pub fn float(name: impl Into<String>, default: f64) -> Self {
        Self::new(name, coerce::float, DefaultValue::Fixed(ConfigValue::Float(default)))
    }

    pub fn string(name: impl Into<String>, default: &str) -> Self {
        Self::new(name, coerce::string, DefaultValue::Fixed(ConfigValue::str(default)))
    }

    /// Integer that must be at least 1.
    pub fn positive_int(name: impl Into<String>, default: i64) -> Self {
        Self::new(name, coerce::positive_int, DefaultValue::Fixed(ConfigValue::Int(default)))
    }

    pub fn optional_string(name: impl Into<String>) -> Self {
        Self::new(name, coerce::optional_string, DefaultValue::Fixed(ConfigValue::Unset))
    }

    pub fn optional_int(name: impl Into<String>) -> Self {
        Self::new(name, coerce::optional_int, DefaultValue::Fixed(ConfigValue::Unset))
    }

    pub fn path(name: impl Into<String>) -> Self {
        Self::new(name, coerce::absolute_path, DefaultValue::Fixed(ConfigValue::Unset))
    }

    /// Replace the default with one computed from earlier parameters.
    pub fn default_from(
        mut self,
        f: impl Fn(Resolved<'_>) -> ConfigValue + Send + Sync + 'static,
    ) -> Self {
        self.default = DefaultValue::computed(f);
        self
    }

    pub fn reload(mut self, policy: ReloadPolicy) -> Self {
        self.reload = policy;
        self
    }

    /// Template for the reload conflict message.
    ///
    /// `{name}`, `{current}` and `{new}` are substituted.
    pub fn reload_error_message(mut self, template: impl Into<String>) -> Self {
        self.reload_error_message = Some(template.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reload_policy(&self) -> &ReloadPolicy {
        &self.reload
    }

    pub fn reload_error_template(&self) -> Option<&str> {
        self.reload_error_message.as_deref()
    }

    pub fn default_value(&self, resolved: Resolved<'_>) -> ConfigValue {
        self.default.resolve(resolved)
    }

    pub fn coerce(&self, raw: &RawValue) -> Result<ConfigValue, CoerceError> {
        (self.coerce)(raw)
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name)
            .field("default", &self.default)
            .field("reload", &self.reload)
            .finish_non_exhaustive()
    }
}
