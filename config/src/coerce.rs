//! # Coercion Functions
//!
//! Turn a [`RawValue`] into a typed [`ConfigValue`]. A coercion failure is
//! never fatal: the typed reader falls back to the parameter default and
//! emits a warning.

use crate::value::{ConfigValue, RawValue};
use std::path::Path;
use std::sync::Arc;

/// Failure to coerce a raw value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{reason}")]
pub struct CoerceError {
    pub reason: String,
}

impl CoerceError {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// A parameter's coercion function.
pub type Coercion = Arc<dyn Fn(&RawValue) -> Result<ConfigValue, CoerceError> + Send + Sync>;

/// Integer coercion.
///
/// Text is trimmed and parsed as `i64`, booleans become 0/1 and finite
/// floats are truncated toward zero.
pub fn int(raw: &RawValue) -> Result<ConfigValue, CoerceError> {
    match raw {
        RawValue::Int(i) => Ok(ConfigValue::Int(*i)),
        RawValue::Bool(b) => Ok(ConfigValue::from(*b)),
        RawValue::Float(x) if x.is_finite() => Ok(ConfigValue::Int(x.trunc() as i64)),
        RawValue::Float(x) => Err(CoerceError::new(format!("{x} is not a finite number"))),
        RawValue::Text(s) => s
            .trim()
            .parse::<i64>()
            .map(ConfigValue::Int)
            .map_err(|e| CoerceError::new(format!("invalid integer {s:?}: {e}"))),
        RawValue::Null => Err(CoerceError::new("expected an integer, got null")),
    }
}

/// Like [`int`], but values below 1 are rejected.
pub fn positive_int(raw: &RawValue) -> Result<ConfigValue, CoerceError> {
    match int(raw)? {
        ConfigValue::Int(i) if i < 1 => {
            Err(CoerceError::new(format!("{i} is not a positive integer")))
        }
        value => Ok(value),
    }
}

pub fn float(raw: &RawValue) -> Result<ConfigValue, CoerceError> {
    match raw {
        RawValue::Float(x) => Ok(ConfigValue::Float(*x)),
        RawValue::Int(i) => Ok(ConfigValue::Float(*i as f64)),
        RawValue::Bool(b) => Ok(ConfigValue::Float(if *b { 1.0 } else { 0.0 })),
        RawValue::Text(s) => s
            .trim()
            .parse::<f64>()
            .map(ConfigValue::Float)
            .map_err(|e| CoerceError::new(format!("invalid float {s:?}: {e}"))),
        RawValue::Null => Err(CoerceError::new("expected a float, got null")),
    }
}

/// String coercion; scalars are rendered as text.
pub fn string(raw: &RawValue) -> Result<ConfigValue, CoerceError> {
    match raw {
        RawValue::Null => Err(CoerceError::new("expected a string, got null")),
        other => Ok(ConfigValue::Str(other.to_string())),
    }
}

/// Like [`string`], but null means `Unset`.
pub fn optional_string(raw: &RawValue) -> Result<ConfigValue, CoerceError> {
    match raw {
        RawValue::Null => Ok(ConfigValue::Unset),
        other => string(other),
    }
}

/// Like [`int`], but null means `Unset`.
pub fn optional_int(raw: &RawValue) -> Result<ConfigValue, CoerceError> {
    match raw {
        RawValue::Null => Ok(ConfigValue::Unset),
        other => int(other),
    }
}

/// Path coercion resolving relative paths against the working directory.
pub fn absolute_path(raw: &RawValue) -> Result<ConfigValue, CoerceError> {
    let text = match raw {
        RawValue::Null => return Ok(ConfigValue::Unset),
        RawValue::Text(s) => s.clone(),
        other => return Err(CoerceError::new(format!("expected a path, got {other}"))),
    };

    let path = Path::new(&text);
    if path.is_absolute() {
        return Ok(ConfigValue::Str(text));
    }

    let cwd = std::env::current_dir()
        .map_err(|e| CoerceError::new(format!("cannot resolve {text:?}: {e}")))?;
    Ok(ConfigValue::Str(cwd.join(path).display().to_string()))
}

pub(crate) fn shared(
    f: impl Fn(&RawValue) -> Result<ConfigValue, CoerceError> + Send + Sync + 'static,
) -> Coercion {
    Arc::new(f)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_int_accepts_padded_text() {
        assert_eq!(int(&RawValue::text(" 42 ")), Ok(ConfigValue::Int(42)));
        assert_eq!(int(&RawValue::text("-3")), Ok(ConfigValue::Int(-3)));
    }

    #[test]
    fn test_int_rejects_garbage() {
        assert!(int(&RawValue::text("four")).is_err());
        assert!(int(&RawValue::text("3.5")).is_err());
        assert!(int(&RawValue::text("")).is_err());
        assert!(int(&RawValue::Null).is_err());
    }

    #[test]
    fn test_int_from_file_scalars() {
        assert_eq!(int(&RawValue::Bool(true)), Ok(ConfigValue::Int(1)));
        assert_eq!(int(&RawValue::Float(2.9)), Ok(ConfigValue::Int(2)));
        assert_eq!(int(&RawValue::Float(-2.9)), Ok(ConfigValue::Int(-2)));
        assert!(int(&RawValue::Float(f64::NAN)).is_err());
    }

    #[test]
    fn test_positive_int_rejects_zero_and_negatives() {
        assert_eq!(positive_int(&RawValue::text("4")), Ok(ConfigValue::Int(4)));
        assert!(positive_int(&RawValue::text("0")).is_err());
        assert!(positive_int(&RawValue::text("-3")).is_err());
        assert!(positive_int(&RawValue::Float(0.5)).is_err());
    }

    #[test]
    fn test_float() {
        assert_eq!(float(&RawValue::text("0.25")), Ok(ConfigValue::Float(0.25)));
        assert_eq!(float(&RawValue::Int(2)), Ok(ConfigValue::Float(2.0)));
        assert!(float(&RawValue::text("quarter")).is_err());
    }

    #[test]
    fn test_string_renders_scalars() {
        assert_eq!(string(&RawValue::Int(7)), Ok(ConfigValue::str("7")));
        assert_eq!(string(&RawValue::text("tbb")), Ok(ConfigValue::str("tbb")));
        assert!(string(&RawValue::Null).is_err());
    }

    #[test]
    fn test_optionals_map_null_to_unset() {
        assert_eq!(optional_string(&RawValue::Null), Ok(ConfigValue::Unset));
        assert_eq!(optional_int(&RawValue::Null), Ok(ConfigValue::Unset));
        assert_eq!(optional_string(&RawValue::text("")), Ok(ConfigValue::str("")));
        assert_eq!(optional_int(&RawValue::text("1")), Ok(ConfigValue::Int(1)));
    }

    #[test]
    fn test_absolute_path_keeps_absolute() {
        assert_eq!(
            absolute_path(&RawValue::text("/tmp/report.html")),
            Ok(ConfigValue::str("/tmp/report.html"))
        );
    }

    #[test]
    fn test_absolute_path_resolves_relative() {
        let value = absolute_path(&RawValue::text("report.html")).unwrap();
        let path = value.as_str().unwrap();
        assert!(Path::new(path).is_absolute());
        assert!(path.ends_with("report.html"));
    }
}
