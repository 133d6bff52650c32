//! # Typed Reader
//!
//! Materializes a single parameter from its raw source value and enforces the
//! parameter's reload policy against the value currently in the store.

use crate::parameter::{Parameter, Resolved};
use crate::value::{ConfigValue, RawValue};
use crate::warning::ConfigWarning;
use parajit_errors::ConfigError;

/// Outcome of reading one parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub value: ConfigValue,
    pub warning: Option<ConfigWarning>,
}

/// Read `param` from `raw`.
///
/// - `raw == None` yields the default.
/// - A raw value that fails coercion yields the default plus one
///   [`ConfigWarning::MalformedValue`], logged here.
/// - If `current` exists and differs from the resulting value, the reload
///   policy is consulted; a refusal is a [`ConfigError::ReloadForbidden`].
pub fn read(
    param: &Parameter,
    raw: Option<&RawValue>,
    current: Option<&ConfigValue>,
    resolved: Resolved<'_>,
    prefix: &str,
) -> Result<Reading, ConfigError> {
    let default = param.default_value(resolved);

    let (value, warning) = match raw {
        None => (default, None),
        Some(raw) => match param.coerce(raw) {
            Ok(value) => (value, None),
            Err(e) => {
                let warning = ConfigWarning::MalformedValue {
                    name: param.name().to_string(),
                    raw: raw.clone(),
                    reason: e.reason,
                };
                warning.emit();
                (default, Some(warning))
            }
        },
    };

    if let Some(current) = current {
        guard_reload(param, current, &value, prefix)?;
    }

    Ok(Reading { value, warning })
}

/// Fail if replacing `current` by `new` is forbidden for `param`.
///
/// The policy predicate only runs when the value actually changes.
pub fn guard_reload(
    param: &Parameter,
    current: &ConfigValue,
    new: &ConfigValue,
    prefix: &str,
) -> Result<(), ConfigError> {
    if current == new || param.reload_policy().allows_reload() {
        return Ok(());
    }

    let current = current.to_string();
    let new = new.to_string();
    let template = match param.reload_error_template() {
        Some(template) => template.to_string(),
        None => standard_template(prefix),
    };
    let message = template
        .replace("{name}", param.name())
        .replace("{current}", &current)
        .replace("{new}", &new);

    Err(ConfigError::ReloadForbidden {
        name: param.name().to_string(),
        current,
        new,
        message,
    })
}

fn standard_template(prefix: &str) -> String {
    format!(
        "Cannot set {prefix}_{{name}} to a different value once it has already been loaded \
         (currently set to {{current}}, trying to set it to {{new}})"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameter::ReloadPolicy;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn empty() -> BTreeMap<String, ConfigValue> {
        BTreeMap::new()
    }

    #[test]
    fn test_absent_raw_yields_default() {
        let values = empty();
        let reading = read(&Parameter::int("OPT", 3), None, None, Resolved::new(&values), "PARAJIT")
            .unwrap();
        assert_eq!(reading.value, ConfigValue::Int(3));
        assert!(reading.warning.is_none());
    }

    #[test]
    fn test_present_raw_is_coerced() {
        let values = empty();
        let raw = RawValue::text("1");
        let reading = read(
            &Parameter::int("OPT", 3),
            Some(&raw),
            None,
            Resolved::new(&values),
            "PARAJIT",
        )
        .unwrap();
        assert_eq!(reading.value, ConfigValue::Int(1));
    }

    #[test]
    fn test_malformed_raw_falls_back_with_one_warning() {
        let values = empty();
        let raw = RawValue::text("lots");
        let reading = read(
            &Parameter::int("OPT", 3),
            Some(&raw),
            None,
            Resolved::new(&values),
            "PARAJIT",
        )
        .unwrap();
        assert_eq!(reading.value, ConfigValue::Int(3));
        match reading.warning {
            Some(ConfigWarning::MalformedValue { name, raw, .. }) => {
                assert_eq!(name, "OPT");
                assert_eq!(raw, RawValue::text("lots"));
            }
            other => panic!("expected malformed value warning, got {other:?}"),
        }
    }

    #[test]
    fn test_never_reloadable_rejects_change() {
        let values = empty();
        let param = Parameter::int("NUM_THREADS", 8).reload(ReloadPolicy::Never);
        let raw = RawValue::text("2");
        let err = read(
            &param,
            Some(&raw),
            Some(&ConfigValue::Int(4)),
            Resolved::new(&values),
            "PARAJIT",
        )
        .unwrap_err();

        assert_eq!(
            err,
            ConfigError::ReloadForbidden {
                name: "NUM_THREADS".to_string(),
                current: "4".to_string(),
                new: "2".to_string(),
                message: "Cannot set PARAJIT_NUM_THREADS to a different value once it has \
                          already been loaded (currently set to 4, trying to set it to 2)"
                    .to_string(),
            }
        );
    }

    #[test]
    fn test_never_reloadable_accepts_same_value() {
        let values = empty();
        let param = Parameter::int("NUM_THREADS", 8).reload(ReloadPolicy::Never);
        let raw = RawValue::text("4");
        let reading = read(
            &param,
            Some(&raw),
            Some(&ConfigValue::Int(4)),
            Resolved::new(&values),
            "PARAJIT",
        )
        .unwrap();
        assert_eq!(reading.value, ConfigValue::Int(4));
    }

    #[test]
    fn test_custom_template() {
        let values = empty();
        let param = Parameter::int("NUM_THREADS", 8)
            .reload(ReloadPolicy::Never)
            .reload_error_message("{name}: {current} -> {new} refused");
        let err = read(
            &param,
            None,
            Some(&ConfigValue::Int(4)),
            Resolved::new(&values),
            "PARAJIT",
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "NUM_THREADS: 4 -> 8 refused");
    }

    #[test]
    fn test_predicate_not_evaluated_without_change() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let param = Parameter::int("NUM_THREADS", 4).reload(ReloadPolicy::conditional_on(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            false
        }));
        let values = empty();

        read(&param, None, Some(&ConfigValue::Int(4)), Resolved::new(&values), "PARAJIT").unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let raw = RawValue::text("6");
        let result = read(
            &param,
            Some(&raw),
            Some(&ConfigValue::Int(4)),
            Resolved::new(&values),
            "PARAJIT",
        );
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
