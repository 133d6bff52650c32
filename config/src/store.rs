//! # Config Store
//!
//! Process-wide mapping from parameter name to materialized value, kept
//! current by the reload pipeline: merge sources, read every parameter in
//! declaration order, publish.
//!
//! Readers get an immutable snapshot and never wait on an apply pass; an
//! apply pass builds a new map and publishes it when it stops.

use crate::catalog::Catalog;
use crate::parameter::Resolved;
use crate::reader;
use crate::sources::{PendingEnvironment, SourceMerger};
use crate::value::ConfigValue;
use crate::warning::ConfigWarning;
use parajit_errors::ConfigError;
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Immutable view of every materialized parameter.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ConfigSnapshot {
    values: BTreeMap<String, ConfigValue>,
}

impl ConfigSnapshot {
    pub fn get(&self, name: &str) -> Option<&ConfigValue> {
        self.values.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Outcome of one apply pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ApplyReport {
    /// `false` when the pending environment matched the baseline and nothing
    /// was re-read.
    pub applied: bool,
    /// Parameters whose value differs from before the pass.
    pub updated: Vec<String>,
    /// Warnings from merging sources and reading parameters.
    pub warnings: Vec<ConfigWarning>,
}

#[derive(Debug, Default)]
struct ApplyState {
    /// Pending environment of the last successful apply.
    baseline: Option<PendingEnvironment>,
}

/// The parameter table.
///
/// Build one per process (or per test) with [`ConfigStore::new`]; the first
/// [`get`](Self::get) or [`reload`](Self::reload) loads it.
pub struct ConfigStore {
    catalog: Catalog,
    merger: SourceMerger,
    current: RwLock<Arc<ConfigSnapshot>>,
    state: Mutex<ApplyState>,
    loaded: AtomicBool,
}

impl std::fmt::Debug for ConfigStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigStore")
            .field("catalog", &self.catalog.len())
            .field("merger", &self.merger)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl ConfigStore {
    pub fn new(catalog: Catalog, merger: SourceMerger) -> Self {
        Self {
            catalog,
            merger,
            current: RwLock::new(Arc::new(ConfigSnapshot::default())),
            state: Mutex::new(ApplyState::default()),
            loaded: AtomicBool::new(false),
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn merger(&self) -> &SourceMerger {
        &self.merger
    }

    /// Whether an apply pass has completed. Never waits on one in progress.
    pub fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::Acquire)
    }

    /// Re-read sources and apply them if they changed since the last
    /// successful apply. Loads the store on first call.
    pub fn reload(&self) -> Result<ApplyReport, ConfigError> {
        let pending = self.merger.merge();
        self.apply(pending, false)
    }

    /// Re-read sources and apply them unconditionally.
    pub fn reset(&self) -> Result<ApplyReport, ConfigError> {
        let pending = self.merger.merge();
        self.apply(pending, true)
    }

    /// Apply a pending environment.
    ///
    /// Parameters are read in declaration order. The first reload conflict
    /// stops the pass: parameters already read in this pass stay updated, the
    /// conflicting one and everything after it keep their previous values,
    /// and the baseline is left alone so the next reload tries again.
    pub fn apply(
        &self,
        mut pending: PendingEnvironment,
        force: bool,
    ) -> Result<ApplyReport, ConfigError> {
        let mut state = self.state.lock();
        let mut warnings = pending.take_warnings();

        let force = force || state.baseline.is_none();
        if !force && state.baseline.as_ref() == Some(&pending) {
            debug!("Configuration sources unchanged; skipping reload");
            return Ok(ApplyReport {
                applied: false,
                updated: Vec::new(),
                warnings,
            });
        }

        let previous = self.current.read().clone();
        let prefix = self.merger.prefix();
        let mut working = previous.values.clone();
        let mut updated = Vec::new();

        for param in self.catalog.iter() {
            let name = param.name();
            let current = previous.get(name);
            let raw = pending.raw_for(prefix, name);

            let reading = match reader::read(param, raw, current, Resolved::new(&working), prefix)
            {
                Ok(reading) => reading,
                Err(e) => {
                    if !updated.is_empty() {
                        self.publish(working);
                    }
                    return Err(e);
                }
            };

            if let Some(warning) = reading.warning {
                warnings.push(warning);
            }
            if current != Some(&reading.value) {
                updated.push(name.to_string());
            }
            working.insert(name.to_string(), reading.value);
        }

        self.publish(working);
        state.baseline = Some(pending);
        self.loaded.store(true, Ordering::Release);

        if updated.is_empty() {
            debug!("Configuration reloaded without changes");
        } else {
            info!("Configuration applied: {:?}", updated);
        }

        Ok(ApplyReport {
            applied: true,
            updated,
            warnings,
        })
    }

    /// Replace one parameter's value directly.
    ///
    /// The value goes through the parameter's coercion and a rejected value
    /// is an error. The parameter's reload policy applies. The value survives reloads
    /// whose sources are unchanged and is replaced by the next one that
    /// re-reads parameters.
    pub fn set_override(&self, name: &str, value: ConfigValue) -> Result<(), ConfigError> {
        let param = self
            .catalog
            .get(name)
            .ok_or_else(|| ConfigError::UnknownParameter {
                name: name.to_string(),
            })?;
        let value = param
            .coerce(&value.to_raw())
            .map_err(|e| ConfigError::InvalidValue {
                name: name.to_string(),
                value: value.to_string(),
                reason: e.reason,
            })?;
        self.ensure_loaded()?;

        let _state = self.state.lock();
        let previous = self.current.read().clone();
        if let Some(current) = previous.get(name) {
            reader::guard_reload(param, current, &value, self.merger.prefix())?;
        }

        info!("Configuration override: {} = {}", name, value);
        let mut values = previous.values.clone();
        values.insert(name.to_string(), value);
        self.publish(values);
        Ok(())
    }

    /// Current value of a declared parameter.
    pub fn get(&self, name: &str) -> Result<ConfigValue, ConfigError> {
        if !self.catalog.contains(name) {
            return Err(ConfigError::UnknownParameter {
                name: name.to_string(),
            });
        }
        let snapshot = self.snapshot()?;
        Ok(snapshot.get(name).cloned().unwrap_or(ConfigValue::Unset))
    }

    pub fn get_int(&self, name: &str) -> Result<i64, ConfigError> {
        let value = self.get(name)?;
        value.as_int().ok_or_else(|| mismatch(name, "int", &value))
    }

    pub fn get_float(&self, name: &str) -> Result<f64, ConfigError> {
        let value = self.get(name)?;
        value.as_float().ok_or_else(|| mismatch(name, "float", &value))
    }

    pub fn get_str(&self, name: &str) -> Result<String, ConfigError> {
        match self.get(name)? {
            ConfigValue::Str(s) => Ok(s),
            other => Err(mismatch(name, "str", &other)),
        }
    }

    /// Flag parameters: any non-zero integer is `true`.
    pub fn get_flag(&self, name: &str) -> Result<bool, ConfigError> {
        Ok(self.get_int(name)? != 0)
    }

    /// Snapshot of all values, loading the store first if needed.
    pub fn snapshot(&self) -> Result<Arc<ConfigSnapshot>, ConfigError> {
        self.ensure_loaded()?;
        Ok(self.current.read().clone())
    }

    fn ensure_loaded(&self) -> Result<(), ConfigError> {
        if !self.is_loaded() {
            self.reload()?;
        }
        Ok(())
    }

    fn publish(&self, values: BTreeMap<String, ConfigValue>) {
        *self.current.write() = Arc::new(ConfigSnapshot { values });
    }
}

fn mismatch(name: &str, expected: &'static str, actual: &ConfigValue) -> ConfigError {
    ConfigError::TypeMismatch {
        name: name.to_string(),
        expected,
        actual: actual.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::names;
    use crate::parameter::{Parameter, ReloadPolicy};
    use crate::value::RawValue;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};

    fn store_with(catalog: Catalog) -> ConfigStore {
        let dir = std::env::temp_dir().join("parajit-store-tests-no-config");
        ConfigStore::new(
            catalog,
            SourceMerger::new()
                .with_base_dir(dir)
                .with_environment(HashMap::<String, String>::new()),
        )
    }

    fn small_catalog() -> Catalog {
        Catalog::from_parameters([
            Parameter::int("DEBUG", 0),
            Parameter::int("DEBUG_CACHE", 0).default_from(|r| r.int("DEBUG").into()),
            Parameter::int("FROZEN", 1).reload(ReloadPolicy::Never),
            Parameter::string("LAYER", "default"),
        ])
        .unwrap()
    }

    fn pending(pairs: &[(&str, &str)]) -> PendingEnvironment {
        PendingEnvironment::from_pairs(pairs.iter().copied())
    }

    #[test]
    fn test_first_get_loads_defaults() {
        let store = store_with(small_catalog());
        assert!(!store.is_loaded());
        assert_eq!(store.get_int("DEBUG").unwrap(), 0);
        assert_eq!(store.get_str("LAYER").unwrap(), "default");
        assert!(store.is_loaded());
    }

    #[test]
    fn test_unknown_parameter() {
        let store = store_with(small_catalog());
        assert_eq!(
            store.get("NOPE"),
            Err(ConfigError::UnknownParameter {
                name: "NOPE".to_string()
            })
        );
    }

    #[test]
    fn test_type_mismatch() {
        let store = store_with(small_catalog());
        assert!(matches!(
            store.get_int("LAYER"),
            Err(ConfigError::TypeMismatch {
                expected: "int",
                actual: "str",
                ..
            })
        ));
    }

    #[test]
    fn test_apply_coerces_and_reports_updates() {
        let store = store_with(small_catalog());
        store.apply(pending(&[]), true).unwrap();

        let report = store
            .apply(pending(&[("PARAJIT_DEBUG", "1"), ("PARAJIT_LAYER", "omp")]), false)
            .unwrap();
        assert!(report.applied);
        assert_eq!(report.updated, vec!["DEBUG", "DEBUG_CACHE", "LAYER"]);
        assert_eq!(store.get_int("DEBUG_CACHE").unwrap(), 1);
        assert_eq!(store.get_str("LAYER").unwrap(), "omp");
    }

    #[test]
    fn test_malformed_value_reports_one_warning() {
        let store = store_with(small_catalog());
        let report = store
            .apply(pending(&[("PARAJIT_DEBUG", "verbose")]), true)
            .unwrap();
        assert_eq!(store.get_int("DEBUG").unwrap(), 0);
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.warnings[0].parameter(), Some("DEBUG"));
    }

    #[test]
    fn test_unchanged_sources_are_a_noop() {
        let store = store_with(small_catalog());
        store
            .apply(pending(&[("PARAJIT_FROZEN", "5")]), true)
            .unwrap();

        let report = store
            .apply(pending(&[("PARAJIT_FROZEN", "5")]), false)
            .unwrap();
        assert!(!report.applied);
        assert_eq!(store.get_int("FROZEN").unwrap(), 5);
    }

    #[test]
    fn test_reload_conflict_keeps_earlier_parameters() {
        let store = store_with(small_catalog());
        store.apply(pending(&[]), true).unwrap();

        let err = store
            .apply(
                pending(&[
                    ("PARAJIT_DEBUG", "2"),
                    ("PARAJIT_FROZEN", "9"),
                    ("PARAJIT_LAYER", "tbb"),
                ]),
                false,
            )
            .unwrap_err();

        assert_eq!(err.parameter(), Some("FROZEN"));
        // declared before FROZEN: applied
        assert_eq!(store.get_int("DEBUG").unwrap(), 2);
        assert_eq!(store.get_int("DEBUG_CACHE").unwrap(), 2);
        // FROZEN and everything after it: untouched
        assert_eq!(store.get_int("FROZEN").unwrap(), 1);
        assert_eq!(store.get_str("LAYER").unwrap(), "default");
    }

    #[test]
    fn test_failed_apply_does_not_advance_baseline() {
        let store = store_with(small_catalog());
        store.apply(pending(&[]), true).unwrap();

        let conflicting = pending(&[("PARAJIT_FROZEN", "9")]);
        assert!(store.apply(conflicting.clone(), false).is_err());
        assert!(store.apply(conflicting, false).is_err());
    }

    #[test]
    fn test_conditional_reload() {
        let started = Arc::new(AtomicBool::new(false));
        let probe = started.clone();
        let catalog = Catalog::standard(move || probe.load(Ordering::SeqCst));
        let store = store_with(catalog);

        store
            .apply(pending(&[("PARAJIT_NUM_THREADS", "2")]), true)
            .unwrap();
        store
            .apply(pending(&[("PARAJIT_NUM_THREADS", "3")]), false)
            .unwrap();
        assert_eq!(store.get_int(names::NUM_THREADS).unwrap(), 3);

        started.store(true, Ordering::SeqCst);
        let err = store
            .apply(pending(&[("PARAJIT_NUM_THREADS", "6")]), false)
            .unwrap_err();
        assert!(err.to_string().contains("once threads have been launched"));
        assert_eq!(store.get_int(names::NUM_THREADS).unwrap(), 3);
    }

    #[test]
    fn test_unrelated_change_does_not_trip_frozen_parameter() {
        let store = store_with(small_catalog());
        store
            .apply(pending(&[("PARAJIT_FROZEN", "5")]), true)
            .unwrap();
        store
            .apply(
                pending(&[("PARAJIT_FROZEN", "5"), ("PARAJIT_DEBUG", "1")]),
                false,
            )
            .unwrap();
        assert_eq!(store.get_int("FROZEN").unwrap(), 5);
        assert_eq!(store.get_int("DEBUG").unwrap(), 1);
    }

    #[test]
    fn test_override_survives_noop_reload() {
        let store = store_with(small_catalog());
        store.apply(pending(&[]), true).unwrap();

        store
            .set_override("LAYER", ConfigValue::str("workqueue"))
            .unwrap();
        store.apply(pending(&[]), false).unwrap();
        assert_eq!(store.get_str("LAYER").unwrap(), "workqueue");

        store
            .apply(pending(&[("PARAJIT_DEBUG", "1")]), false)
            .unwrap();
        assert_eq!(store.get_str("LAYER").unwrap(), "default");
    }

    #[test]
    fn test_override_respects_policy() {
        let store = store_with(small_catalog());
        let err = store
            .set_override("FROZEN", ConfigValue::Int(3))
            .unwrap_err();
        assert!(matches!(err, ConfigError::ReloadForbidden { .. }));
        assert_eq!(store.get_int("FROZEN").unwrap(), 1);
    }

    #[test]
    fn test_override_goes_through_coercion() {
        let store = store_with(Catalog::standard(|| false));
        store
            .apply(pending(&[("PARAJIT_NUM_THREADS", "2")]), true)
            .unwrap();

        let err = store
            .set_override(names::NUM_THREADS, ConfigValue::Int(0))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue { ref name, .. } if name == names::NUM_THREADS
        ));
        assert_eq!(store.get_int(names::NUM_THREADS).unwrap(), 2);

        store
            .set_override(names::DEBUG, ConfigValue::str(" 1 "))
            .unwrap();
        assert_eq!(store.get(names::DEBUG), Ok(ConfigValue::Int(1)));
    }

    #[test]
    fn test_non_positive_num_threads_falls_back_with_warning() {
        let store = store_with(Catalog::standard(|| false));
        let report = store
            .apply(pending(&[("PARAJIT_NUM_THREADS", "-2")]), true)
            .unwrap();
        assert_eq!(
            store.get_int(names::NUM_THREADS).unwrap(),
            crate::platform::default_num_threads()
        );
        let warned: Vec<_> = report
            .warnings
            .iter()
            .filter(|w| w.parameter() == Some(names::NUM_THREADS))
            .collect();
        assert_eq!(warned.len(), 1);
    }

    #[test]
    fn test_file_scalar_values_coerce() {
        let store = store_with(small_catalog());
        let mut env = PendingEnvironment::new();
        env.insert("PARAJIT_DEBUG", RawValue::Int(3));
        env.insert("PARAJIT_LAYER", RawValue::Bool(true));
        store.apply(env, true).unwrap();
        assert_eq!(store.get_int("DEBUG").unwrap(), 3);
        assert_eq!(store.get_str("LAYER").unwrap(), "true");
    }

    #[test]
    fn test_snapshot_is_stable_across_apply() {
        let store = store_with(small_catalog());
        let before = store.snapshot().unwrap();
        store
            .apply(pending(&[("PARAJIT_DEBUG", "4")]), false)
            .unwrap();
        assert_eq!(before.get("DEBUG"), Some(&ConfigValue::Int(0)));
        assert_eq!(
            store.snapshot().unwrap().get("DEBUG"),
            Some(&ConfigValue::Int(4))
        );
    }
}
