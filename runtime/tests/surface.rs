use parajit_config::{ConfigValue, EnvironmentSource, SourceMerger, names};
use parajit_errors::{ConfigError, RuntimeError};
use parajit_runtime::Runtime;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone, Default)]
struct SharedEnv(Arc<Mutex<HashMap<String, String>>>);

impl SharedEnv {
    fn set(&self, key: &str, value: &str) {
        self.0.lock().insert(key.to_string(), value.to_string());
    }
}

impl EnvironmentSource for SharedEnv {
    fn vars(&self) -> Vec<(String, String)> {
        self.0
            .lock()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

fn runtime(env: &SharedEnv) -> (Runtime, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let runtime = Runtime::new(
        SourceMerger::new()
            .with_base_dir(dir.path())
            .with_environment(env.clone()),
    )
    .unwrap();
    (runtime, dir)
}

#[test]
fn test_num_threads_follows_reload_until_launch() {
    let env = SharedEnv::default();
    env.set("PARAJIT_NUM_THREADS", "2");
    let (runtime, _dir) = runtime(&env);

    env.set("PARAJIT_NUM_THREADS", "3");
    runtime.reload().unwrap();
    assert_eq!(runtime.get_num_threads(), 3);

    let report = runtime.parallel_for(0..32, |_| {}).unwrap();
    assert_eq!(report.effective, 3);
    assert_eq!(runtime.controller().physical_pool_size(), Some(3));

    env.set("PARAJIT_NUM_THREADS", "5");
    let err = runtime.reload().unwrap_err();
    match err {
        RuntimeError::Config(ConfigError::ReloadForbidden {
            name, current, new, ..
        }) => {
            assert_eq!(name, names::NUM_THREADS);
            assert_eq!(current, "3");
            assert_eq!(new, "5");
        }
        other => panic!("expected reload conflict, got {other:?}"),
    }
    assert_eq!(
        runtime.get_config(names::NUM_THREADS),
        Ok(ConfigValue::Int(3))
    );
    assert_eq!(runtime.controller().physical_pool_size(), Some(3));
}

#[test]
fn test_unrelated_change_after_launch_reloads() {
    let env = SharedEnv::default();
    env.set("PARAJIT_NUM_THREADS", "2");
    let (runtime, _dir) = runtime(&env);
    runtime.controller().launch().unwrap();

    env.set("PARAJIT_DEBUG", "1");
    let report = runtime.reload().unwrap();
    assert!(report.updated.iter().any(|n| n == names::DEBUG));
    assert_eq!(runtime.get_config(names::DEBUG), Ok(ConfigValue::Int(1)));
}

#[test]
fn test_direct_set_is_independent_of_config() {
    let env = SharedEnv::default();
    env.set("PARAJIT_NUM_THREADS", "4");
    let (runtime, _dir) = runtime(&env);

    runtime.set_num_threads(2).unwrap();
    assert_eq!(runtime.get_num_threads(), 2);
    assert_eq!(
        runtime.get_config(names::NUM_THREADS),
        Ok(ConfigValue::Int(4))
    );

    // unchanged sources: no reseed
    runtime.reload().unwrap();
    assert_eq!(runtime.get_num_threads(), 2);
}

#[test]
fn test_unknown_parameter_and_invalid_count() {
    let env = SharedEnv::default();
    let (runtime, _dir) = runtime(&env);

    assert!(matches!(
        runtime.get_config("NOT_DECLARED"),
        Err(ConfigError::UnknownParameter { .. })
    ));
    let before = runtime.get_num_threads();
    assert!(runtime.set_num_threads(0).is_err());
    assert!(runtime.set_num_threads(-3).is_err());
    assert_eq!(runtime.get_num_threads(), before);
}

#[test]
fn test_non_positive_num_threads_keeps_config_and_controller_in_step() {
    let env = SharedEnv::default();
    env.set("PARAJIT_NUM_THREADS", "3");
    let (runtime, _dir) = runtime(&env);

    env.set("PARAJIT_NUM_THREADS", "0");
    let report = runtime.reload().unwrap();
    assert_eq!(
        report
            .warnings
            .iter()
            .filter(|w| w.parameter() == Some(names::NUM_THREADS))
            .count(),
        1
    );

    let configured = runtime.store().get_int(names::NUM_THREADS).unwrap();
    assert_eq!(configured, parajit_config::platform::default_num_threads());
    assert_eq!(runtime.get_num_threads(), usize::try_from(configured).unwrap());
    assert_eq!(runtime.settings().unwrap().num_threads, configured);

    assert!(runtime.set_config(names::NUM_THREADS, ConfigValue::Int(-1)).is_err());
    assert_eq!(runtime.store().get_int(names::NUM_THREADS).unwrap(), configured);
    assert_eq!(runtime.get_num_threads(), usize::try_from(configured).unwrap());
}
