//! # parajit Runtime Surface
//!
//! Ties the parameter store to the thread-count controller and exposes the
//! entry points the compiler and scheduler call:
//! [`reload_config`], [`get_config`], [`set_num_threads`],
//! [`get_num_threads`], [`parallel_for`] and [`settings`].
//!
//! The free functions operate on a process-wide [`Runtime`] created from the
//! working directory and the process environment on first use. Embedders
//! and tests that need isolation build their own [`Runtime`].

pub mod watch;

use parajit_config::{
    ApplyReport, Catalog, ConfigStore, ConfigValue, RuntimeSettings, SourceMerger, names, platform,
};
use parajit_errors::{ConfigError, RuntimeError, ThreadingError};
use parajit_threading::{RegionReport, ThreadCountController};
use std::ops::Range;
use std::sync::{Arc, OnceLock};
use tracing::info;

pub use parajit_config as config;
pub use parajit_threading as threading;

/// Configuration store plus the controller seeded from it.
#[derive(Debug)]
pub struct Runtime {
    store: ConfigStore,
    controller: Arc<ThreadCountController>,
}

impl Runtime {
    /// Build a runtime reading its sources through `merger` and load it.
    ///
    /// `NUM_THREADS` may only change while the controller's pool has not
    /// launched.
    pub fn new(merger: SourceMerger) -> Result<Self, RuntimeError> {
        let controller = Arc::new(ThreadCountController::new(
            platform::default_num_threads(),
        )?);
        let probe = Arc::clone(&controller);
        let catalog = Catalog::standard(move || probe.is_initialized());

        let runtime = Self {
            store: ConfigStore::new(catalog, merger),
            controller,
        };
        runtime.reload()?;
        Ok(runtime)
    }

    /// Runtime reading `.parajit_config.*` from the working directory and
    /// `PARAJIT_*` from the process environment.
    pub fn from_environment() -> Result<Self, RuntimeError> {
        Self::new(SourceMerger::new())
    }

    pub fn store(&self) -> &ConfigStore {
        &self.store
    }

    pub fn controller(&self) -> &ThreadCountController {
        &self.controller
    }

    /// Re-read the config file and environment; a no-op when they are
    /// unchanged.
    pub fn reload(&self) -> Result<ApplyReport, RuntimeError> {
        let report = self.store.reload()?;
        self.seed_thread_count(&report.updated)?;
        Ok(report)
    }

    /// Re-read and re-apply every parameter even if sources are unchanged.
    pub fn reset(&self) -> Result<ApplyReport, RuntimeError> {
        let report = self.store.reset()?;
        self.seed_thread_count(&report.updated)?;
        Ok(report)
    }

    pub fn get_config(&self, name: &str) -> Result<ConfigValue, ConfigError> {
        self.store.get(name)
    }

    /// Override one parameter for this process.
    pub fn set_config(&self, name: &str, value: ConfigValue) -> Result<(), RuntimeError> {
        self.store.set_override(name, value)?;
        self.seed_thread_count(&[name.to_string()])
    }

    pub fn set_num_threads(&self, n: i64) -> Result<(), ThreadingError> {
        self.controller.set_num_threads(n)
    }

    pub fn get_num_threads(&self) -> usize {
        self.controller.get_num_threads()
    }

    pub fn parallel_for<F>(&self, range: Range<usize>, body: F) -> Result<RegionReport, ThreadingError>
    where
        F: Fn(usize) + Send + Sync,
    {
        self.controller.parallel_for(range, body)
    }

    pub fn settings(&self) -> Result<RuntimeSettings, ConfigError> {
        let snapshot = self.store.snapshot()?;
        RuntimeSettings::from_snapshot(&snapshot)
    }

    // The controller follows NUM_THREADS until its pool launches.
    fn seed_thread_count(&self, updated: &[String]) -> Result<(), RuntimeError> {
        if !updated.iter().any(|name| name == names::NUM_THREADS) || self.controller.is_initialized()
        {
            return Ok(());
        }
        let n = self.store.get_int(names::NUM_THREADS)?;
        self.controller.reseed(n)?;
        info!("Thread count seeded from {}: {}", names::NUM_THREADS, n);
        Ok(())
    }
}

static GLOBAL: OnceLock<Runtime> = OnceLock::new();

/// The process-wide runtime, created on first call.
pub fn global() -> Result<&'static Runtime, RuntimeError> {
    if let Some(runtime) = GLOBAL.get() {
        return Ok(runtime);
    }
    let runtime = Runtime::from_environment()?;
    Ok(GLOBAL.get_or_init(|| runtime))
}

pub fn reload_config() -> Result<ApplyReport, RuntimeError> {
    global()?.reload()
}

pub fn get_config(name: &str) -> Result<ConfigValue, RuntimeError> {
    Ok(global()?.get_config(name)?)
}

pub fn set_num_threads(n: i64) -> Result<(), RuntimeError> {
    Ok(global()?.set_num_threads(n)?)
}

pub fn get_num_threads() -> Result<usize, RuntimeError> {
    Ok(global()?.get_num_threads())
}

pub fn parallel_for<F>(range: Range<usize>, body: F) -> Result<RegionReport, RuntimeError>
where
    F: Fn(usize) + Send + Sync,
{
    Ok(global()?.parallel_for(range, body)?)
}

pub fn settings() -> Result<RuntimeSettings, RuntimeError> {
    Ok(global()?.settings()?)
}
