//! # Parameter Catalog
//!
//! Ordered set of declared parameters. Declaration order is the processing
//! order of every apply pass, so reload conflicts surface deterministically.

use crate::parameter::{Parameter, ReloadPolicy};
use crate::platform;
use crate::value::ConfigValue;
use parajit_errors::ConfigError;
use std::collections::BTreeMap;

/// Names of the parameters in [`Catalog::standard`].
pub mod names {
    pub const DEVELOPER_MODE: &str = "DEVELOPER_MODE";
    pub const DISABLE_PERFORMANCE_WARNINGS: &str = "DISABLE_PERFORMANCE_WARNINGS";
    pub const FULL_TRACEBACKS: &str = "FULL_TRACEBACKS";
    pub const SHOW_HELP: &str = "SHOW_HELP";
    pub const COLOR_SCHEME: &str = "COLOR_SCHEME";
    pub const BOUNDSCHECK: &str = "BOUNDSCHECK";
    pub const DEBUG: &str = "DEBUG";
    pub const DEBUG_PRINT_AFTER: &str = "DEBUG_PRINT_AFTER";
    pub const DEBUG_PRINT_BEFORE: &str = "DEBUG_PRINT_BEFORE";
    pub const DEBUG_FRONTEND: &str = "DEBUG_FRONTEND";
    pub const FUNCTION_CACHE_SIZE: &str = "FUNCTION_CACHE_SIZE";
    pub const DEBUG_CACHE: &str = "DEBUG_CACHE";
    pub const CACHE_DIR: &str = "CACHE_DIR";
    pub const TRACE: &str = "TRACE";
    pub const DEBUG_TYPEINFER: &str = "DEBUG_TYPEINFER";
    pub const CPU_NAME: &str = "CPU_NAME";
    pub const CPU_FEATURES: &str = "CPU_FEATURES";
    pub const OPT: &str = "OPT";
    pub const DUMP_IR: &str = "DUMP_IR";
    pub const DUMP_LLVM: &str = "DUMP_LLVM";
    pub const DUMP_ASSEMBLY: &str = "DUMP_ASSEMBLY";
    pub const LOOP_VECTORIZE: &str = "LOOP_VECTORIZE";
    pub const DUMP_HTML: &str = "DUMP_HTML";
    pub const ENABLE_AVX: &str = "ENABLE_AVX";
    pub const DISABLE_INTEL_SVML: &str = "DISABLE_INTEL_SVML";
    pub const DISABLE_JIT: &str = "DISABLE_JIT";
    pub const THREADING_LAYER: &str = "THREADING_LAYER";
    pub const NUM_THREADS: &str = "NUM_THREADS";
    pub const ENABLE_PROFILING: &str = "ENABLE_PROFILING";
    pub const DEBUGINFO: &str = "DEBUGINFO";
    pub const GDB_BINARY: &str = "GDB_BINARY";
}

const NUM_THREADS_RELOAD_MESSAGE: &str = "Cannot set PARAJIT_{name} to a different value once \
     threads have been launched (currently set to {current}, trying to set it to {new})";

#[derive(Debug, Clone, Default)]
pub struct Catalog {
    parameters: Vec<Parameter>,
    index: BTreeMap<String, usize>,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a parameter at the end of the processing order.
    pub fn declare(&mut self, parameter: Parameter) -> Result<(), ConfigError> {
        if self.index.contains_key(parameter.name()) {
            return Err(ConfigError::DuplicateParameter {
                name: parameter.name().to_string(),
            });
        }
        self.index
            .insert(parameter.name().to_string(), self.parameters.len());
        self.parameters.push(parameter);
        Ok(())
    }

    pub fn from_parameters(
        parameters: impl IntoIterator<Item = Parameter>,
    ) -> Result<Self, ConfigError> {
        let mut catalog = Self::new();
        for parameter in parameters {
            catalog.declare(parameter)?;
        }
        Ok(catalog)
    }

    pub fn get(&self, name: &str) -> Option<&Parameter> {
        self.index.get(name).map(|&i| &self.parameters[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Parameters in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(Parameter::name)
    }

    pub fn len(&self) -> usize {
        self.parameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parameters.is_empty()
    }

    /// The runtime's parameter catalog.
    ///
    /// `pool_started` reports whether the worker pool has launched;
    /// `NUM_THREADS` may only change while it returns `false`.
    pub fn standard(pool_started: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        use names::*;

        let parameters = vec![
            Parameter::int(DEVELOPER_MODE, 0),
            Parameter::int(DISABLE_PERFORMANCE_WARNINGS, 0),
            Parameter::int(FULL_TRACEBACKS, 0).default_from(|r| r.int(DEVELOPER_MODE).into()),
            Parameter::int(SHOW_HELP, 0),
            Parameter::string(COLOR_SCHEME, "no_color"),
            Parameter::optional_int(BOUNDSCHECK),
            Parameter::int(DEBUG, 0),
            Parameter::string(DEBUG_PRINT_AFTER, "none"),
            Parameter::string(DEBUG_PRINT_BEFORE, "none"),
            Parameter::int(DEBUG_FRONTEND, 0),
            Parameter::int(FUNCTION_CACHE_SIZE, 128),
            Parameter::int(DEBUG_CACHE, 0).default_from(|r| r.int(DEBUG).into()),
            Parameter::string(CACHE_DIR, ""),
            Parameter::int(TRACE, 0),
            Parameter::int(DEBUG_TYPEINFER, 0),
            Parameter::optional_string(CPU_NAME),
            Parameter::optional_string(CPU_FEATURES).default_from(|r| {
                match r.str(CPU_NAME) {
                    Some(name) if name.eq_ignore_ascii_case("generic") => ConfigValue::str(""),
                    _ => ConfigValue::Unset,
                }
            }),
            Parameter::int(OPT, 3),
            Parameter::int(DUMP_IR, 0).default_from(|r| {
                (r.int(DEBUG_FRONTEND) != 0 || r.int(DEBUG_TYPEINFER) != 0).into()
            }),
            Parameter::int(DUMP_LLVM, 0).default_from(|r| r.int(DEBUG).into()),
            Parameter::int(DUMP_ASSEMBLY, 0).default_from(|r| r.int(DEBUG).into()),
            Parameter::int(LOOP_VECTORIZE, i64::from(!(platform::IS_WIN32 && platform::IS_32BITS))),
            Parameter::path(DUMP_HTML),
            Parameter::int(ENABLE_AVX, 0)
                .default_from(|_| platform::default_enable_avx().into()),
            Parameter::int(DISABLE_INTEL_SVML, i64::from(platform::IS_32BITS)),
            Parameter::int(DISABLE_JIT, 0),
            Parameter::string(THREADING_LAYER, "default"),
            Parameter::positive_int(NUM_THREADS, 1)
                .default_from(|_| platform::default_num_threads().into())
                .reload(ReloadPolicy::conditional_on(move || !pool_started()))
                .reload_error_message(NUM_THREADS_RELOAD_MESSAGE),
            Parameter::int(ENABLE_PROFILING, 0)
                .default_from(|_| platform::running_under_profiler().into()),
            Parameter::int(DEBUGINFO, 0).default_from(|r| r.int(ENABLE_PROFILING).into()),
            Parameter::string(GDB_BINARY, "/usr/bin/gdb"),
        ];

        let mut catalog = Self::new();
        for parameter in parameters {
            catalog
                .index
                .insert(parameter.name().to_string(), catalog.parameters.len());
            catalog.parameters.push(parameter);
        }
        catalog
    }
}
