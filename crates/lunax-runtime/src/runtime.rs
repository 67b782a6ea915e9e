//! The embedding entry point: one interpreter plus everything bound into it

use lunax_core::lunax_sys as ffi;
use lunax_core::{FromStack, LuaError, LuaResult, PushArgs, State};
use std::fmt;
use std::os::raw::c_int;
use std::path::Path;
use tracing::{debug, trace};

use crate::class::{self, ClassDescriptor, NativeClass};
use crate::config::RuntimeConfig;
use crate::error::RuntimeResult;
use crate::function::{self, NativeFunction};
use crate::registry::Shared;

/// An interpreter together with the classes and functions registered into it
///
/// Errors raised by native callbacks reach the caller with their original
/// kind: a method that fails with `BadConversion` makes the surrounding
/// [`Runtime::exec_str`] fail with `BadConversion`, not `Runtime`.
///
/// ```compile_fail
/// fn assert_send<T: Send>() {}
/// assert_send::<lunax_runtime::Runtime>();
/// ```
pub struct Runtime {
    // Field order matters: the state closes, running every pending
    // finalizer, before the registry its closures point into is dropped.
    state: State,
    shared: Box<Shared>,
    config: RuntimeConfig,
}

impl Runtime {
    /// Create a runtime with the default configuration
    pub fn new() -> LuaResult<Self> {
        Self::with_config(RuntimeConfig::default())
    }

    /// Create a runtime from a configuration
    pub fn with_config(config: RuntimeConfig) -> LuaResult<Self> {
        let state = State::new()?;
        if config.open_libs {
            state.open_libs();
        }
        state.check_stack(config.stack_reserve)?;
        if let Some(pause) = config.gc_pause {
            state.set_gc_pause(pause);
        }
        if let Some(multiplier) = config.gc_step_multiplier {
            state.set_gc_step_multiplier(multiplier);
        }

        let runtime = Self {
            state,
            shared: Box::new(Shared::new()),
            config,
        };
        runtime.prepend_package_path()?;

        debug!(
            open_libs = runtime.config.open_libs,
            strict_registration = runtime.config.strict_registration,
            "runtime created"
        );
        Ok(runtime)
    }

    /// Create a runtime from a TOML configuration file
    pub fn from_config_file(path: impl AsRef<Path>) -> RuntimeResult<Self> {
        let config = RuntimeConfig::from_file(path)?;
        Ok(Self::with_config(config)?)
    }

    fn prepend_package_path(&self) -> LuaResult<()> {
        if self.config.package_path.is_empty() {
            return Ok(());
        }
        let base = self.state.top();
        let result = (|| -> LuaResult<()> {
            self.state.get_global("package")?;
            if !self.state.is_table(-1) {
                return Err(LuaError::generic(
                    "package_path requires the package library (enable open_libs)",
                ));
            }
            self.state.get_field(-1, "path")?;
            let current: String = self.state.pop_value()?;
            let mut path = self.config.package_path.join(";");
            if !current.is_empty() {
                path.push(';');
                path.push_str(&current);
            }
            self.state.push(path.as_str())?;
            self.state.set_field(-2, "path")?;
            trace!(package_path = %path, "package path set");
            Ok(())
        })();
        self.state.set_top(base);
        result
    }

    /// The underlying interpreter state
    pub fn state(&self) -> &State {
        &self.state
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    // ---------------------------------------------------------------------
    // Registration
    // ---------------------------------------------------------------------

    /// Bind a native type described by `descriptor`
    ///
    /// Returns `false` when the name was already bound to another type and
    /// the configuration allows skipping the conflict.
    pub fn register<T: 'static>(&self, descriptor: ClassDescriptor<T>) -> LuaResult<bool> {
        class::register_class(
            &self.state,
            &self.shared,
            descriptor,
            self.config.strict_registration,
        )
    }

    /// Bind a type that describes itself through [`NativeClass`]
    pub fn register_class<T: NativeClass>(&self) -> LuaResult<bool> {
        self.register(ClassDescriptor::<T>::from_class())
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.shared.classes.borrow().contains(name)
    }

    /// Names of the bound classes, sorted
    pub fn registered_classes(&self) -> Vec<String> {
        self.shared.classes.borrow().names()
    }

    /// Publish a native function as the global `name`
    pub fn register_function<F>(&self, name: &str, callback: F) -> LuaResult<()>
    where
        F: Fn(&State) -> LuaResult<c_int> + 'static,
    {
        function::register_function(&self.state, &self.shared, name, Box::new(callback))
    }

    /// Install native functions into the global table `library`
    pub fn register_library(
        &self,
        library: &str,
        functions: &[(&str, NativeFunction)],
    ) -> LuaResult<()> {
        function::register_library(&self.state, &self.shared, library, functions)
    }

    // ---------------------------------------------------------------------
    // Execution
    // ---------------------------------------------------------------------

    pub fn exec_str(&self, source: &str) -> LuaResult<()> {
        self.protected(|state| state.exec_str(source))
    }

    pub fn exec_file(&self, path: impl AsRef<Path>) -> LuaResult<()> {
        let path = path.as_ref();
        debug!(path = %path.display(), "executing file");
        self.protected(|state| state.exec_file(path))
    }

    /// Run a chunk held in memory, reporting errors under `name`
    pub fn exec_buffer(&self, chunk: &[u8], name: &str) -> LuaResult<()> {
        self.protected(|state| state.exec_buffer(chunk, name))
    }

    pub fn exec_bytes<I>(&self, bytes: I) -> LuaResult<()>
    where
        I: IntoIterator<Item = u8>,
    {
        self.protected(|state| state.exec_bytes(bytes))
    }

    /// Run a chunk and strictly read its first result
    pub fn eval<T: FromStack>(&self, source: &str) -> LuaResult<T> {
        self.protected(|state| state.eval(source))
    }

    /// Run a chunk and strictly read every result it returns
    pub fn eval_all<T: FromStack>(&self, source: &str) -> LuaResult<Vec<T>> {
        self.protected(|state| {
            let base = state.top();
            state.load_str(source)?;
            state.pcall(0, ffi::LUA_MULTRET)?;
            let results: LuaResult<Vec<T>> = ((base + 1)..=state.top())
                .map(|index| state.to(index))
                .collect();
            state.set_top(base);
            results
        })
    }

    /// Call the global function `name` with `args` and read its first result
    pub fn call<A, R>(&self, name: &str, args: A) -> LuaResult<R>
    where
        A: PushArgs,
        R: FromStack,
    {
        self.protected(|state| {
            state.get_global(name)?;
            if !state.is_function(-1) {
                return Err(LuaError::bad_conversion(
                    format!("function `{}`", name),
                    state.type_name(-1),
                ));
            }
            let nargs = args.push_args(state)?;
            state.pcall(nargs, 1)?;
            state.pop_value()
        })
    }

    /// Run a full collection cycle, finalizing unreachable instances
    pub fn collect_garbage(&self) {
        self.state.collect_garbage();
    }

    pub fn memory_bytes(&self) -> usize {
        self.state.memory_bytes()
    }

    /// Run `op` at the host boundary
    ///
    /// Restores the stack height on failure and swaps a runtime error for
    /// the typed error a native callback raised it with.
    fn protected<T>(&self, op: impl FnOnce(&State) -> LuaResult<T>) -> LuaResult<T> {
        let base = self.state.top();
        self.shared.clear_error();
        let result = op(&self.state).map_err(|err| match err {
            LuaError::Runtime(message) => self
                .shared
                .recover_error(&message)
                .unwrap_or(LuaError::Runtime(message)),
            other => other,
        });
        self.shared.clear_error();
        if result.is_err() {
            self.state.set_top(base);
        }
        result
    }
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("config", &self.config)
            .field("classes", &self.registered_classes())
            .finish()
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        debug!(classes = self.registered_classes().len(), "closing runtime");
    }
}
