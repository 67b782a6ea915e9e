//! Configuration types for the Lunax runtime.
//!
//! A [`RuntimeConfig`] can be built in code with its builder-style setters
//! or loaded from TOML:
//!
//! ```toml
//! open_libs = true
//! stack_reserve = 64
//! gc_pause = 150
//! package_path = ["scripts/?.lua"]
//! strict_registration = true
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{RuntimeError, RuntimeResult};

/// Runtime construction settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RuntimeConfig {
    /// Open the standard libraries when the runtime is created.
    /// Default: true
    pub open_libs: bool,

    /// Stack slots reserved up front for host pushes.
    /// Default: 64
    pub stack_reserve: i32,

    /// Collector pause, in percent. `None` keeps the runtime default.
    pub gc_pause: Option<i32>,

    /// Collector step multiplier, in percent. `None` keeps the runtime default.
    pub gc_step_multiplier: Option<i32>,

    /// Search patterns prepended to `package.path`, such as `"scripts/?.lua"`.
    /// Requires `open_libs`.
    pub package_path: Vec<String>,

    /// Fail when a class name is already bound to a different type.
    /// When false the conflicting registration is skipped with a warning.
    /// Default: true
    pub strict_registration: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            open_libs: true,
            stack_reserve: 64,
            gc_pause: None,
            gc_step_multiplier: None,
            package_path: Vec::new(),
            strict_registration: true,
        }
    }
}

impl RuntimeConfig {
    /// Create a new config with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config with no standard libraries, for sandboxed chunks.
    pub fn minimal() -> Self {
        Self {
            open_libs: false,
            ..Default::default()
        }
    }

    /// Parse a config from TOML text. Missing keys take their defaults.
    pub fn from_toml_str(text: &str) -> RuntimeResult<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load a config from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> RuntimeResult<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| RuntimeError::ConfigIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Enable or disable the standard libraries.
    pub fn open_libs(mut self, enabled: bool) -> Self {
        self.open_libs = enabled;
        self
    }

    /// Set the number of stack slots reserved at startup.
    pub fn stack_reserve(mut self, slots: i32) -> Self {
        self.stack_reserve = slots;
        self
    }

    /// Set the collector pause.
    pub fn gc_pause(mut self, pause: i32) -> Self {
        self.gc_pause = Some(pause);
        self
    }

    /// Set the collector step multiplier.
    pub fn gc_step_multiplier(mut self, multiplier: i32) -> Self {
        self.gc_step_multiplier = Some(multiplier);
        self
    }

    /// Add a module search pattern.
    pub fn package_path(mut self, pattern: impl Into<String>) -> Self {
        self.package_path.push(pattern.into());
        self
    }

    /// Choose whether conflicting class registrations fail or are skipped.
    pub fn strict_registration(mut self, strict: bool) -> Self {
        self.strict_registration = strict;
        self
    }
}
