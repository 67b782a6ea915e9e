//! Error types for lunax-runtime
//!
//! Re-exports core errors from lunax-core and adds runtime-specific errors.

use std::path::PathBuf;
use thiserror::Error;

// Re-export core error types
pub use lunax_core::{ErrorKind, LuaError as CoreError, LuaResult as CoreResult};

/// Errors that can occur during runtime operations
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Core Lua error
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Configuration file could not be read
    #[error("Failed to read config {}: {source}", path.display())]
    ConfigIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration text is not valid TOML for [`crate::RuntimeConfig`]
    #[error("Invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

impl RuntimeError {
    /// Create a registration error
    pub fn registration(message: impl Into<String>) -> Self {
        Self::Core(CoreError::registration(message))
    }

    /// Create a conversion error
    pub fn bad_conversion(expected: impl AsRef<str>, actual: impl AsRef<str>) -> Self {
        Self::Core(CoreError::bad_conversion(expected, actual))
    }

    /// Classify this error; configuration failures count as file access or generic
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Core(err) => err.kind(),
            Self::ConfigIo { .. } => ErrorKind::FileAccess,
            Self::ConfigParse(_) => ErrorKind::Generic,
        }
    }

    /// The underlying Lua error, if this is one
    pub fn as_core(&self) -> Option<&CoreError> {
        match self {
            Self::Core(err) => Some(err),
            _ => None,
        }
    }
}

/// Result type alias for runtime operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;
