//! Core error types for Lua runtime operations
//!
//! Every protected runtime entry point reports an integer status. The
//! status is mapped onto this hierarchy exactly once, at the boundary,
//! and the error message the runtime left on the stack is carried along.

use lunax_sys as ffi;
use std::ffi::NulError;
use std::os::raw::c_int;
use thiserror::Error;

/// Result type alias for Lua operations
pub type LuaResult<T> = Result<T, LuaError>;

/// Coarse classification of a [`LuaError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Generic,
    Runtime,
    Syntax,
    OutOfMemory,
    FileAccess,
    BadConversion,
    Registration,
}

/// Structured error types for Lua runtime operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LuaError {
    /// Unclassified failure, including unknown status codes
    #[error("Lua error: {0}")]
    Generic(String),

    /// Error raised while running a chunk or function
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Chunk failed to compile
    #[error("Syntax error: {0}")]
    Syntax(String),

    /// Allocation failure inside the runtime
    #[error("Out of memory: {0}")]
    OutOfMemory(String),

    /// Chunk file could not be opened or read
    #[error("File error: {0}")]
    FileAccess(String),

    /// Stack value does not have the requested type
    #[error("Bad conversion: {0}")]
    BadConversion(String),

    /// Native type could not be bound under the requested name
    #[error("Registration error: {0}")]
    Registration(String),
}

impl LuaError {
    /// Map a non-zero runtime status code onto an error variant
    ///
    /// Unknown codes, including `LUA_ERRERR`, map to [`LuaError::Generic`].
    pub fn from_status(code: c_int, message: impl Into<String>) -> Self {
        let message = message.into();
        match code {
            ffi::LUA_ERRRUN => Self::Runtime(message),
            ffi::LUA_ERRSYNTAX => Self::Syntax(message),
            ffi::LUA_ERRMEM => Self::OutOfMemory(message),
            ffi::LUA_ERRFILE => Self::FileAccess(message),
            _ => Self::Generic(message),
        }
    }

    /// Create a conversion error naming the expected and actual kinds
    pub fn bad_conversion(expected: impl AsRef<str>, actual: impl AsRef<str>) -> Self {
        Self::BadConversion(format!(
            "expected {}, got {}",
            expected.as_ref(),
            actual.as_ref()
        ))
    }

    /// Create a conversion error for a native function argument
    pub fn bad_argument(position: i32, expected: impl AsRef<str>, actual: impl AsRef<str>) -> Self {
        Self::BadConversion(format!(
            "bad argument #{} (expected {}, got {})",
            position,
            expected.as_ref(),
            actual.as_ref()
        ))
    }

    /// Create a generic error
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic(message.into())
    }

    /// Create a registration error
    pub fn registration(message: impl Into<String>) -> Self {
        Self::Registration(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Generic(_) => ErrorKind::Generic,
            Self::Runtime(_) => ErrorKind::Runtime,
            Self::Syntax(_) => ErrorKind::Syntax,
            Self::OutOfMemory(_) => ErrorKind::OutOfMemory,
            Self::FileAccess(_) => ErrorKind::FileAccess,
            Self::BadConversion(_) => ErrorKind::BadConversion,
            Self::Registration(_) => ErrorKind::Registration,
        }
    }

    /// The message carried by this error, without the variant prefix
    pub fn message(&self) -> &str {
        match self {
            Self::Generic(m)
            | Self::Runtime(m)
            | Self::Syntax(m)
            | Self::OutOfMemory(m)
            | Self::FileAccess(m)
            | Self::BadConversion(m)
            | Self::Registration(m) => m,
        }
    }

    /// Check if this error was produced by a script rather than the host
    pub fn is_script_error(&self) -> bool {
        matches!(self, Self::Runtime(_) | Self::Syntax(_))
    }
}

impl From<NulError> for LuaError {
    fn from(err: NulError) -> Self {
        Self::Generic(format!("string contains an interior nul byte: {}", err))
    }
}
