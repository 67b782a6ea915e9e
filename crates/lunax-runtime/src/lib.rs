// Allow unsafe operations inside unsafe functions without nested unsafe blocks.
// The callback thunks are thin FFI shims where wrapping every call is overly
// verbose.
#![allow(unsafe_op_in_unsafe_fn)]

//! lunax-runtime - binds native Rust types and functions into an embedded Lua runtime.
//!
//! A [`Runtime`] owns one interpreter plus the descriptors and functions
//! registered into it. Native types become script classes: a global
//! constructor returns a handle table whose methods dispatch back into Rust,
//! and the collector destroys the native instance exactly once.
//!
//! # Example
//!
//! ```
//! use lunax_runtime::prelude::*;
//!
//! let runtime = Runtime::new().unwrap();
//! runtime
//!     .register_function("double", |state: &State| {
//!         let n = state.check_number(1)?;
//!         state.push(&(n * 2.0))?;
//!         Ok(1)
//!     })
//!     .unwrap();
//!
//! let n: f64 = runtime.eval("return double(21)").unwrap();
//! assert_eq!(n, 42.0);
//! ```
//!
//! # Errors
//!
//! Errors returned by native callbacks abort the running script and come
//! back out of the host call with their original [`ErrorKind`]. Panics are
//! caught at the callback boundary and reported as `Generic` errors.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │ Runtime                                       │
//! │  - State (owned interpreter)                  │
//! │  - Shared: class registry, native functions,  │
//! │    pending callback error                     │
//! └──────────────────────────────────────────────┘
//!          │ closures carry pointers into Shared
//!          ↓
//! ┌──────────────────────────────────────────────┐
//! │ callback boundary                             │
//! │  - catches panics                             │
//! │  - stashes typed errors, raises the message   │
//! └──────────────────────────────────────────────┘
//!          ↓
//! ┌──────────────────────────────────────────────┐
//! │ ClassDescriptor / native functions            │
//! └──────────────────────────────────────────────┘
//! ```

mod callback;
pub mod class;
pub mod config;
pub mod error;
mod function;
mod registry;
pub mod runtime;

pub use class::{ClassDescriptor, Constructor, Method, MethodFn, NativeClass};
pub use config::RuntimeConfig;
pub use error::{RuntimeError, RuntimeResult};
pub use function::NativeFunction;
pub use runtime::Runtime;

pub use lunax_core::lunax_sys::{LUA_RELEASE, LUA_VERSION};
pub use lunax_core::{
    ErrorKind, FromStack, LightUserdata, LuaError, LuaResult, LuaType, NewTable, Nil, Pair,
    Push, PushArgs, State,
};

pub mod prelude {
    pub use crate::class::{ClassDescriptor, Method, NativeClass};
    pub use crate::config::RuntimeConfig;
    pub use crate::error::{RuntimeError, RuntimeResult};
    pub use crate::function::NativeFunction;
    pub use crate::runtime::Runtime;
    pub use lunax_core::{
        ErrorKind, FromStack, LuaError, LuaResult, LuaType, NewTable, Nil, Pair, Push, PushArgs,
        State,
    };
}
