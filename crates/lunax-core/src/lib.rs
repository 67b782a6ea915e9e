// Allow raw pointer dereference in public functions - this is an FFI wrapper
// where the caller is responsible for providing valid lua_State pointers.
#![allow(clippy::not_unsafe_ptr_arg_deref)]

//! Safe wrappers for an embedded Lua 5.1 runtime.
//!
//! This crate provides an RAII wrapper around the raw FFI bindings in
//! `lunax-sys`, a value-marshaling layer that moves Rust values across the
//! runtime's stack, and a typed error hierarchy for runtime status codes.
//!
//! # Example
//!
//! ```
//! use lunax_core::State;
//!
//! let state = State::new().unwrap();
//! state.open_libs();
//! let sum: f64 = state.eval("return 1 + 1").unwrap();
//! assert_eq!(sum, 2.0);
//!
//! state.push(&vec!["a", "b"]).unwrap();
//! let items: Vec<String> = state.pop_value().unwrap();
//! assert_eq!(items, ["a", "b"]);
//! ```
//!
//! # Thread Safety
//!
//! [`State`] is `!Send` and `!Sync` because a Lua state is single-threaded.
//! Attempting to use one from multiple threads causes undefined behavior.
//!
//! ```compile_fail
//! use lunax_core::State;
//! use std::thread;
//!
//! let state = State::new().unwrap();
//! thread::spawn(move || {
//!     state.open_libs(); // Error: State is !Send
//! });
//! ```
//!
//! ```compile_fail,edition2018
//! use lunax_core::State;
//! use std::sync::Arc;
//!
//! let state = Arc::new(State::new().unwrap());
//! let shared = state.clone();
//! std::thread::spawn(move || {
//!     let _ = shared; // Error: State is !Sync
//! });
//! ```

mod convert;
mod error;
mod state;
mod string;
mod value;

pub use convert::{FromStack, Push, PushArgs};
pub use error::{ErrorKind, LuaError, LuaResult};
pub use state::State;
pub use value::{CFunction, LightUserdata, LuaType, NewTable, Nil, Pair};

// Re-export lunax-sys for direct FFI access when needed
pub use lunax_sys;
