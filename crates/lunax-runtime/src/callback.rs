//! Native callback boundary
//!
//! Every native function the runtime installs enters through [`boundary`],
//! which turns a Rust result into the C calling convention: the number of
//! results on success, or a raised error on failure. Panics are caught here
//! so they never unwind into the interpreter.

use lunax_core::lunax_sys as ffi;
use lunax_core::{LuaError, LuaResult, State};
use std::any::Any;
use std::os::raw::c_int;
use std::panic::{self, AssertUnwindSafe};
use tracing::warn;

use crate::registry::Shared;

/// Run a native callback body for the interpreter at `raw`
///
/// # Safety
///
/// Must be called from a function invoked by the interpreter, with `raw`
/// the state it was given. `shared` must be null or point to the runtime's
/// live [`Shared`] state.
pub(crate) unsafe fn boundary<F>(raw: *mut ffi::lua_State, shared: *const Shared, body: F) -> c_int
where
    F: FnOnce(&State) -> LuaResult<c_int>,
{
    let err = {
        let state = State::from_raw(raw);
        match panic::catch_unwind(AssertUnwindSafe(|| body(&state))) {
            Ok(Ok(results)) => return results,
            Ok(Err(err)) => err,
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(panic = %message, "native callback panicked");
                LuaError::Generic(format!("native callback panicked: {}", message))
            }
        }
    };
    raise(raw, shared, err)
}

/// Raise `err` inside the interpreter. Never returns.
unsafe fn raise(raw: *mut ffi::lua_State, shared: *const Shared, err: LuaError) -> c_int {
    {
        let message = match shared.as_ref() {
            Some(shared) => shared.stash_error(err),
            None => {
                let message = err.to_string();
                drop(err);
                message
            }
        };
        ffi::lua_pushlstring(raw, message.as_ptr().cast(), message.len());
    }
    // Everything with a destructor is gone; lua_error unwinds with longjmp
    ffi::lua_error(raw)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
