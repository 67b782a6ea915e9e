//! Native functions and function libraries

use lunax_core::lunax_sys as ffi;
use lunax_core::{LightUserdata, LuaError, LuaResult, State};
use std::ffi::c_void;
use std::os::raw::c_int;
use tracing::debug;

use crate::callback::boundary;
use crate::registry::{NativeFn, Shared};

/// Signature of a plain native function: reads its arguments from the
/// stack, pushes its results and returns how many it pushed
pub type NativeFunction = fn(&State) -> LuaResult<c_int>;

/// Push a closure that calls `function` through the callback boundary
fn push_native_function(state: &State, shared: &Shared, function: Box<NativeFn>) -> LuaResult<()> {
    let function = shared.store_function(function);
    state.check_stack(2)?;
    state.push(&LightUserdata(function as *mut c_void))?;
    state.push(&LightUserdata(shared as *const Shared as *mut c_void))?;
    state.push_closure(call_native_function, 2);
    Ok(())
}

/// Publish `function` as the global `name`
pub(crate) fn register_function(
    state: &State,
    shared: &Shared,
    name: &str,
    function: Box<NativeFn>,
) -> LuaResult<()> {
    check_name(name)?;
    push_native_function(state, shared, function)?;
    state.set_global(name)?;
    debug!(function = %name, "registered native function");
    Ok(())
}

/// Install `functions` into the global table `library`, creating it if needed
pub(crate) fn register_library(
    state: &State,
    shared: &Shared,
    library: &str,
    functions: &[(&str, NativeFunction)],
) -> LuaResult<()> {
    check_name(library)?;
    for (name, _) in functions {
        check_name(name)?;
    }

    let base = state.top();
    state.get_global(library)?;
    if state.is_nil(-1) {
        state.pop(1);
        state.create_table(0, functions.len() as i32);
        state.push_value(-1);
        state.set_global(library)?;
    } else if !state.is_table(-1) {
        let actual = state.type_name(-1);
        state.set_top(base);
        return Err(LuaError::registration(format!(
            "global `{}` is a {}, not a library table",
            library, actual
        )));
    }

    let installed = (|| -> LuaResult<()> {
        for (name, function) in functions {
            push_native_function(state, shared, Box::new(*function))?;
            state.set_field(-2, name)?;
        }
        Ok(())
    })();
    state.set_top(base);
    installed?;

    debug!(library = %library, functions = functions.len(), "registered native library");
    Ok(())
}

fn check_name(name: &str) -> LuaResult<()> {
    if name.is_empty() || name.contains('\0') {
        return Err(LuaError::registration(format!("invalid name {:?}", name)));
    }
    Ok(())
}

/// Closure body for native functions. Upvalues: function, shared state.
unsafe extern "C-unwind" fn call_native_function(raw: *mut ffi::lua_State) -> c_int {
    let function = ffi::lua_touserdata(raw, ffi::lua_upvalueindex(1)) as *const Box<NativeFn>;
    let shared = ffi::lua_touserdata(raw, ffi::lua_upvalueindex(2)) as *const Shared;
    boundary(raw, shared, |state| unsafe { (*function)(state) })
}
