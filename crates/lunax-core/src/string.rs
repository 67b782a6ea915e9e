//! String helpers shared by the stack wrappers

use lunax_sys as ffi;
use std::ffi::CString;
use std::os::raw::c_int;
use std::slice;

use crate::error::{LuaError, LuaResult};

/// Convert a name to a C string for the runtime's `const char*` APIs
pub(crate) fn c_name(name: &str) -> LuaResult<CString> {
    CString::new(name).map_err(|e| LuaError::Generic(format!("Invalid name {:?}: {}", name, e)))
}

/// Borrow the bytes of a string or number slot
///
/// A number slot is converted to a string in place.
///
/// # Safety
///
/// `raw` must be a valid state and `index` an acceptable index. The
/// returned slice is only valid while the slot stays on the stack.
pub(crate) unsafe fn slot_bytes<'a>(raw: *mut ffi::lua_State, index: c_int) -> Option<&'a [u8]> {
    let mut len = 0usize;
    // SAFETY: caller guarantees raw and index are valid
    let data = unsafe { ffi::lua_tolstring(raw, index, &mut len) };
    if data.is_null() {
        return None;
    }
    // SAFETY: the runtime guarantees `len` readable bytes at `data`
    Some(unsafe { slice::from_raw_parts(data.cast::<u8>(), len) })
}

/// Copy runtime string bytes into an owned Rust string
///
/// Runtime strings are arbitrary byte sequences; invalid UTF-8 is replaced.
pub(crate) fn bytes_to_string(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Chunk name derived from source text, as `luaL_loadstring` would use
pub(crate) fn chunk_name_for(source: &str) -> &str {
    match source.find('\0') {
        Some(end) => &source[..end],
        None => source,
    }
}
