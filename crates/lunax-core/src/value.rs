//! Type tags and marker values for the Lua stack

use lunax_sys as ffi;
use std::ffi::c_void;
use std::fmt;
use std::os::raw::c_int;

/// Type tag of a stack slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LuaType {
    /// The index does not refer to a valid slot
    None,
    Nil,
    Boolean,
    LightUserdata,
    Number,
    String,
    Table,
    Function,
    Userdata,
    Thread,
}

impl LuaType {
    /// Convert a raw `lua_type` tag
    pub fn from_raw(tag: c_int) -> Self {
        match tag {
            ffi::LUA_TNIL => Self::Nil,
            ffi::LUA_TBOOLEAN => Self::Boolean,
            ffi::LUA_TLIGHTUSERDATA => Self::LightUserdata,
            ffi::LUA_TNUMBER => Self::Number,
            ffi::LUA_TSTRING => Self::String,
            ffi::LUA_TTABLE => Self::Table,
            ffi::LUA_TFUNCTION => Self::Function,
            ffi::LUA_TUSERDATA => Self::Userdata,
            ffi::LUA_TTHREAD => Self::Thread,
            _ => Self::None,
        }
    }

    /// The name the runtime itself uses for this type
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "no value",
            Self::Nil => "nil",
            Self::Boolean => "boolean",
            Self::LightUserdata | Self::Userdata => "userdata",
            Self::Number => "number",
            Self::String => "string",
            Self::Table => "table",
            Self::Function => "function",
            Self::Thread => "thread",
        }
    }

    /// Check if this tag denotes an absent value (`None` or `Nil`)
    pub fn is_none_or_nil(self) -> bool {
        matches!(self, Self::None | Self::Nil)
    }
}

impl fmt::Display for LuaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The nil value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Nil;

/// Marker that pushes a fresh empty table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NewTable;

/// A single key/value association, pushed as the table `{ [key] = value }`
///
/// Reading accepts a table holding exactly one pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Pair<K, V>(pub K, pub V);

/// An untyped host pointer stored in the runtime without ownership
///
/// Pushing creates a light userdata. Reading accepts both light and full
/// userdata and yields the block address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LightUserdata(pub *mut c_void);

impl LightUserdata {
    pub fn null() -> Self {
        Self(std::ptr::null_mut())
    }

    pub fn as_ptr(self) -> *mut c_void {
        self.0
    }

    pub fn is_null(self) -> bool {
        self.0.is_null()
    }
}

/// Native function callable from scripts
pub type CFunction = ffi::lua_CFunction;
