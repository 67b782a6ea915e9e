//! Core Lua state wrapper with stack access, chunk loading and protected calls

use lunax_sys as ffi;
use std::ffi::c_void;
use std::fmt;
use std::marker::PhantomData;
use std::os::raw::c_int;
use std::path::Path;

use crate::convert::{FromStack, Push};
use crate::error::{LuaError, LuaResult};
use crate::string::{bytes_to_string, c_name, chunk_name_for, slot_bytes};
use crate::value::{CFunction, LuaType};

/// Chunk name used for anonymous byte chunks
const BYTES_CHUNK_NAME: &str = "=(load)";

/// A Lua interpreter state
///
/// An owned state is created by [`State::new`] and closed when dropped.
/// A borrowed state wraps a pointer the host already manages (for example
/// the state handed to a native callback) and never closes it.
///
/// Most operations return `&Self` so stack manipulation can be chained.
///
/// # Thread Safety
///
/// This type is `!Send` and `!Sync` because a Lua state is single-threaded.
/// Accessing a state from multiple threads causes undefined behavior.
pub struct State {
    raw: *mut ffi::lua_State,
    owned: bool,
    /// Marker to make this type !Send + !Sync
    _not_send: PhantomData<*mut ()>,
}

impl State {
    /// Create a new, empty interpreter state
    ///
    /// The standard libraries are not opened; call [`State::open_libs`].
    pub fn new() -> LuaResult<Self> {
        // SAFETY: luaL_newstate has no preconditions
        let raw = unsafe { ffi::luaL_newstate() };
        if raw.is_null() {
            return Err(LuaError::OutOfMemory("Error creating Lua state".to_string()));
        }

        Ok(Self {
            raw,
            owned: true,
            _not_send: PhantomData,
        })
    }

    /// Wrap a state owned elsewhere
    ///
    /// # Safety
    ///
    /// `raw` must be a valid state that outlives the returned wrapper.
    pub unsafe fn from_raw(raw: *mut ffi::lua_State) -> Self {
        Self {
            raw,
            owned: false,
            _not_send: PhantomData,
        }
    }

    /// Get the raw state pointer
    pub fn raw(&self) -> *mut ffi::lua_State {
        self.raw
    }

    /// Whether dropping this wrapper closes the state
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// Open the standard libraries (base, package, string, table, math, io, os, debug)
    pub fn open_libs(&self) -> &Self {
        // SAFETY: self.raw is valid
        unsafe { ffi::luaL_openlibs(self.raw) };
        self
    }

    // ---------------------------------------------------------------------
    // Stack
    // ---------------------------------------------------------------------

    /// Index of the top slot, which is also the number of slots
    pub fn top(&self) -> i32 {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_gettop(self.raw) }
    }

    /// Grow or shrink the stack; new slots are nil
    pub fn set_top(&self, index: i32) -> &Self {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_settop(self.raw, index) };
        self
    }

    pub fn is_empty(&self) -> bool {
        self.top() == 0
    }

    /// Convert a relative index into an absolute one
    ///
    /// Pseudo-indices are returned unchanged.
    pub fn abs_index(&self, index: i32) -> i32 {
        if index > 0 || index <= ffi::LUA_REGISTRYINDEX {
            index
        } else {
            self.top() + index + 1
        }
    }

    /// Ensure room for `extra` more slots
    pub fn check_stack(&self, extra: i32) -> LuaResult<&Self> {
        // SAFETY: self.raw is valid
        if unsafe { ffi::lua_checkstack(self.raw, extra) } == 0 {
            return Err(LuaError::Generic(format!(
                "stack overflow: cannot reserve {} more slots",
                extra
            )));
        }
        Ok(self)
    }

    /// Move the top value into `index`, shifting values above it up
    pub fn insert(&self, index: i32) -> &Self {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_insert(self.raw, index) };
        self
    }

    /// Pop the top value into `index`, overwriting what was there
    pub fn replace(&self, index: i32) -> &Self {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_replace(self.raw, index) };
        self
    }

    /// Remove the value at `index`, shifting values above it down
    pub fn remove(&self, index: i32) -> &Self {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_remove(self.raw, index) };
        self
    }

    pub fn pop(&self, count: i32) -> &Self {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_pop(self.raw, count) };
        self
    }

    /// Push a copy of the value at `index`
    pub fn push_value(&self, index: i32) -> &Self {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_pushvalue(self.raw, index) };
        self
    }

    /// Push a value through its [`Push`] implementation
    pub fn push<T: Push + ?Sized>(&self, value: &T) -> LuaResult<&Self> {
        value.push_to(self)?;
        Ok(self)
    }

    pub fn push_nil(&self) -> &Self {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_pushnil(self.raw) };
        self
    }

    /// Push a native function closing over the top `upvalues` values
    pub fn push_closure(&self, function: CFunction, upvalues: i32) -> &Self {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_pushcclosure(self.raw, function, upvalues) };
        self
    }

    pub fn push_function(&self, function: CFunction) -> &Self {
        self.push_closure(function, 0)
    }

    // ---------------------------------------------------------------------
    // Inspection
    // ---------------------------------------------------------------------

    pub fn type_of(&self, index: i32) -> LuaType {
        // SAFETY: self.raw is valid
        LuaType::from_raw(unsafe { ffi::lua_type(self.raw, index) })
    }

    pub fn type_name(&self, index: i32) -> &'static str {
        self.type_of(index).name()
    }

    pub fn is_none(&self, index: i32) -> bool {
        self.type_of(index) == LuaType::None
    }

    pub fn is_nil(&self, index: i32) -> bool {
        self.type_of(index) == LuaType::Nil
    }

    pub fn is_none_or_nil(&self, index: i32) -> bool {
        self.type_of(index).is_none_or_nil()
    }

    pub fn is_boolean(&self, index: i32) -> bool {
        self.type_of(index) == LuaType::Boolean
    }

    /// True for numbers and for strings convertible to a number
    pub fn is_number(&self, index: i32) -> bool {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_isnumber(self.raw, index) != 0 }
    }

    /// True for strings and numbers
    pub fn is_string(&self, index: i32) -> bool {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_isstring(self.raw, index) != 0 }
    }

    pub fn is_table(&self, index: i32) -> bool {
        self.type_of(index) == LuaType::Table
    }

    pub fn is_function(&self, index: i32) -> bool {
        self.type_of(index) == LuaType::Function
    }

    /// True only for functions implemented natively
    pub fn is_cfunction(&self, index: i32) -> bool {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_iscfunction(self.raw, index) != 0 }
    }

    /// True for full and light userdata
    pub fn is_userdata(&self, index: i32) -> bool {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_isuserdata(self.raw, index) != 0 }
    }

    pub fn is_light_userdata(&self, index: i32) -> bool {
        self.type_of(index) == LuaType::LightUserdata
    }

    pub fn is_thread(&self, index: i32) -> bool {
        self.type_of(index) == LuaType::Thread
    }

    /// Primitive equality, without metamethods
    pub fn raw_equal(&self, a: i32, b: i32) -> bool {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_rawequal(self.raw, a, b) != 0 }
    }

    /// Length of a string or table, or block size of a userdata
    pub fn obj_len(&self, index: i32) -> usize {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_objlen(self.raw, index) }
    }

    // ---------------------------------------------------------------------
    // Reading values
    // ---------------------------------------------------------------------

    /// Strict read: fail with [`LuaError::BadConversion`] unless the slot
    /// holds a value of the requested kind
    pub fn to<T: FromStack>(&self, index: i32) -> LuaResult<T> {
        T::read(self, index)
    }

    /// Lenient read: return `default` when the slot cannot be converted
    ///
    /// The stack is left as it was found, including when a container
    /// conversion fails partway.
    pub fn to_or<T: FromStack>(&self, default: T, index: i32) -> T {
        T::read(self, index).unwrap_or(default)
    }

    /// Strict read of the top slot, which is then popped
    pub fn pop_value<T: FromStack>(&self) -> LuaResult<T> {
        let value = T::read(self, -1);
        self.pop(1);
        value
    }

    /// Read a full userdata whose metatable is the one registered as `type_name`
    ///
    /// Unlike `luaL_checkudata`, a mismatch is reported as an error instead
    /// of being raised inside the runtime.
    pub fn check_udata<T>(&self, index: i32, type_name: &str) -> LuaResult<*mut T> {
        let index = self.abs_index(index);
        let c_type_name = c_name(type_name)?;
        if self.type_of(index) != LuaType::Userdata {
            return Err(LuaError::bad_conversion(type_name, self.type_name(index)));
        }
        if !self.get_metatable(index) {
            return Err(LuaError::bad_conversion(type_name, "userdata"));
        }
        // SAFETY: self.raw is valid, the name is nul-terminated
        unsafe { ffi::luaL_getmetatable(self.raw, c_type_name.as_ptr()) };
        let same = self.raw_equal(-1, -2);
        self.pop(1);
        if !same {
            let actual = self.metatable_name(-1);
            self.pop(1);
            return Err(LuaError::bad_conversion(type_name, actual));
        }
        self.pop(1);
        // SAFETY: self.raw is valid and the slot is a full userdata
        Ok(unsafe { ffi::lua_touserdata(self.raw, index) }.cast::<T>())
    }

    /// Name recorded under `__name` in the metatable at `index`
    fn metatable_name(&self, index: i32) -> String {
        let index = self.abs_index(index);
        if !self.is_table(index) {
            return "userdata".to_string();
        }
        // SAFETY: self.raw is valid, the key is a static string
        unsafe { ffi::lua_pushlstring(self.raw, c"__name".as_ptr(), 6) };
        self.raw_get(index);
        let name = if self.type_of(-1) == LuaType::String {
            // SAFETY: the slot is a string
            unsafe { slot_bytes(self.raw, -1) }
                .map(bytes_to_string)
                .unwrap_or_default()
        } else {
            "userdata".to_string()
        };
        self.pop(1);
        name
    }

    // ---------------------------------------------------------------------
    // Native function arguments
    // ---------------------------------------------------------------------

    /// Fail unless argument `position` is present (it may be nil)
    pub fn check_any(&self, position: i32) -> LuaResult<()> {
        if self.is_none(position) {
            return Err(LuaError::bad_argument(position, "value", "no value"));
        }
        Ok(())
    }

    /// Fail unless argument `position` has exactly the given type
    pub fn check_type(&self, position: i32, expected: LuaType) -> LuaResult<()> {
        let actual = self.type_of(position);
        if actual != expected {
            return Err(LuaError::bad_argument(position, expected.name(), actual.name()));
        }
        Ok(())
    }

    /// Strict read of argument `position`, naming the position on failure
    pub fn check_arg<T: FromStack>(&self, position: i32) -> LuaResult<T> {
        let position = self.abs_index(position);
        if !T::matches(self, position) {
            return Err(LuaError::bad_argument(
                position,
                T::EXPECTED,
                self.type_name(position),
            ));
        }
        T::extract(self, position)
    }

    /// Like [`State::check_arg`], but an absent or nil argument yields `default`
    pub fn opt_arg<T: FromStack>(&self, position: i32, default: T) -> LuaResult<T> {
        if self.is_none_or_nil(position) {
            return Ok(default);
        }
        self.check_arg(position)
    }

    pub fn check_number(&self, position: i32) -> LuaResult<f64> {
        self.check_arg(position)
    }

    pub fn check_integer(&self, position: i32) -> LuaResult<i64> {
        self.check_arg(position)
    }

    pub fn check_string(&self, position: i32) -> LuaResult<String> {
        self.check_arg(position)
    }

    // ---------------------------------------------------------------------
    // Tables, globals and metatables
    // ---------------------------------------------------------------------

    /// Push a new empty table
    pub fn new_table(&self) -> &Self {
        self.create_table(0, 0)
    }

    /// Push a new table with preallocated array and hash parts
    pub fn create_table(&self, array: i32, records: i32) -> &Self {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_createtable(self.raw, array, records) };
        self
    }

    /// Pop a key and push `t[key]` where `t` is at `index`
    ///
    /// Metamethods run under a protected call. If one raises, the key is
    /// popped, nothing is pushed and the error is returned.
    pub fn get_table(&self, index: i32) -> LuaResult<&Self> {
        let index = self.abs_index(index);
        self.check_stack(2)?;
        self.push_function(protected_get_table).insert(-2);
        self.push_value(index).insert(-2);
        self.pcall(2, 1)?;
        Ok(self)
    }

    /// Pop a value and a key and assign `t[key] = value` where `t` is at `index`
    ///
    /// Metamethods run under a protected call. If one raises, the key and
    /// value are popped and the error is returned.
    pub fn set_table(&self, index: i32) -> LuaResult<&Self> {
        let index = self.abs_index(index);
        self.check_stack(2)?;
        self.push_function(protected_set_table).insert(-3);
        self.push_value(index).insert(-3);
        self.pcall(3, 0)?;
        Ok(self)
    }

    pub fn raw_get(&self, index: i32) -> &Self {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_rawget(self.raw, index) };
        self
    }

    pub fn raw_set(&self, index: i32) -> &Self {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_rawset(self.raw, index) };
        self
    }

    /// Push `t[n]` without metamethods
    pub fn raw_get_index(&self, index: i32, n: i32) -> &Self {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_rawgeti(self.raw, index, n) };
        self
    }

    /// Pop a value into `t[n]` without metamethods
    pub fn raw_set_index(&self, index: i32, n: i32) -> &Self {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_rawseti(self.raw, index, n) };
        self
    }

    /// Push `t[key]` where `t` is at `index`
    ///
    /// Runs `__index` under a protected call, like [`State::get_table`].
    pub fn get_field(&self, index: i32, key: &str) -> LuaResult<&Self> {
        let index = self.abs_index(index);
        self.check_stack(1)?;
        self.push(key)?;
        self.get_table(index)
    }

    /// Pop a value into `t[key]` where `t` is at `index`
    ///
    /// Runs `__newindex` under a protected call, like [`State::set_table`].
    pub fn set_field(&self, index: i32, key: &str) -> LuaResult<&Self> {
        let index = self.abs_index(index);
        self.check_stack(1)?;
        self.push(key)?;
        self.insert(-2);
        self.set_table(index)
    }

    /// Push the global `name`
    ///
    /// A failing `__index` on the globals table is returned as an error.
    pub fn get_global(&self, name: &str) -> LuaResult<&Self> {
        self.get_field(ffi::LUA_GLOBALSINDEX, name)
    }

    /// Pop a value into the global `name`
    ///
    /// A failing `__newindex` on the globals table is returned as an error.
    pub fn set_global(&self, name: &str) -> LuaResult<&Self> {
        self.set_field(ffi::LUA_GLOBALSINDEX, name)
    }

    /// Advance a table traversal
    ///
    /// Pops a key and pushes the next key and its value, returning `true`,
    /// or pushes nothing and returns `false` once the table is exhausted.
    /// Start a traversal by pushing nil.
    ///
    /// Do not read the key slot with a string conversion while traversing:
    /// reading a number key as a string converts the slot in place and the
    /// next call then fails to find it. Convert a copy made with
    /// [`State::push_value`] instead. A key missing from the table raises
    /// inside the runtime, so only pass keys produced by this traversal.
    pub fn next(&self, index: i32) -> bool {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_next(self.raw, index) != 0 }
    }

    /// Create the registry metatable `name` and push it
    ///
    /// Returns `false` when a value is already registered under `name`; that
    /// value is pushed instead.
    pub fn new_metatable(&self, name: &str) -> LuaResult<bool> {
        let name = c_name(name)?;
        // SAFETY: self.raw is valid, name is nul-terminated
        Ok(unsafe { ffi::luaL_newmetatable(self.raw, name.as_ptr()) } != 0)
    }

    /// Push the registry metatable `name`, or nil when absent
    pub fn get_named_metatable(&self, name: &str) -> LuaResult<&Self> {
        let name = c_name(name)?;
        // SAFETY: self.raw is valid, name is nul-terminated
        unsafe { ffi::luaL_getmetatable(self.raw, name.as_ptr()) };
        Ok(self)
    }

    /// Push the metatable of the value at `index`, returning `false` and
    /// pushing nothing when it has none
    pub fn get_metatable(&self, index: i32) -> bool {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_getmetatable(self.raw, index) != 0 }
    }

    /// Pop a table and make it the metatable of the value at `index`
    pub fn set_metatable(&self, index: i32) -> &Self {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_setmetatable(self.raw, index) };
        self
    }

    /// Push a new full userdata of `size` bytes and return its block
    ///
    /// The block is uninitialized and aligned for any primitive type.
    pub fn new_userdata(&self, size: usize) -> *mut c_void {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_newuserdata(self.raw, size) }
    }

    /// Bind a native function to the global `name`
    pub fn register_cfunction(&self, name: &str, function: CFunction) -> LuaResult<&Self> {
        self.push_function(function);
        self.set_global(name)
    }

    // ---------------------------------------------------------------------
    // Loading and calling
    // ---------------------------------------------------------------------

    /// Compile the file at `path` and push the resulting function
    pub fn load_file(&self, path: impl AsRef<Path>) -> LuaResult<()> {
        let path = path.as_ref();
        let path_str = path.to_str().ok_or_else(|| {
            LuaError::FileAccess(format!("cannot open {}: path is not valid UTF-8", path.display()))
        })?;
        let c_path = c_name(path_str)?;
        // SAFETY: self.raw is valid, c_path is nul-terminated
        let status = unsafe { ffi::luaL_loadfile(self.raw, c_path.as_ptr()) };
        self.check_status(status)
    }

    /// Compile a source or precompiled chunk and push the resulting function
    pub fn load_buffer(&self, chunk: &[u8], name: &str) -> LuaResult<()> {
        let name = c_name(name)?;
        // SAFETY: self.raw is valid, chunk is readable for its length
        let status = unsafe {
            ffi::luaL_loadbuffer(self.raw, chunk.as_ptr().cast(), chunk.len(), name.as_ptr())
        };
        self.check_status(status)
    }

    /// Compile source text and push the resulting function
    pub fn load_str(&self, source: &str) -> LuaResult<()> {
        self.load_buffer(source.as_bytes(), chunk_name_for(source))
    }

    /// Compile a chunk drawn from a byte iterator and push the resulting function
    pub fn load_bytes<I>(&self, bytes: I) -> LuaResult<()>
    where
        I: IntoIterator<Item = u8>,
    {
        let chunk: Vec<u8> = bytes.into_iter().collect();
        self.load_buffer(&chunk, BYTES_CHUNK_NAME)
    }

    /// Load and run the file at `path`, discarding its results
    pub fn exec_file(&self, path: impl AsRef<Path>) -> LuaResult<()> {
        self.load_file(path)?;
        self.pcall(0, 0)
    }

    /// Load and run source text, discarding its results
    pub fn exec_str(&self, source: &str) -> LuaResult<()> {
        self.load_str(source)?;
        self.pcall(0, 0)
    }

    /// Load and run a named chunk, discarding its results
    pub fn exec_buffer(&self, chunk: &[u8], name: &str) -> LuaResult<()> {
        self.load_buffer(chunk, name)?;
        self.pcall(0, 0)
    }

    /// Load and run a chunk drawn from a byte iterator, discarding its results
    pub fn exec_bytes<I>(&self, bytes: I) -> LuaResult<()>
    where
        I: IntoIterator<Item = u8>,
    {
        self.load_bytes(bytes)?;
        self.pcall(0, 0)
    }

    /// Run source text and strictly read its first result
    ///
    /// A chunk that returns nothing yields nil.
    pub fn eval<T: FromStack>(&self, source: &str) -> LuaResult<T> {
        self.load_str(source)?;
        self.pcall(0, 1)?;
        self.pop_value()
    }

    /// Call the function below `nargs` arguments in protected mode
    ///
    /// On failure the error message is popped and returned; the function
    /// and its arguments are gone either way.
    pub fn pcall(&self, nargs: i32, nresults: i32) -> LuaResult<()> {
        // SAFETY: self.raw is valid
        let status = unsafe { ffi::lua_pcall(self.raw, nargs, nresults, 0) };
        self.check_status(status)
    }

    /// Like [`State::pcall`], with a message handler at stack index `handler`
    pub fn pcall_with_handler(&self, nargs: i32, nresults: i32, handler: i32) -> LuaResult<()> {
        // SAFETY: self.raw is valid
        let status = unsafe { ffi::lua_pcall(self.raw, nargs, nresults, handler) };
        self.check_status(status)
    }

    /// Call the function below `nargs` arguments, letting errors propagate
    ///
    /// # Safety
    ///
    /// A raised error unwinds with longjmp past any Rust frames between
    /// this call and the enclosing protected call, skipping their
    /// destructors. Only call this where no such frames own resources.
    pub unsafe fn call(&self, nargs: i32, nresults: i32) {
        // SAFETY: caller upholds the unwinding contract
        unsafe { ffi::lua_call(self.raw, nargs, nresults) }
    }

    /// Raise the value on top of the stack as an error
    ///
    /// # Safety
    ///
    /// Never returns normally. Must only be called from a native function
    /// running under a protected call, after every Rust value with a
    /// destructor in the current frame has been dropped.
    pub unsafe fn raise_error(&self) -> c_int {
        // SAFETY: caller upholds the unwinding contract
        unsafe { ffi::lua_error(self.raw) }
    }

    /// Convert a status code into a result, popping the error message
    fn check_status(&self, status: c_int) -> LuaResult<()> {
        if status == ffi::LUA_OK {
            return Ok(());
        }
        let message = self.error_message();
        self.pop(1);
        Err(LuaError::from_status(status, message))
    }

    fn error_message(&self) -> String {
        match self.type_of(-1) {
            // SAFETY: the slot is a string or number
            LuaType::String | LuaType::Number => unsafe { slot_bytes(self.raw, -1) }
                .map(bytes_to_string)
                .unwrap_or_default(),
            LuaType::None | LuaType::Nil => "(no error message)".to_string(),
            other => format!("(error object is a {} value)", other.name()),
        }
    }

    // ---------------------------------------------------------------------
    // Garbage collection
    // ---------------------------------------------------------------------

    /// Run a full collection cycle
    pub fn collect_garbage(&self) -> &Self {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_gc(self.raw, ffi::LUA_GCCOLLECT, 0) };
        self
    }

    /// Memory in use by the runtime, in kilobytes
    pub fn memory_kb(&self) -> i32 {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_gc(self.raw, ffi::LUA_GCCOUNT, 0) }
    }

    /// Memory in use by the runtime, in bytes
    pub fn memory_bytes(&self) -> usize {
        // SAFETY: self.raw is valid
        let (kb, rest) = unsafe {
            (
                ffi::lua_gc(self.raw, ffi::LUA_GCCOUNT, 0),
                ffi::lua_gc(self.raw, ffi::LUA_GCCOUNTB, 0),
            )
        };
        kb.max(0) as usize * 1024 + rest.max(0) as usize
    }

    /// Set the collector pause, returning the previous value
    pub fn set_gc_pause(&self, pause: i32) -> i32 {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_gc(self.raw, ffi::LUA_GCSETPAUSE, pause) }
    }

    /// Set the collector step multiplier, returning the previous value
    pub fn set_gc_step_multiplier(&self, multiplier: i32) -> i32 {
        // SAFETY: self.raw is valid
        unsafe { ffi::lua_gc(self.raw, ffi::LUA_GCSETSTEPMUL, multiplier) }
    }
}

/// Protected body of [`State::get_table`]. Arguments: table, key.
unsafe extern "C-unwind" fn protected_get_table(raw: *mut ffi::lua_State) -> c_int {
    // SAFETY: called by lua_pcall with the two arguments in place
    unsafe { ffi::lua_gettable(raw, 1) };
    1
}

/// Protected body of [`State::set_table`]. Arguments: table, key, value.
unsafe extern "C-unwind" fn protected_set_table(raw: *mut ffi::lua_State) -> c_int {
    // SAFETY: called by lua_pcall with the three arguments in place
    unsafe { ffi::lua_settable(raw, 1) };
    0
}

impl Drop for State {
    fn drop(&mut self) {
        if self.owned {
            // SAFETY: an owned state was created by new() and is closed once
            unsafe { ffi::lua_close(self.raw) };
        }
    }
}

impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("raw", &self.raw)
            .field("owned", &self.owned)
            .field("top", &self.top())
            .finish()
    }
}
