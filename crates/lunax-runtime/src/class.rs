//! Binding native Rust types as script-visible classes.
//!
//! A registered class is exposed as a global constructor function. Calling
//! it builds a native instance and returns a handle table:
//!
//! - `handle[0]` is a full userdata that owns the instance. The class
//!   metatable is attached to it, so the collector finalizes the instance
//!   once the handle is unreachable.
//! - each method is a closure stored under its name, so `handle:name(...)`
//!   reaches the native method with the handle as argument 1.
//!
//! The metatable is hidden from scripts through `__metatable`, so only the
//! collector and runtime teardown can reach the finalizer.
//!
//! # Example
//!
//! ```
//! use lunax_runtime::prelude::*;
//!
//! struct Counter {
//!     count: i64,
//! }
//!
//! impl Counter {
//!     fn increment(&mut self, _state: &State) -> LuaResult<i32> {
//!         self.count += 1;
//!         Ok(0)
//!     }
//!
//!     fn get(&mut self, state: &State) -> LuaResult<i32> {
//!         state.push(&self.count)?;
//!         Ok(1)
//!     }
//! }
//!
//! let runtime = Runtime::new().unwrap();
//! runtime
//!     .register(
//!         ClassDescriptor::new("Counter", |_| Ok(Counter { count: 0 }))
//!             .method("increment", Counter::increment)
//!             .method("get", Counter::get),
//!     )
//!     .unwrap();
//!
//! let count: i64 = runtime
//!     .eval("local c = Counter() c:increment() c:increment() return c:get()")
//!     .unwrap();
//! assert_eq!(count, 2);
//! ```

use lunax_core::lunax_sys as ffi;
use lunax_core::{LightUserdata, LuaError, LuaResult, State};
use std::any::{TypeId, type_name};
use std::cell::{Cell, RefCell};
use std::collections::HashSet;
use std::ffi::c_void;
use std::fmt;
use std::mem;
use std::os::raw::c_int;
use std::panic::{self, AssertUnwindSafe};
use std::ptr;
use tracing::{debug, trace, warn};

use crate::callback::boundary;
use crate::registry::Shared;

/// Builds a native instance from the constructor call's arguments
pub type Constructor<T> = dyn Fn(&State) -> LuaResult<T>;

/// A native method: receives the instance and the state, with the handle
/// at stack index 1 and call arguments from index 2, and returns the
/// number of results it pushed
pub type MethodFn<T> = dyn Fn(&mut T, &State) -> LuaResult<c_int>;

/// A named method of a bound class
pub struct Method<T> {
    name: String,
    func: Box<MethodFn<T>>,
}

impl<T> Method<T> {
    pub fn new<F>(name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut T, &State) -> LuaResult<c_int> + 'static,
    {
        Self {
            name: name.into(),
            func: Box::new(func),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<T> fmt::Debug for Method<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method").field("name", &self.name).finish()
    }
}

/// A type that describes its own script binding
///
/// ```
/// use lunax_runtime::prelude::*;
///
/// struct Greeter {
///     name: String,
/// }
///
/// impl Greeter {
///     fn greet(&mut self, state: &State) -> LuaResult<i32> {
///         state.push(&format!("hello, {}", self.name))?;
///         Ok(1)
///     }
/// }
///
/// impl NativeClass for Greeter {
///     const NAME: &'static str = "Greeter";
///
///     fn construct(state: &State) -> LuaResult<Self> {
///         Ok(Greeter { name: state.check_string(1)? })
///     }
///
///     fn methods() -> Vec<Method<Self>> {
///         vec![Method::new("greet", Greeter::greet)]
///     }
/// }
///
/// let runtime = Runtime::new().unwrap();
/// runtime.register_class::<Greeter>().unwrap();
/// let text: String = runtime.eval("return Greeter('lua'):greet()").unwrap();
/// assert_eq!(text, "hello, lua");
/// ```
pub trait NativeClass: Sized + 'static {
    /// Script-visible class name, also the global constructor's name
    const NAME: &'static str;

    /// Build an instance from the constructor call's arguments
    fn construct(state: &State) -> LuaResult<Self>;

    /// The method table, in dispatch order
    fn methods() -> Vec<Method<Self>>;
}

/// Everything needed to bind `T`: its name, constructor and method table
pub struct ClassDescriptor<T> {
    name: String,
    constructor: Box<Constructor<T>>,
    methods: Vec<Method<T>>,
}

impl<T: 'static> ClassDescriptor<T> {
    pub fn new<F>(name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(&State) -> LuaResult<T> + 'static,
    {
        Self {
            name: name.into(),
            constructor: Box::new(constructor),
            methods: Vec::new(),
        }
    }

    /// Describe a [`NativeClass`] implementor
    pub fn from_class() -> Self
    where
        T: NativeClass,
    {
        Self::new(T::NAME, T::construct).with_methods(T::methods())
    }

    /// Add a method
    pub fn method<F>(mut self, name: impl Into<String>, func: F) -> Self
    where
        F: Fn(&mut T, &State) -> LuaResult<c_int> + 'static,
    {
        self.methods.push(Method::new(name, func));
        self
    }

    /// Add several methods
    pub fn with_methods(mut self, methods: impl IntoIterator<Item = Method<T>>) -> Self {
        self.methods.extend(methods);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn method_names(&self) -> impl Iterator<Item = &str> {
        self.methods.iter().map(|method| method.name())
    }

    fn validate(&self) -> LuaResult<()> {
        if self.name.is_empty() || self.name.contains('\0') {
            return Err(LuaError::registration(format!(
                "invalid class name {:?}",
                self.name
            )));
        }
        let mut seen = HashSet::new();
        for method in &self.methods {
            if method.name.is_empty() || method.name.contains('\0') {
                return Err(LuaError::registration(format!(
                    "invalid method name {:?} on {}",
                    method.name, self.name
                )));
            }
            if !seen.insert(method.name.as_str()) {
                return Err(LuaError::registration(format!(
                    "method `{}` is declared twice on {}",
                    method.name, self.name
                )));
            }
        }
        Ok(())
    }

    /// Run the constructor and push a new handle table
    fn construct(&self, state: &State, shared: *const Shared) -> LuaResult<c_int> {
        let instance = (self.constructor)(state)?;

        state.check_stack(6)?;
        state.new_table();
        let handle = state.top();
        state.get_named_metatable(&self.name)?;
        if !state.is_table(-1) {
            state.set_top(handle - 1);
            return Err(LuaError::registration(format!(
                "metatable for {} is missing",
                self.name
            )));
        }

        // SAFETY: the block is sized for the slot, aligned for pointers, and
        // initialized before anything else can observe it
        unsafe {
            let block = state
                .new_userdata(mem::size_of::<InstanceSlot<T>>())
                .cast::<InstanceSlot<T>>();
            ptr::write(block, InstanceSlot::new(instance));
        }
        state.push_value(-2);
        state.set_metatable(-2);
        state.raw_set_index(handle, 0);
        state.set_metatable(handle);

        let descriptor = LightUserdata(self as *const Self as *mut c_void);
        let shared = LightUserdata(shared as *mut c_void);
        for (index, method) in self.methods.iter().enumerate() {
            state.push(method.name.as_str())?;
            state.push(&index)?;
            state.push(&descriptor)?;
            state.push(&shared)?;
            state.push_closure(dispatch_method::<T>, 3);
            state.raw_set(handle);
        }

        trace!(class = %self.name, "constructed instance");
        Ok(1)
    }

    /// Invoke method `index` on the instance behind argument 1
    fn dispatch(&self, state: &State, index: usize) -> LuaResult<c_int> {
        let method = self.methods.get(index).ok_or_else(|| {
            LuaError::generic(format!("{} has no method at index {}", self.name, index))
        })?;
        let instance = self.resolve(state)?;
        trace!(class = %self.name, method = %method.name, "dispatching method");

        let result = {
            // SAFETY: resolve returned a live instance; only this call can free
            // it while it is borrowed
            let cell = unsafe { &(*instance).value };
            let mut value = cell.try_borrow_mut().map_err(|_| {
                LuaError::BadConversion(format!(
                    "{} instance is already in use by an active method call",
                    self.name
                ))
            })?;
            (method.func)(&mut *value, state)
        };

        // SAFETY: the borrow above has ended
        unsafe { Instance::release_if_orphaned(instance) };
        result
    }

    /// Find the instance owned by the handle at argument 1
    fn resolve(&self, state: &State) -> LuaResult<*mut Instance<T>> {
        if !state.is_table(1) {
            return Err(LuaError::bad_conversion(
                format!("{} instance", self.name),
                state.type_name(1),
            ));
        }
        state.raw_get_index(1, 0);
        let slot = state.check_udata::<InstanceSlot<T>>(-1, &self.name);
        state.pop(1);

        // SAFETY: check_udata verified the block carries this class's metatable,
        // so it holds an InstanceSlot<T>
        let instance = unsafe { (*slot?).instance };
        if instance.is_null() {
            return Err(LuaError::BadConversion(format!(
                "{} instance has already been finalized",
                self.name
            )));
        }
        Ok(instance)
    }
}

impl<T> fmt::Debug for ClassDescriptor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("name", &self.name)
            .field("methods", &self.methods)
            .finish()
    }
}

/// Heap home of a bound instance
struct Instance<T> {
    value: RefCell<T>,
    /// Set when the finalizer ran while a method call held the instance
    orphaned: Cell<bool>,
}

impl<T> Instance<T> {
    /// Free an instance whose finalizer ran during the method call that just ended
    ///
    /// # Safety
    ///
    /// `instance` must be live and not borrowed.
    unsafe fn release_if_orphaned(instance: *mut Self) {
        if (*instance).orphaned.get() {
            drop(Box::from_raw(instance));
        }
    }
}

/// Contents of the userdata block: the single owner of one instance
///
/// Null once finalized, so destruction happens at most once.
#[repr(transparent)]
struct InstanceSlot<T> {
    instance: *mut Instance<T>,
}

impl<T> InstanceSlot<T> {
    fn new(value: T) -> Self {
        let instance = Box::new(Instance {
            value: RefCell::new(value),
            orphaned: Cell::new(false),
        });
        Self {
            instance: Box::into_raw(instance),
        }
    }

    /// Destroy the instance, or hand it to the method call using it
    ///
    /// Returns `false` when the slot was already finalized.
    ///
    /// # Safety
    ///
    /// The slot must have been created by [`InstanceSlot::new`].
    unsafe fn finalize(&mut self) -> bool {
        let instance = mem::replace(&mut self.instance, ptr::null_mut());
        if instance.is_null() {
            return false;
        }
        let in_use = (*instance).value.try_borrow_mut().is_err();
        if in_use {
            (*instance).orphaned.set(true);
        } else {
            drop(Box::from_raw(instance));
        }
        true
    }
}

/// Bind `descriptor` into the interpreter
///
/// Returns `false` when a conflicting registration was skipped because
/// `strict` is off. If publishing the constructor global fails, the class
/// stays bound and registering it again republishes the constructor.
pub(crate) fn register_class<T: 'static>(
    state: &State,
    shared: &Shared,
    descriptor: ClassDescriptor<T>,
    strict: bool,
) -> LuaResult<bool> {
    descriptor.validate()?;
    let name = descriptor.name.clone();

    let conflict = match shared.classes.borrow().bound_type(&name) {
        Some((type_id, bound)) if type_id != TypeId::of::<T>() => Some(format!(
            "class `{}` is already bound to {}",
            name, bound
        )),
        Some(_) => None,
        None => {
            state.get_named_metatable(&name)?;
            let taken = !state.is_nil(-1);
            state.pop(1);
            taken.then(|| {
                format!(
                    "a metatable named `{}` already exists in the runtime registry",
                    name
                )
            })
        }
    };
    if let Some(reason) = conflict {
        if strict {
            return Err(LuaError::Registration(reason));
        }
        warn!(class = %name, reason = %reason, "skipping class registration");
        return Ok(false);
    }

    state.check_stack(4)?;
    let base = state.top();
    let metatable = (|| -> LuaResult<()> {
        state.new_metatable(&name)?;
        state.push_value(-1);
        state.push_closure(finalize_instance::<T>, 1);
        state.set_field(-2, "__gc")?;
        state.push(name.as_str())?;
        state.set_field(-2, "__name")?;
        state.push(name.as_str())?;
        state.set_field(-2, "__metatable")?;
        Ok(())
    })();
    state.set_top(base);
    metatable?;

    let method_count = descriptor.methods.len();
    let descriptor = shared.classes.borrow_mut().install(descriptor);
    state.push(&LightUserdata(descriptor as *mut c_void))?;
    state.push(&LightUserdata(shared as *const Shared as *mut c_void))?;
    state.push_closure(construct_instance::<T>, 2);
    state.set_global(&name)?;

    debug!(
        class = %name,
        rust_type = type_name::<T>(),
        methods = method_count,
        "registered native class"
    );
    Ok(true)
}

/// Global constructor. Upvalues: descriptor, shared state.
unsafe extern "C-unwind" fn construct_instance<T: 'static>(raw: *mut ffi::lua_State) -> c_int {
    let descriptor =
        &*(ffi::lua_touserdata(raw, ffi::lua_upvalueindex(1)) as *const ClassDescriptor<T>);
    let shared = ffi::lua_touserdata(raw, ffi::lua_upvalueindex(2)) as *const Shared;
    boundary(raw, shared, |state| descriptor.construct(state, shared))
}

/// Method thunk. Upvalues: method index, descriptor, shared state.
unsafe extern "C-unwind" fn dispatch_method<T: 'static>(raw: *mut ffi::lua_State) -> c_int {
    let index = ffi::lua_tointeger(raw, ffi::lua_upvalueindex(1)) as usize;
    let descriptor =
        &*(ffi::lua_touserdata(raw, ffi::lua_upvalueindex(2)) as *const ClassDescriptor<T>);
    let shared = ffi::lua_touserdata(raw, ffi::lua_upvalueindex(3)) as *const Shared;
    boundary(raw, shared, |state| descriptor.dispatch(state, index))
}

/// `__gc` metamethod. Upvalue: the class metatable.
unsafe extern "C-unwind" fn finalize_instance<T: 'static>(raw: *mut ffi::lua_State) -> c_int {
    if ffi::lua_type(raw, 1) != ffi::LUA_TUSERDATA || ffi::lua_getmetatable(raw, 1) == 0 {
        return 0;
    }
    let ours = ffi::lua_rawequal(raw, -1, ffi::lua_upvalueindex(1)) != 0;
    ffi::lua_pop(raw, 1);
    if !ours {
        return 0;
    }

    let slot = ffi::lua_touserdata(raw, 1).cast::<InstanceSlot<T>>();
    // SAFETY: the metatable check proves the block holds an InstanceSlot<T>
    match panic::catch_unwind(AssertUnwindSafe(|| unsafe { (*slot).finalize() })) {
        Ok(true) => trace!(rust_type = type_name::<T>(), "finalized instance"),
        Ok(false) => {}
        Err(_) => warn!(rust_type = type_name::<T>(), "instance destructor panicked"),
    }
    0
}
