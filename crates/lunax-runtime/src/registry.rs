//! Bookkeeping for everything the runtime has handed to scripts
//!
//! Scripts reach native code through raw pointers stored as light userdata
//! in closures. Everything those pointers target lives here, boxed so it
//! never moves, and is only dropped after the interpreter state is closed.

use lunax_core::{LuaError, LuaResult, State};
use std::any::{Any, TypeId, type_name};
use std::cell::RefCell;
use std::collections::HashMap;
use std::os::raw::c_int;

use crate::class::ClassDescriptor;

/// A native function callable from scripts
pub(crate) type NativeFn = dyn Fn(&State) -> LuaResult<c_int>;

struct ClassEntry {
    type_id: TypeId,
    type_name: &'static str,
    descriptor: Box<dyn Any>,
}

/// Class descriptors by script-visible name
#[derive(Default)]
pub(crate) struct ClassRegistry {
    classes: HashMap<String, ClassEntry>,
    /// Descriptors replaced by a re-registration. Instances created before
    /// it still dispatch through them.
    retired: Vec<Box<dyn Any>>,
}

impl ClassRegistry {
    /// Type currently bound to `name`
    pub(crate) fn bound_type(&self, name: &str) -> Option<(TypeId, &'static str)> {
        self.classes
            .get(name)
            .map(|entry| (entry.type_id, entry.type_name))
    }

    /// Take ownership of a descriptor and return its stable address
    pub(crate) fn install<T: 'static>(
        &mut self,
        descriptor: ClassDescriptor<T>,
    ) -> *const ClassDescriptor<T> {
        let name = descriptor.name().to_string();
        let boxed = Box::new(descriptor);
        let ptr: *const ClassDescriptor<T> = &*boxed;

        let entry = ClassEntry {
            type_id: TypeId::of::<T>(),
            type_name: type_name::<T>(),
            descriptor: boxed,
        };
        if let Some(previous) = self.classes.insert(name, entry) {
            self.retired.push(previous.descriptor);
        }
        ptr
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    /// Registered class names, sorted
    pub(crate) fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.classes.keys().cloned().collect();
        names.sort();
        names
    }
}

/// State shared between a runtime and the native callbacks it installs
#[derive(Default)]
pub(crate) struct Shared {
    pub(crate) classes: RefCell<ClassRegistry>,
    functions: RefCell<Vec<Box<Box<NativeFn>>>>,
    /// Typed error behind the message most recently raised by a callback
    pending: RefCell<Option<LuaError>>,
}

impl Shared {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Keep a native function alive and return its stable address
    pub(crate) fn store_function(&self, function: Box<NativeFn>) -> *const Box<NativeFn> {
        let boxed = Box::new(function);
        let ptr: *const Box<NativeFn> = &*boxed;
        self.functions.borrow_mut().push(boxed);
        ptr
    }

    /// Record the typed error for a callback failure and return the message to raise
    ///
    /// A runtime error whose message is the pending error's message is the
    /// same failure propagating outward, so the pending error is kept.
    pub(crate) fn stash_error(&self, err: LuaError) -> String {
        let mut pending = self.pending.borrow_mut();
        if let LuaError::Runtime(message) = &err {
            if pending.as_ref().is_some_and(|previous| previous.to_string() == *message) {
                return message.clone();
            }
        }
        let message = err.to_string();
        *pending = Some(err);
        message
    }

    /// Take the pending error if it is the one that produced `message`
    pub(crate) fn recover_error(&self, message: &str) -> Option<LuaError> {
        let pending = self.pending.borrow_mut().take()?;
        (pending.to_string() == message).then_some(pending)
    }

    pub(crate) fn clear_error(&self) {
        self.pending.borrow_mut().take();
    }
}
