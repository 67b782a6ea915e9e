//! Value conversion traits for moving data across the Lua stack.
//!
//! `Push` places exactly one value on top of the stack.
//! `FromStack` reads a slot back into a Rust type, either strictly through
//! [`State::to`] or leniently through [`State::to_or`].
//!
//! Containers map onto tables: sequences use the keys `1..=n` in order,
//! maps use their own keys. Reading a container builds the whole result
//! before returning it, so a failed conversion never yields a partial
//! value and always leaves the stack as it was found.

use lunax_sys as ffi;
use scopeguard::ScopeGuard;
use serde_json::{Map, Number, Value as JsonValue};
use std::collections::{BTreeMap, HashMap};
use std::hash::{BuildHasher, Hash};
use std::os::raw::c_int;

use crate::error::{LuaError, LuaResult};
use crate::state::State;
use crate::string::{bytes_to_string, slot_bytes};
use crate::value::{CFunction, LightUserdata, LuaType, NewTable, Nil, Pair};

/// Deepest table nesting accepted when converting to or from JSON
const MAX_JSON_DEPTH: usize = 128;

/// Largest integer an `f64` represents exactly
const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_992.0;

/// Place a Rust value on the stack.
pub trait Push {
    /// Push exactly one value; on failure nothing is left behind.
    fn push_to(&self, state: &State) -> LuaResult<()>;
}

/// Read a stack slot into a Rust type.
pub trait FromStack: Sized {
    /// Name of the accepted kind, used in conversion errors
    const EXPECTED: &'static str;

    /// Whether the slot's type tag can represent `Self`
    fn matches(state: &State, index: i32) -> bool;

    /// Convert a slot for which `matches` holds. `index` is absolute.
    fn extract(state: &State, index: i32) -> LuaResult<Self>;

    /// Strict read: tag check followed by extraction
    fn read(state: &State, index: i32) -> LuaResult<Self> {
        let index = state.abs_index(index);
        if !Self::matches(state, index) {
            return Err(LuaError::bad_conversion(Self::EXPECTED, state.type_name(index)));
        }
        Self::extract(state, index)
    }
}

/// Push a sequence of call arguments, returning how many were pushed.
pub trait PushArgs {
    fn push_args(&self, state: &State) -> LuaResult<i32>;
}

/// Restores the stack height on every exit from a conversion
fn stack_guard<'a>(state: &'a State) -> ScopeGuard<&'a State, impl FnOnce(&'a State)> {
    let base = state.top();
    scopeguard::guard(state, move |state| {
        state.set_top(base);
    })
}

/// Run a push sequence, dropping whatever it left behind if it fails
fn push_or_restore<F>(state: &State, push: F) -> LuaResult<()>
where
    F: FnOnce() -> LuaResult<()>,
{
    let base = state.top();
    let result = push();
    if result.is_err() {
        state.set_top(base);
    }
    result
}

fn size_hint(len: usize) -> c_int {
    len.min(c_int::MAX as usize) as c_int
}

/// Reject keys the runtime would raise on before they reach a table
fn check_key(state: &State) -> LuaResult<()> {
    match state.type_of(-1) {
        LuaType::None | LuaType::Nil => Err(LuaError::bad_conversion("table key", "nil")),
        // SAFETY: the slot is a number
        LuaType::Number if unsafe { ffi::lua_tonumber(state.raw(), -1) }.is_nan() => {
            Err(LuaError::bad_conversion("table key", "NaN"))
        }
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Scalars
// ---------------------------------------------------------------------------

impl Push for bool {
    fn push_to(&self, state: &State) -> LuaResult<()> {
        // SAFETY: state.raw() is valid
        unsafe { ffi::lua_pushboolean(state.raw(), c_int::from(*self)) };
        Ok(())
    }
}

impl FromStack for bool {
    const EXPECTED: &'static str = "boolean";

    fn matches(state: &State, index: i32) -> bool {
        state.is_boolean(index)
    }

    fn extract(state: &State, index: i32) -> LuaResult<Self> {
        // SAFETY: state.raw() is valid
        Ok(unsafe { ffi::lua_toboolean(state.raw(), index) } != 0)
    }
}

// All numbers share the runtime's double representation. Integers beyond
// 2^53 lose precision on the way in.
macro_rules! impl_number_push {
    ($($ty:ty),* $(,)?) => {$(
        impl Push for $ty {
            fn push_to(&self, state: &State) -> LuaResult<()> {
                // SAFETY: state.raw() is valid
                unsafe { ffi::lua_pushnumber(state.raw(), *self as ffi::lua_Number) };
                Ok(())
            }
        }
    )*};
}

impl_number_push!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize, f32, f64);

// Integer reads truncate toward zero. NaN and values outside the target's
// range are conversion errors rather than saturating.
macro_rules! impl_integer_read {
    ($($ty:ty),* $(,)?) => {$(
        impl FromStack for $ty {
            const EXPECTED: &'static str = "number";

            fn matches(state: &State, index: i32) -> bool {
                state.is_number(index)
            }

            fn extract(state: &State, index: i32) -> LuaResult<Self> {
                // SAFETY: state.raw() is valid
                let n = unsafe { ffi::lua_tonumber(state.raw(), index) }.trunc();
                // MAX + 1 is a power of two, so the upper bound is exact
                if n >= <$ty>::MIN as f64 && n < <$ty>::MAX as f64 + 1.0 {
                    Ok(n as $ty)
                } else {
                    Err(LuaError::bad_conversion(
                        stringify!($ty),
                        format!("out of range number {}", n),
                    ))
                }
            }
        }
    )*};
}

impl_integer_read!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

macro_rules! impl_float_read {
    ($($ty:ty),* $(,)?) => {$(
        impl FromStack for $ty {
            const EXPECTED: &'static str = "number";

            fn matches(state: &State, index: i32) -> bool {
                state.is_number(index)
            }

            fn extract(state: &State, index: i32) -> LuaResult<Self> {
                // SAFETY: state.raw() is valid
                Ok(unsafe { ffi::lua_tonumber(state.raw(), index) } as $ty)
            }
        }
    )*};
}

impl_float_read!(f32, f64);

impl Push for str {
    fn push_to(&self, state: &State) -> LuaResult<()> {
        // SAFETY: the runtime copies `len` bytes from the pointer
        unsafe { ffi::lua_pushlstring(state.raw(), self.as_ptr().cast(), self.len()) };
        Ok(())
    }
}

impl Push for String {
    fn push_to(&self, state: &State) -> LuaResult<()> {
        self.as_str().push_to(state)
    }
}

/// Accepts strings and numbers. A number slot is converted to a string in
/// place, see [`State::next`].
impl FromStack for String {
    const EXPECTED: &'static str = "string";

    fn matches(state: &State, index: i32) -> bool {
        state.is_string(index)
    }

    fn extract(state: &State, index: i32) -> LuaResult<Self> {
        // SAFETY: the bytes are copied before the slot can change
        unsafe { slot_bytes(state.raw(), index) }
            .map(bytes_to_string)
            .ok_or_else(|| LuaError::bad_conversion(Self::EXPECTED, state.type_name(index)))
    }
}

impl Push for Nil {
    fn push_to(&self, state: &State) -> LuaResult<()> {
        state.push_nil();
        Ok(())
    }
}

impl FromStack for Nil {
    const EXPECTED: &'static str = "nil";

    fn matches(state: &State, index: i32) -> bool {
        state.is_none_or_nil(index)
    }

    fn extract(_state: &State, _index: i32) -> LuaResult<Self> {
        Ok(Nil)
    }
}

impl Push for NewTable {
    fn push_to(&self, state: &State) -> LuaResult<()> {
        state.new_table();
        Ok(())
    }
}

impl Push for LightUserdata {
    fn push_to(&self, state: &State) -> LuaResult<()> {
        // SAFETY: state.raw() is valid; the pointer is stored, never dereferenced
        unsafe { ffi::lua_pushlightuserdata(state.raw(), self.0) };
        Ok(())
    }
}

impl FromStack for LightUserdata {
    const EXPECTED: &'static str = "userdata";

    fn matches(state: &State, index: i32) -> bool {
        state.is_userdata(index)
    }

    fn extract(state: &State, index: i32) -> LuaResult<Self> {
        // SAFETY: state.raw() is valid
        Ok(LightUserdata(unsafe { ffi::lua_touserdata(state.raw(), index) }))
    }
}

/// Raw C functions push as closures without upvalues.
impl Push for CFunction {
    fn push_to(&self, state: &State) -> LuaResult<()> {
        state.push_function(*self);
        Ok(())
    }
}

impl FromStack for CFunction {
    const EXPECTED: &'static str = "C function";

    fn matches(state: &State, index: i32) -> bool {
        state.is_cfunction(index)
    }

    fn extract(state: &State, index: i32) -> LuaResult<Self> {
        // SAFETY: state.raw() is valid
        unsafe { ffi::lua_tocfunction(state.raw(), index) }
            .ok_or_else(|| LuaError::bad_conversion(Self::EXPECTED, state.type_name(index)))
    }
}

impl<T: Push> Push for Option<T> {
    fn push_to(&self, state: &State) -> LuaResult<()> {
        match self {
            Some(value) => value.push_to(state),
            None => Nil.push_to(state),
        }
    }
}

/// Absent and nil slots read as `None`.
impl<T: FromStack> FromStack for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn matches(state: &State, index: i32) -> bool {
        state.is_none_or_nil(index) || T::matches(state, index)
    }

    fn extract(state: &State, index: i32) -> LuaResult<Self> {
        if state.is_none_or_nil(index) {
            return Ok(None);
        }
        T::extract(state, index).map(Some)
    }
}

impl<T: Push + ?Sized> Push for &T {
    fn push_to(&self, state: &State) -> LuaResult<()> {
        (**self).push_to(state)
    }
}

// ---------------------------------------------------------------------------
// Sequences
// ---------------------------------------------------------------------------

impl<T: Push> Push for [T] {
    fn push_to(&self, state: &State) -> LuaResult<()> {
        state.check_stack(3)?;
        push_or_restore(state, || {
            state.create_table(size_hint(self.len()), 0);
            for (position, item) in self.iter().enumerate() {
                (position + 1).push_to(state)?;
                item.push_to(state)?;
                state.raw_set(-3);
            }
            Ok(())
        })
    }
}

impl<T: Push, const N: usize> Push for [T; N] {
    fn push_to(&self, state: &State) -> LuaResult<()> {
        self.as_slice().push_to(state)
    }
}

impl<T: Push> Push for Vec<T> {
    fn push_to(&self, state: &State) -> LuaResult<()> {
        self.as_slice().push_to(state)
    }
}

/// Elements are ordered by their numeric keys; any other key is an error.
impl<T: FromStack> FromStack for Vec<T> {
    const EXPECTED: &'static str = "table";

    fn matches(state: &State, index: i32) -> bool {
        state.is_table(index)
    }

    fn extract(state: &State, index: i32) -> LuaResult<Self> {
        state.check_stack(2)?;
        let _restore = stack_guard(state);

        let mut entries: Vec<(f64, T)> = Vec::with_capacity(state.obj_len(index));
        state.push_nil();
        while state.next(index) {
            if state.type_of(-2) != LuaType::Number {
                return Err(LuaError::bad_conversion(
                    "sequence table",
                    format!("table with a {} key", state.type_name(-2)),
                ));
            }
            // SAFETY: the key slot is a number, so reading it converts nothing
            let position = unsafe { ffi::lua_tonumber(state.raw(), -2) };
            entries.push((position, T::read(state, -1)?));
            state.pop(1);
        }

        entries.sort_by(|a, b| a.0.total_cmp(&b.0));
        Ok(entries.into_iter().map(|(_, item)| item).collect())
    }
}

// ---------------------------------------------------------------------------
// Maps
// ---------------------------------------------------------------------------

fn push_pairs<'a, K, V, I>(state: &State, len: usize, pairs: I) -> LuaResult<()>
where
    K: Push + 'a,
    V: Push + 'a,
    I: Iterator<Item = (&'a K, &'a V)>,
{
    state.check_stack(3)?;
    push_or_restore(state, || {
        state.create_table(0, size_hint(len));
        for (key, value) in pairs {
            key.push_to(state)?;
            check_key(state)?;
            value.push_to(state)?;
            state.raw_set(-3);
        }
        Ok(())
    })
}

fn read_pairs<K, V, F>(state: &State, index: i32, mut insert: F) -> LuaResult<()>
where
    K: FromStack,
    V: FromStack,
    F: FnMut(K, V),
{
    state.check_stack(3)?;
    let _restore = stack_guard(state);

    state.push_nil();
    while state.next(index) {
        // Convert a copy so the traversal key is never rewritten
        state.push_value(-2);
        let key = K::read(state, -1)?;
        state.pop(1);
        let value = V::read(state, -1)?;
        state.pop(1);
        insert(key, value);
    }
    Ok(())
}

impl<K: Push, V: Push> Push for BTreeMap<K, V> {
    fn push_to(&self, state: &State) -> LuaResult<()> {
        push_pairs(state, self.len(), self.iter())
    }
}

impl<K: FromStack + Ord, V: FromStack> FromStack for BTreeMap<K, V> {
    const EXPECTED: &'static str = "table";

    fn matches(state: &State, index: i32) -> bool {
        state.is_table(index)
    }

    fn extract(state: &State, index: i32) -> LuaResult<Self> {
        let mut map = BTreeMap::new();
        read_pairs(state, index, |key, value| {
            map.insert(key, value);
        })?;
        Ok(map)
    }
}

impl<K: Push, V: Push, S> Push for HashMap<K, V, S> {
    fn push_to(&self, state: &State) -> LuaResult<()> {
        push_pairs(state, self.len(), self.iter())
    }
}

impl<K, V, S> FromStack for HashMap<K, V, S>
where
    K: FromStack + Eq + Hash,
    V: FromStack,
    S: BuildHasher + Default,
{
    const EXPECTED: &'static str = "table";

    fn matches(state: &State, index: i32) -> bool {
        state.is_table(index)
    }

    fn extract(state: &State, index: i32) -> LuaResult<Self> {
        let mut map = HashMap::with_capacity_and_hasher(0, S::default());
        read_pairs(state, index, |key, value| {
            map.insert(key, value);
        })?;
        Ok(map)
    }
}

impl<K: Push, V: Push> Push for Pair<K, V> {
    fn push_to(&self, state: &State) -> LuaResult<()> {
        push_pairs(state, 1, std::iter::once((&self.0, &self.1)))
    }
}

impl<K: FromStack, V: FromStack> FromStack for Pair<K, V> {
    const EXPECTED: &'static str = "table";

    fn matches(state: &State, index: i32) -> bool {
        state.is_table(index)
    }

    fn extract(state: &State, index: i32) -> LuaResult<Self> {
        let mut pairs = Vec::with_capacity(1);
        read_pairs(state, index, |key, value| pairs.push(Pair(key, value)))?;
        let count = pairs.len();
        match pairs.pop() {
            Some(pair) if count == 1 => Ok(pair),
            _ => Err(LuaError::bad_conversion(
                "table with one pair",
                format!("table with {} pairs", count),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Arrays become sequences, objects become string-keyed tables and null
/// becomes nil.
impl Push for JsonValue {
    fn push_to(&self, state: &State) -> LuaResult<()> {
        push_json(state, self, 0)
    }
}

fn push_json(state: &State, value: &JsonValue, depth: usize) -> LuaResult<()> {
    if depth >= MAX_JSON_DEPTH {
        return Err(LuaError::bad_conversion(
            "JSON value nested at most 128 levels deep",
            "deeper nesting",
        ));
    }
    match value {
        JsonValue::Null => Nil.push_to(state),
        JsonValue::Bool(b) => b.push_to(state),
        JsonValue::Number(n) => match n.as_f64() {
            Some(n) => n.push_to(state),
            None => Err(LuaError::bad_conversion("number", n.to_string())),
        },
        JsonValue::String(s) => s.push_to(state),
        JsonValue::Array(items) => {
            state.check_stack(3)?;
            push_or_restore(state, || {
                state.create_table(size_hint(items.len()), 0);
                for (position, item) in items.iter().enumerate() {
                    (position + 1).push_to(state)?;
                    push_json(state, item, depth + 1)?;
                    state.raw_set(-3);
                }
                Ok(())
            })
        }
        JsonValue::Object(fields) => {
            state.check_stack(3)?;
            push_or_restore(state, || {
                state.create_table(0, size_hint(fields.len()));
                for (name, item) in fields {
                    name.push_to(state)?;
                    push_json(state, item, depth + 1)?;
                    state.raw_set(-3);
                }
                Ok(())
            })
        }
    }
}

/// A table reads as an array when its keys are exactly `1..=n` for some
/// `n > 0`, and as an object otherwise. Number keys of an object are
/// rendered the way the runtime formats numbers.
impl FromStack for JsonValue {
    const EXPECTED: &'static str = "JSON-compatible value";

    fn matches(state: &State, index: i32) -> bool {
        matches!(
            state.type_of(index),
            LuaType::None
                | LuaType::Nil
                | LuaType::Boolean
                | LuaType::Number
                | LuaType::String
                | LuaType::Table
        )
    }

    fn extract(state: &State, index: i32) -> LuaResult<Self> {
        json_from_slot(state, index, 0)
    }
}

enum TableKey {
    Index(i64),
    Name(String),
}

fn json_from_slot(state: &State, index: i32, depth: usize) -> LuaResult<JsonValue> {
    match state.type_of(index) {
        LuaType::None | LuaType::Nil => Ok(JsonValue::Null),
        LuaType::Boolean => bool::extract(state, index).map(JsonValue::Bool),
        // SAFETY: the slot is a number
        LuaType::Number => json_number(unsafe { ffi::lua_tonumber(state.raw(), index) }),
        LuaType::String => String::extract(state, index).map(JsonValue::String),
        LuaType::Table => json_from_table(state, index, depth),
        other => Err(LuaError::bad_conversion(JsonValue::EXPECTED, other.name())),
    }
}

fn json_number(n: f64) -> LuaResult<JsonValue> {
    if n.fract() == 0.0 && n.abs() < MAX_SAFE_INTEGER {
        return Ok(JsonValue::from(n as i64));
    }
    Number::from_f64(n)
        .map(JsonValue::Number)
        .ok_or_else(|| LuaError::bad_conversion("finite number", n.to_string()))
}

fn json_from_table(state: &State, index: i32, depth: usize) -> LuaResult<JsonValue> {
    if depth >= MAX_JSON_DEPTH {
        return Err(LuaError::bad_conversion(
            "table nested at most 128 levels deep",
            "deeper or cyclic table",
        ));
    }
    state.check_stack(3)?;
    let _restore = stack_guard(state);

    let mut entries = Vec::new();
    state.push_nil();
    while state.next(index) {
        let key = table_key(state)?;
        let value = json_from_slot(state, state.abs_index(-1), depth + 1)?;
        entries.push((key, value));
        state.pop(1);
    }
    Ok(assemble_json(entries))
}

/// Classify the traversal key at -2 without disturbing it
fn table_key(state: &State) -> LuaResult<TableKey> {
    match state.type_of(-2) {
        LuaType::Number => {
            // SAFETY: the slot is a number
            let n = unsafe { ffi::lua_tonumber(state.raw(), -2) };
            if n.fract() == 0.0 && n >= 1.0 && n < MAX_SAFE_INTEGER {
                return Ok(TableKey::Index(n as i64));
            }
            state.push_value(-2);
            let name = String::extract(state, state.top());
            state.pop(1);
            name.map(TableKey::Name)
        }
        LuaType::String => String::extract(state, state.abs_index(-2)).map(TableKey::Name),
        other => Err(LuaError::bad_conversion("string or number key", other.name())),
    }
}

fn assemble_json(mut entries: Vec<(TableKey, JsonValue)>) -> JsonValue {
    let mut indices: Vec<i64> = entries
        .iter()
        .filter_map(|(key, _)| match key {
            TableKey::Index(i) => Some(*i),
            TableKey::Name(_) => None,
        })
        .collect();

    if !entries.is_empty() && indices.len() == entries.len() {
        indices.sort_unstable();
        let dense = indices
            .iter()
            .enumerate()
            .all(|(position, &i)| i == position as i64 + 1);
        if dense {
            entries.sort_by_key(|(key, _)| match key {
                TableKey::Index(i) => *i,
                TableKey::Name(_) => 0,
            });
            return JsonValue::Array(entries.into_iter().map(|(_, value)| value).collect());
        }
    }

    let mut object = Map::new();
    for (key, value) in entries {
        let name = match key {
            TableKey::Index(i) => i.to_string(),
            TableKey::Name(name) => name,
        };
        object.insert(name, value);
    }
    JsonValue::Object(object)
}

// ---------------------------------------------------------------------------
// Call arguments
// ---------------------------------------------------------------------------

impl PushArgs for () {
    fn push_args(&self, _state: &State) -> LuaResult<i32> {
        Ok(0)
    }
}

impl<T: Push> PushArgs for T {
    fn push_args(&self, state: &State) -> LuaResult<i32> {
        self.push_to(state)?;
        Ok(1)
    }
}

macro_rules! impl_push_args_tuple {
    ($count:expr; $($name:ident : $idx:tt),+) => {
        impl<$($name: Push),+> PushArgs for ($($name,)+) {
            fn push_args(&self, state: &State) -> LuaResult<i32> {
                state.check_stack($count)?;
                push_or_restore(state, || {
                    $( self.$idx.push_to(state)?; )+
                    Ok(())
                })?;
                Ok($count)
            }
        }
    };
}

impl_push_args_tuple!(1; A: 0);
impl_push_args_tuple!(2; A: 0, B: 1);
impl_push_args_tuple!(3; A: 0, B: 1, C: 2);
impl_push_args_tuple!(4; A: 0, B: 1, C: 2, D: 3);
impl_push_args_tuple!(5; A: 0, B: 1, C: 2, D: 3, E: 4);
impl_push_args_tuple!(6; A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);
