//! Integration tests for native class binding

use lunax_runtime::prelude::*;
use std::cell::Cell;
use std::rc::Rc;

struct Counter {
    count: i64,
}

impl Counter {
    fn increment(&mut self, _state: &State) -> LuaResult<i32> {
        self.count += 1;
        Ok(0)
    }

    fn add(&mut self, state: &State) -> LuaResult<i32> {
        self.count += state.check_integer(2)?;
        Ok(0)
    }

    fn get(&mut self, state: &State) -> LuaResult<i32> {
        state.push(&self.count)?;
        Ok(1)
    }

    /// Runs the callback at argument 2 while this instance is borrowed
    fn visit(&mut self, state: &State) -> LuaResult<i32> {
        state.push_value(2);
        state.pcall(0, 0)?;
        Ok(0)
    }
}

fn counter_class() -> ClassDescriptor<Counter> {
    ClassDescriptor::new("Counter", |state: &State| {
        Ok(Counter {
            count: state.opt_arg(1, 0i64)?,
        })
    })
    .method("increment", Counter::increment)
    .method("add", Counter::add)
    .method("get", Counter::get)
    .method("visit", Counter::visit)
}

fn runtime_with_counter() -> Runtime {
    let runtime = Runtime::new().unwrap();
    assert!(runtime.register(counter_class()).unwrap());
    runtime
}

struct Foo;
struct Bar;

fn foo_bar_runtime() -> Runtime {
    let runtime = Runtime::new().unwrap();
    runtime
        .register(ClassDescriptor::new("Foo", |_| Ok(Foo)).method("name", |_, state| {
            state.push("foo")?;
            Ok(1)
        }))
        .unwrap();
    runtime
        .register(ClassDescriptor::new("Bar", |_| Ok(Bar)).method("name", |_, state| {
            state.push("bar")?;
            Ok(1)
        }))
        .unwrap();
    runtime
}

/// Bumps a shared counter when dropped
struct Tracked {
    drops: Rc<Cell<u32>>,
}

impl Drop for Tracked {
    fn drop(&mut self) {
        self.drops.set(self.drops.get() + 1);
    }
}

fn tracked_class(drops: &Rc<Cell<u32>>) -> ClassDescriptor<Tracked> {
    let drops = drops.clone();
    ClassDescriptor::new("Tracked", move |_| {
        Ok(Tracked {
            drops: drops.clone(),
        })
    })
    .method("touch", |_, _| Ok(0))
}

#[test]
fn test_counter_scenario() {
    let runtime = runtime_with_counter();
    let count: i64 = runtime
        .eval("local c = Counter() c:increment() c:increment() return c:get()")
        .unwrap();
    assert_eq!(count, 2);
}

#[test]
fn test_constructor_receives_arguments() {
    let runtime = runtime_with_counter();
    let count: i64 = runtime
        .eval("local c = Counter(40) c:add(2) return c:get()")
        .unwrap();
    assert_eq!(count, 42);
}

#[test]
fn test_each_handle_owns_its_instance() {
    let runtime = runtime_with_counter();
    let counts: Vec<i64> = runtime
        .eval(
            r#"
            local a, b = Counter(), Counter(10)
            a:increment()
            b:increment()
            b:increment()
            return { a:get(), b:get() }
            "#,
        )
        .unwrap();
    assert_eq!(counts, [1, 12]);
}

#[test]
fn test_methods_dispatch_to_their_own_entry() {
    struct Pair;
    let runtime = Runtime::new().unwrap();
    runtime
        .register(
            ClassDescriptor::new("Pair", |_| Ok(Pair))
                .method("first", |_, state| {
                    state.push("first")?;
                    Ok(1)
                })
                .method("second", |_, state| {
                    state.push("second")?;
                    state.push(&2)?;
                    Ok(2)
                }),
        )
        .unwrap();

    let names: Vec<String> = runtime
        .eval("local p = Pair() local s, n = p:second() return { p:first(), s, tostring(n) }")
        .unwrap();
    assert_eq!(names, ["first", "second", "2"]);
}

#[test]
fn test_handle_layout() {
    let runtime = runtime_with_counter();
    let layout: Vec<String> = runtime
        .eval(
            r#"
            local c = Counter()
            return {
                type(c),
                type(c[0]),
                type(c.increment),
                tostring(getmetatable(c)),
                tostring(getmetatable(c[0])),
            }
            "#,
        )
        .unwrap();
    assert_eq!(layout, ["table", "userdata", "function", "Counter", "Counter"]);
}

#[test]
fn test_wrong_handle_type_is_bad_conversion() {
    let runtime = foo_bar_runtime();
    let err = runtime
        .exec_str("local f, b = Foo(), Bar() f.name(b)")
        .unwrap_err();
    assert_eq!(err, LuaError::bad_conversion("Foo", "Bar"));
}

#[test]
fn test_non_handle_receivers_are_bad_conversion() {
    let runtime = foo_bar_runtime();

    let err = runtime.exec_str("Foo().name(5)").unwrap_err();
    assert_eq!(err, LuaError::bad_conversion("Foo instance", "number"));

    let err = runtime.exec_str("Foo().name({})").unwrap_err();
    assert_eq!(err, LuaError::bad_conversion("Foo", "nil"));

    let err = runtime
        .exec_str("local f = Foo() f[0] = newproxy(true) f:name()")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadConversion);
}

#[test]
fn test_script_can_catch_bad_conversion() {
    let runtime = foo_bar_runtime();
    let message: String = runtime
        .eval("local ok, err = pcall(function() return Foo().name(Bar()) end) return err")
        .unwrap();
    assert_eq!(message, "Bad conversion: expected Foo, got Bar");

    // The caught failure does not leak into later calls
    let err = runtime.exec_str("error('plain', 0)").unwrap_err();
    assert_eq!(err, LuaError::Runtime("plain".to_string()));
}

#[test]
fn test_constructor_errors_surface_with_kind() {
    let runtime = runtime_with_counter();
    let err = runtime.exec_str("Counter('many')").unwrap_err();
    assert_eq!(
        err,
        LuaError::BadConversion("bad argument #1 (expected number, got string)".to_string())
    );
}

#[test]
fn test_reentrant_dispatch_is_rejected() {
    let runtime = runtime_with_counter();
    let err = runtime
        .exec_str("local c = Counter() c:visit(function() c:increment() end)")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadConversion);
    assert!(err.message().contains("already in use"));

    // Other instances stay usable from inside the callback
    let count: i64 = runtime
        .eval(
            r#"
            local a, b = Counter(), Counter()
            a:visit(function() b:increment() end)
            return b:get()
            "#,
        )
        .unwrap();
    assert_eq!(count, 1);
}

#[test]
fn test_panicking_method_is_generic_error() {
    struct Fragile;
    let runtime = Runtime::new().unwrap();
    runtime
        .register(ClassDescriptor::new("Fragile", |_| Ok(Fragile)).method("snap", |_, _| {
            panic!("snapped");
        }))
        .unwrap();

    let err = runtime.exec_str("Fragile():snap()").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Generic);
    assert!(err.message().contains("snapped"));

    // The runtime is still usable afterwards
    assert_eq!(runtime.eval::<i32>("return 1 + 1").unwrap(), 2);
}

#[test]
fn test_finalizer_runs_once_on_collection() {
    let drops = Rc::new(Cell::new(0));
    let runtime = Runtime::new().unwrap();
    runtime.register(tracked_class(&drops)).unwrap();

    runtime
        .exec_str("do local t = Tracked() t:touch() end")
        .unwrap();
    runtime.collect_garbage();
    assert_eq!(drops.get(), 1);

    runtime.collect_garbage();
    assert_eq!(drops.get(), 1);
}

#[test]
fn test_finalizer_runs_once_at_teardown() {
    let drops = Rc::new(Cell::new(0));
    {
        let runtime = Runtime::new().unwrap();
        runtime.register(tracked_class(&drops)).unwrap();
        runtime
            .exec_str("keep = { Tracked(), Tracked() } do local t = Tracked() end")
            .unwrap();
        runtime.collect_garbage();
        assert_eq!(drops.get(), 1);
    }
    assert_eq!(drops.get(), 3);
}

#[test]
fn test_finalizer_ignores_foreign_values() {
    let drops = Rc::new(Cell::new(0));
    let runtime = Runtime::new().unwrap();
    runtime.register(tracked_class(&drops)).unwrap();

    let result = runtime.exec_str(
        r#"
        local t = Tracked()
        local mt = getmetatable(t[0])
        assert(type(mt) == "string")
        assert(debug.getmetatable(t[0]).__gc ~= nil)
        debug.getmetatable(t[0]).__gc(newproxy(true))
        debug.getmetatable(t[0]).__gc({})
        t:touch()
        "#,
    );
    assert!(result.is_ok(), "{:?}", result);
    assert_eq!(drops.get(), 0);
}

#[test]
fn test_explicit_finalize_then_dispatch_is_bad_conversion() {
    let drops = Rc::new(Cell::new(0));
    let runtime = Runtime::new().unwrap();
    runtime.register(tracked_class(&drops)).unwrap();

    let err = runtime
        .exec_str(
            r#"
            local t = Tracked()
            debug.getmetatable(t[0]).__gc(t[0])
            t:touch()
            "#,
        )
        .unwrap_err();
    assert_eq!(drops.get(), 1);
    assert_eq!(err.kind(), ErrorKind::BadConversion);
    assert!(err.message().contains("already been finalized"));

    drop(runtime);
    assert_eq!(drops.get(), 1);
}

#[test]
fn test_raising_table_access_keeps_instance_usable() {
    let drops = Rc::new(Cell::new(0));
    {
        let runtime = Runtime::new().unwrap();
        let class = tracked_class(&drops).method("lookup", |_, state| {
            state.get_field(2, "x")?;
            Ok(1)
        });
        runtime.register(class).unwrap();
        runtime
            .exec_str(
                r#"
                t = Tracked()
                guarded = setmetatable({}, { __index = function() error('boom', 0) end })
                "#,
            )
            .unwrap();

        let err = runtime.exec_str("t:lookup(guarded)").unwrap_err();
        assert_eq!(err, LuaError::Runtime("boom".to_string()));

        let found: i32 = runtime
            .eval(
                r#"
                local ok = pcall(t.lookup, t, guarded)
                assert(not ok)
                t:touch()
                return t:lookup({ x = 5 })
                "#,
            )
            .unwrap();
        assert_eq!(found, 5);

        runtime.exec_str("t = nil").unwrap();
        runtime.collect_garbage();
        assert_eq!(drops.get(), 1);
    }
    assert_eq!(drops.get(), 1);
}

#[test]
fn test_strict_globals_fail_class_registration() {
    let runtime = Runtime::new().unwrap();
    runtime
        .exec_str(
            r#"
            setmetatable(_G, {
                __index = function(_, k) error('undeclared ' .. k, 0) end,
                __newindex = function(_, k) error('cannot declare ' .. k, 0) end,
            })
            "#,
        )
        .unwrap();

    let err = runtime.register(counter_class()).unwrap_err();
    assert_eq!(err, LuaError::Runtime("cannot declare Counter".to_string()));
    assert!(runtime.state().is_empty());

    runtime.exec_str("rawset(_G, 'Counter', false)").unwrap();
    assert!(runtime.register(counter_class()).unwrap());
    let count: i64 = runtime
        .eval("local c = Counter(1) c:increment() return c:get()")
        .unwrap();
    assert_eq!(count, 2);
}

#[test]
fn test_conflicting_registration_is_rejected() {
    let runtime = foo_bar_runtime();
    let err = runtime
        .register(ClassDescriptor::new("Foo", |_| Ok(Bar)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Registration);

    // The original binding is untouched
    let name: String = runtime.eval("return Foo():name()").unwrap();
    assert_eq!(name, "foo");
}

#[test]
fn test_foreign_metatable_is_rejected() {
    let runtime = Runtime::new().unwrap();
    runtime.state().new_metatable("Taken").unwrap();
    runtime.state().pop(1);

    let err = runtime
        .register(ClassDescriptor::new("Taken", |_| Ok(Foo)))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Registration);
    assert!(!runtime.is_registered("Taken"));
}

#[test]
fn test_lenient_registration_skips_conflicts() {
    let config = RuntimeConfig::new().strict_registration(false);
    let runtime = Runtime::with_config(config).unwrap();
    assert!(runtime.register(ClassDescriptor::new("Foo", |_| Ok(Foo))).unwrap());
    assert!(!runtime.register(ClassDescriptor::new("Foo", |_| Ok(Bar))).unwrap());
    assert_eq!(runtime.registered_classes(), ["Foo"]);
}

#[test]
fn test_reregistration_keeps_old_instances_working() {
    let runtime = runtime_with_counter();
    runtime.exec_str("old = Counter(5)").unwrap();

    let replacement = ClassDescriptor::new("Counter", |_| Ok(Counter { count: 100 }))
        .method("get", Counter::get);
    assert!(runtime.register(replacement).unwrap());

    let counts: Vec<i64> = runtime
        .eval("old:increment() return { old:get(), Counter():get() }")
        .unwrap();
    assert_eq!(counts, [6, 100]);
    assert_eq!(runtime.registered_classes(), ["Counter"]);
}

#[test]
fn test_invalid_descriptors_are_rejected() {
    let runtime = Runtime::new().unwrap();
    let err = runtime
        .register(
            ClassDescriptor::new("Dup", |_| Ok(Foo))
                .method("go", |_, _| Ok(0))
                .method("go", |_, _| Ok(0)),
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Registration);
    assert!(!runtime.is_registered("Dup"));
}

struct Point {
    x: f64,
    y: f64,
}

impl Point {
    fn coords(&mut self, state: &State) -> LuaResult<i32> {
        state.push(&vec![self.x, self.y])?;
        Ok(1)
    }

    fn scale(&mut self, state: &State) -> LuaResult<i32> {
        let factor = state.check_number(2)?;
        self.x *= factor;
        self.y *= factor;
        Ok(0)
    }
}

impl NativeClass for Point {
    const NAME: &'static str = "Point";

    fn construct(state: &State) -> LuaResult<Self> {
        Ok(Point {
            x: state.check_number(1)?,
            y: state.check_number(2)?,
        })
    }

    fn methods() -> Vec<Method<Self>> {
        vec![
            Method::new("coords", Point::coords),
            Method::new("scale", Point::scale),
        ]
    }
}

#[test]
fn test_native_class_registration() {
    let runtime = Runtime::new().unwrap();
    assert!(runtime.register_class::<Point>().unwrap());
    assert!(runtime.is_registered("Point"));

    let coords: Vec<f64> = runtime
        .eval("local p = Point(1, 2) p:scale(3) return p:coords()")
        .unwrap();
    assert_eq!(coords, [3.0, 6.0]);
}
