//! Integration tests for the Runtime API

use lunax_runtime::prelude::*;
use serde_json::{Value, json};
use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;
use tempfile::NamedTempFile;

fn sum(state: &State) -> LuaResult<i32> {
    let mut total = 0.0;
    for position in 1..=state.top() {
        total += state.check_number(position)?;
    }
    state.push(&total)?;
    Ok(1)
}

fn upper(state: &State) -> LuaResult<i32> {
    let text = state.check_string(1)?;
    state.push(&text.to_uppercase())?;
    Ok(1)
}

/// Globals must be declared with rawset before use
const STRICT_GLOBALS: &str = r#"
setmetatable(_G, {
    __index = function(_, k) error('undeclared ' .. k, 0) end,
    __newindex = function(_, k) error('cannot declare ' .. k, 0) end,
})
"#;

#[test]
fn test_eval_basic() {
    let runtime = Runtime::new().unwrap();
    assert_eq!(runtime.eval::<f64>("return 1 + 1").unwrap(), 2.0);
    assert_eq!(runtime.eval::<String>("return 'a' .. 'b'").unwrap(), "ab");
    assert_eq!(runtime.eval::<Option<i32>>("return nil").unwrap(), None);
}

#[test]
fn test_register_function() {
    let runtime = Runtime::new().unwrap();
    runtime.register_function("sum", sum).unwrap();
    assert_eq!(runtime.eval::<f64>("return sum(1, 2, 3.5)").unwrap(), 6.5);
}

#[test]
fn test_closures_capture_host_state() {
    let log = Rc::new(RefCell::new(Vec::new()));
    let runtime = Runtime::new().unwrap();

    let sink = log.clone();
    runtime
        .register_function("record", move |state: &State| {
            sink.borrow_mut().push(state.check_string(1)?);
            Ok(0)
        })
        .unwrap();

    runtime
        .exec_str("for _, word in ipairs({'a', 'b', 'c'}) do record(word) end")
        .unwrap();
    assert_eq!(*log.borrow(), ["a", "b", "c"]);
}

#[test]
fn test_function_errors_keep_their_kind() {
    let runtime = Runtime::new().unwrap();
    runtime.register_function("sum", sum).unwrap();

    let err = runtime.exec_str("sum(1, {})").unwrap_err();
    assert_eq!(
        err,
        LuaError::BadConversion("bad argument #2 (expected number, got table)".to_string())
    );

    // Propagating through a script-level rethrow keeps the kind
    let err = runtime
        .exec_str("local ok, err = pcall(sum, 'x') error(err, 0)")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadConversion);
}

#[test]
fn test_panicking_function_is_generic_error() {
    let runtime = Runtime::new().unwrap();
    runtime
        .register_function("explode", |_state: &State| -> LuaResult<i32> {
            panic!("kaboom");
        })
        .unwrap();

    let err = runtime.exec_str("explode()").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Generic);
    assert!(err.message().contains("kaboom"));
}

#[test]
fn test_register_library() {
    let runtime = Runtime::new().unwrap();
    runtime
        .register_library("text", &[("upper", upper), ("sum", sum)])
        .unwrap();

    let result: String = runtime
        .eval("return text.upper('lua') .. text.sum(1, 2)")
        .unwrap();
    assert_eq!(result, "LUA3");
}

#[test]
fn test_register_library_extends_existing_table() {
    let runtime = Runtime::new().unwrap();
    runtime.register_library("string", &[("shout", upper)]).unwrap();
    let result: String = runtime
        .eval("return string.shout(string.rep('a', 2))")
        .unwrap();
    assert_eq!(result, "AA");
}

#[test]
fn test_call_with_arguments() {
    let runtime = Runtime::new().unwrap();
    runtime
        .exec_str("function describe(name, count, flag) return name .. ':' .. count .. ':' .. tostring(flag) end")
        .unwrap();

    let described: String = runtime.call("describe", ("apples", 3, true)).unwrap();
    assert_eq!(described, "apples:3:true");

    runtime.exec_str("function answer() return 42 end").unwrap();
    assert_eq!(runtime.call::<_, i32>("answer", ()).unwrap(), 42);
}

#[test]
fn test_call_missing_function_is_bad_conversion() {
    let runtime = Runtime::new().unwrap();
    let err = runtime.call::<_, i32>("nowhere", 1).unwrap_err();
    assert_eq!(err, LuaError::bad_conversion("function `nowhere`", "nil"));
    assert!(runtime.state().is_empty());
}

#[test]
fn test_strict_globals_fail_host_calls_with_runtime_errors() {
    let runtime = Runtime::new().unwrap();
    runtime.exec_str("function answer() return 42 end").unwrap();
    runtime.exec_str(STRICT_GLOBALS).unwrap();

    let err = runtime.call::<_, i32>("missing", ()).unwrap_err();
    assert_eq!(err, LuaError::Runtime("undeclared missing".to_string()));
    assert!(runtime.state().is_empty());
    assert_eq!(runtime.call::<_, i32>("answer", ()).unwrap(), 42);
}

#[test]
fn test_strict_globals_fail_function_registration() {
    let runtime = Runtime::new().unwrap();
    runtime.exec_str(STRICT_GLOBALS).unwrap();

    let err = runtime.register_function("sum", sum).unwrap_err();
    assert_eq!(err, LuaError::Runtime("cannot declare sum".to_string()));
    let err = runtime.register_library("text", &[("upper", upper)]).unwrap_err();
    assert_eq!(err, LuaError::Runtime("undeclared text".to_string()));
    assert!(runtime.state().is_empty());

    runtime.exec_str("rawset(_G, 'sum', false) rawset(_G, 'text', {})").unwrap();
    runtime.register_function("sum", sum).unwrap();
    runtime.register_library("text", &[("upper", upper)]).unwrap();
    let result: String = runtime.eval("return text.upper('a') .. sum(1, 2)").unwrap();
    assert_eq!(result, "A3");
}

#[test]
fn test_native_function_sees_raising_metamethod_as_error() {
    let runtime = Runtime::new().unwrap();
    runtime
        .register_function("field_or", |state: &State| {
            let fallback = state.check_string(3)?;
            let key = state.check_string(2)?;
            if state.get_field(1, &key).is_err() {
                state.push(fallback.as_str())?;
            }
            Ok(1)
        })
        .unwrap();

    let result: String = runtime
        .eval(
            r#"
            local guarded = setmetatable({}, { __index = function() error('boom', 0) end })
            return field_or(guarded, 'x', 'fallback')
            "#,
        )
        .unwrap();
    assert_eq!(result, "fallback");
}

#[test]
fn test_error_kind_mapping() {
    let runtime = Runtime::new().unwrap();

    let err = runtime.exec_str("x = = 1").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Syntax);
    assert!(err.message().contains("unexpected symbol"));

    let err = runtime.exec_file("/definitely/not/here.lua").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileAccess);

    let err = runtime.exec_str("error('raised')").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert!(err.message().ends_with("raised"));
}

#[test]
fn test_exec_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "loaded = (loaded or 0) + 1").unwrap();

    let runtime = Runtime::new().unwrap();
    runtime.exec_file(file.path()).unwrap();
    runtime.exec_file(file.path()).unwrap();
    assert_eq!(runtime.eval::<i32>("return loaded").unwrap(), 2);
}

#[test]
fn test_exec_buffer_names_the_chunk() {
    let runtime = Runtime::new().unwrap();
    runtime.exec_buffer(b"value = 7", "=settings").unwrap();
    assert_eq!(runtime.eval::<i32>("return value").unwrap(), 7);

    let err = runtime.exec_buffer(b"error('bad')", "=settings").unwrap_err();
    assert!(err.message().starts_with("settings:1:"));
}

#[test]
fn test_exec_bytes() {
    let runtime = Runtime::new().unwrap();
    runtime
        .exec_bytes("answer = 6 * 7".bytes())
        .unwrap();
    assert_eq!(runtime.eval::<i32>("return answer").unwrap(), 42);
}

#[test]
fn test_json_values_cross_the_boundary() {
    let runtime = Runtime::new().unwrap();
    runtime
        .register_function("roundtrip", |state: &State| {
            let value: Value = state.check_arg(1)?;
            state.push(&value)?;
            Ok(1)
        })
        .unwrap();

    let value: Value = runtime
        .eval("return roundtrip({ name = 'lunax', tags = { 'a', 'b' }, nested = { ok = true } })")
        .unwrap();
    assert_eq!(
        value,
        json!({ "name": "lunax", "tags": ["a", "b"], "nested": { "ok": true } })
    );
}

#[test]
fn test_config_file() {
    let mut file = NamedTempFile::new().unwrap();
    writeln!(file, "open_libs = true").unwrap();
    writeln!(file, "package_path = [\"lib/?.lua\"]").unwrap();
    writeln!(file, "gc_pause = 150").unwrap();

    let runtime = Runtime::from_config_file(file.path()).unwrap();
    assert_eq!(runtime.config().gc_pause, Some(150));
    let path: String = runtime.eval("return package.path").unwrap();
    assert!(path.starts_with("lib/?.lua;"));
}

#[test]
fn test_missing_config_file() {
    let err = Runtime::from_config_file("/definitely/not/lunax.toml").unwrap_err();
    assert!(matches!(err, RuntimeError::ConfigIo { .. }));
    assert_eq!(err.kind(), ErrorKind::FileAccess);
}

#[test]
fn test_memory_is_reported() {
    let runtime = Runtime::new().unwrap();
    let before = runtime.memory_bytes();
    runtime
        .exec_str("big = {} for i = 1, 10000 do big[i] = i end")
        .unwrap();
    assert!(runtime.memory_bytes() > before);

    runtime.exec_str("big = nil").unwrap();
    runtime.collect_garbage();
    assert!(runtime.memory_bytes() > 0);
}
