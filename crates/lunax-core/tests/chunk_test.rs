//! Chunk loading and error classification through the public API

use lunax_core::{ErrorKind, LuaError, State};
use std::fs;
use tempfile::TempDir;

fn state() -> State {
    let state = State::new().unwrap();
    state.open_libs();
    state
}

#[test]
fn test_exec_file_runs_chunk() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("init.lua");
    fs::write(&path, "loaded = true\nanswer = 6 * 7\n").unwrap();

    let state = state();
    state.exec_file(&path).unwrap();
    assert!(state.eval::<bool>("return loaded").unwrap());
    assert_eq!(state.eval::<i32>("return answer").unwrap(), 42);
}

#[test]
fn test_missing_file_is_file_access() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.lua");

    let err = state().exec_file(&path).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::FileAccess);
    assert!(err.message().contains("missing.lua"));
}

#[test]
fn test_syntax_error_in_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("broken.lua");
    fs::write(&path, "function (\n").unwrap();

    let err = state().exec_file(&path).unwrap_err();
    assert!(matches!(err, LuaError::Syntax(_)));
    assert!(err.message().contains("broken.lua"));
}

#[test]
fn test_runtime_error_carries_message() {
    let state = state();
    let err = state.exec_str("local t = nil; return t.field").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Runtime);
    assert!(err.message().contains("attempt to index"));
    assert!(state.is_empty());
}

#[test]
fn test_load_without_running() {
    let state = state();
    state.load_str("counter = (counter or 0) + 1").unwrap();
    assert!(state.is_function(-1));
    state.push_value(-1);
    state.pcall(0, 0).unwrap();
    state.pcall(0, 0).unwrap();
    assert_eq!(state.eval::<i32>("return counter").unwrap(), 2);
}

#[test]
fn test_chunk_name_appears_in_errors() {
    let state = state();
    let err = state.exec_buffer(b"error('bad')", "=config").unwrap_err();
    assert!(err.message().starts_with("config:1:"));
}

#[test]
fn test_script_can_catch_errors() {
    let state = state();
    let caught: String = state
        .eval("local ok, msg = pcall(error, 'inner') return tostring(ok) .. ':' .. msg")
        .unwrap();
    assert_eq!(caught, "false:inner");
}
