//! Marshaling between Rust values and script-visible data

use lunax_core::{FromStack, LuaType, NewTable, Nil, Push, State};
use serde_json::{Value, json};
use std::collections::{BTreeMap, HashMap};

fn state() -> State {
    let state = State::new().unwrap();
    state.open_libs();
    state
}

fn through_script<T: Push + ?Sized, R: FromStack>(state: &State, value: &T) -> R {
    state.push(value).unwrap();
    state.set_global("value").unwrap();
    state.eval("return value").unwrap()
}

#[test]
fn test_scalars_survive_script_round_trip() {
    let state = state();
    assert_eq!(through_script::<_, f64>(&state, &-0.25), -0.25);
    assert_eq!(through_script::<_, i64>(&state, &(1i64 << 40)), 1i64 << 40);
    assert_eq!(through_script::<_, String>(&state, "héllo"), "héllo");
    assert!(through_script::<_, bool>(&state, &true));
    assert!(state.is_empty());
}

#[test]
fn test_strings_may_contain_nul() {
    let state = state();
    let s = "a\0b";
    state.push(s).unwrap();
    assert_eq!(state.obj_len(-1), 3);
    assert_eq!(state.pop_value::<String>().unwrap(), s);
}

#[test]
fn test_nested_sequences() {
    let state = state();
    let grid = vec![vec![1, 2], vec![3], vec![]];
    let back: Vec<Vec<i32>> = through_script(&state, &grid);
    assert_eq!(back, grid);
    assert_eq!(state.eval::<i32>("return value[2][1]").unwrap(), 3);
}

#[test]
fn test_script_built_map() {
    let state = state();
    let map: HashMap<String, Vec<String>> = state
        .eval("return { fruit = { 'apple', 'pear' }, veg = {} }")
        .unwrap();
    assert_eq!(map["fruit"], vec!["apple", "pear"]);
    assert!(map["veg"].is_empty());
}

#[test]
fn test_map_round_trip_preserves_pairs() {
    let state = state();
    let mut map = BTreeMap::new();
    map.insert("x".to_string(), 1.5);
    map.insert("y".to_string(), -2.0);
    let back: BTreeMap<String, f64> = through_script(&state, &map);
    assert_eq!(back, map);
}

#[test]
fn test_lenient_read_never_fails() {
    let state = state();
    state.exec_str("mixed = { 1, 'two', 3 }").unwrap();
    state.get_global("mixed").unwrap();

    assert_eq!(state.to_or(Vec::<f64>::new(), -1), Vec::<f64>::new());
    assert_eq!(state.to_or(vec!["d".to_string()], -1), vec!["1", "two", "3"]);
    assert_eq!(state.to_or(0.0, -1), 0.0);
    assert_eq!(state.top(), 1);
}

#[test]
fn test_new_table_marker() {
    let state = state();
    state.push(&NewTable).unwrap();
    assert_eq!(state.type_of(-1), LuaType::Table);
    assert_eq!(state.obj_len(-1), 0);
    state.push(&Nil).unwrap();
    assert!(state.is_nil(-1));
}

#[test]
fn test_json_document_round_trip() {
    let state = state();
    let doc = json!({
        "name": "config",
        "retries": 3,
        "servers": [
            { "host": "a.example", "port": 8080 },
            { "host": "b.example", "port": 8081 }
        ],
        "ratio": 0.75,
        "debug": false
    });
    let back: Value = through_script(&state, &doc);
    assert_eq!(back, doc);
    assert_eq!(
        state.eval::<String>("return value.servers[2].host").unwrap(),
        "b.example"
    );
}

#[test]
fn test_json_sparse_keys_become_object() {
    let state = state();
    let value: Value = state.eval("return { [1] = 'a', [3] = 'c' }").unwrap();
    assert_eq!(value, json!({ "1": "a", "3": "c" }));

    let value: Value = state.eval("return { [1.5] = true }").unwrap();
    assert_eq!(value, json!({ "1.5": true }));
}
