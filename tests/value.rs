//! Value model tests: accessors, ordering, and path access.

use std::cmp::Ordering;
use std::collections::HashMap;

use joist::{Kind, Object, Path, Value};

fn path(text: &str) -> Path {
    text.parse().expect("test path must parse")
}

// ── Kinds and accessors ──────────────────────────────────────

#[test]
fn kind_reporting() {
    assert_eq!(Value::Null.kind(), Kind::Null);
    assert_eq!(Value::from(true).kind(), Kind::Boolean);
    assert_eq!(Value::from(1).kind(), Kind::Integer);
    assert_eq!(Value::from(1.5).kind(), Kind::Decimal);
    assert_eq!(Value::from("x").kind(), Kind::String);
    assert_eq!(Value::from(vec![]).kind(), Kind::Array);
    assert_eq!(Value::from(Object::new()).kind(), Kind::Object);
}

#[test]
fn typed_accessors() {
    assert_eq!(Value::from(true).as_boolean(), Ok(true));
    assert_eq!(Value::from(42).as_integer(), Ok(42));
    assert_eq!(Value::from(1.5).as_decimal(), Ok(1.5));
    assert_eq!(Value::from("hi").as_string(), Ok("hi"));
}

#[test]
fn accessor_kind_errors() {
    let error = Value::from(42).as_string().expect_err("42 is not a string");
    assert_eq!(error.expected, "string");
    assert_eq!(error.actual, Kind::Integer);

    assert!(Value::Null.as_boolean().is_err());
    assert!(Value::from("x").as_integer().is_err());
    assert!(Value::from(true).as_decimal().is_err());
}

#[test]
fn integer_widens_to_decimal() {
    assert_eq!(Value::from(3).as_decimal(), Ok(3.0));
}

#[test]
fn len_and_is_empty() {
    assert_eq!(Value::from("abc").len(), Ok(3));
    assert!(!Value::from("abc").is_empty().unwrap());
    assert_eq!(Value::from(vec![Value::Null]).len(), Ok(1));
    assert!(Value::from(Object::new()).is_empty().unwrap());
    assert!(Value::from(7).len().is_err());
    assert!(Value::Null.is_empty().is_err());
}

// ── Array operations ─────────────────────────────────────────

#[test]
fn array_push_pop_both_ends() {
    let mut array = Value::from(vec![Value::from(2)]);
    array.push_back(3).unwrap();
    array.push_front(1).unwrap();
    assert_eq!(array.len(), Ok(3));
    assert_eq!(array.get_index(0), Some(&Value::Integer(1)));

    assert_eq!(array.pop_front().unwrap(), Some(Value::Integer(1)));
    assert_eq!(array.pop_back().unwrap(), Some(Value::Integer(3)));
    assert_eq!(array.pop_back().unwrap(), Some(Value::Integer(2)));
    assert_eq!(array.pop_back().unwrap(), None);

    assert!(Value::Null.push_back(1).is_err());
}

#[test]
fn array_resize_and_assign() {
    let mut array = Value::from(vec![]);
    array.resize(3, Value::Null).unwrap();
    assert_eq!(array.len(), Ok(3));

    array.assign(2, Value::from(true)).unwrap();
    assert_eq!(array.len(), Ok(2));
    assert_eq!(array.get_index(1), Some(&Value::Boolean(true)));
}

// ── Object operations ────────────────────────────────────────

#[test]
fn object_insert_remove_count() {
    let mut object = Value::from(Object::new());
    assert_eq!(object.insert("a", 1).unwrap(), None);
    assert_eq!(object.insert("a", 2).unwrap(), Some(Value::Integer(1)));
    assert_eq!(object.count("a"), Ok(1));
    assert_eq!(object.count("b"), Ok(0));
    assert_eq!(object.get("a"), Some(&Value::Integer(2)));
    assert_eq!(object.remove("a").unwrap(), Some(Value::Integer(2)));
    assert_eq!(object.get("a"), None);
}

#[test]
fn object_iterates_in_key_order() {
    let mut object = Value::from(Object::new());
    object.insert("zebra", 0).unwrap();
    object.insert("apple", 1).unwrap();
    object.insert("mango", 2).unwrap();

    let keys: Vec<&str> = object
        .as_object()
        .unwrap()
        .keys()
        .map(String::as_str)
        .collect();
    assert_eq!(keys, vec!["apple", "mango", "zebra"]);
}

// ── Comparison ───────────────────────────────────────────────

#[test]
fn kind_ordering() {
    let ascending = [
        Value::Null,
        Value::from(false),
        Value::from(true),
        Value::from(10),
        Value::from("a"),
        Value::from(vec![]),
        Value::from(Object::new()),
    ];
    for window in ascending.windows(2) {
        assert_eq!(
            window[0].compare(&window[1]),
            Ordering::Less,
            "{} should sort before {}",
            window[0],
            window[1]
        );
    }
}

#[test]
fn numbers_cross_compare() {
    assert_eq!(Value::from(2).compare(&Value::from(2.0)), Ordering::Equal);
    assert_eq!(Value::from(2).compare(&Value::from(2.5)), Ordering::Less);
    assert_eq!(Value::from(3.5).compare(&Value::from(3)), Ordering::Greater);
    assert_eq!(Value::from(2), Value::from(2.0));
}

#[test]
fn decimal_tolerance_band() {
    let denorm_min = f64::from_bits(1);
    assert_eq!(
        Value::from(0.0).compare(&Value::from(denorm_min)),
        Ordering::Equal
    );
    assert_eq!(Value::from(0.1).compare(&Value::from(0.2)), Ordering::Less);
}

#[test]
fn deep_equality() {
    let a = joist::parse(r#"{"x":[1,2,{"y":null}]}"#).unwrap();
    let b = joist::parse(r#"{ "x" : [ 1, 2, { "y": null } ] }"#).unwrap();
    assert_eq!(a, b);

    let c = joist::parse(r#"{"x":[1,2,{"y":0}]}"#).unwrap();
    assert_ne!(a, c);
}

#[test]
fn arrays_compare_lexicographically() {
    let short = Value::from(vec![Value::from(1)]);
    let long = Value::from(vec![Value::from(1), Value::from(2)]);
    assert_eq!(short.compare(&long), Ordering::Less);

    let bigger = Value::from(vec![Value::from(3)]);
    assert_eq!(bigger.compare(&long), Ordering::Greater);
}

#[test]
fn values_sort_and_key_maps() {
    let mut values = vec![
        Value::from("b"),
        Value::Null,
        Value::from(3),
        Value::from(true),
    ];
    values.sort();
    assert_eq!(
        values,
        vec![
            Value::Null,
            Value::from(true),
            Value::from(3),
            Value::from("b"),
        ]
    );

    let mut by_value: HashMap<Value, i32> = HashMap::new();
    by_value.insert(Value::from("key"), 1);
    by_value.insert(Value::from(7), 2);
    assert_eq!(by_value.get(&Value::from("key")), Some(&1));
    assert_eq!(by_value.get(&Value::from(7)), Some(&2));
}

#[test]
fn take_leaves_null() {
    let mut value = Value::from("gone");
    let taken = std::mem::take(&mut value);
    assert_eq!(taken, Value::from("gone"));
    assert!(value.is_null());
}

// ── Path access ──────────────────────────────────────────────

#[test]
fn at_path_traverses() {
    let value = joist::parse(r#"{"a":{"b":[10,20,30]}}"#).unwrap();
    assert_eq!(
        value.at_path(&path(".a.b[1]")).unwrap(),
        &Value::Integer(20)
    );
    assert_eq!(value.at_path(&Path::root()).unwrap(), &value);
}

#[test]
fn at_path_out_of_range() {
    let value = joist::parse(r#"{"a":[1]}"#).unwrap();
    assert!(value.at_path(&path(".a[5]")).is_err());
    assert!(value.at_path(&path(".missing")).is_err());
    // Indexing a scalar is a kind error, not out-of-range.
    assert!(value.at_path(&path(".a[0].x")).is_err());
}

#[test]
fn at_path_mut_constructs_intermediates() {
    let mut value = Value::Null;
    *value.at_path_mut(&path(".a[2].b")).unwrap() = Value::from(9);

    assert_eq!(value.at_path(&path(".a[2].b")).unwrap(), &Value::Integer(9));
    // The skipped array slots are null holes.
    assert_eq!(value.at_path(&path(".a[0]")).unwrap(), &Value::Null);
    assert_eq!(value.at_path(&path(".a[1]")).unwrap(), &Value::Null);
}

#[test]
fn at_path_mut_respects_existing_kinds() {
    let mut value = joist::parse(r#"{"a":1}"#).unwrap();
    assert!(value.at_path_mut(&path(".a.b")).is_err());
}

// ── Display ──────────────────────────────────────────────────

#[test]
fn display_is_compact_encoding() {
    let value = joist::parse(r#"{ "b": [1, 2], "a": null }"#).unwrap();
    assert_eq!(value.to_string(), r#"{"a":null,"b":[1,2]}"#);
    assert_eq!(Value::from(5).to_string(), "5");
    assert_eq!(Value::Null.to_string(), "null");
}
