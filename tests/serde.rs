//! Serde interop tests: Value through serde_json and back.

use joist::serde_adapter::{from_serde_json, to_serde_json};
use joist::Value;

#[test]
fn value_serializes_through_serde_json() {
    let value = joist::parse(r#"{"a":[1,2.5,"x"],"b":null,"c":true}"#).unwrap();
    let text = serde_json::to_string(&value).unwrap();
    assert_eq!(text, r#"{"a":[1,2.5,"x"],"b":null,"c":true}"#);
}

#[test]
fn value_deserializes_through_serde_json() {
    let value: Value = serde_json::from_str(r#"{"a":[1,2.5,"x"],"b":null}"#).unwrap();
    assert_eq!(value, joist::parse(r#"{"a":[1,2.5,"x"],"b":null}"#).unwrap());
}

#[test]
fn nonfinite_decimals_serialize_as_null() {
    let text = serde_json::to_string(&Value::Decimal(f64::NAN)).unwrap();
    assert_eq!(text, "null");
}

#[test]
fn converts_to_serde_json_values() {
    let value = joist::parse(r#"{"n":3,"s":"x"}"#).unwrap();
    let converted = to_serde_json(&value);
    assert_eq!(converted, serde_json::json!({"n": 3, "s": "x"}));
}

#[test]
fn converts_from_serde_json_values() {
    let converted = from_serde_json(serde_json::json!({"n": 3, "list": [true, null]}));
    assert_eq!(converted, joist::parse(r#"{"n":3,"list":[true,null]}"#).unwrap());
}

#[test]
fn large_unsigned_numbers_keep_bits() {
    let converted = from_serde_json(serde_json::json!(u64::MAX));
    assert_eq!(converted, Value::from(u64::MAX));
}

#[test]
fn round_trip_through_serde_json_value() {
    let original = joist::parse(r#"{"deep":{"er":[1,2,{"est":"!"}]}}"#).unwrap();
    let back = from_serde_json(to_serde_json(&original));
    assert_eq!(back, original);
}

#[test]
fn deserializes_any_agnostic_formats() {
    // serde's self-describing path: a Value materializes from a bool,
    // a number, or a full tree alike.
    let b: Value = serde_json::from_str("true").unwrap();
    assert_eq!(b, Value::Boolean(true));
    let n: Value = serde_json::from_str("-5").unwrap();
    assert_eq!(n, Value::Integer(-5));
}
