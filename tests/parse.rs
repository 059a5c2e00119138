//! End-to-end parse pipeline tests: source text through the index and
//! reader into values and back out through the encoders.

use joist::{
    AstError, AstNodeType, Error, ExtractOptions, ParseIndex, ParseOptions, Value,
};

#[test]
fn object_with_nested_array() {
    let text = r#"{"foo":4,"bar":[2,3,4,"5"]}"#;
    let value = joist::parse(text).unwrap();

    assert_eq!(value.get("foo"), Some(&Value::Integer(4)));
    let bar = value.get("bar").unwrap().as_array().unwrap();
    assert_eq!(
        bar,
        &vec![
            Value::Integer(2),
            Value::Integer(3),
            Value::Integer(4),
            Value::String("5".to_owned()),
        ]
    );

    // Emission differs from the input only in key order.
    assert_eq!(joist::to_text(&value), r#"{"bar":[2,3,4,"5"],"foo":4}"#);
    assert_eq!(joist::parse(&joist::to_text(&value)).unwrap(), value);
}

#[test]
fn null_document() {
    let value = joist::parse("null").unwrap();
    assert!(value.is_null());
    assert_eq!(joist::to_text(&value), "null");
}

#[test]
fn scalar_documents() {
    assert_eq!(joist::parse("3.25").unwrap(), Value::Decimal(3.25));
    assert_eq!(joist::parse("true").unwrap(), Value::Boolean(true));
    assert_eq!(joist::parse("\"s\"").unwrap(), Value::String("s".into()));
}

#[test]
fn unicode_escape_round_trip() {
    let value = joist::parse(r#""\u2622""#).unwrap();
    assert_eq!(value.as_string().unwrap().as_bytes(), &[0xe2, 0x98, 0xa2]);
    assert_eq!(joist::to_text(&value), r#""\u2622""#);
}

#[test]
fn surrogate_pair_round_trip() {
    let value = joist::parse(r#""\uD83D\uDE00""#).unwrap();
    let text = value.as_string().unwrap();
    assert_eq!(text.chars().next(), Some('\u{1f600}'));
    assert_eq!(text.len(), 4);
    assert_eq!(joist::to_text(&value), r#""\ud83d\ude00""#);
}

#[test]
fn lone_surrogate_fails() {
    assert!(joist::parse(r#""\uD83D""#).is_err());
    assert!(joist::parse(r#""\uDE00""#).is_err());
}

#[test]
fn trailing_comma_is_a_parse_error() {
    let error = joist::parse("[1,2,3,]").expect_err("trailing comma");
    match error {
        Error::Parse(e) => {
            assert_eq!(e.kind, AstError::CloseAfterComma);
            assert_eq!(e.offset, 7);
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

#[test]
fn element_counts_and_structure_skips() {
    let index = ParseIndex::parse(r#"[ "a", "b", "c" ]"#);
    let mut nodes = index.nodes();
    nodes.next();
    match nodes.next() {
        Some(joist::AstNode::ArrayBegin { elements, .. }) => assert_eq!(elements, 3),
        other => panic!("expected array_begin, got {other:?}"),
    }

    let mut reader = index.reader();
    reader.next_token();
    assert!(reader.next_structure());
    assert_eq!(
        reader.current().unwrap().node_type(),
        AstNodeType::DocumentEnd
    );
}

#[test]
fn extraction_is_idempotent() {
    let text = r#"{"a":[1,2.5,{"b":null}],"c":"x"}"#;
    let first = joist::extract::<Value>(text).unwrap();
    let second = joist::extract::<Value>(text).unwrap();
    assert_eq!(first, second);
    assert_eq!(first, joist::parse(text).unwrap());
}

#[test]
fn empty_input_is_an_error() {
    assert!(joist::parse("").is_err());
    assert!(joist::parse("   ").is_err());
}

#[test]
fn integer_round_trips() {
    assert_eq!(
        joist::parse("9223372036854775807").unwrap(),
        Value::Integer(i64::MAX)
    );
    assert_eq!(
        joist::parse("-9223372036854775808").unwrap(),
        Value::Integer(i64::MIN)
    );
    // [2^63, 2^64) keeps its bit pattern through the integer variant.
    assert_eq!(
        joist::parse("18446744073709551615").unwrap(),
        Value::Integer(-1),
    );
    assert_eq!(
        joist::parse("9223372036854775808").unwrap(),
        Value::Integer(i64::MIN),
    );
}

#[test]
fn parse_with_strict_options() {
    let strict = ParseOptions::strict();
    let extract = ExtractOptions::default();

    assert!(joist::parse_with("[1]", &strict, &extract).is_ok());
    // Scalar roots, comments, and deep nesting all fail under strict.
    assert!(joist::parse_with("1", &strict, &extract).is_err());
    assert!(joist::parse_with("/* c */ [1]", &strict, &extract).is_err());
    let deep = "[".repeat(21) + &"]".repeat(21);
    assert!(joist::parse_with(&deep, &strict, &extract).is_err());
}

#[test]
fn comments_parse_by_default() {
    let value = joist::parse("/* head */ { \"a\": /* mid */ 1 } /* tail */").unwrap();
    assert_eq!(value.get("a"), Some(&Value::Integer(1)));
}

#[test]
fn owned_index_carries_its_source() {
    let index = ParseIndex::parse(String::from(r#"{"k":1}"#));
    assert!(index.success());
    let value = index.extract_tree(&ExtractOptions::default()).unwrap();
    assert_eq!(value.get("k"), Some(&Value::Integer(1)));
}
