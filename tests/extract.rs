//! Serialization framework tests: registries, contexts, extraction, and
//! error collection.

use std::sync::Arc;

use joist::index::decode_string_token;
use joist::{
    AstNode, AstNodeType, DuplicateAction, DuplicateKeyAction, Error, ExtractOptions,
    ExtractionContext, ExtractionError, FailureMode, Formats, FunctionExtractor, ParseIndex,
    Reader, SerializationContext, Value, Version,
};

// ── Strict defaults ──────────────────────────────────────────

#[test]
fn extract_scalars() {
    assert_eq!(joist::extract::<i64>("42").unwrap(), 42);
    assert_eq!(joist::extract::<bool>("true").unwrap(), true);
    assert_eq!(joist::extract::<bool>("false").unwrap(), false);
    assert_eq!(joist::extract::<String>("\"hello\"").unwrap(), "hello");
    assert_eq!(joist::extract::<f64>("1.5").unwrap(), 1.5);
}

#[test]
fn extract_decimal_accepts_integer_tokens() {
    assert_eq!(joist::extract::<f64>("2").unwrap(), 2.0);
    assert_eq!(joist::extract::<f32>("2").unwrap(), 2.0f32);
}

#[test]
fn extract_sized_integers() {
    assert_eq!(joist::extract::<i8>("-100").unwrap(), -100);
    assert_eq!(joist::extract::<u8>("200").unwrap(), 200);
    assert_eq!(joist::extract::<i16>("30000").unwrap(), 30000);
    assert_eq!(joist::extract::<u32>("4000000000").unwrap(), 4_000_000_000);
}

#[test]
fn extract_sized_integer_overflow() {
    let error = joist::extract::<i8>("300").expect_err("300 does not fit in i8");
    match error {
        Error::Extraction(e) => {
            assert!(e.problems()[0].message().contains("does not fit"));
        }
        other => panic!("expected an extraction error, got {other:?}"),
    }
}

#[test]
fn extract_u64_full_range() {
    assert_eq!(
        joist::extract::<u64>("18446744073709551615").unwrap(),
        u64::MAX
    );
    assert!(joist::extract::<u64>("-1").is_err());
}

#[test]
fn extract_value_identity() {
    let value = joist::extract::<Value>(r#"{"a":[1,2]}"#).unwrap();
    assert_eq!(value, joist::parse(r#"{"a":[1,2]}"#).unwrap());
}

#[test]
fn strict_defaults_reject_cross_kind() {
    assert!(joist::extract::<i64>("\"10\"").is_err());
    assert!(joist::extract::<bool>("1").is_err());
    assert!(joist::extract::<String>("null").is_err());
    // Strictness includes decimals: an integer slot takes no fraction.
    assert!(joist::extract::<i64>("1.5").is_err());
}

#[test]
fn missing_extractor_reports_type_name() {
    #[derive(Debug)]
    struct Unregistered;
    let error = joist::extract::<Unregistered>("1").expect_err("no such extractor");
    match error {
        Error::Extraction(e) => {
            assert!(e.problems()[0].message().contains("no extractor"));
        }
        other => panic!("expected an extraction error, got {other:?}"),
    }
}

// ── Path descent ─────────────────────────────────────────────

#[test]
fn extract_at_descends_objects() {
    let text = r#"{ "a": {"b": 10}, "c": 25 }"#;
    assert_eq!(joist::extract_at::<i64>(text, ".a.b").unwrap(), 10);
    assert_eq!(joist::extract_at::<i64>(text, ".c").unwrap(), 25);
}

#[test]
fn extract_at_descends_arrays() {
    assert_eq!(joist::extract_at::<i64>("[10,20,30]", "[1]").unwrap(), 20);
    let text = r#"{"a":[{"b":5},{"b":7}]}"#;
    assert_eq!(joist::extract_at::<i64>(text, ".a[1].b").unwrap(), 7);
}

#[test]
fn extract_at_missing_member() {
    let error = joist::extract_at::<i64>(r#"{"a":1}"#, ".z").expect_err("no such member");
    match error {
        Error::Extraction(e) => {
            assert_eq!(e.path(), &".z".parse().unwrap());
            assert!(e.problems()[0].message().contains("no member"));
        }
        other => panic!("expected an extraction error, got {other:?}"),
    }
}

#[test]
fn extract_at_index_out_of_range() {
    assert!(joist::extract_at::<i64>("[1]", "[4]").is_err());
}

// ── Coercion ─────────────────────────────────────────────────

fn coerce<T: 'static>(text: &str) -> Result<T, Error> {
    joist::extract_with::<T>(text, Formats::coerce(), &ExtractOptions::default())
}

#[test]
fn coerce_string_to_integer() {
    assert_eq!(coerce::<i64>("\"10\"").unwrap(), 10);
}

#[test]
fn coerce_decimal_to_integer_truncates() {
    assert_eq!(coerce::<i64>("3.9").unwrap(), 3);
    assert_eq!(coerce::<i64>("-3.9").unwrap(), -3);
}

#[test]
fn coerce_booleans() {
    assert_eq!(coerce::<bool>("0").unwrap(), false);
    assert_eq!(coerce::<bool>("7").unwrap(), true);
    assert_eq!(coerce::<bool>("\"false\"").unwrap(), false);
    assert_eq!(coerce::<bool>("\"yes\"").unwrap(), true);
    assert_eq!(coerce::<bool>("null").unwrap(), false);
    assert_eq!(coerce::<bool>("[]").unwrap(), false);
    assert_eq!(coerce::<bool>("[0]").unwrap(), true);
}

#[test]
fn coerce_to_string() {
    assert_eq!(coerce::<String>("42").unwrap(), "42");
    assert_eq!(coerce::<String>("true").unwrap(), "true");
    assert_eq!(coerce::<String>("\"already\"").unwrap(), "already");
}

#[test]
fn coerce_string_to_decimal() {
    assert_eq!(coerce::<f64>("\"2.5\"").unwrap(), 2.5);
    assert_eq!(coerce::<f64>("true").unwrap(), 1.0);
}

#[test]
fn coerce_failure_still_fails() {
    assert!(coerce::<i64>("\"not a number\"").is_err());
    assert!(coerce::<i64>("null").is_err());
}

// ── Registry composition ─────────────────────────────────────

#[test]
fn duplicate_registration_policies() {
    fn constant_extractor(n: i64) -> Arc<dyn joist::Extractor> {
        Arc::new(FunctionExtractor::new(
            move |_: &mut ExtractionContext, reader: &mut Reader<'_>| {
                reader.next_token();
                Ok(n)
            },
        ))
    }

    let mut formats = Formats::new();
    formats
        .register_extractor(constant_extractor(1), DuplicateAction::Error)
        .unwrap();

    let duplicate = formats
        .register_extractor(constant_extractor(2), DuplicateAction::Error)
        .expect_err("duplicates are rejected by default");
    assert!(duplicate.to_string().contains("i64"));

    formats
        .register_extractor(constant_extractor(3), DuplicateAction::Ignore)
        .unwrap();
    formats
        .register_extractor(constant_extractor(4), DuplicateAction::Replace)
        .unwrap();

    let extracted =
        joist::extract_with::<i64>("0", Arc::new(formats), &ExtractOptions::default()).unwrap();
    assert_eq!(extracted, 4);
}

#[test]
fn child_registry_wins_over_parent() {
    let mut child = Formats::compose(vec![Formats::defaults()]);
    child
        .register_extractor(
            Arc::new(FunctionExtractor::new(
                |_: &mut ExtractionContext, reader: &mut Reader<'_>| {
                    reader.next_token();
                    Ok(99i64)
                },
            )),
            DuplicateAction::Error,
        )
        .unwrap();
    let child = Arc::new(child);

    // The child's i64 extractor shadows the default one...
    let options = ExtractOptions::default();
    assert_eq!(
        joist::extract_with::<i64>("1", child.clone(), &options).unwrap(),
        99
    );
    // ...while everything else falls through to the parent.
    assert_eq!(
        joist::extract_with::<bool>("true", child, &options).unwrap(),
        true
    );
}

// ── Custom composite extractors ──────────────────────────────

#[derive(Debug, PartialEq)]
struct Point {
    x: i64,
    y: i64,
}

fn point_formats() -> Arc<Formats> {
    let mut formats = Formats::compose(vec![Formats::defaults()]);
    formats
        .register_extractor(
            Arc::new(FunctionExtractor::new(
                |context: &mut ExtractionContext, reader: &mut Reader<'_>| {
                    reader.expect(AstNodeType::ObjectBegin)?;
                    let mut x = 0i64;
                    let mut y = 0i64;

                    reader.next_key().map_err(|_| {
                        ExtractionError::single(joist::Path::root(), "expected an object")
                    })?;
                    loop {
                        match reader.current() {
                            Ok(AstNode::ObjectEnd) => {
                                reader.next_token();
                                break;
                            }
                            Ok(AstNode::Key { token, escaped }) => {
                                let name = decode_string_token(token, escaped)
                                    .map_err(|cause| {
                                        ExtractionError::from(context.problem_from(reader, cause))
                                    })?
                                    .into_owned();
                                reader.next_token();
                                match name.as_str() {
                                    "x" => x = context.extract::<i64>(reader)?,
                                    "y" => y = context.extract::<i64>(reader)?,
                                    _ => match reader.current().map(|node| node.node_type()) {
                                        Ok(AstNodeType::ObjectBegin)
                                        | Ok(AstNodeType::ArrayBegin) => {
                                            reader.next_structure();
                                        }
                                        _ => {
                                            reader.next_token();
                                        }
                                    },
                                }
                            }
                            _ => {
                                return Err(ExtractionError::single(
                                    joist::Path::root(),
                                    "malformed object",
                                ))
                            }
                        }
                    }
                    Ok(Point { x, y })
                },
            )),
            DuplicateAction::Error,
        )
        .unwrap();
    Arc::new(formats)
}

#[test]
fn composite_extractor_pulls_members() {
    let point = joist::extract_with::<Point>(
        r#"{"x": 3, "ignored": [1,2,3], "y": 4}"#,
        point_formats(),
        &ExtractOptions::default(),
    )
    .unwrap();
    assert_eq!(point, Point { x: 3, y: 4 });
}

#[test]
fn composite_extractor_propagates_member_errors() {
    let error = joist::extract_with::<Point>(
        r#"{"x": "not a number", "y": 4}"#,
        point_formats(),
        &ExtractOptions::default(),
    )
    .expect_err("x is not an integer");
    match error {
        Error::Extraction(e) => assert_eq!(e.path(), &".x".parse().unwrap()),
        other => panic!("expected an extraction error, got {other:?}"),
    }
}

// ── Failure collection ───────────────────────────────────────

#[test]
fn duplicate_keys_replace_by_default() {
    let value = joist::parse(r#"{"a":1,"a":2,"a":3}"#).unwrap();
    assert_eq!(value.get("a"), Some(&Value::Integer(3)));
}

#[test]
fn duplicate_keys_ignore_keeps_first() {
    let options = ExtractOptions::new().with_on_duplicate_key(DuplicateKeyAction::Ignore);
    let value = ParseIndex::parse(r#"{"a":1,"a":2}"#)
        .extract_tree(&options)
        .unwrap();
    assert_eq!(value.get("a"), Some(&Value::Integer(1)));
}

#[test]
fn duplicate_keys_error_fails_immediately() {
    let options = ExtractOptions::new().with_on_duplicate_key(DuplicateKeyAction::Error);
    let error = ParseIndex::parse(r#"{"a":1,"a":2,"a":3}"#)
        .extract_tree(&options)
        .expect_err("duplicates are fatal");
    assert_eq!(error.problems().len(), 1);
    assert!(error.problems()[0].message().contains("duplicate"));
}

#[test]
fn duplicate_keys_error_collects_all() {
    let options = ExtractOptions::new()
        .with_on_duplicate_key(DuplicateKeyAction::Error)
        .with_failure_mode(FailureMode::CollectAll);
    let error = ParseIndex::parse(r#"{"a":1,"a":2,"a":3,"b":0,"b":1}"#)
        .extract_tree(&options)
        .expect_err("duplicates are fatal");
    assert_eq!(error.problems().len(), 3);
    assert_eq!(error.problems()[0].path(), &".a".parse().unwrap());
    assert_eq!(error.problems()[2].path(), &".b".parse().unwrap());
}

#[test]
fn collect_all_respects_max_failures() {
    let options = ExtractOptions::new()
        .with_on_duplicate_key(DuplicateKeyAction::Error)
        .with_failure_mode(FailureMode::CollectAll)
        .with_max_failures(2);
    let error = ParseIndex::parse(r#"{"a":1,"a":2,"a":3,"a":4,"a":5}"#)
        .extract_tree(&options)
        .expect_err("duplicates are fatal");
    assert_eq!(error.problems().len(), 2);
}

#[test]
fn extraction_error_display_lists_problems() {
    let options = ExtractOptions::new()
        .with_on_duplicate_key(DuplicateKeyAction::Error)
        .with_failure_mode(FailureMode::CollectAll);
    let error = ParseIndex::parse(r#"{"a":1,"a":2,"b":0,"b":1}"#)
        .extract_tree(&options)
        .expect_err("duplicates are fatal");
    let message = error.to_string();
    assert!(message.starts_with("2 extraction errors:"));
    assert!(message.contains("at .a:"));
    assert!(message.contains("at .b:"));
}

// ── Serialization ────────────────────────────────────────────

#[test]
fn serialize_builtin_types() {
    assert_eq!(joist::to_json(&true).unwrap(), Value::Boolean(true));
    assert_eq!(joist::to_json(&42i32).unwrap(), Value::Integer(42));
    assert_eq!(joist::to_json(&1.5f64).unwrap(), Value::Decimal(1.5));
    assert_eq!(
        joist::to_json(&String::from("s")).unwrap(),
        Value::String("s".to_owned())
    );
    let value = Value::from(vec![Value::Null]);
    assert_eq!(joist::to_json(&value).unwrap(), value);
}

#[test]
fn serialize_missing_type_fails() {
    struct Unregistered;
    assert!(joist::to_json(&Unregistered).is_err());
}

#[test]
fn serialize_custom_type() {
    let mut formats = Formats::compose(vec![Formats::defaults()]);
    formats
        .register_serializer(
            Arc::new(joist::FunctionSerializer::new(
                |context: &SerializationContext, from: &Point| {
                    let mut members = joist::Object::new();
                    members.insert("x".to_owned(), context.to_json(&from.x)?);
                    members.insert("y".to_owned(), context.to_json(&from.y)?);
                    Ok(Value::Object(members))
                },
            )),
            DuplicateAction::Error,
        )
        .unwrap();

    let context = SerializationContext::new(Arc::new(formats));
    let value = context.to_json(&Point { x: 1, y: 2 }).unwrap();
    assert_eq!(joist::to_text(&value), r#"{"x":1,"y":2}"#);
}

// ── Version ──────────────────────────────────────────────────

#[test]
fn versions_compare_lexicographically() {
    assert!(Version::new(1, 0, 0) < Version::new(1, 0, 1));
    assert!(Version::new(1, 9, 9) < Version::new(2, 0, 0));
    assert!(Version::new(2, 1, 0) > Version::new(2, 0, 9));
    assert_eq!(Version::new(1, 2, 3).to_string(), "1.2.3");
}

#[test]
fn context_carries_version_and_user_data() {
    let context = ExtractionContext::new(Formats::defaults())
        .with_version(Version::new(2, 1, 0))
        .with_user_data(Arc::new(7usize));
    assert_eq!(context.version(), Version::new(2, 1, 0));
    let data = context
        .user_data()
        .and_then(|data| data.downcast_ref::<usize>());
    assert_eq!(data, Some(&7));
}
