//! Built-in converters and the standard registry compositions.
//!
//! The default registry is strict: every adapter demands the node kind
//! that matches its type, the way the checked accessors on [`Value`] do.
//! The coerce registry layers looser extractors on top, for inputs where
//! `"10"` should become the integer `10`; its serializer side falls
//! through to the defaults.

use std::sync::Arc;

use crate::encode;
use crate::errors::{ExtractionError, ParseError, Problem};
use crate::extract::{DuplicateKeyAction, ExtractionContext, SerializationContext};
use crate::formats::{Adapter, DuplicateAction, Formats, FunctionAdapter, FunctionExtractor};
use crate::index::{
    decode_string_token, parse_decimal_token, parse_integer_token, parse_unsigned_token, AstNode,
    AstNodeType,
};
use crate::reader::Reader;
use crate::value::{Object, Value};

// ── Reader-driven value construction ─────────────────────────

fn past_end(context: &ExtractionContext) -> ExtractionError {
    ExtractionError::single(
        context.path().clone(),
        "reader is past the end of the index",
    )
}

/// The identity extraction: build a [`Value`] tree from the reader.
///
/// Honors the context's duplicate-key action, and in collect-all mode
/// keeps going past scalar conversion problems (the broken spots become
/// null).  A leading `document_start` is skipped so a fresh reader works
/// directly.
pub(crate) fn read_value(
    context: &mut ExtractionContext,
    reader: &mut Reader<'_>,
) -> Result<Value, ExtractionError> {
    if matches!(
        reader.current().map(|node| node.node_type()),
        Ok(AstNodeType::DocumentStart)
    ) {
        reader.next_token();
    }
    read_value_inner(context, reader)
}

fn read_value_inner(
    context: &mut ExtractionContext,
    reader: &mut Reader<'_>,
) -> Result<Value, ExtractionError> {
    let node = reader.current().map_err(|_| past_end(context))?;

    match node {
        AstNode::LiteralNull => {
            reader.next_token();
            Ok(Value::Null)
        }
        AstNode::LiteralTrue => {
            reader.next_token();
            Ok(Value::Boolean(true))
        }
        AstNode::LiteralFalse => {
            reader.next_token();
            Ok(Value::Boolean(false))
        }
        AstNode::Integer { token } => {
            let value = match parse_integer_token(token) {
                Ok(value) => Value::Integer(value),
                Err(cause) => {
                    let problem = context.problem_from(reader, cause);
                    context.attach(problem)?;
                    Value::Null
                }
            };
            reader.next_token();
            Ok(value)
        }
        AstNode::Decimal { token } => {
            let value = match parse_decimal_token(token) {
                Ok(value) => Value::Decimal(value),
                Err(cause) => {
                    let problem = context.problem_from(reader, cause);
                    context.attach(problem)?;
                    Value::Null
                }
            };
            reader.next_token();
            Ok(value)
        }
        AstNode::String { token, escaped } => {
            let value = match decode_string_token(token, escaped) {
                Ok(text) => Value::String(text.into_owned()),
                Err(cause) => {
                    let problem = context.problem_from(reader, cause);
                    context.attach(problem)?;
                    Value::Null
                }
            };
            reader.next_token();
            Ok(value)
        }
        AstNode::ObjectBegin { .. } => read_object(context, reader),
        AstNode::ArrayBegin { elements, .. } => read_array(context, reader, elements),
        AstNode::Error { code } => {
            let offset = reader.current_offset().unwrap_or_default();
            let problem = context.problem_from(reader, ParseError::new(code, offset));
            Err(ExtractionError::from(problem))
        }
        other => Err(ExtractionError::from(context.problem(
            reader,
            format!("unexpected {} node in value position", other.node_type()),
        ))),
    }
}

fn read_object(
    context: &mut ExtractionContext,
    reader: &mut Reader<'_>,
) -> Result<Value, ExtractionError> {
    reader.next_token();
    let mut members = Object::new();

    loop {
        let node = reader.current().map_err(|_| past_end(context))?;
        match node {
            AstNode::ObjectEnd => {
                reader.next_token();
                return Ok(Value::Object(members));
            }
            AstNode::Key { token, escaped } => {
                let key = decode_string_token(token, escaped)
                    .map_err(|cause| ExtractionError::from(context.problem_from(reader, cause)))?
                    .into_owned();
                // The reader's path at a key node already ends with it.
                let member_path = match reader.current_path() {
                    Ok(path) => context.path().concat(&path),
                    Err(_) => context.path().clone(),
                };
                reader.next_token();

                let value = read_value_inner(context, reader)?;

                if members.contains_key(&key) {
                    match context.options().on_duplicate_key() {
                        DuplicateKeyAction::Replace => {
                            members.insert(key, value);
                        }
                        DuplicateKeyAction::Ignore => {}
                        DuplicateKeyAction::Error => {
                            context.attach(Problem::new(
                                member_path,
                                format!("duplicate object key {key:?}"),
                            ))?;
                            members.insert(key, value);
                        }
                    }
                } else {
                    members.insert(key, value);
                }
            }
            AstNode::Error { code } => {
                let offset = reader.current_offset().unwrap_or_default();
                let problem = context.problem_from(reader, ParseError::new(code, offset));
                return Err(ExtractionError::from(problem));
            }
            other => {
                return Err(ExtractionError::from(context.problem(
                    reader,
                    format!("expected a key in object, found {}", other.node_type()),
                )));
            }
        }
    }
}

fn read_array(
    context: &mut ExtractionContext,
    reader: &mut Reader<'_>,
    elements: usize,
) -> Result<Value, ExtractionError> {
    reader.next_token();
    let mut out = Vec::with_capacity(elements);

    loop {
        let node = reader.current().map_err(|_| past_end(context))?;
        match node {
            AstNode::ArrayEnd => {
                reader.next_token();
                return Ok(Value::Array(out));
            }
            _ => out.push(read_value_inner(context, reader)?),
        }
    }
}

// ── Strict scalar extraction ─────────────────────────────────

fn extract_boolean(
    context: &mut ExtractionContext,
    reader: &mut Reader<'_>,
) -> Result<bool, ExtractionError> {
    reader.expect_one_of(&[AstNodeType::LiteralTrue, AstNodeType::LiteralFalse])?;
    let value = matches!(
        reader.current().map_err(|_| past_end(context))?,
        AstNode::LiteralTrue
    );
    reader.next_token();
    Ok(value)
}

fn extract_string(
    context: &mut ExtractionContext,
    reader: &mut Reader<'_>,
) -> Result<String, ExtractionError> {
    reader.expect_one_of(&[AstNodeType::StringCanonical, AstNodeType::StringEscaped])?;
    let node = reader.current().map_err(|_| past_end(context))?;
    let text = match node {
        AstNode::String { token, escaped } => decode_string_token(token, escaped)
            .map_err(|cause| ExtractionError::from(context.problem_from(reader, cause)))?
            .into_owned(),
        _ => return Err(past_end(context)),
    };
    reader.next_token();
    Ok(text)
}

fn extract_sized<T>(
    context: &mut ExtractionContext,
    reader: &mut Reader<'_>,
) -> Result<T, ExtractionError>
where
    T: TryFrom<i64> + 'static,
{
    reader.expect(AstNodeType::Integer)?;
    let node = reader.current().map_err(|_| past_end(context))?;
    let token = node.token().unwrap_or_default();
    let wide = parse_integer_token(token)
        .map_err(|cause| ExtractionError::from(context.problem_from(reader, cause)))?;
    let value = T::try_from(wide).map_err(|_| {
        ExtractionError::from(context.problem(
            reader,
            format!(
                "integer {wide} does not fit in {}",
                std::any::type_name::<T>()
            ),
        ))
    })?;
    reader.next_token();
    Ok(value)
}

fn extract_u64(
    context: &mut ExtractionContext,
    reader: &mut Reader<'_>,
) -> Result<u64, ExtractionError> {
    reader.expect(AstNodeType::Integer)?;
    let node = reader.current().map_err(|_| past_end(context))?;
    let token = node.token().unwrap_or_default();
    let value = parse_unsigned_token(token)
        .map_err(|cause| ExtractionError::from(context.problem_from(reader, cause)))?;
    reader.next_token();
    Ok(value)
}

fn extract_f64(
    context: &mut ExtractionContext,
    reader: &mut Reader<'_>,
) -> Result<f64, ExtractionError> {
    reader.expect_one_of(&[AstNodeType::Integer, AstNodeType::Decimal])?;
    let node = reader.current().map_err(|_| past_end(context))?;
    let token = node.token().unwrap_or_default();
    let value = parse_decimal_token(token)
        .map_err(|cause| ExtractionError::from(context.problem_from(reader, cause)))?;
    reader.next_token();
    Ok(value)
}

// ── Default formats ──────────────────────────────────────────

fn register<A: Adapter + 'static>(formats: &mut Formats, adapter: A) {
    formats
        .register_adapter(Arc::new(adapter), DuplicateAction::Error)
        .expect("each built-in type is registered exactly once");
}

pub(crate) fn create_default_formats() -> Formats {
    let mut formats = Formats::new();

    register(
        &mut formats,
        FunctionAdapter::new(
            |context: &mut ExtractionContext, reader: &mut Reader<'_>| {
                read_value(context, reader)
            },
            |_: &SerializationContext, from: &Value| Ok(from.clone()),
        ),
    );

    register(
        &mut formats,
        FunctionAdapter::new(extract_boolean, |_: &SerializationContext, from: &bool| {
            Ok(Value::Boolean(*from))
        }),
    );

    register(
        &mut formats,
        FunctionAdapter::new(extract_string, |_: &SerializationContext, from: &String| {
            Ok(Value::String(from.clone()))
        }),
    );

    macro_rules! sized_integer_adapters {
        ($($t:ty),* $(,)?) => {
            $(
                register(
                    &mut formats,
                    FunctionAdapter::new(
                        extract_sized::<$t>,
                        |_: &SerializationContext, from: &$t| Ok(Value::Integer(*from as i64)),
                    ),
                );
            )*
        };
    }
    sized_integer_adapters!(i8, u8, i16, u16, i32, u32, i64);

    register(
        &mut formats,
        FunctionAdapter::new(extract_u64, |_: &SerializationContext, from: &u64| {
            // Bit-preserving, like the u64 constructor on Value.
            Ok(Value::Integer(*from as i64))
        }),
    );

    register(
        &mut formats,
        FunctionAdapter::new(extract_f64, |_: &SerializationContext, from: &f64| {
            Ok(Value::Decimal(*from))
        }),
    );

    register(
        &mut formats,
        FunctionAdapter::new(
            |context: &mut ExtractionContext, reader: &mut Reader<'_>| {
                extract_f64(context, reader).map(|value| value as f32)
            },
            |_: &SerializationContext, from: &f32| Ok(Value::Decimal(f64::from(*from))),
        ),
    );

    formats
}

// ── Coerce formats ───────────────────────────────────────────

fn coerce_boolean_value(value: &Value) -> Result<bool, String> {
    match value {
        Value::Null => Ok(false),
        Value::Boolean(b) => Ok(*b),
        Value::Integer(n) => Ok(*n != 0),
        Value::Decimal(d) => Ok(*d != 0.0),
        Value::String(s) => Ok(!matches!(s.as_str(), "" | "0" | "false")),
        Value::Array(a) => Ok(!a.is_empty()),
        Value::Object(o) => Ok(!o.is_empty()),
    }
}

fn coerce_integer_value(value: &Value) -> Result<i64, String> {
    match value {
        Value::Integer(n) => Ok(*n),
        // Truncation, not rounding.
        Value::Decimal(d) => Ok(*d as i64),
        Value::Boolean(b) => Ok(i64::from(*b)),
        Value::String(s) => s
            .parse::<i64>()
            .or_else(|_| s.parse::<f64>().map(|d| d as i64))
            .map_err(|_| format!("cannot convert {s:?} to an integer")),
        other => Err(format!("cannot convert {} to an integer", other.kind())),
    }
}

fn coerce_decimal_value(value: &Value) -> Result<f64, String> {
    match value {
        Value::Integer(n) => Ok(*n as f64),
        Value::Decimal(d) => Ok(*d),
        Value::Boolean(b) => Ok(f64::from(u8::from(*b))),
        Value::String(s) => s
            .parse::<f64>()
            .map_err(|_| format!("cannot convert {s:?} to a decimal")),
        other => Err(format!("cannot convert {} to a decimal", other.kind())),
    }
}

fn coerce_string_value(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        other => Ok(encode::to_text(other)),
    }
}

/// Read a whole value, then convert it, reporting conversion failures at
/// the value's own path.
fn coerce_scalar<T>(
    context: &mut ExtractionContext,
    reader: &mut Reader<'_>,
    convert: impl Fn(&Value) -> Result<T, String>,
) -> Result<T, ExtractionError> {
    let position = match reader.current_path() {
        Ok(path) => context.path().concat(&path),
        Err(_) => context.path().clone(),
    };
    let value = read_value(context, reader)?;
    convert(&value).map_err(|message| ExtractionError::single(position, message))
}

fn register_coercion<T, F>(formats: &mut Formats, function: F)
where
    T: 'static,
    F: Fn(&mut ExtractionContext, &mut Reader<'_>) -> Result<T, ExtractionError>
        + Send
        + Sync
        + 'static,
{
    formats
        .register_extractor(Arc::new(FunctionExtractor::new(function)), DuplicateAction::Error)
        .expect("each coerced type is registered exactly once");
}

pub(crate) fn create_coerce_formats() -> Formats {
    let mut formats = Formats::new();

    register_coercion::<bool, _>(
        &mut formats,
        |context: &mut ExtractionContext, reader: &mut Reader<'_>| {
            coerce_scalar(context, reader, coerce_boolean_value)
        },
    );

    register_coercion::<String, _>(
        &mut formats,
        |context: &mut ExtractionContext, reader: &mut Reader<'_>| {
            coerce_scalar(context, reader, coerce_string_value)
        },
    );

    macro_rules! sized_integer_coercions {
        ($($t:ty),* $(,)?) => {
            $(
                register_coercion::<$t, _>(&mut formats, |context: &mut ExtractionContext, reader: &mut Reader<'_>| {
                    let position = match reader.current_path() {
                        Ok(path) => context.path().concat(&path),
                        Err(_) => context.path().clone(),
                    };
                    let wide = coerce_scalar(context, reader, coerce_integer_value)?;
                    <$t>::try_from(wide).map_err(|_| {
                        ExtractionError::single(
                            position,
                            format!(
                                "integer {wide} does not fit in {}",
                                std::any::type_name::<$t>()
                            ),
                        )
                    })
                });
            )*
        };
    }
    sized_integer_coercions!(i8, u8, i16, u16, i32, u32, i64);

    register_coercion::<u64, _>(
        &mut formats,
        |context: &mut ExtractionContext, reader: &mut Reader<'_>| {
            coerce_scalar(context, reader, |value| {
                coerce_integer_value(value).map(|wide| wide as u64)
            })
        },
    );

    register_coercion::<f64, _>(
        &mut formats,
        |context: &mut ExtractionContext, reader: &mut Reader<'_>| {
            coerce_scalar(context, reader, coerce_decimal_value)
        },
    );

    register_coercion::<f32, _>(
        &mut formats,
        |context: &mut ExtractionContext, reader: &mut Reader<'_>| {
            coerce_scalar(context, reader, coerce_decimal_value).map(|value| value as f32)
        },
    );

    formats
}
