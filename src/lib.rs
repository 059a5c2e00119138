//! # joist: indexed JSON parsing and type-driven serialization
//!
//! Parse JSON text into a compact random-access index, pull tokens from
//! it with a forward reader, materialize [`Value`] trees, and convert to
//! and from native types through a composable converter registry.
//!
//! ```
//! use joist::parse;
//!
//! let value = parse(r#"{ "name": "miri", "depth": 3 }"#)?;
//! assert_eq!(value.get("name").and_then(|v| v.as_string().ok()), Some("miri"));
//! assert_eq!(value.get("depth").and_then(|v| v.as_integer().ok()), Some(3));
//! # Ok::<(), joist::Error>(())
//! ```
//!
//! The index itself is the interesting structure: one scan over the
//! source yields a linear array of tagged tokens with offsets back into
//! the text, and container openers record where their closers are, so
//! skipping a structure costs one hop.  Everything else (the reader, the
//! tree builder, the extractors) consumes that index.

mod adapters;

pub mod constants;
pub mod encode;
pub mod errors;
pub mod extract;
pub mod formats;
pub mod index;
pub mod path;
pub mod reader;
pub mod scan;
pub mod serde_adapter;
pub mod strings;
pub mod value;

use std::sync::Arc;

pub use encode::{to_text, to_text_pretty, CompactEncoder, Encoder, PrettyEncoder};
pub use errors::{
    AccessError, AstError, DecodeError, DuplicateType, Error, ExtractionError, KindError,
    NoExtractor, NoSerializer, NumberError, ParseError, PathError, Problem, ReaderError,
    SerializationError,
};
pub use extract::{
    DuplicateKeyAction, ExtractOptions, ExtractionContext, FailureMode, SerializationContext,
};
pub use formats::{
    Adapter, DuplicateAction, Extractor, Formats, FunctionAdapter, FunctionExtractor,
    FunctionSerializer, Serializer, Version,
};
pub use index::{AstNode, AstNodeType, ParseIndex, ParseOptions, StringEncoding};
pub use path::{Path, PathElement};
pub use reader::Reader;
pub use value::{Kind, Object, Value};

// ── Parsing ──────────────────────────────────────────────────

/// Parse `input` into a [`Value`] with default options.
///
/// This is the index pipeline end to end: build the index, validate it,
/// extract the tree.
pub fn parse(input: &str) -> Result<Value, Error> {
    parse_with(input, &ParseOptions::default(), &ExtractOptions::default())
}

/// Parse `input` into a [`Value`] with explicit options.
pub fn parse_with(
    input: &str,
    parse_options: &ParseOptions,
    extract_options: &ExtractOptions,
) -> Result<Value, Error> {
    let index = ParseIndex::parse_with(input, parse_options);
    index.validate()?;
    Ok(index.extract_tree(extract_options)?)
}

// ── Extraction ───────────────────────────────────────────────

/// Extract a `T` from JSON text using [`Formats::defaults`].
pub fn extract<T: 'static>(input: &str) -> Result<T, Error> {
    extract_with(input, Formats::defaults(), &ExtractOptions::default())
}

/// Extract a `T` from JSON text using the given registry and options.
pub fn extract_with<T: 'static>(
    input: &str,
    formats: Arc<Formats>,
    options: &ExtractOptions,
) -> Result<T, Error> {
    let index = ParseIndex::parse(input);
    index.validate()?;

    let mut reader = index.reader();
    reader.next_token();

    let mut context = ExtractionContext::new(formats).with_options(options.clone());
    let value = context.extract::<T>(&mut reader)?;
    Ok(context.finish(value)?)
}

/// Extract a `T` from the subvalue at `path` (for example `".a.b"` or
/// `".items[2]"`) using [`Formats::defaults`].
pub fn extract_at<T: 'static>(input: &str, path: &str) -> Result<T, Error> {
    extract_at_with(input, path, Formats::defaults(), &ExtractOptions::default())
}

/// Extract a `T` from the subvalue at `path` using the given registry
/// and options.
pub fn extract_at_with<T: 'static>(
    input: &str,
    path: &str,
    formats: Arc<Formats>,
    options: &ExtractOptions,
) -> Result<T, Error> {
    let subpath: Path = path.parse()?;

    let index = ParseIndex::parse(input);
    index.validate()?;

    let mut reader = index.reader();
    reader.next_token();

    let mut context = ExtractionContext::new(formats).with_options(options.clone());
    let value = context.extract_sub::<T>(&mut reader, &subpath)?;
    Ok(context.finish(value)?)
}

/// Serialize `from` into a [`Value`] using [`Formats::defaults`].
pub fn to_json<T: 'static>(from: &T) -> Result<Value, SerializationError> {
    SerializationContext::new(Formats::defaults()).to_json(from)
}
