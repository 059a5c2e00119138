//! The parse index: a compact linear token array over JSON source text.
//!
//! A single left-to-right scan produces one node per JSON token.  Each
//! node occupies one to three 64-bit code words: the first word packs the
//! byte offset of the token (high 56 bits) over the node-type tag (low 8
//! bits), and trailing words carry the token length, the matching-close
//! index plus element count for container openers, or an error code.
//! Storing the close index on every opener makes structure skips O(1) per
//! token, and storing only offsets keeps the whole index at a few words
//! per token with no per-token allocation.
//!
//! The builder never aborts the scan on bad input: it records the first
//! error, appends an error node at the offending offset, and stops there,
//! so a failed parse still yields an index that can be inspected and
//! reported on.  `validate` turns that recorded error into a `ParseError`.
//!
//! String and number nodes only delimit their tokens.  Escape translation
//! and numeric conversion are deferred until a caller asks, which keeps
//! indexing allocation-free and lets callers pick integer width.

use std::borrow::Cow;
use std::fmt;

use log::trace;

use crate::constants::{MAX_STRUCTURE_DEPTH, MIN_CODE_CAPACITY};
use crate::errors::{AstError, DecodeError, NumberError, ParseError, Problem};
use crate::errors::ExtractionError;
use crate::extract::{DuplicateKeyAction, ExtractOptions, FailureMode};
use crate::path::{Path, PathElement};
use crate::reader::Reader;
use crate::scan::{match_number, match_string};
use crate::strings::decode_string;
use crate::value::{Object, Value};

// ── Node types ───────────────────────────────────────────────

/// Tag of one entry in a parse index.
///
/// A *canonical* string or key is one whose wire form is already the
/// decoded UTF-8 text (no escapes); an *escaped* one needs a decode pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum AstNodeType {
    DocumentEnd = 0,
    DocumentStart = 1,
    ObjectBegin = 2,
    ObjectEnd = 3,
    ArrayBegin = 4,
    ArrayEnd = 5,
    StringCanonical = 6,
    StringEscaped = 7,
    KeyCanonical = 8,
    KeyEscaped = 9,
    LiteralTrue = 10,
    LiteralFalse = 11,
    LiteralNull = 12,
    Integer = 13,
    Decimal = 14,
    Error = 15,
}

impl AstNodeType {
    fn from_word(word: u64) -> AstNodeType {
        match word & 0xff {
            0 => AstNodeType::DocumentEnd,
            1 => AstNodeType::DocumentStart,
            2 => AstNodeType::ObjectBegin,
            3 => AstNodeType::ObjectEnd,
            4 => AstNodeType::ArrayBegin,
            5 => AstNodeType::ArrayEnd,
            6 => AstNodeType::StringCanonical,
            7 => AstNodeType::StringEscaped,
            8 => AstNodeType::KeyCanonical,
            9 => AstNodeType::KeyEscaped,
            10 => AstNodeType::LiteralTrue,
            11 => AstNodeType::LiteralFalse,
            12 => AstNodeType::LiteralNull,
            13 => AstNodeType::Integer,
            14 => AstNodeType::Decimal,
            _ => AstNodeType::Error,
        }
    }

    /// Number of code words a node of this type occupies.
    pub fn code_size(self) -> usize {
        match self {
            AstNodeType::DocumentStart
            | AstNodeType::ObjectBegin
            | AstNodeType::ArrayBegin => 3,
            AstNodeType::StringCanonical
            | AstNodeType::StringEscaped
            | AstNodeType::KeyCanonical
            | AstNodeType::KeyEscaped
            | AstNodeType::Integer
            | AstNodeType::Decimal
            | AstNodeType::Error => 2,
            AstNodeType::DocumentEnd
            | AstNodeType::ObjectEnd
            | AstNodeType::ArrayEnd
            | AstNodeType::LiteralTrue
            | AstNodeType::LiteralFalse
            | AstNodeType::LiteralNull => 1,
        }
    }

    /// Single-character form used by the index signature string.
    pub fn signature_char(self) -> char {
        match self {
            AstNodeType::DocumentEnd => '$',
            AstNodeType::DocumentStart => '^',
            AstNodeType::ObjectBegin => '{',
            AstNodeType::ObjectEnd => '}',
            AstNodeType::ArrayBegin => '[',
            AstNodeType::ArrayEnd => ']',
            AstNodeType::StringCanonical => 's',
            AstNodeType::StringEscaped => 'S',
            AstNodeType::KeyCanonical => 'k',
            AstNodeType::KeyEscaped => 'K',
            AstNodeType::LiteralTrue => 't',
            AstNodeType::LiteralFalse => 'f',
            AstNodeType::LiteralNull => 'n',
            AstNodeType::Integer => 'i',
            AstNodeType::Decimal => 'd',
            AstNodeType::Error => '!',
        }
    }
}

impl fmt::Display for AstNodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AstNodeType::DocumentEnd => "document_end",
            AstNodeType::DocumentStart => "document_start",
            AstNodeType::ObjectBegin => "object_begin",
            AstNodeType::ObjectEnd => "object_end",
            AstNodeType::ArrayBegin => "array_begin",
            AstNodeType::ArrayEnd => "array_end",
            AstNodeType::StringCanonical => "string_canonical",
            AstNodeType::StringEscaped => "string_escaped",
            AstNodeType::KeyCanonical => "key_canonical",
            AstNodeType::KeyEscaped => "key_escaped",
            AstNodeType::LiteralTrue => "literal_true",
            AstNodeType::LiteralFalse => "literal_false",
            AstNodeType::LiteralNull => "literal_null",
            AstNodeType::Integer => "integer",
            AstNodeType::Decimal => "decimal",
            AstNodeType::Error => "error",
        };
        write!(f, "{name}")
    }
}

// ── Nodes ────────────────────────────────────────────────────

/// One materialized entry of a parse index.
///
/// String, key, and number nodes borrow their raw token text (quotes
/// included for strings) from the source buffer.  Container openers carry
/// the word index of their matching closer, so a consumer holding a word
/// position can hop over a whole structure in one step.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AstNode<'i> {
    DocumentStart,
    DocumentEnd,
    ObjectBegin { close_index: usize, elements: usize },
    ObjectEnd,
    ArrayBegin { close_index: usize, elements: usize },
    ArrayEnd,
    String { token: &'i str, escaped: bool },
    Key { token: &'i str, escaped: bool },
    LiteralTrue,
    LiteralFalse,
    LiteralNull,
    Integer { token: &'i str },
    Decimal { token: &'i str },
    Error { code: AstError },
}

impl<'i> AstNode<'i> {
    pub fn node_type(&self) -> AstNodeType {
        match self {
            AstNode::DocumentStart => AstNodeType::DocumentStart,
            AstNode::DocumentEnd => AstNodeType::DocumentEnd,
            AstNode::ObjectBegin { .. } => AstNodeType::ObjectBegin,
            AstNode::ObjectEnd => AstNodeType::ObjectEnd,
            AstNode::ArrayBegin { .. } => AstNodeType::ArrayBegin,
            AstNode::ArrayEnd => AstNodeType::ArrayEnd,
            AstNode::String { escaped: false, .. } => AstNodeType::StringCanonical,
            AstNode::String { escaped: true, .. } => AstNodeType::StringEscaped,
            AstNode::Key { escaped: false, .. } => AstNodeType::KeyCanonical,
            AstNode::Key { escaped: true, .. } => AstNodeType::KeyEscaped,
            AstNode::LiteralTrue => AstNodeType::LiteralTrue,
            AstNode::LiteralFalse => AstNodeType::LiteralFalse,
            AstNode::LiteralNull => AstNodeType::LiteralNull,
            AstNode::Integer { .. } => AstNodeType::Integer,
            AstNode::Decimal { .. } => AstNodeType::Decimal,
            AstNode::Error { .. } => AstNodeType::Error,
        }
    }

    /// The raw token text for string, key, and number nodes.
    pub fn token(&self) -> Option<&'i str> {
        match self {
            AstNode::String { token, .. }
            | AstNode::Key { token, .. }
            | AstNode::Integer { token }
            | AstNode::Decimal { token } => Some(token),
            _ => None,
        }
    }
}

/// The decoded text of a string or key token (quotes included on input).
///
/// Canonical tokens borrow from the source; escaped tokens allocate.
pub fn decode_string_token(token: &str, escaped: bool) -> Result<Cow<'_, str>, DecodeError> {
    let inner = &token[1..token.len() - 1];
    if escaped {
        Ok(Cow::Owned(decode_string(inner)?))
    } else {
        Ok(Cow::Borrowed(inner))
    }
}

/// Convert an integer token to `i64`.
///
/// Tokens in `[2^63, 2^64)` convert through `u64` and keep their bit
/// pattern.  Anything longer wraps: the index does not range-check
/// numbers, so callers who care must inspect the token themselves.
pub fn parse_integer_token(token: &str) -> Result<i64, NumberError> {
    if let Ok(value) = token.parse::<i64>() {
        return Ok(value);
    }
    if let Ok(value) = token.parse::<u64>() {
        return Ok(value as i64);
    }

    let bytes = token.as_bytes();
    let (negative, digits) = match bytes.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, bytes),
    };
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return Err(NumberError::Malformed {
            token: token.to_owned(),
        });
    }
    let mut accumulated = 0i64;
    for &digit in digits {
        accumulated = accumulated
            .wrapping_mul(10)
            .wrapping_add(i64::from(digit - b'0'));
    }
    Ok(if negative {
        accumulated.wrapping_neg()
    } else {
        accumulated
    })
}

/// Convert an integer token to `u64`.  Negative tokens do not fit.
pub fn parse_unsigned_token(token: &str) -> Result<u64, NumberError> {
    token.parse::<u64>().map_err(|_| NumberError::Overflow {
        token: token.to_owned(),
    })
}

/// Convert a number token to `f64`.  Magnitudes beyond the double range
/// become infinities, as the standard library's parser defines.
pub fn parse_decimal_token(token: &str) -> Result<f64, NumberError> {
    token.parse::<f64>().map_err(|_| NumberError::Malformed {
        token: token.to_owned(),
    })
}

// ── Code word layout ─────────────────────────────────────────

const TAG_BITS: u32 = 8;

fn encode_word(node_type: AstNodeType, offset: usize) -> u64 {
    ((offset as u64) << TAG_BITS) | node_type as u64
}

pub(crate) fn word_offset(word: u64) -> usize {
    (word >> TAG_BITS) as usize
}

pub(crate) fn word_type(word: u64) -> AstNodeType {
    AstNodeType::from_word(word)
}

/// Materialize the node whose first code word sits at `at`.
pub(crate) fn decode_node<'i>(source: &'i str, codes: &[u64], at: usize) -> Option<AstNode<'i>> {
    let word = *codes.get(at)?;
    let node_type = word_type(word);
    let offset = word_offset(word);

    let token = |length_at: usize| -> Option<&'i str> {
        let length = *codes.get(length_at)? as usize;
        source.get(offset..offset + length)
    };

    Some(match node_type {
        AstNodeType::DocumentStart => AstNode::DocumentStart,
        AstNodeType::DocumentEnd => AstNode::DocumentEnd,
        AstNodeType::ObjectBegin => AstNode::ObjectBegin {
            close_index: *codes.get(at + 1)? as usize,
            elements: *codes.get(at + 2)? as usize,
        },
        AstNodeType::ObjectEnd => AstNode::ObjectEnd,
        AstNodeType::ArrayBegin => AstNode::ArrayBegin {
            close_index: *codes.get(at + 1)? as usize,
            elements: *codes.get(at + 2)? as usize,
        },
        AstNodeType::ArrayEnd => AstNode::ArrayEnd,
        AstNodeType::StringCanonical => AstNode::String {
            token: token(at + 1)?,
            escaped: false,
        },
        AstNodeType::StringEscaped => AstNode::String {
            token: token(at + 1)?,
            escaped: true,
        },
        AstNodeType::KeyCanonical => AstNode::Key {
            token: token(at + 1)?,
            escaped: false,
        },
        AstNodeType::KeyEscaped => AstNode::Key {
            token: token(at + 1)?,
            escaped: true,
        },
        AstNodeType::LiteralTrue => AstNode::LiteralTrue,
        AstNodeType::LiteralFalse => AstNode::LiteralFalse,
        AstNodeType::LiteralNull => AstNode::LiteralNull,
        AstNodeType::Integer => AstNode::Integer { token: token(at + 1)? },
        AstNodeType::Decimal => AstNode::Decimal { token: token(at + 1)? },
        AstNodeType::Error => AstNode::Error {
            code: AstError::from_code(*codes.get(at + 1)?),
        },
    })
}

// ── Parse options ────────────────────────────────────────────

/// How string contents are validated during the scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StringEncoding {
    /// Any well-formed UTF-8.
    #[default]
    Utf8,
    /// Well-formed UTF-8 with no unprintable ASCII inside strings: raw
    /// tab and newline bytes are rejected where `Utf8` lets them pass.
    Utf8Strict,
}

/// Configuration for building a parse index.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    string_encoding: StringEncoding,
    max_structure_depth: Option<usize>,
    require_document: bool,
    complete_parse: bool,
    comments: bool,
}

impl Default for ParseOptions {
    fn default() -> ParseOptions {
        ParseOptions {
            string_encoding: StringEncoding::Utf8,
            max_structure_depth: None,
            require_document: false,
            complete_parse: true,
            comments: true,
        }
    }
}

impl ParseOptions {
    pub fn new() -> ParseOptions {
        ParseOptions::default()
    }

    /// Options that fail on anything other than a plain, standalone JSON
    /// document: strict strings, shallow nesting, a container root, no
    /// trailing input, no comments.
    pub fn strict() -> ParseOptions {
        ParseOptions {
            string_encoding: StringEncoding::Utf8Strict,
            max_structure_depth: Some(20),
            require_document: true,
            complete_parse: true,
            comments: false,
        }
    }

    pub fn string_encoding(&self) -> StringEncoding {
        self.string_encoding
    }

    pub fn with_string_encoding(mut self, encoding: StringEncoding) -> ParseOptions {
        self.string_encoding = encoding;
        self
    }

    /// The structural nesting limit.  `None` means the hard cap of
    /// [`MAX_STRUCTURE_DEPTH`]; explicit values above the cap are clamped
    /// to it.
    pub fn max_structure_depth(&self) -> Option<usize> {
        self.max_structure_depth
    }

    pub fn with_max_structure_depth(mut self, depth: Option<usize>) -> ParseOptions {
        self.max_structure_depth = depth;
        self
    }

    /// Whether the root value must be an object or an array.
    pub fn require_document(&self) -> bool {
        self.require_document
    }

    pub fn with_require_document(mut self, required: bool) -> ParseOptions {
        self.require_document = required;
        self
    }

    /// Whether non-whitespace input after the first document is an error.
    /// Turning this off makes the scan stop cleanly after one document,
    /// which suits pulling several documents out of one buffer.
    pub fn complete_parse(&self) -> bool {
        self.complete_parse
    }

    pub fn with_complete_parse(mut self, complete: bool) -> ParseOptions {
        self.complete_parse = complete;
        self
    }

    /// Whether `/* ... */` blocks are treated as whitespace.
    pub fn comments(&self) -> bool {
        self.comments
    }

    pub fn with_comments(mut self, comments: bool) -> ParseOptions {
        self.comments = comments;
        self
    }

    fn effective_depth(&self) -> usize {
        self.max_structure_depth
            .unwrap_or(MAX_STRUCTURE_DEPTH)
            .min(MAX_STRUCTURE_DEPTH)
    }
}

// ── The index ────────────────────────────────────────────────

/// An immutable token index over JSON source text.
///
/// The source parameter is either borrowed (`ParseIndex<&str>`) or owned
/// (`ParseIndex<String>`); the borrowed form adds nothing to the source's
/// lifetime, the owning form carries the text with the index.
#[derive(Debug, Clone)]
pub struct ParseIndex<S: AsRef<str>> {
    source: S,
    codes: Vec<u64>,
    first_error: Option<(AstError, usize)>,
}

impl<S: AsRef<str>> ParseIndex<S> {
    /// Build an index with default options.  Always returns an index; a
    /// failed scan returns one carrying its first error.
    pub fn parse(source: S) -> ParseIndex<S> {
        ParseIndex::parse_with(source, &ParseOptions::default())
    }

    /// Build an index with explicit options.
    pub fn parse_with(source: S, options: &ParseOptions) -> ParseIndex<S> {
        let (codes, first_error) = Builder::new(source.as_ref(), options).run();
        ParseIndex {
            source,
            codes,
            first_error,
        }
    }

    pub fn source(&self) -> &str {
        self.source.as_ref()
    }

    pub(crate) fn codes(&self) -> &[u64] {
        &self.codes
    }

    /// Whether the scan completed without recording an error.
    pub fn success(&self) -> bool {
        self.first_error.is_none()
    }

    /// The first error the scan recorded, if any.
    pub fn first_error(&self) -> Option<ParseError> {
        self.first_error
            .map(|(kind, offset)| ParseError::new(kind, offset))
    }

    /// Fail with the recorded error, if there is one.
    pub fn validate(&self) -> Result<(), ParseError> {
        match self.first_error() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// A pull cursor positioned at the start of the index.
    pub fn reader(&self) -> Reader<'_> {
        Reader::over(self.source.as_ref(), &self.codes)
    }

    /// Materialize the node whose first code word sits at `at`, if that
    /// is a node boundary.
    pub fn node_at(&self, at: usize) -> Option<AstNode<'_>> {
        decode_node(self.source.as_ref(), &self.codes, at)
    }

    /// Iterate the index's nodes in order.
    pub fn nodes(&self) -> Nodes<'_> {
        Nodes {
            source: self.source.as_ref(),
            codes: &self.codes,
            at: 0,
        }
    }

    /// Release the code buffer, keeping only the source.
    pub fn reset(&mut self) {
        self.codes = Vec::new();
        self.first_error = None;
    }

    /// Walk the whole index into a [`Value`] tree.
    ///
    /// Array nodes pre-reserve their recorded element counts.  Duplicate
    /// object keys are resolved by `options.on_duplicate_key`; with the
    /// error action, the failure mode decides whether the first duplicate
    /// aborts or all of them are reported together.
    pub fn extract_tree(&self, options: &ExtractOptions) -> Result<Value, ExtractionError> {
        let mut walker = TreeWalker {
            source: self.source.as_ref(),
            codes: &self.codes,
            at: 0,
            failure_mode: options.failure_mode(),
            max_failures: options.max_failures(),
            on_duplicate_key: options.on_duplicate_key(),
            path: Vec::new(),
            problems: Vec::new(),
        };
        let value = walker.document()?;
        if walker.problems.is_empty() {
            Ok(value)
        } else {
            Err(ExtractionError::new(walker.problems))
        }
    }
}

/// The node-signature string: one character per node.  `{"a":[1]}` is
/// `^{k[i]}$`; an index truncated by an error ends at its `!`.
impl<S: AsRef<str>> fmt::Display for ParseIndex<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for node in self.nodes() {
            write!(f, "{}", node.node_type().signature_char())?;
        }
        Ok(())
    }
}

/// Iterator over the nodes of a [`ParseIndex`].
pub struct Nodes<'i> {
    source: &'i str,
    codes: &'i [u64],
    at: usize,
}

impl<'i> Iterator for Nodes<'i> {
    type Item = AstNode<'i>;

    fn next(&mut self) -> Option<AstNode<'i>> {
        let node = decode_node(self.source, self.codes, self.at)?;
        self.at += node.node_type().code_size();
        Some(node)
    }
}

// ── Builder ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ContainerState {
    /// An item just finished; a delimiter or close may follow.
    ItemFinished,
    /// Just entered a container; an item or an immediate close may follow.
    Opened,
    /// Just consumed a `,`; an item must follow.
    NeedsItem,
    /// Not inside any container and no item seen yet.
    None,
}

struct Frame {
    open_index: usize,
    item_count: u64,
    open_token: AstNodeType,
}

/// Unwinds the scan after an error node has been recorded.
struct Stop;

struct Builder<'s> {
    bytes: &'s [u8],
    codes: Vec<u64>,
    first_error: Option<(AstError, usize)>,
    pos: usize,
    frames: Vec<Frame>,
    state: ContainerState,
    container: Option<AstNodeType>,
    root_done: bool,
    strict_strings: bool,
    comments: bool,
    complete: bool,
    require_document: bool,
    max_depth: usize,
}

impl<'s> Builder<'s> {
    fn new(source: &'s str, options: &ParseOptions) -> Builder<'s> {
        let capacity = (source.len() / 16).max(MIN_CODE_CAPACITY);
        Builder {
            bytes: source.as_bytes(),
            codes: Vec::with_capacity(capacity),
            first_error: None,
            pos: 0,
            frames: Vec::with_capacity(options.effective_depth() + 1),
            state: ContainerState::None,
            container: None,
            root_done: false,
            strict_strings: options.string_encoding() == StringEncoding::Utf8Strict,
            comments: options.comments(),
            complete: options.complete_parse(),
            require_document: options.require_document(),
            max_depth: options.effective_depth(),
        }
    }

    fn run(mut self) -> (Vec<u64>, Option<(AstError, usize)>) {
        let _ = self.scan();
        (self.codes, self.first_error)
    }

    /// Append a node: the tagged offset word plus `extra` payload words,
    /// which the caller fills in.  Returns the node's word index.
    fn push_node(&mut self, node_type: AstNodeType, offset: usize, extra: usize) -> usize {
        let index = self.codes.len();
        self.codes.reserve(extra + 1);
        self.codes.push(encode_word(node_type, offset));
        for _ in 0..extra {
            self.codes.push(0);
        }
        index
    }

    fn error(&mut self, code: AstError, offset: usize) -> Stop {
        trace!("recording parse error {code:?} at offset {offset}");
        let index = self.push_node(AstNodeType::Error, offset, 1);
        self.codes[index + 1] = code.code();
        if self.first_error.is_none() {
            self.first_error = Some((code, offset));
        }
        Stop
    }

    fn scan(&mut self) -> Result<(), Stop> {
        let start_index = self.push_node(AstNodeType::DocumentStart, 0, 2);
        self.frames.push(Frame {
            open_index: start_index,
            item_count: 0,
            open_token: AstNodeType::DocumentStart,
        });

        while self.pos < self.bytes.len() {
            if self.root_done {
                if !self.complete {
                    break;
                }
                // Only whitespace and comments may follow the document.
                match self.bytes[self.pos] {
                    b' ' | b'\t' | b'\n' | b'\r' => {
                        self.skip_whitespace();
                        continue;
                    }
                    b'/' if self.comments => {
                        self.comment()?;
                        continue;
                    }
                    _ => return Err(self.error(AstError::ExpectedEof, self.pos)),
                }
            }

            match self.bytes[self.pos] {
                b' ' | b'\t' | b'\n' | b'\r' => self.skip_whitespace(),
                b't' => self.literal(b"true", AstNodeType::LiteralTrue)?,
                b'f' => self.literal(b"false", AstNodeType::LiteralFalse)?,
                b'n' => self.literal(b"null", AstNodeType::LiteralNull)?,
                b'[' => self.open(AstNodeType::ArrayBegin)?,
                b']' => self.close(AstNodeType::ArrayEnd, AstNodeType::ArrayBegin)?,
                b'{' => {
                    self.open(AstNodeType::ObjectBegin)?;
                    self.consume_key()?;
                }
                b'}' => self.close(AstNodeType::ObjectEnd, AstNodeType::ObjectBegin)?,
                b',' => self.comma()?,
                b'"' => {
                    self.begin_value(self.pos, false)?;
                    self.string_node(AstNodeType::StringCanonical, AstNodeType::StringEscaped)?;
                    self.item_finished();
                }
                b'0'..=b'9' | b'-' => self.number()?,
                b'/' if self.comments => self.comment()?,
                _ => return Err(self.error(AstError::UnexpectedToken, self.pos)),
            }
        }

        self.finish()
    }

    /// Grammar checks shared by every value position.
    fn begin_value(&mut self, offset: usize, is_container: bool) -> Result<(), Stop> {
        if self.frames.len() == 1 {
            if self.require_document && !is_container {
                return Err(self.error(AstError::ExpectedDocument, offset));
            }
        } else if self.state == ContainerState::ItemFinished {
            // Two items with no delimiter between them.
            return Err(self.error(AstError::UnexpectedToken, offset));
        }
        Ok(())
    }

    fn item_finished(&mut self) {
        self.state = ContainerState::ItemFinished;
        if self.frames.len() == 1 {
            self.root_done = true;
        }
    }

    fn literal(&mut self, expected: &'static [u8], node_type: AstNodeType) -> Result<(), Stop> {
        let offset = self.pos;
        self.begin_value(offset, false)?;
        if offset + expected.len() > self.bytes.len() {
            return Err(self.error(AstError::Eof, offset));
        }
        if &self.bytes[offset..offset + expected.len()] != expected {
            return Err(self.error(AstError::InvalidLiteral, offset));
        }
        self.push_node(node_type, offset, 0);
        self.pos += expected.len();
        self.item_finished();
        Ok(())
    }

    fn number(&mut self) -> Result<(), Stop> {
        let offset = self.pos;
        self.begin_value(offset, false)?;
        let matched = match_number(&self.bytes[offset..]);
        if !matched.matched {
            return Err(self.error(AstError::InvalidNumber, offset));
        }
        let node_type = if matched.decimal {
            AstNodeType::Decimal
        } else {
            AstNodeType::Integer
        };
        let index = self.push_node(node_type, offset, 1);
        self.codes[index + 1] = matched.length as u64;
        self.pos += matched.length;
        self.item_finished();
        Ok(())
    }

    fn string_node(
        &mut self,
        canonical: AstNodeType,
        escaped: AstNodeType,
    ) -> Result<(), Stop> {
        let offset = self.pos;
        let matched = match_string(&self.bytes[offset..], self.strict_strings);
        if !matched.matched {
            let code = if offset + matched.length >= self.bytes.len() {
                AstError::Eof
            } else {
                AstError::InvalidString
            };
            return Err(self.error(code, offset));
        }
        let node_type = if matched.needs_unescape {
            escaped
        } else {
            canonical
        };
        let index = self.push_node(node_type, offset, 1);
        self.codes[index + 1] = matched.length as u64;
        self.pos += matched.length;
        Ok(())
    }

    fn open(&mut self, node_type: AstNodeType) -> Result<(), Stop> {
        let offset = self.pos;
        self.begin_value(offset, true)?;
        // Container depth excludes the document frame.
        if self.frames.len() > self.max_depth {
            return Err(self.error(AstError::DepthExceeded, offset));
        }
        let index = self.push_node(node_type, offset, 2);
        self.frames.push(Frame {
            open_index: index,
            item_count: 0,
            open_token: node_type,
        });
        self.container = Some(node_type);
        self.state = ContainerState::Opened;
        self.pos += 1;
        Ok(())
    }

    fn close(&mut self, closer: AstNodeType, expected_open: AstNodeType) -> Result<(), Stop> {
        let offset = self.pos;
        if self.state == ContainerState::NeedsItem {
            return Err(self.error(AstError::CloseAfterComma, offset));
        }
        if self.frames.len() <= 1 {
            return Err(self.error(AstError::ExtraClose, offset));
        }

        let closer_index = self.push_node(closer, offset, 0);
        let mut frame = match self.frames.pop() {
            Some(frame) => frame,
            None => return Err(self.error(AstError::Internal, offset)),
        };
        // Commas undercount by one: the final item has no trailing comma.
        // The state check keeps empty containers at zero.
        if self.state == ContainerState::ItemFinished {
            frame.item_count += 1;
        }
        if frame.open_token != expected_open {
            return Err(self.error(AstError::MismatchedClose, offset));
        }
        self.codes[frame.open_index + 1] = closer_index as u64;
        self.codes[frame.open_index + 2] = frame.item_count;

        self.container = match self.frames.last() {
            Some(outer) if outer.open_token != AstNodeType::DocumentStart => {
                Some(outer.open_token)
            }
            _ => None,
        };
        self.pos += 1;
        self.item_finished();
        Ok(())
    }

    fn comma(&mut self) -> Result<(), Stop> {
        let offset = self.pos;
        if self.state != ContainerState::ItemFinished || self.frames.len() <= 1 {
            return Err(self.error(AstError::UnexpectedComma, offset));
        }
        self.pos += 1;
        match self.frames.last_mut() {
            Some(frame) => frame.item_count += 1,
            None => return Err(self.error(AstError::Internal, offset)),
        }
        if self.container == Some(AstNodeType::ObjectBegin) {
            self.consume_key()?;
        }
        self.state = ContainerState::NeedsItem;
        Ok(())
    }

    /// After `{` or an object's `,`: consume a key and its `:`, or leave a
    /// `}` in place for the main loop.
    fn consume_key(&mut self) -> Result<(), Stop> {
        self.skip_whitespace_and_comments()?;
        if self.pos >= self.bytes.len() {
            return Err(self.error(AstError::Eof, self.pos));
        }
        if self.bytes[self.pos] == b'}' {
            return Ok(());
        }
        if self.bytes[self.pos] != b'"' {
            return Err(self.error(AstError::ExpectedString, self.pos));
        }
        self.string_node(AstNodeType::KeyCanonical, AstNodeType::KeyEscaped)?;

        self.skip_whitespace_and_comments()?;
        if self.pos >= self.bytes.len() {
            return Err(self.error(AstError::Eof, self.pos));
        }
        if self.bytes[self.pos] != b':' {
            return Err(self.error(AstError::ExpectedKeyDelimiter, self.pos));
        }
        self.pos += 1;
        Ok(())
    }

    fn skip_whitespace(&mut self) {
        while self.pos < self.bytes.len()
            && matches!(self.bytes[self.pos], b' ' | b'\t' | b'\n' | b'\r')
        {
            self.pos += 1;
        }
    }

    fn skip_whitespace_and_comments(&mut self) -> Result<(), Stop> {
        loop {
            self.skip_whitespace();
            if self.comments && self.pos < self.bytes.len() && self.bytes[self.pos] == b'/' {
                self.comment()?;
            } else {
                return Ok(());
            }
        }
    }

    fn comment(&mut self) -> Result<(), Stop> {
        let offset = self.pos;
        if offset + 1 >= self.bytes.len() || self.bytes[offset + 1] != b'*' {
            return Err(self.error(AstError::InvalidComment, offset));
        }
        let mut at = offset + 2;
        while at + 1 < self.bytes.len() {
            if self.bytes[at] == b'*' && self.bytes[at + 1] == b'/' {
                self.pos = at + 2;
                return Ok(());
            }
            at += 1;
        }
        Err(self.error(AstError::InvalidComment, offset))
    }

    fn finish(&mut self) -> Result<(), Stop> {
        if self.frames.len() > 1 {
            return Err(self.error(AstError::Eof, self.pos));
        }
        let closer_index = self.push_node(AstNodeType::DocumentEnd, self.pos, 0);
        let mut frame = match self.frames.pop() {
            Some(frame) => frame,
            None => return Err(self.error(AstError::Internal, self.pos)),
        };
        if self.state == ContainerState::ItemFinished {
            frame.item_count += 1;
        }
        self.codes[frame.open_index + 1] = closer_index as u64;
        self.codes[frame.open_index + 2] = frame.item_count;
        Ok(())
    }
}

// ── Tree extraction ──────────────────────────────────────────

struct TreeWalker<'i> {
    source: &'i str,
    codes: &'i [u64],
    at: usize,
    failure_mode: FailureMode,
    max_failures: usize,
    on_duplicate_key: DuplicateKeyAction,
    path: Vec<PathElement>,
    problems: Vec<Problem>,
}

impl<'i> TreeWalker<'i> {
    fn node(&self) -> Option<AstNode<'i>> {
        decode_node(self.source, self.codes, self.at)
    }

    fn offset(&self) -> usize {
        self.codes
            .get(self.at)
            .map(|word| word_offset(*word))
            .unwrap_or(self.source.len())
    }

    fn advance(&mut self) {
        if let Some(word) = self.codes.get(self.at) {
            self.at += word_type(*word).code_size();
        }
    }

    fn here(&self) -> Path {
        self.path.iter().cloned().collect()
    }

    fn hard_fail(&mut self, problem: Problem) -> ExtractionError {
        let mut problems = std::mem::take(&mut self.problems);
        problems.push(problem);
        ExtractionError::new(problems)
    }

    /// Record a recoverable problem.  Immediate mode fails at once;
    /// collect mode keeps going until the failure budget is spent.
    fn soft_fail(&mut self, problem: Problem) -> Result<(), ExtractionError> {
        match self.failure_mode {
            FailureMode::FailImmediately => Err(self.hard_fail(problem)),
            FailureMode::CollectAll => {
                self.problems.push(problem);
                if self.problems.len() >= self.max_failures {
                    Err(ExtractionError::new(std::mem::take(&mut self.problems)))
                } else {
                    Ok(())
                }
            }
        }
    }

    fn document(&mut self) -> Result<Value, ExtractionError> {
        match self.node() {
            Some(AstNode::DocumentStart) => self.advance(),
            _ => {
                let problem =
                    Problem::new(Path::root(), "index does not start with document_start");
                return Err(self.hard_fail(problem));
            }
        }

        match self.node() {
            None => {
                let problem = Problem::new(Path::root(), "index is truncated");
                Err(self.hard_fail(problem))
            }
            Some(AstNode::DocumentEnd) => {
                let problem = Problem::new(Path::root(), "no value in document");
                Err(self.hard_fail(problem))
            }
            Some(_) => {
                let value = self.value()?;
                match self.node() {
                    Some(AstNode::DocumentEnd) => Ok(value),
                    Some(node) => {
                        let problem = Problem::new(
                            Path::root(),
                            format!(
                                "index does not end with document_end (found {})",
                                node.node_type()
                            ),
                        );
                        Err(self.hard_fail(problem))
                    }
                    None => {
                        let problem = Problem::new(Path::root(), "index is truncated");
                        Err(self.hard_fail(problem))
                    }
                }
            }
        }
    }

    fn value(&mut self) -> Result<Value, ExtractionError> {
        let node = match self.node() {
            Some(node) => node,
            None => {
                let problem = Problem::new(self.here(), "index is truncated");
                return Err(self.hard_fail(problem));
            }
        };

        let value = match node {
            AstNode::LiteralNull => {
                self.advance();
                Value::Null
            }
            AstNode::LiteralTrue => {
                self.advance();
                Value::Boolean(true)
            }
            AstNode::LiteralFalse => {
                self.advance();
                Value::Boolean(false)
            }
            AstNode::Integer { token } => {
                let value = match parse_integer_token(token) {
                    Ok(value) => Value::Integer(value),
                    Err(cause) => {
                        self.soft_fail(Problem::from_cause(self.here(), cause))?;
                        Value::Null
                    }
                };
                self.advance();
                value
            }
            AstNode::Decimal { token } => {
                let value = match parse_decimal_token(token) {
                    Ok(value) => Value::Decimal(value),
                    Err(cause) => {
                        self.soft_fail(Problem::from_cause(self.here(), cause))?;
                        Value::Null
                    }
                };
                self.advance();
                value
            }
            AstNode::String { token, escaped } => {
                let value = match decode_string_token(token, escaped) {
                    Ok(text) => Value::String(text.into_owned()),
                    Err(cause) => {
                        self.soft_fail(Problem::from_cause(self.here(), cause))?;
                        Value::Null
                    }
                };
                self.advance();
                value
            }
            AstNode::ObjectBegin { .. } => self.object()?,
            AstNode::ArrayBegin { elements, .. } => self.array(elements)?,
            AstNode::Error { code } => {
                let cause = ParseError::new(code, self.offset());
                let problem = Problem::from_cause(self.here(), cause);
                return Err(self.hard_fail(problem));
            }
            other => {
                let problem = Problem::new(
                    self.here(),
                    format!("unexpected {} node in value position", other.node_type()),
                );
                return Err(self.hard_fail(problem));
            }
        };
        Ok(value)
    }

    fn object(&mut self) -> Result<Value, ExtractionError> {
        self.advance();
        let mut members = Object::new();

        loop {
            match self.node() {
                None => {
                    let problem = Problem::new(self.here(), "object is not closed in the index");
                    return Err(self.hard_fail(problem));
                }
                Some(AstNode::ObjectEnd) => {
                    self.advance();
                    return Ok(Value::Object(members));
                }
                Some(AstNode::Key { token, escaped }) => {
                    let key = match decode_string_token(token, escaped) {
                        Ok(key) => key.into_owned(),
                        Err(cause) => {
                            let problem = Problem::from_cause(self.here(), cause);
                            return Err(self.hard_fail(problem));
                        }
                    };
                    self.advance();

                    self.path.push(PathElement::Key(key.clone()));
                    let value = self.value()?;
                    let member_path = self.here();
                    self.path.pop();

                    if members.contains_key(&key) {
                        match self.on_duplicate_key {
                            DuplicateKeyAction::Replace => {
                                members.insert(key, value);
                            }
                            DuplicateKeyAction::Ignore => {}
                            DuplicateKeyAction::Error => {
                                self.soft_fail(Problem::new(
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
                Some(AstNode::Error { code }) => {
                    let cause = ParseError::new(code, self.offset());
                    let problem = Problem::from_cause(self.here(), cause);
                    return Err(self.hard_fail(problem));
                }
                Some(other) => {
                    let problem = Problem::new(
                        self.here(),
                        format!("expected a key in object, found {}", other.node_type()),
                    );
                    return Err(self.hard_fail(problem));
                }
            }
        }
    }

    fn array(&mut self, elements: usize) -> Result<Value, ExtractionError> {
        self.advance();
        let mut out = Vec::with_capacity(elements);
        let mut index = 0usize;

        loop {
            match self.node() {
                None => {
                    let problem = Problem::new(self.here(), "array is not closed in the index");
                    return Err(self.hard_fail(problem));
                }
                Some(AstNode::ArrayEnd) => {
                    self.advance();
                    return Ok(Value::Array(out));
                }
                Some(_) => {
                    self.path.push(PathElement::Index(index));
                    let value = self.value()?;
                    self.path.pop();
                    out.push(value);
                    index += 1;
                }
            }
        }
    }
}
