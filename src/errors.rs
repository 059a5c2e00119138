//! Error types for parsing, decoding, value access, and serialization.
//!
//! Each failure domain gets its own type so callers can match on exactly
//! the failures a call site can produce.  `Error` is the umbrella for the
//! convenience functions in the crate root, which cross domains.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::index::AstNodeType;
use crate::path::Path;
use crate::value::Kind;

// ── Parse errors ─────────────────────────────────────────────

/// Structural error code recorded while building a parse index.
///
/// The numeric representation is stable: error nodes in the index encode
/// the code in a trailing word, so the mapping must round-trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[repr(u8)]
pub enum AstError {
    /// The root value must be an object or an array.
    #[error("expected a document")]
    ExpectedDocument = 1,
    /// An object key position held something other than a string.
    #[error("expected a string")]
    ExpectedString = 2,
    /// An object key was not followed by `:`.
    #[error("expected ':' after object key")]
    ExpectedKeyDelimiter = 3,
    #[error("unexpected token")]
    UnexpectedToken = 4,
    #[error("unexpected ','")]
    UnexpectedComma = 5,
    #[error("unexpected end of input")]
    Eof = 6,
    /// Extra non-whitespace input after the document closed.
    #[error("expected end of input")]
    ExpectedEof = 7,
    #[error("structure nesting too deep")]
    DepthExceeded = 8,
    /// A `}` or `]` with no structure open.
    #[error("close token without matching open")]
    ExtraClose = 9,
    /// A `}` closing a `[` or a `]` closing a `{`.
    #[error("close token does not match opener")]
    MismatchedClose = 10,
    /// A `}` or `]` directly after `,`.
    #[error("close token directly after ','")]
    CloseAfterComma = 11,
    /// A `t`, `f`, or `n` that did not spell `true`, `false`, or `null`.
    #[error("invalid literal")]
    InvalidLiteral = 12,
    #[error("invalid number")]
    InvalidNumber = 13,
    #[error("invalid string")]
    InvalidString = 14,
    #[error("invalid comment")]
    InvalidComment = 15,
    /// A defect in the index builder itself.
    #[error("internal parser defect")]
    Internal = 16,
}

impl AstError {
    pub(crate) fn code(self) -> u64 {
        self as u64
    }

    pub(crate) fn from_code(code: u64) -> AstError {
        match code {
            1 => AstError::ExpectedDocument,
            2 => AstError::ExpectedString,
            3 => AstError::ExpectedKeyDelimiter,
            4 => AstError::UnexpectedToken,
            5 => AstError::UnexpectedComma,
            6 => AstError::Eof,
            7 => AstError::ExpectedEof,
            8 => AstError::DepthExceeded,
            9 => AstError::ExtraClose,
            10 => AstError::MismatchedClose,
            11 => AstError::CloseAfterComma,
            12 => AstError::InvalidLiteral,
            13 => AstError::InvalidNumber,
            14 => AstError::InvalidString,
            15 => AstError::InvalidComment,
            _ => AstError::Internal,
        }
    }
}

/// An error encountered while parsing, carrying the code and the byte
/// offset into the source text where the problem was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("parse error at offset {offset}: {kind}")]
pub struct ParseError {
    pub kind: AstError,
    pub offset: usize,
}

impl ParseError {
    pub fn new(kind: AstError, offset: usize) -> ParseError {
        ParseError { kind, offset }
    }
}

// ── String decode errors ─────────────────────────────────────

/// Failure to translate a JSON wire-form string back into UTF-8 text.
///
/// The offset is relative to the start of the string contents, not the
/// enclosing document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("string decode error at offset {offset}: {message}")]
pub struct DecodeError {
    pub offset: usize,
    pub message: String,
}

impl DecodeError {
    pub fn new(offset: usize, message: impl Into<String>) -> DecodeError {
        DecodeError {
            offset,
            message: message.into(),
        }
    }
}

// ── Value access errors ──────────────────────────────────────

/// A typed accessor was applied to the wrong value variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("expected {expected}, found {actual}")]
pub struct KindError {
    pub expected: &'static str,
    pub actual: Kind,
}

impl KindError {
    pub fn new(expected: &'static str, actual: Kind) -> KindError {
        KindError { expected, actual }
    }
}

/// Failure to traverse a value along a path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    #[error(transparent)]
    Kind(#[from] KindError),
    /// The container existed but had no entry at the path.
    #[error("no value at {path}")]
    OutOfRange { path: Path },
}

// ── Reader misuse ────────────────────────────────────────────

/// Misuse of the pull reader's navigation interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ReaderError {
    #[error("reader has advanced past the end of the index")]
    PastEnd,
    #[error("cannot advance by key from a {0} node")]
    NotAKey(AstNodeType),
}

// ── Deferred number conversion ───────────────────────────────

/// Failure converting a number token into a concrete numeric type.  The
/// index records only token extents, so conversion problems surface when
/// a caller finally asks for a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NumberError {
    #[error("number token {token:?} does not fit in the requested type")]
    Overflow { token: String },
    #[error("malformed number token {token:?}")]
    Malformed { token: String },
}

// ── Path parsing ─────────────────────────────────────────────

/// A path string that does not follow the `.key`, `["key"]`, `[n]` form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed path at offset {offset}: {message}")]
pub struct PathError {
    pub offset: usize,
    pub message: String,
}

impl PathError {
    pub fn new(offset: usize, message: impl Into<String>) -> PathError {
        PathError {
            offset,
            message: message.into(),
        }
    }
}

// ── Extraction problems ──────────────────────────────────────

/// One problem found during extraction: where, what, and (optionally) the
/// underlying error that caused it.
#[derive(Debug, Clone)]
pub struct Problem {
    path: Path,
    message: String,
    cause: Option<Arc<dyn std::error::Error + Send + Sync>>,
}

impl Problem {
    pub fn new(path: Path, message: impl Into<String>) -> Problem {
        let mut message = message.into();
        if message.is_empty() {
            message = String::from("unknown problem");
        }
        Problem {
            path,
            message,
            cause: None,
        }
    }

    /// Create a problem whose message is taken from `cause`.
    pub fn from_cause(
        path: Path,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Problem {
        let message = cause.to_string();
        Problem {
            path,
            message,
            cause: Some(Arc::new(cause)),
        }
    }

    pub fn with_cause(
        mut self,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Problem {
        self.cause = Some(Arc::new(cause));
        self
    }

    /// The path this problem was encountered at.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Human-readable details about the encountered problem.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The underlying error, if one caused this problem.
    pub fn cause(&self) -> Option<&(dyn std::error::Error + Send + Sync)> {
        self.cause.as_deref()
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_root() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "at {}: {}", self.path, self.message)
        }
    }
}

/// Raised when extraction fails.  Carries every problem the collector saw
/// before giving up; there is always at least one.
#[derive(Debug, Clone)]
pub struct ExtractionError {
    problems: Vec<Problem>,
}

impl ExtractionError {
    pub fn new(problems: Vec<Problem>) -> ExtractionError {
        let problems = if problems.is_empty() {
            vec![Problem::new(Path::root(), "unspecified extraction problem")]
        } else {
            problems
        };
        ExtractionError { problems }
    }

    pub fn single(path: Path, message: impl Into<String>) -> ExtractionError {
        ExtractionError::new(vec![Problem::new(path, message)])
    }

    /// The path of the first problem.
    pub fn path(&self) -> &Path {
        self.problems[0].path()
    }

    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub(crate) fn into_problems(self) -> Vec<Problem> {
        self.problems
    }
}

impl From<Problem> for ExtractionError {
    fn from(problem: Problem) -> ExtractionError {
        ExtractionError {
            problems: vec![problem],
        }
    }
}

impl fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.problems.len() == 1 {
            write!(f, "extraction error {}", self.problems[0])
        } else {
            write!(f, "{} extraction errors:", self.problems.len())?;
            for problem in &self.problems {
                write!(f, "\n - {problem}")?;
            }
            Ok(())
        }
    }
}

impl std::error::Error for ExtractionError {}

// ── Registry errors ──────────────────────────────────────────

/// The registry chain had no extractor for the requested type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no extractor registered for type {type_name}")]
pub struct NoExtractor {
    pub type_name: &'static str,
}

/// The registry chain had no serializer for the requested type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("no serializer registered for type {type_name}")]
pub struct NoSerializer {
    pub type_name: &'static str,
}

/// A converter was registered for a type that already has one, and the
/// caller asked for duplicates to be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("already have {operation} for type {type_name}")]
pub struct DuplicateType {
    pub operation: &'static str,
    pub type_name: &'static str,
}

/// Failure to turn a typed value into a JSON value.
#[derive(Debug, Clone, Error)]
pub enum SerializationError {
    #[error(transparent)]
    NoSerializer(#[from] NoSerializer),
    /// A serializer was handed storage for a different type than it was
    /// registered under.
    #[error("serializer for {type_name} received a value of another type")]
    TypeMismatch { type_name: &'static str },
    #[error("{0}")]
    Message(String),
}

// ── Umbrella ─────────────────────────────────────────────────

/// Top-level error for the convenience functions in the crate root, which
/// cross the parse and extraction domains.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
    #[error(transparent)]
    Kind(#[from] KindError),
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Serialization(#[from] SerializationError),
}
