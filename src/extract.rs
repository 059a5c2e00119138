//! Extraction and serialization contexts.
//!
//! An `ExtractionContext` carries everything an extractor needs beyond
//! the reader itself: the registry to dispatch sub-extractions through, a
//! version for gated fields, optional user data, the options, and the
//! problem collector.  Problems carry paths; the context composes its
//! base path with the reader's current path so nested documents report
//! where in the larger extraction they sit.
//!
//! Failure handling is split in two: an extractor reports its own failure
//! by returning an error, and a composite extractor that wants to keep
//! going routes that error through `record`, which either re-raises it
//! (fail-immediately) or files it and lets extraction continue
//! (collect-all) until the failure budget runs out.

use std::any::{Any, TypeId};
use std::sync::Arc;

use log::trace;

use crate::constants::DEFAULT_MAX_FAILURES;
use crate::errors::{ExtractionError, NoExtractor, NoSerializer, Problem, SerializationError};
use crate::formats::{Formats, Version};
use crate::index::{decode_string_token, AstNode, AstNodeType};
use crate::path::{Path, PathElement};
use crate::reader::Reader;
use crate::value::Value;

// ── Options ──────────────────────────────────────────────────

/// What happens when an extractor reports a problem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Fail on the first problem.
    #[default]
    FailImmediately,
    /// Keep extracting, reporting every problem at the end.
    CollectAll,
}

/// What happens when an object key appears more than once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateKeyAction {
    /// The last value for the key wins.
    #[default]
    Replace,
    /// The first value for the key wins.
    Ignore,
    /// Duplicates are reported as problems.
    Error,
}

/// Configuration for extraction.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    failure_mode: FailureMode,
    max_failures: usize,
    on_duplicate_key: DuplicateKeyAction,
}

impl Default for ExtractOptions {
    fn default() -> ExtractOptions {
        ExtractOptions {
            failure_mode: FailureMode::FailImmediately,
            max_failures: DEFAULT_MAX_FAILURES,
            on_duplicate_key: DuplicateKeyAction::Replace,
        }
    }
}

impl ExtractOptions {
    pub fn new() -> ExtractOptions {
        ExtractOptions::default()
    }

    pub fn failure_mode(&self) -> FailureMode {
        self.failure_mode
    }

    pub fn with_failure_mode(mut self, mode: FailureMode) -> ExtractOptions {
        self.failure_mode = mode;
        self
    }

    /// The collect-all failure budget.  Ignored in fail-immediately mode.
    pub fn max_failures(&self) -> usize {
        self.max_failures
    }

    pub fn with_max_failures(mut self, limit: usize) -> ExtractOptions {
        self.max_failures = limit.max(1);
        self
    }

    pub fn on_duplicate_key(&self) -> DuplicateKeyAction {
        self.on_duplicate_key
    }

    pub fn with_on_duplicate_key(mut self, action: DuplicateKeyAction) -> ExtractOptions {
        self.on_duplicate_key = action;
        self
    }
}

// ── Extraction context ───────────────────────────────────────

/// State threaded through an extraction.
pub struct ExtractionContext {
    formats: Arc<Formats>,
    version: Version,
    user_data: Option<Arc<dyn Any + Send + Sync>>,
    options: ExtractOptions,
    base_path: Path,
    problems: Vec<Problem>,
}

impl ExtractionContext {
    pub fn new(formats: Arc<Formats>) -> ExtractionContext {
        ExtractionContext {
            formats,
            version: Version::default(),
            user_data: None,
            options: ExtractOptions::default(),
            base_path: Path::root(),
            problems: Vec::new(),
        }
    }

    pub fn with_version(mut self, version: Version) -> ExtractionContext {
        self.version = version;
        self
    }

    pub fn with_options(mut self, options: ExtractOptions) -> ExtractionContext {
        self.options = options;
        self
    }

    pub fn with_user_data(mut self, data: Arc<dyn Any + Send + Sync>) -> ExtractionContext {
        self.user_data = Some(data);
        self
    }

    /// Where this context's document sits inside a larger extraction.
    /// Problem paths are composed over it.
    pub fn with_base_path(mut self, path: Path) -> ExtractionContext {
        self.base_path = path;
        self
    }

    pub fn formats(&self) -> &Arc<Formats> {
        &self.formats
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn user_data(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.user_data.as_deref()
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    pub fn path(&self) -> &Path {
        &self.base_path
    }

    /// Problems filed so far in collect-all mode.
    pub fn problems(&self) -> &[Problem] {
        &self.problems
    }

    pub(crate) fn take_problems(&mut self) -> Vec<Problem> {
        std::mem::take(&mut self.problems)
    }

    /// A problem at the reader's current position.
    pub fn problem(&self, reader: &Reader<'_>, message: impl Into<String>) -> Problem {
        Problem::new(self.problem_path(reader), message)
    }

    /// A problem at the reader's current position, caused by `cause`.
    pub fn problem_from(
        &self,
        reader: &Reader<'_>,
        cause: impl std::error::Error + Send + Sync + 'static,
    ) -> Problem {
        Problem::from_cause(self.problem_path(reader), cause)
    }

    fn problem_path(&self, reader: &Reader<'_>) -> Path {
        match reader.current_path() {
            Ok(path) => self.base_path.concat(&path),
            Err(_) => self.base_path.clone(),
        }
    }

    /// Extract a `T` from the reader using the registered extractor.
    ///
    /// The reader must sit on the first token of the value; on success it
    /// rests on the token after it.
    pub fn extract<T: 'static>(&mut self, reader: &mut Reader<'_>) -> Result<T, ExtractionError> {
        let extractor = match self.formats.find_extractor(TypeId::of::<T>()) {
            Some(extractor) => extractor,
            None => {
                let cause = NoExtractor {
                    type_name: std::any::type_name::<T>(),
                };
                return Err(Problem::from_cause(self.base_path.clone(), cause).into());
            }
        };

        let boxed = extractor.extract(self, reader)?;
        match boxed.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(_) => Err(ExtractionError::single(
                self.base_path.clone(),
                format!(
                    "extractor for {} produced a value of another type",
                    std::any::type_name::<T>()
                ),
            )),
        }
    }

    /// Navigate the reader down `subpath`, then extract a `T` there.
    ///
    /// The reader must sit on the first token of a structure enclosing
    /// the target; keys advance through objects, indices skip across
    /// array elements.  Problems reported from below the descent carry
    /// the extended path.
    pub fn extract_sub<T: 'static>(
        &mut self,
        reader: &mut Reader<'_>,
        subpath: &Path,
    ) -> Result<T, ExtractionError> {
        trace!("descending to {subpath} for {}", std::any::type_name::<T>());
        self.seek(reader, subpath)?;
        self.extract(reader)
    }

    fn seek(&mut self, reader: &mut Reader<'_>, subpath: &Path) -> Result<(), ExtractionError> {
        for (depth, element) in subpath.iter().enumerate() {
            let target = || subpath.prefix(depth + 1);
            match element {
                PathElement::Key(wanted) => {
                    reader.expect(AstNodeType::ObjectBegin)?;
                    loop {
                        match reader.next_key() {
                            Ok(true) => {}
                            Ok(false) | Err(_) => {
                                return Err(ExtractionError::single(
                                    self.base_path.concat(&target()),
                                    "object ended before the requested key",
                                ));
                            }
                        }
                        match reader.current() {
                            Ok(AstNode::Key { token, escaped }) => {
                                let key =
                                    decode_string_token(token, escaped).map_err(|cause| {
                                        ExtractionError::from(self.problem_from(reader, cause))
                                    })?;
                                if key.as_ref() == wanted.as_str() {
                                    reader.next_token();
                                    break;
                                }
                            }
                            Ok(AstNode::ObjectEnd) => {
                                return Err(ExtractionError::single(
                                    self.base_path.concat(&target()),
                                    format!("object has no member {wanted:?}"),
                                ));
                            }
                            _ => {
                                return Err(ExtractionError::single(
                                    self.base_path.concat(&target()),
                                    "malformed object in index",
                                ));
                            }
                        }
                    }
                }
                PathElement::Index(wanted) => {
                    reader.expect(AstNodeType::ArrayBegin)?;
                    reader.next_token();
                    for _ in 0..*wanted {
                        match reader.current().map(|node| node.node_type()) {
                            Ok(AstNodeType::ArrayEnd) | Err(_) => {
                                return Err(ExtractionError::single(
                                    self.base_path.concat(&target()),
                                    "array ended before the requested index",
                                ));
                            }
                            Ok(AstNodeType::ObjectBegin) | Ok(AstNodeType::ArrayBegin) => {
                                reader.next_structure();
                            }
                            Ok(_) => {
                                reader.next_token();
                            }
                        }
                    }
                    if matches!(
                        reader.current().map(|node| node.node_type()),
                        Ok(AstNodeType::ArrayEnd) | Err(_)
                    ) {
                        return Err(ExtractionError::single(
                            self.base_path.concat(&target()),
                            "array ended before the requested index",
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// File a problem with the collector.
    ///
    /// Fail-immediately mode raises it at once.  Collect-all mode stores
    /// it and returns `Ok` so the caller can continue, until the failure
    /// budget is exhausted, at which point everything collected is
    /// raised.
    pub fn attach(&mut self, problem: Problem) -> Result<(), ExtractionError> {
        self.record(ExtractionError::from(problem))
    }

    /// File every problem of `error` with the collector.  Same policy as
    /// [`ExtractionContext::attach`].
    pub fn record(&mut self, error: ExtractionError) -> Result<(), ExtractionError> {
        match self.options.failure_mode() {
            FailureMode::FailImmediately => {
                let mut problems = std::mem::take(&mut self.problems);
                problems.extend(error.into_problems());
                Err(ExtractionError::new(problems))
            }
            FailureMode::CollectAll => {
                self.problems.extend(error.into_problems());
                if self.problems.len() >= self.options.max_failures() {
                    Err(ExtractionError::new(std::mem::take(&mut self.problems)))
                } else {
                    Ok(())
                }
            }
        }
    }

    /// Close out an extraction: the value passes through only if the
    /// collector stayed empty.
    pub fn finish<T>(&mut self, value: T) -> Result<T, ExtractionError> {
        if self.problems.is_empty() {
            Ok(value)
        } else {
            Err(ExtractionError::new(self.take_problems()))
        }
    }
}

// ── Serialization context ────────────────────────────────────

/// State threaded through serialization.
pub struct SerializationContext {
    formats: Arc<Formats>,
    version: Version,
    user_data: Option<Arc<dyn Any + Send + Sync>>,
}

impl SerializationContext {
    pub fn new(formats: Arc<Formats>) -> SerializationContext {
        SerializationContext {
            formats,
            version: Version::default(),
            user_data: None,
        }
    }

    pub fn with_version(mut self, version: Version) -> SerializationContext {
        self.version = version;
        self
    }

    pub fn with_user_data(mut self, data: Arc<dyn Any + Send + Sync>) -> SerializationContext {
        self.user_data = Some(data);
        self
    }

    pub fn formats(&self) -> &Arc<Formats> {
        &self.formats
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn user_data(&self) -> Option<&(dyn Any + Send + Sync)> {
        self.user_data.as_deref()
    }

    /// Build the JSON representation of `from` using the registered
    /// serializer for `T`.
    pub fn to_json<T: 'static>(&self, from: &T) -> Result<Value, SerializationError> {
        match self.formats.find_serializer(TypeId::of::<T>()) {
            Some(serializer) => serializer.to_json(self, from as &dyn Any),
            None => Err(NoSerializer {
                type_name: std::any::type_name::<T>(),
            }
            .into()),
        }
    }
}
