//! The converter registry: extractors, serializers, and their lookup
//! graph.
//!
//! A `Formats` is a collection of converters keyed by `TypeId`, plus a
//! list of parent registries captured at composition time.  Lookup walks
//! the registry itself first, then its parents depth-first left to right;
//! the first hit wins.  Parents are held behind `Arc`, so the same base
//! registry can back any number of children and the graph is a DAG by
//! construction: a registry must be frozen into an `Arc` before it can
//! become a parent, and a frozen registry cannot be mutated.  That makes
//! "immutable once shared" a property the compiler enforces rather than a
//! rule callers must remember.
//!
//! Type identity is `std::any::TypeId`: a stable, opaque, per-type token
//! that works across the trait-object boundary without any reflection.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use log::debug;

use crate::adapters;
use crate::errors::{DuplicateType, ExtractionError, SerializationError};
use crate::extract::{ExtractionContext, SerializationContext};
use crate::reader::Reader;
use crate::value::Value;

// ── Version ──────────────────────────────────────────────────

/// A `(major, minor, revision)` triple, compared lexicographically.
/// Contexts carry one so converters can gate fields by version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub revision: u32,
}

impl Version {
    pub const fn new(major: u32, minor: u32, revision: u32) -> Version {
        Version {
            major,
            minor,
            revision,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.revision)
    }
}

// ── Contracts ────────────────────────────────────────────────

/// What to do when a converter is registered for a type that already has
/// one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateAction {
    /// Keep the existing converter.
    Ignore,
    /// Drop the existing converter in favor of the new one.
    Replace,
    /// Fail with [`DuplicateType`].
    #[default]
    Error,
}

/// Converts JSON reader state into a value of one fixed type.
///
/// An extractor consumes its value completely: on success the reader
/// rests on the token after the value.  On failure it returns an
/// [`ExtractionError`] whose problems carry the paths they arose at;
/// composite extractors that want to keep going after a member fails
/// should route such errors through
/// [`ExtractionContext::record`](crate::extract::ExtractionContext::record).
pub trait Extractor: Send + Sync {
    /// The type this extractor produces.  Fixed once registered.
    fn extracted_type(&self) -> TypeId;

    /// The produced type's name, for error messages.
    fn type_name(&self) -> &'static str;

    /// Materialize a value from the reader.  The returned box always
    /// holds an `extracted_type` value.
    fn extract(
        &self,
        context: &mut ExtractionContext,
        reader: &mut Reader<'_>,
    ) -> Result<Box<dyn Any>, ExtractionError>;
}

/// Converts a value of one fixed type into a JSON [`Value`].
pub trait Serializer: Send + Sync {
    /// The type this serializer consumes.  Fixed once registered.
    fn serialized_type(&self) -> TypeId;

    /// The consumed type's name, for error messages.
    fn type_name(&self) -> &'static str;

    /// Build the JSON representation of `from`, which holds a
    /// `serialized_type` value.
    fn to_json(
        &self,
        context: &SerializationContext,
        from: &dyn Any,
    ) -> Result<Value, SerializationError>;
}

/// A converter that goes both directions.  Most types want both, so
/// registries accept one object for the pair.
pub trait Adapter: Extractor + Serializer {}

impl<T: Extractor + Serializer> Adapter for T {}

// ── Registry ─────────────────────────────────────────────────

/// A composable collection of extractors and serializers.
pub struct Formats {
    parents: Vec<Arc<Formats>>,
    extractors: HashMap<TypeId, Arc<dyn Extractor>>,
    serializers: HashMap<TypeId, Arc<dyn Serializer>>,
}

impl fmt::Debug for Formats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Formats")
            .field("parents", &self.parents.len())
            .field("extractors", &self.extractors.len())
            .field("serializers", &self.serializers.len())
            .finish()
    }
}

impl Default for Formats {
    fn default() -> Formats {
        Formats::new()
    }
}

impl Formats {
    /// An empty registry that knows how to convert nothing at all.
    pub fn new() -> Formats {
        Formats {
            parents: Vec::new(),
            extractors: HashMap::new(),
            serializers: HashMap::new(),
        }
    }

    /// An empty registry backed by `parents`.  Order matters: lookups
    /// search parents left to right, so earlier parents win.
    pub fn compose(parents: Vec<Arc<Formats>>) -> Formats {
        Formats {
            parents,
            extractors: HashMap::new(),
            serializers: HashMap::new(),
        }
    }

    /// The strict built-in registry: adapters for `bool`, the signed and
    /// unsigned integer widths, `f32`/`f64`, `String`, and [`Value`]
    /// itself, each demanding the matching node kind.
    ///
    /// The instance is shared; compose over it to extend it.
    pub fn defaults() -> Arc<Formats> {
        static DEFAULTS: OnceLock<Arc<Formats>> = OnceLock::new();
        DEFAULTS
            .get_or_init(|| Arc::new(adapters::create_default_formats()))
            .clone()
    }

    /// The coercing registry: extractors that convert across kinds
    /// (string `"10"` becomes integer `10`, decimals truncate to
    /// integers, scalars stringify), layered over [`Formats::defaults`]
    /// so serializers and anything not coerced fall through.
    pub fn coerce() -> Arc<Formats> {
        static COERCE: OnceLock<Arc<Formats>> = OnceLock::new();
        COERCE
            .get_or_init(|| {
                Arc::new(Formats::compose(vec![
                    Arc::new(adapters::create_coerce_formats()),
                    Formats::defaults(),
                ]))
            })
            .clone()
    }

    /// Register an extractor.  `action` decides what happens when this
    /// registry already has one for the same type.
    pub fn register_extractor(
        &mut self,
        extractor: Arc<dyn Extractor>,
        action: DuplicateAction,
    ) -> Result<(), DuplicateType> {
        let type_id = extractor.extracted_type();
        if self.extractors.contains_key(&type_id) {
            match action {
                DuplicateAction::Ignore => return Ok(()),
                DuplicateAction::Replace => {}
                DuplicateAction::Error => {
                    return Err(DuplicateType {
                        operation: "an extractor",
                        type_name: extractor.type_name(),
                    })
                }
            }
        }
        debug!("registering extractor for {}", extractor.type_name());
        self.extractors.insert(type_id, extractor);
        Ok(())
    }

    /// Register a serializer.  Same duplicate policy as extractors.
    pub fn register_serializer(
        &mut self,
        serializer: Arc<dyn Serializer>,
        action: DuplicateAction,
    ) -> Result<(), DuplicateType> {
        let type_id = serializer.serialized_type();
        if self.serializers.contains_key(&type_id) {
            match action {
                DuplicateAction::Ignore => return Ok(()),
                DuplicateAction::Replace => {}
                DuplicateAction::Error => {
                    return Err(DuplicateType {
                        operation: "a serializer",
                        type_name: serializer.type_name(),
                    })
                }
            }
        }
        debug!("registering serializer for {}", serializer.type_name());
        self.serializers.insert(type_id, serializer);
        Ok(())
    }

    /// Register both facets of an adapter.  If the serializer half is
    /// rejected, the extractor half is rolled back so the registry never
    /// holds an adapter by one leg only.
    pub fn register_adapter<A>(
        &mut self,
        adapter: Arc<A>,
        action: DuplicateAction,
    ) -> Result<(), DuplicateType>
    where
        A: Adapter + 'static,
    {
        let extractor_id = Extractor::extracted_type(adapter.as_ref());
        let newly_added = !self.extractors.contains_key(&extractor_id);

        let as_extractor: Arc<dyn Extractor> = adapter.clone();
        self.register_extractor(as_extractor, action)?;

        let as_serializer: Arc<dyn Serializer> = adapter;
        if let Err(error) = self.register_serializer(as_serializer, action) {
            if newly_added {
                self.extractors.remove(&extractor_id);
            }
            return Err(error);
        }
        Ok(())
    }

    /// Find the extractor serving `type_id`, searching self, then parents
    /// depth-first left to right.
    pub fn find_extractor(&self, type_id: TypeId) -> Option<Arc<dyn Extractor>> {
        if let Some(found) = self.extractors.get(&type_id) {
            return Some(found.clone());
        }
        self.parents
            .iter()
            .find_map(|parent| parent.find_extractor(type_id))
    }

    /// Find the serializer serving `type_id`.  Same search order as
    /// [`Formats::find_extractor`].
    pub fn find_serializer(&self, type_id: TypeId) -> Option<Arc<dyn Serializer>> {
        if let Some(found) = self.serializers.get(&type_id) {
            return Some(found.clone());
        }
        self.parents
            .iter()
            .find_map(|parent| parent.find_serializer(type_id))
    }
}

// ── Function-backed converters ───────────────────────────────

/// An [`Extractor`] wrapping a closure.
pub struct FunctionExtractor<T, F> {
    function: F,
    marker: PhantomData<fn() -> T>,
}

impl<T, F> FunctionExtractor<T, F>
where
    T: 'static,
    F: Fn(&mut ExtractionContext, &mut Reader<'_>) -> Result<T, ExtractionError> + Send + Sync,
{
    pub fn new(function: F) -> FunctionExtractor<T, F> {
        FunctionExtractor {
            function,
            marker: PhantomData,
        }
    }
}

impl<T, F> Extractor for FunctionExtractor<T, F>
where
    T: 'static,
    F: Fn(&mut ExtractionContext, &mut Reader<'_>) -> Result<T, ExtractionError> + Send + Sync,
{
    fn extracted_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn extract(
        &self,
        context: &mut ExtractionContext,
        reader: &mut Reader<'_>,
    ) -> Result<Box<dyn Any>, ExtractionError> {
        (self.function)(context, reader).map(|value| Box::new(value) as Box<dyn Any>)
    }
}

/// A [`Serializer`] wrapping a closure.
pub struct FunctionSerializer<T, F> {
    function: F,
    marker: PhantomData<fn(&T)>,
}

impl<T, F> FunctionSerializer<T, F>
where
    T: 'static,
    F: Fn(&SerializationContext, &T) -> Result<Value, SerializationError> + Send + Sync,
{
    pub fn new(function: F) -> FunctionSerializer<T, F> {
        FunctionSerializer {
            function,
            marker: PhantomData,
        }
    }
}

impl<T, F> Serializer for FunctionSerializer<T, F>
where
    T: 'static,
    F: Fn(&SerializationContext, &T) -> Result<Value, SerializationError> + Send + Sync,
{
    fn serialized_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn to_json(
        &self,
        context: &SerializationContext,
        from: &dyn Any,
    ) -> Result<Value, SerializationError> {
        let typed = from
            .downcast_ref::<T>()
            .ok_or(SerializationError::TypeMismatch {
                type_name: std::any::type_name::<T>(),
            })?;
        (self.function)(context, typed)
    }
}

/// An [`Adapter`] built from an extraction closure and a serialization
/// closure over the same type.
pub struct FunctionAdapter<T, FE, FS> {
    extract_fn: FE,
    serialize_fn: FS,
    marker: PhantomData<fn() -> T>,
}

impl<T, FE, FS> FunctionAdapter<T, FE, FS>
where
    T: 'static,
    FE: Fn(&mut ExtractionContext, &mut Reader<'_>) -> Result<T, ExtractionError> + Send + Sync,
    FS: Fn(&SerializationContext, &T) -> Result<Value, SerializationError> + Send + Sync,
{
    pub fn new(extract: FE, serialize: FS) -> FunctionAdapter<T, FE, FS> {
        FunctionAdapter {
            extract_fn: extract,
            serialize_fn: serialize,
            marker: PhantomData,
        }
    }
}

impl<T, FE, FS> Extractor for FunctionAdapter<T, FE, FS>
where
    T: 'static,
    FE: Fn(&mut ExtractionContext, &mut Reader<'_>) -> Result<T, ExtractionError> + Send + Sync,
    FS: Fn(&SerializationContext, &T) -> Result<Value, SerializationError> + Send + Sync,
{
    fn extracted_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn extract(
        &self,
        context: &mut ExtractionContext,
        reader: &mut Reader<'_>,
    ) -> Result<Box<dyn Any>, ExtractionError> {
        (self.extract_fn)(context, reader).map(|value| Box::new(value) as Box<dyn Any>)
    }
}

impl<T, FE, FS> Serializer for FunctionAdapter<T, FE, FS>
where
    T: 'static,
    FE: Fn(&mut ExtractionContext, &mut Reader<'_>) -> Result<T, ExtractionError> + Send + Sync,
    FS: Fn(&SerializationContext, &T) -> Result<Value, SerializationError> + Send + Sync,
{
    fn serialized_type(&self) -> TypeId {
        TypeId::of::<T>()
    }

    fn type_name(&self) -> &'static str {
        std::any::type_name::<T>()
    }

    fn to_json(
        &self,
        context: &SerializationContext,
        from: &dyn Any,
    ) -> Result<Value, SerializationError> {
        let typed = from
            .downcast_ref::<T>()
            .ok_or(SerializationError::TypeMismatch {
                type_name: std::any::type_name::<T>(),
            })?;
        (self.serialize_fn)(context, typed)
    }
}
