//! The validation contract
//!
//! A [`Validator<T>`] turns an untyped JSON value into a `T` or explains why
//! it cannot. The npc core never defines validation rules itself; callers
//! supply them, either as plain functions or as serde-backed schemas.

use crate::error::{PathSegment, ValidationError};
use serde::de::DeserializeOwned;
use serde_path_to_error::Segment;
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

/// Validation capability: `parse(raw) -> T` or fail
///
/// Implemented for every `Fn(Value) -> Result<T, ValidationError>`, for
/// [`Json<T>`], and for [`Raw`].
pub trait Validator<T>: Send + Sync {
    fn parse(&self, raw: Value) -> Result<T, ValidationError>;
}

impl<T, F> Validator<T> for F
where
    F: Fn(Value) -> Result<T, ValidationError> + Send + Sync,
{
    fn parse(&self, raw: Value) -> Result<T, ValidationError> {
        self(raw)
    }
}

/// Validates `raw` with `schema`
///
/// This is the only way a raw call result should become a typed value.
pub fn validate<T, V>(schema: &V, raw: Value) -> Result<T, ValidationError>
where
    V: Validator<T> + ?Sized,
{
    schema.parse(raw)
}

/// Schema defined by a serde `Deserialize` implementation
///
/// Unknown-field and type rules are whatever the target type's
/// `Deserialize` impl enforces.
pub struct Json<T> {
    _marker: PhantomData<fn() -> T>,
}

impl<T> Json<T> {
    pub fn new() -> Self {
        Self {
            _marker: PhantomData,
        }
    }
}

impl<T> Default for Json<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Json<T> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<T> Copy for Json<T> {}

impl<T> fmt::Debug for Json<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Json<{}>", std::any::type_name::<T>())
    }
}

impl<T: DeserializeOwned> Validator<T> for Json<T> {
    fn parse(&self, raw: Value) -> Result<T, ValidationError> {
        serde_path_to_error::deserialize(raw).map_err(|err| {
            let path: Vec<PathSegment> = err
                .path()
                .iter()
                .filter_map(|segment| match segment {
                    Segment::Seq { index } => Some(PathSegment::Index(*index)),
                    Segment::Map { key } => Some(PathSegment::Key(key.clone())),
                    Segment::Enum { variant } => Some(PathSegment::Key(variant.clone())),
                    Segment::Unknown => None,
                })
                .collect();
            ValidationError::at(path, err.into_inner().to_string())
        })
    }
}

/// Accepts any value unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct Raw;

impl Validator<Value> for Raw {
    fn parse(&self, raw: Value) -> Result<Value, ValidationError> {
        Ok(raw)
    }
}
