//! Configuration records: flat maps of scalar parameters naming one outlet.
//!
//! A record always carries a `type` field naming the driver, plus whatever
//! driver-specific fields that driver declares. Records are stored sorted by
//! field name so iteration order never depends on insertion order.

use std::collections::BTreeMap;
use std::collections::btree_map;
use std::fmt;
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::identity::OutletKey;

/// Field naming the driver that understands the rest of the record.
pub const TYPE_FIELD: &str = "type";

/// Connection-only field overriding the daemon port for one client.
pub const PORT_FIELD: &str = "port";

/// Connection-only field naming the daemon log file for one client.
pub const LOG_FIELD: &str = "log";

/// A single configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    /// Boolean flag.
    Bool(bool),
    /// Signed integer.
    Integer(i64),
    /// Free-form text.
    Text(String),
}

impl Scalar {
    /// Human-readable name of the variant, used in validation messages.
    #[must_use]
    pub const fn kind(&self) -> ScalarKind {
        match self {
            Self::Bool(_) => ScalarKind::Bool,
            Self::Integer(_) => ScalarKind::Integer,
            Self::Text(_) => ScalarKind::Text,
        }
    }

    /// Returns the text payload, if this is a text scalar.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            Self::Bool(_) | Self::Integer(_) => None,
        }
    }

    /// Returns the integer payload, if this is an integer scalar.
    #[must_use]
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(value) => Some(*value),
            Self::Bool(_) | Self::Text(_) => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(formatter, "{value}"),
            Self::Integer(value) => write!(formatter, "{value}"),
            Self::Text(value) => formatter.write_str(value),
        }
    }
}

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Scalar {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for Scalar {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<u16> for Scalar {
    fn from(value: u16) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_owned())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Discriminant of a [`Scalar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarKind {
    /// Boolean flag.
    Bool,
    /// Signed integer.
    Integer,
    /// Free-form text.
    Text,
}

impl fmt::Display for ScalarKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Bool => "boolean",
            Self::Integer => "integer",
            Self::Text => "string",
        })
    }
}

/// Unordered mapping from parameter name to scalar value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OutletRecord {
    fields: BTreeMap<String, Scalar>,
}

impl OutletRecord {
    /// Creates an empty record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a record carrying only a driver type tag.
    #[must_use]
    pub fn typed(tag: impl Into<String>) -> Self {
        Self::new().with(TYPE_FIELD, tag.into())
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(name, value);
        self
    }

    /// Inserts or replaces a field, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Scalar>) -> Option<Scalar> {
        self.fields.insert(name.into(), value.into())
    }

    /// Removes a field, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<Scalar> {
        self.fields.remove(name)
    }

    /// Looks up a field.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Scalar> {
        self.fields.get(name)
    }

    /// Whether the record carries the named field.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    /// Number of fields, including `type` when present.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the record has no fields at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterates fields in ascending name order.
    pub fn iter(&self) -> btree_map::Iter<'_, String, Scalar> {
        self.fields.iter()
    }

    /// Returns the driver type tag when present and textual.
    #[must_use]
    pub fn type_tag(&self) -> Option<&str> {
        self.get(TYPE_FIELD).and_then(Scalar::as_text)
    }

    /// Removes and returns the driver type tag.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::MissingField`] when no `type` is present and
    /// [`RecordError::WrongType`] when it is not a string.
    pub fn take_type(&mut self) -> Result<String, RecordError> {
        match self.fields.remove(TYPE_FIELD) {
            Some(Scalar::Text(tag)) => Ok(tag),
            Some(other) => Err(RecordError::wrong_type(TYPE_FIELD, ScalarKind::Text, &other)),
            None => Err(RecordError::missing(TYPE_FIELD)),
        }
    }

    /// Canonical identity of the outlet this record describes.
    #[must_use]
    pub fn key(&self) -> OutletKey {
        OutletKey::derive(self)
    }

    /// Returns a required field of any scalar kind.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::MissingField`] when the field is absent.
    pub fn require(&self, name: &str) -> Result<&Scalar, RecordError> {
        self.get(name).ok_or_else(|| RecordError::missing(name))
    }

    /// Returns a required text field.
    ///
    /// # Errors
    ///
    /// Fails when the field is absent or not a string.
    pub fn require_text(&self, name: &str) -> Result<&str, RecordError> {
        let value = self.require(name)?;
        value
            .as_text()
            .ok_or_else(|| RecordError::wrong_type(name, ScalarKind::Text, value))
    }

    /// Returns an optional text field, falling back to `default`.
    ///
    /// # Errors
    ///
    /// Fails when the field is present but not a string.
    pub fn text_or<'a>(&'a self, name: &str, default: &'a str) -> Result<&'a str, RecordError> {
        match self.get(name) {
            None => Ok(default),
            Some(value) => value
                .as_text()
                .ok_or_else(|| RecordError::wrong_type(name, ScalarKind::Text, value)),
        }
    }

    /// Returns a required integer field.
    ///
    /// # Errors
    ///
    /// Fails when the field is absent or not an integer.
    pub fn require_integer(&self, name: &str) -> Result<i64, RecordError> {
        let value = self.require(name)?;
        value
            .as_integer()
            .ok_or_else(|| RecordError::wrong_type(name, ScalarKind::Integer, value))
    }

    /// Returns a required integer field constrained to an inclusive range.
    ///
    /// # Errors
    ///
    /// Fails when the field is absent, not an integer, or outside `bounds`.
    pub fn require_integer_in(
        &self,
        name: &str,
        bounds: RangeInclusive<i64>,
    ) -> Result<i64, RecordError> {
        let value = self.require_integer(name)?;
        if bounds.contains(&value) {
            Ok(value)
        } else {
            Err(RecordError::OutOfRange {
                field: name.to_owned(),
                value,
                min: *bounds.start(),
                max: *bounds.end(),
            })
        }
    }
}

impl FromIterator<(String, Scalar)> for OutletRecord {
    fn from_iter<I: IntoIterator<Item = (String, Scalar)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

impl<'a> IntoIterator for &'a OutletRecord {
    type Item = (&'a String, &'a Scalar);
    type IntoIter = btree_map::Iter<'a, String, Scalar>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Validation failures raised while reading a configuration record.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RecordError {
    /// A required field is absent.
    #[error("missing required field '{field}'")]
    MissingField {
        /// Name of the absent field.
        field: String,
    },
    /// A field holds a value of the wrong scalar kind.
    #[error("field '{field}' must be a {expected}, got {found}")]
    WrongType {
        /// Name of the offending field.
        field: String,
        /// Kind the driver expects.
        expected: ScalarKind,
        /// Kind actually supplied.
        found: ScalarKind,
    },
    /// An integer field lies outside its declared inclusive range.
    #[error("field '{field}' is {value}, expected a value between {min} and {max} inclusive")]
    OutOfRange {
        /// Name of the offending field.
        field: String,
        /// Supplied value.
        value: i64,
        /// Inclusive lower bound.
        min: i64,
        /// Inclusive upper bound.
        max: i64,
    },
    /// A field holds a value the driver cannot use.
    #[error("invalid value for field '{field}': {message}")]
    InvalidValue {
        /// Name of the offending field.
        field: String,
        /// Explanation of the problem.
        message: String,
    },
}

impl RecordError {
    /// Creates a missing field error.
    pub fn missing(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Creates a wrong type error for the supplied value.
    pub fn wrong_type(field: impl Into<String>, expected: ScalarKind, found: &Scalar) -> Self {
        Self::WrongType {
            field: field.into(),
            expected,
            found: found.kind(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            message: message.into(),
        }
    }
}
