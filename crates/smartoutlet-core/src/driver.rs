//! The capability contract every outlet driver satisfies.
//!
//! A driver is constructed from a validated [`OutletRecord`], can describe
//! itself back as a record, and exposes a blocking query/command pair. Device
//! failures never surface as errors: a query that cannot reach the device
//! returns `None` and a failed command is swallowed, because the follow-up
//! query is the source of truth.

use std::fmt;

use crate::record::{OutletRecord, RecordError};

/// A live handle on one physical outlet.
pub trait Outlet: Send + fmt::Debug {
    /// Type tag the driver registers under.
    fn type_tag(&self) -> &'static str;

    /// Record that reconstructs an equivalent driver, including `type`.
    fn serialize(&self) -> OutletRecord;

    /// Queries the device. `None` means unknown or unreachable.
    fn get_state(&self) -> Option<bool>;

    /// Commands the device. Best effort.
    fn set_state(&self, state: bool);
}

/// Static description of a driver family.
///
/// Implementors are plain structs; the registry erases them behind
/// [`crate::DriverDescriptor::of`].
pub trait OutletDriver: Outlet + Sized + 'static {
    /// Canonical type tag, matched case-insensitively.
    const TYPE: &'static str;

    /// Documented parameters accepted in a record.
    const PARAMETERS: &'static [ParameterSpec];

    /// Builds a driver from a record with its `type` field already removed.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordError`] when a required field is missing, a value has
    /// the wrong kind, or an index is out of bounds.
    fn deserialize(record: &OutletRecord) -> Result<Self, RecordError>;
}

/// Documentation and presence rules for one record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterSpec {
    /// Field name.
    pub name: &'static str,
    /// Human-readable description.
    pub description: &'static str,
    /// Default applied when absent; `None` for required fields.
    pub default: Option<&'static str>,
}

impl ParameterSpec {
    /// A parameter the record must carry.
    #[must_use]
    pub const fn required(name: &'static str, description: &'static str) -> Self {
        Self {
            name,
            description,
            default: None,
        }
    }

    /// A parameter with a fallback value.
    #[must_use]
    pub const fn optional(
        name: &'static str,
        description: &'static str,
        default: &'static str,
    ) -> Self {
        Self {
            name,
            description,
            default: Some(default),
        }
    }

    /// Whether a record must supply this parameter.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.default.is_none()
    }
}

/// Checks a type-stripped record against a parameter table.
///
/// Fields the table does not declare are ignored; records may carry extra
/// keys such as an outlet index the driver has no use for.
///
/// # Errors
///
/// Reports the first missing required field.
pub fn validate_parameters(
    record: &OutletRecord,
    parameters: &[ParameterSpec],
) -> Result<(), RecordError> {
    parameters
        .iter()
        .filter(|spec| spec.is_required())
        .find(|spec| !record.contains(spec.name))
        .map_or(Ok(()), |spec| Err(RecordError::missing(spec.name)))
}
