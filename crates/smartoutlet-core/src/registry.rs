//! Type-tag dispatch from configuration records to live drivers.
//!
//! The registry is an explicit table assembled at startup. Each entry pairs a
//! case-insensitive tag with the driver's parameter table and constructor.

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::driver::{Outlet, OutletDriver, ParameterSpec, validate_parameters};
use crate::identity::OutletKey;
use crate::record::{OutletRecord, RecordError};

type Constructor = Arc<dyn Fn(&OutletRecord) -> Result<Box<dyn Outlet>, RecordError> + Send + Sync>;

/// Type-erased registration for one driver family.
#[derive(Clone)]
pub struct DriverDescriptor {
    tag: &'static str,
    parameters: &'static [ParameterSpec],
    construct: Constructor,
}

impl DriverDescriptor {
    /// Describes a driver through its [`OutletDriver`] implementation.
    #[must_use]
    pub fn of<D: OutletDriver>() -> Self {
        Self::configured::<D, _>(|driver| driver)
    }

    /// Describes a driver whose freshly deserialised instance is adjusted
    /// before use, for example to apply a network budget.
    #[must_use]
    pub fn configured<D, F>(configure: F) -> Self
    where
        D: OutletDriver,
        F: Fn(D) -> D + Send + Sync + 'static,
    {
        Self {
            tag: D::TYPE,
            parameters: D::PARAMETERS,
            construct: Arc::new(move |record: &OutletRecord| {
                let driver = configure(D::deserialize(record)?);
                Ok(Box::new(driver) as Box<dyn Outlet>)
            }),
        }
    }

    /// Canonical type tag.
    #[must_use]
    pub const fn tag(&self) -> &'static str {
        self.tag
    }

    /// Documented parameters.
    #[must_use]
    pub const fn parameters(&self) -> &'static [ParameterSpec] {
        self.parameters
    }

    /// Whether `tag` selects this driver.
    #[must_use]
    pub fn matches(&self, tag: &str) -> bool {
        self.tag.eq_ignore_ascii_case(tag)
    }

    /// Validates a type-stripped record and builds the driver.
    ///
    /// # Errors
    ///
    /// Returns a [`RecordError`] when validation or construction fails.
    pub fn construct(&self, record: &OutletRecord) -> Result<Box<dyn Outlet>, RecordError> {
        validate_parameters(record, self.parameters)?;
        (self.construct)(record)
    }
}

impl fmt::Debug for DriverDescriptor {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DriverDescriptor")
            .field("tag", &self.tag)
            .field("parameters", &self.parameters.len())
            .finish_non_exhaustive()
    }
}

/// A driver built from a record, bound to the record's identity.
#[derive(Debug)]
pub struct ResolvedOutlet {
    /// Canonical identity of the record.
    pub key: OutletKey,
    /// Canonical tag of the driver that accepted the record.
    pub tag: &'static str,
    /// The live driver.
    pub outlet: Box<dyn Outlet>,
}

/// Statically assembled table of known drivers.
#[derive(Debug, Clone, Default)]
pub struct OutletRegistry {
    drivers: Vec<DriverDescriptor>,
}

impl OutletRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a driver.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::DuplicateType`] when a driver already claims
    /// the same tag, ignoring case.
    pub fn register(&mut self, descriptor: DriverDescriptor) -> Result<(), RegistryError> {
        if self.lookup(descriptor.tag).is_some() {
            return Err(RegistryError::DuplicateType {
                tag: descriptor.tag.to_owned(),
            });
        }
        self.drivers.push(descriptor);
        Ok(())
    }

    /// Registers the driver `D`.
    ///
    /// # Errors
    ///
    /// See [`OutletRegistry::register`].
    pub fn register_driver<D: OutletDriver>(&mut self) -> Result<(), RegistryError> {
        self.register(DriverDescriptor::of::<D>())
    }

    /// Finds the driver whose tag matches case-insensitively.
    #[must_use]
    pub fn lookup(&self, tag: &str) -> Option<&DriverDescriptor> {
        self.drivers.iter().find(|descriptor| descriptor.matches(tag))
    }

    /// Registered tags in registration order.
    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.drivers.iter().map(DriverDescriptor::tag)
    }

    /// Parameter documentation for a tag.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::UnknownType`] for an unregistered tag.
    pub fn describe(&self, tag: &str) -> Result<&'static [ParameterSpec], RegistryError> {
        self.lookup(tag)
            .map(DriverDescriptor::parameters)
            .ok_or_else(|| RegistryError::UnknownType {
                tag: tag.to_owned(),
            })
    }

    /// Builds a live driver from a complete record.
    ///
    /// The `type` field is removed before the remaining fields reach the
    /// driver's constructor.
    ///
    /// # Errors
    ///
    /// Fails when the record has no textual `type`, names an unregistered
    /// driver, or does not satisfy the driver's parameters.
    pub fn resolve(&self, record: &OutletRecord) -> Result<ResolvedOutlet, RegistryError> {
        let key = record.key();
        let mut fields = record.clone();
        let tag = fields.take_type().map_err(|error| match error {
            RecordError::MissingField { .. } => RegistryError::MissingType,
            other => RegistryError::Invalid {
                tag: String::new(),
                source: other,
            },
        })?;
        let descriptor = self
            .lookup(&tag)
            .ok_or_else(|| RegistryError::UnknownType { tag: tag.clone() })?;
        let outlet = descriptor
            .construct(&fields)
            .map_err(|source| RegistryError::Invalid {
                tag: descriptor.tag.to_owned(),
                source,
            })?;
        Ok(ResolvedOutlet {
            key,
            tag: descriptor.tag,
            outlet,
        })
    }
}

/// Failures raised while turning a record into a driver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// The record carries no `type` field.
    #[error("outlet record has no 'type' field")]
    MissingType,
    /// No registered driver claims the tag.
    #[error("unknown outlet type '{tag}'")]
    UnknownType {
        /// Tag as supplied.
        tag: String,
    },
    /// Two drivers claim the same tag.
    #[error("outlet type '{tag}' is already registered")]
    DuplicateType {
        /// Conflicting tag.
        tag: String,
    },
    /// A record's identity is already bound to a different driver.
    #[error("outlet '{key}' is already registered as '{registered}', not '{requested}'")]
    Collision {
        /// Shared identity.
        key: OutletKey,
        /// Tag of the driver already bound to the identity.
        registered: String,
        /// Tag named by the conflicting record.
        requested: String,
    },
    /// A record's identity is already bound to a record with other fields.
    #[error("outlet '{key}' is already bound to a different record")]
    Ambiguous {
        /// Shared identity.
        key: OutletKey,
    },
    /// The driver rejected the record.
    #[error("invalid '{tag}' outlet record: {source}")]
    Invalid {
        /// Driver tag, empty when the tag itself was unusable.
        tag: String,
        /// Validation failure.
        #[source]
        source: RecordError,
    },
}
