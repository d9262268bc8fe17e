//! Shared vocabulary of the smart outlet daemon and its clients.
//!
//! This crate defines the configuration record that names an outlet, the
//! order-independent identity derived from it, the driver contract, the
//! registry that turns records into live drivers, and the JSONL protocol
//! spoken over the daemon's loopback socket.

pub mod driver;
pub mod identity;
pub mod protocol;
pub mod record;
pub mod registry;

pub use driver::{Outlet, OutletDriver, ParameterSpec, validate_parameters};
pub use identity::OutletKey;
pub use protocol::{
    DaemonRequest, DaemonResponse, ErrorKind, MAX_MESSAGE_BYTES, PROTOCOL_VERSION, ProtocolError,
    read_message, write_message,
};
pub use record::{
    LOG_FIELD, OutletRecord, PORT_FIELD, RecordError, Scalar, ScalarKind, TYPE_FIELD,
};
pub use registry::{DriverDescriptor, OutletRegistry, RegistryError, ResolvedOutlet};

#[cfg(test)]
mod tests;
