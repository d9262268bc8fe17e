//! Built-in outlet drivers.
//!
//! Three families ship with the daemon: a generic SNMP outlet, the APC AP7900
//! PDU (SNMP with fixed OIDs), and the Synaccess NP-02B HTTP strip. Each
//! driver absorbs its own network failures: queries return `None` and
//! commands log and carry on.

pub mod ap7900;
pub mod np02b;
pub mod snmp;

use smartoutlet_config::NetworkPolicy;
use smartoutlet_core::{DriverDescriptor, OutletRegistry, RegistryError};

pub use ap7900::Ap7900Outlet;
pub use np02b::Np02bOutlet;
pub use snmp::SnmpOutlet;

/// Registers every built-in driver, applying `network` to each instance.
///
/// # Errors
///
/// Returns [`RegistryError::DuplicateType`] when the registry already holds
/// a driver under one of the built-in tags.
pub fn register_builtin(
    registry: &mut OutletRegistry,
    network: NetworkPolicy,
) -> Result<(), RegistryError> {
    registry.register(DriverDescriptor::configured(move |driver: SnmpOutlet| {
        driver.with_network(network)
    }))?;
    registry.register(DriverDescriptor::configured(move |driver: Ap7900Outlet| {
        driver.with_network(network)
    }))?;
    registry.register(DriverDescriptor::configured(move |driver: Np02bOutlet| {
        driver.with_network(network)
    }))?;
    Ok(())
}

/// A registry holding only the built-in drivers.
///
/// # Errors
///
/// Propagates [`register_builtin`] failures; a fresh registry never has any.
pub fn builtin_registry(network: NetworkPolicy) -> Result<OutletRegistry, RegistryError> {
    let mut registry = OutletRegistry::new();
    register_builtin(&mut registry, network)?;
    Ok(registry)
}

#[cfg(test)]
mod tests;
