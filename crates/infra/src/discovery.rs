//! Backend discovery: classify attached peripherals into usable backends.

use std::sync::Arc;

use depot_core::DomainResult;
use depot_inventory::{Backend, BackendSet, RoutingPolicy};

use crate::config::DepotConfig;

/// Something that can enumerate attached peripherals and hand out backend handles.
pub trait PeripheralHost: Send + Sync {
    /// Names of every attached peripheral, in host order.
    fn peripheral_names(&self) -> DomainResult<Vec<String>>;

    /// Backend handle for `name`, or `None` if it lacks the inventory capability.
    fn connect(&self, name: &str) -> Option<Arc<dyn Backend>>;
}

impl<H> PeripheralHost for Arc<H>
where
    H: PeripheralHost + ?Sized,
{
    fn peripheral_names(&self) -> DomainResult<Vec<String>> {
        (**self).peripheral_names()
    }

    fn connect(&self, name: &str) -> Option<Arc<dyn Backend>> {
        (**self).connect(name)
    }
}

/// Why a peripheral was left out of the backend set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The local actor or another actor of the same kind.
    Actor,
    /// Listed in the configured exclusions.
    Excluded,
    /// Name does not carry the configured backend prefix.
    PatternMismatch,
    /// Not an inventory.
    NoInventory,
}

/// Classify one peripheral name.
pub fn classify(
    host: &dyn PeripheralHost,
    name: &str,
    config: &DepotConfig,
    routing: &RoutingPolicy,
) -> Result<Arc<dyn Backend>, Rejection> {
    if routing.is_actor_name(name) {
        return Err(Rejection::Actor);
    }
    if routing.is_excluded(name) {
        return Err(Rejection::Excluded);
    }
    if let Some(prefix) = &config.backend_pattern {
        if !name.starts_with(prefix.as_str()) {
            return Err(Rejection::PatternMismatch);
        }
    }
    host.connect(name).ok_or(Rejection::NoInventory)
}

/// Enumerate the host and keep every peripheral that classifies as a backend.
pub fn discover_backends(host: &dyn PeripheralHost, config: &DepotConfig) -> DomainResult<BackendSet> {
    let routing = config.routing_policy();
    let mut backends = BackendSet::new();

    for name in host.peripheral_names()? {
        match classify(host, &name, config, &routing) {
            Ok(backend) => backends.insert(backend),
            Err(reason) => tracing::debug!(peripheral = %name, ?reason, "peripheral skipped"),
        }
    }

    tracing::info!(backends = backends.len(), "backend discovery finished");
    Ok(backends)
}
