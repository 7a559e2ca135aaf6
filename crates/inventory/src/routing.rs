//! Transfer routing between the local actor and a backend.
//!
//! Every transfer goes through a named channel the backend exposes. A valid
//! channel must reach this actor, must not be another managed backend (units
//! would land in another aggregated container and be counted twice), and must
//! not belong to another actor of the same kind.

use std::collections::BTreeSet;
use std::sync::Arc;

use depot_core::{BackendId, ChannelName, DomainError, DomainResult};

use crate::backend::{Backend, BackendSet};

/// Rules for picking the channel that reaches the local actor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingPolicy {
    actor_pattern: String,
    local_actor: Option<ChannelName>,
    excluded: BTreeSet<ChannelName>,
}

impl RoutingPolicy {
    /// Accept any channel whose name starts with `actor_pattern`.
    pub fn new(actor_pattern: impl Into<String>) -> Self {
        Self {
            actor_pattern: actor_pattern.into(),
            local_actor: None,
            excluded: BTreeSet::new(),
        }
    }

    /// Pin the route to one exact channel name.
    pub fn with_local_actor(mut self, name: ChannelName) -> Self {
        self.local_actor = Some(name);
        self
    }

    pub fn with_excluded(mut self, names: impl IntoIterator<Item = ChannelName>) -> Self {
        self.excluded.extend(names);
        self
    }

    pub fn actor_pattern(&self) -> &str {
        &self.actor_pattern
    }

    pub fn local_actor(&self) -> Option<&ChannelName> {
        self.local_actor.as_ref()
    }

    /// Whether a peripheral/channel name denotes an actor (this one or another).
    pub fn is_actor_name(&self, name: &str) -> bool {
        let pinned = self.local_actor.as_ref().is_some_and(|a| a.as_str() == name);
        pinned || (!self.actor_pattern.is_empty() && name.starts_with(&self.actor_pattern))
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.iter().any(|c| c.as_str() == name)
    }

    fn accepts(&self, channel: &ChannelName, managed: &BackendSet) -> bool {
        if managed.contains(&BackendId::new(channel.as_str())) || self.excluded.contains(channel) {
            return false;
        }
        match &self.local_actor {
            Some(actor) => actor == channel,
            None => self.is_actor_name(channel.as_str()),
        }
    }

    /// First channel of `backend` that reaches the local actor.
    ///
    /// No such channel means the backend is structurally disconnected; the
    /// caller must abort rather than skip it.
    pub fn resolve(&self, backend: &dyn Backend, managed: &BackendSet) -> DomainResult<ChannelName> {
        let channels = backend.transfer_channels()?;
        channels
            .into_iter()
            .find(|c| self.accepts(c, managed))
            .ok_or_else(|| {
                tracing::error!(backend = %backend.id(), "no transfer channel reaches the local actor");
                DomainError::routing(backend.id().clone())
            })
    }
}

/// What an allocator needs to reach backends: the managed set and the routing rules.
#[derive(Debug, Clone, Copy)]
pub struct TransferContext<'a> {
    pub backends: &'a BackendSet,
    pub routing: &'a RoutingPolicy,
}

impl<'a> TransferContext<'a> {
    pub fn new(backends: &'a BackendSet, routing: &'a RoutingPolicy) -> Self {
        Self { backends, routing }
    }

    /// Backend handle plus the channel to use for it.
    ///
    /// A backend id the set no longer knows is a routing failure too.
    pub fn route(&self, backend: &BackendId) -> DomainResult<(Arc<dyn Backend>, ChannelName)> {
        let handle = self
            .backends
            .get(backend)
            .ok_or_else(|| DomainError::routing(backend.clone()))?;
        let channel = self.routing.resolve(handle.as_ref(), self.backends)?;
        Ok((Arc::clone(handle), channel))
    }
}
