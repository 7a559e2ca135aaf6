//! Backend adapter contract.
//!
//! A backend is any storage container that can list its slots, describe a
//! slot, and move units to or from a named transfer channel. The engine only
//! ever talks to backends through this trait.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use depot_core::{BackendId, ChannelName, DomainResult, ItemIdentity, SlotIndex};

/// Detailed view of one occupied backend slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotItem {
    pub identity: ItemIdentity,
    pub display_name: String,
    pub count: u32,
    /// Maximum units one slot of this item can hold.
    pub max_count: u32,
}

/// Contents of one local (actor-carried) slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalStack {
    pub identity: ItemIdentity,
    pub count: u32,
}

/// Capability surface of one storage backend.
///
/// Calls block until the backend answers. Transfer methods return the number
/// of units that actually moved, which may be less than requested.
pub trait Backend: Send + Sync + core::fmt::Debug {
    fn id(&self) -> &BackendId;

    /// Slots currently holding items.
    fn occupied_slots(&self) -> DomainResult<BTreeSet<SlotIndex>>;

    /// Item details for a slot; `None` when the slot is empty.
    fn slot_item(&self, slot: SlotIndex) -> DomainResult<Option<SlotItem>>;

    /// Total addressable slot count.
    fn slot_count(&self) -> DomainResult<u32>;

    /// Move up to `count` units from `from_slot` into whatever sits behind `to`.
    fn push(&self, to: &ChannelName, from_slot: SlotIndex, count: u32) -> DomainResult<u32>;

    /// Move units from `from_slot` of whatever sits behind `from` into `to_slot`.
    ///
    /// `limit = None` lets the backend move as much as fits.
    fn pull(
        &self,
        from: &ChannelName,
        from_slot: SlotIndex,
        limit: Option<u32>,
        to_slot: SlotIndex,
    ) -> DomainResult<u32>;

    /// Named channels this backend can transfer through, in backend order.
    fn transfer_channels(&self) -> DomainResult<Vec<ChannelName>>;
}

/// The actor's own carried inventory (fixed capacity, slots `1..=N`).
pub trait LocalInventory: Send + Sync + core::fmt::Debug {
    fn slot_count(&self) -> u32;

    fn slot_item(&self, slot: SlotIndex) -> DomainResult<Option<LocalStack>>;
}

impl<B> Backend for Arc<B>
where
    B: Backend + ?Sized,
{
    fn id(&self) -> &BackendId {
        (**self).id()
    }

    fn occupied_slots(&self) -> DomainResult<BTreeSet<SlotIndex>> {
        (**self).occupied_slots()
    }

    fn slot_item(&self, slot: SlotIndex) -> DomainResult<Option<SlotItem>> {
        (**self).slot_item(slot)
    }

    fn slot_count(&self) -> DomainResult<u32> {
        (**self).slot_count()
    }

    fn push(&self, to: &ChannelName, from_slot: SlotIndex, count: u32) -> DomainResult<u32> {
        (**self).push(to, from_slot, count)
    }

    fn pull(
        &self,
        from: &ChannelName,
        from_slot: SlotIndex,
        limit: Option<u32>,
        to_slot: SlotIndex,
    ) -> DomainResult<u32> {
        (**self).pull(from, from_slot, limit, to_slot)
    }

    fn transfer_channels(&self) -> DomainResult<Vec<ChannelName>> {
        (**self).transfer_channels()
    }
}

/// Typed set of usable backends, iterated in lexical id order.
#[derive(Debug, Clone, Default)]
pub struct BackendSet {
    inner: BTreeMap<BackendId, Arc<dyn Backend>>,
}

impl BackendSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a backend under its own id, replacing any previous entry.
    pub fn insert(&mut self, backend: Arc<dyn Backend>) {
        self.inner.insert(backend.id().clone(), backend);
    }

    pub fn get(&self, id: &BackendId) -> Option<&Arc<dyn Backend>> {
        self.inner.get(id)
    }

    pub fn contains(&self, id: &BackendId) -> bool {
        self.inner.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&BackendId, &Arc<dyn Backend>)> {
        self.inner.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &BackendId> {
        self.inner.keys()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl FromIterator<Arc<dyn Backend>> for BackendSet {
    fn from_iter<T: IntoIterator<Item = Arc<dyn Backend>>>(iter: T) -> Self {
        let mut set = Self::new();
        for backend in iter {
            set.insert(backend);
        }
        set
    }
}
