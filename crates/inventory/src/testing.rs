//! Test doubles for the backend and local inventory traits.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use depot_core::{BackendId, ChannelName, DomainError, DomainResult, ItemIdentity, SlotIndex};

use crate::backend::{Backend, BackendSet, LocalInventory, LocalStack, SlotItem};

pub(crate) const ACTOR: &str = "turtle_1";

pub(crate) fn stack(name: &str, count: u32, max_count: u32) -> SlotItem {
    SlotItem {
        identity: ItemIdentity::new(name, 0),
        display_name: name.to_string(),
        count,
        max_count,
    }
}

pub(crate) fn slot(i: u32) -> SlotIndex {
    SlotIndex::new(i).unwrap()
}

pub(crate) fn backend_set(backends: impl IntoIterator<Item = Arc<FakeBackend>>) -> BackendSet {
    backends
        .into_iter()
        .map(|b| b as Arc<dyn Backend>)
        .collect()
}

/// Local inventory shared between fakes, so pushes and pulls really move units.
#[derive(Debug, Default)]
pub(crate) struct FakeLocal {
    size: u32,
    slots: Mutex<BTreeMap<u32, LocalStack>>,
}

impl FakeLocal {
    pub(crate) fn new(size: u32) -> Arc<Self> {
        Arc::new(Self {
            size,
            slots: Mutex::new(BTreeMap::new()),
        })
    }

    pub(crate) fn put(&self, slot: u32, name: &str, count: u32) {
        self.slots.lock().unwrap().insert(
            slot,
            LocalStack {
                identity: ItemIdentity::new(name, 0),
                count,
            },
        );
    }

    pub(crate) fn count(&self, slot: u32) -> u32 {
        self.slots.lock().unwrap().get(&slot).map_or(0, |s| s.count)
    }

    pub(crate) fn total(&self) -> u32 {
        self.slots.lock().unwrap().values().map(|s| s.count).sum()
    }

    fn receive(&self, identity: &ItemIdentity, count: u32) {
        let mut slots = self.slots.lock().unwrap();
        if let Some(existing) = slots.values_mut().find(|s| &s.identity == identity) {
            existing.count += count;
            return;
        }
        let free = (1..=self.size).find(|i| !slots.contains_key(i)).unwrap_or(self.size + 1);
        slots.insert(
            free,
            LocalStack {
                identity: identity.clone(),
                count,
            },
        );
    }
}

impl LocalInventory for FakeLocal {
    fn slot_count(&self) -> u32 {
        self.size
    }

    fn slot_item(&self, slot: SlotIndex) -> DomainResult<Option<LocalStack>> {
        Ok(self.slots.lock().unwrap().get(&slot.get()).cloned())
    }
}

#[derive(Debug, Default)]
struct FakeState {
    slots: BTreeMap<u32, SlotItem>,
    push_calls: usize,
    pull_calls: usize,
}

/// Scriptable backend: fixed size, optional per-call transfer cap.
#[derive(Debug)]
pub(crate) struct FakeBackend {
    id: BackendId,
    size: u32,
    channels: Vec<ChannelName>,
    cap: Option<u32>,
    refused: BTreeSet<u32>,
    reported_pull: Option<u32>,
    local: Option<Arc<FakeLocal>>,
    state: Mutex<FakeState>,
}

impl FakeBackend {
    pub(crate) fn new(id: &str, size: u32) -> Self {
        Self {
            id: BackendId::new(id),
            size,
            channels: vec![ChannelName::new(ACTOR)],
            cap: None,
            refused: BTreeSet::new(),
            reported_pull: None,
            local: None,
            state: Mutex::new(FakeState::default()),
        }
    }

    pub(crate) fn with_slot(self, slot: u32, item: SlotItem) -> Self {
        self.state.lock().unwrap().slots.insert(slot, item);
        self
    }

    pub(crate) fn with_channels(mut self, channels: Vec<ChannelName>) -> Self {
        self.channels = channels;
        self
    }

    /// Every transfer moves at most `cap` units.
    pub(crate) fn with_cap(mut self, cap: u32) -> Self {
        self.cap = Some(cap);
        self
    }

    /// Pulls into `slot` always move nothing.
    pub(crate) fn with_refused_slot(mut self, slot: u32) -> Self {
        self.refused.insert(slot);
        self
    }

    /// Pulls move units as usual but report `count` to the caller.
    pub(crate) fn with_reported_pull(mut self, count: u32) -> Self {
        self.reported_pull = Some(count);
        self
    }

    pub(crate) fn with_local(mut self, local: &Arc<FakeLocal>) -> Self {
        self.local = Some(Arc::clone(local));
        self
    }

    pub(crate) fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub(crate) fn push_calls(&self) -> usize {
        self.state.lock().unwrap().push_calls
    }

    pub(crate) fn pull_calls(&self) -> usize {
        self.state.lock().unwrap().pull_calls
    }

    pub(crate) fn count(&self, slot: u32) -> u32 {
        self.state.lock().unwrap().slots.get(&slot).map_or(0, |s| s.count)
    }

    fn capped(&self, n: u32) -> u32 {
        self.cap.map_or(n, |cap| n.min(cap))
    }

    fn check_channel(&self, channel: &ChannelName) -> DomainResult<()> {
        if self.channels.contains(channel) {
            Ok(())
        } else {
            Err(DomainError::backend(self.id.clone(), format!("no channel {channel}")))
        }
    }
}

impl Backend for FakeBackend {
    fn id(&self) -> &BackendId {
        &self.id
    }

    fn occupied_slots(&self) -> DomainResult<BTreeSet<SlotIndex>> {
        let state = self.state.lock().unwrap();
        Ok(state.slots.keys().map(|i| slot(*i)).collect())
    }

    fn slot_item(&self, slot: SlotIndex) -> DomainResult<Option<SlotItem>> {
        Ok(self.state.lock().unwrap().slots.get(&slot.get()).cloned())
    }

    fn slot_count(&self) -> DomainResult<u32> {
        Ok(self.size)
    }

    fn push(&self, to: &ChannelName, from_slot: SlotIndex, count: u32) -> DomainResult<u32> {
        self.check_channel(to)?;
        let mut state = self.state.lock().unwrap();
        state.push_calls += 1;

        let Some(item) = state.slots.get_mut(&from_slot.get()) else {
            return Ok(0);
        };
        let moved = self.capped(count.min(item.count));
        item.count -= moved;
        let identity = item.identity.clone();
        if item.count == 0 {
            state.slots.remove(&from_slot.get());
        }
        if let Some(local) = &self.local {
            local.receive(&identity, moved);
        }
        Ok(moved)
    }

    fn pull(
        &self,
        from: &ChannelName,
        from_slot: SlotIndex,
        limit: Option<u32>,
        to_slot: SlotIndex,
    ) -> DomainResult<u32> {
        self.check_channel(from)?;
        let mut state = self.state.lock().unwrap();
        state.pull_calls += 1;

        let Some(local) = &self.local else {
            return Ok(0);
        };
        let mut local_slots = local.slots.lock().unwrap();
        let Some(source) = local_slots.get_mut(&from_slot.get()) else {
            return Ok(0);
        };

        let room = match state.slots.get(&to_slot.get()) {
            _ if self.refused.contains(&to_slot.get()) => 0,
            None if to_slot.get() <= self.size => 64,
            None => 0,
            Some(existing) if existing.identity == source.identity => {
                existing.max_count.saturating_sub(existing.count)
            }
            Some(_) => 0,
        };
        let moved = self.capped(room.min(source.count).min(limit.unwrap_or(u32::MAX)));
        if moved == 0 {
            return Ok(0);
        }

        let identity = source.identity.clone();
        source.count -= moved;
        if source.count == 0 {
            local_slots.remove(&from_slot.get());
        }
        state
            .slots
            .entry(to_slot.get())
            .or_insert_with(|| SlotItem {
                display_name: identity.name.clone(),
                identity,
                count: 0,
                max_count: 64,
            })
            .count += moved;
        Ok(self.reported_pull.unwrap_or(moved))
    }

    fn transfer_channels(&self) -> DomainResult<Vec<ChannelName>> {
        Ok(self.channels.clone())
    }
}
