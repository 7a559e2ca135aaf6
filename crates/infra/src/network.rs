//! In-memory backend network for tests/dev.
//!
//! Models a set of named containers plus the local actor's inventory behind
//! one shared lock. Pushes and pulls really move units (respecting stack
//! limits and item identity), so short transfers happen the same way they do
//! against real containers.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};

use depot_core::{BackendId, ChannelName, DomainError, DomainResult, ItemIdentity, SlotIndex};
use depot_inventory::{Backend, LocalInventory, LocalStack, SlotItem};

use crate::discovery::PeripheralHost;

const DEFAULT_MAX_COUNT: u32 = 64;

/// Units sitting in one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredStack {
    pub identity: ItemIdentity,
    pub display_name: String,
    pub count: u32,
    pub max_count: u32,
}

impl StoredStack {
    /// Stack whose display name is its type name and that holds 64 per slot.
    pub fn new(identity: ItemIdentity, count: u32) -> Self {
        Self {
            display_name: identity.name.clone(),
            identity,
            count,
            max_count: DEFAULT_MAX_COUNT,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn with_max_count(mut self, max_count: u32) -> Self {
        self.max_count = max_count;
        self
    }

    fn to_slot_item(&self) -> SlotItem {
        SlotItem {
            identity: self.identity.clone(),
            display_name: self.display_name.clone(),
            count: self.count,
            max_count: self.max_count,
        }
    }
}

/// Per-backend call counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CallCounts {
    pub list: usize,
    pub detail: usize,
    pub size: usize,
    pub push: usize,
    pub pull: usize,
    pub channels: usize,
}

impl CallCounts {
    pub fn transfers(&self) -> usize {
        self.push + self.pull
    }
}

#[derive(Debug)]
struct Container {
    slots: Vec<Option<StoredStack>>,
    channels: Vec<ChannelName>,
    transfer_cap: Option<u32>,
    calls: CallCounts,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Location {
    Local,
    Container(BackendId),
}

#[derive(Debug)]
struct NetworkState {
    local_actor: ChannelName,
    local: Vec<Option<StoredStack>>,
    containers: BTreeMap<BackendId, Container>,
    /// Attached peripherals without the inventory capability (modems, monitors).
    others: BTreeSet<String>,
}

impl NetworkState {
    fn container(&self, id: &BackendId) -> DomainResult<&Container> {
        self.containers
            .get(id)
            .ok_or_else(|| DomainError::backend(id.clone(), "detached"))
    }

    fn container_mut(&mut self, id: &BackendId) -> DomainResult<&mut Container> {
        self.containers
            .get_mut(id)
            .ok_or_else(|| DomainError::backend(id.clone(), "detached"))
    }

    /// Where a channel leads, as seen from container `from`.
    fn locate(&self, from: &BackendId, channel: &ChannelName) -> DomainResult<Location> {
        let container = self.container(from)?;
        if !container.channels.contains(channel) {
            return Err(DomainError::backend(
                from.clone(),
                format!("no transfer channel named {channel}"),
            ));
        }
        if *channel == self.local_actor {
            return Ok(Location::Local);
        }
        let target = BackendId::new(channel.as_str());
        if target != *from && self.containers.contains_key(&target) {
            return Ok(Location::Container(target));
        }
        Err(DomainError::backend(
            from.clone(),
            format!("transfer channel {channel} leads nowhere"),
        ))
    }

    fn slots_mut(&mut self, at: &Location) -> DomainResult<&mut Vec<Option<StoredStack>>> {
        match at {
            Location::Local => Ok(&mut self.local),
            Location::Container(id) => Ok(&mut self.container_mut(id)?.slots),
        }
    }

    /// Move up to `limit` units; `to_slot = None` stacks onto matches first, then empties.
    fn transfer(
        &mut self,
        from: &Location,
        from_slot: SlotIndex,
        to: &Location,
        to_slot: Option<SlotIndex>,
        limit: u32,
    ) -> DomainResult<u32> {
        let index = from_slot.get() as usize - 1;
        let Some(mut moving) = self.slots_mut(from)?.get_mut(index).and_then(Option::take) else {
            return Ok(0);
        };

        let wanted = limit.min(moving.count);
        let moved = match self.slots_mut(to) {
            Ok(dest) => place(dest, &moving, to_slot, wanted),
            Err(e) => {
                self.slots_mut(from)?[index] = Some(moving);
                return Err(e);
            }
        };

        moving.count -= moved;
        if moving.count > 0 {
            self.slots_mut(from)?[index] = Some(moving);
        }
        Ok(moved)
    }
}

/// Put up to `wanted` units of `stack` into `dest`, returning how many fit.
fn place(
    dest: &mut [Option<StoredStack>],
    stack: &StoredStack,
    to_slot: Option<SlotIndex>,
    wanted: u32,
) -> u32 {
    let mut left = wanted;
    let targets: Vec<usize> = match to_slot {
        Some(slot) => vec![slot.get() as usize - 1],
        None => {
            let matching = (0..dest.len())
                .filter(|i| dest[*i].as_ref().is_some_and(|s| s.identity == stack.identity));
            let empty = (0..dest.len()).filter(|i| dest[*i].is_none());
            matching.chain(empty).collect()
        }
    };

    for i in targets {
        if left == 0 {
            break;
        }
        let Some(cell) = dest.get_mut(i) else {
            continue;
        };
        match cell {
            Some(existing) if existing.identity == stack.identity => {
                let n = left.min(existing.max_count.saturating_sub(existing.count));
                existing.count += n;
                left -= n;
            }
            Some(_) => {}
            None => {
                let n = left.min(stack.max_count);
                let mut fresh = stack.clone();
                fresh.count = n;
                *cell = Some(fresh);
                left -= n;
            }
        }
    }

    wanted - left
}

/// Shared in-memory world: containers + the local actor.
#[derive(Debug, Clone)]
pub struct InMemoryNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl InMemoryNetwork {
    pub fn new(local_actor: impl Into<ChannelName>, local_slots: u32) -> Self {
        Self {
            state: Arc::new(Mutex::new(NetworkState {
                local_actor: local_actor.into(),
                local: vec![None; local_slots as usize],
                containers: BTreeMap::new(),
                others: BTreeSet::new(),
            })),
        }
    }

    fn lock(&self) -> DomainResult<MutexGuard<'_, NetworkState>> {
        self.state
            .lock()
            .map_err(|_| DomainError::backend(BackendId::new("network"), "state lock poisoned"))
    }

    /// Attach a container reachable from the local actor only.
    pub fn add_container(&self, name: impl Into<BackendId>, size: u32) -> DomainResult<()> {
        let mut state = self.lock()?;
        let channels = vec![state.local_actor.clone()];
        state.containers.insert(
            name.into(),
            Container {
                slots: vec![None; size as usize],
                channels,
                transfer_cap: None,
                calls: CallCounts::default(),
            },
        );
        Ok(())
    }

    /// Attach a peripheral that is not an inventory.
    pub fn add_peripheral(&self, name: impl Into<String>) -> DomainResult<()> {
        self.lock()?.others.insert(name.into());
        Ok(())
    }

    pub fn set_channels(&self, container: &BackendId, channels: Vec<ChannelName>) -> DomainResult<()> {
        self.lock()?.container_mut(container)?.channels = channels;
        Ok(())
    }

    /// Every push/pull on `container` moves at most `cap` units.
    pub fn set_transfer_cap(&self, container: &BackendId, cap: Option<u32>) -> DomainResult<()> {
        self.lock()?.container_mut(container)?.transfer_cap = cap;
        Ok(())
    }

    pub fn put(&self, container: &BackendId, slot: SlotIndex, stack: StoredStack) -> DomainResult<()> {
        let mut state = self.lock()?;
        let cell = state
            .container_mut(container)?
            .slots
            .get_mut(slot.get() as usize - 1)
            .ok_or_else(|| DomainError::validation(format!("{container} has no slot {slot}")))?;
        *cell = Some(stack);
        Ok(())
    }

    pub fn put_local(&self, slot: SlotIndex, stack: StoredStack) -> DomainResult<()> {
        let mut state = self.lock()?;
        let cell = state
            .local
            .get_mut(slot.get() as usize - 1)
            .ok_or_else(|| DomainError::validation(format!("local inventory has no slot {slot}")))?;
        *cell = Some(stack);
        Ok(())
    }

    pub fn contents(&self, container: &BackendId, slot: SlotIndex) -> DomainResult<Option<StoredStack>> {
        let state = self.lock()?;
        Ok(state
            .container(container)?
            .slots
            .get(slot.get() as usize - 1)
            .cloned()
            .flatten())
    }

    pub fn local_contents(&self, slot: SlotIndex) -> DomainResult<Option<StoredStack>> {
        let state = self.lock()?;
        Ok(state.local.get(slot.get() as usize - 1).cloned().flatten())
    }

    /// Units of `identity` across every container (ground truth for tests).
    pub fn stored_units(&self, identity: &ItemIdentity) -> DomainResult<u64> {
        let state = self.lock()?;
        Ok(state
            .containers
            .values()
            .flat_map(|c| c.slots.iter().flatten())
            .filter(|s| &s.identity == identity)
            .map(|s| u64::from(s.count))
            .sum())
    }

    pub fn local_units(&self) -> DomainResult<u64> {
        let state = self.lock()?;
        Ok(state.local.iter().flatten().map(|s| u64::from(s.count)).sum())
    }

    pub fn calls(&self, container: &BackendId) -> DomainResult<CallCounts> {
        Ok(self.lock()?.container(container)?.calls)
    }

    pub fn reset_calls(&self) -> DomainResult<()> {
        for container in self.lock()?.containers.values_mut() {
            container.calls = CallCounts::default();
        }
        Ok(())
    }

    pub fn backend(&self, id: &BackendId) -> Option<InMemoryBackend> {
        let state = self.lock().ok()?;
        state.containers.contains_key(id).then(|| InMemoryBackend {
            id: id.clone(),
            network: self.clone(),
        })
    }

    pub fn local_inventory(&self) -> DomainResult<InMemoryLocalInventory> {
        let slots = self.lock()?.local.len() as u32;
        Ok(InMemoryLocalInventory {
            network: self.clone(),
            slots,
        })
    }

    /// Build a network from a fixture description.
    ///
    /// `default_local_slots` sizes the local inventory unless the fixture says otherwise.
    pub fn from_fixture(fixture: &WorldFixture, default_local_slots: u32) -> DomainResult<Self> {
        let local_slots = fixture.local_slots.unwrap_or(default_local_slots);
        let network = Self::new(fixture.local_actor.as_str(), local_slots);

        for c in &fixture.containers {
            let id = BackendId::new(c.name.as_str());
            network.add_container(id.clone(), c.size)?;
            if !c.channels.is_empty() {
                network.set_channels(&id, c.channels.iter().map(|n| ChannelName::new(n.as_str())).collect())?;
            }
            network.set_transfer_cap(&id, c.transfer_cap)?;
            for s in &c.slots {
                network.put(&id, SlotIndex::try_from(s.slot)?, s.to_stack())?;
            }
        }
        for s in &fixture.local {
            network.put_local(SlotIndex::try_from(s.slot)?, s.to_stack())?;
        }
        for name in &fixture.peripherals {
            network.add_peripheral(name.as_str())?;
        }

        Ok(network)
    }
}

impl PeripheralHost for InMemoryNetwork {
    fn peripheral_names(&self) -> DomainResult<Vec<String>> {
        let state = self.lock()?;
        let mut names: BTreeSet<String> = state.containers.keys().map(|id| id.to_string()).collect();
        names.extend(state.others.iter().cloned());
        names.insert(state.local_actor.to_string());
        Ok(names.into_iter().collect())
    }

    fn connect(&self, name: &str) -> Option<Arc<dyn Backend>> {
        self.backend(&BackendId::new(name))
            .map(|b| Arc::new(b) as Arc<dyn Backend>)
    }
}

/// Handle to one container of an [`InMemoryNetwork`].
#[derive(Debug, Clone)]
pub struct InMemoryBackend {
    id: BackendId,
    network: InMemoryNetwork,
}

impl InMemoryBackend {
    fn with_container<T>(&self, f: impl FnOnce(&mut Container) -> T) -> DomainResult<T> {
        let mut state = self.network.lock()?;
        Ok(f(state.container_mut(&self.id)?))
    }

    fn capped(&self, state: &NetworkState, n: u32) -> DomainResult<u32> {
        let cap = state.container(&self.id)?.transfer_cap;
        Ok(cap.map_or(n, |cap| n.min(cap)))
    }
}

impl Backend for InMemoryBackend {
    fn id(&self) -> &BackendId {
        &self.id
    }

    fn occupied_slots(&self) -> DomainResult<BTreeSet<SlotIndex>> {
        self.with_container(|c| {
            c.calls.list += 1;
            c.slots
                .iter()
                .enumerate()
                .filter(|(_, s)| s.is_some())
                .filter_map(|(i, _)| SlotIndex::new(i as u32 + 1).ok())
                .collect()
        })
    }

    fn slot_item(&self, slot: SlotIndex) -> DomainResult<Option<SlotItem>> {
        self.with_container(|c| {
            c.calls.detail += 1;
            c.slots
                .get(slot.get() as usize - 1)
                .and_then(Option::as_ref)
                .map(StoredStack::to_slot_item)
        })
    }

    fn slot_count(&self) -> DomainResult<u32> {
        self.with_container(|c| {
            c.calls.size += 1;
            c.slots.len() as u32
        })
    }

    fn push(&self, to: &ChannelName, from_slot: SlotIndex, count: u32) -> DomainResult<u32> {
        let mut state = self.network.lock()?;
        state.container_mut(&self.id)?.calls.push += 1;
        let dest = state.locate(&self.id, to)?;
        let limit = self.capped(&state, count)?;
        state.transfer(&Location::Container(self.id.clone()), from_slot, &dest, None, limit)
    }

    fn pull(
        &self,
        from: &ChannelName,
        from_slot: SlotIndex,
        limit: Option<u32>,
        to_slot: SlotIndex,
    ) -> DomainResult<u32> {
        let mut state = self.network.lock()?;
        state.container_mut(&self.id)?.calls.pull += 1;
        let source = state.locate(&self.id, from)?;
        let limit = self.capped(&state, limit.unwrap_or(u32::MAX))?;
        state.transfer(
            &source,
            from_slot,
            &Location::Container(self.id.clone()),
            Some(to_slot),
            limit,
        )
    }

    fn transfer_channels(&self) -> DomainResult<Vec<ChannelName>> {
        self.with_container(|c| {
            c.calls.channels += 1;
            c.channels.clone()
        })
    }
}

/// The local actor's inventory inside an [`InMemoryNetwork`].
#[derive(Debug, Clone)]
pub struct InMemoryLocalInventory {
    network: InMemoryNetwork,
    slots: u32,
}

impl LocalInventory for InMemoryLocalInventory {
    fn slot_count(&self) -> u32 {
        self.slots
    }

    fn slot_item(&self, slot: SlotIndex) -> DomainResult<Option<LocalStack>> {
        Ok(self.network.local_contents(slot)?.map(|s| LocalStack {
            identity: s.identity,
            count: s.count,
        }))
    }
}

/// JSON description of a world, used by the line driver and tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldFixture {
    pub local_actor: String,
    #[serde(default)]
    pub local_slots: Option<u32>,
    #[serde(default)]
    pub local: Vec<FixtureSlot>,
    #[serde(default)]
    pub containers: Vec<FixtureContainer>,
    /// Non-inventory peripherals.
    #[serde(default)]
    pub peripherals: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureContainer {
    pub name: String,
    pub size: u32,
    /// Defaults to just the local actor.
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default)]
    pub transfer_cap: Option<u32>,
    #[serde(default)]
    pub slots: Vec<FixtureSlot>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixtureSlot {
    pub slot: u32,
    pub item: String,
    #[serde(default)]
    pub damage: u32,
    pub count: u32,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub max_count: Option<u32>,
}

impl FixtureSlot {
    fn to_stack(&self) -> StoredStack {
        let stack = StoredStack::new(ItemIdentity::new(self.item.as_str(), self.damage), self.count)
            .with_max_count(self.max_count.unwrap_or(DEFAULT_MAX_COUNT));
        match &self.display_name {
            Some(name) => stack.with_display_name(name.as_str()),
            None => stack,
        }
    }
}

impl WorldFixture {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slot(i: u32) -> SlotIndex {
        SlotIndex::new(i).unwrap()
    }

    fn stone(count: u32) -> StoredStack {
        StoredStack::new(ItemIdentity::new("minecraft:stone", 0), count)
    }

    fn network() -> (InMemoryNetwork, BackendId) {
        let net = InMemoryNetwork::new("turtle_1", 4);
        let chest = BackendId::new("minecraft:chest_0");
        net.add_container(chest.clone(), 3).unwrap();
        (net, chest)
    }

    #[test]
    fn push_stacks_onto_matching_local_slot_first() {
        let (net, chest) = network();
        net.put(&chest, slot(1), stone(30)).unwrap();
        net.put_local(slot(3), stone(60)).unwrap();
        let backend = net.backend(&chest).unwrap();

        let moved = backend.push(&ChannelName::new("turtle_1"), slot(1), 30).unwrap();

        assert_eq!(moved, 30);
        assert_eq!(net.local_contents(slot(3)).unwrap().unwrap().count, 64);
        assert_eq!(net.local_contents(slot(1)).unwrap().unwrap().count, 26);
        assert!(net.contents(&chest, slot(1)).unwrap().is_none());
    }

    #[test]
    fn pull_respects_stack_limit_and_identity() {
        let (net, chest) = network();
        net.put(&chest, slot(1), stone(60)).unwrap();
        net.put(&chest, slot(2), StoredStack::new(ItemIdentity::new("minecraft:dirt", 0), 1)).unwrap();
        net.put_local(slot(1), stone(10)).unwrap();
        let backend = net.backend(&chest).unwrap();
        let actor = ChannelName::new("turtle_1");

        assert_eq!(backend.pull(&actor, slot(1), None, slot(1)).unwrap(), 4);
        assert_eq!(backend.pull(&actor, slot(1), None, slot(2)).unwrap(), 0);
        assert_eq!(backend.pull(&actor, slot(1), Some(2), slot(3)).unwrap(), 2);
        assert_eq!(net.local_contents(slot(1)).unwrap().unwrap().count, 4);
        assert_eq!(net.calls(&chest).unwrap().pull, 3);
    }

    #[test]
    fn transfer_cap_forces_short_transfers() {
        let (net, chest) = network();
        net.put(&chest, slot(1), stone(40)).unwrap();
        net.set_transfer_cap(&chest, Some(8)).unwrap();
        let backend = net.backend(&chest).unwrap();

        assert_eq!(backend.push(&ChannelName::new("turtle_1"), slot(1), 40).unwrap(), 8);
        assert_eq!(net.contents(&chest, slot(1)).unwrap().unwrap().count, 32);
    }

    #[test]
    fn unknown_channel_is_a_backend_error() {
        let (net, chest) = network();
        net.put(&chest, slot(1), stone(1)).unwrap();
        let backend = net.backend(&chest).unwrap();

        let err = backend.push(&ChannelName::new("turtle_9"), slot(1), 1).unwrap_err();
        assert!(matches!(err, DomainError::Backend { .. }));
        assert_eq!(net.contents(&chest, slot(1)).unwrap().unwrap().count, 1);
    }

    #[test]
    fn container_to_container_channel_moves_units() {
        let (net, chest) = network();
        let other = BackendId::new("minecraft:chest_1");
        net.add_container(other.clone(), 1).unwrap();
        net.set_channels(&chest, vec![ChannelName::new("minecraft:chest_1")]).unwrap();
        net.put(&chest, slot(1), stone(5)).unwrap();

        let moved = net
            .backend(&chest)
            .unwrap()
            .push(&ChannelName::new("minecraft:chest_1"), slot(1), 5)
            .unwrap();
        assert_eq!(moved, 5);
        assert_eq!(net.contents(&other, slot(1)).unwrap().unwrap().count, 5);
    }

    #[test]
    fn fixture_builds_world() {
        let json = r#"{
            "local_actor": "turtle_2",
            "local": [{ "slot": 1, "item": "minecraft:stone", "count": 12 }],
            "containers": [
                { "name": "minecraft:chest_0", "size": 27, "slots": [
                    { "slot": 3, "item": "minecraft:wool", "damage": 14, "count": 9, "display_name": "Red Wool" }
                ]}
            ],
            "peripherals": ["monitor_0"]
        }"#;
        let fixture = WorldFixture::from_json_str(json).unwrap();
        let net = InMemoryNetwork::from_fixture(&fixture, 16).unwrap();

        let wool = net.contents(&BackendId::new("minecraft:chest_0"), slot(3)).unwrap().unwrap();
        assert_eq!(wool.display_name, "Red Wool");
        assert_eq!(wool.identity, ItemIdentity::new("minecraft:wool", 14));
        assert_eq!(net.local_units().unwrap(), 12);
        assert_eq!(net.local_inventory().unwrap().slot_count(), 16);
        assert_eq!(
            net.peripheral_names().unwrap(),
            vec!["minecraft:chest_0", "monitor_0", "turtle_2"]
        );
    }

    #[test]
    fn fixture_local_slots_fall_back_to_configured_default() {
        let unsized_world = WorldFixture::from_json_str(r#"{ "local_actor": "turtle_1" }"#).unwrap();
        let net = InMemoryNetwork::from_fixture(&unsized_world, 27).unwrap();
        assert_eq!(net.local_inventory().unwrap().slot_count(), 27);

        let sized_world =
            WorldFixture::from_json_str(r#"{ "local_actor": "turtle_1", "local_slots": 9 }"#).unwrap();
        let net = InMemoryNetwork::from_fixture(&sized_world, 27).unwrap();
        assert_eq!(net.local_inventory().unwrap().slot_count(), 9);
    }

    #[test]
    fn fixture_slot_zero_is_rejected() {
        let json = r#"{
            "local_actor": "turtle_1",
            "local": [{ "slot": 0, "item": "minecraft:stone", "count": 1 }]
        }"#;
        let fixture = WorldFixture::from_json_str(json).unwrap();
        assert!(matches!(
            InMemoryNetwork::from_fixture(&fixture, 16),
            Err(DomainError::Validation(_))
        ));
    }
}
