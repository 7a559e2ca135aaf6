//! Deposit allocator: place units from the local actor into the aggregate.
//!
//! Two phases per local slot: top up existing partial stacks of the same item,
//! then spill into empty backend slots, creating index entries as needed.

use std::collections::BTreeMap;

use serde::Serialize;

use depot_core::{BackendId, DomainResult, ItemIdentity, SlotIndex};

use crate::backend::{Backend, LocalInventory};
use crate::index::{ItemIndex, ProvenanceEntry, StackRecord};
use crate::routing::TransferContext;

/// Stack size assumed when a freshly filled slot cannot be described.
const FALLBACK_MAX_COUNT: u32 = 64;

/// Per-pass snapshot of empty backend slots.
///
/// Each backend's listing is read once, the first time the pass needs it, and
/// slots are claimed as the pass fills them.
#[derive(Debug, Clone, Default)]
pub struct FreeSlots {
    snapshot: BTreeMap<BackendId, Vec<SlotIndex>>,
}

impl FreeSlots {
    pub fn new() -> Self {
        Self::default()
    }

    fn load(&mut self, backend: &dyn Backend) -> DomainResult<&[SlotIndex]> {
        if !self.snapshot.contains_key(backend.id()) {
            let count = backend.slot_count()?;
            let empty = if count == 0 {
                Vec::new()
            } else {
                let occupied = backend.occupied_slots()?;
                SlotIndex::range(count)
                    .filter(|slot| !occupied.contains(slot))
                    .collect()
            };
            tracing::debug!(backend = %backend.id(), slots = count, empty = empty.len(), "free slot snapshot");
            self.snapshot.insert(backend.id().clone(), empty);
        }
        Ok(self
            .snapshot
            .get(backend.id())
            .map(Vec::as_slice)
            .unwrap_or_default())
    }

    /// Mark a slot as no longer free (no-op if not in the snapshot).
    pub fn claim(&mut self, backend: &BackendId, slot: SlotIndex) {
        if let Some(slots) = self.snapshot.get_mut(backend) {
            slots.retain(|s| *s != slot);
        }
    }

    /// Known free slots for a backend, `None` if not loaded yet.
    pub fn known_free(&self, backend: &BackendId) -> Option<usize> {
        self.snapshot.get(backend).map(Vec::len)
    }
}

/// Result of depositing one local slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepositOutcome {
    pub local_slot: SlotIndex,
    pub identity: ItemIdentity,
    pub available: u32,
    pub deposited: u32,
}

impl DepositOutcome {
    /// Units that found no room and stay in the local slot.
    pub fn leftover(&self) -> u32 {
        self.available.saturating_sub(self.deposited)
    }
}

/// Result of a full deposit pass over the local inventory.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DepositReport {
    pub outcomes: Vec<DepositOutcome>,
}

impl DepositReport {
    pub fn deposited(&self) -> u64 {
        self.outcomes.iter().map(|o| u64::from(o.deposited)).sum()
    }

    pub fn leftover(&self) -> u64 {
        self.outcomes.iter().map(|o| u64::from(o.leftover())).sum()
    }
}

/// Entries created in empty slots, merged into the index once the phase ends.
#[derive(Debug, Default)]
struct Placements {
    metadata: Option<(String, u32)>,
    entries: Vec<ProvenanceEntry>,
}

impl Placements {
    fn total(&self) -> u32 {
        self.entries
            .iter()
            .fold(0u32, |total, e| total.saturating_add(e.quantity))
    }

    fn merge_into(self, index: &mut ItemIndex, identity: &ItemIdentity) {
        if self.entries.is_empty() {
            return;
        }
        let record = match index.lookup_mut(identity) {
            Some(record) => record,
            None => {
                let (display_name, max_count) = self.metadata.unwrap_or_else(|| {
                    tracing::warn!(item = %identity, "no slot metadata for new record; using defaults");
                    (identity.name.clone(), FALLBACK_MAX_COUNT)
                });
                index.insert(StackRecord::new(identity.clone(), display_name, max_count))
            }
        };
        for entry in self.entries {
            record.add_entry(entry);
        }
    }
}

/// Deposit up to `available` units of `identity` from `local_slot`.
///
/// Returns how many units the backends accepted; less than `available` is not
/// an error. A routing or backend failure aborts after recording every
/// transfer that already happened.
pub fn deposit(
    ctx: &TransferContext<'_>,
    index: &mut ItemIndex,
    free: &mut FreeSlots,
    identity: &ItemIdentity,
    local_slot: SlotIndex,
    available: u32,
) -> DomainResult<DepositOutcome> {
    let mut deposited = 0u32;

    if let Some(record) = index.lookup_mut(identity) {
        let mut filled = 0u32;
        let result = fill_partial_stacks(ctx, record, free, local_slot, available, &mut filled);
        record.total += u64::from(filled);
        record.check_consistency();
        deposited = deposited.saturating_add(filled);
        result?;
    }

    if deposited < available {
        let needs_metadata = index.lookup(identity).is_none();
        let mut placed = Placements::default();
        let result = fill_free_slots(
            ctx,
            free,
            local_slot,
            available - deposited,
            needs_metadata,
            &mut placed,
        );
        deposited = deposited.saturating_add(placed.total());
        placed.merge_into(index, identity);
        result?;
    }

    if deposited < available {
        tracing::warn!(
            item = %identity,
            slot = %local_slot,
            available,
            deposited,
            "storage out of room for item"
        );
    }

    Ok(DepositOutcome {
        local_slot,
        identity: identity.clone(),
        available,
        deposited,
    })
}

fn fill_partial_stacks(
    ctx: &TransferContext<'_>,
    record: &mut StackRecord,
    free: &mut FreeSlots,
    local_slot: SlotIndex,
    available: u32,
    filled: &mut u32,
) -> DomainResult<()> {
    let max_count = record.max_count();
    let mut remaining = available;

    for entry in record.entries.iter_mut() {
        if remaining == 0 {
            break;
        }

        let room = max_count.saturating_sub(entry.quantity);
        if room == 0 {
            continue;
        }

        let offer = room.min(remaining);
        let (backend, channel) = ctx.route(&entry.backend)?;
        let moved = backend.pull(&channel, local_slot, Some(offer), entry.slot)?;
        tracing::debug!(backend = %entry.backend, slot = %entry.slot, offer, moved, "top up stack");

        if moved > 0 {
            // A drained entry's slot is physically empty and may sit in the snapshot.
            free.claim(&entry.backend, entry.slot);
        }
        entry.quantity = entry.quantity.saturating_add(moved);
        remaining = remaining.saturating_sub(moved);
        *filled = filled.saturating_add(moved);
    }

    Ok(())
}

fn fill_free_slots(
    ctx: &TransferContext<'_>,
    free: &mut FreeSlots,
    local_slot: SlotIndex,
    amount: u32,
    needs_metadata: bool,
    placed: &mut Placements,
) -> DomainResult<()> {
    let mut remaining = amount;

    for (id, backend) in ctx.backends.iter() {
        if remaining == 0 {
            break;
        }

        let candidates = free.load(backend.as_ref())?.to_vec();
        if candidates.is_empty() {
            continue;
        }
        let (_, channel) = ctx.route(id)?;

        for slot in candidates {
            if remaining == 0 {
                break;
            }

            let moved = backend.pull(&channel, local_slot, Some(remaining), slot)?;
            if moved == 0 {
                // Restricted slots may refuse while later ones accept.
                tracing::debug!(backend = %id, slot = %slot, "empty slot refused transfer");
                continue;
            }

            free.claim(id, slot);
            placed.entries.push(ProvenanceEntry {
                backend: id.clone(),
                slot,
                quantity: moved,
            });
            remaining = remaining.saturating_sub(moved);
            tracing::debug!(backend = %id, slot = %slot, moved, "filled empty slot");

            if needs_metadata && placed.metadata.is_none() {
                placed.metadata = backend
                    .slot_item(slot)?
                    .map(|item| (item.display_name, item.max_count));
            }
        }
    }

    Ok(())
}

/// Deposit every occupied local slot, in slot order, sharing one free-slot snapshot.
pub fn deposit_all(
    ctx: &TransferContext<'_>,
    index: &mut ItemIndex,
    local: &dyn LocalInventory,
) -> DomainResult<DepositReport> {
    let mut free = FreeSlots::new();
    let mut report = DepositReport::default();

    for slot in SlotIndex::range(local.slot_count()) {
        let Some(stack) = local.slot_item(slot)? else {
            continue;
        };
        if stack.count == 0 {
            continue;
        }
        let outcome = deposit(ctx, index, &mut free, &stack.identity, slot, stack.count)?;
        report.outcomes.push(outcome);
    }

    tracing::info!(
        slots = report.outcomes.len(),
        deposited = report.deposited(),
        leftover = report.leftover(),
        "deposit pass finished"
    );
    Ok(report)
}
