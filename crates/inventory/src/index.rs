//! Item index: the aggregated view of every backend's contents.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use depot_core::{BackendId, DomainResult, ItemIdentity, SlotIndex};

use crate::backend::BackendSet;

/// One physical location contributing to a stack record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvenanceEntry {
    pub backend: BackendId,
    pub slot: SlotIndex,
    /// Units believed present at `backend`/`slot`.
    pub quantity: u32,
}

/// Aggregated view of one item identity across all backends.
///
/// `total` always equals the sum of the entries' quantities between
/// completed operations. Entries keep discovery order; a record whose total
/// reached zero stays in the index until the next refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StackRecord {
    identity: ItemIdentity,
    display_name: String,
    max_count: u32,
    pub(crate) total: u64,
    pub(crate) entries: Vec<ProvenanceEntry>,
}

impl StackRecord {
    pub fn new(identity: ItemIdentity, display_name: impl Into<String>, max_count: u32) -> Self {
        Self {
            identity,
            display_name: display_name.into(),
            max_count,
            total: 0,
            entries: Vec::new(),
        }
    }

    pub fn identity(&self) -> &ItemIdentity {
        &self.identity
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// Per-slot stack capacity.
    pub fn max_count(&self) -> u32 {
        self.max_count
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn entries(&self) -> &[ProvenanceEntry] {
        &self.entries
    }

    /// Append a location and add its quantity to the total.
    pub fn add_entry(&mut self, entry: ProvenanceEntry) {
        self.total += u64::from(entry.quantity);
        self.entries.push(entry);
    }

    /// Sum of entry quantities (what `total` must equal).
    pub fn entry_sum(&self) -> u64 {
        self.entries.iter().map(|e| u64::from(e.quantity)).sum()
    }

    pub fn is_consistent(&self) -> bool {
        self.total == self.entry_sum()
    }

    /// Log when the sum invariant drifted (e.g. a backend moved more than offered).
    pub(crate) fn check_consistency(&self) {
        if !self.is_consistent() {
            tracing::warn!(
                item = %self.identity,
                total = self.total,
                entry_sum = self.entry_sum(),
                "stack record total drifted from provenance sum"
            );
        }
    }
}

/// Mapping from item identity to its stack record.
///
/// Rebuilt from scratch by [`ItemIndex::build`]; mutated in place by the
/// allocators between rebuilds.
#[derive(Debug, Clone, Default)]
pub struct ItemIndex {
    records: HashMap<ItemIdentity, StackRecord>,
    refreshed_at: Option<DateTime<Utc>>,
}

impl ItemIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full scan: every occupied slot of every backend, in lexical backend order.
    pub fn build(backends: &BackendSet) -> DomainResult<Self> {
        let mut index = Self::new();

        for (id, backend) in backends.iter() {
            let occupied = backend.occupied_slots()?;
            tracing::debug!(backend = %id, occupied = occupied.len(), "scanning backend");

            for slot in occupied {
                // Slot may have emptied between listing and detail fetch.
                let Some(item) = backend.slot_item(slot)? else {
                    continue;
                };
                if item.count == 0 {
                    continue;
                }

                let record = index
                    .records
                    .entry(item.identity.clone())
                    .or_insert_with(|| StackRecord::new(item.identity, item.display_name, item.max_count));
                record.add_entry(ProvenanceEntry {
                    backend: id.clone(),
                    slot,
                    quantity: item.count,
                });
            }
        }

        index.refreshed_at = Some(Utc::now());
        tracing::info!(
            backends = backends.len(),
            kinds = index.len(),
            units = index.total_units(),
            "item index rebuilt"
        );
        Ok(index)
    }

    pub fn lookup(&self, identity: &ItemIdentity) -> Option<&StackRecord> {
        self.records.get(identity)
    }

    pub fn lookup_mut(&mut self, identity: &ItemIdentity) -> Option<&mut StackRecord> {
        self.records.get_mut(identity)
    }

    /// Insert a record; an existing record for the same identity is kept.
    pub fn insert(&mut self, record: StackRecord) -> &mut StackRecord {
        self.records.entry(record.identity.clone()).or_insert(record)
    }

    pub fn records(&self) -> impl Iterator<Item = &StackRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_units(&self) -> u64 {
        self.records.values().map(StackRecord::total).sum()
    }

    /// Time of the last full scan, `None` if never built.
    pub fn refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.refreshed_at
    }
}
