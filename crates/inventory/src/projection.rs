//! Display projection: filtered, sorted, read-only views of the index.

use core::str::FromStr;

use serde::{Deserialize, Serialize};

use depot_core::{DomainError, DomainResult};

use crate::backend::BackendSet;
use crate::index::{ItemIndex, StackRecord};

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    /// Largest totals first.
    #[default]
    #[serde(alias = "quantity")]
    ByQuantityDesc,
    /// Alphabetical by display name.
    #[serde(alias = "name")]
    ByNameAsc,
}

impl FromStr for SortMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quantity" | "qty" | "count" | "by_quantity_desc" => Ok(Self::ByQuantityDesc),
            "name" | "by_name_asc" => Ok(Self::ByNameAsc),
            other => Err(DomainError::validation(format!(
                "unknown sort mode `{other}` (expected quantity or name)"
            ))),
        }
    }
}

/// Search text + sort mode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ViewQuery {
    pub search: String,
    pub sort: SortMode,
}

impl ViewQuery {
    /// Case-insensitive substring match on display name; empty matches all.
    pub fn matches(&self, record: &StackRecord) -> bool {
        self.search.is_empty()
            || record
                .display_name()
                .to_lowercase()
                .contains(&self.search.to_lowercase())
    }
}

/// Records to show, in display order. Stale zero-total records are hidden.
pub fn project<'a>(index: &'a ItemIndex, query: &ViewQuery) -> Vec<&'a StackRecord> {
    let mut rows: Vec<&StackRecord> = index
        .records()
        .filter(|r| r.total() > 0 && query.matches(r))
        .collect();

    match query.sort {
        SortMode::ByQuantityDesc => rows.sort_by(|a, b| {
            b.total()
                .cmp(&a.total())
                .then_with(|| a.display_name().cmp(b.display_name()))
                .then_with(|| a.identity().cmp(b.identity()))
        }),
        SortMode::ByNameAsc => rows.sort_by(|a, b| {
            a.display_name()
                .cmp(b.display_name())
                .then_with(|| a.identity().cmp(b.identity()))
        }),
    }

    rows
}

/// Storage-wide usage figures for a status line.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UsageSummary {
    pub kinds: usize,
    pub units: u64,
    pub used_slots: usize,
    pub total_slots: u64,
}

impl UsageSummary {
    pub fn compute(index: &ItemIndex, backends: &BackendSet) -> DomainResult<Self> {
        let mut total_slots = 0u64;
        for (_, backend) in backends.iter() {
            total_slots += u64::from(backend.slot_count()?);
        }

        Ok(Self {
            kinds: index.records().filter(|r| r.total() > 0).count(),
            units: index.total_units(),
            used_slots: index
                .records()
                .flat_map(StackRecord::entries)
                .filter(|e| e.quantity > 0)
                .count(),
            total_slots,
        })
    }

    /// Share of slots in use, 0.0 when there are no slots.
    pub fn fill_ratio(&self) -> f64 {
        if self.total_slots == 0 {
            return 0.0;
        }
        self.used_slots as f64 / self.total_slots as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SlotItem;
    use crate::testing::{FakeBackend, backend_set, stack};
    use depot_core::ItemIdentity;

    fn named(name: &str, display: &str, count: u32) -> SlotItem {
        SlotItem {
            identity: ItemIdentity::new(name, 0),
            display_name: display.to_string(),
            count,
            max_count: 64,
        }
    }

    fn sample_index() -> (ItemIndex, BackendSet) {
        let chest = FakeBackend::new("chest", 8)
            .with_slot(1, named("minecraft:cobblestone", "Cobblestone", 64))
            .with_slot(2, named("minecraft:cobblestone", "Cobblestone", 30))
            .with_slot(3, named("minecraft:iron_ingot", "Iron Ingot", 12))
            .with_slot(4, named("minecraft:gold_ingot", "Gold Ingot", 12))
            .with_slot(5, named("minecraft:diamond", "Diamond", 3))
            .shared();
        let backends = backend_set([chest]);
        (ItemIndex::build(&backends).unwrap(), backends)
    }

    fn names(rows: &[&StackRecord]) -> Vec<String> {
        rows.iter().map(|r| r.display_name().to_string()).collect()
    }

    #[test]
    fn quantity_order_breaks_ties_by_name() {
        let (index, _) = sample_index();
        let rows = project(&index, &ViewQuery::default());
        assert_eq!(names(&rows), vec!["Cobblestone", "Gold Ingot", "Iron Ingot", "Diamond"]);
    }

    #[test]
    fn name_order_is_alphabetical() {
        let (index, _) = sample_index();
        let query = ViewQuery {
            search: String::new(),
            sort: SortMode::ByNameAsc,
        };
        let rows = project(&index, &query);
        assert_eq!(names(&rows), vec!["Cobblestone", "Diamond", "Gold Ingot", "Iron Ingot"]);
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let (index, _) = sample_index();
        let query = ViewQuery {
            search: "INGOT".to_string(),
            sort: SortMode::ByNameAsc,
        };
        assert_eq!(names(&project(&index, &query)), vec!["Gold Ingot", "Iron Ingot"]);
    }

    #[test]
    fn zero_total_records_are_hidden() {
        let chest = FakeBackend::new("chest", 1).with_slot(1, stack("minecraft:stone", 4, 64)).shared();
        let mut index = ItemIndex::build(&backend_set([chest])).unwrap();
        let record = index.lookup_mut(&ItemIdentity::new("minecraft:stone", 0)).unwrap();
        record.entries[0].quantity = 0;
        record.total = 0;

        assert!(project(&index, &ViewQuery::default()).is_empty());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn sort_mode_parses_loosely() {
        assert_eq!("Quantity".parse::<SortMode>().unwrap(), SortMode::ByQuantityDesc);
        assert_eq!(" name ".parse::<SortMode>().unwrap(), SortMode::ByNameAsc);
        assert!("size".parse::<SortMode>().is_err());
    }

    #[test]
    fn usage_counts_slots_and_units() {
        let (index, backends) = sample_index();
        let usage = UsageSummary::compute(&index, &backends).unwrap();
        assert_eq!(usage.kinds, 4);
        assert_eq!(usage.units, 121);
        assert_eq!(usage.used_slots, 5);
        assert_eq!(usage.total_slots, 8);
        assert!((usage.fill_ratio() - 0.625).abs() < f64::EPSILON);
    }
}
