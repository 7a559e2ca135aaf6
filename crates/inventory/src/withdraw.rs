//! Withdrawal allocator: pull units out of the aggregate into the local actor.

use serde::Serialize;

use depot_core::{DomainResult, ItemIdentity};

use crate::index::StackRecord;
use crate::routing::TransferContext;

/// Result of one withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WithdrawOutcome {
    pub identity: ItemIdentity,
    pub requested: u32,
    pub withdrawn: u32,
}

impl WithdrawOutcome {
    /// Units requested but not delivered (under-supply or short transfers).
    pub fn shortfall(&self) -> u32 {
        self.requested.saturating_sub(self.withdrawn)
    }
}

/// Move up to `requested` units of `record`'s item to the local actor.
///
/// `None` requests one full stack (`record.max_count()`). Entries are drained
/// in stored order and iteration stops as soon as the request is met. Only the
/// count each backend reports as moved is trusted. Delivering fewer units than
/// requested is not an error.
///
/// A routing or backend failure aborts the withdrawal. Transfers that already
/// happened stay applied and are reflected in the record before the error is
/// returned.
pub fn withdraw(
    ctx: &TransferContext<'_>,
    record: &mut StackRecord,
    requested: Option<u32>,
) -> DomainResult<WithdrawOutcome> {
    let requested = requested.unwrap_or(record.max_count());
    let mut withdrawn = 0u32;

    let result = drain_entries(ctx, record, requested, &mut withdrawn);

    record.total = record.total.saturating_sub(u64::from(withdrawn));
    record.check_consistency();
    result?;

    if withdrawn < requested {
        tracing::info!(
            item = %record.identity(),
            requested,
            withdrawn,
            "withdrawal under-supplied"
        );
    }

    Ok(WithdrawOutcome {
        identity: record.identity().clone(),
        requested,
        withdrawn,
    })
}

fn drain_entries(
    ctx: &TransferContext<'_>,
    record: &mut StackRecord,
    requested: u32,
    withdrawn: &mut u32,
) -> DomainResult<()> {
    let mut remaining = requested;

    for entry in record.entries.iter_mut() {
        if remaining == 0 {
            break;
        }

        let offer = remaining.min(entry.quantity);
        if offer == 0 {
            continue;
        }

        let (backend, channel) = ctx.route(&entry.backend)?;
        let moved = backend.push(&channel, entry.slot, offer)?;

        tracing::debug!(
            backend = %entry.backend,
            slot = %entry.slot,
            offer,
            moved,
            "withdraw transfer"
        );
        if moved < offer {
            tracing::warn!(backend = %entry.backend, slot = %entry.slot, offer, moved, "short push");
        }

        entry.quantity = entry.quantity.saturating_sub(moved);
        remaining = remaining.saturating_sub(moved);
        *withdrawn = withdrawn.saturating_add(moved);
    }

    Ok(())
}
