//! Aggregation and allocation engine.
//!
//! This crate turns many independent storage backends into one logical item
//! index, and moves units between that index and the local actor's inventory.
//! It is deterministic domain logic over the [`Backend`] and
//! [`LocalInventory`] traits; concrete adapters live elsewhere.

pub mod backend;
pub mod deposit;
pub mod index;
pub mod projection;
pub mod routing;
pub mod withdraw;

#[cfg(test)]
pub(crate) mod testing;

pub use backend::{Backend, BackendSet, LocalInventory, LocalStack, SlotItem};
pub use deposit::{DepositOutcome, DepositReport, FreeSlots, deposit, deposit_all};
pub use index::{ItemIndex, ProvenanceEntry, StackRecord};
pub use projection::{SortMode, UsageSummary, ViewQuery, project};
pub use routing::{RoutingPolicy, TransferContext};
pub use withdraw::{WithdrawOutcome, withdraw};
