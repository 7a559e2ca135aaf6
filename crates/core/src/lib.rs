//! `depot-core` — identity and provenance building blocks.
//!
//! This crate contains **pure domain** primitives shared by the aggregation
//! engine and its adapters (no backend I/O).

pub mod error;
pub mod id;
pub mod item;

pub use error::{DomainError, DomainResult};
pub use id::{BackendId, ChannelName, OperationId, SlotIndex};
pub use item::ItemIdentity;
