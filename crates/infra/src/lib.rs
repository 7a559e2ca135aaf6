//! Infrastructure layer: backend adapters, discovery, config, command session.

pub mod config;
pub mod discovery;
pub mod network;
pub mod session;

pub use config::{ConfigError, DepotConfig};
pub use discovery::{PeripheralHost, Rejection, classify, discover_backends};
pub use network::{CallCounts, InMemoryBackend, InMemoryLocalInventory, InMemoryNetwork, StoredStack, WorldFixture};
pub use session::{RefreshSummary, StorageSession};
