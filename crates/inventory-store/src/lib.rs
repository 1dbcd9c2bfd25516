//! Durable YAML snapshot of the port inventory.

mod snapshot;
mod store;

pub use snapshot::{from_yaml, to_yaml, SNAPSHOT_VERSION};
pub use store::InventoryStore;
