//! Core types shared by the portmove planning crates.

pub mod error;
pub mod inventory;
pub mod pool;
pub mod record;

pub use error::{MigrateError, Result};
pub use inventory::Inventory;
pub use pool::PortPool;
pub use record::{natural_cmp, MoveState, PortKey, PortRecord, PortStatus};

pub const fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// First failure's exit code, or 0 when the list is empty.
pub fn exit_code_for(failures: &[MigrateError]) -> i32 {
    failures.first().map(MigrateError::exit_code).unwrap_or(0)
}
