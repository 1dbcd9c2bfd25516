use crate::PortKey;
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = MigrateError> = std::result::Result<T, E>;

/// Failures raised while planning or reconciling a migration.
///
/// Store and capacity errors abort an invocation. The per-item kinds
/// (`NoAvailablePort`, `UnknownRecord`, `Validation`, `Malformed`) are
/// collected into outcome lists and reported alongside successful output.
#[derive(Debug, Error)]
pub enum MigrateError {
    #[error("inventory snapshot {} is corrupt: {reason}", .path.display())]
    StoreCorrupt { path: PathBuf, reason: String },

    #[error("{key}: {reason}")]
    Validation { key: PortKey, reason: String },

    #[error("insufficient capacity: {reason}")]
    InsufficientCapacity { reason: String },

    #[error(
        "{port}: no available port on {}",
        .switch.as_deref().unwrap_or("any destination switch")
    )]
    NoAvailablePort { port: PortKey, switch: Option<String> },

    #[error("unknown record {key}")]
    UnknownRecord { key: PortKey },

    #[error("unknown switch {switch}")]
    UnknownSwitch { switch: String },

    #[error("invalid port key {input:?}, expected SWITCH:PORT")]
    InvalidKey { input: String },

    #[error("line {line}: {reason}")]
    Malformed { line: u64, reason: String },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrateError {
    /// Process exit status for this failure kind.
    pub fn exit_code(&self) -> i32 {
        match self {
            MigrateError::NoAvailablePort { .. } => 3,
            MigrateError::UnknownRecord { .. } => 4,
            MigrateError::InsufficientCapacity { .. } => 5,
            MigrateError::Validation { .. } | MigrateError::Malformed { .. } => 6,
            MigrateError::StoreCorrupt { .. } => 7,
            MigrateError::UnknownSwitch { .. } => 8,
            MigrateError::InvalidKey { .. } | MigrateError::Io(_) => 1,
        }
    }

    /// Stable short code, used as the audit log's failure code.
    pub fn code(&self) -> &'static str {
        match self {
            MigrateError::StoreCorrupt { .. } => "store_corrupt",
            MigrateError::Validation { .. } => "validation",
            MigrateError::InsufficientCapacity { .. } => "insufficient_capacity",
            MigrateError::NoAvailablePort { .. } => "no_available_port",
            MigrateError::UnknownRecord { .. } => "unknown_record",
            MigrateError::UnknownSwitch { .. } => "unknown_switch",
            MigrateError::InvalidKey { .. } => "invalid_key",
            MigrateError::Malformed { .. } => "malformed",
            MigrateError::Io(_) => "io",
        }
    }

    /// The port this failure is about, when there is one.
    pub fn key(&self) -> Option<&PortKey> {
        match self {
            MigrateError::Validation { key, .. } | MigrateError::UnknownRecord { key } => Some(key),
            MigrateError::NoAvailablePort { port, .. } => Some(port),
            _ => None,
        }
    }

    /// Errors that must abort the whole invocation rather than a single item.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MigrateError::StoreCorrupt { .. }
                | MigrateError::InsufficientCapacity { .. }
                | MigrateError::Io(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_available_port_message_names_switch() {
        let e = MigrateError::NoAvailablePort {
            port: PortKey::new("SW1", "Gi1/0/1"),
            switch: Some("SW2".into()),
        };
        assert_eq!(e.to_string(), "SW1:Gi1/0/1: no available port on SW2");
        let e =
            MigrateError::NoAvailablePort { port: PortKey::new("SW1", "Gi1/0/1"), switch: None };
        assert!(e.to_string().ends_with("any destination switch"));
    }

    #[test]
    fn fatal_kinds() {
        assert!(MigrateError::InsufficientCapacity { reason: "x".into() }.is_fatal());
        assert!(!MigrateError::UnknownRecord { key: PortKey::new("a", "b") }.is_fatal());
    }
}
