use portmove_core::PortKey;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMeta {
    pub run_id: Uuid,
    pub started_at: i64,
    pub command: String,
    pub tool_version: String,
    pub args_json: String,
}

impl RunMeta {
    pub fn new(command: &str, args: &serde_json::Value) -> Self {
        RunMeta {
            run_id: Uuid::now_v7(),
            started_at: crate::now_ms(),
            command: command.to_string(),
            tool_version: portmove_core::version().to_string(),
            args_json: args.to_string(),
        }
    }
}

/// Where a host was, where it went, and at which lifecycle step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relocation {
    pub host: String,
    pub from: PortKey,
    pub to: PortKey,
    pub outcome: String,
    pub at_ms: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureEntry {
    pub scope: String,
    pub code: String,
    pub port_key: Option<String>,
    pub message: String,
    pub at_ms: i64,
}

impl FailureEntry {
    pub fn from_error(scope: &str, err: &portmove_core::MigrateError) -> Self {
        FailureEntry {
            scope: scope.to_string(),
            code: err.code().to_string(),
            port_key: err.key().map(|k| k.to_string()),
            message: err.to_string(),
            at_ms: crate::now_ms(),
        }
    }
}
