//! SQLite audit log: one row per run, plus every relocation and per-item failure.

mod insert;
mod models;
mod open;
mod query;
mod schema;

pub use models::*;
pub use open::AuditLog;

/// Milliseconds since the Unix epoch, as stored in the audit tables.
pub fn now_ms() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}
