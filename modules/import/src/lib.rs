//! CSV boundary: initial port import, operator final assignments, observed port state.

use portmove_core::{Inventory, MigrateError, PortKey, PortRecord, PortStatus, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// Vlans whose connected hosts count as critical when the file has no
    /// `critical` column. Idle ports on these vlans stay spare.
    pub critical_vlans: Vec<String>,
}

#[derive(Debug)]
pub struct ImportOutcome {
    pub inventory: Inventory,
    /// Rows that were skipped, one error per row.
    pub rejected: Vec<MigrateError>,
}

#[derive(Debug)]
pub struct MarkOutcome {
    pub marked: Vec<PortKey>,
    pub failures: Vec<MigrateError>,
}

#[derive(Debug, Deserialize)]
struct PortRow {
    switch_id: String,
    #[serde(alias = "port", alias = "interface")]
    port_id: String,
    status: String,
    #[serde(default)]
    vlan: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    speed: String,
    #[serde(default)]
    duplex: String,
    #[serde(default)]
    critical: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FinalRow {
    switch_id: String,
    #[serde(alias = "port", alias = "interface")]
    port_id: String,
    #[serde(alias = "final")]
    final_switch: String,
    #[serde(default)]
    host: Option<String>,
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "" => None,
        "1" | "y" | "yes" | "true" | "x" | "critical" => Some(true),
        _ => Some(false),
    }
}

/// Lowercase, trimmed, `snake_case` headers so `Switch ID` and `switch_id` both work.
fn normalized_headers<R: Read>(rdr: &mut csv::Reader<R>) -> Result<csv::StringRecord> {
    let raw =
        rdr.headers().map_err(|e| MigrateError::Malformed { line: 1, reason: e.to_string() })?;
    Ok(raw.iter().map(|h| h.trim().to_ascii_lowercase().replace([' ', '-'], "_")).collect())
}

type Row<T> = (u64, std::result::Result<T, MigrateError>);

fn rows<R: Read, T: DeserializeOwned>(input: R) -> Result<Vec<Row<T>>> {
    let mut rdr =
        csv::ReaderBuilder::new().trim(csv::Trim::All).flexible(true).from_reader(input);
    let headers = normalized_headers(&mut rdr)?;
    let mut out = Vec::new();
    for rec in rdr.records() {
        let rec = match rec {
            Ok(r) => r,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                out.push((line, Err(MigrateError::Malformed { line, reason: e.to_string() })));
                continue;
            }
        };
        let line = rec.position().map(|p| p.line()).unwrap_or(0);
        if rec.iter().all(|f| f.is_empty()) {
            continue;
        }
        let parsed = rec
            .deserialize::<T>(Some(&headers))
            .map_err(|e| MigrateError::Malformed { line, reason: e.to_string() });
        out.push((line, parsed));
    }
    Ok(out)
}

/// Read combined description/status rows into a fresh inventory.
/// Invalid rows are rejected one by one; the rest are imported.
pub fn import_ports<R: Read>(input: R, opts: &ImportOptions) -> Result<ImportOutcome> {
    let mut inventory = Inventory::new();
    let mut rejected = Vec::new();
    for (line, row) in rows::<R, PortRow>(input)? {
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                rejected.push(e);
                continue;
            }
        };
        if row.switch_id.is_empty() || row.port_id.is_empty() {
            rejected.push(MigrateError::Malformed {
                line,
                reason: "switch_id and port_id are required".into(),
            });
            continue;
        }
        let mut rec = PortRecord::new(row.switch_id, row.port_id, PortStatus::parse(&row.status));
        rec.critical = match row.critical.as_deref().and_then(parse_flag) {
            Some(flag) => flag,
            None => {
                rec.status == PortStatus::Connected
                    && opts.critical_vlans.iter().any(|v| v == &row.vlan)
            }
        };
        rec.vlan = row.vlan;
        rec.description = row.description;
        rec.speed = row.speed;
        rec.duplex = row.duplex;
        if let Err(e) = rec.validate() {
            tracing::warn!(line, "{}", e);
            rejected.push(e);
            continue;
        }
        if inventory.contains(&rec.key()) {
            rejected.push(MigrateError::Validation {
                key: rec.key(),
                reason: format!("duplicate port on line {}", line),
            });
            continue;
        }
        inventory.upsert(rec);
    }
    tracing::info!(imported = inventory.len(), rejected = rejected.len(), "port import finished");
    Ok(ImportOutcome { inventory, rejected })
}

/// Apply operator-chosen final switches. Marked ports become critical.
pub fn apply_final_assignments<R: Read>(inv: &mut Inventory, input: R) -> Result<MarkOutcome> {
    let mut marked = Vec::new();
    let mut failures = Vec::new();
    for (line, row) in rows::<R, FinalRow>(input)? {
        let row = match row {
            Ok(r) => r,
            Err(e) => {
                failures.push(e);
                continue;
            }
        };
        let key = PortKey::new(row.switch_id, row.port_id);
        if !inv.has_switch(&row.final_switch) {
            failures.push(MigrateError::UnknownSwitch { switch: row.final_switch });
            continue;
        }
        let Some(rec) = inv.record_mut(&key) else {
            failures.push(MigrateError::UnknownRecord { key });
            continue;
        };
        if let Some(host) = row.host.as_deref().filter(|h| !h.is_empty()) {
            if host != rec.description {
                tracing::warn!(
                    line,
                    port = %key,
                    host,
                    description = %rec.description,
                    "host column does not match port description"
                );
            }
        }
        tracing::debug!(port = %key, final_switch = %row.final_switch, "marked final");
        rec.critical = true;
        rec.final_switch = Some(row.final_switch);
        marked.push(key);
    }
    tracing::info!(marked = marked.len(), failed = failures.len(), "final assignments applied");
    Ok(MarkOutcome { marked, failures })
}
