//! Runsheet CSV: written from a plan, annotated by the operator, read back
//! as the execution report.

use commands::CommandRenderer;
use move_planner::MigrationPlan;
use portmove_core::{MigrateError, PortKey, Result};
use serde::Deserialize;
use std::io::{Read, Write};
use std::str::FromStr;

pub const COLUMNS: [&str; 15] = [
    "host",
    "from_switch",
    "from_port",
    "to_switch",
    "to_port",
    "vlan",
    "speed",
    "duplex",
    "final",
    "disable_config",
    "enable_config",
    "outcome",
    "actual_switch",
    "actual_port",
    "actual_description",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    Partial,
    Failed,
}

impl FromStr for Outcome {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "completed" | "complete" | "done" | "ok" => Ok(Outcome::Completed),
            "partial" => Ok(Outcome::Partial),
            "failed" | "fail" => Ok(Outcome::Failed),
            other => Err(format!("unknown outcome '{}'", other)),
        }
    }
}

/// One executed runsheet line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportLine {
    pub line: u64,
    pub source: PortKey,
    pub outcome: Outcome,
    /// Destination the runsheet was generated with, if any.
    pub planned_destination: Option<PortKey>,
    /// Where the operator says the host actually landed, if it differs.
    pub actual_destination: Option<PortKey>,
    pub actual_description: Option<String>,
}

impl ReportLine {
    /// Operator correction first, then the planned port.
    pub fn destination(&self) -> Option<&PortKey> {
        self.actual_destination.as_ref().or(self.planned_destination.as_ref())
    }
}

#[derive(Debug, Default)]
pub struct Report {
    pub lines: Vec<ReportLine>,
    /// Lines with no outcome filled in yet.
    pub pending: Vec<PortKey>,
    pub errors: Vec<MigrateError>,
}

#[derive(Debug, Deserialize)]
struct ReportRow {
    #[serde(alias = "switch_id", alias = "from_switch_id")]
    from_switch: String,
    #[serde(alias = "port_id", alias = "from_interface", alias = "port")]
    from_port: String,
    #[serde(default)]
    to_switch: String,
    #[serde(default, alias = "to_interface")]
    to_port: String,
    #[serde(default)]
    outcome: String,
    #[serde(default)]
    actual_switch: String,
    #[serde(default)]
    actual_port: String,
    #[serde(default)]
    actual_description: String,
}

fn key_of(switch: &str, port: &str) -> Option<PortKey> {
    (!switch.is_empty() && !port.is_empty()).then(|| PortKey::new(switch, port))
}

/// Write the runsheet for `plan`, one row per move, outcome columns left blank.
pub fn write_runsheet<W: Write, R: CommandRenderer + ?Sized>(
    out: W,
    plan: &MigrationPlan,
    renderer: &R,
) -> Result<()> {
    let csv_err =
        |e: csv::Error| MigrateError::Io(std::io::Error::new(std::io::ErrorKind::Other, e));
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(COLUMNS).map_err(csv_err)?;
    for m in &plan.moves {
        let cfg = renderer.render(m);
        let (s, d) = (&m.source, &m.destination);
        wtr.write_record([
            s.description.as_str(),
            s.switch_id.as_str(),
            s.port_id.as_str(),
            d.switch_id.as_str(),
            d.port_id.as_str(),
            s.vlan.as_str(),
            s.speed.as_str(),
            s.duplex.as_str(),
            s.final_switch.as_deref().unwrap_or(""),
            cfg.disable.as_str(),
            cfg.enable.as_str(),
            "",
            "",
            "",
            "",
        ])
        .map_err(csv_err)?;
    }
    wtr.flush()?;
    tracing::info!(rows = plan.moves.len(), "runsheet written");
    Ok(())
}

/// Parse an annotated runsheet. Bad lines are collected, not fatal.
pub fn read_report<R: Read>(input: R) -> Result<Report> {
    let mut rdr =
        csv::ReaderBuilder::new().trim(csv::Trim::All).flexible(true).from_reader(input);
    let headers: csv::StringRecord = rdr
        .headers()
        .map_err(|e| MigrateError::Malformed { line: 1, reason: e.to_string() })?
        .iter()
        .map(|h| h.trim().to_ascii_lowercase().replace([' ', '-'], "_"))
        .collect();
    let mut report = Report::default();
    for rec in rdr.records() {
        let rec = match rec {
            Ok(r) => r,
            Err(e) => {
                let line = e.position().map(|p| p.line()).unwrap_or(0);
                report.errors.push(MigrateError::Malformed { line, reason: e.to_string() });
                continue;
            }
        };
        let line = rec.position().map(|p| p.line()).unwrap_or(0);
        if rec.iter().all(|f| f.is_empty()) {
            continue;
        }
        let row: ReportRow = match rec.deserialize(Some(&headers)) {
            Ok(r) => r,
            Err(e) => {
                report.errors.push(MigrateError::Malformed { line, reason: e.to_string() });
                continue;
            }
        };
        let Some(source) = key_of(&row.from_switch, &row.from_port) else {
            report.errors.push(MigrateError::Malformed {
                line,
                reason: "source switch and port are required".into(),
            });
            continue;
        };
        if row.outcome.is_empty() {
            tracing::debug!(line, port = %source, "no outcome recorded, skipping");
            report.pending.push(source);
            continue;
        }
        let outcome = match row.outcome.parse::<Outcome>() {
            Ok(o) => o,
            Err(reason) => {
                report.errors.push(MigrateError::Malformed { line, reason });
                continue;
            }
        };
        let planned_destination = key_of(&row.to_switch, &row.to_port);
        // a bare actual_port means "same switch, other port"
        let actual_switch = if row.actual_switch.is_empty() {
            row.to_switch.as_str()
        } else {
            row.actual_switch.as_str()
        };
        let actual_destination = key_of(actual_switch, &row.actual_port);
        let actual_description =
            (!row.actual_description.is_empty()).then_some(row.actual_description);
        report.lines.push(ReportLine {
            line,
            source,
            outcome,
            planned_destination,
            actual_destination,
            actual_description,
        });
    }
    tracing::info!(
        lines = report.lines.len(),
        pending = report.pending.len(),
        errors = report.errors.len(),
        "execution report read"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use commands::CiscoIos;
    use move_planner::Move;
    use portmove_core::{PortRecord, PortStatus};

    fn plan() -> MigrationPlan {
        let mut source = PortRecord::new("SW1", "Gi1/0/1", PortStatus::Connected);
        source.description = "hmi-01".into();
        source.vlan = "1296".into();
        source.final_switch = Some("SW2".into());
        let destination = PortRecord::new("SW2", "Gi1/0/5", PortStatus::Disabled);
        MigrationPlan {
            moves: vec![Move { source, destination, final_match: true }],
            failures: Vec::new(),
        }
    }

    #[test]
    fn written_runsheet_reads_back_as_pending() {
        let mut buf = Vec::new();
        write_runsheet(&mut buf, &plan(), &CiscoIos::default()).unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.starts_with("host,from_switch,from_port,to_switch,to_port,vlan"));
        assert!(text.contains("switchport access vlan 1296"));
        let report = read_report(buf.as_slice()).unwrap();
        assert!(report.lines.is_empty());
        assert_eq!(report.pending, vec![PortKey::new("SW1", "Gi1/0/1")]);
    }

    #[test]
    fn annotated_lines_parse() {
        let csv = "\
from_switch,from_port,to_switch,to_port,outcome,actual_switch,actual_port,actual_description
SW1,Gi1/0/1,SW2,Gi1/0/5,completed,,,
SW1,Gi1/0/2,SW2,Gi1/0/6,Completed,,Gi1/0/8,hmi-02b
SW1,Gi1/0/3,SW3,Gi1/0/1,failed,,,
SW1,Gi1/0/4,SW3,Gi1/0/2,exploded,,,
";
        let report = read_report(csv.as_bytes()).unwrap();
        assert_eq!(report.lines.len(), 3);
        assert_eq!(report.lines[0].destination(), Some(&PortKey::new("SW2", "Gi1/0/5")));
        assert_eq!(report.lines[1].destination(), Some(&PortKey::new("SW2", "Gi1/0/8")));
        assert_eq!(report.lines[1].actual_description.as_deref(), Some("hmi-02b"));
        assert_eq!(report.lines[2].outcome, Outcome::Failed);
        assert!(matches!(report.errors[0], MigrateError::Malformed { line: 5, .. }));
    }

    #[test]
    fn minimal_report_columns() {
        let csv = "switch_id,port_id,outcome,actual_switch,actual_port\n\
SW1,Gi1/0/9,completed,SW4,Gi1/0/1\n";
        let report = read_report(csv.as_bytes()).unwrap();
        assert_eq!(report.lines[0].planned_destination, None);
        assert_eq!(report.lines[0].destination(), Some(&PortKey::new("SW4", "Gi1/0/1")));
    }
}
