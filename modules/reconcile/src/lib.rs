//! Fold an execution report back into the inventory.
//!
//! A completed move swaps the host record and the spare record it landed on,
//! so the host keeps its identity while its location fields change. Reported
//! outcomes win over the plan. Move states only ever advance.

use portmove_core::{Inventory, MigrateError, MoveState, PortKey, PortStatus};
use runsheet::{Outcome, ReportLine};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Relocation {
    pub host: String,
    /// Description before the report corrected it.
    pub previous: Option<String>,
    pub from: PortKey,
    pub to: PortKey,
    /// False when the report overrode the plan.
    pub planned: bool,
}

#[derive(Debug, Default)]
pub struct ReconcileOutcome {
    pub relocations: Vec<Relocation>,
    /// Sources whose reservation was dropped after a failed move.
    pub released: Vec<PortKey>,
    pub partial: Vec<PortKey>,
    /// Completed lines that an earlier run already applied.
    pub already_applied: Vec<PortKey>,
    pub errors: Vec<MigrateError>,
}

#[derive(Debug, Default)]
pub struct ConfirmOutcome {
    pub confirmed: Vec<PortKey>,
    /// Executed records the observation does not back up yet.
    pub unconfirmed: Vec<PortKey>,
}

fn already_applied(inv: &Inventory, src: &PortKey, dest: &PortKey) -> bool {
    let landed = inv
        .record(dest)
        .map(|d| {
            d.move_state >= MoveState::Executed && d.planned_destination.as_ref() == Some(dest)
        })
        .unwrap_or(false);
    let vacated = inv.record(src).map(|s| s.is_spare()).unwrap_or(false);
    landed && vacated
}

fn apply_completed(
    inv: &mut Inventory,
    line: &ReportLine,
    out: &mut ReconcileOutcome,
) -> Result<(), MigrateError> {
    let src = &line.source;
    let Some(dest) = line.destination().cloned() else {
        return Err(MigrateError::Validation {
            key: src.clone(),
            reason: format!("line {}: completed move has no destination", line.line),
        });
    };
    if already_applied(inv, src, &dest) {
        tracing::debug!(from = %src, to = %dest, "move already reconciled");
        out.already_applied.push(src.clone());
        return Ok(());
    }
    let host = inv.record(src).ok_or_else(|| MigrateError::UnknownRecord { key: src.clone() })?;
    let target =
        inv.record(&dest).ok_or_else(|| MigrateError::UnknownRecord { key: dest.clone() })?;
    if src == &dest {
        return Err(MigrateError::Validation {
            key: src.clone(),
            reason: format!("line {}: source and destination are the same port", line.line),
        });
    }
    // a live host is never overwritten, critical or not
    if target.status == PortStatus::Connected {
        return Err(MigrateError::Validation {
            key: dest.clone(),
            reason: format!(
                "line {}: destination still holds host '{}'",
                line.line, target.description
            ),
        });
    }
    let planned = host.planned_destination.as_ref() == Some(&dest);
    if !planned {
        tracing::warn!(
            from = %src,
            to = %dest,
            plan = ?host.planned_destination,
            "reported move differs from plan, taking report as ground truth"
        );
    }
    let (host_name, previous) = match &line.actual_description {
        Some(actual) if actual != &host.description => {
            (actual.clone(), Some(host.description.clone()))
        }
        _ => (host.description.clone(), None),
    };

    // another host's reservation on this port is now void
    for r in inv.all_mut() {
        if !r.is_at(src)
            && r.move_state == MoveState::Planned
            && r.planned_destination.as_ref() == Some(&dest)
        {
            tracing::warn!(
                port = %r.key(),
                destination = %dest,
                "reservation taken by another host, released"
            );
            r.planned_destination = None;
        }
    }

    inv.swap_locations(src, &dest)?;
    if let Some(h) = inv.record_mut(&dest) {
        h.status = PortStatus::Connected;
        h.description = host_name.clone();
        h.move_state.advance(MoveState::Executed);
        h.planned_destination = Some(dest.clone());
    }
    if let Some(s) = inv.record_mut(src) {
        s.status = PortStatus::Disabled;
        s.description.clear();
        s.vlan.clear();
        s.critical = false;
        s.final_switch = None;
        s.planned_destination = None;
    }
    tracing::info!(host = %host_name, from = %src, to = %dest, "move reconciled");
    out.relocations.push(Relocation {
        host: host_name,
        previous,
        from: src.clone(),
        to: dest,
        planned,
    });
    Ok(())
}

/// Apply report lines in order. Per-line problems are collected and the rest still apply.
pub fn reconcile(inv: &mut Inventory, lines: &[ReportLine]) -> ReconcileOutcome {
    let mut out = ReconcileOutcome::default();
    for line in lines {
        let res = match line.outcome {
            Outcome::Completed => apply_completed(inv, line, &mut out),
            Outcome::Failed => match inv.record_mut(&line.source) {
                Some(r) => {
                    if r.move_state == MoveState::Planned && r.planned_destination.take().is_some()
                    {
                        tracing::info!(port = %line.source, "move failed, reservation released");
                        out.released.push(line.source.clone());
                    }
                    Ok(())
                }
                None => Err(MigrateError::UnknownRecord { key: line.source.clone() }),
            },
            Outcome::Partial => {
                if inv.contains(&line.source) {
                    tracing::warn!(
                        port = %line.source,
                        line = line.line,
                        "partial move, record left as is"
                    );
                    out.partial.push(line.source.clone());
                    Ok(())
                } else {
                    Err(MigrateError::UnknownRecord { key: line.source.clone() })
                }
            }
        };
        if let Err(e) = res {
            tracing::warn!(line = line.line, "{}", e);
            out.errors.push(e);
        }
    }
    tracing::info!(
        relocated = out.relocations.len(),
        released = out.released.len(),
        partial = out.partial.len(),
        skipped = out.already_applied.len(),
        errors = out.errors.len(),
        "reconciliation finished"
    );
    out
}

/// Advance executed records to confirmed where a fresh observation shows the
/// host connected on its new port under the same description.
pub fn confirm(inv: &mut Inventory, observed: &Inventory) -> ConfirmOutcome {
    let mut out = ConfirmOutcome::default();
    for r in inv.all_mut().filter(|r| r.move_state == MoveState::Executed) {
        let key = r.key();
        let seen = observed
            .record(&key)
            .map(|o| {
                o.status == PortStatus::Connected && o.description.trim() == r.description.trim()
            })
            .unwrap_or(false);
        if seen {
            r.move_state.advance(MoveState::Confirmed);
            r.status = PortStatus::Connected;
            out.confirmed.push(key);
        } else {
            tracing::debug!(port = %key, "not yet confirmed by observation");
            out.unconfirmed.push(key);
        }
    }
    tracing::info!(
        confirmed = out.confirmed.len(),
        unconfirmed = out.unconfirmed.len(),
        "verification finished"
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use portmove_core::PortRecord;

    fn planned_host(port: &str, name: &str, dest: &str) -> PortRecord {
        let mut r = PortRecord::new("SW1", port, PortStatus::Connected);
        r.description = name.into();
        r.vlan = "1296".into();
        r.critical = true;
        r.final_switch = Some("SW2".into());
        r.move_state = MoveState::Planned;
        r.planned_destination = Some(PortKey::new("SW2", dest));
        r
    }

    fn kiosk(port: &str, name: &str) -> PortRecord {
        let mut r = PortRecord::new("SW1", port, PortStatus::Connected);
        r.description = name.into();
        r.vlan = "20".into();
        r
    }

    fn inventory() -> Inventory {
        Inventory::from_records(vec![
            planned_host("Gi1/0/1", "hmi-01", "Gi1/0/1"),
            planned_host("Gi1/0/2", "hmi-02", "Gi1/0/2"),
            planned_host("Gi1/0/3", "plc-01", "Gi1/0/3"),
            PortRecord::new("SW2", "Gi1/0/1", PortStatus::Disabled),
            PortRecord::new("SW2", "Gi1/0/2", PortStatus::Disabled),
            PortRecord::new("SW2", "Gi1/0/3", PortStatus::NotConnected),
            PortRecord::new("SW2", "Gi1/0/4", PortStatus::NotConnected),
        ])
        .unwrap()
    }

    fn line(n: u64, port: &str, outcome: Outcome, dest: &str) -> ReportLine {
        ReportLine {
            line: n,
            source: PortKey::new("SW1", port),
            outcome,
            planned_destination: Some(PortKey::new("SW2", dest)),
            actual_destination: None,
            actual_description: None,
        }
    }

    fn states(inv: &Inventory) -> Vec<(PortKey, MoveState)> {
        inv.all().map(|r| (r.key(), r.move_state)).collect()
    }

    #[test]
    fn completed_move_swaps_host_and_spare() {
        let mut inv = inventory();
        let out = reconcile(&mut inv, &[line(2, "Gi1/0/1", Outcome::Completed, "Gi1/0/1")]);
        assert!(out.errors.is_empty());
        assert!(out.relocations[0].planned);
        assert_eq!(out.relocations[0].previous, None);
        let host = inv.get("SW2", "Gi1/0/1").unwrap();
        assert_eq!(host.description, "hmi-01");
        assert_eq!(host.vlan, "1296");
        assert_eq!(host.status, PortStatus::Connected);
        assert_eq!(host.move_state, MoveState::Executed);
        let vacated = inv.get("SW1", "Gi1/0/1").unwrap();
        assert!(vacated.is_spare());
        assert_eq!(vacated.status, PortStatus::Disabled);
        assert_eq!(inv.len(), 7);
    }

    #[test]
    fn scenario_c_unknown_line_does_not_block_others() {
        let mut inv = inventory();
        let report = vec![
            line(2, "Gi1/0/1", Outcome::Completed, "Gi1/0/1"),
            line(3, "Gi1/0/99", Outcome::Completed, "Gi1/0/4"),
            line(4, "Gi1/0/2", Outcome::Completed, "Gi1/0/2"),
        ];
        let out = reconcile(&mut inv, &report);
        assert_eq!(out.errors.len(), 1);
        assert!(matches!(
            &out.errors[0],
            MigrateError::UnknownRecord { key } if key == &PortKey::new("SW1", "Gi1/0/99")
        ));
        assert_eq!(out.relocations.len(), 2);
        assert_eq!(inv.get("SW2", "Gi1/0/2").unwrap().description, "hmi-02");
    }

    #[test]
    fn ground_truth_overrides_plan() {
        let mut inv = inventory();
        let mut l = line(2, "Gi1/0/3", Outcome::Completed, "Gi1/0/3");
        l.actual_destination = Some(PortKey::new("SW2", "Gi1/0/4"));
        l.actual_description = Some("plc-01-new".into());
        let out = reconcile(&mut inv, &[l]);
        assert!(!out.relocations[0].planned);
        assert_eq!(out.relocations[0].host, "plc-01-new");
        assert_eq!(out.relocations[0].previous.as_deref(), Some("plc-01"));
        let host = inv.get("SW2", "Gi1/0/4").unwrap();
        assert_eq!(host.description, "plc-01-new");
        assert_eq!(host.move_state, MoveState::Executed);
        assert!(inv.get("SW2", "Gi1/0/3").unwrap().is_spare());
    }

    #[test]
    fn unchanged_description_is_not_a_rename() {
        let mut inv = inventory();
        let mut l = line(2, "Gi1/0/1", Outcome::Completed, "Gi1/0/1");
        l.actual_description = Some("hmi-01".into());
        let out = reconcile(&mut inv, &[l]);
        assert_eq!(out.relocations[0].previous, None);
    }

    #[test]
    fn unplanned_move_goes_straight_to_executed() {
        let mut inv = Inventory::from_records(vec![
            kiosk("Gi1/0/7", "kiosk"),
            PortRecord::new("SW2", "Gi1/0/4", PortStatus::Disabled),
        ])
        .unwrap();
        let out = reconcile(&mut inv, &[line(2, "Gi1/0/7", Outcome::Completed, "Gi1/0/4")]);
        assert_eq!(out.relocations.len(), 1);
        assert_eq!(inv.get("SW2", "Gi1/0/4").unwrap().move_state, MoveState::Executed);
    }

    #[test]
    fn failed_releases_and_partial_is_left_alone() {
        let mut inv = inventory();
        let before = inv.get("SW1", "Gi1/0/2").unwrap().clone();
        let report = [
            line(2, "Gi1/0/1", Outcome::Failed, "Gi1/0/1"),
            line(3, "Gi1/0/2", Outcome::Partial, "Gi1/0/2"),
        ];
        let out = reconcile(&mut inv, &report);
        assert_eq!(out.released, vec![PortKey::new("SW1", "Gi1/0/1")]);
        assert_eq!(out.partial, vec![PortKey::new("SW1", "Gi1/0/2")]);
        let failed = inv.get("SW1", "Gi1/0/1").unwrap();
        assert_eq!(failed.move_state, MoveState::Planned);
        assert_eq!(failed.planned_destination, None);
        assert_eq!(inv.get("SW1", "Gi1/0/2").unwrap(), &before);
        assert!(!inv.reserved().contains(&PortKey::new("SW2", "Gi1/0/1")));
    }

    #[test]
    fn occupied_destination_is_rejected() {
        let mut inv = inventory();
        let l = line(2, "Gi1/0/1", Outcome::Completed, "Gi1/0/1");
        let mut m = line(3, "Gi1/0/2", Outcome::Completed, "Gi1/0/2");
        m.actual_destination = Some(PortKey::new("SW2", "Gi1/0/1"));
        let out = reconcile(&mut inv, &[l, m]);
        assert_eq!(out.relocations.len(), 1);
        assert!(matches!(out.errors[0], MigrateError::Validation { .. }));
        assert_eq!(inv.get("SW1", "Gi1/0/2").unwrap().description, "hmi-02");
    }

    #[test]
    fn two_lines_to_one_port_keep_both_hosts() {
        let mut inv = Inventory::from_records(vec![
            kiosk("Gi1/0/1", "kiosk-a"),
            kiosk("Gi1/0/2", "kiosk-b"),
            PortRecord::new("SW2", "Gi1/0/1", PortStatus::Disabled),
        ])
        .unwrap();
        let report = [
            line(2, "Gi1/0/1", Outcome::Completed, "Gi1/0/1"),
            line(3, "Gi1/0/2", Outcome::Completed, "Gi1/0/1"),
        ];
        let out = reconcile(&mut inv, &report);
        assert_eq!(out.relocations.len(), 1);
        assert_eq!(out.errors.len(), 1);
        assert!(matches!(
            &out.errors[0],
            MigrateError::Validation { key, .. } if key == &PortKey::new("SW2", "Gi1/0/1")
        ));
        let a = inv.get("SW2", "Gi1/0/1").unwrap();
        assert_eq!((a.description.as_str(), &a.status), ("kiosk-a", &PortStatus::Connected));
        let b = inv.get("SW1", "Gi1/0/2").unwrap();
        assert_eq!(b.description, "kiosk-b");
        assert_eq!(b.vlan, "20");
        assert_eq!(b.status, PortStatus::Connected);
        let hosts: Vec<&str> = inv
            .all()
            .filter(|r| !r.description.is_empty())
            .map(|r| r.description.as_str())
            .collect();
        assert_eq!(hosts, vec!["kiosk-b", "kiosk-a"]);

        // the accepted line stays applied on a rerun, the rejected one stays rejected
        let again = reconcile(&mut inv, &report);
        assert_eq!(again.already_applied, vec![PortKey::new("SW1", "Gi1/0/1")]);
        assert_eq!(again.errors.len(), 1);
        assert_eq!(inv.get("SW1", "Gi1/0/2").unwrap().description, "kiosk-b");
    }

    #[test]
    fn repeated_runs_never_regress() {
        let mut inv = inventory();
        let report = vec![
            line(2, "Gi1/0/1", Outcome::Completed, "Gi1/0/1"),
            line(3, "Gi1/0/2", Outcome::Failed, "Gi1/0/2"),
            line(4, "Gi1/0/3", Outcome::Partial, "Gi1/0/3"),
        ];
        let first = reconcile(&mut inv, &report);
        assert_eq!(first.relocations.len(), 1);
        let snapshot = states(&inv);
        for _ in 0..3 {
            let again = reconcile(&mut inv, &report);
            assert!(again.relocations.is_empty());
            assert_eq!(again.already_applied, vec![PortKey::new("SW1", "Gi1/0/1")]);
            assert_eq!(states(&inv), snapshot);
        }
        let mut observed = inventory();
        let mut seen = PortRecord::new("SW2", "Gi1/0/1", PortStatus::Connected);
        seen.description = "hmi-01".into();
        observed.upsert(seen);
        let c = confirm(&mut inv, &observed);
        assert_eq!(c.confirmed, vec![PortKey::new("SW2", "Gi1/0/1")]);
        reconcile(&mut inv, &report);
        assert_eq!(inv.get("SW2", "Gi1/0/1").unwrap().move_state, MoveState::Confirmed);
    }

    #[test]
    fn confirm_requires_matching_description() {
        let mut inv = inventory();
        reconcile(&mut inv, &[line(2, "Gi1/0/1", Outcome::Completed, "Gi1/0/1")]);
        let mut observed = Inventory::new();
        let mut seen = PortRecord::new("SW2", "Gi1/0/1", PortStatus::Connected);
        seen.description = "something-else".into();
        observed.upsert(seen);
        let c = confirm(&mut inv, &observed);
        assert!(c.confirmed.is_empty());
        assert_eq!(c.unconfirmed, vec![PortKey::new("SW2", "Gi1/0/1")]);
        assert_eq!(inv.get("SW2", "Gi1/0/1").unwrap().move_state, MoveState::Executed);
    }
}
