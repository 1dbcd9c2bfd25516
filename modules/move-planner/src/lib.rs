//! Pick a concrete spare destination port for each host being vacated.
//!
//! Destination ports are consumed as they are chosen, so a plan never sends
//! two hosts to the same port. Hosts with a final switch are placed first and
//! only on that switch; the rest go to the destination switch that has taken
//! the fewest moves so far. A host that cannot be placed is reported and the
//! remaining hosts are still planned.

use portmove_core::inventory::sorted_switches;
use portmove_core::{
    natural_cmp, Inventory, MigrateError, MoveState, PortKey, PortPool, PortRecord, PortStatus,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelector {
    /// One specific port.
    Port(PortKey),
    /// Every connected critical port on a switch.
    Switch(String),
}

impl SourceSelector {
    /// `SWITCH:PORT` selects a port, a bare name selects a switch.
    pub fn parse(s: &str) -> Result<Self, MigrateError> {
        if s.contains(':') {
            Ok(SourceSelector::Port(s.parse()?))
        } else {
            Ok(SourceSelector::Switch(s.trim().to_string()))
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MoveRequest {
    pub sources: Vec<SourceSelector>,
    pub destinations: Vec<String>,
    /// Also vacate connected non-critical ports on selected switches.
    pub include_noncritical: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Move {
    pub source: PortRecord,
    pub destination: PortRecord,
    /// Destination chosen to honour the source's final switch.
    pub final_match: bool,
}

#[derive(Debug, Default)]
pub struct MigrationPlan {
    pub moves: Vec<Move>,
    pub failures: Vec<MigrateError>,
}

impl MigrationPlan {
    /// Mark each planned source and record its reserved destination.
    pub fn apply(&self, inv: &mut Inventory) -> usize {
        let mut applied = 0;
        for m in &self.moves {
            let Some(r) = inv.record_mut(&m.source.key()) else {
                continue;
            };
            r.move_state.advance(MoveState::Planned);
            r.planned_destination = Some(m.destination.key());
            applied += 1;
        }
        tracing::info!(applied, "plan applied to inventory");
        applied
    }

    pub fn destinations(&self) -> Vec<PortKey> {
        self.moves.iter().map(|m| m.destination.key()).collect()
    }
}

/// Resolve selectors to the records that need a new home, in key order.
fn resolve_sources<'a>(
    inv: &'a Inventory,
    req: &MoveRequest,
    failures: &mut Vec<MigrateError>,
) -> Vec<&'a PortRecord> {
    let mut keys = BTreeSet::new();
    for sel in &req.sources {
        match sel {
            SourceSelector::Port(k) => match inv.record(k) {
                Some(r) if r.status == PortStatus::Connected => {
                    keys.insert(r.key());
                }
                Some(r) => failures.push(MigrateError::Validation {
                    key: k.clone(),
                    reason: format!("no connected host to move (port is {})", r.status),
                }),
                None => failures.push(MigrateError::UnknownRecord { key: k.clone() }),
            },
            SourceSelector::Switch(sw) => {
                if !inv.has_switch(sw) {
                    failures.push(MigrateError::UnknownSwitch { switch: sw.clone() });
                    continue;
                }
                keys.extend(
                    inv.on_switch(sw)
                        .filter(|r| {
                            r.status == PortStatus::Connected
                                && (r.critical || req.include_noncritical)
                        })
                        .map(|r| r.key()),
                );
            }
        }
    }
    keys.iter()
        .filter_map(|k| inv.record(k))
        .filter(|r| {
            if r.move_state >= MoveState::Executed {
                tracing::debug!(
                    port = %r.key(),
                    state = %r.move_state,
                    "already moved, skipping"
                );
                return false;
            }
            if r.final_switch.as_deref() == Some(r.switch_id.as_str()) {
                tracing::debug!(port = %r.key(), "already on its final switch");
                return false;
            }
            true
        })
        .collect()
}

/// A still-valid reservation from an earlier run for this source.
fn existing_reservation(
    inv: &Inventory,
    src: &PortRecord,
    taken: &BTreeSet<PortKey>,
) -> Option<PortKey> {
    if src.move_state != MoveState::Planned {
        return None;
    }
    let dest = src.planned_destination.as_ref()?;
    if let Some(f) = &src.final_switch {
        if &dest.switch_id != f {
            return None;
        }
    }
    if taken.contains(dest) {
        return None;
    }
    inv.record(dest).filter(|d| d.is_spare()).map(|d| d.key())
}

pub fn plan_moves(inv: &Inventory, req: &MoveRequest) -> MigrationPlan {
    let mut failures = Vec::new();
    let sources = resolve_sources(inv, req, &mut failures);
    let source_switches: BTreeSet<&str> = req
        .sources
        .iter()
        .filter_map(|s| match s {
            SourceSelector::Switch(sw) => Some(sw.as_str()),
            _ => None,
        })
        .collect();

    let mut destinations = Vec::new();
    for d in sorted_switches(&req.destinations) {
        if !inv.has_switch(&d) {
            failures.push(MigrateError::UnknownSwitch { switch: d });
        } else if source_switches.contains(d.as_str()) {
            tracing::warn!(switch = %d, "ignoring destination that is also being vacated");
        } else {
            destinations.push(d);
        }
    }
    let mut eligible: Vec<String> = destinations.clone();
    eligible.extend(sources.iter().filter_map(|r| r.final_switch.clone()));
    let eligible = sorted_switches(&eligible);
    let mut pool = PortPool::build(inv, eligible.iter().map(|s| s.as_str()));
    tracing::debug!(switches = eligible.len(), spare = pool.total(), "destination pool built");

    let mut taken: BTreeSet<PortKey> = BTreeSet::new();
    let mut per_switch: BTreeMap<String, usize> = BTreeMap::new();
    let mut moves = Vec::new();
    let (constrained, free): (Vec<&PortRecord>, Vec<&PortRecord>) =
        sources.into_iter().partition(|r| r.final_switch.is_some());

    for src in constrained.into_iter().chain(free) {
        let key = src.key();
        let dest = match existing_reservation(inv, src, &taken) {
            Some(d) => {
                tracing::debug!(port = %key, destination = %d, "keeping existing reservation");
                Some(d)
            }
            None => match &src.final_switch {
                Some(f) => {
                    let taken_port = pool.take(f);
                    if taken_port.is_none() {
                        failures.push(MigrateError::NoAvailablePort {
                            port: key.clone(),
                            switch: Some(f.clone()),
                        });
                    }
                    taken_port
                }
                None => {
                    let pick = destinations
                        .iter()
                        .filter(|d| pool.available(d) > 0)
                        .min_by(|a, b| {
                            let la = per_switch.get(*a).copied().unwrap_or(0);
                            let lb = per_switch.get(*b).copied().unwrap_or(0);
                            la.cmp(&lb)
                                .then_with(|| pool.available(b).cmp(&pool.available(a)))
                                .then_with(|| natural_cmp(a, b))
                        })
                        .cloned();
                    match pick.and_then(|sw| pool.take(&sw)) {
                        Some(d) => Some(d),
                        None => {
                            failures.push(MigrateError::NoAvailablePort {
                                port: key.clone(),
                                switch: None,
                            });
                            None
                        }
                    }
                }
            },
        };
        let Some(dest) = dest else {
            tracing::warn!(port = %key, "no destination port");
            continue;
        };
        let Some(dest_rec) = inv.record(&dest) else {
            continue;
        };
        taken.insert(dest.clone());
        *per_switch.entry(dest.switch_id.clone()).or_insert(0) += 1;
        let final_match = src.final_switch.as_deref() == Some(dest.switch_id.as_str());
        tracing::debug!(from = %key, to = %dest, final_match, "planned move");
        moves.push(Move { source: src.clone(), destination: dest_rec.clone(), final_match });
    }
    tracing::info!(moves = moves.len(), failures = failures.len(), "move plan built");
    MigrationPlan { moves, failures }
}
