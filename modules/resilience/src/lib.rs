//! Assign a final switch to every critical host on a retiring switch,
//! spreading them least-loaded first across the destination switches.

use portmove_core::inventory::sorted_switches;
use portmove_core::{
    natural_cmp, Inventory, MigrateError, MoveState, PortKey, PortPool, PortStatus, Result,
};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone)]
pub struct ResilienceOptions {
    /// Distinct destination switches the planned hosts must span
    /// (capped at the number of hosts being planned).
    pub min_switches: usize,
    /// Largest allowed difference in total critical load between any two
    /// destinations. When `None`, no destination may receive more than
    /// `ceil(hosts / destinations)` of this run's hosts above any other.
    pub max_skew: Option<usize>,
}

impl Default for ResilienceOptions {
    fn default() -> Self {
        ResilienceOptions { min_switches: 2, max_skew: None }
    }
}

#[derive(Debug, Clone)]
pub struct FinalRequest {
    pub sources: Vec<String>,
    pub destinations: Vec<String>,
    pub options: ResilienceOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Assignment {
    pub port: PortKey,
    pub host: String,
    pub final_switch: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ResiliencePlan {
    pub assignments: Vec<Assignment>,
    /// Critical hosts destined for each destination switch once applied.
    pub load: BTreeMap<String, usize>,
}

fn capacity_error(reason: String) -> MigrateError {
    tracing::warn!("{}", reason);
    MigrateError::InsufficientCapacity { reason }
}

/// Compute the assignment without touching the inventory.
pub fn plan_finals(inv: &Inventory, req: &FinalRequest) -> Result<ResiliencePlan> {
    let sources: BTreeSet<String> = req.sources.iter().cloned().collect();
    for sw in sources.iter().chain(req.destinations.iter()) {
        if !inv.has_switch(sw) {
            return Err(MigrateError::UnknownSwitch { switch: sw.clone() });
        }
    }
    let destinations: Vec<String> = sorted_switches(&req.destinations)
        .into_iter()
        .filter(|d| {
            let retiring = sources.contains(d);
            if retiring {
                tracing::warn!(switch = %d, "ignoring destination that is also a source");
            }
            !retiring
        })
        .collect();
    if destinations.is_empty() {
        return Err(capacity_error("no destination switches supplied".into()));
    }

    let planning: Vec<PortKey> = inv
        .all()
        .filter(|r| {
            r.critical && r.status == PortStatus::Connected && sources.contains(&r.switch_id)
        })
        .map(|r| r.key())
        .collect();
    let planning_set: BTreeSet<PortKey> = planning.iter().cloned().collect();

    let baseline = inv.final_load(&planning_set);
    let mut load: BTreeMap<String, usize> = destinations
        .iter()
        .map(|d| (d.clone(), baseline.get(d).copied().unwrap_or(0)))
        .collect();

    let pool = PortPool::build(inv, destinations.iter().map(|d| d.as_str()));
    let mut capacity: BTreeMap<String, usize> =
        destinations.iter().map(|d| (d.clone(), pool.available(d))).collect();
    for r in inv.all() {
        let Some(f) = r.final_switch.as_deref() else {
            continue;
        };
        let Some(cap) = capacity.get_mut(f) else {
            continue;
        };
        if planning_set.contains(&r.key()) {
            // a reservation held by a host being re-planned goes back to the pool
            if r.move_state == MoveState::Planned {
                if let Some(dest) = r.planned_destination.as_ref().filter(|d| d.switch_id == f) {
                    if inv.record(dest).map_or(false, |d| d.is_spare()) {
                        *cap += 1;
                    }
                }
            }
        } else if r.critical
            && r.status == PortStatus::Connected
            && r.switch_id != f
            && r.planned_destination.is_none()
            && r.move_state < MoveState::Executed
        {
            *cap = cap.saturating_sub(1);
        }
    }
    tracing::debug!(?capacity, ?load, hosts = planning.len(), "resilience planning");

    let mut assignments = Vec::with_capacity(planning.len());
    let mut used: BTreeMap<String, usize> = BTreeMap::new();
    for key in &planning {
        let pick = destinations
            .iter()
            .filter(|d| capacity[*d] > 0)
            .min_by(|a, b| load[*a].cmp(&load[*b]).then_with(|| natural_cmp(a, b)))
            .cloned();
        let Some(dest) = pick else {
            return Err(capacity_error(format!(
                "no destination switch has a spare port left for {} \
                 ({} of {} critical hosts placed)",
                key,
                assignments.len(),
                planning.len()
            )));
        };
        if let Some(l) = load.get_mut(&dest) {
            *l += 1;
        }
        if let Some(c) = capacity.get_mut(&dest) {
            *c -= 1;
        }
        *used.entry(dest.clone()).or_insert(0) += 1;
        let host = inv.record(key).map(|r| r.description.clone()).unwrap_or_default();
        tracing::debug!(port = %key, final_switch = %dest, "assigned");
        assignments.push(Assignment { port: key.clone(), host, final_switch: dest });
    }

    let required = req.options.min_switches.min(planning.len());
    if used.len() < required {
        return Err(capacity_error(format!(
            "{} critical hosts land on {} switch(es), at least {} required",
            planning.len(),
            used.len(),
            required
        )));
    }
    // every destination counts, including ones that ran out of spare ports
    let (measured, bound, what) = match req.options.max_skew {
        Some(max_skew) => (load.clone(), max_skew, "critical load"),
        None => {
            let received = destinations
                .iter()
                .map(|d| (d.clone(), used.get(d).copied().unwrap_or(0)))
                .collect();
            (received, planning.len().div_ceil(destinations.len()), "hosts received")
        }
    };
    let skew = spread(&measured);
    if skew > bound {
        return Err(capacity_error(format!(
            "{} skew {} exceeds {} across destinations {:?}",
            what, skew, bound, measured
        )));
    }
    Ok(ResiliencePlan { assignments, load })
}

fn spread(counts: &BTreeMap<String, usize>) -> usize {
    let max = counts.values().copied().max().unwrap_or(0);
    let min = counts.values().copied().min().unwrap_or(0);
    max - min
}

/// Write the plan's final switches. A planned reservation on a different
/// switch is dropped so the next move run re-plans it.
pub fn apply(inv: &mut Inventory, plan: &ResiliencePlan) {
    for a in &plan.assignments {
        let Some(r) = inv.record_mut(&a.port) else {
            continue;
        };
        let stale = r.move_state == MoveState::Planned
            && r.planned_destination.as_ref().map_or(false, |d| d.switch_id != a.final_switch);
        if stale {
            tracing::warn!(port = %a.port, "final switch changed, releasing reservation");
            r.planned_destination = None;
        }
        r.final_switch = Some(a.final_switch.clone());
    }
    tracing::info!(
        assigned = plan.assignments.len(),
        load = ?plan.load,
        "final switches assigned"
    );
}

/// Plan and apply. On error the inventory is left unchanged.
pub fn assign_finals(inv: &mut Inventory, req: &FinalRequest) -> Result<ResiliencePlan> {
    let plan = plan_finals(inv, req)?;
    apply(inv, &plan);
    Ok(plan)
}
