use crate::{natural_cmp, MigrateError, MoveState, PortKey, PortRecord, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Every known port, keyed on `(switch_id, port_id)`.
///
/// Iteration order is switch then port, natural order, so plans and
/// rendered configuration are reproducible for unchanged input.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Inventory {
    ports: BTreeMap<PortKey, PortRecord>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from records, rejecting a second record for the same port.
    pub fn from_records(records: impl IntoIterator<Item = PortRecord>) -> Result<Self> {
        let mut inv = Inventory::new();
        for r in records {
            let key = r.key();
            if inv.ports.insert(key.clone(), r).is_some() {
                return Err(MigrateError::Validation { key, reason: "duplicate port".into() });
            }
        }
        Ok(inv)
    }

    pub fn len(&self) -> usize {
        self.ports.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }

    pub fn get(&self, switch_id: &str, port_id: &str) -> Option<&PortRecord> {
        self.ports.get(&PortKey::new(switch_id, port_id))
    }

    pub fn record(&self, key: &PortKey) -> Option<&PortRecord> {
        self.ports.get(key)
    }

    pub fn record_mut(&mut self, key: &PortKey) -> Option<&mut PortRecord> {
        self.ports.get_mut(key)
    }

    pub fn contains(&self, key: &PortKey) -> bool {
        self.ports.contains_key(key)
    }

    /// Insert or replace the record at its own key; returns the replaced record.
    pub fn upsert(&mut self, record: PortRecord) -> Option<PortRecord> {
        self.ports.insert(record.key(), record)
    }

    pub fn all(&self) -> impl Iterator<Item = &PortRecord> {
        self.ports.values()
    }

    pub fn all_mut(&mut self) -> impl Iterator<Item = &mut PortRecord> {
        self.ports.values_mut()
    }

    pub fn on_switch<'a>(
        &'a self,
        switch_id: &'a str,
    ) -> impl Iterator<Item = &'a PortRecord> + 'a {
        self.ports.values().filter(move |r| r.switch_id == switch_id)
    }

    /// Distinct switch ids in natural order.
    pub fn switch_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.ports.keys().map(|k| k.switch_id.clone()).collect();
        ids.dedup();
        ids
    }

    pub fn has_switch(&self, switch_id: &str) -> bool {
        self.ports.keys().any(|k| k.switch_id == switch_id)
    }

    /// Ports held as the destination of a planned, not yet executed, move.
    pub fn reserved(&self) -> BTreeSet<PortKey> {
        self.ports
            .values()
            .filter(|r| r.move_state == MoveState::Planned)
            .filter_map(|r| r.planned_destination.clone())
            .collect()
    }

    /// Exchange the locations of two records: each is re-keyed to the other's port.
    pub fn swap_locations(&mut self, a: &PortKey, b: &PortKey) -> Result<()> {
        if a == b {
            return Ok(());
        }
        let mut ra =
            self.ports.remove(a).ok_or_else(|| MigrateError::UnknownRecord { key: a.clone() })?;
        let mut rb = match self.ports.remove(b) {
            Some(r) => r,
            None => {
                self.ports.insert(a.clone(), ra);
                return Err(MigrateError::UnknownRecord { key: b.clone() });
            }
        };
        ra.switch_id = b.switch_id.clone();
        ra.port_id = b.port_id.clone();
        rb.switch_id = a.switch_id.clone();
        rb.port_id = a.port_id.clone();
        self.ports.insert(b.clone(), ra);
        self.ports.insert(a.clone(), rb);
        Ok(())
    }

    /// Integrity problems that do not make the snapshot unreadable:
    /// undescribed critical hosts and final switches missing from the inventory.
    pub fn validate(&self) -> Vec<MigrateError> {
        let switches: BTreeSet<String> = self.switch_ids().into_iter().collect();
        let mut problems = Vec::new();
        for r in self.ports.values() {
            if let Err(e) = r.validate() {
                problems.push(e);
            }
            if let Some(f) = &r.final_switch {
                if !switches.contains(f) {
                    problems.push(MigrateError::Validation {
                        key: r.key(),
                        reason: format!("final switch {} is not in the inventory", f),
                    });
                }
            }
        }
        problems
    }

    /// Count of critical records per final switch, excluding the given keys.
    pub fn final_load(&self, exclude: &BTreeSet<PortKey>) -> BTreeMap<String, usize> {
        let mut load = BTreeMap::new();
        for (k, r) in &self.ports {
            if !r.critical || exclude.contains(k) {
                continue;
            }
            if let Some(f) = &r.final_switch {
                *load.entry(f.clone()).or_insert(0) += 1;
            }
        }
        load
    }
}

/// Sort switch ids naturally and drop duplicates.
pub fn sorted_switches(ids: &[String]) -> Vec<String> {
    let mut v = ids.to_vec();
    v.sort_by(|a, b| natural_cmp(a, b));
    v.dedup();
    v
}
