use crate::{Inventory, PortKey};
use std::collections::{BTreeMap, VecDeque};

/// Spare destination ports, grouped per switch and consumed lowest port first.
///
/// A port is in the pool when it is spare (`not-connected` or `disabled`),
/// not critical, and not already reserved by a planned move.
#[derive(Debug, Clone, Default)]
pub struct PortPool {
    free: BTreeMap<String, VecDeque<PortKey>>,
}

impl PortPool {
    pub fn build<'a>(inv: &Inventory, switches: impl IntoIterator<Item = &'a str>) -> Self {
        let reserved = inv.reserved();
        let mut free = BTreeMap::new();
        for sw in switches {
            let ports: VecDeque<PortKey> = inv
                .on_switch(sw)
                .filter(|r| r.is_spare())
                .map(|r| r.key())
                .filter(|k| !reserved.contains(k))
                .collect();
            tracing::debug!(switch = sw, spare = ports.len(), "destination pool");
            free.insert(sw.to_string(), ports);
        }
        PortPool { free }
    }

    pub fn available(&self, switch_id: &str) -> usize {
        self.free.get(switch_id).map(|q| q.len()).unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.free.values().map(|q| q.len()).sum()
    }

    /// Take the lowest free port on a switch.
    pub fn take(&mut self, switch_id: &str) -> Option<PortKey> {
        self.free.get_mut(switch_id).and_then(|q| q.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MoveState, PortRecord, PortStatus};

    fn inventory() -> Inventory {
        let mut reserver = PortRecord::new("SW1", "Gi1/0/1", PortStatus::Connected);
        reserver.description = "app".into();
        reserver.move_state = MoveState::Planned;
        reserver.planned_destination = Some(PortKey::new("SW2", "Gi1/0/3"));
        let mut critical_spare = PortRecord::new("SW2", "Gi1/0/4", PortStatus::NotConnected);
        critical_spare.critical = true;
        Inventory::from_records(vec![
            reserver,
            PortRecord::new("SW2", "Gi1/0/10", PortStatus::NotConnected),
            PortRecord::new("SW2", "Gi1/0/2", PortStatus::Disabled),
            PortRecord::new("SW2", "Gi1/0/3", PortStatus::Disabled),
            critical_spare,
            PortRecord::new("SW2", "Gi1/0/5", PortStatus::Connected),
            PortRecord::new("SW2", "Gi1/0/6", PortStatus::ErrorDisabled),
        ])
        .unwrap()
    }

    #[test]
    fn pool_excludes_reserved_critical_and_occupied() {
        let mut pool = PortPool::build(&inventory(), ["SW2"]);
        assert_eq!(pool.available("SW2"), 2);
        assert_eq!(pool.take("SW2"), Some(PortKey::new("SW2", "Gi1/0/2")));
        assert_eq!(pool.take("SW2"), Some(PortKey::new("SW2", "Gi1/0/10")));
        assert_eq!(pool.take("SW2"), None);
    }

    #[test]
    fn unknown_switch_has_no_ports() {
        let mut pool = PortPool::build(&inventory(), ["SW2"]);
        assert_eq!(pool.available("SW7"), 0);
        assert_eq!(pool.take("SW7"), None);
        assert_eq!(pool.total(), 2);
    }
}
