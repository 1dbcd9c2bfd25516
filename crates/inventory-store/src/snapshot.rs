use portmove_core::{Inventory, MigrateError, MoveState, PortKey, PortRecord, PortStatus, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct Snapshot {
    version: u32,
    #[serde(default)]
    switches: BTreeMap<String, BTreeMap<String, StoredPort>>,
}

/// Record body as stored under `switches.<switch_id>.<port_id>`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct StoredPort {
    #[serde(default)]
    description: String,
    status: PortStatus,
    #[serde(default)]
    vlan: String,
    #[serde(default)]
    speed: String,
    #[serde(default)]
    duplex: String,
    #[serde(default)]
    critical: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    final_switch: Option<String>,
    #[serde(default)]
    move_state: MoveState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    planned_destination: Option<PortKey>,
}

impl From<&PortRecord> for StoredPort {
    fn from(r: &PortRecord) -> Self {
        StoredPort {
            description: r.description.clone(),
            status: r.status.clone(),
            vlan: r.vlan.clone(),
            speed: r.speed.clone(),
            duplex: r.duplex.clone(),
            critical: r.critical,
            final_switch: r.final_switch.clone(),
            move_state: r.move_state,
            planned_destination: r.planned_destination.clone(),
        }
    }
}

impl StoredPort {
    fn into_record(self, switch_id: &str, port_id: &str) -> PortRecord {
        PortRecord {
            switch_id: switch_id.to_string(),
            port_id: port_id.to_string(),
            description: self.description,
            status: self.status,
            vlan: self.vlan,
            speed: self.speed,
            duplex: self.duplex,
            critical: self.critical,
            final_switch: self.final_switch,
            move_state: self.move_state,
            planned_destination: self.planned_destination,
        }
    }
}

pub fn to_yaml(inv: &Inventory) -> Result<String> {
    let mut switches: BTreeMap<String, BTreeMap<String, StoredPort>> = BTreeMap::new();
    for r in inv.all() {
        switches
            .entry(r.switch_id.clone())
            .or_default()
            .insert(r.port_id.clone(), StoredPort::from(r));
    }
    let snap = Snapshot { version: SNAPSHOT_VERSION, switches };
    serde_yaml::to_string(&snap)
        .map_err(|e| MigrateError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

/// Parse and schema-check a snapshot. `path` is only used in error messages.
pub fn from_yaml(s: &str, path: &Path) -> Result<Inventory> {
    let corrupt = |reason: String| MigrateError::StoreCorrupt { path: path.to_path_buf(), reason };
    let snap: Snapshot = serde_yaml::from_str(s).map_err(|e| corrupt(e.to_string()))?;
    if snap.version != SNAPSHOT_VERSION {
        return Err(corrupt(format!("unsupported snapshot version {}", snap.version)));
    }
    let mut records = Vec::new();
    for (switch_id, ports) in snap.switches {
        if switch_id.trim().is_empty() {
            return Err(corrupt("empty switch id".into()));
        }
        for (port_id, stored) in ports {
            if port_id.trim().is_empty() {
                return Err(corrupt(format!("empty port id on switch {}", switch_id)));
            }
            records.push(stored.into_record(&switch_id, &port_id));
        }
    }
    Inventory::from_records(records).map_err(|e| corrupt(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Inventory {
        let mut host = PortRecord::new("SW1", "Gi1/0/1", PortStatus::Connected);
        host.description = "scada-hmi-01".into();
        host.vlan = "1296".into();
        host.speed = "a-1000".into();
        host.duplex = "a-full".into();
        host.critical = true;
        host.final_switch = Some("SW2".into());
        host.move_state = MoveState::Planned;
        host.planned_destination = Some(PortKey::new("SW2", "Gi1/0/7"));
        let mut odd = PortRecord::new("SW2", "Gi1/0/7", PortStatus::Other("monitoring".into()));
        odd.description = "span: tap".into();
        let spare = PortRecord::new("SW2", "Gi1/0/8", PortStatus::Disabled);
        Inventory::from_records(vec![host, odd, spare]).unwrap()
    }

    #[test]
    fn yaml_round_trip_is_exact() {
        let inv = sample();
        let text = to_yaml(&inv).unwrap();
        let back = from_yaml(&text, Path::new("mem")).unwrap();
        assert_eq!(back, inv);
        assert_eq!(to_yaml(&back).unwrap(), text);
    }

    #[test]
    fn minimal_document_fills_defaults() {
        let text = "version: 1\nswitches:\n  SW1:\n    Gi1/0/1:\n      status: notconnect\n";
        let inv = from_yaml(text, Path::new("mem")).unwrap();
        let r = inv.get("SW1", "Gi1/0/1").unwrap();
        assert_eq!(r.status, PortStatus::NotConnected);
        assert_eq!(r.move_state, MoveState::Unplanned);
        assert!(!r.critical);
    }

    #[test]
    fn schema_violations_are_corrupt() {
        for text in [
            "version: 2\nswitches: {}\n",
            "version: 1\nswitches:\n  SW1:\n    Gi1/0/1:\n      status: connected\n      \
             colour: red\n",
            "version: 1\nswitches:\n  SW1:\n    Gi1/0/1:\n      description: x\n",
            "version: 1\nswitches:\n  SW1:\n    Gi1/0/1:\n      status: connected\n      \
             move_state: teleported\n",
            "not: [valid",
        ] {
            let res = from_yaml(text, Path::new("mem"));
            assert!(matches!(res, Err(MigrateError::StoreCorrupt { .. })), "{}", text);
        }
    }
}
