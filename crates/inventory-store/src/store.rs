use crate::snapshot::{from_yaml, to_yaml};
use portmove_core::{Inventory, MigrateError, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// File-backed inventory. Saves go to a temp file in the target directory
/// and are renamed over the snapshot, so readers only ever see a whole file.
#[derive(Debug, Clone)]
pub struct InventoryStore {
    path: PathBuf,
}

impl InventoryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        InventoryStore { path: path.into() }
    }

    pub fn in_dir(dir: impl AsRef<Path>, file: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(file))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<Inventory> {
        let text = fs::read_to_string(&self.path).map_err(|e| MigrateError::StoreCorrupt {
            path: self.path.clone(),
            reason: format!("cannot read: {}", e),
        })?;
        let inv = from_yaml(&text, &self.path)?;
        tracing::info!(path = %self.path.display(), ports = inv.len(), "loaded inventory");
        Ok(inv)
    }

    pub fn save(&self, inv: &Inventory) -> Result<()> {
        let staged = self.stage(inv)?;
        self.commit(staged)?;
        tracing::info!(path = %self.path.display(), ports = inv.len(), "saved inventory");
        Ok(())
    }

    /// Write the full snapshot to a synced temp file beside the target.
    fn stage(&self, inv: &Inventory) -> Result<NamedTempFile> {
        let text = to_yaml(inv)?;
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;
        let mut tmp = NamedTempFile::new_in(&dir)?;
        tmp.write_all(text.as_bytes())?;
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        Ok(tmp)
    }

    fn commit(&self, staged: NamedTempFile) -> Result<()> {
        staged.persist(&self.path).map_err(|e| MigrateError::Io(e.error))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use portmove_core::{MoveState, PortKey, PortRecord, PortStatus};

    fn inventory(desc: &str) -> Inventory {
        let mut host = PortRecord::new("SW1", "Gi1/0/1", PortStatus::Connected);
        host.description = desc.into();
        host.critical = true;
        host.final_switch = Some("SW2".into());
        host.move_state = MoveState::Planned;
        host.planned_destination = Some(PortKey::new("SW2", "Gi1/0/2"));
        let spare = PortRecord::new("SW2", "Gi1/0/2", PortStatus::NotConnected);
        Inventory::from_records(vec![host, spare]).unwrap()
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = InventoryStore::in_dir(dir.path().join("switchports"), "switchports.yaml");
        let inv = inventory("hmi-01");
        store.save(&inv).unwrap();
        assert_eq!(store.load().unwrap(), inv);
    }

    #[test]
    fn missing_snapshot_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let store = InventoryStore::new(dir.path().join("absent.yaml"));
        assert!(matches!(store.load(), Err(MigrateError::StoreCorrupt { .. })));
    }

    #[test]
    fn crash_before_swap_keeps_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = InventoryStore::new(dir.path().join("switchports.yaml"));
        let old = inventory("before");
        store.save(&old).unwrap();

        // staged but never committed: the process died between write and rename
        let staged = store.stage(&inventory("after")).unwrap();
        drop(staged);
        // a torn temp file left behind by a killed writer
        let torn = "version: 1\nswitches:\n  SW1:\n    Gi1/0";
        fs::write(dir.path().join(".tmpTORN01"), torn).unwrap();
        assert_eq!(store.load().unwrap(), old);

        let new = inventory("after");
        store.save(&new).unwrap();
        assert_eq!(store.load().unwrap(), new);
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = InventoryStore::new(dir.path().join("switchports.yaml"));
        store.save(&inventory("a")).unwrap();
        store.save(&inventory("b")).unwrap();
        let names: Vec<_> =
            fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
        assert_eq!(names.len(), 1);
    }
}
