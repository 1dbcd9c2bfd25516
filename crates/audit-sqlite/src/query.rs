use crate::{AuditLog, Relocation};
use anyhow::Result;
use portmove_core::PortKey;
use rusqlite::{params, Row};
use uuid::Uuid;

fn relocation_from_row(r: &Row<'_>) -> rusqlite::Result<Relocation> {
    Ok(Relocation {
        host: r.get(0)?,
        from: PortKey::new(r.get::<_, String>(1)?, r.get::<_, String>(2)?),
        to: PortKey::new(r.get::<_, String>(3)?, r.get::<_, String>(4)?),
        outcome: r.get(5)?,
        at_ms: r.get(6)?,
    })
}

impl AuditLog {
    pub fn table_exists(&self, name: &str) -> Result<bool> {
        let cnt: i64 = self.conn.query_row(
            "SELECT COUNT(1) FROM sqlite_master WHERE type='table' AND name=?",
            [name],
            |r| r.get(0),
        )?;
        Ok(cnt > 0)
    }

    /// Every recorded relocation of a host, oldest first.
    pub fn host_history(&self, host: &str) -> Result<Vec<Relocation>> {
        let mut stmt = self.conn.prepare(
            "SELECT host,from_switch,from_port,to_switch,to_port,outcome,at_ms FROM relocations \
             WHERE host=? ORDER BY relocation_id",
        )?;
        let rows = stmt.query_map([host], relocation_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// The port a host occupied before its first recorded move.
    pub fn origin_of(&self, host: &str) -> Result<Option<PortKey>> {
        Ok(self.host_history(host)?.into_iter().next().map(|r| r.from))
    }

    pub fn failure_count(&self, run_id: &Uuid) -> Result<i64> {
        let n: i64 = self.conn.query_row(
            "SELECT COUNT(1) FROM failures WHERE run_id=?",
            params![run_id.to_string()],
            |r| r.get(0),
        )?;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use crate::{AuditLog, FailureEntry, Relocation, RunMeta};
    use portmove_core::{MigrateError, PortKey};

    #[test]
    fn schema_is_applied() {
        let log = AuditLog::open_in_memory().unwrap();
        for t in ["runs", "relocations", "failures"] {
            assert!(log.table_exists(t).unwrap(), "{}", t);
        }
    }

    #[test]
    fn history_preserves_origin() {
        let log = AuditLog::open_in_memory().unwrap();
        let args = serde_json::json!({ "report": "runsheet.csv" });
        let run = log.begin_run(RunMeta::new("update", &args)).unwrap();
        let first = Relocation {
            host: "hmi-01".into(),
            from: PortKey::new("SW1", "Gi1/0/1"),
            to: PortKey::new("SW2", "Gi1/0/4"),
            outcome: "executed".into(),
            at_ms: 1,
        };
        let second = Relocation {
            from: first.to.clone(),
            to: PortKey::new("SW3", "Gi1/0/1"),
            at_ms: 2,
            ..first.clone()
        };
        log.add_relocation(&run, &first).unwrap();
        log.add_relocation(&run, &second).unwrap();
        assert_eq!(log.host_history("hmi-01").unwrap(), vec![first, second]);
        assert_eq!(log.origin_of("hmi-01").unwrap(), Some(PortKey::new("SW1", "Gi1/0/1")));
        assert_eq!(log.origin_of("nobody").unwrap(), None);
    }

    #[test]
    fn failures_are_counted_per_run() {
        let log = AuditLog::open_in_memory().unwrap();
        let run = log.begin_run(RunMeta::new("update", &serde_json::Value::Null)).unwrap();
        let err = MigrateError::UnknownRecord { key: PortKey::new("SW1", "Gi1/0/99") };
        log.add_failure(&run, &FailureEntry::from_error("update", &err)).unwrap();
        log.finish_run(&run, 10, 3, 1).unwrap();
        assert_eq!(log.failure_count(&run).unwrap(), 1);
    }

    #[test]
    fn unknown_outcome_rejected() {
        let log = AuditLog::open_in_memory().unwrap();
        let run = log.begin_run(RunMeta::new("move", &serde_json::Value::Null)).unwrap();
        let bad = Relocation {
            host: "x".into(),
            from: PortKey::new("a", "1"),
            to: PortKey::new("b", "1"),
            outcome: "teleported".into(),
            at_ms: 0,
        };
        assert!(log.add_relocation(&run, &bad).is_err());
    }
}
