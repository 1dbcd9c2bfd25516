use crate::{AuditLog, FailureEntry, Relocation, RunMeta};
use anyhow::Result;
use rusqlite::params;
use uuid::Uuid;

impl AuditLog {
    pub fn begin_run(&self, meta: RunMeta) -> Result<Uuid> {
        self.conn.execute(
            "INSERT INTO runs(run_id, started_at, command, tool_version, args_json) \
             VALUES (?,?,?,?,?)",
            params![
                meta.run_id.to_string(),
                meta.started_at,
                meta.command,
                meta.tool_version,
                meta.args_json
            ],
        )?;
        Ok(meta.run_id)
    }

    pub fn finish_run(
        &self,
        run_id: &Uuid,
        finished_at: i64,
        success_count: i64,
        failure_count: i64,
    ) -> Result<()> {
        self.conn.execute(
            "UPDATE runs SET finished_at=?, success_count=?, failure_count=? WHERE run_id=?",
            params![finished_at, success_count, failure_count, run_id.to_string()],
        )?;
        Ok(())
    }

    pub fn add_relocation(&self, run_id: &Uuid, r: &Relocation) -> Result<()> {
        self.conn.execute(
            "INSERT INTO relocations\
             (run_id,host,from_switch,from_port,to_switch,to_port,outcome,at_ms) \
             VALUES (?,?,?,?,?,?,?,?)",
            params![
                run_id.to_string(),
                r.host,
                r.from.switch_id,
                r.from.port_id,
                r.to.switch_id,
                r.to.port_id,
                r.outcome,
                r.at_ms
            ],
        )?;
        Ok(())
    }

    pub fn add_failure(&self, run_id: &Uuid, f: &FailureEntry) -> Result<()> {
        self.conn.execute(
            "INSERT INTO failures(run_id,scope,code,port_key,message,at_ms) VALUES (?,?,?,?,?,?)",
            params![run_id.to_string(), f.scope, f.code, f.port_key, f.message, f.at_ms],
        )?;
        Ok(())
    }
}
