//! Run recording. Audit problems are logged and never fail the run.

use crate::config::Config;
use portmove_core::{MigrateError, PortKey};

#[cfg(feature = "audit")]
pub struct Recorder {
    log: audit_sqlite::AuditLog,
    run_id: uuid::Uuid,
    ok: i64,
    failed: i64,
}

#[cfg(feature = "audit")]
impl Recorder {
    pub fn start(cfg: &Config, command: &str, args: serde_json::Value) -> Option<Self> {
        if !cfg.audit_enabled() {
            return None;
        }
        let path = cfg.audit_path();
        let opened = audit_sqlite::AuditLog::open_or_create(&path).and_then(|log| {
            let meta = audit_sqlite::RunMeta::new(command, &args);
            log.begin_run(meta).map(|id| (log, id))
        });
        match opened {
            Ok((log, run_id)) => {
                tracing::debug!(path = %path.display(), %run_id, "audit run started");
                Some(Recorder { log, run_id, ok: 0, failed: 0 })
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "audit log unavailable: {:#}", e);
                None
            }
        }
    }

    pub fn relocation(&mut self, host: &str, from: &PortKey, to: &PortKey, outcome: &str) {
        let r = audit_sqlite::Relocation {
            host: host.to_string(),
            from: from.clone(),
            to: to.clone(),
            outcome: outcome.to_string(),
            at_ms: audit_sqlite::now_ms(),
        };
        match self.log.add_relocation(&self.run_id, &r) {
            Ok(()) => self.ok += 1,
            Err(e) => tracing::warn!("audit relocation not recorded: {:#}", e),
        }
    }

    pub fn succeeded(&mut self, n: usize) {
        self.ok += n as i64;
    }

    pub fn failures(&mut self, scope: &str, errors: &[MigrateError]) {
        for e in errors {
            let entry = audit_sqlite::FailureEntry::from_error(scope, e);
            if let Err(err) = self.log.add_failure(&self.run_id, &entry) {
                tracing::warn!("audit failure not recorded: {:#}", err);
            }
            self.failed += 1;
        }
    }

    pub fn finish(self) {
        let finished = audit_sqlite::now_ms();
        if let Err(e) = self.log.finish_run(&self.run_id, finished, self.ok, self.failed) {
            tracing::warn!("audit run not closed: {:#}", e);
        }
    }
}

#[cfg(not(feature = "audit"))]
pub struct Recorder;

#[cfg(not(feature = "audit"))]
impl Recorder {
    pub fn start(_cfg: &Config, _command: &str, _args: serde_json::Value) -> Option<Self> {
        None
    }
    pub fn relocation(&mut self, _host: &str, _from: &PortKey, _to: &PortKey, _outcome: &str) {}
    pub fn succeeded(&mut self, _n: usize) {}
    pub fn failures(&mut self, _scope: &str, _errors: &[MigrateError]) {}
    pub fn finish(self) {}
}
