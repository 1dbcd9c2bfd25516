pub const MIG_0001_INIT: &str = r#"
BEGIN;

CREATE TABLE runs (
  run_id          TEXT PRIMARY KEY,
  started_at      INTEGER NOT NULL,
  finished_at     INTEGER,
  command         TEXT NOT NULL,
  tool_version    TEXT NOT NULL,
  args_json       TEXT NOT NULL,
  success_count   INTEGER DEFAULT 0,
  failure_count   INTEGER DEFAULT 0
);

CREATE TABLE relocations (
  relocation_id   INTEGER PRIMARY KEY AUTOINCREMENT,
  run_id          TEXT NOT NULL REFERENCES runs(run_id) ON DELETE CASCADE,
  host            TEXT NOT NULL,
  from_switch     TEXT NOT NULL,
  from_port       TEXT NOT NULL,
  to_switch       TEXT NOT NULL,
  to_port         TEXT NOT NULL,
  outcome         TEXT NOT NULL CHECK (outcome IN ('planned','executed','released','confirmed')),
  at_ms           INTEGER NOT NULL
);

CREATE TABLE failures (
  failure_id      INTEGER PRIMARY KEY AUTOINCREMENT,
  run_id          TEXT NOT NULL REFERENCES runs(run_id) ON DELETE CASCADE,
  scope           TEXT NOT NULL,
  code            TEXT NOT NULL,
  port_key        TEXT,
  message         TEXT NOT NULL,
  at_ms           INTEGER NOT NULL
);

CREATE INDEX idx_relocations_host ON relocations(host);
CREATE INDEX idx_relocations_from ON relocations(from_switch, from_port);
CREATE INDEX idx_failures_run ON failures(run_id);

COMMIT;
"#;
