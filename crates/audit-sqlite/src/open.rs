use crate::schema::MIG_0001_INIT;
use anyhow::Result;
use rusqlite::Connection;

pub struct AuditLog {
    pub conn: Connection,
}

impl AuditLog {
    pub fn open_or_create(path: impl AsRef<std::path::Path>) -> Result<Self> {
        if let Some(dir) = path.as_ref().parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let conn = Connection::open(path)?;
        apply_pragmas(&conn)?;
        migrate(&conn)?;
        Ok(AuditLog { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.pragma_update(None, "foreign_keys", &"ON")?;
        migrate(&conn)?;
        Ok(AuditLog { conn })
    }
}

fn apply_pragmas(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", &"WAL")?;
    conn.pragma_update(None, "synchronous", &"NORMAL")?;
    conn.pragma_update(None, "foreign_keys", &"ON")?;
    Ok(())
}

fn migrate(conn: &Connection) -> Result<()> {
    let exists: i64 = conn.query_row(
        "SELECT COUNT(1) FROM sqlite_master WHERE type='table' AND name='runs'",
        [],
        |r| r.get(0),
    )?;
    if exists == 0 {
        conn.execute_batch(MIG_0001_INIT)?;
    }
    Ok(())
}
