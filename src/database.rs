use crate::signals::signal_name;
use crate::types::CompletedCall;
use anyhow::{Context, Result};
use duckdb::{Connection, params};
use std::sync::{Mutex, MutexGuard};

/// Optional archive of reported kill() calls
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Initialize a new database with schema
    pub fn init(path: &str) -> Result<Self> {
        let conn =
            Connection::open(path).context(format!("Failed to open database at {}", path))?;

        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kill_calls (
                time VARCHAR,
                comm VARCHAR,
                pid UINTEGER,
                target_pid BIGINT,
                signal BIGINT,
                signal_name VARCHAR,
                return_code INTEGER
            )
            "#,
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_target_pid ON kill_calls(target_pid)",
            [],
        )?;
        conn.execute("CREATE INDEX IF NOT EXISTS idx_pid ON kill_calls(pid)", [])?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("database connection mutex poisoned"))
    }

    /// Append one call and flush, so rows survive an interrupted live run
    pub fn append_call(&self, call: &CompletedCall) -> Result<()> {
        self.append_batch(std::slice::from_ref(call))
    }

    pub fn append_batch(&self, calls: &[CompletedCall]) -> Result<()> {
        let conn = self.lock()?;
        let mut appender = conn.appender("kill_calls")?;

        for call in calls {
            appender.append_row(params![
                &call.time,
                &call.comm,
                call.caller_pid,
                call.target_pid,
                call.signal,
                signal_name(call.signal),
                call.return_code,
            ])?;
        }

        appender.flush()?;
        Ok(())
    }

    pub fn count_calls(&self) -> Result<usize> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT COUNT(*) FROM kill_calls")?;
        let count: i64 = stmt.query_row([], |row| row.get(0))?;
        Ok(count as usize)
    }
}
