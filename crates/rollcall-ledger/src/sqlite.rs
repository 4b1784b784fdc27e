//! SQLite-backed ledger table.

use crate::record::{parse_timestamp, AttendanceRecord};
use crate::store::{LedgerError, LedgerStore};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

const CREATE_TABLE: &str = "CREATE TABLE IF NOT EXISTS attendance (
    position    INTEGER PRIMARY KEY,
    name        TEXT NOT NULL,
    status      TEXT NOT NULL,
    last_marked TEXT NOT NULL DEFAULT ''
)";

pub struct SqliteStore {
    conn: Mutex<Connection>,
    location: String,
}

impl SqliteStore {
    /// Open (or create) the database file. The table itself is created on first write.
    pub fn open(path: &Path) -> Result<Self, LedgerError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        Ok(Self {
            conn: Mutex::new(Connection::open(path)?),
            location: format!("sqlite:{}", path.display()),
        })
    }

    pub fn open_in_memory() -> Result<Self, LedgerError> {
        Ok(Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            location: "sqlite::memory:".to_string(),
        })
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, LedgerError> {
        self.conn.lock().map_err(|_| LedgerError::Poisoned)
    }
}

impl LedgerStore for SqliteStore {
    fn describe(&self) -> String {
        self.location.clone()
    }

    fn exists(&self) -> Result<bool, LedgerError> {
        let found = self
            .conn()?
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'attendance'",
                [],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    fn load(&self) -> Result<Vec<AttendanceRecord>, LedgerError> {
        if !self.exists()? {
            return Ok(Vec::new());
        }

        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT name, status, last_marked FROM attendance ORDER BY position")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut records = Vec::new();
        for (i, row) in rows.enumerate() {
            let (identity, status, last_marked) = row?;
            let bad = |reason: String| LedgerError::BadRow { row: i + 1, reason };
            records.push(AttendanceRecord {
                identity,
                status: status.parse().map_err(bad)?,
                last_marked: parse_timestamp(&last_marked).map_err(|e| bad(e.to_string()))?,
            });
        }
        Ok(records)
    }

    fn replace(&self, records: &[AttendanceRecord]) -> Result<(), LedgerError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        tx.execute(CREATE_TABLE, [])?;
        tx.execute("DELETE FROM attendance", [])?;
        {
            let mut insert = tx.prepare(
                "INSERT INTO attendance (position, name, status, last_marked) VALUES (?1, ?2, ?3, ?4)",
            )?;
            for (position, record) in records.iter().enumerate() {
                insert.execute(params![
                    position as i64,
                    record.identity,
                    record.status.as_str(),
                    record.last_marked_cell(),
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(location = %self.location, rows = records.len(), "ledger table written");
        Ok(())
    }
}
