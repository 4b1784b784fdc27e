//! Storage seam for the ledger table.

use crate::csv_store::CsvStore;
use crate::record::AttendanceRecord;
use crate::sqlite::SqliteStore;
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("csv: {0}")]
    Csv(#[from] csv::Error),
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("could not replace ledger file: {0}")]
    Persist(#[from] tempfile::PersistError),
    #[error("malformed ledger header: expected Name,Status,LastMarked, got {0:?}")]
    BadHeader(Vec<String>),
    #[error("malformed ledger row {row}: {reason}")]
    BadRow { row: usize, reason: String },
    #[error("ledger lock poisoned by a panicked writer")]
    Poisoned,
}

/// Whole-table persistence for attendance records.
///
/// Implementations never cache: `load` always reflects the backing store,
/// and `replace` commits the full table atomically.
pub trait LedgerStore: Send + Sync {
    /// Human-readable location, for logs and status output.
    fn describe(&self) -> String;

    /// Whether the table has been created yet.
    fn exists(&self) -> Result<bool, LedgerError>;

    /// Every record, in stored order. An absent table reads as empty.
    fn load(&self) -> Result<Vec<AttendanceRecord>, LedgerError>;

    /// Replace the full table with `records`.
    fn replace(&self, records: &[AttendanceRecord]) -> Result<(), LedgerError>;
}

/// Which table implementation backs the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LedgerBackend {
    #[default]
    Csv,
    Sqlite,
}

impl LedgerBackend {
    pub fn default_file_name(self) -> &'static str {
        match self {
            Self::Csv => "attendance.csv",
            Self::Sqlite => "attendance.db",
        }
    }

    pub fn open(self, path: &Path) -> Result<Box<dyn LedgerStore>, LedgerError> {
        Ok(match self {
            Self::Csv => Box::new(CsvStore::new(path)),
            Self::Sqlite => Box::new(SqliteStore::open(path)?),
        })
    }
}

impl FromStr for LedgerBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(format!("unknown ledger backend '{other}' (expected csv or sqlite)")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_from_str() {
        assert_eq!("CSV".parse(), Ok(LedgerBackend::Csv));
        assert_eq!("sqlite".parse(), Ok(LedgerBackend::Sqlite));
        assert!("xlsx".parse::<LedgerBackend>().is_err());
    }

    #[test]
    fn test_backend_open() {
        let dir = tempfile::tempdir().unwrap();
        let csv = LedgerBackend::Csv.open(&dir.path().join("a.csv")).unwrap();
        assert!(!csv.exists().unwrap());

        let db = LedgerBackend::Sqlite.open(&dir.path().join("a.db")).unwrap();
        assert!(!db.exists().unwrap());
        db.replace(&[AttendanceRecord::absent("Alice")]).unwrap();
        assert!(db.exists().unwrap());
    }
}
