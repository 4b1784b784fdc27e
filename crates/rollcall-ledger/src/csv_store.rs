//! Flat CSV table: header `Name,Status,LastMarked`, one row per identity.

use crate::record::{parse_timestamp, AttendanceRecord, HEADER};
use crate::store::{LedgerError, LedgerStore};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

pub struct CsvStore {
    path: PathBuf,
}

impl CsvStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn parent_dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }
}

impl LedgerStore for CsvStore {
    fn describe(&self) -> String {
        format!("csv:{}", self.path.display())
    }

    fn exists(&self) -> Result<bool, LedgerError> {
        Ok(self.path.try_exists()?)
    }

    fn load(&self) -> Result<Vec<AttendanceRecord>, LedgerError> {
        if !self.exists()? {
            return Ok(Vec::new());
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)?;

        let header: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if header != HEADER {
            return Err(LedgerError::BadHeader(header));
        }

        let mut records = Vec::new();
        for (i, row) in reader.records().enumerate() {
            let row = row?;
            // Row numbers are 1-based and count the header.
            let line = i + 2;
            let bad = |reason: String| LedgerError::BadRow { row: line, reason };

            let identity = row.get(0).ok_or_else(|| bad("missing Name".into()))?;
            let status = row
                .get(1)
                .ok_or_else(|| bad("missing Status".into()))?
                .parse()
                .map_err(bad)?;
            let last_marked =
                parse_timestamp(row.get(2).unwrap_or("")).map_err(|e| bad(e.to_string()))?;

            records.push(AttendanceRecord {
                identity: identity.to_string(),
                status,
                last_marked,
            });
        }
        Ok(records)
    }

    fn replace(&self, records: &[AttendanceRecord]) -> Result<(), LedgerError> {
        let dir = self.parent_dir();
        std::fs::create_dir_all(dir)?;

        // Write the new table beside the old one, then rename over it.
        let mut tmp = NamedTempFile::new_in(dir)?;
        {
            let mut writer = csv::Writer::from_writer(&mut tmp);
            writer.write_record(HEADER)?;
            for record in records {
                writer.write_record([
                    record.identity.as_str(),
                    record.status.as_str(),
                    record.last_marked_cell().as_str(),
                ])?;
            }
            writer.flush()?;
        }
        tmp.flush()?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path)?;

        tracing::debug!(path = %self.path.display(), rows = records.len(), "ledger table written");
        Ok(())
    }
}
