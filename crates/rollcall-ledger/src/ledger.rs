//! The attendance ledger: one presence record per identity.
//!
//! Every operation re-reads the backing store. Mutations run as a
//! read-modify-write of the full table under a single lock, so concurrent
//! marks of different identities never lose each other's writes.

use crate::record::{AttendanceRecord, Status};
use crate::store::{LedgerError, LedgerStore};
use chrono::{NaiveDateTime, Timelike};
use rollcall_core::is_sentinel_label;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};

/// What `mark_present` did to the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkOutcome {
    /// Sentinel label; nothing written.
    Skipped,
    /// Existing row set to Present.
    Updated,
    /// No row existed; a Present row was appended.
    Appended,
}

pub struct Ledger {
    store: Box<dyn LedgerStore>,
    /// Identities used when the table is created lazily.
    roster: Vec<String>,
    write_lock: Mutex<()>,
}

impl Ledger {
    pub fn new(store: Box<dyn LedgerStore>, roster: Vec<String>) -> Self {
        Self {
            store,
            roster,
            write_lock: Mutex::new(()),
        }
    }

    pub fn describe(&self) -> String {
        self.store.describe()
    }

    fn lock(&self) -> Result<MutexGuard<'_, ()>, LedgerError> {
        self.write_lock.lock().map_err(|_| LedgerError::Poisoned)
    }

    /// Create the table with every identity Absent, unless it already exists.
    ///
    /// Returns `true` when the table was created. An existing table is left
    /// untouched even if `identities` has changed since.
    pub fn initialize(&self, identities: &[String]) -> Result<bool, LedgerError> {
        let _guard = self.lock()?;
        self.initialize_locked(identities)
    }

    fn initialize_locked(&self, identities: &[String]) -> Result<bool, LedgerError> {
        if self.store.exists()? {
            return Ok(false);
        }

        let mut seen = HashSet::new();
        let records: Vec<AttendanceRecord> = identities
            .iter()
            .filter(|name| seen.insert(name.as_str()))
            .map(AttendanceRecord::absent)
            .collect();

        self.store.replace(&records)?;
        tracing::info!(
            store = %self.store.describe(),
            identities = records.len(),
            "attendance ledger created"
        );
        Ok(true)
    }

    /// Record `identity` as present at `now`.
    ///
    /// The two sentinel labels are never written. Any other string is treated
    /// as an identity; one without a row is appended.
    pub fn mark_present(
        &self,
        identity: &str,
        now: NaiveDateTime,
    ) -> Result<MarkOutcome, LedgerError> {
        if is_sentinel_label(identity) {
            tracing::debug!(label = identity, "no recognized identity; ledger not updated");
            return Ok(MarkOutcome::Skipped);
        }

        // Stored with second precision.
        let now = now.with_nanosecond(0).unwrap_or(now);

        let _guard = self.lock()?;
        self.initialize_locked(&self.roster)?;

        let mut records = self.store.load()?;
        let outcome = match records.iter_mut().find(|r| r.identity == identity) {
            Some(record) => {
                record.status = Status::Present;
                record.last_marked = Some(now);
                MarkOutcome::Updated
            }
            None => {
                records.push(AttendanceRecord::present(identity, now));
                MarkOutcome::Appended
            }
        };
        self.store.replace(&records)?;

        tracing::info!(identity, ?outcome, "attendance marked");
        Ok(outcome)
    }

    /// Current record for `identity`, if any.
    pub fn lookup(&self, identity: &str) -> Result<Option<AttendanceRecord>, LedgerError> {
        Ok(self
            .list_all()?
            .into_iter()
            .find(|r| r.identity == identity))
    }

    /// Every record in stored order.
    pub fn list_all(&self) -> Result<Vec<AttendanceRecord>, LedgerError> {
        let _guard = self.lock()?;
        self.initialize_locked(&self.roster)?;
        self.store.load()
    }
}
