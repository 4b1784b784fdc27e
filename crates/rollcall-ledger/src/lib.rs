//! rollcall-ledger: durable attendance records keyed by identity.
//!
//! A [`Ledger`] sits in front of a [`LedgerStore`]; the flat CSV table and
//! SQLite backends are interchangeable.

pub mod csv_store;
pub mod ledger;
pub mod record;
pub mod sqlite;
pub mod store;

pub use csv_store::CsvStore;
pub use ledger::{Ledger, MarkOutcome};
pub use record::{AttendanceRecord, Status, TIMESTAMP_FORMAT};
pub use sqlite::SqliteStore;
pub use store::{LedgerBackend, LedgerError, LedgerStore};
