use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Wall-clock format used for `LastMarked`, both on disk and over HTTP.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column names of the persisted table, in order.
pub const HEADER: [&str; 3] = ["Name", "Status", "LastMarked"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Status {
    Absent,
    Present,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Absent => "Absent",
            Self::Present => "Present",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Absent" => Ok(Self::Absent),
            "Present" => Ok(Self::Present),
            other => Err(format!("unknown status {other:?}")),
        }
    }
}

/// Presence state of one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceRecord {
    #[serde(rename = "Name")]
    pub identity: String,
    #[serde(rename = "Status")]
    pub status: Status,
    #[serde(rename = "LastMarked", serialize_with = "serialize_last_marked")]
    pub last_marked: Option<NaiveDateTime>,
}

impl AttendanceRecord {
    pub fn absent(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            status: Status::Absent,
            last_marked: None,
        }
    }

    pub fn present(identity: impl Into<String>, at: NaiveDateTime) -> Self {
        Self {
            identity: identity.into(),
            status: Status::Present,
            last_marked: Some(at),
        }
    }

    /// `LastMarked` cell: formatted timestamp or empty.
    pub fn last_marked_cell(&self) -> String {
        format_timestamp(self.last_marked)
    }
}

pub fn format_timestamp(ts: Option<NaiveDateTime>) -> String {
    ts.map(|t| t.format(TIMESTAMP_FORMAT).to_string())
        .unwrap_or_default()
}

/// Parse a `LastMarked` cell; blank means never marked.
pub fn parse_timestamp(cell: &str) -> Result<Option<NaiveDateTime>, chrono::ParseError> {
    let cell = cell.trim();
    if cell.is_empty() {
        return Ok(None);
    }
    NaiveDateTime::parse_from_str(cell, TIMESTAMP_FORMAT).map(Some)
}

fn serialize_last_marked<S: Serializer>(
    ts: &Option<NaiveDateTime>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&format_timestamp(*ts))
}
