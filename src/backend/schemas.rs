use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::BackendError;

const STATUS_SUCCESS: &str = "success";

#[derive(Debug, Serialize)]
pub struct SubmitTextRequest<'a> {
    pub text: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct StatusResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
}

impl StatusResponse {
    pub fn into_result(self) -> Result<(), BackendError> {
        check_status(&self.status, self.message)
    }
}

#[derive(Debug, Deserialize)]
pub struct LatestResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub update_marker: Option<u64>,
    #[serde(default)]
    pub text: Option<String>,
}

/// The newest server-known clipboard value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestValue {
    pub marker: u64,
    pub text: String,
}

impl LatestResponse {
    /// `None` means the server has nothing for this user yet.
    pub fn into_latest(self) -> Result<Option<LatestValue>, BackendError> {
        check_status(&self.status, self.message)?;

        match (self.update_marker, self.text) {
            (Some(marker), Some(text)) => Ok(Some(LatestValue { marker, text })),
            (None, _) => Ok(None),
            (Some(marker), None) => Err(BackendError::Parse(format!(
                "update_marker {marker} returned without text"
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct HistoryResponse {
    pub status: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
    #[serde(default)]
    pub copied_text_history: Vec<HistoryEntry>,
}

impl HistoryResponse {
    pub fn into_checked(self) -> Result<Self, BackendError> {
        check_status(&self.status, self.message.clone())?;
        Ok(self)
    }
}

/// One item of the remote history. The server sends either a bare string or
/// a `{id, text, timestamp}` record.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "RawHistoryEntry")]
pub struct HistoryEntry {
    pub id: Option<i64>,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawHistoryEntry {
    Text(String),
    Record {
        #[serde(default)]
        id: Option<i64>,
        text: String,
        #[serde(default)]
        timestamp: Option<String>,
    },
}

impl From<RawHistoryEntry> for HistoryEntry {
    fn from(raw: RawHistoryEntry) -> Self {
        match raw {
            RawHistoryEntry::Text(text) => Self {
                id: None,
                text,
                timestamp: None,
            },
            RawHistoryEntry::Record {
                id,
                text,
                timestamp,
            } => Self {
                id,
                text,
                timestamp: timestamp.as_deref().and_then(parse_timestamp),
            },
        }
    }
}

/// Accepts RFC3339 as well as the naive ISO form Python's `datetime.isoformat()` emits (taken as UTC).
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn check_status(status: &str, message: Option<String>) -> Result<(), BackendError> {
    if status == STATUS_SUCCESS {
        Ok(())
    } else {
        Err(BackendError::Rejected(
            message.unwrap_or_else(|| format!("status '{status}'")),
        ))
    }
}
