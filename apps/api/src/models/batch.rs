use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a batch. Only the runner moves a batch out of `Created`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Created,
    Running,
    Completed,
    Failed,
    Canceled,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Created => "created",
            BatchStatus::Running => "running",
            BatchStatus::Completed => "completed",
            BatchStatus::Failed => "failed",
            BatchStatus::Canceled => "canceled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Canceled
        )
    }
}

impl fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a single job posting inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Queued,
    Processing,
    Done,
    Failed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Queued => "queued",
            ItemStatus::Processing => "processing",
            ItemStatus::Done => "done",
            ItemStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown status '{}'", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for BatchStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(BatchStatus::Created),
            "running" => Ok(BatchStatus::Running),
            "completed" => Ok(BatchStatus::Completed),
            "failed" => Ok(BatchStatus::Failed),
            "canceled" => Ok(BatchStatus::Canceled),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

impl FromStr for ItemStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "queued" => Ok(ItemStatus::Queued),
            "processing" => Ok(ItemStatus::Processing),
            "done" => Ok(ItemStatus::Done),
            "failed" => Ok(ItemStatus::Failed),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

/// A named collection of job postings to tailor the owner's resume against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    pub id: Uuid,
    pub user_id: Uuid,
    pub label: String,
    pub total: i32,
    pub processed: i32,
    pub failed: i32,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}

/// Asset names written into `BatchItem::assets` on completion.
pub mod asset {
    pub const RESUME_PDF: &str = "resume_pdf";
    pub const COVER_LETTER_PDF: &str = "cover_letter_pdf";
    pub const COVER_LETTER_TEXT: &str = "cover_letter_text";
    pub const EMAIL_SUBJECT: &str = "email_subject";
    pub const EMAIL_BODY: &str = "email_body";
    pub const INMAIL: &str = "inmail";
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchItem {
    pub id: Uuid,
    pub batch_id: Uuid,
    pub company: Option<String>,
    pub role: Option<String>,
    pub jd_url: Option<String>,
    pub jd_text: Option<String>,
    pub keywords: Vec<String>,
    pub resume_version_id: Option<Uuid>,
    pub ats_score: Option<i32>,
    pub status: ItemStatus,
    pub error: Option<String>,
    pub assets: BTreeMap<String, String>,
    pub attempts: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An item accepted by ingest, before it has an id.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NewBatchItem {
    pub company: Option<String>,
    pub role: Option<String>,
    pub jd_url: Option<String>,
    pub jd_text: Option<String>,
    pub keywords: Vec<String>,
}

/// Fields written once the JD has been normalized.
#[derive(Debug, Clone)]
pub struct ItemJd<'a> {
    pub company: Option<&'a str>,
    pub role: Option<&'a str>,
    pub jd_text: &'a str,
    pub keywords: &'a [String],
}

/// Final write for a successfully processed item.
#[derive(Debug, Clone)]
pub struct ItemCompletion {
    pub resume_version_id: Uuid,
    pub ats_score: i32,
    pub assets: BTreeMap<String, String>,
}

/// Per-status item counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ItemCounts {
    pub queued: i32,
    pub processing: i32,
    pub done: i32,
    pub failed: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_batch_statuses() {
        assert!(!BatchStatus::Created.is_terminal());
        assert!(!BatchStatus::Running.is_terminal());
        assert!(BatchStatus::Completed.is_terminal());
        assert!(BatchStatus::Failed.is_terminal());
        assert!(BatchStatus::Canceled.is_terminal());
    }

    #[test]
    fn test_status_strings_parse_back() {
        for status in [
            ItemStatus::Queued,
            ItemStatus::Processing,
            ItemStatus::Done,
            ItemStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<ItemStatus>().unwrap(), status);
        }
        assert_eq!("canceled".parse::<BatchStatus>().unwrap(), BatchStatus::Canceled);
        assert!("cancelled".parse::<BatchStatus>().is_err());
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&ItemStatus::Processing).unwrap();
        assert_eq!(json, r#""processing""#);
    }
}
