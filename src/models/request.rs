use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lifecycle of a media request as tracked in the request ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    #[default]
    Pending,
    Processing,
    Completed,
    Failed,
    Skipped,
    Cancelled,
    Ignored,
}

impl RequestStatus {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Skipped => "skipped",
            Self::Cancelled => "cancelled",
            Self::Ignored => "ignored",
        }
    }

    /// Requests already known to be satisfied or deliberately excluded.
    #[must_use]
    pub const fn is_settled(&self) -> bool {
        matches!(self, Self::Completed | Self::Ignored)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RequestStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "skipped" => Ok(Self::Skipped),
            "cancelled" => Ok(Self::Cancelled),
            "ignored" => Ok(Self::Ignored),
            other => Err(format!("unknown request status: {other}")),
        }
    }
}

/// Ledger row for a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestRecord {
    pub id: crate::domain::RequestId,
    pub status: RequestStatus,
    pub search_attempts: u32,
    pub error_message: Option<String>,
    pub error_count: u32,
    pub last_error_at: Option<String>,
    pub last_checked_at: Option<String>,
}

/// One reconciliation pass, as recorded in the history table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub run_id: String,
    pub request_id: crate::domain::RequestId,
    pub title: String,
    pub outcome: String,
    pub seasons_completed: u32,
    pub seasons_partial: u32,
    pub seasons_failed: u32,
    pub duration_ms: i64,
    pub recorded_at: String,
}
