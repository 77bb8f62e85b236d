use super::season::{SeasonRecord, SeasonStatus};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShowStatus {
    NotAired,
    Pending,
    Partial,
    Completed,
}

impl fmt::Display for ShowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NotAired => "not_aired",
            Self::Pending => "pending",
            Self::Partial => "partial",
            Self::Completed => "completed",
        };
        f.write_str(s)
    }
}

/// Per-show rollup of its season records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShowSummary {
    pub status: ShowStatus,
    pub completed: Vec<u32>,
    pub in_progress: Vec<u32>,
    pub discrepant: Vec<u32>,
    pub failed: Vec<u32>,
    pub not_aired: Vec<u32>,
    pub confirmed_episodes: usize,
    pub aired_episodes: usize,
}

impl ShowSummary {
    #[must_use]
    pub fn from_records(records: &[SeasonRecord]) -> Self {
        let mut summary = Self {
            status: ShowStatus::Pending,
            completed: Vec::new(),
            in_progress: Vec::new(),
            discrepant: Vec::new(),
            failed: Vec::new(),
            not_aired: Vec::new(),
            confirmed_episodes: 0,
            aired_episodes: 0,
        };

        for record in records {
            let bucket = match record.status {
                SeasonStatus::Completed => Some(&mut summary.completed),
                SeasonStatus::InProgress => Some(&mut summary.in_progress),
                SeasonStatus::Discrepant => Some(&mut summary.discrepant),
                SeasonStatus::Failed => Some(&mut summary.failed),
                SeasonStatus::NotAired => Some(&mut summary.not_aired),
                SeasonStatus::Pending => None,
            };
            if let Some(bucket) = bucket {
                bucket.push(record.season_number);
            }
            summary.confirmed_episodes += record.confirmed_episodes.len();
            summary.aired_episodes += record.aired_episodes().len();
        }

        let aired: Vec<&SeasonRecord> = records.iter().filter(|r| r.has_aired()).collect();
        summary.status = if aired.is_empty() {
            ShowStatus::NotAired
        } else if aired.iter().all(|r| r.is_completed()) {
            ShowStatus::Completed
        } else if summary.confirmed_episodes > 0 {
            ShowStatus::Partial
        } else {
            ShowStatus::Pending
        };

        summary
    }
}
