use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};

use crate::models::SourceType;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Open,
    InProgress,
    Review,
    Done,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::InProgress => "in_progress",
            Self::Review => "review",
            Self::Done => "done",
        }
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = ();

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "open" => Ok(Self::Open),
            "in_progress" => Ok(Self::InProgress),
            "review" => Ok(Self::Review),
            "done" => Ok(Self::Done),
            _ => Err(()),
        }
    }
}

/// A unit of work normalized from any source.
///
/// `id` must be derived deterministically from `source_id` and
/// `source_item_id`: the store upserts by `id`, so an unstable id turns every
/// refresh into a duplicate row.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub source_type: SourceType,
    pub source_item_id: String,
    pub source_id: String,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    /// 1 (most urgent) through 5.
    pub priority: u8,
    pub assignee: Option<String>,
    pub author: Option<String>,
    pub source_url: Option<String>,
    pub created_at: SystemTime,
    pub updated_at: SystemTime,
    pub fetched_at: SystemTime,
    pub raw_data: String,
    pub cross_refs: Vec<String>,
}

impl Task {
    pub const MIN_PRIORITY: u8 = 1;
    pub const MAX_PRIORITY: u8 = 5;
    pub const DEFAULT_PRIORITY: u8 = 3;

    /// Time elapsed since this task was last fetched. Zero if `fetched_at`
    /// lies in the future.
    pub fn staleness(&self, now: SystemTime) -> Duration {
        now.duration_since(self.fetched_at).unwrap_or_default()
    }

    pub fn clamp_priority(priority: i64) -> u8 {
        let clamped = priority.clamp(i64::from(Self::MIN_PRIORITY), i64::from(Self::MAX_PRIORITY));
        u8::try_from(clamped).unwrap_or(Self::DEFAULT_PRIORITY)
    }
}
