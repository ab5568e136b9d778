use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::models::SourceType;

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    Idle,
    Running,
    Error,
}

/// In-memory sync state of one registered source. Never persisted.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub source_id: String,
    pub source_type: SourceType,
    pub state: SyncState,
    pub last_sync: Option<SystemTime>,
    pub error: Option<String>,
}

impl SyncStatus {
    pub fn idle(source_id: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            source_id: source_id.into(),
            source_type,
            state: SyncState::Idle,
            last_sync: None,
            error: None,
        }
    }

    pub fn running(&self) -> Self {
        Self {
            state: SyncState::Running,
            ..self.clone()
        }
    }

    /// `last_sync` advances only on success; the previous error is cleared.
    pub fn succeeded(&self, at: SystemTime) -> Self {
        Self {
            state: SyncState::Idle,
            last_sync: Some(at),
            error: None,
            ..self.clone()
        }
    }

    pub fn failed(&self, message: impl Into<String>) -> Self {
        Self {
            state: SyncState::Error,
            error: Some(message.into()),
            ..self.clone()
        }
    }
}
