use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::models::SourceType;

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    pub task_id: String,
    pub source_type: SourceType,
    pub message: String,
    pub read: bool,
    pub created_at: SystemTime,
}

impl Notification {
    pub fn new(
        task_id: impl Into<String>,
        source_type: SourceType,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            task_id: task_id.into(),
            source_type,
            message: message.into(),
            read: false,
            created_at: SystemTime::now(),
        }
    }
}
