use crate::models::{CoreError, SourceType, Task};

/// Output of the poller, consumed one event at a time by the client.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum SyncEvent {
    Synced {
        source_id: String,
        source_type: SourceType,
        tasks: Vec<Task>,
        new_task_count: usize,
    },
    Failed {
        source_id: String,
        source_type: SourceType,
        error: CoreError,
    },
    /// Credentials were rejected; retrying will not help until the user
    /// re-authenticates.
    AuthRequired {
        source_id: String,
        source_type: SourceType,
        message: String,
    },
}

impl SyncEvent {
    pub fn source_id(&self) -> &str {
        match self {
            Self::Synced { source_id, .. }
            | Self::Failed { source_id, .. }
            | Self::AuthRequired { source_id, .. } => source_id,
        }
    }

    pub fn source_type(&self) -> SourceType {
        match self {
            Self::Synced { source_type, .. }
            | Self::Failed { source_type, .. }
            | Self::AuthRequired { source_type, .. } => *source_type,
        }
    }
}

pub fn reauthenticate_message(source_type: SourceType, source_name: &str, detail: &str) -> String {
    format!(
        "{} source '{source_name}' rejected its credentials ({detail}). \
         Re-enter the credentials for this source to resume syncing.",
        source_type.display_name()
    )
}
