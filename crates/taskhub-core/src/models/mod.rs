pub mod error;
pub mod notification;
pub mod source;
pub mod sync_status;
pub mod task;

pub use error::{CoreError, CoreErrorKind};
pub use notification::Notification;
pub use source::{DEFAULT_POLL_INTERVAL_SECS, SourceConfig, SourceType};
pub use sync_status::{SyncState, SyncStatus};
pub use task::{Task, TaskStatus};
