pub mod filter;

pub use filter::{SortColumn, TaskFilter, TaskSort};

use std::collections::HashSet;
use std::time::SystemTime;

use crate::models::{CoreError, Notification, SourceConfig, Task};

pub type PersistenceResult<T> = Result<T, CoreError>;

pub trait TaskStore: Send + Sync {
    /// Inserts or replaces every task by `id` in one transaction. Either the
    /// whole batch is written or none of it is.
    fn upsert_tasks(&self, tasks: &[Task]) -> PersistenceResult<()>;

    fn get_tasks(&self, filter: &TaskFilter) -> PersistenceResult<Vec<Task>>;

    fn get_task_by_id(&self, id: &str) -> PersistenceResult<Option<Task>>;

    /// Subset of `ids` already present in the store.
    fn known_task_ids(&self, ids: &[String]) -> PersistenceResult<HashSet<String>>;

    /// Tasks of one source whose last fetch happened before `older_than`,
    /// oldest first.
    fn stale_tasks(
        &self,
        source_id: &str,
        older_than: SystemTime,
        limit: usize,
    ) -> PersistenceResult<Vec<Task>>;
}

pub trait SourceStore: Send + Sync {
    fn upsert_source(&self, source: &SourceConfig) -> PersistenceResult<()>;

    fn get_sources(&self) -> PersistenceResult<Vec<SourceConfig>>;

    fn get_source(&self, id: &str) -> PersistenceResult<Option<SourceConfig>>;

    fn delete_source(&self, id: &str) -> PersistenceResult<()>;

    /// Records the result of one sync cycle. `last_sync_at` is only written
    /// when `Some`, so a failed cycle keeps the previous success time.
    fn record_sync_outcome(
        &self,
        id: &str,
        last_sync_at: Option<SystemTime>,
        last_error: Option<&str>,
    ) -> PersistenceResult<()>;
}

pub trait NotificationStore: Send + Sync {
    fn create_notification(&self, notification: &Notification) -> PersistenceResult<()>;

    fn get_unread_notifications(&self, limit: usize) -> PersistenceResult<Vec<Notification>>;

    fn mark_notification_read(&self, id: &str) -> PersistenceResult<()>;

    fn mark_all_notifications_read(&self) -> PersistenceResult<usize>;
}
