use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use rusqlite::types::{Type, Value};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};

use crate::models::{
    CoreError, CoreErrorKind, Notification, SourceConfig, SourceType, Task, TaskStatus,
};
use crate::persistence::{
    NotificationStore, PersistenceResult, SortColumn, SourceStore, TaskFilter, TaskStore,
};
use crate::sqlite::migrations::{read_schema_version, run_migrations};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);
const ID_LOOKUP_CHUNK: usize = 500;

const TASK_COLUMNS: &str = "
    id, source_type, source_item_id, source_id, title, description, status, priority,
    assignee, author, source_url, created_at, updated_at, fetched_at, raw_data, cross_refs
";

/// SQLite cache shared by every sync worker.
///
/// One connection serves all callers; it is guarded by a mutex and used
/// from async code through `spawn_blocking`.
pub struct SqliteStore {
    database_path: Option<PathBuf>,
    connection: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if needed) the database file and migrates it to the
    /// latest schema. Failure here leaves the process without a cache and
    /// should be treated as fatal by the caller.
    pub fn open(database_path: impl Into<PathBuf>) -> PersistenceResult<Self> {
        let database_path = database_path.into();
        let connection =
            open_connection(&database_path).map_err(|error| storage_error("open", error))?;
        Self::initialize(connection, Some(database_path))
    }

    pub fn open_in_memory() -> PersistenceResult<Self> {
        let connection =
            Connection::open_in_memory().map_err(|error| storage_error("open", error))?;
        Self::initialize(connection, None)
    }

    fn initialize(
        mut connection: Connection,
        database_path: Option<PathBuf>,
    ) -> PersistenceResult<Self> {
        configure_connection(&connection).map_err(|error| storage_error("configure", error))?;
        let version =
            run_migrations(&mut connection).map_err(|error| storage_error("migrate", error))?;
        tracing::debug!(
            path = ?database_path,
            schema_version = version,
            "opened sqlite store"
        );

        Ok(Self {
            database_path,
            connection: Mutex::new(connection),
        })
    }

    pub fn database_path(&self) -> Option<&Path> {
        self.database_path.as_deref()
    }

    pub fn schema_version(&self) -> PersistenceResult<i64> {
        self.with_connection("schema_version", |connection| read_schema_version(connection))
    }

    /// Re-runs the migration runner; a no-op on an up to date database.
    pub fn migrate(&self) -> PersistenceResult<i64> {
        self.with_connection("migrate", run_migrations)
    }

    fn lock(&self, operation_name: &'static str) -> PersistenceResult<MutexGuard<'_, Connection>> {
        self.connection
            .lock()
            .map_err(|_| CoreError::storage(operation_name, "connection mutex poisoned"))
    }

    fn with_connection<T>(
        &self,
        operation_name: &'static str,
        operation: impl FnOnce(&mut Connection) -> rusqlite::Result<T>,
    ) -> PersistenceResult<T> {
        let mut connection = self.lock(operation_name)?;
        operation(&mut connection).map_err(|error| storage_error(operation_name, error))
    }
}

impl TaskStore for SqliteStore {
    fn upsert_tasks(&self, tasks: &[Task]) -> PersistenceResult<()> {
        if tasks.is_empty() {
            return Ok(());
        }

        self.with_connection("upsert_tasks", |connection| {
            let transaction = connection.transaction()?;
            {
                let mut statement = transaction.prepare(&format!(
                    "
INSERT INTO tasks ({TASK_COLUMNS})
VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)
ON CONFLICT(id) DO UPDATE SET
    source_type = excluded.source_type,
    source_item_id = excluded.source_item_id,
    source_id = excluded.source_id,
    title = excluded.title,
    description = excluded.description,
    status = excluded.status,
    priority = excluded.priority,
    assignee = excluded.assignee,
    author = excluded.author,
    source_url = excluded.source_url,
    created_at = excluded.created_at,
    updated_at = excluded.updated_at,
    fetched_at = excluded.fetched_at,
    raw_data = excluded.raw_data,
    cross_refs = excluded.cross_refs
"
                ))?;

                for task in tasks {
                    let cross_refs = serde_json::to_string(&task.cross_refs).map_err(|error| {
                        rusqlite::Error::ToSqlConversionFailure(Box::new(error))
                    })?;
                    statement.execute(params![
                        task.id,
                        task.source_type.as_str(),
                        task.source_item_id,
                        task.source_id,
                        task.title,
                        task.description,
                        task.status.as_str(),
                        i64::from(Task::clamp_priority(i64::from(task.priority))),
                        task.assignee,
                        task.author,
                        task.source_url,
                        to_unix_nanos(task.created_at)?,
                        to_unix_nanos(task.updated_at)?,
                        to_unix_nanos(task.fetched_at)?,
                        task.raw_data,
                        cross_refs,
                    ])?;
                }
            }
            transaction.commit()?;
            Ok(())
        })
    }

    fn get_tasks(&self, filter: &TaskFilter) -> PersistenceResult<Vec<Task>> {
        self.with_connection("get_tasks", |connection| {
            let (sql, values) = build_task_query(filter)?;
            let mut statement = connection.prepare(&sql)?;
            let rows = statement.query_map(params_from_iter(values), task_from_row)?;
            rows.collect()
        })
    }

    fn get_task_by_id(&self, id: &str) -> PersistenceResult<Option<Task>> {
        self.with_connection("get_task_by_id", |connection| {
            connection
                .query_row(
                    &format!("SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?1"),
                    [id],
                    task_from_row,
                )
                .optional()
        })
    }

    fn known_task_ids(&self, ids: &[String]) -> PersistenceResult<HashSet<String>> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }

        self.with_connection("known_task_ids", |connection| {
            let mut known = HashSet::new();
            for chunk in ids.chunks(ID_LOOKUP_CHUNK) {
                let placeholders = vec!["?"; chunk.len()].join(", ");
                let mut statement = connection
                    .prepare(&format!("SELECT id FROM tasks WHERE id IN ({placeholders})"))?;
                let rows = statement.query_map(params_from_iter(chunk.iter()), |row| {
                    row.get::<_, String>(0)
                })?;
                for id in rows {
                    known.insert(id?);
                }
            }
            Ok(known)
        })
    }

    fn stale_tasks(
        &self,
        source_id: &str,
        older_than: SystemTime,
        limit: usize,
    ) -> PersistenceResult<Vec<Task>> {
        let filter = TaskFilter::new()
            .source(source_id)
            .fetched_before(older_than)
            .sort_by(SortColumn::FetchedAt, false)
            .page(limit, 0);
        self.get_tasks(&filter)
    }
}

impl SourceStore for SqliteStore {
    fn upsert_source(&self, source: &SourceConfig) -> PersistenceResult<()> {
        self.with_connection("upsert_source", |connection| {
            let config = serde_json::to_string(&source.config)
                .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))?;
            let last_sync_at = source.last_sync_at.map(to_unix_nanos).transpose()?;

            connection.execute(
                "
INSERT INTO sources (
    id, source_type, name, base_url, enabled, poll_interval_sec, last_sync_at, last_error, config
) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
ON CONFLICT(id) DO UPDATE SET
    source_type = excluded.source_type,
    name = excluded.name,
    base_url = excluded.base_url,
    enabled = excluded.enabled,
    poll_interval_sec = excluded.poll_interval_sec,
    last_sync_at = excluded.last_sync_at,
    last_error = excluded.last_error,
    config = excluded.config
",
                params![
                    source.id,
                    source.source_type.as_str(),
                    source.name,
                    source.base_url,
                    bool_to_sqlite(source.enabled),
                    source.poll_interval_sec,
                    last_sync_at,
                    source.last_error,
                    config,
                ],
            )?;
            Ok(())
        })
    }

    fn get_sources(&self) -> PersistenceResult<Vec<SourceConfig>> {
        self.with_connection("get_sources", |connection| {
            let mut statement = connection.prepare(
                "
SELECT id, source_type, name, base_url, enabled, poll_interval_sec, last_sync_at, last_error, config
FROM sources
ORDER BY name, id
",
            )?;
            let rows = statement.query_map([], source_from_row)?;
            rows.collect()
        })
    }

    fn get_source(&self, id: &str) -> PersistenceResult<Option<SourceConfig>> {
        self.with_connection("get_source", |connection| {
            connection
                .query_row(
                    "
SELECT id, source_type, name, base_url, enabled, poll_interval_sec, last_sync_at, last_error, config
FROM sources
WHERE id = ?1
",
                    [id],
                    source_from_row,
                )
                .optional()
        })
    }

    /// Removes the source together with the tasks it produced; their
    /// notifications follow through the foreign key cascade.
    fn delete_source(&self, id: &str) -> PersistenceResult<()> {
        self.with_connection("delete_source", |connection| {
            let transaction = connection.transaction()?;
            transaction.execute("DELETE FROM tasks WHERE source_id = ?1", [id])?;
            transaction.execute("DELETE FROM sources WHERE id = ?1", [id])?;
            transaction.commit()?;
            Ok(())
        })
    }

    fn record_sync_outcome(
        &self,
        id: &str,
        last_sync_at: Option<SystemTime>,
        last_error: Option<&str>,
    ) -> PersistenceResult<()> {
        self.with_connection("record_sync_outcome", |connection| {
            let last_sync_at = last_sync_at.map(to_unix_nanos).transpose()?;
            connection.execute(
                "
UPDATE sources
SET last_sync_at = COALESCE(?2, last_sync_at),
    last_error = ?3
WHERE id = ?1
",
                params![id, last_sync_at, last_error],
            )?;
            Ok(())
        })
    }
}

impl NotificationStore for SqliteStore {
    fn create_notification(&self, notification: &Notification) -> PersistenceResult<()> {
        self.with_connection("create_notification", |connection| {
            connection.execute(
                "
INSERT INTO notifications (id, task_id, source_type, message, read, created_at)
VALUES (?1, ?2, ?3, ?4, ?5, ?6)
",
                params![
                    notification.id,
                    notification.task_id,
                    notification.source_type.as_str(),
                    notification.message,
                    bool_to_sqlite(notification.read),
                    to_unix_nanos(notification.created_at)?,
                ],
            )?;
            Ok(())
        })
    }

    fn get_unread_notifications(&self, limit: usize) -> PersistenceResult<Vec<Notification>> {
        if limit == 0 {
            return Ok(Vec::new());
        }

        self.with_connection("get_unread_notifications", |connection| {
            let mut statement = connection.prepare(
                "
SELECT id, task_id, source_type, message, read, created_at
FROM notifications
WHERE read = 0
ORDER BY created_at DESC, rowid DESC
LIMIT ?1
",
            )?;
            let rows = statement.query_map([to_i64(limit)?], notification_from_row)?;
            rows.collect()
        })
    }

    fn mark_notification_read(&self, id: &str) -> PersistenceResult<()> {
        let updated = self.with_connection("mark_notification_read", |connection| {
            connection.execute("UPDATE notifications SET read = 1 WHERE id = ?1", [id])
        })?;

        if updated == 0 {
            return Err(CoreError::new(
                CoreErrorKind::InvalidInput,
                format!("unknown notification id '{id}'"),
            )
            .during("mark_notification_read"));
        }
        Ok(())
    }

    fn mark_all_notifications_read(&self) -> PersistenceResult<usize> {
        self.with_connection("mark_all_notifications_read", |connection| {
            connection.execute("UPDATE notifications SET read = 1 WHERE read = 0", [])
        })
    }
}

fn open_connection(database_path: &Path) -> rusqlite::Result<Connection> {
    if let Some(parent) = database_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .map_err(|error| rusqlite::Error::ToSqlConversionFailure(Box::new(error)))?;
    }
    Connection::open(database_path)
}

fn configure_connection(connection: &Connection) -> rusqlite::Result<()> {
    let journal_mode: String =
        connection.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    connection.pragma_update(None, "foreign_keys", true)?;
    connection.busy_timeout(BUSY_TIMEOUT)?;
    tracing::trace!(journal_mode = %journal_mode, "configured sqlite connection");
    Ok(())
}

/// Builds the task listing query. Filter values are bound as parameters;
/// only `SortColumn::as_sql` output is spliced into the statement.
fn build_task_query(filter: &TaskFilter) -> rusqlite::Result<(String, Vec<Value>)> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if let Some(source_id) = &filter.source_id {
        values.push(Value::Text(source_id.clone()));
        clauses.push(format!("source_id = ?{}", values.len()));
    }
    if let Some(source_type) = filter.source_type {
        values.push(Value::Text(source_type.as_str().to_string()));
        clauses.push(format!("source_type = ?{}", values.len()));
    }
    if let Some(status) = filter.status {
        values.push(Value::Text(status.as_str().to_string()));
        clauses.push(format!("status = ?{}", values.len()));
    }
    if let Some(priority) = filter.priority {
        values.push(Value::Integer(i64::from(priority)));
        clauses.push(format!("priority = ?{}", values.len()));
    }
    if let Some(query) = filter.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        values.push(Value::Text(like_pattern(query)));
        let index = values.len();
        let title = format!("LOWER(title) LIKE ?{index} ESCAPE '\\'");
        let description = format!("LOWER(description) LIKE ?{index} ESCAPE '\\'");
        clauses.push(format!("({title} OR {description})"));
    }
    if let Some(fetched_before) = filter.fetched_before {
        values.push(Value::Integer(to_unix_nanos(fetched_before)?));
        clauses.push(format!("fetched_at < ?{}", values.len()));
    }

    let mut sql = format!("SELECT {TASK_COLUMNS} FROM tasks");
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }

    let direction = if filter.sort.descending { "DESC" } else { "ASC" };
    sql.push_str(&format!(
        " ORDER BY {} {direction}, id ASC",
        filter.sort.column.as_sql()
    ));

    match filter.limit {
        Some(limit) => {
            values.push(Value::Integer(to_i64(limit)?));
            values.push(Value::Integer(to_i64(filter.offset)?));
            sql.push_str(&format!(
                " LIMIT ?{} OFFSET ?{}",
                values.len() - 1,
                values.len()
            ));
        }
        None if filter.offset > 0 => {
            values.push(Value::Integer(to_i64(filter.offset)?));
            sql.push_str(&format!(" LIMIT -1 OFFSET ?{}", values.len()));
        }
        None => {}
    }

    Ok((sql, values))
}

fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.to_lowercase().chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let source_type: String = row.get(1)?;
    let status: String = row.get(6)?;
    let priority: i64 = row.get(7)?;
    let cross_refs: String = row.get(15)?;

    Ok(Task {
        id: row.get(0)?,
        source_type: parse_source_type(1, &source_type)?,
        source_item_id: row.get(2)?,
        source_id: row.get(3)?,
        title: row.get(4)?,
        description: row.get(5)?,
        status: parse_task_status(6, &status)?,
        priority: u8::try_from(priority).map_err(|_| {
            decode_error(7, Type::Integer, format!("task priority {priority} out of range"))
        })?,
        assignee: row.get(8)?,
        author: row.get(9)?,
        source_url: row.get(10)?,
        created_at: from_unix_nanos(11, row.get(11)?)?,
        updated_at: from_unix_nanos(12, row.get(12)?)?,
        fetched_at: from_unix_nanos(13, row.get(13)?)?,
        raw_data: row.get(14)?,
        cross_refs: serde_json::from_str(&cross_refs).map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(15, Type::Text, Box::new(error))
        })?,
    })
}

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<SourceConfig> {
    let source_type: String = row.get(1)?;
    let enabled: i64 = row.get(4)?;
    let last_sync_at: Option<i64> = row.get(6)?;
    let config: String = row.get(8)?;

    Ok(SourceConfig {
        id: row.get(0)?,
        source_type: parse_source_type(1, &source_type)?,
        name: row.get(2)?,
        base_url: row.get(3)?,
        enabled: sqlite_to_bool(enabled),
        poll_interval_sec: row.get(5)?,
        last_sync_at: last_sync_at
            .map(|nanos| from_unix_nanos(6, nanos))
            .transpose()?,
        last_error: row.get(7)?,
        config: serde_json::from_str::<BTreeMap<String, String>>(&config).map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(error))
        })?,
    })
}

fn notification_from_row(row: &Row<'_>) -> rusqlite::Result<Notification> {
    let source_type: String = row.get(2)?;
    let read: i64 = row.get(4)?;

    Ok(Notification {
        id: row.get(0)?,
        task_id: row.get(1)?,
        source_type: parse_source_type(2, &source_type)?,
        message: row.get(3)?,
        read: sqlite_to_bool(read),
        created_at: from_unix_nanos(5, row.get(5)?)?,
    })
}

fn storage_error(operation: &'static str, error: rusqlite::Error) -> CoreError {
    tracing::error!(operation, error = %error, "sqlite operation failed");
    CoreError::storage(operation, error.to_string())
}

/// A value that cannot be bound as a statement parameter.
fn encode_error(message: impl Into<String>) -> rusqlite::Error {
    rusqlite::Error::ToSqlConversionFailure(Box::new(std::io::Error::other(message.into())))
}

/// A stored column value that does not map back onto the model.
fn decode_error(column: usize, column_type: Type, message: impl Into<String>) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        column_type,
        Box::new(std::io::Error::other(message.into())),
    )
}

fn parse_source_type(column: usize, raw: &str) -> rusqlite::Result<SourceType> {
    raw.parse::<SourceType>()
        .map_err(|_| decode_error(column, Type::Text, format!("unknown source type '{raw}'")))
}

fn parse_task_status(column: usize, raw: &str) -> rusqlite::Result<TaskStatus> {
    raw.parse::<TaskStatus>()
        .map_err(|_| decode_error(column, Type::Text, format!("unknown task status '{raw}'")))
}

fn bool_to_sqlite(value: bool) -> i64 {
    if value { 1 } else { 0 }
}

fn sqlite_to_bool(value: i64) -> bool {
    value != 0
}

/// Timestamps are stored as unix nanoseconds, which covers dates up to 2262.
fn to_unix_nanos(value: SystemTime) -> rusqlite::Result<i64> {
    let duration = value.duration_since(UNIX_EPOCH).map_err(|error| {
        encode_error(format!("time before unix epoch is not supported: {error}"))
    })?;
    i64::try_from(duration.as_nanos())
        .map_err(|_| encode_error("unix timestamp nanoseconds exceed i64 range"))
}

fn from_unix_nanos(column: usize, value: i64) -> rusqlite::Result<SystemTime> {
    let nanos = u64::try_from(value).map_err(|_| {
        decode_error(column, Type::Integer, "negative unix timestamps are not supported")
    })?;
    Ok(UNIX_EPOCH + Duration::from_nanos(nanos))
}

fn to_i64(value: usize) -> rusqlite::Result<i64> {
    i64::try_from(value).map_err(|_| encode_error("value exceeds i64 range"))
}
