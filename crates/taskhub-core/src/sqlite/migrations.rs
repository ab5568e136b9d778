use rusqlite::Connection;

pub const SCHEMA_VERSION_TABLE: &str = "schema_version";

/// One forward-only schema step. Versions start at 1 and increase by one.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct SqliteMigration {
    pub version: i64,
    pub name: &'static str,
    pub up_sql: &'static str,
}

const MIGRATION_0001: SqliteMigration = SqliteMigration {
    version: 1,
    name: "initial_schema",
    up_sql: r#"
CREATE TABLE IF NOT EXISTS sources (
    id TEXT PRIMARY KEY,
    source_type TEXT NOT NULL,
    name TEXT NOT NULL,
    base_url TEXT NOT NULL DEFAULT '',
    enabled INTEGER NOT NULL DEFAULT 1,
    poll_interval_sec INTEGER NOT NULL DEFAULT 120,
    last_sync_at INTEGER,
    last_error TEXT,
    config TEXT NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS tasks (
    id TEXT PRIMARY KEY,
    source_type TEXT NOT NULL,
    source_item_id TEXT NOT NULL,
    source_id TEXT NOT NULL,
    title TEXT NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    status TEXT NOT NULL,
    priority INTEGER NOT NULL DEFAULT 3 CHECK (priority BETWEEN 1 AND 5),
    assignee TEXT,
    author TEXT,
    source_url TEXT,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL,
    fetched_at INTEGER NOT NULL,
    raw_data TEXT NOT NULL DEFAULT '',
    cross_refs TEXT NOT NULL DEFAULT '[]',
    UNIQUE (source_id, source_item_id)
);

CREATE INDEX IF NOT EXISTS idx_tasks_source_id ON tasks (source_id);
CREATE INDEX IF NOT EXISTS idx_tasks_source_type ON tasks (source_type);
CREATE INDEX IF NOT EXISTS idx_tasks_status ON tasks (status);
CREATE INDEX IF NOT EXISTS idx_tasks_priority ON tasks (priority);
CREATE INDEX IF NOT EXISTS idx_tasks_updated_at ON tasks (updated_at);

CREATE TABLE IF NOT EXISTS notifications (
    id TEXT PRIMARY KEY,
    task_id TEXT NOT NULL REFERENCES tasks (id) ON DELETE CASCADE,
    source_type TEXT NOT NULL,
    message TEXT NOT NULL,
    read INTEGER NOT NULL DEFAULT 0,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_notifications_read ON notifications (read);
CREATE INDEX IF NOT EXISTS idx_notifications_created_at ON notifications (created_at);
CREATE INDEX IF NOT EXISTS idx_notifications_task_id ON notifications (task_id);
"#,
};

const MIGRATION_0002: SqliteMigration = SqliteMigration {
    version: 2,
    name: "task_staleness_index",
    up_sql: r#"
CREATE INDEX IF NOT EXISTS idx_tasks_source_fetched_at ON tasks (source_id, fetched_at);
"#,
};

/// Timestamps move from unix seconds to unix nanoseconds so sub-second
/// precision survives a round trip.
const MIGRATION_0003: SqliteMigration = SqliteMigration {
    version: 3,
    name: "timestamps_in_nanoseconds",
    up_sql: r#"
UPDATE tasks
SET created_at = created_at * 1000000000,
    updated_at = updated_at * 1000000000,
    fetched_at = fetched_at * 1000000000;

UPDATE sources
SET last_sync_at = last_sync_at * 1000000000
WHERE last_sync_at IS NOT NULL;

UPDATE notifications
SET created_at = created_at * 1000000000;
"#,
};

const MIGRATIONS: [SqliteMigration; 3] = [MIGRATION_0001, MIGRATION_0002, MIGRATION_0003];

pub fn migrations() -> &'static [SqliteMigration] {
    &MIGRATIONS
}

pub fn migration(version: i64) -> Option<&'static SqliteMigration> {
    MIGRATIONS.iter().find(|entry| entry.version == version)
}

pub fn current_schema_version() -> i64 {
    MIGRATIONS.last().map(|entry| entry.version).unwrap_or(0)
}

pub fn pending_migrations(from_version: i64) -> Vec<&'static SqliteMigration> {
    MIGRATIONS
        .iter()
        .filter(|entry| entry.version > from_version)
        .collect()
}

/// Highest applied version, or 0 for a database that has never been
/// migrated.
pub fn read_schema_version(connection: &Connection) -> rusqlite::Result<i64> {
    let table_exists: bool = connection.query_row(
        "SELECT EXISTS (SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1)",
        [SCHEMA_VERSION_TABLE],
        |row| row.get(0),
    )?;
    if !table_exists {
        return Ok(0);
    }

    connection.query_row(
        &format!("SELECT COALESCE(MAX(version), 0) FROM {SCHEMA_VERSION_TABLE}"),
        [],
        |row| row.get(0),
    )
}

/// Applies every migration newer than the recorded version, each in its own
/// transaction, and returns the resulting version. A second run is a no-op.
pub fn run_migrations(connection: &mut Connection) -> rusqlite::Result<i64> {
    let mut current_version = read_schema_version(connection)?;
    let pending = pending_migrations(current_version);
    if pending.is_empty() {
        return Ok(current_version);
    }

    connection.execute_batch(&format!(
        "
CREATE TABLE IF NOT EXISTS {SCHEMA_VERSION_TABLE} (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL
);
"
    ))?;

    for migration in pending {
        let transaction = connection.transaction()?;
        transaction.execute_batch(migration.up_sql)?;
        transaction.execute(
            &format!(
                "INSERT INTO {SCHEMA_VERSION_TABLE} (version, name, applied_at)
                 VALUES (?1, ?2, strftime('%s', 'now'))"
            ),
            (migration.version, migration.name),
        )?;
        transaction.commit()?;

        tracing::info!(
            version = migration.version,
            name = migration.name,
            "applied sqlite migration"
        );
        current_version = migration.version;
    }

    Ok(current_version)
}
