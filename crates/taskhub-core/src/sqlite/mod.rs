pub mod migrations;
pub mod store;

pub use migrations::{
    SCHEMA_VERSION_TABLE, SqliteMigration, current_schema_version, migration, migrations,
    pending_migrations, read_schema_version, run_migrations,
};
pub use store::SqliteStore;
