//! Database schema migrations.

use rusqlite::Connection;
use tracing::info;

use debai_core::error::DebaiError;

/// Run all pending database migrations.
pub fn run_migrations(conn: &Connection) -> Result<(), DebaiError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version     INTEGER PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            applied_at  INTEGER NOT NULL DEFAULT (strftime('%s', 'now'))
        );",
    )
    .map_err(|e| DebaiError::Storage(format!("Failed to create migrations table: {}", e)))?;

    let current_version: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| DebaiError::Storage(format!("Failed to query migration version: {}", e)))?;

    if current_version < 1 {
        apply_v1(conn)?;
        info!("Applied migration v1: employees");
    }

    Ok(())
}

/// Version 1: employee directory.
fn apply_v1(conn: &Connection) -> Result<(), DebaiError> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS employees (
            id          TEXT PRIMARY KEY NOT NULL,
            name        TEXT NOT NULL,
            role        TEXT NOT NULL,
            email       TEXT NOT NULL,
            phone       TEXT NOT NULL,
            created_at  INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_employees_name
            ON employees (name COLLATE NOCASE);

        CREATE INDEX IF NOT EXISTS idx_employees_role
            ON employees (role COLLATE NOCASE);

        INSERT INTO schema_migrations (version, name) VALUES (1, 'employees');
        ",
    )
    .map_err(|e| DebaiError::Storage(format!("Migration v1 failed: {}", e)))?;
    Ok(())
}
