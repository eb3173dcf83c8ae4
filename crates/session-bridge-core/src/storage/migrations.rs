//! Database migrations

use crate::error::{Result, StorageError};
use rusqlite::Connection;
use tracing::{debug, info};

/// Run all database migrations
///
/// Safe to call on an already-initialized database; applied migrations are
/// recorded and skipped.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    debug!("Running database migrations");

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );
        "#,
    )?;

    let migrations: Vec<(&str, &str)> = vec![
        ("001_session_mappings", MIGRATION_001_SESSION_MAPPINGS),
    ];

    for (name, sql) in migrations {
        if !migration_applied(conn, name)? {
            debug!("Applying migration: {}", name);
            conn.execute_batch(sql).map_err(|e| {
                StorageError::MigrationFailed(format!("{}: {}", name, e))
            })?;
            mark_migration_applied(conn, name)?;
            info!("Applied migration: {}", name);
        }
    }

    Ok(())
}

fn migration_applied(conn: &Connection, name: &str) -> Result<bool> {
    let count: i32 = conn.query_row(
        "SELECT COUNT(*) FROM migrations WHERE name = ?",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

fn mark_migration_applied(conn: &Connection, name: &str) -> Result<()> {
    // Two processes may initialize the same file at once
    conn.execute("INSERT OR IGNORE INTO migrations (name) VALUES (?)", [name])?;
    Ok(())
}

const MIGRATION_001_SESSION_MAPPINGS: &str = r#"
-- Session/agent mappings table
CREATE TABLE IF NOT EXISTS session_mappings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    session_id TEXT NOT NULL,
    agent_name TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'active',
    created_at REAL NOT NULL,
    updated_at REAL NOT NULL,
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_session_mappings_session ON session_mappings(session_id);
CREATE INDEX IF NOT EXISTS idx_session_mappings_agent ON session_mappings(agent_name);
CREATE INDEX IF NOT EXISTS idx_session_mappings_status ON session_mappings(status);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn object_names(conn: &Connection, kind: &str) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type = ?")
            .unwrap()
            .query_map([kind], |row| row.get(0))
            .unwrap()
            .filter_map(|r| r.ok())
            .collect()
    }

    #[test]
    fn test_migrations_run_successfully() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();

        let tables = object_names(&conn, "table");
        assert!(tables.contains(&"session_mappings".to_string()));
        assert!(tables.contains(&"migrations".to_string()));

        let indexes = object_names(&conn, "index");
        assert!(indexes.contains(&"idx_session_mappings_session".to_string()));
        assert!(indexes.contains(&"idx_session_mappings_agent".to_string()));
        assert!(indexes.contains(&"idx_session_mappings_status".to_string()));
    }

    #[test]
    fn test_migrations_idempotent() {
        let conn = Connection::open_in_memory().unwrap();

        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let count: i32 = conn
            .query_row("SELECT COUNT(*) FROM migrations", [], |row| row.get(0))
            .unwrap();

        assert_eq!(count, 1);
    }
}
