//! SQLite-based persistence layer
//!
//! This module provides:
//! - Database initialization and migrations
//! - Single-statement queries over the mapping table
//! - Connection pooling, one checked-out connection per caller

mod migrations;
mod queries;

pub use migrations::run_migrations;
pub use queries::*;

use crate::config::StorageConfig;
use crate::error::{Error, Result, StorageError};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Database connection pool type
pub type DbPool = Pool<SqliteConnectionManager>;

/// Connection handle owned by a single caller until dropped
pub type DbConnection = r2d2::PooledConnection<SqliteConnectionManager>;

/// Storage manager for database operations
///
/// A pooled connection is handed to exactly one caller at a time, so threads
/// never share a handle. Every physical connection is configured once when the
/// pool opens it and reused afterwards.
pub struct Storage {
    pool: DbPool,
    db_path: PathBuf,
}

impl Storage {
    /// Open the database described by `config`, creating it if needed
    pub fn open(config: &StorageConfig) -> Result<Self> {
        if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        info!("Database path: {:?}", config.db_path);

        // Bootstrap on a plain connection so open/corruption errors surface
        // directly instead of as pool checkout timeouts
        {
            let mut conn = rusqlite::Connection::open(&config.db_path)?;
            configure_connection(&mut conn, config.busy_timeout)?;
            run_migrations(&conn)?;
        }

        let busy_timeout = config.busy_timeout;
        let manager = SqliteConnectionManager::file(&config.db_path)
            .with_init(move |conn| configure_connection(conn, busy_timeout));
        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)
            .map_err(|e| Error::Storage(StorageError::Pool(e.to_string())))?;

        info!("Database initialized successfully");

        Ok(Self {
            pool,
            db_path: config.db_path.clone(),
        })
    }

    /// Open a database file with default pool settings
    pub fn from_path(db_path: impl AsRef<Path>) -> Result<Self> {
        Self::open(&StorageConfig::default().with_db_path(db_path.as_ref()))
    }

    /// Create in-memory storage (for testing)
    ///
    /// Each in-memory connection is its own database, so the pool holds one.
    pub fn in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e| Error::Storage(StorageError::Pool(e.to_string())))?;

        let storage = Self {
            pool,
            db_path: PathBuf::from(":memory:"),
        };

        storage.initialize()?;

        Ok(storage)
    }

    /// Initialize database with migrations
    fn initialize(&self) -> Result<()> {
        let conn = self.connection()?;
        run_migrations(&conn)?;
        info!("Database initialized successfully");
        Ok(())
    }

    /// Get a connection from the pool
    ///
    /// Blocks for at most the configured connection timeout.
    pub fn connection(&self) -> Result<DbConnection> {
        self.pool.get().map_err(Error::from)
    }

    /// Get the database path
    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }
}

/// Per-connection setup run once when the pool opens a connection
fn configure_connection(
    conn: &mut rusqlite::Connection,
    busy_timeout: Duration,
) -> std::result::Result<(), rusqlite::Error> {
    conn.busy_timeout(busy_timeout)?;
    let mode: String =
        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    debug!("Opened connection (journal_mode={})", mode);
    Ok(())
}
