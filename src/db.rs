//! SQLite database connection management.
//!
//! Provides a connection pool with WAL mode enabled so that a long flush
//! never blocks readers. The database file and its parent directories are
//! created automatically if they don't exist.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;

use crate::error::{RagError, Result};

/// Create a connection pool to the SQLite database at `db_path`.
///
/// # Errors
///
/// Returns [`RagError::Storage`] if the database cannot be created or connected to.
pub async fn connect(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| {
            RagError::Storage(format!("cannot create {}: {}", parent.display(), e))
        })?;
    }

    let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", db_path.display()))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    Ok(pool)
}
