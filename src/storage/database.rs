// Readers Paradise - Personal Book Tracker
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Database connection and management
//!
//! The embedded local store keeps every collection as one row in a SQLite
//! file. This module owns the connection pool, pragmas and maintenance.
//!
//! # SQLite Configuration
//! - WAL mode so readers don't block the single writer
//! - Normal synchronous mode (balance safety/speed)
//! - Incremental auto-vacuum for space efficiency

use crate::error::{ParadiseError, Result};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions},
    ConnectOptions,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Database manager - handles connection pooling and operations
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
    path: Option<PathBuf>, // None for in-memory databases
}

impl Database {
    /// Open (or create) the database file and run migrations
    ///
    /// # Errors
    /// Returns error if:
    /// - Parent directory doesn't exist and can't be created
    /// - Database file can't be opened
    /// - Migrations fail
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let path = database_path.as_ref();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    ParadiseError::FileIoError(format!(
                        "Failed to create database directory {}: {}",
                        parent.display(),
                        e
                    ))
                })?;
            }
        }

        let connection_string = format!("sqlite://{}?mode=rwc", path.display());
        let connect_opts = SqliteConnectOptions::from_str(&connection_string)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30))
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(connect_opts)
            .await?;

        Self::configure_database(&pool).await?;

        let db = Self {
            pool,
            path: Some(path.to_path_buf()),
        };
        db.migrate().await?;

        tracing::debug!(path = %path.display(), "opened local store database");
        Ok(db)
    }

    /// Create in-memory database for testing
    pub async fn new_in_memory() -> Result<Self> {
        let connect_opts = SqliteConnectOptions::from_str("sqlite::memory:")?
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .disable_statement_logging();

        // Every connection to :memory: is a separate database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_opts)
            .await?;

        Self::configure_database(&pool).await?;

        let db = Self { pool, path: None };
        db.migrate().await?;

        Ok(db)
    }

    async fn configure_database(pool: &SqlitePool) -> Result<()> {
        sqlx::query("PRAGMA auto_vacuum = INCREMENTAL")
            .execute(pool)
            .await?;

        Ok(())
    }

    /// Apply all pending migrations
    pub async fn migrate(&self) -> Result<()> {
        crate::storage::migrations::run_migrations(&self.pool)
            .await
            .map_err(|e| ParadiseError::MigrationFailed(e.to_string()))?;

        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Returns `None` for in-memory databases
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Close database and release all connections
    pub async fn close(self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    /// Get database statistics
    pub async fn get_stats(&self) -> Result<DatabaseStats> {
        let page_count: i64 = sqlx::query_scalar("PRAGMA page_count")
            .fetch_one(&self.pool)
            .await?;

        let page_size: i64 = sqlx::query_scalar("PRAGMA page_size")
            .fetch_one(&self.pool)
            .await?;

        let freelist_count: i64 = sqlx::query_scalar("PRAGMA freelist_count")
            .fetch_one(&self.pool)
            .await?;

        Ok(DatabaseStats {
            page_count: page_count as u64,
            page_size: page_size as u64,
            freelist_count: freelist_count as u64,
            total_size: (page_count * page_size) as u64,
            unused_size: (freelist_count * page_size) as u64,
        })
    }

    /// Run incremental vacuum to reclaim free pages
    pub async fn incremental_vacuum(&self) -> Result<()> {
        sqlx::query("PRAGMA incremental_vacuum")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Checkpoint WAL file to main database
    pub async fn checkpoint(&self) -> Result<()> {
        sqlx::query("PRAGMA wal_checkpoint(TRUNCATE)")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Copy the database file to `output_path` (after a WAL checkpoint)
    ///
    /// # Errors
    /// Returns error for in-memory databases or if the copy fails
    pub async fn export<P: AsRef<Path>>(&self, output_path: P) -> Result<()> {
        let source_path = self.path.as_ref().ok_or_else(|| {
            ParadiseError::invalid_input("Cannot export an in-memory database")
        })?;

        self.checkpoint().await?;

        std::fs::copy(source_path, output_path.as_ref()).map_err(|e| {
            ParadiseError::FileIoError(format!(
                "Failed to export database to {}: {}",
                output_path.as_ref().display(),
                e
            ))
        })?;

        Ok(())
    }

    /// Runs SQLite integrity check and returns true if database is okay
    pub async fn check_integrity(&self) -> Result<bool> {
        let result: String = sqlx::query_scalar("PRAGMA integrity_check")
            .fetch_one(&self.pool)
            .await?;

        Ok(result == "ok")
    }
}

/// Database statistics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatabaseStats {
    pub page_count: u64,
    pub page_size: u64,
    /// Number of free pages (unused space)
    pub freelist_count: u64,
    pub total_size: u64,
    pub unused_size: u64,
}

impl DatabaseStats {
    pub fn unused_percentage(&self) -> f64 {
        if self.total_size == 0 {
            0.0
        } else {
            (self.unused_size as f64 / self.total_size as f64) * 100.0
        }
    }

    /// Vacuum is recommended above 20% unused space
    pub fn should_vacuum(&self) -> bool {
        self.unused_percentage() > 20.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database() {
        let db = Database::new_in_memory().await.expect("Failed to create in-memory database");

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_entries")
            .fetch_one(db.pool())
            .await
            .expect("kv_entries table missing");

        assert_eq!(count, 0);
        assert!(db.path().is_none());
    }

    #[tokio::test]
    async fn test_file_database_creates_parent_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("paradise.db");

        let db = Database::new(&path).await.expect("Failed to create database");
        assert!(path.exists());
        assert!(db.check_integrity().await.unwrap());

        let stats = db.get_stats().await.unwrap();
        assert!(stats.page_size > 0);
    }

    #[test]
    fn test_vacuum_threshold() {
        let stats = DatabaseStats {
            page_count: 100,
            page_size: 4096,
            freelist_count: 25,
            total_size: 100 * 4096,
            unused_size: 25 * 4096,
        };
        assert_eq!(stats.unused_percentage(), 25.0);
        assert!(stats.should_vacuum());

        let tidy = DatabaseStats {
            freelist_count: 20,
            unused_size: 20 * 4096,
            ..stats
        };
        assert!(!tidy.should_vacuum());

        let empty = DatabaseStats {
            page_count: 0,
            page_size: 4096,
            freelist_count: 0,
            total_size: 0,
            unused_size: 0,
        };
        assert_eq!(empty.unused_percentage(), 0.0);
    }

    #[tokio::test]
    async fn test_export_requires_file() {
        let db = Database::new_in_memory().await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let result = db.export(dir.path().join("copy.db")).await;
        assert!(matches!(result, Err(ParadiseError::InvalidInput(_))));
    }
}
