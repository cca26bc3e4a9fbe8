//! SQLite connection pool manager with WAL mode enabled for concurrent
//! access (spec §4.A, §5 "Locking").

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteSynchronous};
use std::str::FromStr;
use std::time::Duration;

#[derive(Clone)]
pub struct DatabaseConnection {
    pool: sqlx::SqlitePool,
}

impl DatabaseConnection {
    /// Open (creating if absent) a SQLite database with WAL journaling,
    /// `NORMAL` synchronous mode, and foreign keys enabled.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid database url: {database_url}"))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .context("failed to connect to sqlite database")?;

        Ok(Self { pool })
    }

    pub fn pool(&self) -> &sqlx::SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        super::migrations::run(&self.pool).await
    }
}
