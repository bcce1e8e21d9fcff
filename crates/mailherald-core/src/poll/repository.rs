//! Poll status storage repository.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use super::model::PollStatus;
use crate::Result;
use crate::account::AccountId;

/// Repository for per-account poll status rows.
#[derive(Clone)]
pub struct PollStatusRepository {
    pool: SqlitePool,
}

impl PollStatusRepository {
    /// Create a new repository with the given database path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn new(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;
        Self::with_pool(pool).await
    }

    /// Create an in-memory repository for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::with_pool(pool).await
    }

    /// Create a repository over an existing pool.
    ///
    /// # Errors
    ///
    /// Returns an error if schema creation fails.
    pub async fn with_pool(pool: SqlitePool) -> Result<Self> {
        let repo = Self { pool };
        repo.initialize().await?;
        Ok(repo)
    }

    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS poll_status (
                account_id INTEGER PRIMARY KEY,
                last_started_at TEXT,
                last_finished_at TEXT,
                last_success_at TEXT,
                last_error TEXT
            )
            ",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get the poll status for one account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, account_id: AccountId) -> Result<Option<PollStatus>> {
        let row = sqlx::query(
            r"
            SELECT account_id, last_started_at, last_finished_at, last_success_at, last_error
            FROM poll_status
            WHERE account_id = ?
            ",
        )
        .bind(account_id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(|row| PollStatus {
            account_id: AccountId(row.get("account_id")),
            last_started_at: parse_ts(row.get("last_started_at")),
            last_finished_at: parse_ts(row.get("last_finished_at")),
            last_success_at: parse_ts(row.get("last_success_at")),
            last_error: row.get("last_error"),
        }))
    }

    /// Record that a poll attempt is starting: upserts the row, stamps the
    /// start time, and clears the previous error.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn mark_started(&self, account_id: AccountId) -> Result<()> {
        sqlx::query(
            r"
            INSERT INTO poll_status (account_id, last_started_at, last_error)
            VALUES (?, ?, NULL)
            ON CONFLICT(account_id) DO UPDATE SET
                last_started_at = excluded.last_started_at,
                last_error = NULL
            ",
        )
        .bind(account_id.0)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Record a successful poll.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn mark_success(&self, account_id: AccountId) -> Result<()> {
        sqlx::query("UPDATE poll_status SET last_success_at = ? WHERE account_id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(account_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record a failed poll with its error text.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn mark_error(&self, account_id: AccountId, error: &str) -> Result<()> {
        sqlx::query("UPDATE poll_status SET last_error = ? WHERE account_id = ?")
            .bind(error)
            .bind(account_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Record the finish time. Runs regardless of poll outcome so a row is
    /// never left looking in-flight.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn mark_finished(&self, account_id: AccountId) -> Result<()> {
        sqlx::query("UPDATE poll_status SET last_finished_at = ? WHERE account_id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(account_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn parse_ts(value: Option<String>) -> Option<DateTime<Utc>> {
    value
        .as_deref()
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|d| d.with_timezone(&Utc))
}
