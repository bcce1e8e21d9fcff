//! Message storage repository.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use super::model::Message;
use crate::Result;
use crate::account::AccountId;

/// Repository for ingested messages.
#[derive(Clone)]
pub struct MessageRepository {
    pool: SqlitePool,
}

impl MessageRepository {
    /// Create a new repository with the given database path.
    ///
    /// Creates the database and tables if they don't exist.
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

    /// Initialize database schema.
    async fn initialize(&self) -> Result<()> {
        sqlx::query(
            r"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                remote_id TEXT NOT NULL UNIQUE,
                account_id INTEGER NOT NULL,
                subject TEXT NOT NULL DEFAULT '',
                sender TEXT NOT NULL DEFAULT '',
                summary TEXT NOT NULL DEFAULT '',
                body_text TEXT,
                body_html TEXT,
                received_at TEXT NOT NULL,
                is_read INTEGER NOT NULL DEFAULT 0,
                labels TEXT NOT NULL DEFAULT '[]',
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r"
            CREATE INDEX IF NOT EXISTS idx_messages_account ON messages(account_id)
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Count stored messages for one account.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn count_for_account(&self, account_id: AccountId) -> Result<i64> {
        let row = sqlx::query("SELECT COUNT(*) AS n FROM messages WHERE account_id = ?")
            .bind(account_id.0)
            .fetch_one(&self.pool)
            .await?;
        Ok(row.get("n"))
    }

    /// Look up a message by its protocol-level identifier.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn find_by_remote_id(&self, remote_id: &str) -> Result<Option<Message>> {
        let row = sqlx::query(
            r"
            SELECT id, remote_id, account_id, subject, sender, summary,
                   body_text, body_html, received_at, is_read, labels
            FROM messages
            WHERE remote_id = ?
            ",
        )
        .bind(remote_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_message))
    }

    /// Insert a new message. Fills in the row ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails, including unique
    /// constraint violations on the remote identifier.
    pub async fn insert(&self, message: &mut Message) -> Result<()> {
        let labels = serde_json::to_string(&message.labels)?;
        let result = sqlx::query(
            r"
            INSERT INTO messages
                (remote_id, account_id, subject, sender, summary,
                 body_text, body_html, received_at, is_read, labels)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&message.remote_id)
        .bind(message.account_id.0)
        .bind(&message.subject)
        .bind(&message.sender)
        .bind(&message.summary)
        .bind(&message.body_text)
        .bind(&message.body_html)
        .bind(message.received_at.to_rfc3339())
        .bind(message.is_read)
        .bind(&labels)
        .execute(&self.pool)
        .await?;

        message.id = Some(result.last_insert_rowid());
        Ok(())
    }

    /// Update the body fields and summary of an existing message.
    ///
    /// Used by the backfill path when a re-fetch finds content that was
    /// missing at first sighting.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn update_bodies(
        &self,
        id: i64,
        body_text: Option<&str>,
        body_html: Option<&str>,
        summary: &str,
    ) -> Result<()> {
        sqlx::query(
            r"
            UPDATE messages
            SET body_text = ?, body_html = ?, summary = ?
            WHERE id = ?
            ",
        )
        .bind(body_text)
        .bind(body_html)
        .bind(summary)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Persist the label set and read flag of one message.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn set_labels_and_read(
        &self,
        id: i64,
        labels: &[String],
        is_read: bool,
    ) -> Result<()> {
        let labels = serde_json::to_string(labels)?;
        sqlx::query("UPDATE messages SET labels = ?, is_read = ? WHERE id = ?")
            .bind(&labels)
            .bind(is_read)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Clear the label set of every stored message.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn clear_all_labels(&self) -> Result<()> {
        sqlx::query("UPDATE messages SET labels = '[]'")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Get every stored message. Used by the bulk rule recompute.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_all(&self) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            r"
            SELECT id, remote_id, account_id, subject, sender, summary,
                   body_text, body_html, received_at, is_read, labels
            FROM messages
            ORDER BY id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_message).collect())
    }
}

fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Message {
    let received_str: String = row.get("received_at");
    let received_at = DateTime::parse_from_rfc3339(&received_str)
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    let labels_str: String = row.get("labels");
    let labels: Vec<String> = serde_json::from_str(&labels_str).unwrap_or_default();

    Message {
        id: Some(row.get("id")),
        remote_id: row.get("remote_id"),
        account_id: AccountId(row.get("account_id")),
        subject: row.get("subject"),
        sender: row.get("sender"),
        summary: row.get("summary"),
        body_text: row.get("body_text"),
        body_html: row.get("body_html"),
        received_at,
        is_read: row.get("is_read"),
        labels,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_message(remote_id: &str, account: i64) -> Message {
        Message {
            id: None,
            remote_id: remote_id.to_string(),
            account_id: AccountId::new(account),
            subject: "Hello".to_string(),
            sender: "peer@example.com".to_string(),
            summary: "Hello".to_string(),
            body_text: None,
            body_html: None,
            received_at: Utc::now(),
            is_read: false,
            labels: Vec::new(),
        }
    }

    #[tokio::test]
    async fn insert_and_find() {
        let repo = MessageRepository::in_memory().await.unwrap();
        let mut message = sample_message("<m1@example.com>", 1);
        repo.insert(&mut message).await.unwrap();
        assert!(message.id.is_some());

        let found = repo
            .find_by_remote_id("<m1@example.com>")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.subject, "Hello");
        assert_eq!(found.account_id, AccountId::new(1));
        assert!(repo.find_by_remote_id("<nope>").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn remote_id_is_unique() {
        let repo = MessageRepository::in_memory().await.unwrap();
        let mut first = sample_message("<dup@example.com>", 1);
        repo.insert(&mut first).await.unwrap();

        let mut second = sample_message("<dup@example.com>", 2);
        assert!(repo.insert(&mut second).await.is_err());
    }

    #[tokio::test]
    async fn count_is_per_account() {
        let repo = MessageRepository::in_memory().await.unwrap();
        for i in 0..3 {
            let mut m = sample_message(&format!("<a{i}>"), 1);
            repo.insert(&mut m).await.unwrap();
        }
        let mut other = sample_message("<b0>", 2);
        repo.insert(&mut other).await.unwrap();

        assert_eq!(repo.count_for_account(AccountId::new(1)).await.unwrap(), 3);
        assert_eq!(repo.count_for_account(AccountId::new(2)).await.unwrap(), 1);
        assert_eq!(repo.count_for_account(AccountId::new(9)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn labels_roundtrip() {
        let repo = MessageRepository::in_memory().await.unwrap();
        let mut message = sample_message("<l1>", 1);
        repo.insert(&mut message).await.unwrap();
        let id = message.id.unwrap();

        repo.set_labels_and_read(id, &["work".to_string(), "urgent".to_string()], true)
            .await
            .unwrap();

        let found = repo.find_by_remote_id("<l1>").await.unwrap().unwrap();
        assert_eq!(found.labels, vec!["work", "urgent"]);
        assert!(found.is_read);

        repo.clear_all_labels().await.unwrap();
        let found = repo.find_by_remote_id("<l1>").await.unwrap().unwrap();
        assert!(found.labels.is_empty());
        // read-state untouched by a label clear
        assert!(found.is_read);
    }

    #[tokio::test]
    async fn update_bodies_rewrites_summary() {
        let repo = MessageRepository::in_memory().await.unwrap();
        let mut message = sample_message("<b1>", 1);
        repo.insert(&mut message).await.unwrap();
        let id = message.id.unwrap();

        repo.update_bodies(id, Some("fresh body"), None, "fresh body")
            .await
            .unwrap();

        let found = repo.find_by_remote_id("<b1>").await.unwrap().unwrap();
        assert_eq!(found.body_text.as_deref(), Some("fresh body"));
        assert_eq!(found.summary, "fresh body");
    }
}
