//! Account storage repository.

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

use super::model::{Account, AccountId, PushTemplate};
use crate::Result;

/// Repository for account storage and retrieval.
#[derive(Clone)]
pub struct AccountRepository {
    pool: SqlitePool,
}

impl AccountRepository {
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
            CREATE TABLE IF NOT EXISTS accounts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                host TEXT NOT NULL,
                port INTEGER NOT NULL DEFAULT 993,
                encrypted_password TEXT NOT NULL,
                is_active INTEGER NOT NULL DEFAULT 1,
                sort_order INTEGER NOT NULL DEFAULT 0,
                push_enabled INTEGER NOT NULL DEFAULT 1,
                push_template TEXT NOT NULL DEFAULT 'short',
                poll_interval_secs INTEGER,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            ",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Get all accounts, ordered by sort order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r"
            SELECT id, email, host, port, encrypted_password, is_active,
                   sort_order, push_enabled, push_template, poll_interval_secs
            FROM accounts
            ORDER BY sort_order ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_account).collect())
    }

    /// Get active accounts only, ordered by sort order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_active(&self) -> Result<Vec<Account>> {
        let rows = sqlx::query(
            r"
            SELECT id, email, host, port, encrypted_password, is_active,
                   sort_order, push_enabled, push_template, poll_interval_secs
            FROM accounts
            WHERE is_active = 1
            ORDER BY sort_order ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_account).collect())
    }

    /// Get account by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn get(&self, id: AccountId) -> Result<Option<Account>> {
        let row = sqlx::query(
            r"
            SELECT id, email, host, port, encrypted_password, is_active,
                   sort_order, push_enabled, push_template, poll_interval_secs
            FROM accounts
            WHERE id = ?
            ",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.as_ref().map(row_to_account))
    }

    /// Save an account (insert or update). Fills in the ID on insert.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails, including unique
    /// constraint violations on the email address.
    pub async fn save(&self, account: &mut Account) -> Result<()> {
        if let Some(id) = account.id {
            sqlx::query(
                r"
                UPDATE accounts SET
                    email = ?, host = ?, port = ?, encrypted_password = ?,
                    is_active = ?, sort_order = ?, push_enabled = ?,
                    push_template = ?, poll_interval_secs = ?,
                    updated_at = CURRENT_TIMESTAMP
                WHERE id = ?
                ",
            )
            .bind(&account.email)
            .bind(&account.host)
            .bind(i64::from(account.port))
            .bind(&account.encrypted_password)
            .bind(account.is_active)
            .bind(account.sort_order)
            .bind(account.push_enabled)
            .bind(account.push_template.as_str())
            .bind(account.poll_interval_secs)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        } else {
            let result = sqlx::query(
                r"
                INSERT INTO accounts
                    (email, host, port, encrypted_password, is_active,
                     sort_order, push_enabled, push_template, poll_interval_secs)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )
            .bind(&account.email)
            .bind(&account.host)
            .bind(i64::from(account.port))
            .bind(&account.encrypted_password)
            .bind(account.is_active)
            .bind(account.sort_order)
            .bind(account.push_enabled)
            .bind(account.push_template.as_str())
            .bind(account.poll_interval_secs)
            .execute(&self.pool)
            .await?;

            account.id = Some(AccountId(result.last_insert_rowid()));
        }

        debug!(email = %account.email, "saved account");
        Ok(())
    }

    /// Delete an account and everything that belongs to it: messages,
    /// push filter rules, and its poll-status row.
    ///
    /// The cascade reaches tables owned by the other repositories, so it
    /// must run over the aggregate storage pool where all of them have
    /// been initialized, not a standalone account repository.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the deletes fail.
    pub async fn delete(&self, id: AccountId) -> Result<()> {
        sqlx::query("DELETE FROM messages WHERE account_id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM push_rules WHERE account_id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM poll_status WHERE account_id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM accounts WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;

        debug!(account = %id, "deleted account and dependents");
        Ok(())
    }
}

fn row_to_account(row: &sqlx::sqlite::SqliteRow) -> Account {
    let template: String = row.get("push_template");
    Account {
        id: Some(AccountId(row.get("id"))),
        email: row.get("email"),
        host: row.get("host"),
        port: u16::try_from(row.get::<i64, _>("port")).unwrap_or(993),
        encrypted_password: row.get("encrypted_password"),
        is_active: row.get("is_active"),
        sort_order: row.get("sort_order"),
        push_enabled: row.get("push_enabled"),
        push_template: PushTemplate::parse(&template),
        poll_interval_secs: row.get("poll_interval_secs"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample_account(email: &str) -> Account {
        Account::with_email(email, "imap.example.com", "sealed-password")
    }

    #[tokio::test]
    async fn save_and_get() {
        let repo = AccountRepository::in_memory().await.unwrap();
        let mut account = sample_account("a@example.com");
        repo.save(&mut account).await.unwrap();

        let id = account.id.unwrap();
        let loaded = repo.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.email, "a@example.com");
        assert_eq!(loaded.port, 993);
        assert_eq!(loaded.push_template, PushTemplate::Short);
    }

    #[tokio::test]
    async fn email_is_unique() {
        let repo = AccountRepository::in_memory().await.unwrap();
        let mut first = sample_account("dup@example.com");
        repo.save(&mut first).await.unwrap();

        let mut second = sample_account("dup@example.com");
        assert!(repo.save(&mut second).await.is_err());
    }

    #[tokio::test]
    async fn list_active_skips_disabled() {
        let repo = AccountRepository::in_memory().await.unwrap();
        let mut active = sample_account("on@example.com");
        repo.save(&mut active).await.unwrap();

        let mut disabled = sample_account("off@example.com");
        disabled.is_active = false;
        repo.save(&mut disabled).await.unwrap();

        let accounts = repo.list_active().await.unwrap();
        assert_eq!(accounts.len(), 1);
        assert_eq!(accounts[0].email, "on@example.com");
    }

    #[tokio::test]
    async fn list_respects_sort_order() {
        let repo = AccountRepository::in_memory().await.unwrap();
        let mut second = sample_account("b@example.com");
        second.sort_order = 2;
        repo.save(&mut second).await.unwrap();

        let mut first = sample_account("a@example.com");
        first.sort_order = 1;
        repo.save(&mut first).await.unwrap();

        let emails: Vec<String> = repo
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.email)
            .collect();
        assert_eq!(emails, vec!["a@example.com", "b@example.com"]);
    }

    #[tokio::test]
    async fn update_preserves_id() {
        let repo = AccountRepository::in_memory().await.unwrap();
        let mut account = sample_account("c@example.com");
        repo.save(&mut account).await.unwrap();
        let id = account.id.unwrap();

        account.poll_interval_secs = Some(60);
        account.push_template = PushTemplate::Full;
        repo.save(&mut account).await.unwrap();

        let loaded = repo.get(id).await.unwrap().unwrap();
        assert_eq!(loaded.poll_interval_secs, Some(60));
        assert_eq!(loaded.push_template, PushTemplate::Full);
    }
}
