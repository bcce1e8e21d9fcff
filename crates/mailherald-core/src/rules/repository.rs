//! Rule storage repositories.

use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use super::model::{MailRule, PushField, PushFilterRule, PushMode};
use crate::Result;
use crate::account::AccountId;

/// Repository for global mail rules.
#[derive(Clone)]
pub struct MailRuleRepository {
    pool: SqlitePool,
}

impl MailRuleRepository {
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
            CREATE TABLE IF NOT EXISTS mail_rules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL DEFAULT '',
                rule_order INTEGER NOT NULL DEFAULT 0,
                account_id INTEGER,
                sender_pattern TEXT NOT NULL DEFAULT '',
                subject_pattern TEXT NOT NULL DEFAULT '',
                body_pattern TEXT NOT NULL DEFAULT '',
                add_labels TEXT NOT NULL DEFAULT '[]',
                suppress_push INTEGER NOT NULL DEFAULT 0,
                mark_read INTEGER NOT NULL DEFAULT 0
            )
            ",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get every mail rule in evaluation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list(&self) -> Result<Vec<MailRule>> {
        let rows = sqlx::query(
            r"
            SELECT id, name, rule_order, account_id, sender_pattern,
                   subject_pattern, body_pattern, add_labels, suppress_push, mark_read
            FROM mail_rules
            ORDER BY rule_order ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.iter().map(row_to_mail_rule).collect())
    }

    /// Save a mail rule (insert or update). Fills in the ID on insert.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn save(&self, rule: &mut MailRule) -> Result<()> {
        let labels = serde_json::to_string(&rule.add_labels)?;
        if let Some(id) = rule.id {
            sqlx::query(
                r"
                UPDATE mail_rules SET
                    name = ?, rule_order = ?, account_id = ?, sender_pattern = ?,
                    subject_pattern = ?, body_pattern = ?, add_labels = ?,
                    suppress_push = ?, mark_read = ?
                WHERE id = ?
                ",
            )
            .bind(&rule.name)
            .bind(rule.rule_order)
            .bind(rule.account_id.map(|a| a.0))
            .bind(&rule.sender_pattern)
            .bind(&rule.subject_pattern)
            .bind(&rule.body_pattern)
            .bind(&labels)
            .bind(rule.suppress_push)
            .bind(rule.mark_read)
            .bind(id)
            .execute(&self.pool)
            .await?;
        } else {
            let result = sqlx::query(
                r"
                INSERT INTO mail_rules
                    (name, rule_order, account_id, sender_pattern, subject_pattern,
                     body_pattern, add_labels, suppress_push, mark_read)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )
            .bind(&rule.name)
            .bind(rule.rule_order)
            .bind(rule.account_id.map(|a| a.0))
            .bind(&rule.sender_pattern)
            .bind(&rule.subject_pattern)
            .bind(&rule.body_pattern)
            .bind(&labels)
            .bind(rule.suppress_push)
            .bind(rule.mark_read)
            .execute(&self.pool)
            .await?;
            rule.id = Some(result.last_insert_rowid());
        }
        Ok(())
    }

    /// Delete a mail rule and strip the labels it added from every stored
    /// message, leaving other labels untouched.
    ///
    /// The label cleanup touches the messages table, so a rule with labels
    /// must be deleted through a repository sharing the aggregate storage
    /// pool.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn delete(&self, id: i64) -> Result<()> {
        let row = sqlx::query("SELECT add_labels FROM mail_rules WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        sqlx::query("DELETE FROM mail_rules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(());
        };
        let stored: String = row.get("add_labels");
        let removed: Vec<String> = serde_json::from_str(&stored).unwrap_or_default();
        if removed.is_empty() {
            return Ok(());
        }
        self.strip_labels(&removed).await
    }

    /// Remove the given labels from every message's label set.
    async fn strip_labels(&self, removed: &[String]) -> Result<()> {
        let rows = sqlx::query("SELECT id, labels FROM messages")
            .fetch_all(&self.pool)
            .await?;
        for row in rows {
            let message_id: i64 = row.get("id");
            let stored: String = row.get("labels");
            let labels: Vec<String> = serde_json::from_str(&stored).unwrap_or_default();
            let before = labels.len();
            let kept: Vec<String> = labels
                .into_iter()
                .filter(|label| !removed.contains(label))
                .collect();
            if kept.len() == before {
                continue;
            }
            sqlx::query("UPDATE messages SET labels = ? WHERE id = ?")
                .bind(serde_json::to_string(&kept)?)
                .bind(message_id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}

fn row_to_mail_rule(row: &sqlx::sqlite::SqliteRow) -> MailRule {
    let labels_str: String = row.get("add_labels");
    MailRule {
        id: Some(row.get("id")),
        name: row.get("name"),
        rule_order: row.get("rule_order"),
        account_id: row.get::<Option<i64>, _>("account_id").map(AccountId),
        sender_pattern: row.get("sender_pattern"),
        subject_pattern: row.get("subject_pattern"),
        body_pattern: row.get("body_pattern"),
        add_labels: serde_json::from_str(&labels_str).unwrap_or_default(),
        suppress_push: row.get("suppress_push"),
        mark_read: row.get("mark_read"),
    }
}

/// Repository for per-account push filter rules.
#[derive(Clone)]
pub struct PushRuleRepository {
    pool: SqlitePool,
}

impl PushRuleRepository {
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
            CREATE TABLE IF NOT EXISTS push_rules (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                account_id INTEGER NOT NULL,
                field TEXT NOT NULL,
                mode TEXT NOT NULL,
                value TEXT NOT NULL,
                rule_order INTEGER NOT NULL DEFAULT 0
            )
            ",
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Get one account's push filter rules in evaluation order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn list_for_account(&self, account_id: AccountId) -> Result<Vec<PushFilterRule>> {
        let rows = sqlx::query(
            r"
            SELECT id, account_id, field, mode, value, rule_order
            FROM push_rules
            WHERE account_id = ?
            ORDER BY rule_order ASC, id ASC
            ",
        )
        .bind(account_id.0)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let field: String = row.get("field");
                let mode: String = row.get("mode");
                PushFilterRule {
                    id: Some(row.get("id")),
                    account_id: AccountId(row.get("account_id")),
                    field: PushField::parse(&field),
                    mode: PushMode::parse(&mode),
                    value: row.get("value"),
                    rule_order: row.get("rule_order"),
                }
            })
            .collect())
    }

    /// Save a push filter rule (insert or update). Fills in the ID on insert.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn save(&self, rule: &mut PushFilterRule) -> Result<()> {
        if let Some(id) = rule.id {
            sqlx::query(
                r"
                UPDATE push_rules SET
                    account_id = ?, field = ?, mode = ?, value = ?, rule_order = ?
                WHERE id = ?
                ",
            )
            .bind(rule.account_id.0)
            .bind(rule.field.as_str())
            .bind(rule.mode.as_str())
            .bind(&rule.value)
            .bind(rule.rule_order)
            .bind(id)
            .execute(&self.pool)
            .await?;
        } else {
            let result = sqlx::query(
                r"
                INSERT INTO push_rules (account_id, field, mode, value, rule_order)
                VALUES (?, ?, ?, ?, ?)
                ",
            )
            .bind(rule.account_id.0)
            .bind(rule.field.as_str())
            .bind(rule.mode.as_str())
            .bind(&rule.value)
            .bind(rule.rule_order)
            .execute(&self.pool)
            .await?;
            rule.id = Some(result.last_insert_rowid());
        }
        Ok(())
    }

    /// Delete a push filter rule.
    ///
    /// # Errors
    ///
    /// Returns an error if the database query fails.
    pub async fn delete(&self, id: i64) -> Result<()> {
        sqlx::query("DELETE FROM push_rules WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
