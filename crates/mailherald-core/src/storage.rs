//! Aggregate storage handle.
//!
//! Every repository can be opened standalone, but the daemon wants all of
//! them over one pool so cross-entity operations (cascading account deletes,
//! the sync pipeline) see one database.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::Result;
use crate::account::AccountRepository;
use crate::message::MessageRepository;
use crate::poll::PollStatusRepository;
use crate::rules::{MailRuleRepository, PushRuleRepository};

/// All repositories over a shared `SQLite` pool.
#[derive(Clone)]
pub struct Storage {
    /// Account repository.
    pub accounts: AccountRepository,
    /// Message repository.
    pub messages: MessageRepository,
    /// Mail rule repository.
    pub mail_rules: MailRuleRepository,
    /// Push filter rule repository.
    pub push_rules: PushRuleRepository,
    /// Poll status repository.
    pub poll_status: PollStatusRepository,
}

impl Storage {
    /// Open (or create) the database at the given path and initialize every
    /// table.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn open(database_path: &str) -> Result<Self> {
        let url = format!("sqlite:{database_path}?mode=rwc");
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await?;
        Self::from_pool(pool).await
    }

    /// Open an in-memory database for testing.
    ///
    /// # Errors
    ///
    /// Returns an error if the database connection fails or schema creation fails.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self> {
        Ok(Self {
            accounts: AccountRepository::with_pool(pool.clone()).await?,
            messages: MessageRepository::with_pool(pool.clone()).await?,
            mail_rules: MailRuleRepository::with_pool(pool.clone()).await?,
            push_rules: PushRuleRepository::with_pool(pool.clone()).await?,
            poll_status: PollStatusRepository::with_pool(pool).await?,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::account::Account;
    use crate::message::Message;
    use crate::rules::{PushField, PushFilterRule, PushMode};
    use chrono::Utc;

    #[tokio::test]
    async fn account_delete_cascades() {
        let storage = Storage::in_memory().await.unwrap();

        let mut account = Account::with_email("x@example.com", "imap.example.com", "sealed");
        storage.accounts.save(&mut account).await.unwrap();
        let id = account.id.unwrap();

        let mut message = Message {
            id: None,
            remote_id: "<c1@example.com>".to_string(),
            account_id: id,
            subject: "s".to_string(),
            sender: "a@b.c".to_string(),
            summary: "s".to_string(),
            body_text: None,
            body_html: None,
            received_at: Utc::now(),
            is_read: false,
            labels: Vec::new(),
        };
        storage.messages.insert(&mut message).await.unwrap();

        let mut rule = PushFilterRule {
            id: None,
            account_id: id,
            field: PushField::Sender,
            mode: PushMode::Deny,
            value: "spam".to_string(),
            rule_order: 0,
        };
        storage.push_rules.save(&mut rule).await.unwrap();
        storage.poll_status.mark_started(id).await.unwrap();

        storage.accounts.delete(id).await.unwrap();

        assert!(storage.accounts.get(id).await.unwrap().is_none());
        assert_eq!(storage.messages.count_for_account(id).await.unwrap(), 0);
        assert!(storage.push_rules.list_for_account(id).await.unwrap().is_empty());
        assert!(storage.poll_status.get(id).await.unwrap().is_none());

        // untouched: another account's data would survive, and the tables exist
        assert!(storage.mail_rules.list().await.unwrap().is_empty());
    }
}
