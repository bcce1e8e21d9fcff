//! Account model types.

use serde::{Deserialize, Serialize};

/// Unique identifier for an account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId(pub i64);

impl AccountId {
    /// Create a new account ID.
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How much of a message the chat notification includes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PushTemplate {
    /// Subject and sender only, no body preview.
    TitleOnly,
    /// Short preview: up to 4 lines of 60 characters.
    #[default]
    Short,
    /// Long preview: up to 12 lines of 80 characters.
    Full,
    /// Raw body, truncated to the channel limit.
    FullBody,
}

impl PushTemplate {
    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "title_only" => Self::TitleOnly,
            "full" => Self::Full,
            "full_body" => Self::FullBody,
            _ => Self::Short,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::TitleOnly => "title_only",
            Self::Short => "short",
            Self::Full => "full",
            Self::FullBody => "full_body",
        }
    }
}

/// A monitored mailbox account.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier (None for unsaved accounts).
    pub id: Option<AccountId>,
    /// Email address. Unique across all accounts.
    pub email: String,
    /// IMAP server hostname.
    pub host: String,
    /// IMAP server port (993 for implicit TLS).
    pub port: u16,
    /// Password, encrypted at rest with the configured cipher.
    pub encrypted_password: String,
    /// Inactive accounts are skipped by the poll scheduler.
    pub is_active: bool,
    /// Display/sort order.
    pub sort_order: i64,
    /// Whether chat notifications fire for this account.
    pub push_enabled: bool,
    /// Notification template selector.
    pub push_template: PushTemplate,
    /// Per-account poll interval override in seconds (None = global default).
    pub poll_interval_secs: Option<i64>,
}

impl Account {
    /// Create an account with sensible defaults for a given address.
    #[must_use]
    pub fn with_email(email: &str, host: &str, encrypted_password: &str) -> Self {
        Self {
            id: None,
            email: email.to_string(),
            host: host.to_string(),
            port: 993,
            encrypted_password: encrypted_password.to_string(),
            is_active: true,
            sort_order: 0,
            push_enabled: true,
            push_template: PushTemplate::default(),
            poll_interval_secs: None,
        }
    }
}
