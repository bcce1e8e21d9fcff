//! Rule data models.

use serde::{Deserialize, Serialize};

use crate::account::AccountId;

/// A global labeling/read-state rule.
///
/// Rules are evaluated in ascending `rule_order`; every matching rule
/// contributes its effects, none removes what another added.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailRule {
    /// Row identifier (None for unsaved rules).
    pub id: Option<i64>,
    /// Optional display name.
    pub name: String,
    /// Evaluation order, ascending.
    pub rule_order: i64,
    /// Account scope. None applies the rule to every account.
    pub account_id: Option<AccountId>,
    /// Substring pattern for the sender. Empty always matches.
    pub sender_pattern: String,
    /// Substring pattern for the subject. Empty always matches.
    pub subject_pattern: String,
    /// Substring pattern for the body. Empty always matches.
    pub body_pattern: String,
    /// Labels applied when the rule matches.
    pub add_labels: Vec<String>,
    /// Suppress the chat notification channel for matching messages.
    pub suppress_push: bool,
    /// Mark matching messages as read.
    pub mark_read: bool,
}

/// Which message field a push filter rule inspects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushField {
    /// Raw sender address.
    Sender,
    /// Part of the sender after '@' (the whole sender when there is none).
    Domain,
    /// Raw subject.
    Subject,
    /// First 2000 characters of the body, falling back to the summary.
    Body,
}

impl PushField {
    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "domain" => Self::Domain,
            "subject" => Self::Subject,
            "body" => Self::Body,
            _ => Self::Sender,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sender => "sender",
            Self::Domain => "domain",
            Self::Subject => "subject",
            Self::Body => "body",
        }
    }
}

/// Whether a push filter rule permits or blocks matching messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PushMode {
    /// Matching messages may be pushed.
    Allow,
    /// Matching messages are never pushed.
    Deny,
}

impl PushMode {
    /// Parse from database string representation.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "deny" => Self::Deny,
            _ => Self::Allow,
        }
    }

    /// Convert to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Allow => "allow",
            Self::Deny => "deny",
        }
    }
}

/// A per-account allow/deny rule gating the chat notification channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushFilterRule {
    /// Row identifier (None for unsaved rules).
    pub id: Option<i64>,
    /// Account this rule belongs to.
    pub account_id: AccountId,
    /// Field the rule inspects.
    pub field: PushField,
    /// Allow or deny.
    pub mode: PushMode,
    /// Case-insensitive substring to look for. Empty values never match.
    pub value: String,
    /// Evaluation order, ascending.
    pub rule_order: i64,
}
