//! Ingested message model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::AccountId;

/// Maximum length of the derived summary, in characters.
pub const SUMMARY_MAX_CHARS: usize = 200;

/// A message ingested from a mailbox.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Row identifier (None for unsaved messages).
    pub id: Option<i64>,
    /// Protocol-level identifier used for deduplication. Unique system-wide.
    pub remote_id: String,
    /// Owning account.
    pub account_id: AccountId,
    /// Message subject.
    pub subject: String,
    /// Sender address.
    pub sender: String,
    /// Short summary derived from the body, or the subject when no body
    /// was available at ingestion time.
    pub summary: String,
    /// Plain-text body, if present.
    pub body_text: Option<String>,
    /// HTML body, if present.
    pub body_html: Option<String>,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
    /// Read flag.
    pub is_read: bool,
    /// Labels applied by mail rules, insertion-ordered, no duplicates.
    pub labels: Vec<String>,
}

impl Message {
    /// The text mail rules and the push gate match against: the plain-text
    /// body when present and non-empty, the stored summary otherwise.
    #[must_use]
    pub fn rule_body(&self) -> &str {
        match self.body_text.as_deref() {
            Some(body) if !body.is_empty() => body,
            _ => &self.summary,
        }
    }
}

/// Derive a short summary: carriage returns stripped, trimmed, and cut to
/// [`SUMMARY_MAX_CHARS`] characters.
#[must_use]
pub fn summarize(source: &str) -> String {
    source
        .replace('\r', "")
        .trim()
        .chars()
        .take(SUMMARY_MAX_CHARS)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summarize_strips_carriage_returns() {
        assert_eq!(summarize("a\r\nb\r\n"), "a\nb");
    }

    #[test]
    fn summarize_truncates_by_characters() {
        let long = "ä".repeat(300);
        let summary = summarize(&long);
        assert_eq!(summary.chars().count(), SUMMARY_MAX_CHARS);
    }

    #[test]
    fn rule_body_prefers_body_text() {
        let mut message = Message {
            id: None,
            remote_id: "x".to_string(),
            account_id: AccountId::new(1),
            subject: String::new(),
            sender: String::new(),
            summary: "summary".to_string(),
            body_text: Some("body".to_string()),
            body_html: None,
            received_at: Utc::now(),
            is_read: false,
            labels: Vec::new(),
        };
        assert_eq!(message.rule_body(), "body");

        message.body_text = Some(String::new());
        assert_eq!(message.rule_body(), "summary");

        message.body_text = None;
        assert_eq!(message.rule_body(), "summary");
    }
}
