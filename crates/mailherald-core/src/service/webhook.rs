//! Generic HTTP webhook fan-out.
//!
//! Posts a fixed JSON payload per newly ingested message. Like the chat
//! channel this is best-effort: unconfigured means no-op, and failures
//! are logged and swallowed.

use std::time::Duration;

use serde::Serialize;
use tracing::debug;

use crate::account::Account;
use crate::message::Message;

/// Summary field ceiling in the outgoing payload.
const SUMMARY_MAX_CHARS: usize = 500;

/// Per-request timeout.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// JSON body posted for each new message.
#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    /// Local row id.
    pub id: Option<i64>,
    /// Stable remote identifier used for dedup.
    pub remote_id: String,
    /// Owning account row id.
    pub account_id: i64,
    /// Owning account address.
    pub account_email: String,
    /// Message subject.
    pub subject: String,
    /// Sender address.
    pub sender: String,
    /// Plain-text summary, capped at 500 characters.
    pub summary: String,
    /// Receipt time, RFC 3339.
    pub received_at: String,
    /// Read flag at ingestion time.
    pub is_read: bool,
    /// Labels attached by the labeling rules.
    pub labels: Vec<String>,
}

impl WebhookPayload {
    fn for_message(message: &Message, account: &Account) -> Self {
        let summary = if message.summary.chars().count() > SUMMARY_MAX_CHARS {
            message.summary.chars().take(SUMMARY_MAX_CHARS).collect()
        } else {
            message.summary.clone()
        };
        Self {
            id: message.id,
            remote_id: message.remote_id.clone(),
            account_id: message.account_id.0,
            account_email: account.email.clone(),
            subject: message.subject.clone(),
            sender: message.sender.clone(),
            summary,
            received_at: message.received_at.to_rfc3339(),
            is_read: message.is_read,
            labels: message.labels.clone(),
        }
    }
}

/// Posts new-message events to a configured HTTP endpoint.
#[derive(Clone)]
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl WebhookNotifier {
    /// Create a notifier. `None` disables the channel.
    #[must_use]
    pub fn new(url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url,
        }
    }

    /// Whether the channel is configured.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.url.is_some()
    }

    /// Post one new-message event. No-op when unconfigured; all delivery
    /// errors are swallowed.
    pub async fn notify_new_message(&self, message: &Message, account: &Account) {
        let Some(url) = &self.url else {
            return;
        };
        let payload = WebhookPayload::for_message(message, account);
        match self
            .client
            .post(url)
            .json(&payload)
            .timeout(SEND_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => {
                if let Err(err) = response.error_for_status() {
                    debug!(%err, "webhook rejected event");
                }
            }
            Err(err) => debug!(%err, "webhook delivery failed"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::account::AccountId;
    use chrono::Utc;

    fn sample() -> (Message, Account) {
        let account = Account {
            id: Some(AccountId::new(7)),
            ..Account::with_email("me@example.com", "imap.example.com", "sealed")
        };
        let message = Message {
            id: Some(42),
            remote_id: "<m@example.com>".to_string(),
            account_id: AccountId::new(7),
            subject: "hello".to_string(),
            sender: "peer@example.com".to_string(),
            summary: "s".repeat(900),
            body_text: None,
            body_html: None,
            received_at: Utc::now(),
            is_read: true,
            labels: vec!["work".to_string()],
        };
        (message, account)
    }

    #[test]
    fn payload_caps_summary_and_carries_fields() {
        let (message, account) = sample();
        let payload = WebhookPayload::for_message(&message, &account);
        assert_eq!(payload.id, Some(42));
        assert_eq!(payload.account_id, 7);
        assert_eq!(payload.account_email, "me@example.com");
        assert_eq!(payload.summary.chars().count(), 500);
        assert!(payload.is_read);
        assert_eq!(payload.labels, vec!["work".to_string()]);
    }

    #[test]
    fn payload_serializes_to_expected_shape() {
        let (message, account) = sample();
        let value =
            serde_json::to_value(WebhookPayload::for_message(&message, &account)).unwrap();
        assert_eq!(value["remote_id"], "<m@example.com>");
        assert_eq!(value["subject"], "hello");
        assert!(value["received_at"].as_str().is_some_and(|s| s.contains('T')));
    }

    #[test]
    fn unconfigured_channel_is_disabled() {
        assert!(!WebhookNotifier::new(None).is_configured());
        assert!(WebhookNotifier::new(Some("http://localhost/hook".to_string())).is_configured());
    }
}
