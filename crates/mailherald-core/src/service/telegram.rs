//! Chat notification channel (Telegram bot API).
//!
//! Best-effort: a missing configuration makes every send a no-op, and
//! delivery errors are logged at debug level and discarded. Nothing here
//! may ever fail the ingestion path.

use std::time::Duration;

use tracing::debug;

use crate::account::{Account, PushTemplate};
use crate::message::Message;

/// Hard ceiling on one Telegram message, in characters.
const MESSAGE_MAX_CHARS: usize = 4096;

/// Ceiling for the raw-body template, leaving room for the header lines.
const FULL_BODY_MAX_CHARS: usize = 3800;

/// Per-request send timeout.
const SEND_TIMEOUT: Duration = Duration::from_secs(10);

/// Bot credentials and target chat.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// Bot API token.
    pub bot_token: String,
    /// Chat the notifications go to.
    pub chat_id: String,
}

/// Sends formatted new-mail notifications to a Telegram chat.
#[derive(Clone)]
pub struct TelegramNotifier {
    client: reqwest::Client,
    config: Option<TelegramConfig>,
}

impl TelegramNotifier {
    /// Create a notifier. `None` disables the channel entirely.
    #[must_use]
    pub fn new(config: Option<TelegramConfig>) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Whether the channel is configured.
    #[must_use]
    pub const fn is_configured(&self) -> bool {
        self.config.is_some()
    }

    /// Push one new-mail notification. No-op when unconfigured; all
    /// delivery errors are swallowed.
    pub async fn notify_new_message(&self, message: &Message, account: &Account) {
        let Some(config) = &self.config else {
            return;
        };
        let text = build_notification(message, account);
        let url = format!("https://api.telegram.org/bot{}/sendMessage", config.bot_token);
        let payload = serde_json::json!({
            "chat_id": config.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });

        match self
            .client
            .post(&url)
            .json(&payload)
            .timeout(SEND_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => {
                if let Err(err) = response.error_for_status() {
                    debug!(%err, "telegram rejected notification");
                }
            }
            Err(err) => debug!(%err, "telegram notification failed"),
        }
    }
}

/// Render the notification text for one message, shaped by the account's
/// template, HTML-escaped, hard-truncated to the channel limit.
fn build_notification(message: &Message, account: &Account) -> String {
    let subject = if message.subject.is_empty() {
        "(no subject)".to_string()
    } else {
        escape_html(&message.subject)
    };

    let mut lines = vec![
        format!("\u{1f4ec} <b>{subject}</b>"),
        format!("From: <code>{}</code>", escape_html(&message.sender)),
        format!("Account: <code>{}</code>", escape_html(&account.email)),
        format!("Received: {}", message.received_at.format("%Y-%m-%d %H:%M")),
    ];

    if account.push_template != PushTemplate::TitleOnly {
        let source = message.rule_body().trim();
        let preview = match account.push_template {
            PushTemplate::FullBody => {
                let escaped = escape_html(source);
                truncate_chars(&escaped, FULL_BODY_MAX_CHARS)
            }
            PushTemplate::Full => build_preview(source, 12, 80),
            _ => build_preview(source, 4, 60),
        };
        if !preview.is_empty() {
            lines.push(String::new());
            lines.push("Preview:".to_string());
            lines.push(preview);
        }
    }

    let text = lines.join("\n");
    truncate_chars(&text, MESSAGE_MAX_CHARS)
}

/// Escape text for Telegram's HTML parse mode.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Build a line-limited preview: blank lines dropped, long lines cut with
/// an ellipsis, at most `max_lines` lines of `max_len` characters.
fn build_preview(source: &str, max_lines: usize, max_len: usize) -> String {
    let mut preview_lines = Vec::new();
    for line in source.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        preview_lines.push(truncate_chars(line, max_len));
        if preview_lines.len() >= max_lines {
            break;
        }
    }
    escape_html(&preview_lines.join("\n"))
}

/// Cut to `max_chars` characters, replacing the tail with an ellipsis when
/// anything was cut.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    cut.push('\u{2026}');
    cut
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::account::AccountId;
    use chrono::Utc;

    fn account(template: PushTemplate) -> Account {
        Account {
            id: Some(AccountId::new(1)),
            push_template: template,
            ..Account::with_email("me@example.com", "imap.example.com", "sealed")
        }
    }

    fn message(subject: &str, body: &str) -> Message {
        Message {
            id: Some(1),
            remote_id: "<n@example.com>".to_string(),
            account_id: AccountId::new(1),
            subject: subject.to_string(),
            sender: "peer@example.com".to_string(),
            summary: "summary".to_string(),
            body_text: Some(body.to_string()),
            body_html: None,
            received_at: Utc::now(),
            is_read: false,
            labels: Vec::new(),
        }
    }

    #[test]
    fn escapes_markup_in_dynamic_text() {
        let text = build_notification(
            &message("<script>alert</script>", "a & b"),
            &account(PushTemplate::Short),
        );
        assert!(text.contains("&lt;script&gt;"));
        assert!(text.contains("a &amp; b"));
        assert!(!text.contains("<script>"));
    }

    #[test]
    fn title_only_has_no_preview() {
        let text = build_notification(
            &message("subj", "secret body"),
            &account(PushTemplate::TitleOnly),
        );
        assert!(!text.contains("secret body"));
        assert!(!text.contains("Preview:"));
    }

    #[test]
    fn short_preview_limits_lines_and_width() {
        let body = (0..10)
            .map(|i| format!("line {i} {}", "x".repeat(100)))
            .collect::<Vec<_>>()
            .join("\n");
        let text = build_notification(&message("subj", &body), &account(PushTemplate::Short));
        let preview_lines: Vec<&str> = text
            .lines()
            .skip_while(|l| *l != "Preview:")
            .skip(1)
            .collect();
        assert_eq!(preview_lines.len(), 4);
        for line in preview_lines {
            assert!(line.chars().count() <= 60);
        }
    }

    #[test]
    fn full_preview_allows_twelve_lines() {
        let body = (0..20).map(|i| format!("l{i}")).collect::<Vec<_>>().join("\n");
        let text = build_notification(&message("subj", &body), &account(PushTemplate::Full));
        let preview_lines = text.lines().skip_while(|l| *l != "Preview:").skip(1).count();
        assert_eq!(preview_lines, 12);
    }

    #[test]
    fn whole_message_is_hard_truncated() {
        let body = "z".repeat(10_000);
        let text = build_notification(&message("subj", &body), &account(PushTemplate::FullBody));
        assert!(text.chars().count() <= MESSAGE_MAX_CHARS);
        assert!(text.ends_with('\u{2026}'));
    }

    #[test]
    fn empty_subject_gets_placeholder() {
        let text = build_notification(&message("", "body"), &account(PushTemplate::Short));
        assert!(text.contains("(no subject)"));
    }

    #[test]
    fn unconfigured_channel_is_disabled() {
        assert!(!TelegramNotifier::new(None).is_configured());
        assert!(
            TelegramNotifier::new(Some(TelegramConfig {
                bot_token: "t".to_string(),
                chat_id: "c".to_string(),
            }))
            .is_configured()
        );
    }
}
