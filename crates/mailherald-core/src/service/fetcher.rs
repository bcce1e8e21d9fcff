//! Mailbox fetcher.
//!
//! Connects to one IMAP mailbox over TLS, lists recent messages, and
//! extracts the fields the ingestion pipeline needs. The session is
//! blocking; callers run [`fetch_recent`] on a worker thread
//! (`tokio::task::spawn_blocking`) so it never stalls the scheduler.

use chrono::{DateTime, Utc};
use mail_parser::{Address, MessageParser};
use tracing::debug;

use crate::account::AccountId;

/// Errors that can occur while talking to a mailbox.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// TLS setup failed.
    #[error("TLS error: {0}")]
    Tls(#[from] native_tls::Error),

    /// IMAP protocol or connection failure.
    #[error("IMAP error: {0}")]
    Protocol(#[from] imap::error::Error),

    /// The server rejected the credentials.
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// The blocking worker task failed to complete.
    #[error("Fetch worker failed: {0}")]
    Worker(String),
}

/// Connection parameters for one mailbox, credentials already decrypted.
#[derive(Debug, Clone)]
pub struct MailboxEndpoint {
    /// IMAP server hostname.
    pub host: String,
    /// IMAP server port.
    pub port: u16,
    /// Login name (the account's address).
    pub email: String,
    /// Decrypted password.
    pub password: String,
}

/// One message as pulled from the mailbox, before deduplication.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    /// Stable identifier: the Message-ID header value (bracket-less), or
    /// `{account}:{uid}` when the header is absent.
    pub remote_id: String,
    /// Subject, possibly empty.
    pub subject: String,
    /// Sender address, possibly empty.
    pub sender: String,
    /// When the message was received.
    pub received_at: DateTime<Utc>,
    /// Plain-text body. Derived from HTML when no text part exists.
    pub body_text: String,
    /// HTML body, empty when the message has none.
    pub body_html: String,
}

/// Fetch messages received since `since` from the INBOX, newest first,
/// capped at `limit`.
///
/// Messages with no derivable identifier are dropped, not errors.
///
/// # Errors
///
/// Returns an error on TLS, connection, or authentication failure.
pub fn fetch_recent(
    endpoint: &MailboxEndpoint,
    since: DateTime<Utc>,
    limit: usize,
    account_id: AccountId,
) -> Result<Vec<FetchedMessage>, FetchError> {
    let tls = native_tls::TlsConnector::builder().build()?;
    let client = imap::connect(
        (endpoint.host.as_str(), endpoint.port),
        endpoint.host.as_str(),
        &tls,
    )?;
    let mut session = client
        .login(&endpoint.email, &endpoint.password)
        .map_err(|(err, _)| FetchError::Authentication(err.to_string()))?;

    let result = list_recent(&mut session, since, limit, account_id);
    let _ = session.logout();
    result
}

fn list_recent<T: std::io::Read + std::io::Write>(
    session: &mut imap::Session<T>,
    since: DateTime<Utc>,
    limit: usize,
    account_id: AccountId,
) -> Result<Vec<FetchedMessage>, FetchError> {
    session.select("INBOX")?;

    // IMAP SEARCH dates use the DD-Mon-YYYY form
    let query = format!("SINCE {}", since.format("%d-%b-%Y"));
    let mut uids: Vec<u32> = session.uid_search(&query)?.into_iter().collect();
    uids.sort_unstable_by(|a, b| b.cmp(a));
    uids.truncate(limit);
    if uids.is_empty() {
        return Ok(Vec::new());
    }

    let set = uids
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    let fetches = session.uid_fetch(&set, "(UID RFC822 INTERNALDATE)")?;

    let mut messages = Vec::with_capacity(uids.len());
    for fetch in fetches.iter() {
        let Some(raw) = fetch.body() else {
            debug!(uid = ?fetch.uid, "fetch returned no body, skipping");
            continue;
        };
        let internal_date = fetch.internal_date().map(|d| d.with_timezone(&Utc));
        if let Some(message) = parse_fetched(raw, fetch.uid, internal_date, account_id) {
            messages.push(message);
        }
    }
    Ok(messages)
}

/// Turn one raw RFC 822 message into a [`FetchedMessage`].
///
/// Returns `None` when no identifier can be derived (no Message-ID header
/// and no server-assigned UID) or the message cannot be parsed at all.
fn parse_fetched(
    raw: &[u8],
    uid: Option<u32>,
    internal_date: Option<DateTime<Utc>>,
    account_id: AccountId,
) -> Option<FetchedMessage> {
    let parsed = MessageParser::default().parse(raw)?;

    let remote_id = match parsed.message_id().map(str::trim).filter(|s| !s.is_empty()) {
        Some(header_id) => header_id.to_string(),
        None => {
            let uid = uid?;
            format!("{account_id}:{uid}")
        }
    };

    let subject = parsed.subject().unwrap_or_default().to_string();
    let sender = parsed
        .from()
        .and_then(Address::first)
        .and_then(|addr| addr.address.as_deref())
        .unwrap_or_default()
        .to_string();

    let received_at = parsed
        .date()
        .and_then(|d| DateTime::parse_from_rfc3339(&d.to_rfc3339()).ok())
        .map_or_else(|| internal_date.unwrap_or_else(Utc::now), |d| d.with_timezone(&Utc));

    let body_html = parsed
        .body_html(0)
        .map(|s| s.into_owned())
        .unwrap_or_default();
    let mut body_text = parsed
        .body_text(0)
        .map(|s| s.into_owned())
        .unwrap_or_default();
    if body_text.is_empty() && !body_html.is_empty() {
        body_text = html_to_text(&body_html);
    }

    Some(FetchedMessage {
        remote_id,
        subject,
        sender,
        received_at,
        body_text,
        body_html,
    })
}

/// Best-effort plain-text rendering of an HTML body: scripts and styles
/// removed, tags stripped, common entities decoded, blank lines collapsed.
#[must_use]
pub fn html_to_text(html: &str) -> String {
    let mut text = strip_tag_block(html, "script");
    text = strip_tag_block(&text, "style");

    for tag in ["<br>", "<br/>", "<br />", "</p>", "</div>", "</tr>", "</li>", "</h1>", "</h2>", "</h3>"] {
        text = text.replace(tag, "\n");
    }

    let mut stripped = String::with_capacity(text.len());
    let mut in_tag = false;
    for ch in text.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => stripped.push(ch),
            _ => {}
        }
    }

    stripped = stripped
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ");

    let mut lines = Vec::new();
    for line in stripped.lines() {
        let trimmed = line.trim();
        if !trimmed.is_empty() {
            lines.push(trimmed);
        }
    }
    lines.join("\n")
}

/// Remove `<tag>…</tag>` blocks, case-insensitively.
fn strip_tag_block(html: &str, tag: &str) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut result = String::with_capacity(html.len());
    let mut pos = 0;

    while let Some(start) = find_ascii_ci(html, &open, pos) {
        result.push_str(&html[pos..start]);
        match find_ascii_ci(html, &close, start) {
            Some(end) => pos = end + close.len(),
            None => return result,
        }
    }
    result.push_str(&html[pos..]);
    result
}

/// Byte-wise ASCII case-insensitive search starting at `from`.
///
/// The needle must be pure ASCII; a match therefore both starts and ends on
/// a char boundary of the haystack, so the returned index is safe to slice
/// with regardless of surrounding multi-byte characters.
fn find_ascii_ci(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    let hay = haystack.as_bytes();
    let ndl = needle.as_bytes();
    if ndl.is_empty() || hay.len() < from + ndl.len() {
        return None;
    }
    (from..=hay.len() - ndl.len()).find(|&i| hay[i..i + ndl.len()].eq_ignore_ascii_case(ndl))
}
