//! # mailherald-core
//!
//! Core logic for the `MailHerald` ingestion daemon.
//!
//! This crate provides:
//! - Account management with encrypted credentials
//! - Mailbox polling and message ingestion (`SQLite`-backed)
//! - **Labeling rules** - substring rules that attach labels, mark read,
//!   or mute notifications
//! - **Push filters** - per-account allow/deny gate for the chat channel
//! - Notification fan-out to Telegram and HTTP webhooks
//! - A background poller with per-account intervals

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

pub mod account;
mod error;
pub mod message;
pub mod poll;
pub mod rules;
pub mod service;
mod storage;

pub use account::credentials;
pub use account::{
    Account, AccountId, AccountRepository, CredentialCipher, CredentialError, CredentialResult,
    PushTemplate,
};
pub use error::{Error, Result};
pub use message::{Message, MessageRepository, SUMMARY_MAX_CHARS, summarize};
pub use poll::{PollStatus, PollStatusRepository};
pub use rules::{
    MailRule, MailRuleRepository, PushField, PushFilterRule, PushMode, PushRuleRepository,
    RuleOutcome, apply_mail_rules, should_push,
};
pub use service::{
    FetchError, FetchedMessage, MailboxEndpoint, Poller, SyncMode, SyncService, SyncTuning,
    TelegramConfig, TelegramNotifier, WebhookNotifier, fetch_recent,
};
pub use storage::Storage;
