//! Ingestion orchestrator.
//!
//! Pulls recent messages for one account, deduplicates them against the
//! store, applies the labeling rules, and fans freshly seen messages out
//! to the notification channels. The mailbox session is blocking, so the
//! fetch runs on a `spawn_blocking` worker.

use chrono::{Duration, Utc};
use tracing::{debug, info};

use super::fetcher::{self, FetchError, MailboxEndpoint};
use super::telegram::TelegramNotifier;
use super::webhook::WebhookNotifier;
use crate::account::{Account, AccountId, CredentialCipher};
use crate::message::{Message, summarize};
use crate::rules::{apply_mail_rules, should_push};
use crate::storage::Storage;
use crate::{Error, Result};

/// How one account sync run behaves.
///
/// A thin mailbox gets a deep backfill without notifications; a mailbox
/// that is already populated gets a short catch-up window with full
/// notification fan-out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    /// First-time backfill: wide window, high cap, no notifications.
    Initial,
    /// Steady-state catch-up: narrow window, notifications fire.
    Incremental,
}

/// Tunable knobs for the sync heuristic.
#[derive(Debug, Clone, Copy)]
pub struct SyncTuning {
    /// Below this many stored messages an account is still in backfill.
    pub initial_threshold: i64,
    /// Backfill search window, in days.
    pub initial_lookback_days: i64,
    /// Backfill fetch cap.
    pub initial_max: usize,
    /// Catch-up search window, in hours.
    pub incremental_lookback_hours: i64,
    /// Catch-up fetch cap.
    pub incremental_max: usize,
}

impl Default for SyncTuning {
    fn default() -> Self {
        Self {
            initial_threshold: 50,
            initial_lookback_days: 365,
            initial_max: 1000,
            incremental_lookback_hours: 24,
            incremental_max: 200,
        }
    }
}

/// Drives the full ingestion pipeline for accounts.
pub struct SyncService {
    storage: Storage,
    cipher: CredentialCipher,
    telegram: TelegramNotifier,
    webhook: WebhookNotifier,
    tuning: SyncTuning,
}

impl SyncService {
    /// Create a sync service over shared storage and the notification
    /// channels.
    #[must_use]
    pub const fn new(
        storage: Storage,
        cipher: CredentialCipher,
        telegram: TelegramNotifier,
        webhook: WebhookNotifier,
        tuning: SyncTuning,
    ) -> Self {
        Self {
            storage,
            cipher,
            telegram,
            webhook,
            tuning,
        }
    }

    /// Sync one account: fetch, deduplicate, apply rules, notify.
    ///
    /// Returns the number of stored rows touched (inserted plus
    /// backfilled). An inactive account syncs nothing and returns 0.
    ///
    /// # Errors
    ///
    /// Returns an error when the account does not exist, the stored
    /// credentials cannot be decrypted, the mailbox cannot be reached,
    /// or a database query fails.
    pub async fn sync_account(&self, account_id: AccountId) -> Result<u64> {
        let account = self
            .storage
            .accounts
            .get(account_id)
            .await?
            .ok_or_else(|| Error::AccountNotFound(account_id.to_string()))?;
        if !account.is_active {
            debug!(account = %account.email, "account inactive, skipping sync");
            return Ok(0);
        }

        let existing = self.storage.messages.count_for_account(account_id).await?;
        let mode = if existing < self.tuning.initial_threshold {
            SyncMode::Initial
        } else {
            SyncMode::Incremental
        };
        let (since, limit) = match mode {
            SyncMode::Initial => (
                Utc::now() - Duration::days(self.tuning.initial_lookback_days),
                self.tuning.initial_max,
            ),
            SyncMode::Incremental => (
                Utc::now() - Duration::hours(self.tuning.incremental_lookback_hours),
                self.tuning.incremental_max,
            ),
        };
        debug!(
            account = %account.email,
            ?mode,
            %since,
            limit,
            "starting mailbox sync"
        );

        let endpoint = MailboxEndpoint {
            host: account.host.clone(),
            port: account.port,
            email: account.email.clone(),
            password: self.cipher.decrypt(&account.encrypted_password)?,
        };
        let fetched = tokio::task::spawn_blocking(move || {
            fetcher::fetch_recent(&endpoint, since, limit, account_id)
        })
        .await
        .map_err(|err| Error::Fetch(FetchError::Worker(err.to_string())))??;

        let touched = self.ingest(&account, fetched, mode).await?;
        info!(account = %account.email, touched, "mailbox sync finished");
        Ok(touched)
    }

    /// Store one batch of fetched messages for an account.
    async fn ingest(
        &self,
        account: &Account,
        fetched: Vec<fetcher::FetchedMessage>,
        mode: SyncMode,
    ) -> Result<u64> {
        let account_id = account
            .id
            .ok_or_else(|| Error::AccountNotFound(account.email.clone()))?;
        let mail_rules = self.storage.mail_rules.list().await?;
        let push_rules = self.storage.push_rules.list_for_account(account_id).await?;

        let mut touched = 0u64;
        for item in fetched {
            if let Some(existing) = self.storage.messages.find_by_remote_id(&item.remote_id).await?
            {
                if self.backfill(&existing, &item).await? {
                    touched += 1;
                }
                continue;
            }

            let summary = if item.body_text.is_empty() {
                summarize(&item.subject)
            } else {
                summarize(&item.body_text)
            };
            let mut message = Message {
                id: None,
                remote_id: item.remote_id,
                account_id,
                subject: item.subject,
                sender: item.sender,
                summary,
                body_text: non_empty(item.body_text),
                body_html: non_empty(item.body_html),
                received_at: item.received_at,
                is_read: false,
                labels: Vec::new(),
            };
            self.storage.messages.insert(&mut message).await?;
            touched += 1;

            let outcome = apply_mail_rules(&message, message.rule_body(), &mail_rules);
            if !outcome.labels.is_empty() || outcome.mark_read {
                message.labels.clone_from(&outcome.labels);
                message.is_read = outcome.mark_read;
                if let Some(id) = message.id {
                    self.storage
                        .messages
                        .set_labels_and_read(id, &outcome.labels, outcome.mark_read)
                        .await?;
                }
            }

            // Backfill stays quiet; only steady-state syncs announce mail.
            if mode == SyncMode::Incremental {
                if should_push(&message, account, &push_rules, outcome.suppress_push) {
                    self.telegram.notify_new_message(&message, account).await;
                }
                self.webhook.notify_new_message(&message, account).await;
            }
        }
        Ok(touched)
    }

    /// Fill in bodies a previous sync saw without content. Returns whether
    /// the row changed.
    async fn backfill(
        &self,
        existing: &Message,
        item: &fetcher::FetchedMessage,
    ) -> Result<bool> {
        let wants_text =
            existing.body_text.as_deref().unwrap_or("").is_empty() && !item.body_text.is_empty();
        let wants_html =
            existing.body_html.as_deref().unwrap_or("").is_empty() && !item.body_html.is_empty();
        if !wants_text && !wants_html {
            return Ok(false);
        }

        let body_text = if wants_text {
            Some(item.body_text.as_str())
        } else {
            existing.body_text.as_deref()
        };
        let body_html = if wants_html {
            Some(item.body_html.as_str())
        } else {
            existing.body_html.as_deref()
        };

        // A summary that still mirrors the subject was a placeholder; now
        // that a body exists, recompute it. A hand-shortened or real body
        // summary is left alone.
        let summary = if existing.summary == summarize(&existing.subject) && wants_text {
            summarize(&item.body_text)
        } else {
            existing.summary.clone()
        };

        if let Some(id) = existing.id {
            self.storage
                .messages
                .update_bodies(id, body_text, body_html, &summary)
                .await?;
        }
        Ok(true)
    }

    /// Re-run every labeling rule against every stored message.
    ///
    /// Labels are rebuilt from scratch; the read flag only ever escalates.
    /// Returns how many messages ended up with at least one label.
    ///
    /// # Errors
    ///
    /// Returns an error if a database query fails.
    pub async fn recompute_labels(&self) -> Result<u64> {
        let rules = self.storage.mail_rules.list().await?;
        self.storage.messages.clear_all_labels().await?;

        let mut labeled = 0u64;
        for message in self.storage.messages.list_all().await? {
            let outcome = apply_mail_rules(&message, message.rule_body(), &rules);
            if outcome.labels.is_empty() && !outcome.mark_read {
                continue;
            }
            if let Some(id) = message.id {
                self.storage
                    .messages
                    .set_labels_and_read(
                        id,
                        &outcome.labels,
                        message.is_read || outcome.mark_read,
                    )
                    .await?;
            }
            if !outcome.labels.is_empty() {
                labeled += 1;
            }
        }
        info!(labeled, "label recompute finished");
        Ok(labeled)
    }
}

fn non_empty(text: String) -> Option<String> {
    if text.is_empty() { None } else { Some(text) }
}
