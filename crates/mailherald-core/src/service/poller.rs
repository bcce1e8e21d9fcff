//! Background polling loop.
//!
//! Wakes on a short tick, walks the active accounts, and syncs each one
//! whose per-account interval has elapsed. One account failing never
//! stops the loop; its error lands in the poll status table and the walk
//! continues.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use super::sync::SyncService;
use crate::account::Account;
use crate::poll::PollStatus;
use crate::storage::Storage;

/// Floor for any effective per-account interval, in seconds.
const MIN_INTERVAL_SECS: i64 = 5;

/// Default scheduler tick.
pub const DEFAULT_TICK: Duration = Duration::from_secs(5);

/// Schedules account syncs on per-account intervals.
pub struct Poller {
    storage: Storage,
    sync: Arc<SyncService>,
    /// Interval for accounts without their own override, in seconds.
    global_interval_secs: i64,
    tick: Duration,
}

impl Poller {
    /// Create a poller over shared storage and the sync service.
    #[must_use]
    pub const fn new(
        storage: Storage,
        sync: Arc<SyncService>,
        global_interval_secs: i64,
        tick: Duration,
    ) -> Self {
        Self {
            storage,
            sync,
            global_interval_secs,
            tick,
        }
    }

    /// Start the loop on a background task.
    ///
    /// Returns the task handle and a shutdown signal; send `true` to stop.
    /// An in-flight account sync finishes before the loop exits.
    #[must_use]
    pub fn spawn(self) -> (JoinHandle<()>, watch::Sender<bool>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(self.run(shutdown_rx));
        (handle, shutdown_tx)
    }

    async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(tick = ?self.tick, "poller started");
        let mut interval = tokio::time::interval(self.tick);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown.changed() => {}
            }
            if *shutdown.borrow() {
                break;
            }
            self.poll_due_accounts(&shutdown).await;
        }
        info!("poller stopped");
    }

    /// One pass over the active accounts.
    async fn poll_due_accounts(&self, shutdown: &watch::Receiver<bool>) {
        let accounts = match self.storage.accounts.list_active().await {
            Ok(accounts) => accounts,
            Err(err) => {
                error!(%err, "failed to list accounts");
                return;
            }
        };

        for account in accounts {
            if *shutdown.borrow() {
                return;
            }
            let Some(account_id) = account.id else {
                continue;
            };
            let status = match self.storage.poll_status.get(account_id).await {
                Ok(status) => status,
                Err(err) => {
                    error!(account = %account.email, %err, "failed to read poll status");
                    continue;
                }
            };
            if !self.is_due(&account, status.as_ref()) {
                continue;
            }

            if let Err(err) = self.storage.poll_status.mark_started(account_id).await {
                error!(account = %account.email, %err, "failed to record poll start");
                continue;
            }
            match self.sync.sync_account(account_id).await {
                Ok(touched) => {
                    debug!(account = %account.email, touched, "account sync succeeded");
                    if let Err(err) = self.storage.poll_status.mark_success(account_id).await {
                        error!(account = %account.email, %err, "failed to record poll success");
                    }
                }
                Err(err) => {
                    error!(account = %account.email, %err, "account sync failed");
                    if let Err(record_err) = self
                        .storage
                        .poll_status
                        .mark_error(account_id, &err.to_string())
                        .await
                    {
                        error!(account = %account.email, %record_err, "failed to record poll error");
                    }
                }
            }
            if let Err(err) = self.storage.poll_status.mark_finished(account_id).await {
                error!(account = %account.email, %err, "failed to record poll finish");
            }
        }
    }

    /// Whether an account's interval has elapsed since its last poll start.
    /// An account with no status row is always due.
    fn is_due(&self, account: &Account, status: Option<&PollStatus>) -> bool {
        let interval = account
            .poll_interval_secs
            .unwrap_or(self.global_interval_secs)
            .max(MIN_INTERVAL_SECS);
        match status.and_then(|s| s.last_started_at) {
            Some(started) => {
                let elapsed = (chrono::Utc::now() - started).num_seconds();
                elapsed >= interval
            }
            None => true,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;
    use chrono::{Duration as ChronoDuration, Utc};

    use crate::account::{AccountId, CredentialCipher};
    use crate::service::sync::SyncTuning;
    use crate::service::telegram::TelegramNotifier;
    use crate::service::webhook::WebhookNotifier;

    async fn poller(global_interval_secs: i64) -> Poller {
        let storage = Storage::in_memory().await.unwrap();
        let cipher = CredentialCipher::from_key(&BASE64.encode([0u8; 32])).unwrap();
        let sync = Arc::new(SyncService::new(
            storage.clone(),
            cipher,
            TelegramNotifier::new(None),
            WebhookNotifier::new(None),
            SyncTuning::default(),
        ));
        Poller::new(storage, sync, global_interval_secs, DEFAULT_TICK)
    }

    fn account_with_interval(interval: Option<i64>) -> Account {
        Account {
            id: Some(AccountId::new(1)),
            poll_interval_secs: interval,
            ..Account::with_email("me@example.com", "imap.example.com", "sealed")
        }
    }

    fn status_started(seconds_ago: i64) -> PollStatus {
        PollStatus {
            account_id: AccountId::new(1),
            last_started_at: Some(Utc::now() - ChronoDuration::seconds(seconds_ago)),
            last_finished_at: None,
            last_success_at: None,
            last_error: None,
        }
    }

    #[tokio::test]
    async fn account_without_status_is_due() {
        let poller = poller(300).await;
        assert!(poller.is_due(&account_with_interval(None), None));
    }

    #[tokio::test]
    async fn global_interval_gates_polling() {
        let poller = poller(300).await;
        let account = account_with_interval(None);
        assert!(!poller.is_due(&account, Some(&status_started(60))));
        assert!(poller.is_due(&account, Some(&status_started(400))));
    }

    #[tokio::test]
    async fn per_account_override_wins() {
        let poller = poller(300).await;
        let account = account_with_interval(Some(30));
        assert!(poller.is_due(&account, Some(&status_started(60))));
        assert!(!poller.is_due(&account, Some(&status_started(10))));
    }

    #[tokio::test]
    async fn interval_is_floored() {
        let poller = poller(300).await;
        let account = account_with_interval(Some(1));
        assert!(!poller.is_due(&account, Some(&status_started(2))));
        assert!(poller.is_due(&account, Some(&status_started(6))));
    }

    #[tokio::test]
    async fn shutdown_stops_the_loop() {
        let poller = poller(300).await;
        let (handle, shutdown) = poller.spawn();
        shutdown.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("poller did not stop")
            .expect("poller task panicked");
    }
}
