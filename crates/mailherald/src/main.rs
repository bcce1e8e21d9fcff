//! `MailHerald` - mailbox ingestion and notification daemon.
//!
//! Polls configured IMAP accounts, stores new mail in `SQLite`, applies
//! the labeling rules, and pushes notifications to Telegram and webhooks.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod config;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mailherald_core::{
    CredentialCipher, Poller, Storage, SyncService, TelegramConfig, TelegramNotifier,
    WebhookNotifier,
};

use config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailherald=info,mailherald_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = Config::path_from_env();
    let config = Config::load(&config_path)?;
    info!(config = %config_path.display(), "Starting MailHerald");

    let storage = Storage::open(&config.database_path)
        .await
        .with_context(|| format!("opening database {}", config.database_path))?;
    let cipher =
        CredentialCipher::from_key(&config.encryption_key).context("loading encryption key")?;

    let telegram = TelegramNotifier::new(config.telegram.as_ref().map(|t| TelegramConfig {
        bot_token: t.bot_token.clone(),
        chat_id: t.chat_id.clone(),
    }));
    let webhook = WebhookNotifier::new(config.webhook_url.clone());
    if !telegram.is_configured() && !webhook.is_configured() {
        info!("no notification channel configured, running ingest-only");
    }

    let sync = Arc::new(SyncService::new(
        storage.clone(),
        cipher,
        telegram,
        webhook,
        config.sync_tuning(),
    ));
    let poller = Poller::new(
        storage,
        sync,
        config.poll_interval_secs,
        Duration::from_secs(config.tick_secs.max(1)),
    );
    let (handle, shutdown) = poller.spawn();

    tokio::signal::ctrl_c()
        .await
        .context("listening for shutdown signal")?;
    info!("shutdown signal received");
    let _ = shutdown.send(true);
    handle.await.context("waiting for the poller to stop")?;
    Ok(())
}
