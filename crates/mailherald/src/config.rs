//! Daemon configuration, loaded from a TOML file.
//!
//! The path comes from `MAILHERALD_CONFIG`, falling back to
//! `mailherald.toml` in the working directory.

use std::path::Path;

use serde::Deserialize;

/// Default per-account poll interval, in seconds.
const fn default_poll_interval() -> i64 {
    300
}

/// Default scheduler tick, in seconds.
const fn default_tick() -> u64 {
    5
}

fn default_database_path() -> String {
    "mailherald.db".to_string()
}

/// Top-level daemon configuration.
#[derive(Debug, Deserialize)]
pub struct Config {
    /// `SQLite` database file path.
    #[serde(default = "default_database_path")]
    pub database_path: String,
    /// Base64-encoded 32-byte key for credential encryption.
    pub encryption_key: String,
    /// Poll interval for accounts without their own override, in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: i64,
    /// Scheduler tick, in seconds.
    #[serde(default = "default_tick")]
    pub tick_secs: u64,
    /// Optional HTTP endpoint receiving new-message events.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Optional Telegram channel.
    #[serde(default)]
    pub telegram: Option<TelegramSection>,
    /// Sync heuristic overrides.
    #[serde(default)]
    pub sync: SyncSection,
}

/// Telegram bot settings.
#[derive(Debug, Deserialize)]
pub struct TelegramSection {
    /// Bot API token.
    pub bot_token: String,
    /// Target chat id.
    pub chat_id: String,
}

/// Optional overrides for the sync mode heuristic.
#[derive(Debug, Default, Deserialize)]
pub struct SyncSection {
    /// Stored-message count below which an account is still backfilling.
    pub initial_threshold: Option<i64>,
    /// Backfill lookback window, in days.
    pub initial_lookback_days: Option<i64>,
    /// Backfill fetch cap.
    pub initial_max: Option<usize>,
    /// Catch-up lookback window, in hours.
    pub incremental_lookback_hours: Option<i64>,
    /// Catch-up fetch cap.
    pub incremental_max: Option<usize>,
}

impl Config {
    /// Load the configuration from a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|err| anyhow::anyhow!("cannot read config {}: {err}", path.display()))?;
        let config: Self = toml::from_str(&raw)
            .map_err(|err| anyhow::anyhow!("cannot parse config {}: {err}", path.display()))?;
        Ok(config)
    }

    /// Resolve the config file path from the environment.
    #[must_use]
    pub fn path_from_env() -> std::path::PathBuf {
        std::env::var("MAILHERALD_CONFIG")
            .unwrap_or_else(|_| "mailherald.toml".to_string())
            .into()
    }

    /// Fold the optional overrides into the default sync tuning.
    #[must_use]
    pub fn sync_tuning(&self) -> mailherald_core::SyncTuning {
        let defaults = mailherald_core::SyncTuning::default();
        mailherald_core::SyncTuning {
            initial_threshold: self.sync.initial_threshold.unwrap_or(defaults.initial_threshold),
            initial_lookback_days: self
                .sync
                .initial_lookback_days
                .unwrap_or(defaults.initial_lookback_days),
            initial_max: self.sync.initial_max.unwrap_or(defaults.initial_max),
            incremental_lookback_hours: self
                .sync
                .incremental_lookback_hours
                .unwrap_or(defaults.incremental_lookback_hours),
            incremental_max: self.sync.incremental_max.unwrap_or(defaults.incremental_max),
        }
    }
}
