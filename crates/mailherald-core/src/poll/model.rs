//! Poll status model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::account::AccountId;

/// Per-account record of the most recent poll attempt.
///
/// One row per account, upserted by the scheduler. `last_error` is cleared
/// when a poll starts and set only when the sync fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollStatus {
    /// Account this status belongs to.
    pub account_id: AccountId,
    /// When the last poll attempt started.
    pub last_started_at: Option<DateTime<Utc>>,
    /// When the last poll attempt finished, success or not.
    pub last_finished_at: Option<DateTime<Utc>>,
    /// When the last successful poll finished.
    pub last_success_at: Option<DateTime<Utc>>,
    /// Error text of the last failed poll, if the last poll failed.
    pub last_error: Option<String>,
}
