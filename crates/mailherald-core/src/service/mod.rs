//! Service layer: mailbox fetching, ingestion, scheduling, and fan-out.

pub mod fetcher;
pub mod poller;
pub mod sync;
pub mod telegram;
pub mod webhook;

pub use fetcher::{FetchError, FetchedMessage, MailboxEndpoint, fetch_recent, html_to_text};
pub use poller::{DEFAULT_TICK, Poller};
pub use sync::{SyncMode, SyncService, SyncTuning};
pub use telegram::{TelegramConfig, TelegramNotifier};
pub use webhook::{WebhookNotifier, WebhookPayload};
