//! Ingested message storage.

mod model;
mod repository;

pub use model::{Message, SUMMARY_MAX_CHARS, summarize};
pub use repository::MessageRepository;
