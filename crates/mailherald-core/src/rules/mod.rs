//! Rule systems: global mail rules and per-account push filters.
//!
//! Two independent rule sets govern what happens to an ingested message.
//! Mail rules label it, mark it read, and may suppress the chat channel;
//! push filter rules gate the chat channel per account. Both engines are
//! pure functions over data loaded fresh from storage on every sync.

mod engine;
mod gate;
mod model;
mod repository;

pub use engine::{RuleOutcome, apply_mail_rules};
pub use gate::should_push;
pub use model::{MailRule, PushField, PushFilterRule, PushMode};
pub use repository::{MailRuleRepository, PushRuleRepository};
