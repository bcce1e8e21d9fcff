//! Push gate: decides whether the chat notification channel fires.

use super::model::{PushField, PushFilterRule, PushMode};
use crate::account::Account;
use crate::message::Message;

/// How much of the body the gate inspects, in characters.
const BODY_MATCH_CHARS: usize = 2000;

/// Decide whether a message is pushed to the chat channel.
///
/// Decision order:
/// 1. Account push disabled: never push.
/// 2. Suppressed by a matching mail rule: never push.
/// 3. Any matching deny rule blocks immediately.
/// 4. When allow rules exist, at least one must match.
/// 5. With no allow rules and no deny hit, push by default.
#[must_use]
pub fn should_push(
    message: &Message,
    account: &Account,
    rules: &[PushFilterRule],
    suppressed_by_mail_rule: bool,
) -> bool {
    if !account.push_enabled {
        return false;
    }
    if suppressed_by_mail_rule {
        return false;
    }

    for rule in rules.iter().filter(|r| r.mode == PushMode::Deny) {
        if rule_matches(rule, message) {
            return false;
        }
    }

    let mut allow_rules = rules.iter().filter(|r| r.mode == PushMode::Allow).peekable();
    if allow_rules.peek().is_some() {
        return allow_rules.any(|rule| rule_matches(rule, message));
    }

    true
}

/// Case-insensitive substring check of the rule value against its field.
/// Rules with an empty value never match.
fn rule_matches(rule: &PushFilterRule, message: &Message) -> bool {
    let value = rule.value.trim().to_lowercase();
    if value.is_empty() {
        return false;
    }
    extract_field(rule.field, message).contains(&value)
}

/// One pure extraction per field variant, lowercased for matching.
fn extract_field(field: PushField, message: &Message) -> String {
    let raw: String = match field {
        PushField::Sender => message.sender.clone(),
        PushField::Domain => message
            .sender
            .rsplit_once('@')
            .map_or_else(|| message.sender.clone(), |(_, domain)| domain.trim().to_string()),
        PushField::Subject => message.subject.clone(),
        PushField::Body => message.rule_body().chars().take(BODY_MATCH_CHARS).collect(),
    };
    raw.to_lowercase()
}
