//! Mail rule evaluation.
//!
//! Pure fold over the ordered rule set: every matching rule contributes its
//! effects, labels accumulate in first-seen order, the two flags become true
//! if any matching rule sets them. There is no early exit.

use super::model::MailRule;
use crate::message::Message;

/// Accumulated effects of all matching mail rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RuleOutcome {
    /// Labels to apply, first-seen-ordered, deduplicated.
    pub labels: Vec<String>,
    /// Whether any matching rule suppresses the chat notification.
    pub suppress_push: bool,
    /// Whether any matching rule marks the message as read.
    pub mark_read: bool,
}

/// Evaluate every rule against a message and union the effects.
///
/// `body_text` is the freshly fetched plain-text body; when it is empty the
/// stored summary stands in for it, so rules keep working for messages whose
/// body was never retrieved.
#[must_use]
pub fn apply_mail_rules(message: &Message, body_text: &str, rules: &[MailRule]) -> RuleOutcome {
    let body = if body_text.is_empty() {
        &message.summary
    } else {
        body_text
    };

    let mut outcome = RuleOutcome::default();
    for rule in rules {
        if let Some(scope) = rule.account_id {
            if scope != message.account_id {
                continue;
            }
        }
        if !pattern_matches(&message.sender, &rule.sender_pattern)
            || !pattern_matches(&message.subject, &rule.subject_pattern)
            || !pattern_matches(body, &rule.body_pattern)
        {
            continue;
        }

        for label in &rule.add_labels {
            let label = label.trim();
            if !label.is_empty() && !outcome.labels.iter().any(|l| l == label) {
                outcome.labels.push(label.to_string());
            }
        }
        outcome.suppress_push |= rule.suppress_push;
        outcome.mark_read |= rule.mark_read;
    }
    outcome
}

/// Case-insensitive substring match. An empty (or all-whitespace) pattern
/// always matches.
fn pattern_matches(text: &str, pattern: &str) -> bool {
    let pattern = pattern.trim();
    if pattern.is_empty() {
        return true;
    }
    text.to_lowercase().contains(&pattern.to_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::account::AccountId;
    use chrono::Utc;

    fn message(account: i64, sender: &str, subject: &str, body: Option<&str>) -> Message {
        Message {
            id: Some(1),
            remote_id: "<t@example.com>".to_string(),
            account_id: AccountId::new(account),
            subject: subject.to_string(),
            sender: sender.to_string(),
            summary: "fallback summary".to_string(),
            body_text: body.map(str::to_string),
            body_html: None,
            received_at: Utc::now(),
            is_read: false,
            labels: Vec::new(),
        }
    }

    fn rule(subject_pattern: &str, labels: &[&str]) -> MailRule {
        MailRule {
            subject_pattern: subject_pattern.to_string(),
            add_labels: labels.iter().map(|s| (*s).to_string()).collect(),
            ..MailRule::default()
        }
    }

    #[test]
    fn empty_patterns_always_match() {
        let m = message(1, "a@x.com", "anything", None);
        let outcome = apply_mail_rules(&m, "", &[rule("", &["all"])]);
        assert_eq!(outcome.labels, vec!["all"]);
    }

    #[test]
    fn substring_match_is_case_insensitive() {
        let m = message(1, "a@x.com", "Weekly INVOICE inside", None);
        let outcome = apply_mail_rules(&m, "", &[rule("invoice", &["billing"])]);
        assert_eq!(outcome.labels, vec!["billing"]);

        let miss = apply_mail_rules(
            &message(1, "a@x.com", "nothing here", None),
            "",
            &[rule("invoice", &["billing"])],
        );
        assert!(miss.labels.is_empty());
    }

    #[test]
    fn pattern_is_substring_not_equality() {
        let m = message(1, "a@x.com", "Re: invoice #42", None);
        let outcome = apply_mail_rules(&m, "", &[rule("invoice", &["billing"])]);
        assert_eq!(outcome.labels, vec!["billing"]);
    }

    #[test]
    fn account_scope_filters_rules() {
        let mut scoped = rule("", &["scoped"]);
        scoped.account_id = Some(AccountId::new(2));

        let outcome = apply_mail_rules(&message(1, "a@x.com", "s", None), "", &[scoped.clone()]);
        assert!(outcome.labels.is_empty());

        let outcome = apply_mail_rules(&message(2, "a@x.com", "s", None), "", &[scoped]);
        assert_eq!(outcome.labels, vec!["scoped"]);
    }

    #[test]
    fn effects_union_across_matching_rules() {
        let mut first = rule("", &["a", "b"]);
        first.mark_read = true;
        let mut second = rule("", &["b", "c"]);
        second.suppress_push = true;
        // a non-matching rule must contribute nothing
        let mut third = rule("never-matches-xyz", &["d"]);
        third.mark_read = true;

        let m = message(1, "a@x.com", "s", None);
        let outcome = apply_mail_rules(&m, "", &[first, second, third]);
        assert_eq!(outcome.labels, vec!["a", "b", "c"]);
        assert!(outcome.mark_read);
        assert!(outcome.suppress_push);
    }

    #[test]
    fn body_falls_back_to_summary() {
        let m = message(1, "a@x.com", "s", None);
        let by_body = MailRule {
            body_pattern: "fallback".to_string(),
            add_labels: vec!["via-summary".to_string()],
            ..MailRule::default()
        };

        let outcome = apply_mail_rules(&m, "", &[by_body.clone()]);
        assert_eq!(outcome.labels, vec!["via-summary"]);

        // with a real body the summary is no longer consulted
        let outcome = apply_mail_rules(&m, "actual body text", &[by_body]);
        assert!(outcome.labels.is_empty());
    }

    #[test]
    fn labels_are_deduplicated_and_trimmed() {
        let m = message(1, "a@x.com", "s", None);
        let outcome = apply_mail_rules(&m, "", &[rule("", &["a", " a ", "", "b"])]);
        assert_eq!(outcome.labels, vec!["a", "b"]);
    }
}
