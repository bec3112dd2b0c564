//! Notification rules: which phases notify whom, over which channel.
//!
//! A [`NotificationRule`] is created when a launch plan is defined and never
//! changes afterwards. All validation happens in the constructors, so any
//! rule that exists (including one deserialised from a launch plan) is
//! well-formed.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::{ChannelKind, ExecutionPhase, NotifyError, Recipient};

/// An immutable pairing of trigger phases, a channel, and recipients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RuleSpec", into = "RuleSpec")]
pub struct NotificationRule {
    trigger_phases: BTreeSet<ExecutionPhase>,
    channel: ChannelKind,
    recipients: Vec<Recipient>,
}

impl NotificationRule {
    /// Creates a rule after validating phases and recipients for `channel`.
    ///
    /// Fails when no phase is given, when there are no recipients, or when a
    /// recipient is not syntactically valid for the channel.
    pub fn new<P, R>(channel: ChannelKind, phases: P, recipients: R) -> Result<Self, NotifyError>
    where
        P: IntoIterator<Item = ExecutionPhase>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        let trigger_phases: BTreeSet<_> = phases.into_iter().collect();
        if trigger_phases.is_empty() {
            return Err(NotifyError::invalid_rule(format!(
                "{channel} rule must trigger on at least one phase"
            )));
        }

        let recipients = recipients
            .into_iter()
            .map(|r| validate_recipient(channel, r.into()))
            .collect::<Result<Vec<_>, _>>()?;
        if recipients.is_empty() {
            return Err(NotifyError::invalid_rule(format!(
                "{channel} rule must name at least one recipient"
            )));
        }

        Ok(Self {
            trigger_phases,
            channel,
            recipients,
        })
    }

    /// Email rule; recipients are email addresses.
    pub fn email<P, R>(phases: P, recipients: R) -> Result<Self, NotifyError>
    where
        P: IntoIterator<Item = ExecutionPhase>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self::new(ChannelKind::Email, phases, recipients)
    }

    /// Slack rule; recipients are channel or user handles.
    pub fn slack<P, R>(phases: P, recipients: R) -> Result<Self, NotifyError>
    where
        P: IntoIterator<Item = ExecutionPhase>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self::new(ChannelKind::Slack, phases, recipients)
    }

    /// PagerDuty rule; recipients are integration (routing) keys.
    pub fn pager_duty<P, R>(phases: P, recipients: R) -> Result<Self, NotifyError>
    where
        P: IntoIterator<Item = ExecutionPhase>,
        R: IntoIterator,
        R::Item: Into<String>,
    {
        Self::new(ChannelKind::PagerDuty, phases, recipients)
    }

    pub fn trigger_phases(&self) -> &BTreeSet<ExecutionPhase> {
        &self.trigger_phases
    }

    pub fn channel(&self) -> ChannelKind {
        self.channel
    }

    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    /// Returns `true` if this rule fires for `phase`.
    pub fn triggers_on(&self, phase: ExecutionPhase) -> bool {
        self.trigger_phases.contains(&phase)
    }
}

fn validate_recipient(channel: ChannelKind, value: String) -> Result<Recipient, NotifyError> {
    let invalid = |why: &str| {
        NotifyError::invalid_rule(format!("{channel} recipient '{value}' {why}"))
    };

    if value.trim().is_empty() {
        return Err(invalid("is empty"));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(invalid("contains whitespace"));
    }
    if channel == ChannelKind::Email {
        match value.split_once('@') {
            Some((local, domain))
                if !local.is_empty() && !domain.is_empty() && !domain.contains('@') => {}
            _ => return Err(invalid("is not an email address")),
        }
    }

    Recipient::new(value.clone()).ok_or_else(|| invalid("is empty"))
}

// ---------------------------------------------------------------------------
// Wire form
// ---------------------------------------------------------------------------

/// Serialised shape of a rule:
///
/// ```toml
/// channel = "email"
/// phases = ["FAILED", "TIMED_OUT"]
/// recipients = ["oncall@example.com"]
/// ```
#[derive(Serialize, Deserialize)]
struct RuleSpec {
    channel: ChannelKind,
    phases: Vec<ExecutionPhase>,
    recipients: Vec<String>,
}

impl TryFrom<RuleSpec> for NotificationRule {
    type Error = NotifyError;

    fn try_from(spec: RuleSpec) -> Result<Self, Self::Error> {
        NotificationRule::new(spec.channel, spec.phases, spec.recipients)
    }
}

impl From<NotificationRule> for RuleSpec {
    fn from(rule: NotificationRule) -> Self {
        RuleSpec {
            channel: rule.channel,
            phases: rule.trigger_phases.into_iter().collect(),
            recipients: rule.recipients.into_iter().map(String::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;
    use crate::ExecutionPhase::*;

    #[test]
    fn email_rule_keeps_recipient_order() {
        let rule =
            NotificationRule::email([Failed], ["me@example.com", "you@example.com"]).unwrap();
        let recipients: Vec<_> = rule.recipients().iter().map(Recipient::as_str).collect();
        assert_eq!(recipients, ["me@example.com", "you@example.com"]);
        assert!(rule.triggers_on(Failed));
        assert!(!rule.triggers_on(Succeeded));
    }

    #[test]
    fn rule_without_phases_is_rejected() {
        let err = NotificationRule::slack(Vec::<ExecutionPhase>::new(), ["#alerts"]).unwrap_err();
        assert_matches!(err, NotifyError::InvalidRule { .. });
    }

    #[test]
    fn rule_without_recipients_is_rejected() {
        let err = NotificationRule::pager_duty([Failed], Vec::<String>::new()).unwrap_err();
        assert!(err.to_string().contains("at least one recipient"));
    }

    #[test]
    fn email_recipient_must_look_like_an_address() {
        for bad in ["admin", "@example.com", "admin@", "a@b@c", "a b@example.com"] {
            assert!(
                NotificationRule::email([Succeeded], [bad]).is_err(),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn slack_handle_does_not_need_an_at_sign() {
        assert!(NotificationRule::slack([Aborted], ["#data-eng"]).is_ok());
    }

    #[test]
    fn duplicate_phases_collapse() {
        let rule = NotificationRule::slack([Failed, Failed, TimedOut], ["#ops"]).unwrap();
        assert_eq!(rule.trigger_phases().len(), 2);
    }

    #[test]
    fn deserialisation_runs_validation() {
        let ok: NotificationRule = serde_json::from_str(
            r#"{"channel":"email","phases":["SUCCEEDED"],"recipients":["admin@example.com"]}"#,
        )
        .unwrap();
        assert_eq!(ok.channel(), ChannelKind::Email);

        let bad = serde_json::from_str::<NotificationRule>(
            r#"{"channel":"email","phases":["SUCCEEDED"],"recipients":["not-an-address"]}"#,
        );
        assert!(bad.is_err());
    }
}
