//! Rule matching: which of a launch plan's rules fire for a terminal phase.

use crate::{ExecutionPhase, NotificationRule};

/// A rule selected by [`match_rules`], with its declaration index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchedRule<'a> {
    pub index: usize,
    pub rule: &'a NotificationRule,
}

/// Returns the rules whose trigger phases contain `phase`, in declaration
/// order.
///
/// An empty result is not an error: executions without a matching rule are
/// silently skipped.
pub fn match_rules(phase: ExecutionPhase, rules: &[NotificationRule]) -> Vec<MatchedRule<'_>> {
    rules
        .iter()
        .enumerate()
        .filter(|(_, rule)| rule.triggers_on(phase))
        .map(|(index, rule)| MatchedRule { index, rule })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ChannelKind;
    use crate::ExecutionPhase::*;

    fn wacky_rules() -> Vec<NotificationRule> {
        vec![
            NotificationRule::email([Failed], ["me@example.com", "you@example.com"]).unwrap(),
            NotificationRule::email([Succeeded], ["myboss@example.com"]).unwrap(),
            NotificationRule::slack([Succeeded, Aborted, TimedOut], ["myteam@slack.com"]).unwrap(),
        ]
    }

    #[test]
    fn matches_preserve_declaration_order() {
        let rules = wacky_rules();
        let matched = match_rules(Succeeded, &rules);
        let indices: Vec<_> = matched.iter().map(|m| m.index).collect();
        assert_eq!(indices, [1, 2]);
        assert_eq!(matched[1].rule.channel(), ChannelKind::Slack);
    }

    #[test]
    fn single_match_on_failure() {
        let rules = wacky_rules();
        let matched = match_rules(Failed, &rules);
        assert_eq!(matched.len(), 1);
        assert_eq!(matched[0].rule.recipients().len(), 2);
    }

    #[test]
    fn phase_outside_every_rule_matches_nothing() {
        let rules = vec![NotificationRule::pager_duty([Failed], ["routing-key"]).unwrap()];
        assert!(match_rules(Succeeded, &rules).is_empty());
        assert!(match_rules(Aborted, &[]).is_empty());
    }
}
