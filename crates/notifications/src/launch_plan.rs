//! Launch plans, the phase-transition record, and notification events.
//!
//! A [`LaunchPlan`] owns the notification rules declared with it. When an
//! execution started from that launch plan terminates, the workflow engine
//! reports a [`PhaseTransition`]; each rule that matches the phase becomes
//! one [`NotificationEvent`] on the delivery queue.

use serde::{Deserialize, Serialize};

use crate::matcher::match_rules;
use crate::{
    DeliveryId, DomainName, ExecutionId, ExecutionMetadata, ExecutionName, ExecutionPhase,
    LaunchPlanName, LaunchPlanRef, NotificationRule, ProjectName, RuleKey, Timestamp,
    WorkflowRef,
};

// ---------------------------------------------------------------------------
// LaunchPlan
// ---------------------------------------------------------------------------

/// A named binding of a workflow to its notification rules.
///
/// Schedules and default inputs are owned by the workflow engine; only the
/// parts that notifications depend on are modelled here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchPlan {
    pub project: ProjectName,
    pub domain: DomainName,
    pub name: LaunchPlanName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    pub workflow: WorkflowRef,
    #[serde(default)]
    pub notifications: Vec<NotificationRule>,
}

impl LaunchPlan {
    /// Builds the transition record for an execution of this launch plan
    /// that reached `phase`.
    pub fn terminated(
        &self,
        execution: ExecutionName,
        phase: ExecutionPhase,
        error: Option<String>,
    ) -> PhaseTransition {
        PhaseTransition {
            execution: ExecutionMetadata {
                id: ExecutionId::new(self.project.clone(), self.domain.clone(), execution),
                phase,
                workflow: self.workflow.clone(),
                launch_plan: LaunchPlanRef {
                    name: self.name.clone(),
                    version: self.version.clone(),
                },
                error,
            },
            notifications: self.notifications.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// PhaseTransition
// ---------------------------------------------------------------------------

/// Input from the workflow engine: an execution entered a terminal phase.
///
/// Carries a snapshot of the launch plan's rules so the dispatcher never has
/// to look the launch plan up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseTransition {
    pub execution: ExecutionMetadata,
    #[serde(default)]
    pub notifications: Vec<NotificationRule>,
}

impl PhaseTransition {
    /// Identity of the rule at `index` on this execution's launch plan.
    pub fn rule_key(&self, index: usize) -> RuleKey {
        RuleKey {
            project: self.execution.id.project.clone(),
            domain: self.execution.id.domain.clone(),
            launch_plan: self.execution.launch_plan.name.clone(),
            index,
        }
    }

    /// One event per rule that matches the execution's phase, in
    /// declaration order.
    pub fn events(&self) -> Vec<NotificationEvent> {
        match_rules(self.execution.phase, &self.notifications)
            .into_iter()
            .map(|matched| NotificationEvent {
                delivery_id: DeliveryId::new_random(),
                rule_key: self.rule_key(matched.index),
                rule: matched.rule.clone(),
                execution: self.execution.clone(),
                enqueued_at: Timestamp::now(),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// NotificationEvent
// ---------------------------------------------------------------------------

/// One matched rule for one terminated execution, waiting for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationEvent {
    pub delivery_id: DeliveryId,
    pub rule_key: RuleKey,
    /// Snapshot of the rule taken when the event was produced.
    pub rule: NotificationRule,
    pub execution: ExecutionMetadata,
    pub enqueued_at: Timestamp,
}

impl NotificationEvent {
    pub fn execution_id(&self) -> &ExecutionId {
        &self.execution.id
    }

    pub fn phase(&self) -> ExecutionPhase {
        self.execution.phase
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ExecutionPhase::*;
    use crate::{ChannelKind, WorkflowName};

    fn launch_plan() -> LaunchPlan {
        LaunchPlan {
            project: ProjectName::new("flytesnacks").unwrap(),
            domain: DomainName::new("development").unwrap(),
            name: LaunchPlanName::new("wacky_int_doubler").unwrap(),
            version: Some("v3".into()),
            workflow: WorkflowRef {
                name: WorkflowName::new("int_doubler_wf").unwrap(),
                version: Some("v3".into()),
            },
            notifications: vec![
                NotificationRule::email([Failed], ["me@example.com", "you@example.com"]).unwrap(),
                NotificationRule::slack([Succeeded, Aborted, TimedOut], ["team@slack"]).unwrap(),
            ],
        }
    }

    #[test]
    fn events_carry_rule_identity() {
        let transition =
            launch_plan().terminated(ExecutionName::new("abc").unwrap(), Succeeded, None);
        let events = transition.events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].rule.channel(), ChannelKind::Slack);
        assert_eq!(events[0].rule_key.index, 1);
        assert_eq!(events[0].rule_key.to_string(), "flytesnacks/development/wacky_int_doubler#1");
        assert_eq!(events[0].execution_id().to_string(), "flytesnacks/development/abc");
    }

    #[test]
    fn each_event_gets_its_own_delivery_id() {
        let mut plan = launch_plan();
        plan.notifications
            .push(NotificationRule::pager_duty([Succeeded], ["routing-key"]).unwrap());
        let events = plan
            .terminated(ExecutionName::new("abc").unwrap(), Succeeded, None)
            .events();
        assert_eq!(events.len(), 2);
        assert_ne!(events[0].delivery_id, events[1].delivery_id);
    }

    #[test]
    fn transition_deserialises_from_engine_json() {
        let json = r#"{
            "execution": {
                "id": {"project": "flytesnacks", "domain": "development", "name": "f3a9c2"},
                "phase": "FAILED",
                "workflow": {"name": "int_doubler_wf"},
                "launch_plan": {"name": "int_doubler_wf_scheduled", "version": "v1"},
                "error": "division by zero"
            },
            "notifications": [
                {"channel": "pager_duty", "phases": ["FAILED", "TIMED_OUT"], "recipients": ["abc123"]}
            ]
        }"#;
        let transition: PhaseTransition = serde_json::from_str(json).unwrap();
        assert_eq!(transition.execution.phase, Failed);
        assert_eq!(transition.events().len(), 1);
    }
}
