//! Shared value types for the notification domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! the execution facts that rules are matched against and templates are
//! rendered from.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ExecutionId, LaunchPlanName, WorkflowName};

// ---------------------------------------------------------------------------
// Phases
// ---------------------------------------------------------------------------

/// Terminal phase of a workflow execution.
///
/// Once an execution is assigned one of these phases it never transitions
/// again, which is what makes the phase a safe notification trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionPhase {
    Succeeded,
    Failed,
    TimedOut,
    Aborted,
}

impl ExecutionPhase {
    /// Every terminal phase, in declaration order.
    pub const ALL: [ExecutionPhase; 4] = [
        ExecutionPhase::Succeeded,
        ExecutionPhase::Failed,
        ExecutionPhase::TimedOut,
        ExecutionPhase::Aborted,
    ];

    /// Wire name (`"SUCCEEDED"`, `"TIMED_OUT"`, ...).
    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionPhase::Succeeded => "SUCCEEDED",
            ExecutionPhase::Failed => "FAILED",
            ExecutionPhase::TimedOut => "TIMED_OUT",
            ExecutionPhase::Aborted => "ABORTED",
        }
    }

    /// Lower-case form substituted for the `phase` template placeholder.
    pub fn template_name(self) -> &'static str {
        match self {
            ExecutionPhase::Succeeded => "succeeded",
            ExecutionPhase::Failed => "failed",
            ExecutionPhase::TimedOut => "timed_out",
            ExecutionPhase::Aborted => "aborted",
        }
    }

    /// Returns `true` for phases that represent an unsuccessful outcome.
    pub fn is_failure(self) -> bool {
        !matches!(self, ExecutionPhase::Succeeded)
    }
}

impl std::fmt::Display for ExecutionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionPhase {
    type Err = String;

    /// Accepts the wire name in any case, with `-` or `_` as separator.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalised = s.trim().to_ascii_uppercase().replace('-', "_");
        ExecutionPhase::ALL
            .into_iter()
            .find(|phase| phase.as_str() == normalised)
            .ok_or_else(|| format!("'{s}' is not a terminal execution phase"))
    }
}

// ---------------------------------------------------------------------------
// Channels
// ---------------------------------------------------------------------------

/// The transport a notification rule delivers through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    Email,
    Slack,
    PagerDuty,
}

impl ChannelKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ChannelKind::Email => "email",
            ChannelKind::Slack => "slack",
            ChannelKind::PagerDuty => "pager_duty",
        }
    }
}

impl std::fmt::Display for ChannelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Execution metadata
// ---------------------------------------------------------------------------

/// Workflow definition an execution ran.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRef {
    pub name: WorkflowName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Launch plan that started an execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchPlanRef {
    pub name: LaunchPlanName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// Everything known about a terminated execution that a notification may
/// mention.
///
/// Treated as already validated: it is produced by the workflow engine, not
/// by end users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionMetadata {
    pub id: ExecutionId,
    pub phase: ExecutionPhase,
    pub workflow: WorkflowRef,
    pub launch_plan: LaunchPlanRef,

    /// Error message reported by the engine, normally only for `FAILED`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn phase_parses_loosely() {
        assert_eq!("timed-out".parse::<ExecutionPhase>(), Ok(ExecutionPhase::TimedOut));
        assert_eq!("SUCCEEDED".parse::<ExecutionPhase>(), Ok(ExecutionPhase::Succeeded));
        assert!("RUNNING".parse::<ExecutionPhase>().is_err());
    }

    #[test]
    fn phase_wire_format_is_screaming_snake_case() {
        let json = serde_json::to_string(&ExecutionPhase::TimedOut).unwrap();
        assert_eq!(json, "\"TIMED_OUT\"");
        assert_eq!(ExecutionPhase::TimedOut.template_name(), "timed_out");
    }

    #[test]
    fn channel_kind_wire_format() {
        let kind: ChannelKind = serde_json::from_str("\"pager_duty\"").unwrap();
        assert_eq!(kind, ChannelKind::PagerDuty);
    }
}
