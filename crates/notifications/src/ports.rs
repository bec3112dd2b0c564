//! Port traits implemented by infrastructure crates.
//!
//! The dispatcher talks to transports only through these traits; SMTP, HTTP
//! and file formats stay in the adapter crates.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    ChannelKind, DeliveryId, ExecutionId, ExecutionPhase, NotifyError, PhaseTransition,
    Recipient, RuleKey, SourceError, Timestamp, TransportError,
};

// ---------------------------------------------------------------------------
// Outbound messages
// ---------------------------------------------------------------------------

/// A rendered email ready for sending.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailMessage {
    pub sender: String,
    pub recipients: Vec<Recipient>,
    pub subject: String,
    pub body: String,
    /// Send the body as `text/html` instead of `text/plain`.
    pub html: bool,
}

/// A rendered Slack post for one channel or user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlackMessage {
    pub channel: Recipient,
    pub text: String,
}

/// Severity attached to a PagerDuty trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Error,
    Warning,
    Info,
}

impl AlertSeverity {
    /// Default severity mapping for a terminal phase.
    pub fn for_phase(phase: ExecutionPhase) -> Self {
        match phase {
            ExecutionPhase::Failed | ExecutionPhase::TimedOut => AlertSeverity::Error,
            ExecutionPhase::Aborted => AlertSeverity::Warning,
            ExecutionPhase::Succeeded => AlertSeverity::Info,
        }
    }
}

/// A rendered PagerDuty trigger for one integration key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagerDutyAlert {
    pub integration_key: Recipient,
    pub summary: String,
    pub severity: AlertSeverity,
    /// Groups repeated alerts for the same execution and phase.
    pub dedup_key: String,
}

/// One transport call, as produced by the dispatcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutboundMessage {
    Email(EmailMessage),
    Slack(SlackMessage),
    PagerDuty(PagerDutyAlert),
}

impl OutboundMessage {
    pub fn channel(&self) -> ChannelKind {
        match self {
            OutboundMessage::Email(_) => ChannelKind::Email,
            OutboundMessage::Slack(_) => ChannelKind::Slack,
            OutboundMessage::PagerDuty(_) => ChannelKind::PagerDuty,
        }
    }

    /// The single recipient this call addresses.
    pub fn recipient(&self) -> Option<&Recipient> {
        match self {
            OutboundMessage::Email(m) => m.recipients.first(),
            OutboundMessage::Slack(m) => Some(&m.channel),
            OutboundMessage::PagerDuty(m) => Some(&m.integration_key),
        }
    }
}

// ---------------------------------------------------------------------------
// Transports
// ---------------------------------------------------------------------------

/// Sends rendered emails.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), TransportError>;
}

/// Posts rendered Slack messages.
#[async_trait]
pub trait SlackTransport: Send + Sync {
    async fn post_message(&self, message: &SlackMessage) -> Result<(), TransportError>;
}

/// Triggers PagerDuty incidents.
#[async_trait]
pub trait PagerDutyTransport: Send + Sync {
    async fn trigger(&self, alert: &PagerDutyAlert) -> Result<(), TransportError>;
}

// ---------------------------------------------------------------------------
// Dead letters
// ---------------------------------------------------------------------------

/// Why a delivery ended on the dead-letter path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeadLetterReason {
    /// A transport or credential needed by the rule is not configured.
    Configuration,
    /// Every allowed attempt failed with a retryable error.
    RetriesExhausted,
    /// The transport rejected the message with a non-retryable error.
    Rejected,
}

/// A notification that could not be delivered, kept for operator attention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub delivery_id: DeliveryId,
    pub execution_id: ExecutionId,
    pub phase: ExecutionPhase,
    pub rule_key: RuleKey,
    pub channel: ChannelKind,
    /// `None` when the whole rule failed before any recipient was addressed.
    pub recipient: Option<Recipient>,
    pub reason: DeadLetterReason,
    pub attempts: u32,
    pub error: String,
    pub recorded_at: Timestamp,
}

/// Operator-visible destination for undeliverable notifications.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
    async fn record(&self, letter: &DeadLetter) -> Result<(), NotifyError>;
}

// ---------------------------------------------------------------------------
// Event sources
// ---------------------------------------------------------------------------

/// Supplies phase transitions reported by the workflow engine.
#[async_trait]
pub trait TransitionSource: Send {
    /// Returns the next transition, or `None` once the source is exhausted.
    async fn next_transition(&mut self) -> Result<Option<PhaseTransition>, SourceError>;
}
