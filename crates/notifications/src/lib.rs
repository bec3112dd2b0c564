//! Core notification domain for Bellwether.
//!
//! This crate contains every domain concept used to decide who hears about a
//! terminated workflow execution: phases, notification rules, launch plans,
//! rule matching, message templates, retry policy, and the port traits that
//! transports and event sources implement. Infrastructure crates implement
//! the traits defined here; they never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`ProjectName`, `ExecutionId`, `RuleKey`, ...) |
//! | [`types`] | Phases, channels, execution metadata, timestamps |
//! | [`rule`] | Validated [`NotificationRule`] |
//! | [`launch_plan`] | [`LaunchPlan`], [`PhaseTransition`], [`NotificationEvent`] |
//! | [`matcher`] | Phase → matching rules |
//! | [`template`] | `{{ placeholder }}` templates |
//! | [`retry`] | Back-off schedule |
//! | [`ports`] | Transport, dead-letter, and event-source traits |
//! | [`config`] | `[notifications]` configuration types |
//! | [`errors`] | Error and retry-policy types |

pub mod config;
pub mod errors;
pub mod identifiers;
pub mod launch_plan;
pub mod matcher;
pub mod ports;
pub mod retry;
pub mod rule;
pub mod template;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use config::{
    BackendKind, ConfigFile, DeliveryConfig, EmailerConfig, NotificationsConfig, PagerDutyConfig,
    RenderSettings, SlackConfig, SmtpConfig, SmtpTls,
};
pub use errors::{NotifyError, RetryPolicy, SourceError, TemplateError, TransportError};
pub use identifiers::{
    DeliveryId, DomainName, ExecutionId, ExecutionName, LaunchPlanName, ProjectName, Recipient,
    RuleKey, WorkflowName,
};
pub use launch_plan::{LaunchPlan, NotificationEvent, PhaseTransition};
pub use matcher::{match_rules, MatchedRule};
pub use ports::{
    AlertSeverity, DeadLetter, DeadLetterReason, DeadLetterSink, EmailMessage, EmailTransport,
    OutboundMessage, PagerDutyAlert, PagerDutyTransport, SlackMessage, SlackTransport,
    TransitionSource,
};
pub use retry::RetrySchedule;
pub use rule::NotificationRule;
pub use template::Template;
pub use types::{
    ChannelKind, ExecutionMetadata, ExecutionPhase, LaunchPlanRef, Timestamp, WorkflowRef,
};
