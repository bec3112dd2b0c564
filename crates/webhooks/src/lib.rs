//! HTTP transports for Bellwether.
//!
//! Implements [`notifications::SlackTransport`] over Slack incoming webhooks
//! and [`notifications::PagerDutyTransport`] over the PagerDuty Events API
//! v2. Both issue exactly one request per call; retries belong to the
//! delivery queue, which reads the [`notifications::RetryPolicy`] attached to
//! each failure.
//!
//! ## Architectural Layer
//!
//! **Infrastructure adapter.** Depends on `notifications` for the port
//! traits only.

pub mod client;
pub mod error;
pub mod pagerduty;
pub mod slack;

pub use client::{build_client, REQUEST_TIMEOUT};
pub use error::WebhookError;
pub use pagerduty::PagerDutyEventsTransport;
pub use slack::SlackWebhookTransport;
