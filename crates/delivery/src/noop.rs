//! Transport that logs notifications instead of sending them.
//!
//! Used when the configuration selects `type = "noop"`, which is also the
//! default, so a fresh install never sends mail by accident.

use async_trait::async_trait;
use notifications::{
    EmailMessage, EmailTransport, PagerDutyAlert, PagerDutyTransport, SlackMessage,
    SlackTransport, TransportError,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopTransport;

#[async_trait]
impl EmailTransport for NoopTransport {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), TransportError> {
        let to: Vec<&str> = message.recipients.iter().map(|r| r.as_str()).collect();
        tracing::info!(
            to = ?to,
            sender = %message.sender,
            subject = %message.subject,
            "noop: email not sent"
        );
        Ok(())
    }
}

#[async_trait]
impl SlackTransport for NoopTransport {
    async fn post_message(&self, message: &SlackMessage) -> Result<(), TransportError> {
        tracing::info!(
            channel = %message.channel,
            text = %message.text,
            "noop: slack message not sent"
        );
        Ok(())
    }
}

#[async_trait]
impl PagerDutyTransport for NoopTransport {
    async fn trigger(&self, alert: &PagerDutyAlert) -> Result<(), TransportError> {
        tracing::info!(
            dedup_key = %alert.dedup_key,
            summary = %alert.summary,
            "noop: pagerduty alert not triggered"
        );
        Ok(())
    }
}
