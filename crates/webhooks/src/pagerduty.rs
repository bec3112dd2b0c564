//! PagerDuty Events API v2 transport.
//!
//! Each alert becomes one `trigger` event routed by the rule's integration
//! key. The dedup key groups repeats for the same execution and phase, so a
//! retried trigger does not open a second incident.

use async_trait::async_trait;
use notifications::{AlertSeverity, ChannelKind, PagerDutyAlert, PagerDutyTransport, TransportError};
use serde::Serialize;

use crate::client::{build_client, post_json};
use crate::error::WebhookError;

/// PagerDuty rejects summaries longer than this.
pub const MAX_SUMMARY_CHARS: usize = 1024;

/// Sends trigger events to the PagerDuty Events API.
pub struct PagerDutyEventsTransport {
    client: reqwest::Client,
    events_url: String,
    source: String,
}

#[derive(Debug, Serialize)]
struct EventPayload<'a> {
    routing_key: &'a str,
    event_action: &'static str,
    dedup_key: &'a str,
    payload: AlertBody<'a>,
}

#[derive(Debug, Serialize)]
struct AlertBody<'a> {
    summary: String,
    source: &'a str,
    severity: AlertSeverity,
}

impl PagerDutyEventsTransport {
    pub fn new(
        events_url: impl Into<String>,
        source: impl Into<String>,
    ) -> Result<Self, WebhookError> {
        Ok(Self::with_client(build_client()?, events_url, source))
    }

    pub fn with_client(
        client: reqwest::Client,
        events_url: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            client,
            events_url: events_url.into(),
            source: source.into(),
        }
    }

    fn event<'a>(&'a self, alert: &'a PagerDutyAlert) -> EventPayload<'a> {
        EventPayload {
            routing_key: alert.integration_key.as_str(),
            event_action: "trigger",
            dedup_key: &alert.dedup_key,
            payload: AlertBody {
                summary: alert.summary.chars().take(MAX_SUMMARY_CHARS).collect(),
                source: &self.source,
                severity: alert.severity,
            },
        }
    }
}

#[async_trait]
impl PagerDutyTransport for PagerDutyEventsTransport {
    async fn trigger(&self, alert: &PagerDutyAlert) -> Result<(), TransportError> {
        post_json(&self.client, &self.events_url, &self.event(alert))
            .await
            .map_err(|e| e.into_transport_error(ChannelKind::PagerDuty))?;
        tracing::debug!(dedup_key = %alert.dedup_key, "PagerDuty event triggered");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use notifications::Recipient;

    use super::*;

    fn alert(summary: String) -> PagerDutyAlert {
        PagerDutyAlert {
            integration_key: Recipient::new("abc123").unwrap(),
            summary,
            severity: AlertSeverity::Error,
            dedup_key: "flytesnacks/development/f3a9:FAILED".into(),
        }
    }

    fn transport() -> PagerDutyEventsTransport {
        PagerDutyEventsTransport::with_client(reqwest::Client::new(), "http://unused", "bellwether")
    }

    #[test]
    fn event_follows_events_v2_shape() {
        let transport = transport();
        let alert = alert("Execution failed.".into());

        let value = serde_json::to_value(transport.event(&alert)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "routing_key": "abc123",
                "event_action": "trigger",
                "dedup_key": "flytesnacks/development/f3a9:FAILED",
                "payload": {
                    "summary": "Execution failed.",
                    "source": "bellwether",
                    "severity": "error",
                },
            })
        );
    }

    #[test]
    fn long_summary_is_truncated() {
        let transport = transport();
        let alert = alert("é".repeat(MAX_SUMMARY_CHARS + 10));

        let event = transport.event(&alert);
        assert_eq!(event.payload.summary.chars().count(), MAX_SUMMARY_CHARS);
    }
}
