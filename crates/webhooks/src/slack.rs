//! Slack incoming-webhook transport.

use async_trait::async_trait;
use notifications::{ChannelKind, SlackMessage, SlackTransport, TransportError};
use serde::Serialize;

use crate::client::{build_client, post_json};
use crate::error::WebhookError;

/// Posts messages to one Slack incoming webhook.
///
/// The rule's recipient is sent as the `channel` field so a single webhook
/// can address several channels or users.
pub struct SlackWebhookTransport {
    client: reqwest::Client,
    webhook_url: String,
}

#[derive(Debug, Serialize)]
struct SlackPayload<'a> {
    channel: &'a str,
    text: &'a str,
}

impl SlackWebhookTransport {
    pub fn new(webhook_url: impl Into<String>) -> Result<Self, WebhookError> {
        Ok(Self::with_client(build_client()?, webhook_url))
    }

    pub fn with_client(client: reqwest::Client, webhook_url: impl Into<String>) -> Self {
        Self {
            client,
            webhook_url: webhook_url.into(),
        }
    }
}

#[async_trait]
impl SlackTransport for SlackWebhookTransport {
    async fn post_message(&self, message: &SlackMessage) -> Result<(), TransportError> {
        let payload = SlackPayload {
            channel: message.channel.as_str(),
            text: &message.text,
        };
        post_json(&self.client, &self.webhook_url, &payload)
            .await
            .map_err(|e| e.into_transport_error(ChannelKind::Slack))?;
        tracing::debug!(channel = %message.channel, "Slack message posted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_names_channel_and_text() {
        let payload = SlackPayload {
            channel: "#ops",
            text: "Execution has failed.",
        };
        assert_eq!(
            serde_json::to_value(&payload).unwrap(),
            serde_json::json!({ "channel": "#ops", "text": "Execution has failed." })
        );
    }

    #[test]
    fn new_does_not_panic() {
        let _transport =
            SlackWebhookTransport::new("https://hooks.slack.com/services/T/B/X").unwrap();
    }
}
