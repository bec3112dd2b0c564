//! Channel dispatcher: turns a notification event into transport calls.
//!
//! [`ChannelDispatcher::prepare`] renders the configured templates and
//! produces one [`OutboundMessage`] per recipient; [`ChannelDispatcher::send`]
//! performs exactly one transport call for one message. Retrying is the
//! delivery queue's job, so a recipient that already succeeded is never sent
//! to again when a sibling recipient is retried.

use std::sync::Arc;

use notifications::{
    AlertSeverity, ChannelKind, EmailMessage, EmailTransport, NotificationEvent, NotifyError,
    OutboundMessage, PagerDutyAlert, PagerDutyTransport, RenderSettings, SlackMessage,
    SlackTransport, TransportError,
};

/// Renders notification events and routes them to the matching transport.
///
/// Transports are optional: a rule whose channel has no transport fails with
/// [`NotifyError::Configuration`] without affecting other rules.
pub struct ChannelDispatcher {
    settings: RenderSettings,
    email: Option<Arc<dyn EmailTransport>>,
    slack: Option<Arc<dyn SlackTransport>>,
    pager_duty: Option<Arc<dyn PagerDutyTransport>>,
}

impl ChannelDispatcher {
    /// Creates a dispatcher with no transports attached.
    pub fn new(settings: RenderSettings) -> Self {
        Self {
            settings,
            email: None,
            slack: None,
            pager_duty: None,
        }
    }

    pub fn with_email(mut self, transport: Arc<dyn EmailTransport>) -> Self {
        self.email = Some(transport);
        self
    }

    pub fn with_slack(mut self, transport: Arc<dyn SlackTransport>) -> Self {
        self.slack = Some(transport);
        self
    }

    pub fn with_pager_duty(mut self, transport: Arc<dyn PagerDutyTransport>) -> Self {
        self.pager_duty = Some(transport);
        self
    }

    /// Returns `true` if a transport is attached for `channel`.
    pub fn has_transport(&self, channel: ChannelKind) -> bool {
        match channel {
            ChannelKind::Email => self.email.is_some(),
            ChannelKind::Slack => self.slack.is_some(),
            ChannelKind::PagerDuty => self.pager_duty.is_some(),
        }
    }

    /// Renders `event` into one message per recipient, in recipient order.
    pub fn prepare(&self, event: &NotificationEvent) -> Result<Vec<OutboundMessage>, NotifyError> {
        let channel = event.rule.channel();
        if !self.has_transport(channel) {
            return Err(NotifyError::configuration(format!(
                "no {channel} transport is configured (rule {})",
                event.rule_key
            )));
        }

        let execution = &event.execution;
        let recipients = event.rule.recipients().iter().cloned();
        let messages = match channel {
            ChannelKind::Email => {
                let subject = self.settings.email_subject.render(execution);
                let body = self.settings.email_body.render(execution);
                recipients
                    .map(|recipient| {
                        OutboundMessage::Email(EmailMessage {
                            sender: self.settings.sender.clone(),
                            recipients: vec![recipient],
                            subject: subject.clone(),
                            body: body.clone(),
                            html: self.settings.html,
                        })
                    })
                    .collect()
            }
            ChannelKind::Slack => {
                let text = self.settings.slack_message.render(execution);
                recipients
                    .map(|channel| {
                        OutboundMessage::Slack(SlackMessage {
                            channel,
                            text: text.clone(),
                        })
                    })
                    .collect()
            }
            ChannelKind::PagerDuty => {
                let summary = self.settings.pager_duty_summary.render(execution);
                let dedup_key = format!("{}:{}", execution.id, execution.phase);
                recipients
                    .map(|integration_key| {
                        OutboundMessage::PagerDuty(PagerDutyAlert {
                            integration_key,
                            summary: summary.clone(),
                            severity: AlertSeverity::for_phase(execution.phase),
                            dedup_key: dedup_key.clone(),
                        })
                    })
                    .collect()
            }
        };
        Ok(messages)
    }

    /// Performs exactly one transport call for `message`.
    pub async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let missing = |channel: ChannelKind| {
            TransportError::permanent(channel, format!("no {channel} transport is configured"))
        };

        match message {
            OutboundMessage::Email(m) => match &self.email {
                Some(t) => t.send_email(m).await,
                None => Err(missing(ChannelKind::Email)),
            },
            OutboundMessage::Slack(m) => match &self.slack {
                Some(t) => t.post_message(m).await,
                None => Err(missing(ChannelKind::Slack)),
            },
            OutboundMessage::PagerDuty(m) => match &self.pager_duty {
                Some(t) => t.trigger(m).await,
                None => Err(missing(ChannelKind::PagerDuty)),
            },
        }
    }
}
