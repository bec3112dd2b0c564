//! Builds concrete transports and sinks from configuration.

use std::sync::Arc;

use anyhow::{Context, Result};
use delivery::{
    ChannelDispatcher, FanoutDeadLetters, JsonLinesDeadLetters, NoopTransport, TracingDeadLetters,
};
use email::SmtpEmailTransport;
use notifications::{BackendKind, ChannelKind, DeadLetterSink, NotificationsConfig};
use webhooks::{PagerDutyEventsTransport, SlackWebhookTransport};

/// Creates the dispatcher with every transport the configuration allows.
///
/// With `type = "local"`, a channel whose credentials are absent gets no
/// transport; its rules are then dead-lettered as misconfigured while the
/// other channels keep delivering.
pub fn build_dispatcher(config: &NotificationsConfig) -> Result<ChannelDispatcher> {
    let settings = config.render_settings()?;
    let dispatcher = ChannelDispatcher::new(settings);

    match config.kind {
        BackendKind::Noop => {
            let noop = Arc::new(NoopTransport);
            Ok(dispatcher
                .with_email(noop.clone())
                .with_slack(noop.clone())
                .with_pager_duty(noop))
        }
        BackendKind::Local => {
            let mut dispatcher = dispatcher;

            match &config.emailer.smtp {
                Some(smtp) => {
                    let transport = SmtpEmailTransport::new(smtp)
                        .with_context(|| format!("failed to configure SMTP relay {}", smtp.host))?;
                    dispatcher = dispatcher.with_email(Arc::new(transport));
                }
                None => warn_missing(ChannelKind::Email, "no [notifications.emailer.smtp] table"),
            }

            match &config.slack.webhook_url {
                Some(url) => {
                    let transport = SlackWebhookTransport::new(url.as_str())
                        .context("failed to configure Slack webhook client")?;
                    dispatcher = dispatcher.with_slack(Arc::new(transport));
                }
                None => warn_missing(ChannelKind::Slack, "no webhook_url"),
            }

            let pager_duty = PagerDutyEventsTransport::new(
                config.pager_duty.events_url.as_str(),
                config.pager_duty.source.as_str(),
            )
            .context("failed to configure PagerDuty client")?;
            Ok(dispatcher.with_pager_duty(Arc::new(pager_duty)))
        }
    }
}

fn warn_missing(channel: ChannelKind, why: &str) {
    tracing::warn!(
        %channel,
        reason = why,
        "Transport not configured; matching notifications will be dead-lettered"
    );
}

/// Dead letters are always logged, and also appended to
/// `delivery.dead_letter_path` when set.
pub async fn build_dead_letters(config: &NotificationsConfig) -> Result<Arc<dyn DeadLetterSink>> {
    let Some(path) = &config.delivery.dead_letter_path else {
        return Ok(Arc::new(TracingDeadLetters));
    };

    let file = JsonLinesDeadLetters::open(path).await?;
    tracing::info!(path = %file.path().display(), "Writing dead letters to file");
    let sinks: Vec<Arc<dyn DeadLetterSink>> = vec![Arc::new(TracingDeadLetters), Arc::new(file)];
    Ok(Arc::new(FanoutDeadLetters::new(sinks)))
}

#[cfg(test)]
mod tests {
    use notifications::SmtpConfig;

    use super::*;

    #[test]
    fn noop_backend_attaches_every_channel() {
        let dispatcher = build_dispatcher(&NotificationsConfig::default()).unwrap();
        for channel in [ChannelKind::Email, ChannelKind::Slack, ChannelKind::PagerDuty] {
            assert!(dispatcher.has_transport(channel), "{channel}");
        }
    }

    #[test]
    fn local_backend_skips_unconfigured_channels() {
        let config = NotificationsConfig {
            kind: BackendKind::Local,
            ..NotificationsConfig::default()
        };
        let dispatcher = build_dispatcher(&config).unwrap();

        assert!(!dispatcher.has_transport(ChannelKind::Email));
        assert!(!dispatcher.has_transport(ChannelKind::Slack));
        assert!(dispatcher.has_transport(ChannelKind::PagerDuty));
    }

    #[test]
    fn local_backend_uses_configured_credentials() {
        let mut config = NotificationsConfig {
            kind: BackendKind::Local,
            ..NotificationsConfig::default()
        };
        config.emailer.smtp = Some(SmtpConfig {
            host: "smtp.example.com".into(),
            ..SmtpConfig::default()
        });
        config.slack.webhook_url = Some("https://hooks.slack.com/services/T/B/X".into());

        let dispatcher = build_dispatcher(&config).unwrap();
        assert!(dispatcher.has_transport(ChannelKind::Email));
        assert!(dispatcher.has_transport(ChannelKind::Slack));
    }

    #[test]
    fn smtp_password_without_username_fails_startup() {
        let mut config = NotificationsConfig {
            kind: BackendKind::Local,
            ..NotificationsConfig::default()
        };
        config.emailer.smtp = Some(SmtpConfig {
            host: "smtp.example.com".into(),
            password: Some("hunter2".into()),
            ..SmtpConfig::default()
        });

        let err = build_dispatcher(&config).err().unwrap();
        assert!(format!("{err:#}").contains("username is missing"), "{err:#}");
    }

    #[tokio::test]
    async fn dead_letter_file_is_opened_when_configured() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = NotificationsConfig::default();
        config.delivery.dead_letter_path = Some(dir.path().join("dead.jsonl"));

        build_dead_letters(&config).await.unwrap();
        assert!(dir.path().join("dead.jsonl").exists());
    }
}
