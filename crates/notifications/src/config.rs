//! Configuration types for the `[notifications]` table.
//!
//! Parsing lives here; reading the file from disk is the binary's job. Every
//! section has defaults, so an empty file yields a working no-op setup.
//!
//! ```toml
//! [notifications]
//! type = "local"
//!
//! [notifications.emailer]
//! sender = "notifications@company.com"
//! subject = "Notice: Execution \"{{ workflow.name }}\" has {{ phase }} in \"{{ domain }}\"."
//!
//! [notifications.emailer.smtp]
//! host = "smtp.company.com"
//!
//! [notifications.delivery]
//! workers = 4
//! max_attempts = 4
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::template::Template;
use crate::{NotifyError, RetrySchedule};

/// Default email subject.
pub const DEFAULT_EMAIL_SUBJECT: &str =
    "Notice: Execution \"{{ workflow.name }}\" has {{ phase }} in \"{{ domain }}\".";

/// Default email body.
pub const DEFAULT_EMAIL_BODY: &str =
    "Execution \"{{ workflow.name }} [{{ name }}]\" has {{ phase }} in \"{{ domain }}\".{{ error }}";

/// Default Slack message.
pub const DEFAULT_SLACK_MESSAGE: &str =
    "Execution \"{{ workflow.name }} [{{ name }}]\" has {{ phase }} in \"{{ project }}/{{ domain }}\".{{ error }}";

/// Default PagerDuty summary.
pub const DEFAULT_PAGER_DUTY_SUMMARY: &str =
    "Execution {{ project }}/{{ domain }}/{{ name }} of \"{{ workflow.name }}\" has {{ phase }}.{{ error }}";

/// PagerDuty Events API v2 endpoint.
pub const DEFAULT_PAGER_DUTY_EVENTS_URL: &str = "https://events.pagerduty.com/v2/enqueue";

const DEFAULT_SENDER: &str = "notifications@localhost";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_WORKERS: usize = 4;
const DEFAULT_QUEUE_CAPACITY: usize = 1024;
const DEFAULT_FIRED_LEDGER_CAPACITY: usize = 100_000;

/// Upper bound for any configured back-off, to keep `Duration` maths sane.
const MAX_BACKOFF_CEILING_MS: u64 = 24 * 60 * 60 * 1000;

// ---------------------------------------------------------------------------
// Top level
// ---------------------------------------------------------------------------

/// Root of the configuration file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub notifications: NotificationsConfig,
}

impl ConfigFile {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(source: &str) -> Result<Self, NotifyError> {
        let file: ConfigFile = toml::from_str(source)
            .map_err(|e| NotifyError::configuration(format!("invalid configuration: {e}")))?;
        file.notifications.validate()?;
        Ok(file)
    }
}

/// Which transports the process delivers through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Deliver through the configured SMTP, Slack, and PagerDuty transports.
    Local,
    /// Log every notification instead of sending it.
    #[default]
    Noop,
}

/// The `[notifications]` table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct NotificationsConfig {
    #[serde(rename = "type")]
    pub kind: BackendKind,
    pub emailer: EmailerConfig,
    pub slack: SlackConfig,
    pub pager_duty: PagerDutyConfig,
    pub delivery: DeliveryConfig,
}

impl NotificationsConfig {
    /// Checks templates and delivery tuning. Transport credentials are
    /// checked when transports are built, since `noop` needs none.
    pub fn validate(&self) -> Result<(), NotifyError> {
        self.render_settings()?;
        self.delivery.validate()
    }

    /// Parses every configured template.
    pub fn render_settings(&self) -> Result<RenderSettings, NotifyError> {
        let parse = |name: &str, source: &str| {
            Template::parse(source).map_err(|source| NotifyError::TemplateRender {
                template: name.to_string(),
                source,
            })
        };

        Ok(RenderSettings {
            sender: self.emailer.sender.clone(),
            html: self.emailer.html,
            email_subject: parse("emailer.subject", &self.emailer.subject)?,
            email_body: parse("emailer.body", &self.emailer.body)?,
            slack_message: parse("slack.message", &self.slack.message)?,
            pager_duty_summary: parse("pager_duty.summary", &self.pager_duty.summary)?,
        })
    }

    /// Applies secrets and endpoints supplied through the environment.
    ///
    /// | Variable | Overrides |
    /// |----------|-----------|
    /// | `BELLWETHER_SMTP_USERNAME` | `emailer.smtp.username` |
    /// | `BELLWETHER_SMTP_PASSWORD` | `emailer.smtp.password` |
    /// | `BELLWETHER_SLACK_WEBHOOK_URL` | `slack.webhook_url` |
    /// | `BELLWETHER_PAGERDUTY_EVENTS_URL` | `pager_duty.events_url` |
    ///
    /// SMTP variables only apply when an `[emailer.smtp]` table exists.
    pub fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(smtp) = self.emailer.smtp.as_mut() {
            if let Some(user) = lookup("BELLWETHER_SMTP_USERNAME") {
                smtp.username = Some(user);
            }
            if let Some(password) = lookup("BELLWETHER_SMTP_PASSWORD") {
                smtp.password = Some(password);
            }
        }
        if let Some(url) = lookup("BELLWETHER_SLACK_WEBHOOK_URL") {
            self.slack.webhook_url = Some(url);
        }
        if let Some(url) = lookup("BELLWETHER_PAGERDUTY_EVENTS_URL") {
            self.pager_duty.events_url = url;
        }
        self
    }
}

// ---------------------------------------------------------------------------
// Channel sections
// ---------------------------------------------------------------------------

/// The `[notifications.emailer]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EmailerConfig {
    pub sender: String,
    pub subject: String,
    pub body: String,
    /// Send the body as HTML.
    pub html: bool,
    /// SMTP relay. Without it, email rules dead-letter as misconfigured.
    pub smtp: Option<SmtpConfig>,
}

impl Default for EmailerConfig {
    fn default() -> Self {
        Self {
            sender: DEFAULT_SENDER.to_string(),
            subject: DEFAULT_EMAIL_SUBJECT.to_string(),
            body: DEFAULT_EMAIL_BODY.to_string(),
            html: false,
            smtp: None,
        }
    }
}

/// How the SMTP connection is secured.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SmtpTls {
    /// Plain connection upgraded with STARTTLS.
    #[default]
    Starttls,
    /// TLS from the first byte (SMTPS).
    Wrapper,
    /// No encryption. Only for local relays.
    None,
}

/// The `[notifications.emailer.smtp]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub tls: SmtpTls,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_SMTP_PORT,
            tls: SmtpTls::default(),
            username: None,
            password: None,
        }
    }
}

/// The `[notifications.slack]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SlackConfig {
    pub message: String,
    /// Incoming-webhook URL. Without it, Slack rules dead-letter as
    /// misconfigured.
    #[serde(skip_serializing)]
    pub webhook_url: Option<String>,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            message: DEFAULT_SLACK_MESSAGE.to_string(),
            webhook_url: None,
        }
    }
}

/// The `[notifications.pager_duty]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PagerDutyConfig {
    pub summary: String,
    pub events_url: String,
    /// Value of the alert's `source` field.
    pub source: String,
}

impl Default for PagerDutyConfig {
    fn default() -> Self {
        Self {
            summary: DEFAULT_PAGER_DUTY_SUMMARY.to_string(),
            events_url: DEFAULT_PAGER_DUTY_EVENTS_URL.to_string(),
            source: "bellwether".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Delivery tuning
// ---------------------------------------------------------------------------

/// The `[notifications.delivery]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DeliveryConfig {
    /// Number of consumer tasks (queue shards).
    pub workers: usize,
    /// Buffered events per shard before `enqueue` waits.
    pub queue_capacity: usize,
    /// Most (execution, phase, rule) triples remembered for duplicate
    /// suppression. The oldest entry is forgotten first.
    pub fired_ledger_capacity: usize,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
    pub backoff_multiplier: f64,
    pub max_backoff_ms: u64,
    /// Append dead letters to this JSON-lines file in addition to logging.
    pub dead_letter_path: Option<PathBuf>,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            fired_ledger_capacity: DEFAULT_FIRED_LEDGER_CAPACITY,
            max_attempts: RetrySchedule::DEFAULT_MAX_ATTEMPTS,
            initial_backoff_ms: RetrySchedule::DEFAULT_INITIAL_BACKOFF.as_millis() as u64,
            backoff_multiplier: RetrySchedule::DEFAULT_MULTIPLIER,
            max_backoff_ms: RetrySchedule::DEFAULT_MAX_BACKOFF.as_millis() as u64,
            dead_letter_path: None,
        }
    }
}

impl DeliveryConfig {
    pub fn validate(&self) -> Result<(), NotifyError> {
        let fail = |what: &str| Err(NotifyError::configuration(format!("delivery.{what}")));

        if self.workers == 0 {
            return fail("workers must be at least 1");
        }
        if self.queue_capacity == 0 {
            return fail("queue_capacity must be at least 1");
        }
        if self.fired_ledger_capacity == 0 {
            return fail("fired_ledger_capacity must be at least 1");
        }
        if self.max_attempts == 0 {
            return fail("max_attempts must be at least 1");
        }
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return fail("backoff_multiplier must be a finite number >= 1.0");
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return fail("initial_backoff_ms must not exceed max_backoff_ms");
        }
        if self.max_backoff_ms > MAX_BACKOFF_CEILING_MS {
            return fail("max_backoff_ms must not exceed one day");
        }
        Ok(())
    }

    pub fn retry_schedule(&self) -> RetrySchedule {
        RetrySchedule {
            max_attempts: self.max_attempts,
            initial_backoff: Duration::from_millis(self.initial_backoff_ms),
            multiplier: self.backoff_multiplier,
            max_backoff: Duration::from_millis(self.max_backoff_ms),
        }
    }
}

// ---------------------------------------------------------------------------
// Render settings
// ---------------------------------------------------------------------------

/// Parsed templates plus the email envelope settings the dispatcher needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSettings {
    pub sender: String,
    pub html: bool,
    pub email_subject: Template,
    pub email_body: Template,
    pub slack_message: Template,
    pub pager_duty_summary: Template,
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn empty_document_yields_noop_defaults() {
        let file = ConfigFile::from_toml_str("").unwrap();
        assert_eq!(file.notifications.kind, BackendKind::Noop);
        assert_eq!(file.notifications.emailer.subject, DEFAULT_EMAIL_SUBJECT);
        assert_eq!(file.notifications.delivery.retry_schedule(), RetrySchedule::default());
    }

    #[test]
    fn parses_full_document() {
        let file = ConfigFile::from_toml_str(
            r#"
            [notifications]
            type = "local"

            [notifications.emailer]
            sender = "flyte-notifications@company.com"
            subject = "{{ workflow.name }} {{ phase }}"
            html = true

            [notifications.emailer.smtp]
            host = "smtp.company.com"
            port = 465
            tls = "wrapper"

            [notifications.slack]
            webhook_url = "https://hooks.slack.com/services/T/B/X"

            [notifications.delivery]
            workers = 2
            max_attempts = 6
            initial_backoff_ms = 250
            dead_letter_path = "/var/lib/bellwether/dead-letters.jsonl"
            "#,
        )
        .unwrap();

        let n = &file.notifications;
        assert_eq!(n.kind, BackendKind::Local);
        assert!(n.emailer.html);
        let smtp = n.emailer.smtp.as_ref().unwrap();
        assert_eq!((smtp.port, smtp.tls), (465, SmtpTls::Wrapper));
        assert_eq!(n.delivery.workers, 2);
        assert_eq!(n.delivery.retry_schedule().initial_backoff, Duration::from_millis(250));
        assert_eq!(n.pager_duty.events_url, DEFAULT_PAGER_DUTY_EVENTS_URL);
    }

    #[test]
    fn malformed_template_fails_validation() {
        let err = ConfigFile::from_toml_str(
            r#"
            [notifications.slack]
            message = "{{ workflow.name }} has {{ phase"
            "#,
        )
        .unwrap_err();
        assert_matches!(
            err,
            NotifyError::TemplateRender { ref template, .. } if template == "slack.message"
        );
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let err =
            ConfigFile::from_toml_str("[notifications]\nregion = \"us-east-1\"\n").unwrap_err();
        assert_matches!(err, NotifyError::Configuration { .. });
    }

    #[test]
    fn delivery_tuning_is_validated() {
        for bad in [
            "workers = 0",
            "queue_capacity = 0",
            "fired_ledger_capacity = 0",
            "max_attempts = 0",
            "backoff_multiplier = 0.5",
            "initial_backoff_ms = 5000\nmax_backoff_ms = 100",
        ] {
            let doc = format!("[notifications.delivery]\n{bad}\n");
            assert!(ConfigFile::from_toml_str(&doc).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn env_overrides_fill_secrets() {
        let env: HashMap<&str, &str> = [
            ("BELLWETHER_SMTP_PASSWORD", "hunter2"),
            ("BELLWETHER_SLACK_WEBHOOK_URL", "https://hooks.slack.com/services/A/B/C"),
        ]
        .into_iter()
        .collect();

        let mut config = NotificationsConfig::default();
        config.emailer.smtp = Some(SmtpConfig::default());
        let config = config.with_env_overrides(|k| env.get(k).map(|v| v.to_string()));

        assert_eq!(
            config.emailer.smtp.unwrap().password.as_deref(),
            Some("hunter2")
        );
        assert_eq!(
            config.slack.webhook_url.as_deref(),
            Some("https://hooks.slack.com/services/A/B/C")
        );
    }

    #[test]
    fn secrets_are_not_serialised() {
        let mut config = NotificationsConfig::default();
        config.slack.webhook_url = Some("https://hooks.slack.com/services/secret".into());
        let rendered = toml::to_string(&ConfigFile { notifications: config }).unwrap();
        assert!(!rendered.contains("secret"));
    }
}
