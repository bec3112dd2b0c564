//! Email notification delivery via SMTP.
//!
//! [`SmtpEmailTransport`] implements [`notifications::EmailTransport`] on top
//! of the `lettre` async SMTP transport. The relay is configured once from
//! [`notifications::SmtpConfig`]; every call sends one message and maps the
//! SMTP outcome onto a [`RetryPolicy`] for the delivery queue.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use notifications::{
    ChannelKind, EmailMessage, EmailTransport, RetryPolicy, SmtpConfig, SmtpTls, TransportError,
};

/// Connection and command timeout for one SMTP session.
pub const SMTP_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),

    /// The relay settings are incomplete.
    #[error("SMTP configuration error: {0}")]
    Config(String),
}

impl EmailError {
    /// Permanent SMTP replies (5xx) and client-side errors are final;
    /// connection failures, timeouts, and 4xx replies are worth retrying.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            EmailError::Transport(e) if e.is_permanent() || e.is_client() => {
                RetryPolicy::NonRetryable
            }
            EmailError::Transport(_) => RetryPolicy::Retryable { after: None },
            EmailError::Address(_) | EmailError::Build(_) | EmailError::Config(_) => {
                RetryPolicy::NonRetryable
            }
        }
    }
}

impl From<EmailError> for TransportError {
    fn from(err: EmailError) -> Self {
        let retry = err.retry_policy();
        TransportError::transient(ChannelKind::Email, err.to_string()).with_retry(retry)
    }
}

// ---------------------------------------------------------------------------
// SmtpEmailTransport
// ---------------------------------------------------------------------------

/// Sends notification emails through one SMTP relay.
pub struct SmtpEmailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
}

impl SmtpEmailTransport {
    /// Builds the relay client. No connection is opened until the first send.
    ///
    /// A username without a password, or the reverse, is rejected rather
    /// than silently connecting unauthenticated.
    pub fn new(config: &SmtpConfig) -> Result<Self, EmailError> {
        let mut builder = match config.tls {
            SmtpTls::Starttls => {
                AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)?
            }
            SmtpTls::Wrapper => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)?,
            SmtpTls::None => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
        }
        .port(config.port)
        .timeout(Some(SMTP_TIMEOUT));

        match (&config.username, &config.password) {
            (Some(user), Some(pass)) => {
                builder = builder.credentials(Credentials::new(user.clone(), pass.clone()));
            }
            (Some(_), None) => {
                return Err(EmailError::Config(format!(
                    "username is set for {} but password is missing",
                    config.host
                )));
            }
            (None, Some(_)) => {
                return Err(EmailError::Config(format!(
                    "password is set for {} but username is missing",
                    config.host
                )));
            }
            (None, None) => {}
        }

        tracing::info!(
            host = %config.host,
            port = config.port,
            tls = ?config.tls,
            "SMTP transport configured"
        );
        Ok(Self {
            mailer: builder.build(),
        })
    }
}

#[async_trait]
impl EmailTransport for SmtpEmailTransport {
    async fn send_email(&self, message: &EmailMessage) -> Result<(), TransportError> {
        let email = build_message(message)?;
        self.mailer.send(email).await.map_err(EmailError::from)?;

        tracing::info!(
            recipients = message.recipients.len(),
            subject = %message.subject,
            "Notification email sent"
        );
        Ok(())
    }
}

/// Assembles the MIME message for a rendered email.
pub fn build_message(message: &EmailMessage) -> Result<Message, EmailError> {
    let mut builder = Message::builder()
        .from(message.sender.parse::<Mailbox>()?)
        .subject(message.subject.as_str())
        .header(if message.html {
            ContentType::TEXT_HTML
        } else {
            ContentType::TEXT_PLAIN
        });
    for recipient in &message.recipients {
        builder = builder.to(recipient.as_str().parse::<Mailbox>()?);
    }
    builder
        .body(message.body.clone())
        .map_err(|e| EmailError::Build(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
