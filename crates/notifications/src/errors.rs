//! Error and retry-policy types for the notification domain.
//!
//! [`NotifyError`] covers every condition that stops a notification from
//! being delivered. Adapter crates define their own error types and convert
//! them into [`TransportError`] with a classified [`RetryPolicy`].
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that
//! participates in retry decisions must be able to produce one.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ChannelKind;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by transport adapters so the delivery queue can decide whether to
/// re-attempt a send or dead-letter it.
///
/// - `Retryable`: timeouts, connection failures, HTTP 429/5xx, transient SMTP
///   replies.
/// - `NonRetryable`: rejected recipients, malformed requests, authentication
///   failures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally specifies the minimum delay before retrying (e.g.
    /// derived from a `Retry-After` response header).
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetryPolicy::Retryable { .. })
    }
}

// ---------------------------------------------------------------------------
// Transport errors
// ---------------------------------------------------------------------------

/// A failed outbound call to a notification transport.
#[derive(Debug, Clone, Error, PartialEq, Serialize, Deserialize)]
#[error("{channel} transport error: {message}")]
pub struct TransportError {
    pub channel: ChannelKind,
    pub message: String,
    pub retry: RetryPolicy,
}

impl TransportError {
    /// A failure worth retrying with the caller's back-off.
    pub fn transient(channel: ChannelKind, message: impl Into<String>) -> Self {
        Self {
            channel,
            message: message.into(),
            retry: RetryPolicy::Retryable { after: None },
        }
    }

    /// A failure that will not succeed on retry.
    pub fn permanent(channel: ChannelKind, message: impl Into<String>) -> Self {
        Self {
            channel,
            message: message.into(),
            retry: RetryPolicy::NonRetryable,
        }
    }

    /// Sets an explicit retry policy.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }
}

// ---------------------------------------------------------------------------
// Template errors
// ---------------------------------------------------------------------------

/// A template string that cannot be rendered.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// An opening `{{` has no matching `}}`.
    #[error("unterminated placeholder starting at byte {offset}")]
    Unterminated { offset: usize },
}

// ---------------------------------------------------------------------------
// Domain errors
// ---------------------------------------------------------------------------

/// Errors that stop a notification from being delivered.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// A configured template is malformed.
    ///
    /// The affected event is logged and skipped; it is not retried.
    #[error("Template '{template}' could not be rendered: {source}")]
    TemplateRender {
        /// Which configured template failed (e.g. `"email.subject"`).
        template: String,
        #[source]
        source: TemplateError,
    },

    /// A transport call failed. Retried according to its [`RetryPolicy`].
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A credential, transport, or recipient required by a rule is missing.
    ///
    /// Fatal to that rule's delivery only; reported on the dead-letter path.
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A notification rule failed validation at construction time.
    #[error("Invalid notification rule: {reason}")]
    InvalidRule { reason: String },

    /// A dead letter could not be recorded.
    #[error("Dead-letter sink failed: {message}")]
    DeadLetterSink { message: String },
}

impl NotifyError {
    pub fn configuration(message: impl Into<String>) -> Self {
        NotifyError::Configuration {
            message: message.into(),
        }
    }

    pub fn invalid_rule(reason: impl Into<String>) -> Self {
        NotifyError::InvalidRule {
            reason: reason.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Source errors
// ---------------------------------------------------------------------------

/// Errors produced while reading phase transitions from an event source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// One record could not be decoded. The source remains usable.
    #[error("Malformed phase transition at record {record}: {message}")]
    Malformed { record: u64, message: String },

    /// The underlying stream failed. The source is no longer usable.
    #[error("Event source I/O error: {message}")]
    Io { message: String },
}

impl SourceError {
    /// Returns `true` if reading may continue after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, SourceError::Malformed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_display_names_channel() {
        let err = TransportError::transient(ChannelKind::Slack, "connection reset");
        assert_eq!(err.to_string(), "slack transport error: connection reset");
        assert!(err.retry_policy().is_retryable());
    }

    #[test]
    fn template_error_display() {
        let err = NotifyError::TemplateRender {
            template: "email.subject".into(),
            source: TemplateError::Unterminated { offset: 7 },
        };
        assert_eq!(
            err.to_string(),
            "Template 'email.subject' could not be rendered: unterminated placeholder starting at byte 7"
        );
    }
}
