//! Webhook failures and their retry classification.

use std::time::Duration;

use notifications::{ChannelKind, RetryPolicy, TransportError};

/// Longest response body excerpt kept in an error message.
const BODY_EXCERPT_CHARS: usize = 200;

/// Error type for webhook delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    /// The underlying HTTP request failed (network, DNS, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The remote server returned a non-2xx status code.
    #[error("webhook returned HTTP {status}: {body}")]
    HttpStatus {
        status: u16,
        /// Parsed `Retry-After` header, when present in delta-seconds form.
        retry_after: Option<Duration>,
        body: String,
    },
}

impl WebhookError {
    pub(crate) fn http_status(status: u16, retry_after: Option<Duration>, body: &str) -> Self {
        let body: String = body.trim().chars().take(BODY_EXCERPT_CHARS).collect();
        WebhookError::HttpStatus {
            status,
            retry_after,
            body,
        }
    }

    /// Whether another attempt could succeed, and how long to wait.
    ///
    /// Throttling (429), request timeouts (408), and server errors (5xx) are
    /// retryable, as are connection-level failures. Every other 4xx means
    /// the request itself is wrong and is not.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            WebhookError::Client(_) => RetryPolicy::NonRetryable,
            WebhookError::Request(e) if e.is_builder() => RetryPolicy::NonRetryable,
            WebhookError::Request(_) => RetryPolicy::Retryable { after: None },
            WebhookError::HttpStatus {
                status,
                retry_after,
                ..
            } => match status {
                408 | 429 | 500..=599 => RetryPolicy::Retryable {
                    after: *retry_after,
                },
                _ => RetryPolicy::NonRetryable,
            },
        }
    }

    /// Converts into the transport-neutral error the delivery queue retries on.
    pub fn into_transport_error(self, channel: ChannelKind) -> TransportError {
        let retry = self.retry_policy();
        TransportError::transient(channel, self.to_string()).with_retry(retry)
    }
}

/// Parses a `Retry-After` value given in seconds. HTTP-date values are
/// ignored and fall back to the caller's back-off.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn server_errors_and_throttling_are_retryable() {
        for status in [408, 429, 500, 502, 503] {
            let err = WebhookError::http_status(status, None, "");
            assert!(err.retry_policy().is_retryable(), "HTTP {status}");
        }
    }

    #[test]
    fn client_errors_are_not_retryable() {
        for status in [400, 401, 403, 404, 410] {
            let err = WebhookError::http_status(status, None, "");
            assert_eq!(err.retry_policy(), RetryPolicy::NonRetryable, "HTTP {status}");
        }
    }

    #[test]
    fn retry_after_is_carried_into_the_policy() {
        let err = WebhookError::http_status(429, Some(Duration::from_secs(7)), "slow down");
        assert_matches!(
            err.retry_policy(),
            RetryPolicy::Retryable { after: Some(d) } if d == Duration::from_secs(7)
        );
    }

    #[test]
    fn retry_after_accepts_only_delta_seconds() {
        assert_eq!(parse_retry_after(" 12 "), Some(Duration::from_secs(12)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }

    #[test]
    fn body_excerpt_is_trimmed_and_bounded() {
        let err = WebhookError::http_status(400, None, &format!("  {}  ", "x".repeat(500)));
        assert_matches!(err, WebhookError::HttpStatus { body, .. } => {
            assert_eq!(body.len(), BODY_EXCERPT_CHARS);
        });
    }

    #[test]
    fn display_names_status_and_body() {
        let err = WebhookError::http_status(404, None, "channel_not_found");
        assert_eq!(err.to_string(), "webhook returned HTTP 404: channel_not_found");
    }

    #[test]
    fn request_build_error_is_not_retryable() {
        let req_err = reqwest::Client::new().get("://bad").build().unwrap_err();
        let err = WebhookError::Request(req_err);
        assert!(err.to_string().contains("HTTP request failed"));
        assert_eq!(err.retry_policy(), RetryPolicy::NonRetryable);
    }

    #[test]
    fn transport_error_keeps_channel_and_policy() {
        let err = WebhookError::http_status(503, None, "").into_transport_error(ChannelKind::Slack);
        assert_eq!(err.channel, ChannelKind::Slack);
        assert!(err.retry_policy().is_retryable());
        assert!(err.message.contains("503"));
    }
}
