//! Shared JSON POST helper.

use std::time::Duration;

use reqwest::header::RETRY_AFTER;
use serde::Serialize;

use crate::error::{parse_retry_after, WebhookError};

/// HTTP request timeout for a single delivery attempt.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the client used by both transports.
pub fn build_client() -> Result<reqwest::Client, WebhookError> {
    reqwest::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .user_agent(concat!("bellwether/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(WebhookError::Client)
}

/// Executes a single POST request and checks the response status.
pub(crate) async fn post_json<T: Serialize + ?Sized>(
    client: &reqwest::Client,
    url: &str,
    payload: &T,
) -> Result<(), WebhookError> {
    let response = client.post(url).json(payload).send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let retry_after = response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    // Best effort; the status alone is enough to classify the failure.
    let body = response.text().await.unwrap_or_default();
    Err(WebhookError::http_status(status.as_u16(), retry_after, &body))
}
