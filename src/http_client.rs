//! reqwest plumbing shared by the REST provider clients.

use crate::errors::{FailureSignal, RawFailure};
use reqwest::{Client, Response};
use std::time::Duration;

/// Builds the client every REST adapter uses. No retries; one attempt per call.
pub fn build_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(10)))
        .user_agent(concat!("provider-relay/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))
}

/// Classifies a reqwest send error as a transport-level signal.
pub fn send_failure(err: &reqwest::Error, redact: impl Fn(&str) -> String) -> RawFailure {
    let signal = if err.is_timeout() {
        FailureSignal::Timeout
    } else if err.is_connect() || err.is_request() {
        FailureSignal::Transport
    } else {
        FailureSignal::Other
    };
    // Drop the URL: query strings can carry caller input.
    let message = err.without_url_ref().to_string();
    RawFailure::new(signal, redact(&message))
}

/// Reads a non-success response into a failure.
///
/// `extract_code` pulls a provider error code out of the body when there is
/// one; the code keeps the HTTP status alongside it.
pub async fn status_failure(
    response: Response,
    extract_code: impl Fn(&serde_json::Value) -> Option<(String, String)>,
    redact: impl Fn(&str) -> String,
) -> RawFailure {
    let status = response.status();
    let text = response
        .text()
        .await
        .unwrap_or_else(|_| "Unknown error".to_string());

    let parsed = serde_json::from_str::<serde_json::Value>(&text)
        .ok()
        .and_then(|body| extract_code(&body));

    match parsed {
        Some((code, message)) => RawFailure::new(
            FailureSignal::ProviderCode {
                code,
                status: status.as_u16(),
            },
            redact(&format!("{} (HTTP {})", message, status.as_u16())),
        ),
        None => RawFailure::new(
            FailureSignal::HttpStatus(status.as_u16()),
            redact(&format!("HTTP {}: {}", status.as_u16(), text.trim())),
        ),
    }
}

/// Wraps a body that did not decode as the expected JSON.
pub fn decode_failure(err: &reqwest::Error, what: &str) -> RawFailure {
    RawFailure::new(
        FailureSignal::Other,
        format!("Failed to parse {} response: {}", what, err.without_url_ref()),
    )
}

trait WithoutUrlRef {
    fn without_url_ref(&self) -> String;
}

impl WithoutUrlRef for reqwest::Error {
    fn without_url_ref(&self) -> String {
        let mut text = self.to_string();
        if let Some(url) = self.url() {
            text = text.replace(&format!(" for url ({})", url), "");
        }
        text
    }
}
