use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use utoipa::ToSchema;

/// Upper bound on provider text echoed back to callers.
pub const MAX_ERROR_MESSAGE_LEN: usize = 300;

/// Uniform failure taxonomy shared by every provider integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ToSchema)]
pub enum ErrorKind {
    /// Bad or missing input; never reaches the network.
    #[serde(rename = "ValidationError")]
    Validation,
    /// The provider rejected the supplied credentials.
    #[serde(rename = "AuthError")]
    Auth,
    /// DNS, connect, TLS or timeout failure.
    #[serde(rename = "NetworkError")]
    Network,
    /// The provider rejected well-formed-looking input.
    #[serde(rename = "InvalidRequestError")]
    InvalidRequest,
    /// Anything else the provider reported.
    #[serde(rename = "UnknownProviderError")]
    UnknownProvider,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "ValidationError",
            ErrorKind::Auth => "AuthError",
            ErrorKind::Network => "NetworkError",
            ErrorKind::InvalidRequest => "InvalidRequestError",
            ErrorKind::UnknownProvider => "UnknownProviderError",
        }
    }

    /// HTTP status used when this kind is returned to the caller.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorKind::Validation => StatusCode::BAD_REQUEST,
            ErrorKind::Auth | ErrorKind::Network | ErrorKind::InvalidRequest => {
                StatusCode::BAD_GATEWAY
            }
            ErrorKind::UnknownProvider => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the adapter observed when the external call failed, before classification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureSignal {
    /// DNS, connect or TLS failure.
    Transport,
    /// The call did not finish within the provider timeout.
    Timeout,
    /// Non-success HTTP status from a REST provider.
    HttpStatus(u16),
    /// SMTP reply code from the mail relay.
    SmtpReply(u16),
    /// Provider-specific error code (e.g. `invalid_grant`, `INVALID_FIELD`) and the
    /// HTTP status it arrived with.
    ProviderCode { code: String, status: u16 },
    Other,
}

impl FailureSignal {
    /// HTTP status carried by REST failures.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus(status) | Self::ProviderCode { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Unclassified adapter failure. `message` must already be free of credential values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFailure {
    pub signal: FailureSignal,
    pub message: String,
}

impl RawFailure {
    pub fn new(signal: FailureSignal, message: impl Into<String>) -> Self {
        Self {
            signal,
            message: message.into(),
        }
    }

    pub fn timeout(limit: std::time::Duration) -> Self {
        Self::new(
            FailureSignal::Timeout,
            format!("no response within {} seconds", limit.as_secs()),
        )
    }
}

impl fmt::Display for RawFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.signal, self.message)
    }
}

/// A classified failure, ready to be rendered into the response envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderFailure {
    pub kind: ErrorKind,
    pub message: String,
    /// Remediation links keyed by provider (e.g. `gmail`).
    pub hints: Option<BTreeMap<String, String>>,
}

impl ProviderFailure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: truncate_message(message.into()),
            hints: None,
        }
    }

    /// Input validation failure; never reaches the network.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::validation(format!("Missing required field: {}", field))
    }

    pub fn with_hints(mut self, hints: BTreeMap<String, String>) -> Self {
        if !hints.is_empty() {
            self.hints = Some(hints);
        }
        self
    }
}

impl fmt::Display for ProviderFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl std::error::Error for ProviderFailure {}

/// Wire shape of a failed call.
#[derive(Debug, Serialize, ToSchema)]
pub struct FailureEnvelope {
    /// Always `false`.
    pub success: bool,
    /// Human-readable, actionable message.
    pub error: String,
    pub error_code: ErrorKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub helpful_links: Option<BTreeMap<String, String>>,
}

impl From<ProviderFailure> for FailureEnvelope {
    fn from(failure: ProviderFailure) -> Self {
        Self {
            success: false,
            error: failure.message,
            error_code: failure.kind,
            helpful_links: failure.hints,
        }
    }
}

impl IntoResponse for ProviderFailure {
    /// Renders the failure envelope with the status mapped from its kind.
    fn into_response(self) -> Response {
        let status = self.kind.status_code();
        match self.kind {
            ErrorKind::Validation => tracing::info!("Rejected request: {}", self.message),
            ErrorKind::UnknownProvider => tracing::error!("Provider error: {}", self.message),
            _ => tracing::warn!("Provider call failed ({}): {}", self.kind, self.message),
        }
        (status, Json(FailureEnvelope::from(self))).into_response()
    }
}

/// Clips provider text on a char boundary.
pub fn truncate_message(message: String) -> String {
    if message.chars().count() <= MAX_ERROR_MESSAGE_LEN {
        return message;
    }
    let mut clipped: String = message.chars().take(MAX_ERROR_MESSAGE_LEN).collect();
    clipped.push_str("...");
    clipped
}
