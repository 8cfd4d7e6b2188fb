//! Maps adapter failures onto the shared [`ErrorKind`] taxonomy.
//!
//! Classification is a fixed lookup: network signals first, then HTTP 401/403,
//! then the text rule table over the lowercased provider message, then
//! status-code rules.
//! Mail authentication failures additionally get a remediation link chosen
//! from the [`HelpLinks`] table.

use crate::errors::{ErrorKind, FailureSignal, ProviderFailure, RawFailure};
use crate::help_links::HelpLinks;
use crate::providers::Provider;

/// One row of the text rule table. `provider: None` applies to every provider.
#[derive(Debug, Clone, Copy)]
pub struct TextRule {
    pub provider: Option<Provider>,
    pub pattern: &'static str,
    pub kind: ErrorKind,
}

const fn rule(provider: Option<Provider>, pattern: &'static str, kind: ErrorKind) -> TextRule {
    TextRule {
        provider,
        pattern,
        kind,
    }
}

const MAIL: Option<Provider> = Some(Provider::Mail);
const TEXT: Option<Provider> = Some(Provider::Text);
const CRM: Option<Provider> = Some(Provider::Crm);
const SEARCH: Option<Provider> = Some(Provider::Search);
const ANY: Option<Provider> = None;

/// Evaluated top to bottom; the first matching row wins.
pub const TEXT_RULES: &[TextRule] = &[
    // SMTP servers word their login rejections differently per vendor.
    rule(MAIL, "username and password not accepted", ErrorKind::Auth),
    rule(MAIL, "application-specific password required", ErrorKind::Auth),
    rule(MAIL, "authentication failed", ErrorKind::Auth),
    rule(MAIL, "authentication unsuccessful", ErrorKind::Auth),
    rule(MAIL, "authentication credentials invalid", ErrorKind::Auth),
    rule(MAIL, "invalid credentials", ErrorKind::Auth),
    rule(MAIL, "badcredentials", ErrorKind::Auth),
    rule(MAIL, "invalid login", ErrorKind::Auth),
    rule(MAIL, "recipient address rejected", ErrorKind::InvalidRequest),
    rule(MAIL, "mailbox unavailable", ErrorKind::InvalidRequest),
    rule(MAIL, "invalid address", ErrorKind::InvalidRequest),
    rule(TEXT, "invalid_api_key", ErrorKind::Auth),
    rule(TEXT, "incorrect api key", ErrorKind::Auth),
    rule(TEXT, "invalid api key", ErrorKind::Auth),
    rule(TEXT, "model_not_found", ErrorKind::InvalidRequest),
    rule(TEXT, "context_length_exceeded", ErrorKind::InvalidRequest),
    rule(TEXT, "invalid_request_error", ErrorKind::InvalidRequest),
    rule(CRM, "invalid_grant", ErrorKind::Auth),
    rule(CRM, "invalid_client", ErrorKind::Auth),
    rule(CRM, "invalid_login", ErrorKind::Auth),
    rule(CRM, "invalid_session_id", ErrorKind::Auth),
    rule(CRM, "insufficient_access", ErrorKind::Auth),
    rule(CRM, "invalid_field", ErrorKind::InvalidRequest),
    rule(CRM, "required_field_missing", ErrorKind::InvalidRequest),
    rule(CRM, "field_custom_validation_exception", ErrorKind::InvalidRequest),
    rule(CRM, "duplicate_value", ErrorKind::InvalidRequest),
    rule(CRM, "not_found", ErrorKind::InvalidRequest),
    rule(CRM, "invalid_type", ErrorKind::InvalidRequest),
    rule(CRM, "malformed", ErrorKind::InvalidRequest),
    rule(SEARCH, "invalid query", ErrorKind::InvalidRequest),
    rule(ANY, "timed out", ErrorKind::Network),
    rule(ANY, "connection refused", ErrorKind::Network),
    rule(ANY, "dns error", ErrorKind::Network),
];

/// SMTP reply codes with a fixed meaning.
fn smtp_reply_kind(code: u16) -> Option<ErrorKind> {
    match code {
        530 | 534 | 535 => Some(ErrorKind::Auth),
        501 | 550 | 553 | 555 => Some(ErrorKind::InvalidRequest),
        _ => None,
    }
}

fn http_status_kind(status: u16) -> Option<ErrorKind> {
    match status {
        401 | 403 => Some(ErrorKind::Auth),
        400 | 404 | 413 | 422 => Some(ErrorKind::InvalidRequest),
        _ => None,
    }
}

/// The kind alone, without messages or hints.
pub fn classify_kind(provider: Provider, failure: &RawFailure) -> ErrorKind {
    if matches!(
        failure.signal,
        FailureSignal::Transport | FailureSignal::Timeout
    ) {
        return ErrorKind::Network;
    }
    // Rejected credentials outrank whatever error type the body reports.
    if matches!(failure.signal.http_status(), Some(401 | 403)) {
        return ErrorKind::Auth;
    }

    let mut haystack = failure.message.to_lowercase();
    if let FailureSignal::ProviderCode { code, .. } = &failure.signal {
        haystack.push(' ');
        haystack.push_str(&code.to_lowercase());
    }

    let by_text = TEXT_RULES
        .iter()
        .find(|r| r.provider.map_or(true, |p| p == provider) && haystack.contains(r.pattern))
        .map(|r| r.kind);
    if let Some(kind) = by_text {
        return kind;
    }

    let by_code = match &failure.signal {
        FailureSignal::SmtpReply(code) => smtp_reply_kind(*code),
        signal => signal.http_status().and_then(http_status_kind),
    };
    by_code.unwrap_or(ErrorKind::UnknownProvider)
}

/// Mail login details used to pick a remediation link.
#[derive(Debug, Clone, Copy)]
pub struct MailLogin<'a> {
    pub username: &'a str,
    pub smtp_server: &'a str,
}

/// Turns raw adapter failures into envelope-ready failures.
pub trait FailureClassifier: Send + Sync {
    fn classify(
        &self,
        provider: Provider,
        failure: &RawFailure,
        mail: Option<MailLogin<'_>>,
    ) -> ProviderFailure;
}

/// Default classifier: the static rule table plus the help-link table.
#[derive(Debug, Clone, Default)]
pub struct RuleTableClassifier {
    help_links: HelpLinks,
}

impl RuleTableClassifier {
    pub fn new(help_links: HelpLinks) -> Self {
        Self { help_links }
    }

    fn message(provider: Provider, kind: ErrorKind, failure: &RawFailure, mail: Option<MailLogin<'_>>) -> String {
        let target = provider.display_name();
        let detail = failure.message.trim();
        match (kind, mail) {
            (ErrorKind::Auth, Some(login)) if provider == Provider::Mail => format!(
                "SMTP authentication failed for {}. Check the username and password; accounts with two-step verification need an app password.",
                login.username
            ),
            (ErrorKind::Auth, _) => format!(
                "Authentication with {} failed. Check the supplied credentials and try again.",
                target
            ),
            (ErrorKind::Network, _) => format!(
                "Could not reach {} ({}). Check the server address and network connectivity, then retry.",
                target, detail
            ),
            (ErrorKind::InvalidRequest, _) => {
                format!("Request rejected by {}: {}", target, detail)
            }
            (ErrorKind::Validation, _) => detail.to_string(),
            (ErrorKind::UnknownProvider, _) => {
                format!("Unexpected error from {}: {}", target, detail)
            }
        }
    }
}

impl FailureClassifier for RuleTableClassifier {
    fn classify(
        &self,
        provider: Provider,
        failure: &RawFailure,
        mail: Option<MailLogin<'_>>,
    ) -> ProviderFailure {
        let kind = classify_kind(provider, failure);
        let message = Self::message(provider, kind, failure, mail);
        let classified = ProviderFailure::new(kind, message);

        match (provider, kind, mail) {
            (Provider::Mail, ErrorKind::Auth, Some(login)) => classified.with_hints(
                self.help_links
                    .hints_for(login.username, Some(login.smtp_server)),
            ),
            _ => classified,
        }
    }
}
