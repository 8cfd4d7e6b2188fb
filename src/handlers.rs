use crate::classifier::{FailureClassifier, MailLogin, RuleTableClassifier};
use crate::config::Config;
use crate::crm_client::SalesforceClient;
use crate::envelope::ProviderResult;
use crate::errors::{FailureEnvelope, ProviderFailure, RawFailure};
use crate::help_links::HelpLinks;
use crate::llm_client::ChatCompletionsClient;
use crate::mail_client::SmtpMailer;
use crate::models::{
    CreateRecordRequest, GenerateTextRequest, HealthResponse, HealthStatus, MailSent,
    RecordMutated, SearchRequest, SearchResults, SendEmailRequest, TextGenerated,
    UpdateRecordRequest,
};
use crate::openapi::ApiDoc;
use crate::providers::{CrmProvider, MailProvider, Provider, SearchProvider, TextProvider};
use crate::search_client::DuckDuckGoClient;
use crate::validation;
use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use serde_json::{json, Value};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

pub const SERVICE_NAME: &str = "provider-relay";
pub const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared application state injected into handlers.
///
/// Holds no per-request data; credentials travel with each request.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration, including fallback credentials.
    pub config: Config,
    pub mail: Arc<dyn MailProvider>,
    pub text: Arc<dyn TextProvider>,
    pub crm: Arc<dyn CrmProvider>,
    pub search: Arc<dyn SearchProvider>,
    pub classifier: Arc<dyn FailureClassifier>,
    /// Startup problems reported by the health probe.
    pub health_issues: Vec<String>,
}

impl AppState {
    /// Wires the production adapters.
    ///
    /// A broken help-link override falls back to the built-in table and is
    /// surfaced through the health probe instead of aborting startup.
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let mut health_issues = Vec::new();
        let help_links = match config.help_links_file.as_deref() {
            Some(path) => match HelpLinks::from_file(path) {
                Ok(table) => {
                    tracing::info!("Loaded help links from {}", path.display());
                    table
                }
                Err(e) => {
                    tracing::error!("Failed to load help links: {}", e);
                    health_issues.push(format!("help links file unusable: {}", e));
                    HelpLinks::builtin()
                }
            },
            None => HelpLinks::builtin(),
        };

        Ok(Self {
            mail: Arc::new(SmtpMailer::new(config.provider_timeout)),
            text: Arc::new(ChatCompletionsClient::new(&config)?),
            crm: Arc::new(SalesforceClient::new(&config)?),
            search: Arc::new(DuckDuckGoClient::new(&config)?),
            classifier: Arc::new(RuleTableClassifier::new(help_links)),
            health_issues,
            config,
        })
    }
}

/// Runs one provider call under the configured bound.
async fn bounded<T, F>(limit: Duration, call: F) -> Result<T, RawFailure>
where
    F: Future<Output = Result<T, RawFailure>>,
{
    tokio::time::timeout(limit, call)
        .await
        .unwrap_or_else(|_| Err(RawFailure::timeout(limit)))
}

/// Malformed or non-JSON bodies become validation failures.
fn read_body(payload: Result<Json<Value>, JsonRejection>) -> Result<Value, ProviderFailure> {
    payload.map(|Json(body)| body).map_err(|rejection| {
        ProviderFailure::validation(format!(
            "Request body must be valid JSON: {}",
            rejection.body_text()
        ))
    })
}

fn envelope<T>(outcome: Result<T, ProviderFailure>, wrap: fn(T) -> ProviderResult) -> ProviderResult {
    match outcome {
        Ok(value) => wrap(value),
        Err(failure) => ProviderResult::Failure(failure),
    }
}

/// Health check endpoint.
///
/// Returns the service status, name and version. Responds 503 when startup
/// reported a problem.
#[utoipa::path(
    get,
    path = "/health",
    tag = "meta",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse),
        (status = 503, description = "Service is degraded", body = HealthResponse)
    )
)]
pub async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let (status, code) = if state.health_issues.is_empty() {
        (HealthStatus::Healthy, StatusCode::OK)
    } else {
        (HealthStatus::Unhealthy, StatusCode::SERVICE_UNAVAILABLE)
    };
    (
        code,
        Json(HealthResponse {
            status,
            service: SERVICE_NAME.to_string(),
            version: SERVICE_VERSION.to_string(),
            issues: state.health_issues.clone(),
        }),
    )
}

/// GET /api/info
///
/// Static description of every provider capability.
#[utoipa::path(
    get,
    path = "/api/info",
    tag = "meta",
    responses((status = 200, description = "Provider capabilities"))
)]
pub async fn capabilities(State(state): State<Arc<AppState>>) -> Json<Value> {
    let fallback = &state.config.fallback;
    Json(json!({
        "service": SERVICE_NAME,
        "version": SERVICE_VERSION,
        "providers": [
            {
                "name": Provider::Mail,
                "description": "Send email through an SMTP relay (STARTTLS or implicit TLS on port 465)",
                "method": "POST",
                "endpoint": "/api/email/send",
                "required_fields": ["to_email", "subject", "body"],
                "credentials": "smtp_config",
                "server_fallback_configured": fallback.smtp.is_some()
            },
            {
                "name": Provider::Text,
                "description": "Generate text with an OpenAI-compatible chat completions API",
                "method": "POST",
                "endpoint": "/api/llm/generate",
                "required_fields": ["prompt"],
                "credentials": "api_key",
                "limits": {"max_tokens": validation::MAX_GENERATION_TOKENS, "temperature": [0.0, 2.0]},
                "server_fallback_configured": fallback.llm_api_key.is_some()
            },
            {
                "name": Provider::Crm,
                "description": "Create or update Salesforce records",
                "method": "POST, PATCH",
                "endpoint": "/api/crm/records",
                "required_fields": ["object_type", "fields"],
                "credentials": "sf_config",
                "server_fallback_configured": fallback.crm.is_some()
            },
            {
                "name": Provider::Search,
                "description": "Public web search (DuckDuckGo Instant Answers)",
                "method": "POST",
                "endpoint": "/api/search",
                "required_fields": ["query"],
                "credentials": null,
                "limits": {"max_results": validation::MAX_SEARCH_RESULTS}
            }
        ],
        "error_codes": [
            "ValidationError",
            "AuthError",
            "NetworkError",
            "InvalidRequestError",
            "UnknownProviderError"
        ]
    }))
}

/// GET /api/email/info
///
/// Mail plugin description in the OpenPlugin layout.
#[utoipa::path(
    get,
    path = "/api/email/info",
    tag = "email",
    responses((status = 200, description = "Email plugin information"))
)]
pub async fn email_info() -> Json<Value> {
    Json(json!({
        "plugin_name": "email",
        "version": "1.0.0",
        "description": "Send emails via SMTP",
        "endpoints": {
            "send_email": "/api/email/send",
            "plugin_info": "/api/email/info"
        },
        "required_env_vars": [
            "SMTP_SERVER",
            "SMTP_PORT",
            "SMTP_USERNAME",
            "SMTP_PASSWORD",
            "FROM_EMAIL"
        ]
    }))
}

/// POST /api/email/send
///
/// Sends one email with the caller's SMTP credentials (or the server fallback).
#[utoipa::path(
    post,
    path = "/api/email/send",
    tag = "email",
    request_body = SendEmailRequest,
    responses(
        (status = 200, description = "Email accepted by the relay", body = MailSent),
        (status = 400, description = "Validation failed", body = FailureEnvelope),
        (status = 502, description = "Relay rejected the login or the message, or was unreachable", body = FailureEnvelope),
        (status = 500, description = "Unexpected relay error", body = FailureEnvelope)
    )
)]
pub async fn send_email(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ProviderResult {
    tracing::info!("POST /api/email/send");
    envelope(send_email_inner(&state, payload).await, ProviderResult::MailSent)
}

async fn send_email_inner(
    state: &AppState,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<MailSent, ProviderFailure> {
    let body = read_body(payload)?;
    let (message, credentials) = validation::validate_email_request(&body, &state.config)?;

    bounded(
        state.config.provider_timeout,
        state.mail.send(&credentials, &message),
    )
    .await
    .map_err(|raw| {
        state.classifier.classify(
            Provider::Mail,
            &raw,
            Some(MailLogin {
                username: &credentials.username,
                smtp_server: &credentials.server,
            }),
        )
    })
}

/// POST /api/llm/generate
#[utoipa::path(
    post,
    path = "/api/llm/generate",
    tag = "llm",
    request_body = GenerateTextRequest,
    responses(
        (status = 200, description = "Generated text", body = TextGenerated),
        (status = 400, description = "Validation failed", body = FailureEnvelope),
        (status = 502, description = "Provider rejected the key or request, or was unreachable", body = FailureEnvelope),
        (status = 500, description = "Unexpected provider error", body = FailureEnvelope)
    )
)]
pub async fn generate_text(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ProviderResult {
    tracing::info!("POST /api/llm/generate");
    envelope(generate_text_inner(&state, payload).await, ProviderResult::TextGenerated)
}

async fn generate_text_inner(
    state: &AppState,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<TextGenerated, ProviderFailure> {
    let body = read_body(payload)?;
    let (prompt, credentials) = validation::validate_generate_request(&body, &state.config)?;

    bounded(
        state.config.provider_timeout,
        state.text.generate(&credentials, &prompt),
    )
    .await
    .map_err(|raw| state.classifier.classify(Provider::Text, &raw, None))
}

/// POST /api/crm/records
#[utoipa::path(
    post,
    path = "/api/crm/records",
    tag = "crm",
    request_body = CreateRecordRequest,
    responses(
        (status = 200, description = "Record created", body = RecordMutated),
        (status = 400, description = "Validation failed", body = FailureEnvelope),
        (status = 502, description = "Salesforce rejected the login or record, or was unreachable", body = FailureEnvelope),
        (status = 500, description = "Unexpected Salesforce error", body = FailureEnvelope)
    )
)]
pub async fn create_record(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ProviderResult {
    tracing::info!("POST /api/crm/records");
    envelope(
        mutate_record(&state, payload, None).await,
        ProviderResult::RecordMutated,
    )
}

/// PATCH /api/crm/records/{object_type}/{record_id}
#[utoipa::path(
    patch,
    path = "/api/crm/records/{object_type}/{record_id}",
    tag = "crm",
    params(
        ("object_type", description = "Salesforce object API name, e.g. Lead"),
        ("record_id", description = "15 or 18 character record id")
    ),
    request_body = UpdateRecordRequest,
    responses(
        (status = 200, description = "Record updated", body = RecordMutated),
        (status = 400, description = "Validation failed", body = FailureEnvelope),
        (status = 502, description = "Salesforce rejected the login or record, or was unreachable", body = FailureEnvelope),
        (status = 500, description = "Unexpected Salesforce error", body = FailureEnvelope)
    )
)]
pub async fn update_record(
    State(state): State<Arc<AppState>>,
    Path((object_type, record_id)): Path<(String, String)>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ProviderResult {
    tracing::info!("PATCH /api/crm/records/{}/{}", object_type, record_id);
    envelope(
        mutate_record(&state, payload, Some((&object_type, &record_id))).await,
        ProviderResult::RecordMutated,
    )
}

async fn mutate_record(
    state: &AppState,
    payload: Result<Json<Value>, JsonRejection>,
    path: Option<(&str, &str)>,
) -> Result<RecordMutated, ProviderFailure> {
    let body = read_body(payload)?;
    let (mutation, credentials) = validation::validate_record_request(&body, path, &state.config)?;

    bounded(
        state.config.provider_timeout,
        state.crm.mutate(&credentials, &mutation),
    )
    .await
    .map_err(|raw| state.classifier.classify(Provider::Crm, &raw, None))
}

/// POST /api/search
#[utoipa::path(
    post,
    path = "/api/search",
    tag = "search",
    request_body = SearchRequest,
    responses(
        (status = 200, description = "Search results", body = SearchResults),
        (status = 400, description = "Validation failed", body = FailureEnvelope),
        (status = 502, description = "Search engine rejected the query or was unreachable", body = FailureEnvelope),
        (status = 500, description = "Unexpected search engine error", body = FailureEnvelope)
    )
)]
pub async fn search(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> ProviderResult {
    tracing::info!("POST /api/search");
    envelope(search_inner(&state, payload).await, ProviderResult::SearchResults)
}

async fn search_inner(
    state: &AppState,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<SearchResults, ProviderFailure> {
    let body = read_body(payload)?;
    let query = validation::validate_search_request(&body)?;

    bounded(state.config.provider_timeout, state.search.search(&query))
        .await
        .map_err(|raw| state.classifier.classify(Provider::Search, &raw, None))
}

/// GET /api/openplugin/manifest
///
/// Machine-discovery manifest pointing at the OpenAPI document.
pub async fn openplugin_manifest(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "schema_version": "v1",
        "name_for_human": "Provider Relay",
        "name_for_model": "provider_relay",
        "description_for_human": "Send email, generate text, update Salesforce records and search the web.",
        "description_for_model": "Plugin for sending emails via SMTP, generating text with an LLM, creating or updating Salesforce records, and searching the web. Credentials are supplied per request.",
        "auth": {
            "type": "none"
        },
        "api": {
            "type": "openapi",
            "url": "/api/openplugin/openapi.yaml"
        },
        "logo_url": "",
        "contact_email": state.config.contact_email,
        "legal_info_url": ""
    }))
}

/// Serves the OpenAPI document generated from the handler annotations.
pub async fn openapi_spec(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match ApiDoc::document(&state.config).to_yaml() {
        Ok(content) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/yaml")],
            content,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to render OpenAPI document: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "OpenAPI document unavailable",
            )
                .into_response()
        }
    }
}

/// Serves the Swagger UI HTML page.
///
/// The page loads the document served by [`openapi_spec`].
pub async fn swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Provider Relay API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api/openplugin/openapi.yaml",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::FailureSignal;

    #[tokio::test]
    async fn bounded_turns_elapsed_calls_into_timeouts() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<(), RawFailure>(())
        };
        let err = bounded(Duration::from_millis(50), slow).await.unwrap_err();
        assert_eq!(err.signal, FailureSignal::Timeout);
    }

    #[tokio::test]
    async fn bounded_passes_results_through() {
        let fast = async { Ok::<u8, RawFailure>(7) };
        assert_eq!(bounded(Duration::from_secs(1), fast).await.unwrap(), 7);
    }

    #[test]
    fn production_state_builds_with_defaults() {
        let state = AppState::from_config(Config::default()).unwrap();
        assert!(state.health_issues.is_empty());
    }

    #[test]
    fn broken_help_links_file_degrades_health() {
        let config = Config {
            help_links_file: Some("/nonexistent/help_links.json".into()),
            ..Config::default()
        };
        let state = AppState::from_config(config).unwrap();
        assert_eq!(state.health_issues.len(), 1);
    }
}
