//! OpenAPI document generated from the handler annotations.

use crate::config::Config;
use crate::errors::{ErrorKind, FailureEnvelope};
use crate::handlers;
use crate::models::{
    CreateRecordRequest, GenerateTextRequest, HealthResponse, HealthStatus, MailSent,
    RecordMutated, RecordOperation, SalesforceConfigSchema, SearchHit, SearchRequest,
    SearchResults, SendEmailRequest, SmtpConfigSchema, TextGenerated, TokenUsage,
    UpdateRecordRequest,
};
use utoipa::openapi::Server;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Provider Relay API",
        version = "1.0.0",
        description = "Relays email, text generation, Salesforce and web search calls with caller-supplied credentials. Every failure uses the same envelope: success=false, error, error_code and, for mail login failures, helpful_links."
    ),
    paths(
        handlers::health,
        handlers::capabilities,
        handlers::email_info,
        handlers::send_email,
        handlers::generate_text,
        handlers::create_record,
        handlers::update_record,
        handlers::search,
    ),
    components(schemas(
        SendEmailRequest,
        SmtpConfigSchema,
        GenerateTextRequest,
        CreateRecordRequest,
        UpdateRecordRequest,
        SalesforceConfigSchema,
        SearchRequest,
        MailSent,
        TextGenerated,
        TokenUsage,
        RecordMutated,
        RecordOperation,
        SearchResults,
        SearchHit,
        HealthResponse,
        HealthStatus,
        FailureEnvelope,
        ErrorKind,
    )),
    tags(
        (name = "meta", description = "Health and capability discovery"),
        (name = "email", description = "SMTP mail delivery"),
        (name = "llm", description = "Text generation"),
        (name = "crm", description = "Salesforce record create and update"),
        (name = "search", description = "Public web search")
    )
)]
pub struct ApiDoc;

impl ApiDoc {
    /// The document as served, with `PUBLIC_BASE_URL` advertised when set.
    pub fn document(config: &Config) -> utoipa::openapi::OpenApi {
        let mut doc = Self::openapi();
        if let Some(url) = config.public_base_url.as_deref() {
            doc.servers = Some(vec![Server::new(url)]);
        }
        doc
    }
}
