use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

// ============ Validated Payloads ============

/// A validated outgoing mail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to_email: String,
    pub subject: String,
    pub body: String,
    pub is_html: bool,
}

/// A validated text-generation prompt.
#[derive(Debug, Clone, PartialEq)]
pub struct TextPrompt {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RecordOperation {
    Created,
    Updated,
}

/// A validated CRM record create or update.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordMutation {
    pub object_type: String,
    /// Present for updates only.
    pub record_id: Option<String>,
    pub fields: Map<String, Value>,
}

impl RecordMutation {
    pub fn operation(&self) -> RecordOperation {
        if self.record_id.is_some() {
            RecordOperation::Updated
        } else {
            RecordOperation::Created
        }
    }
}

/// A validated web search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    pub max_results: usize,
}

// ============ Success Bodies ============

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MailSent {
    pub message: String,
    pub message_id: String,
    pub to_email: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TokenUsage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TextGenerated {
    pub text: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RecordMutated {
    pub record_id: String,
    pub object_type: String,
    pub operation: RecordOperation,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SearchResults {
    pub query: String,
    pub results: Vec<SearchHit>,
    pub count: usize,
}

// ============ Service Metadata ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

// ============ Request Schemas (OpenAPI) ============

/// SMTP credentials embedded in a mail request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SmtpConfigSchema {
    #[schema(example = "smtp.gmail.com")]
    pub smtp_server: String,
    /// Number or numeric string, 1-65535.
    #[schema(example = 587)]
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    pub from_email: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SendEmailRequest {
    #[schema(example = "someone@example.com")]
    pub to_email: String,
    pub subject: String,
    pub body: String,
    #[serde(default)]
    pub is_html: bool,
    /// Falls back to the server's SMTP settings when omitted.
    pub smtp_config: Option<SmtpConfigSchema>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct GenerateTextRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    /// 1-4096, default 512.
    pub max_tokens: Option<u32>,
    /// 0.0-2.0.
    pub temperature: Option<f32>,
    /// Falls back to the server's key when omitted.
    pub api_key: Option<String>,
    pub model: Option<String>,
}

/// Salesforce connected-app credentials embedded in a CRM request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct SalesforceConfigSchema {
    pub username: String,
    pub password: String,
    pub security_token: Option<String>,
    pub client_id: String,
    pub client_secret: String,
    /// `login`, `test`, a My Domain prefix, or a full URL.
    pub domain: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateRecordRequest {
    #[schema(example = "Lead")]
    pub object_type: String,
    #[schema(value_type = Object)]
    pub fields: Map<String, Value>,
    pub sf_config: Option<SalesforceConfigSchema>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRecordRequest {
    #[schema(value_type = Object)]
    pub fields: Map<String, Value>,
    pub sf_config: Option<SalesforceConfigSchema>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SearchRequest {
    pub query: String,
    /// 1-25, default 5.
    pub max_results: Option<u32>,
}
