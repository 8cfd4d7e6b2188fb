use crate::config::Config;
use crate::credentials::CrmCredentials;
use crate::errors::{FailureSignal, RawFailure};
use crate::http_client::{build_client, decode_failure, send_failure, status_failure};
use crate::models::{RecordMutated, RecordMutation};
use crate::providers::CrmProvider;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::Deserialize;

pub const SALESFORCE_API_VERSION: &str = "v59.0";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    instance_url: String,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: Option<String>,
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<serde_json::Value>,
}

/// Salesforce REST client using the OAuth 2.0 username-password flow.
#[derive(Clone)]
pub struct SalesforceClient {
    client: Client,
}

impl SalesforceClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(config.provider_timeout)?,
        })
    }

    async fn authenticate(&self, credentials: &CrmCredentials) -> Result<TokenResponse, RawFailure> {
        let url = format!("{}/services/oauth2/token", credentials.login_url());
        let password = credentials.password_with_token();
        let redact = |text: &str| credentials.redact(text);

        tracing::info!("Authenticating with Salesforce at {}", credentials.login_url());

        let response = self
            .client
            .post(&url)
            .form(&[
                ("grant_type", "password"),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.expose_secret()),
                ("username", credentials.username.as_str()),
                ("password", password.as_str()),
            ])
            .send()
            .await
            .map_err(|e| send_failure(&e, redact))?;

        if !response.status().is_success() {
            return Err(status_failure(response, oauth_error_code, redact).await);
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| decode_failure(&e, "Salesforce token"))
    }
}

/// `{"error": "invalid_grant", "error_description": "authentication failure"}`
fn oauth_error_code(body: &serde_json::Value) -> Option<(String, String)> {
    let code = body.get("error")?.as_str()?;
    let message = body
        .get("error_description")
        .and_then(|d| d.as_str())
        .unwrap_or(code);
    Some((code.to_string(), message.to_string()))
}

/// `[{"errorCode": "INVALID_FIELD", "message": "...", "fields": [...]}]`
fn rest_error_code(body: &serde_json::Value) -> Option<(String, String)> {
    let first = match body {
        serde_json::Value::Array(items) => items.first()?,
        other => other,
    };
    let code = first.get("errorCode")?.as_str()?;
    let message = first
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or(code);
    Some((code.to_string(), message.to_string()))
}

#[async_trait]
impl CrmProvider for SalesforceClient {
    async fn mutate(
        &self,
        credentials: &CrmCredentials,
        mutation: &RecordMutation,
    ) -> Result<RecordMutated, RawFailure> {
        let token = self.authenticate(credentials).await?;
        let redact = |text: &str| credentials.redact(text);
        let base = format!(
            "{}/services/data/{}/sobjects/{}",
            token.instance_url.trim_end_matches('/'),
            SALESFORCE_API_VERSION,
            mutation.object_type
        );

        let request = match mutation.record_id.as_deref() {
            Some(id) => {
                tracing::info!("Updating Salesforce {} {}", mutation.object_type, id);
                self.client.patch(format!("{}/{}", base, id))
            }
            None => {
                tracing::info!("Creating Salesforce {}", mutation.object_type);
                self.client.post(format!("{}/", base))
            }
        };

        let response = request
            .bearer_auth(&token.access_token)
            .json(&mutation.fields)
            .send()
            .await
            .map_err(|e| send_failure(&e, redact))?;

        if !response.status().is_success() {
            let failure = status_failure(response, rest_error_code, redact).await;
            tracing::error!("Salesforce rejected {}: {}", mutation.object_type, failure);
            return Err(failure);
        }

        let record_id = match mutation.record_id.clone() {
            // Updates answer 204 No Content.
            Some(id) => id,
            None => {
                let created: CreateResponse = response
                    .json()
                    .await
                    .map_err(|e| decode_failure(&e, "Salesforce create"))?;
                match created.id {
                    Some(id) if created.success => id,
                    _ => {
                        let detail = created
                            .errors
                            .first()
                            .map(|e| e.to_string())
                            .unwrap_or_else(|| "no id returned".to_string());
                        return Err(RawFailure::new(
                            FailureSignal::Other,
                            redact(&format!("Record creation failed: {}", detail)),
                        ));
                    }
                }
            }
        };

        tracing::info!("✓ Salesforce {} {:?}: {}", mutation.object_type, mutation.operation(), record_id);
        Ok(RecordMutated {
            record_id,
            object_type: mutation.object_type.clone(),
            operation: mutation.operation(),
        })
    }
}
