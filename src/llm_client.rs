use crate::config::Config;
use crate::credentials::LlmCredentials;
use crate::errors::{FailureSignal, RawFailure};
use crate::http_client::{build_client, decode_failure, send_failure, status_failure};
use crate::models::{TextGenerated, TextPrompt, TokenUsage};
use crate::providers::TextProvider;
use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<TokenUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChoiceMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

/// Client for an OpenAI-compatible chat completions API.
#[derive(Clone)]
pub struct ChatCompletionsClient {
    client: Client,
    base_url: String,
}

impl ChatCompletionsClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(config.provider_timeout)?,
            base_url: config.llm_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn request_body<'a>(credentials: &'a LlmCredentials, prompt: &'a TextPrompt) -> ChatRequest<'a> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = prompt.system_prompt.as_deref() {
            messages.push(ChatMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: &prompt.prompt,
        });

        ChatRequest {
            model: &credentials.model,
            messages,
            max_tokens: prompt.max_tokens,
            temperature: prompt.temperature,
        }
    }
}

/// `{"error": {"code": "...", "type": "...", "message": "..."}}`
fn provider_error_code(body: &serde_json::Value) -> Option<(String, String)> {
    let error = body.get("error")?;
    let message = error
        .get("message")
        .and_then(|m| m.as_str())
        .unwrap_or("provider error")
        .to_string();
    let code = error
        .get("code")
        .and_then(|c| c.as_str())
        .or_else(|| error.get("type").and_then(|t| t.as_str()))?;
    Some((code.to_string(), message))
}

#[async_trait]
impl TextProvider for ChatCompletionsClient {
    async fn generate(
        &self,
        credentials: &LlmCredentials,
        prompt: &TextPrompt,
    ) -> Result<TextGenerated, RawFailure> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::info!(
            "Requesting completion from {} (model: {}, max_tokens: {})",
            self.base_url,
            credentials.model,
            prompt.max_tokens
        );

        let redact = |text: &str| credentials.redact(text);

        let response = self
            .client
            .post(&url)
            .bearer_auth(credentials.api_key.expose_secret())
            .json(&Self::request_body(credentials, prompt))
            .send()
            .await
            .map_err(|e| send_failure(&e, redact))?;

        if !response.status().is_success() {
            let failure = status_failure(response, provider_error_code, redact).await;
            tracing::error!("Text generation API returned error: {}", failure);
            return Err(failure);
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|e| decode_failure(&e, "text generation"))?;

        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            RawFailure::new(
                FailureSignal::Other,
                "Text generation response contained no choices",
            )
        })?;

        tracing::info!("✓ Completion received ({:?})", choice.finish_reason);
        Ok(TextGenerated {
            text: choice.message.content.unwrap_or_default(),
            model: parsed.model.unwrap_or_else(|| credentials.model.clone()),
            finish_reason: choice.finish_reason,
            usage: parsed.usage,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;
    use serde_json::json;

    #[test]
    fn system_prompt_goes_first() {
        let creds = LlmCredentials {
            api_key: SecretString::from("sk".to_string()),
            model: "m".to_string(),
        };
        let prompt = TextPrompt {
            prompt: "question".to_string(),
            system_prompt: Some("be brief".to_string()),
            max_tokens: 10,
            temperature: None,
        };
        let body = serde_json::to_value(ChatCompletionsClient::request_body(&creds, &prompt)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "m",
                "messages": [
                    {"role": "system", "content": "be brief"},
                    {"role": "user", "content": "question"}
                ],
                "max_tokens": 10
            })
        );
    }

    #[test]
    fn error_code_falls_back_to_type() {
        let body = json!({"error": {"message": "slow down", "type": "rate_limit", "code": null}});
        assert_eq!(
            provider_error_code(&body),
            Some(("rate_limit".to_string(), "slow down".to_string()))
        );
        assert_eq!(provider_error_code(&json!({"detail": "x"})), None);
    }
}
