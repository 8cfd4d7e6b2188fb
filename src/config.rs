use crate::credentials::{CrmCredentials, LlmCredentials, SmtpCredentials};
use secrecy::SecretString;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_LLM_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_SEARCH_BASE_URL: &str = "https://api.duckduckgo.com";

/// Server-side credentials used only when a request omits its own.
#[derive(Debug, Clone, Default)]
pub struct FallbackCredentials {
    pub smtp: Option<SmtpCredentials>,
    pub llm_api_key: Option<SecretString>,
    pub crm: Option<CrmCredentials>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Bound on every external provider call.
    pub provider_timeout: Duration,
    pub llm_base_url: String,
    pub llm_default_model: String,
    pub search_base_url: String,
    /// Advertised in the OpenAPI `servers` list when set.
    pub public_base_url: Option<String>,
    pub contact_email: String,
    pub help_links_file: Option<PathBuf>,
    pub fallback: FallbackCredentials,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            provider_timeout: Duration::from_secs(20),
            llm_base_url: DEFAULT_LLM_BASE_URL.to_string(),
            llm_default_model: DEFAULT_LLM_MODEL.to_string(),
            search_base_url: DEFAULT_SEARCH_BASE_URL.to_string(),
            public_base_url: None,
            contact_email: String::new(),
            help_links_file: None,
            fallback: FallbackCredentials::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        let config = Self::from_lookup(|key| std::env::var(key).ok())?;

        // Log successful configuration load (without sensitive values)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Server Port: {}", config.port);
        tracing::debug!(
            "Provider timeout: {}s",
            config.provider_timeout.as_secs()
        );
        tracing::debug!("LLM Base URL: {}", config.llm_base_url);
        tracing::debug!("Search Base URL: {}", config.search_base_url);
        if config.fallback.smtp.is_some() {
            tracing::info!("SMTP fallback credentials configured");
        }
        if config.fallback.llm_api_key.is_some() {
            tracing::info!("LLM fallback API key configured");
        }
        if config.fallback.crm.is_some() {
            tracing::info!("Salesforce fallback credentials configured");
        }

        Ok(config)
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        let port = match var("PORT") {
            Some(raw) => raw
                .trim()
                .parse::<u16>()
                .ok()
                .filter(|p| *p > 0)
                .ok_or_else(|| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            None => defaults.port,
        };

        let provider_timeout = match var("PROVIDER_TIMEOUT_SECS") {
            Some(raw) => {
                let secs: u64 = raw.trim().parse().map_err(|_| {
                    anyhow::anyhow!("PROVIDER_TIMEOUT_SECS must be a whole number of seconds")
                })?;
                if !(1..=120).contains(&secs) {
                    anyhow::bail!("PROVIDER_TIMEOUT_SECS must be between 1 and 120");
                }
                Duration::from_secs(secs)
            }
            None => defaults.provider_timeout,
        };

        let llm_base_url = http_url(var("LLM_BASE_URL"), "LLM_BASE_URL")?
            .unwrap_or(defaults.llm_base_url);
        let search_base_url = http_url(var("SEARCH_BASE_URL"), "SEARCH_BASE_URL")?
            .unwrap_or(defaults.search_base_url);
        let public_base_url = http_url(var("PUBLIC_BASE_URL"), "PUBLIC_BASE_URL")?;

        let smtp = match (var("SMTP_USERNAME"), var("SMTP_PASSWORD")) {
            (Some(username), Some(password)) => {
                let port = var("SMTP_PORT")
                    .unwrap_or_else(|| "587".to_string())
                    .trim()
                    .parse::<u16>()
                    .ok()
                    .filter(|p| *p > 0)
                    .ok_or_else(|| anyhow::anyhow!("SMTP_PORT must be between 1-65535"))?;
                Some(SmtpCredentials {
                    server: var("SMTP_SERVER").unwrap_or_else(|| "smtp.gmail.com".to_string()),
                    port,
                    username,
                    password: SecretString::from(password),
                    from_email: var("FROM_EMAIL"),
                })
            }
            (Some(_), None) | (None, Some(_)) => {
                anyhow::bail!("SMTP_USERNAME and SMTP_PASSWORD must be set together")
            }
            (None, None) => None,
        };

        let crm = match (
            var("SF_USERNAME"),
            var("SF_PASSWORD"),
            var("SF_CLIENT_ID"),
            var("SF_CLIENT_SECRET"),
        ) {
            (Some(username), Some(password), Some(client_id), Some(client_secret)) => {
                Some(CrmCredentials {
                    username,
                    password: SecretString::from(password),
                    security_token: SecretString::from(
                        var("SF_SECURITY_TOKEN").unwrap_or_default(),
                    ),
                    client_id,
                    client_secret: SecretString::from(client_secret),
                    domain: var("SF_DOMAIN").unwrap_or_else(|| "login".to_string()),
                })
            }
            (None, None, None, None) => None,
            _ => anyhow::bail!(
                "SF_USERNAME, SF_PASSWORD, SF_CLIENT_ID and SF_CLIENT_SECRET must be set together"
            ),
        };

        Ok(Self {
            port,
            provider_timeout,
            llm_base_url: llm_base_url.trim_end_matches('/').to_string(),
            llm_default_model: var("LLM_DEFAULT_MODEL").unwrap_or(defaults.llm_default_model),
            search_base_url: search_base_url.trim_end_matches('/').to_string(),
            public_base_url,
            contact_email: var("CONTACT_EMAIL").unwrap_or_default(),
            help_links_file: var("HELP_LINKS_FILE").map(PathBuf::from),
            fallback: FallbackCredentials {
                smtp,
                llm_api_key: var("LLM_API_KEY")
                    .or_else(|| var("OPENAI_API_KEY"))
                    .map(SecretString::from),
                crm,
            },
        })
    }

    /// Fallback LLM credentials for a model chosen by the request or the default.
    pub fn fallback_llm(&self, model: Option<String>) -> Option<LlmCredentials> {
        self.fallback.llm_api_key.clone().map(|api_key| LlmCredentials {
            api_key,
            model: model.unwrap_or_else(|| self.llm_default_model.clone()),
        })
    }
}

fn http_url(value: Option<String>, name: &str) -> anyhow::Result<Option<String>> {
    match value {
        Some(raw) => {
            let parsed = url::Url::parse(raw.trim())
                .map_err(|e| anyhow::anyhow!("{} is not a valid URL: {}", name, e))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                anyhow::bail!("{} must start with http:// or https://", name);
            }
            Ok(Some(raw.trim().to_string()))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = load(&[]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.provider_timeout, Duration::from_secs(20));
        assert_eq!(config.llm_base_url, DEFAULT_LLM_BASE_URL);
        assert!(config.fallback.smtp.is_none());
        assert!(config.fallback.crm.is_none());
        assert!(config.fallback_llm(None).is_none());
    }

    #[test]
    fn smtp_fallback_defaults_to_gmail_starttls() {
        let config = load(&[("SMTP_USERNAME", "bot@gmail.com"), ("SMTP_PASSWORD", "pw")]).unwrap();
        let smtp = config.fallback.smtp.unwrap();
        assert_eq!(smtp.server, "smtp.gmail.com");
        assert_eq!(smtp.port, 587);
        assert_eq!(smtp.sender(), "bot@gmail.com");
    }

    #[test]
    fn partial_smtp_fallback_is_rejected() {
        assert!(load(&[("SMTP_USERNAME", "bot@gmail.com")]).is_err());
    }

    #[test]
    fn openai_key_is_accepted_as_alias() {
        let config = load(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        let creds = config.fallback_llm(Some("gpt-4o".to_string())).unwrap();
        assert_eq!(creds.api_key.expose_secret(), "sk-test");
        assert_eq!(creds.model, "gpt-4o");
    }

    #[test]
    fn timeout_bounds_are_enforced() {
        assert!(load(&[("PROVIDER_TIMEOUT_SECS", "0")]).is_err());
        assert!(load(&[("PROVIDER_TIMEOUT_SECS", "121")]).is_err());
        let config = load(&[("PROVIDER_TIMEOUT_SECS", "15")]).unwrap();
        assert_eq!(config.provider_timeout, Duration::from_secs(15));
    }

    #[test]
    fn invalid_port_and_urls() {
        assert!(load(&[("PORT", "abc")]).is_err());
        assert!(load(&[("PORT", "0")]).is_err());
        assert!(load(&[("LLM_BASE_URL", "ftp://example.com")]).is_err());
        let config = load(&[("SEARCH_BASE_URL", "http://localhost:9000/")]).unwrap();
        assert_eq!(config.search_base_url, "http://localhost:9000");
    }

    #[test]
    fn crm_fallback_requires_core_fields() {
        assert!(load(&[("SF_USERNAME", "u")]).is_err());
        let config = load(&[
            ("SF_USERNAME", "u"),
            ("SF_PASSWORD", "p"),
            ("SF_CLIENT_ID", "id"),
            ("SF_CLIENT_SECRET", "secret"),
        ])
        .unwrap();
        let crm = config.fallback.crm.unwrap();
        assert_eq!(crm.domain, "login");
        assert_eq!(crm.security_token.expose_secret(), "");
    }
}
