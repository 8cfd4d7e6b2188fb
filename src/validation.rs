//! Request validation.
//!
//! Every action endpoint runs its body through here before any provider is
//! contacted. Validators either return the typed payload plus the credential
//! carrier for the call, or a `ValidationError` naming the first bad field.

use crate::config::Config;
use crate::credentials::{CrmCredentials, LlmCredentials, SmtpCredentials};
use crate::errors::ProviderFailure;
use crate::models::{EmailMessage, RecordMutation, SearchQuery, TextPrompt};
use regex::Regex;
use secrecy::SecretString;
use serde_json::{Map, Value};
use std::ops::RangeInclusive;
use std::sync::LazyLock;

pub const MAX_SEARCH_RESULTS: i64 = 25;
pub const DEFAULT_SEARCH_RESULTS: i64 = 5;
pub const MAX_QUERY_CHARS: usize = 500;
pub const MAX_GENERATION_TOKENS: i64 = 4096;
pub const DEFAULT_GENERATION_TOKENS: i64 = 512;

// RFC 5322 simplified: local@domain.tld
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9.!#$%&'*+/=?^_`{|}~-]+@[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?(?:\.[a-zA-Z0-9](?:[a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?)+$",
    )
    .expect("email regex is valid")
});

static OBJECT_TYPE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("object type regex is valid"));

static RECORD_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]{15}(?:[A-Za-z0-9]{3})?$").expect("record id regex is valid"));

/// Syntactic check for a single mailbox address.
pub fn is_valid_email(email: &str) -> bool {
    email.len() <= 254 && EMAIL_RE.is_match(email)
}

/// Succeeds when every field is present as a non-blank string; otherwise
/// names the first offending field in `fields` order.
pub fn require_fields(body: &Value, fields: &[&str]) -> Result<(), ProviderFailure> {
    require_fields_in(body, fields, "")
}

fn require_fields_in(body: &Value, fields: &[&str], prefix: &str) -> Result<(), ProviderFailure> {
    for field in fields {
        let name = format!("{}{}", prefix, field);
        match body.get(*field) {
            None | Some(Value::Null) => return Err(ProviderFailure::missing_field(&name)),
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(ProviderFailure::validation(format!(
                    "Field {} must not be empty",
                    name
                )))
            }
            Some(Value::String(_)) => {}
            Some(_) => {
                return Err(ProviderFailure::validation(format!(
                    "Field {} must be a string",
                    name
                )))
            }
        }
    }
    Ok(())
}

/// Reads an integer field given as a JSON number or numeric string.
///
/// Absent fields take `default`; with no default they are an error.
pub fn int_in_range(
    body: &Value,
    field: &str,
    range: RangeInclusive<i64>,
    default: Option<i64>,
) -> Result<i64, ProviderFailure> {
    int_in_range_named(body, field, field, range, default)
}

fn int_in_range_named(
    body: &Value,
    field: &str,
    name: &str,
    range: RangeInclusive<i64>,
    default: Option<i64>,
) -> Result<i64, ProviderFailure> {
    let parsed = match body.get(field) {
        None | Some(Value::Null) => {
            return default.ok_or_else(|| ProviderFailure::missing_field(name));
        }
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok(),
        Some(_) => None,
    };

    let value = parsed.ok_or_else(|| {
        ProviderFailure::validation(format!("Field {} must be an integer", name))
    })?;

    if !range.contains(&value) {
        return Err(ProviderFailure::validation(format!(
            "Field {} must be between {} and {}",
            name,
            range.start(),
            range.end()
        )));
    }
    Ok(value)
}

/// Optional float field, number or numeric string.
pub fn float_in_range(
    body: &Value,
    field: &str,
    range: RangeInclusive<f64>,
) -> Result<Option<f64>, ProviderFailure> {
    let parsed = match body.get(field) {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match parsed {
        Some(v) if v.is_finite() && range.contains(&v) => Ok(Some(v)),
        Some(_) => Err(ProviderFailure::validation(format!(
            "Field {} must be between {} and {}",
            field,
            range.start(),
            range.end()
        ))),
        None => Err(ProviderFailure::validation(format!(
            "Field {} must be a number",
            field
        ))),
    }
}

fn bool_field(body: &Value, field: &str) -> Result<bool, ProviderFailure> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(false),
        Some(Value::Bool(b)) => Ok(*b),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(true),
        Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(false),
        Some(_) => Err(ProviderFailure::validation(format!(
            "Field {} must be a boolean",
            field
        ))),
    }
}

/// Trimmed string, or `None` when absent, null or blank.
fn optional_string(body: &Value, field: &str) -> Result<Option<String>, ProviderFailure> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.trim().to_string())),
        Some(_) => Err(ProviderFailure::validation(format!(
            "Field {} must be a string",
            field
        ))),
    }
}

fn string_field(body: &Value, field: &str) -> String {
    body.get(field)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .unwrap_or_default()
}

/// Returns the embedded credentials object, if the caller supplied one.
fn embedded_object<'a>(body: &'a Value, field: &str) -> Result<Option<&'a Value>, ProviderFailure> {
    match body.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(v @ Value::Object(_)) => Ok(Some(v)),
        Some(_) => Err(ProviderFailure::validation(format!(
            "Field {} must be an object",
            field
        ))),
    }
}

fn object_of(body: &Value) -> Result<(), ProviderFailure> {
    if body.is_object() {
        Ok(())
    } else {
        Err(ProviderFailure::validation("Request body must be a JSON object"))
    }
}

/// POST /api/email/send
pub fn validate_email_request(
    body: &Value,
    config: &Config,
) -> Result<(EmailMessage, SmtpCredentials), ProviderFailure> {
    object_of(body)?;
    require_fields(body, &["to_email", "subject", "body"])?;

    let to_email = string_field(body, "to_email");
    if !is_valid_email(&to_email) {
        return Err(ProviderFailure::validation(format!(
            "Field to_email is not a valid email address: {}",
            to_email
        )));
    }

    let message = EmailMessage {
        to_email,
        subject: string_field(body, "subject"),
        // Body whitespace is content; only the emptiness check trims.
        body: body
            .get("body")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        is_html: bool_field(body, "is_html")?,
    };

    let credentials = match embedded_object(body, "smtp_config")? {
        Some(smtp) => {
            const PREFIX: &str = "smtp_config.";
            require_fields_in(smtp, &["smtp_server"], PREFIX)?;
            let port = int_in_range_named(smtp, "smtp_port", "smtp_config.smtp_port", 1..=65535, None)?;
            require_fields_in(smtp, &["smtp_username", "smtp_password"], PREFIX)?;
            SmtpCredentials {
                server: string_field(smtp, "smtp_server"),
                port: port as u16,
                username: string_field(smtp, "smtp_username"),
                password: SecretString::from(
                    smtp.get("smtp_password")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                ),
                from_email: optional_string(smtp, "from_email")?,
            }
        }
        None => config.fallback.smtp.clone().ok_or_else(|| {
            ProviderFailure::validation(
                "Missing required field: smtp_config (no server-side SMTP credentials are configured)",
            )
        })?,
    };

    if !is_valid_email(credentials.sender()) {
        return Err(ProviderFailure::validation(
            "Sender address is not a valid email address; set smtp_config.from_email",
        ));
    }

    Ok((message, credentials))
}

/// POST /api/llm/generate
pub fn validate_generate_request(
    body: &Value,
    config: &Config,
) -> Result<(TextPrompt, LlmCredentials), ProviderFailure> {
    object_of(body)?;
    require_fields(body, &["prompt"])?;

    let max_tokens = int_in_range(
        body,
        "max_tokens",
        1..=MAX_GENERATION_TOKENS,
        Some(DEFAULT_GENERATION_TOKENS),
    )?;
    let temperature = float_in_range(body, "temperature", 0.0..=2.0)?;
    let model = optional_string(body, "model")?;

    let credentials = match optional_string(body, "api_key")? {
        Some(key) => LlmCredentials {
            api_key: SecretString::from(key),
            model: model.unwrap_or_else(|| config.llm_default_model.clone()),
        },
        None => config.fallback_llm(model).ok_or_else(|| {
            ProviderFailure::validation(
                "Missing required field: api_key (no server-side API key is configured)",
            )
        })?,
    };

    let prompt = TextPrompt {
        prompt: body
            .get("prompt")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        system_prompt: optional_string(body, "system_prompt")?,
        max_tokens: max_tokens as u32,
        temperature: temperature.map(|t| t as f32),
    };

    Ok((prompt, credentials))
}

/// POST /api/crm/records and PATCH /api/crm/records/{object_type}/{record_id}.
///
/// For updates the path segments are passed in; for creates `object_type`
/// comes from the body.
pub fn validate_record_request(
    body: &Value,
    path: Option<(&str, &str)>,
    config: &Config,
) -> Result<(RecordMutation, CrmCredentials), ProviderFailure> {
    object_of(body)?;

    let (object_type, record_id) = match path {
        Some((object_type, record_id)) => {
            let record_id = record_id.trim();
            if !RECORD_ID_RE.is_match(record_id) {
                return Err(ProviderFailure::validation(
                    "record_id must be a 15 or 18 character Salesforce id",
                ));
            }
            (object_type.trim().to_string(), Some(record_id.to_string()))
        }
        None => {
            require_fields(body, &["object_type"])?;
            (string_field(body, "object_type"), None)
        }
    };

    if !OBJECT_TYPE_RE.is_match(&object_type) {
        return Err(ProviderFailure::validation(format!(
            "object_type is not a valid object name: {}",
            object_type
        )));
    }

    let fields: Map<String, Value> = match body.get("fields") {
        None | Some(Value::Null) => return Err(ProviderFailure::missing_field("fields")),
        Some(Value::Object(map)) if map.is_empty() => {
            return Err(ProviderFailure::validation("Field fields must not be empty"))
        }
        Some(Value::Object(map)) => map.clone(),
        Some(_) => return Err(ProviderFailure::validation("Field fields must be an object")),
    };

    let credentials = match embedded_object(body, "sf_config")? {
        Some(sf) => {
            require_fields_in(
                sf,
                &["username", "password", "client_id", "client_secret"],
                "sf_config.",
            )?;
            let secret = |field: &str| {
                SecretString::from(
                    sf.get(field)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                )
            };
            CrmCredentials {
                username: string_field(sf, "username"),
                password: secret("password"),
                security_token: secret("security_token"),
                client_id: string_field(sf, "client_id"),
                client_secret: secret("client_secret"),
                domain: optional_string(sf, "domain")?.unwrap_or_else(|| "login".to_string()),
            }
        }
        None => config.fallback.crm.clone().ok_or_else(|| {
            ProviderFailure::validation(
                "Missing required field: sf_config (no server-side Salesforce credentials are configured)",
            )
        })?,
    };

    Ok((
        RecordMutation {
            object_type,
            record_id,
            fields,
        },
        credentials,
    ))
}

/// POST /api/search
pub fn validate_search_request(body: &Value) -> Result<SearchQuery, ProviderFailure> {
    object_of(body)?;
    require_fields(body, &["query"])?;

    let query = string_field(body, "query");
    if query.chars().count() > MAX_QUERY_CHARS {
        return Err(ProviderFailure::validation(format!(
            "Field query must be at most {} characters",
            MAX_QUERY_CHARS
        )));
    }

    let max_results = int_in_range(
        body,
        "max_results",
        1..=MAX_SEARCH_RESULTS,
        Some(DEFAULT_SEARCH_RESULTS),
    )?;

    Ok(SearchQuery {
        query,
        max_results: max_results as usize,
    })
}
