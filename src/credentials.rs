//! Per-request credential carriers.
//!
//! Each carrier lives only for the duration of one request. Secret values are
//! wrapped in [`SecretString`] so they never show up in `Debug` output, and
//! every carrier can scrub its own secrets out of provider error text.

use secrecy::{ExposeSecret, SecretString};

const REDACTED: &str = "[REDACTED]";

/// SMTP relay login supplied in `smtp_config` or the server-side fallback.
#[derive(Clone, Debug)]
pub struct SmtpCredentials {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Sender address; the username is used when absent.
    pub from_email: Option<String>,
}

impl SmtpCredentials {
    pub fn sender(&self) -> &str {
        self.from_email.as_deref().unwrap_or(&self.username)
    }

    pub fn redact(&self, text: &str) -> String {
        redact_all(text, &[self.password.expose_secret()])
    }
}

/// API key and model for the text-generation provider.
#[derive(Clone, Debug)]
pub struct LlmCredentials {
    pub api_key: SecretString,
    pub model: String,
}

impl LlmCredentials {
    pub fn redact(&self, text: &str) -> String {
        redact_all(text, &[self.api_key.expose_secret()])
    }
}

/// Salesforce connected-app login supplied in `sf_config` or the fallback.
#[derive(Clone, Debug)]
pub struct CrmCredentials {
    pub username: String,
    pub password: SecretString,
    pub security_token: SecretString,
    pub client_id: String,
    pub client_secret: SecretString,
    /// `login`, `test`, a My Domain prefix, or a full base URL.
    pub domain: String,
}

impl CrmCredentials {
    /// Base URL of the OAuth login host for this org.
    pub fn login_url(&self) -> String {
        let domain = self.domain.trim().trim_end_matches('/');
        if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else if domain.ends_with(".salesforce.com") {
            format!("https://{}", domain)
        } else {
            format!("https://{}.salesforce.com", domain)
        }
    }

    /// The password grant expects the security token appended to the password.
    pub fn password_with_token(&self) -> String {
        format!(
            "{}{}",
            self.password.expose_secret(),
            self.security_token.expose_secret()
        )
    }

    pub fn redact(&self, text: &str) -> String {
        let combined = self.password_with_token();
        redact_all(
            text,
            &[
                combined.as_str(),
                self.password.expose_secret(),
                self.security_token.expose_secret(),
                self.client_secret.expose_secret(),
            ],
        )
    }
}

/// Secrets shorter than this are only replaced where they stand alone.
const SHORT_SECRET_LEN: usize = 4;

/// Replaces every occurrence of each non-empty secret with a placeholder.
fn redact_all(text: &str, secrets: &[&str]) -> String {
    let mut out = text.to_string();
    for secret in secrets {
        if secret.trim().is_empty() {
            continue;
        }
        out = if secret.chars().count() < SHORT_SECRET_LEN {
            replace_standalone(&out, secret)
        } else {
            out.replace(secret, REDACTED)
        };
    }
    out
}

/// Replaces occurrences of `secret` not flanked by letters or digits.
fn replace_standalone(text: &str, secret: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut last = 0;
    for (start, _) in text.match_indices(secret) {
        let end = start + secret.len();
        let before = text[..start].chars().next_back();
        let after = text[end..].chars().next();
        if before.is_some_and(char::is_alphanumeric) || after.is_some_and(char::is_alphanumeric) {
            continue;
        }
        out.push_str(&text[last..start]);
        out.push_str(REDACTED);
        last = end;
    }
    out.push_str(&text[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp() -> SmtpCredentials {
        SmtpCredentials {
            server: "smtp.gmail.com".to_string(),
            port: 587,
            username: "user@gmail.com".to_string(),
            password: SecretString::from("hunter22".to_string()),
            from_email: None,
        }
    }

    fn crm() -> CrmCredentials {
        CrmCredentials {
            username: "ops@example.com".to_string(),
            password: SecretString::from("pa55word".to_string()),
            security_token: SecretString::from("TOKEN123".to_string()),
            client_id: "client".to_string(),
            client_secret: SecretString::from("s3cr3t".to_string()),
            domain: "login".to_string(),
        }
    }

    #[test]
    fn debug_output_hides_secrets() {
        let rendered = format!("{:?}", smtp());
        assert!(!rendered.contains("hunter22"));
        assert!(rendered.contains("user@gmail.com"));

        let rendered = format!("{:?}", crm());
        assert!(!rendered.contains("pa55word"));
        assert!(!rendered.contains("TOKEN123"));
        assert!(!rendered.contains("s3cr3t"));
    }

    #[test]
    fn redact_scrubs_password() {
        let creds = smtp();
        assert_eq!(
            creds.redact("login hunter22 rejected"),
            "login [REDACTED] rejected"
        );
    }

    #[test]
    fn crm_redact_scrubs_combined_password() {
        let creds = crm();
        let text = creds.redact("bad password pa55wordTOKEN123 for client s3cr3t");
        assert_eq!(text, "bad password [REDACTED] for client [REDACTED]");
    }

    #[test]
    fn short_password_is_still_redacted() {
        let mut creds = smtp();
        creds.password = SecretString::from("pw".to_string());
        assert_eq!(
            creds.redact("535 rejected password 'pw' for user"),
            "535 rejected password '[REDACTED]' for user"
        );
        assert_eq!(creds.redact("pw"), "[REDACTED]");
        assert_eq!(creds.redact("login=pw;"), "login=[REDACTED];");
    }

    #[test]
    fn short_password_leaves_words_alone() {
        let mut creds = smtp();
        creds.password = SecretString::from("pw".to_string());
        let text = "upward pwned pw-less";
        assert_eq!(creds.redact(text), "upward pwned [REDACTED]-less");
    }

    #[test]
    fn empty_secret_is_ignored() {
        let mut creds = smtp();
        creds.password = SecretString::from(String::new());
        assert_eq!(creds.redact("nothing to hide"), "nothing to hide");
    }

    #[test]
    fn sender_defaults_to_username() {
        let mut creds = smtp();
        assert_eq!(creds.sender(), "user@gmail.com");
        creds.from_email = Some("noreply@example.com".to_string());
        assert_eq!(creds.sender(), "noreply@example.com");
    }

    #[test]
    fn login_url_variants() {
        let mut creds = crm();
        assert_eq!(creds.login_url(), "https://login.salesforce.com");
        creds.domain = "test".to_string();
        assert_eq!(creds.login_url(), "https://test.salesforce.com");
        creds.domain = "acme.my.salesforce.com".to_string();
        assert_eq!(creds.login_url(), "https://acme.my.salesforce.com");
        creds.domain = "http://127.0.0.1:9000/".to_string();
        assert_eq!(creds.login_url(), "http://127.0.0.1:9000");
    }
}
