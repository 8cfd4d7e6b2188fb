//! Mail-provider remediation links.
//!
//! The table is data: a built-in copy ships with the binary and operators can
//! point `HELP_LINKS_FILE` at a replacement when providers move their help pages.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

const DEFAULT_TABLE: &str = include_str!("../config/help_links.json");

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ProviderLink {
    /// Key emitted in `helpful_links` (e.g. `gmail`).
    pub key: String,
    /// Username domains that identify this provider.
    pub domains: Vec<String>,
    /// SMTP hosts that identify this provider when the username is not an address.
    #[serde(default)]
    pub smtp_hosts: Vec<String>,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GenericLink {
    pub key: String,
    pub url: String,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct HelpLinks {
    pub providers: Vec<ProviderLink>,
    pub generic: GenericLink,
}

impl HelpLinks {
    /// The table compiled into the binary.
    pub fn builtin() -> Self {
        // The embedded file is covered by `builtin_table_parses`.
        Self::from_json(DEFAULT_TABLE).unwrap_or_else(|_| Self {
            providers: Vec::new(),
            generic: GenericLink {
                key: "smtp_auth".to_string(),
                url: "https://en.wikipedia.org/wiki/SMTP_Authentication".to_string(),
            },
        })
    }

    pub fn from_json(raw: &str) -> anyhow::Result<Self> {
        let table: HelpLinks = serde_json::from_str(raw)?;
        if table.providers.iter().any(|p| p.key.trim().is_empty()) {
            anyhow::bail!("help link entries must have a non-empty key");
        }
        Ok(table)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("cannot read {}: {}", path.display(), e))?;
        Self::from_json(&raw)
    }

    /// Finds the provider entry for a mail login.
    ///
    /// The username's domain wins; the SMTP host is consulted only when the
    /// username domain is not in the table.
    pub fn lookup(&self, username: &str, smtp_server: Option<&str>) -> Option<&ProviderLink> {
        let domain = username
            .rsplit_once('@')
            .map(|(_, d)| d.trim().to_ascii_lowercase());

        if let Some(domain) = domain.as_deref() {
            if let Some(found) = self
                .providers
                .iter()
                .find(|p| p.domains.iter().any(|d| d.eq_ignore_ascii_case(domain)))
            {
                return Some(found);
            }
        }

        let host = smtp_server?.trim().to_ascii_lowercase();
        self.providers
            .iter()
            .find(|p| p.smtp_hosts.iter().any(|h| h.eq_ignore_ascii_case(&host)))
    }

    /// Exactly one entry: the matching provider's link or the generic one.
    pub fn hints_for(&self, username: &str, smtp_server: Option<&str>) -> BTreeMap<String, String> {
        let mut hints = BTreeMap::new();
        match self.lookup(username, smtp_server) {
            Some(link) => hints.insert(link.key.clone(), link.url.clone()),
            None => hints.insert(self.generic.key.clone(), self.generic.url.clone()),
        };
        hints
    }
}

impl Default for HelpLinks {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_table_parses() {
        let table = HelpLinks::from_json(DEFAULT_TABLE).unwrap();
        let keys: Vec<_> = table.providers.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["gmail", "outlook", "yahoo"]);
    }

    #[test]
    fn username_domain_selects_single_provider() {
        let table = HelpLinks::builtin();
        let hints = table.hints_for("someone@GMAIL.com", Some("smtp.office365.com"));
        assert_eq!(hints.len(), 1);
        assert_eq!(
            hints.get("gmail").map(String::as_str),
            Some("https://myaccount.google.com/apppasswords")
        );
    }

    #[test]
    fn smtp_host_is_fallback() {
        let table = HelpLinks::builtin();
        let hints = table.hints_for("someone@company.test", Some("smtp.mail.yahoo.com"));
        assert_eq!(hints.keys().collect::<Vec<_>>(), vec!["yahoo"]);
    }

    #[test]
    fn unknown_provider_gets_generic_hint() {
        let table = HelpLinks::builtin();
        let hints = table.hints_for("admin", Some("mail.internal"));
        assert_eq!(hints.keys().collect::<Vec<_>>(), vec!["smtp_auth"]);
    }

    #[test]
    fn rejects_blank_keys() {
        let raw = r#"{"providers":[{"key":" ","domains":[],"url":"x"}],"generic":{"key":"g","url":"u"}}"#;
        assert!(HelpLinks::from_json(raw).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(HelpLinks::from_file(Path::new("/nonexistent/help_links.json")).is_err());
    }
}
