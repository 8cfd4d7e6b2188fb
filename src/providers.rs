//! One trait per external capability.
//!
//! Handlers only see these traits, so tests can swap in spies. Implementations
//! make exactly one attempt per call and report failures as [`RawFailure`]
//! with credential values already scrubbed from the message.

use crate::credentials::{CrmCredentials, LlmCredentials, SmtpCredentials};
use crate::errors::RawFailure;
use crate::models::{
    EmailMessage, MailSent, RecordMutated, RecordMutation, SearchQuery, SearchResults,
    TextGenerated, TextPrompt,
};
use async_trait::async_trait;
use serde::Serialize;
use std::fmt;

/// Which third-party service a call went to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    Mail,
    Text,
    Crm,
    Search,
}

impl Provider {
    /// Name used in user-facing messages.
    pub fn display_name(&self) -> &'static str {
        match self {
            Provider::Mail => "the SMTP server",
            Provider::Text => "the text generation API",
            Provider::Crm => "Salesforce",
            Provider::Search => "the search engine",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Provider::Mail => "mail",
            Provider::Text => "text",
            Provider::Crm => "crm",
            Provider::Search => "search",
        };
        f.write_str(name)
    }
}

#[async_trait]
pub trait MailProvider: Send + Sync {
    async fn send(
        &self,
        credentials: &SmtpCredentials,
        message: &EmailMessage,
    ) -> Result<MailSent, RawFailure>;
}

#[async_trait]
pub trait TextProvider: Send + Sync {
    async fn generate(
        &self,
        credentials: &LlmCredentials,
        prompt: &TextPrompt,
    ) -> Result<TextGenerated, RawFailure>;
}

#[async_trait]
pub trait CrmProvider: Send + Sync {
    /// Creates the record when `mutation.record_id` is `None`, updates it otherwise.
    async fn mutate(
        &self,
        credentials: &CrmCredentials,
        mutation: &RecordMutation,
    ) -> Result<RecordMutated, RawFailure>;
}

#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResults, RawFailure>;
}
