//! Provider Relay Library
//!
//! A thin HTTP relay in front of four third-party providers: SMTP mail,
//! an OpenAI-compatible text generation API, Salesforce and DuckDuckGo web
//! search. Callers supply credentials per request; every outcome is reported
//! through the same JSON envelope.
//!
//! # Modules
//!
//! - `api`: HTTP surface (handlers, routes, OpenAPI document).
//! - `core`: Validation, classification and shared types.
//! - `integrations`: Provider adapters.
//! - `classifier`: Maps raw provider failures onto error kinds.
//! - `config`: Configuration management.
//! - `credentials`: Per-request provider credentials.
//! - `crm_client`: Salesforce REST adapter.
//! - `envelope`: Success/failure response envelope.
//! - `errors`: Error taxonomy and failure envelope.
//! - `handlers`: HTTP request handlers.
//! - `help_links`: Remediation links for mail login failures.
//! - `http_client`: Shared reqwest plumbing.
//! - `llm_client`: Chat completions adapter.
//! - `mail_client`: SMTP adapter.
//! - `models`: Request and response models.
//! - `openapi`: Generated OpenAPI document.
//! - `providers`: Provider adapter traits.
//! - `routes`: Router construction.
//! - `search_client`: DuckDuckGo adapter.
//! - `validation`: Request validation.

pub mod api;
pub mod core;
pub mod integrations;

pub mod classifier;
pub mod config;
pub mod credentials;
pub mod crm_client;
pub mod envelope;
pub mod errors;
pub mod handlers;
pub mod help_links;
pub mod http_client;
pub mod llm_client;
pub mod mail_client;
pub mod models;
pub mod openapi;
pub mod providers;
pub mod routes;
pub mod search_client;
pub mod validation;
