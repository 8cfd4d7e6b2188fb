use crate::config::Config;
use crate::errors::{FailureSignal, RawFailure};
use crate::http_client::{build_client, decode_failure, send_failure, status_failure};
use crate::models::{SearchHit, SearchQuery, SearchResults};
use crate::providers::SearchProvider;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

/// DuckDuckGo Instant Answer payload (only the fields we read).
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(default)]
    results: Vec<Topic>,
    #[serde(default)]
    related_topics: Vec<Topic>,
}

/// Either a single result or a named group of nested topics.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Topic {
    #[serde(rename = "FirstURL")]
    first_url: Option<String>,
    text: Option<String>,
    #[serde(default)]
    topics: Vec<Topic>,
}

/// Public web search over the DuckDuckGo Instant Answer API.
#[derive(Clone)]
pub struct DuckDuckGoClient {
    client: Client,
    base_url: String,
}

impl DuckDuckGoClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            client: build_client(config.provider_timeout)?,
            base_url: config.search_base_url.trim_end_matches('/').to_string(),
        })
    }
}

fn hit_from_text(url: &str, text: &str) -> SearchHit {
    let title = text
        .split_once(" - ")
        .map(|(title, _)| title)
        .unwrap_or(text)
        .trim()
        .to_string();
    SearchHit {
        title,
        url: url.to_string(),
        snippet: text.trim().to_string(),
    }
}

fn collect_topics(topics: &[Topic], out: &mut Vec<SearchHit>) {
    for topic in topics {
        if let (Some(url), Some(text)) = (topic.first_url.as_deref(), topic.text.as_deref()) {
            if !url.is_empty() && !text.is_empty() {
                out.push(hit_from_text(url, text));
            }
        }
        collect_topics(&topic.topics, out);
    }
}

/// Abstract first, then direct results, then related topics depth-first.
fn flatten(answer: &InstantAnswer, limit: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();
    if !answer.abstract_url.is_empty() && !answer.abstract_text.is_empty() {
        hits.push(SearchHit {
            title: answer.heading.clone(),
            url: answer.abstract_url.clone(),
            snippet: answer.abstract_text.clone(),
        });
    }
    collect_topics(&answer.results, &mut hits);
    collect_topics(&answer.related_topics, &mut hits);

    let mut seen = std::collections::HashSet::new();
    hits.retain(|hit| seen.insert(hit.url.clone()));
    hits.truncate(limit);
    hits
}

#[async_trait]
impl SearchProvider for DuckDuckGoClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResults, RawFailure> {
        // Build URL with proper parameter encoding
        let url = reqwest::Url::parse_with_params(
            &format!("{}/", self.base_url),
            &[
                ("q", query.query.as_str()),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ],
        )
        .map_err(|e| {
            RawFailure::new(
                FailureSignal::Other,
                format!("Failed to build search URL: {}", e),
            )
        })?;

        tracing::info!("Searching for '{}' (max {})", query.query, query.max_results);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| send_failure(&e, str::to_string))?;

        if !response.status().is_success() {
            let failure = status_failure(response, |_| None, str::to_string).await;
            tracing::error!("Search API returned error: {}", failure);
            return Err(failure);
        }

        // The API labels its JSON as javascript, so decode from text.
        let answer: InstantAnswer = match response.text().await {
            Ok(text) if text.trim().is_empty() => InstantAnswer::default(),
            Ok(text) => serde_json::from_str(&text).map_err(|e| {
                RawFailure::new(
                    FailureSignal::Other,
                    format!("Failed to parse search response: {}", e),
                )
            })?,
            Err(e) => return Err(decode_failure(&e, "search")),
        };

        let results = flatten(&answer, query.max_results);
        tracing::info!("✓ Search returned {} result(s)", results.len());
        Ok(SearchResults {
            query: query.query.clone(),
            count: results.len(),
            results,
        })
    }
}
