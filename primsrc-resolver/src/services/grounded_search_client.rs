//! Grounded web search client (Gemini `generateContent` + `google_search`)
//!
//! Each query becomes one grounded generation request. Candidate URLs are
//! taken from the grounding metadata first, then from URLs quoted in the
//! response text, in order of appearance.
//!
//! API documentation: https://ai.google.dev/gemini-api/docs/grounding

use super::{SearchProvider, UpstreamError, UpstreamErrorKind};
use crate::config::ResolverConfig;
use crate::types::{DateRange, SearchHit};
use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use once_cell::sync::Lazy;
use primsrc_common::config::{resolve_search_api_key, TomlConfig};
use primsrc_common::{Error, Result};
use regex::Regex;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const REQUEST_TIMEOUT_SECS: u64 = 180;

const SYSTEM_PROMPT: &str = "You locate primary sources for news articles. \
Use web search to find the original official document, press release, report or statement \
matching the query. Answer with a plain list of the most specific matching URLs, one per line, \
best match first. Never list homepages, section indexes or news coverage of the document.";

static URL_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r#"https?://[^\s"'<>\)\]]+"#).expect("valid url regex"));

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<GenerateCandidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateCandidate {
    content: Option<Content>,
    grounding_metadata: Option<GroundingMetadata>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<GroundingChunk>,
}

#[derive(Debug, Deserialize)]
struct GroundingChunk {
    web: Option<WebChunk>,
}

#[derive(Debug, Deserialize)]
struct WebChunk {
    uri: Option<String>,
    title: Option<String>,
}

type DirectLimiter =
    RateLimiter<governor::state::direct::NotKeyed, governor::state::InMemoryState, governor::clock::DefaultClock>;

/// Grounded search client
///
/// Rate limited to one request per configured interval; the limiter is
/// shared by every resolution using this client.
pub struct GroundedSearchClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    rate_limiter: Option<DirectLimiter>,
    max_results: usize,
}

impl GroundedSearchClient {
    pub fn new(api_key: impl Into<String>, min_interval: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: api_key.into(),
            rate_limiter: Quota::with_period(min_interval).map(RateLimiter::direct),
            max_results: 10,
        })
    }

    /// Build from loaded configuration (API key from env or TOML)
    pub fn from_config(toml_config: &TomlConfig, resolver_config: &ResolverConfig) -> Result<Self> {
        let api_key = resolve_search_api_key(toml_config)?;
        Self::new(
            api_key,
            Duration::from_millis(resolver_config.search_min_interval_ms),
        )
    }

    /// Point the client at a different endpoint (tests, proxies)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    fn user_prompt(query: &str, date_hint: Option<DateRange>) -> String {
        match date_hint {
            Some(range) => format!(
                "Search query: {}\nPrefer documents published between {} and {}.",
                query, range.from, range.to
            ),
            None => format!("Search query: {}", query),
        }
    }

    /// Collect hits from a decoded response, deduplicated by URL
    fn hits_from_response(&self, response: GenerateResponse) -> Vec<SearchHit> {
        let mut hits: Vec<SearchHit> = Vec::new();
        let mut push = |hit: SearchHit| {
            if hits.len() < self.max_results && !hits.iter().any(|h| h.url == hit.url) {
                hits.push(hit);
            }
        };

        for candidate in &response.candidates {
            let chunks = candidate
                .grounding_metadata
                .as_ref()
                .map(|m| m.grounding_chunks.as_slice())
                .unwrap_or_default();
            for web in chunks.iter().filter_map(|c| c.web.as_ref()) {
                if let Some(uri) = web.uri.as_deref() {
                    push(SearchHit {
                        url: uri.to_string(),
                        title: web.title.clone(),
                        snippet: None,
                    });
                }
            }
        }

        for candidate in &response.candidates {
            let parts = candidate
                .content
                .as_ref()
                .map(|c| c.parts.as_slice())
                .unwrap_or_default();
            for text in parts.iter().filter_map(|p| p.text.as_deref()) {
                for m in URL_RE.find_iter(text) {
                    let url = m.as_str().trim_end_matches(['.', ',', ';', ':']);
                    push(SearchHit::new(url));
                }
            }
        }

        hits
    }
}

#[async_trait]
impl SearchProvider for GroundedSearchClient {
    async fn search(
        &self,
        query: &str,
        date_hint: Option<DateRange>,
    ) -> std::result::Result<Vec<SearchHit>, UpstreamError> {
        if let Some(limiter) = &self.rate_limiter {
            limiter.until_ready().await;
        }

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let payload = json!({
            "systemInstruction": { "parts": [{ "text": SYSTEM_PROMPT }] },
            "contents": [{ "role": "user", "parts": [{ "text": Self::user_prompt(query, date_hint) }] }],
            "tools": [{ "google_search": {} }],
        });

        tracing::debug!(query, "Sending grounded search request");

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&payload)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(UpstreamError::new(
                UpstreamErrorKind::Status(status.as_u16()),
                body.chars().take(300).collect::<String>(),
            ));
        }

        let decoded: GenerateResponse = response
            .json()
            .await
            .map_err(|e| UpstreamError::new(UpstreamErrorKind::Parse, e.to_string()))?;

        let hits = self.hits_from_response(decoded);
        tracing::debug!(query, hits = hits.len(), "Grounded search returned candidates");
        Ok(hits)
    }

    fn name(&self) -> &str {
        "grounded_search"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GroundedSearchClient {
        GroundedSearchClient::new("test-key", Duration::ZERO).unwrap()
    }

    #[test]
    fn test_zero_interval_disables_rate_limit() {
        assert!(client().rate_limiter.is_none());
        let limited = GroundedSearchClient::new("k", Duration::from_millis(2000)).unwrap();
        assert!(limited.rate_limiter.is_some());
    }

    #[test]
    fn test_hits_from_grounding_then_text() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Best match:\nhttps://govern.cat/gov/notes-premsa/691002/calendari.\nAlso https://govern.cat/a" }] },
                "groundingMetadata": { "groundingChunks": [
                    { "web": { "uri": "https://govern.cat/a", "title": "govern.cat" } }
                ]}
            }]
        }))
        .unwrap();

        let hits = client().hits_from_response(response);
        let urls: Vec<&str> = hits.iter().map(|h| h.url.as_str()).collect();
        assert_eq!(
            urls,
            vec!["https://govern.cat/a", "https://govern.cat/gov/notes-premsa/691002/calendari"]
        );
        assert_eq!(hits[0].title.as_deref(), Some("govern.cat"));
    }

    #[test]
    fn test_empty_response_yields_no_hits() {
        let response: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert!(client().hits_from_response(response).is_empty());
    }

    #[test]
    fn test_prompt_includes_date_range() {
        let day = chrono::NaiveDate::from_ymd_opt(2025, 11, 10).unwrap();
        let prompt = GroundedSearchClient::user_prompt("calendari", Some(DateRange::around(day, 7)));
        assert!(prompt.contains("2025-11-03"));
        assert!(prompt.contains("2025-11-17"));
    }
}
