//! reqwest-backed page fetcher
//!
//! Follows redirects, reports the post-redirect URL and status, and turns
//! HTML into title/date/text. PDFs are not parsed: the title comes from the
//! file name and the text is left empty.

use super::{PageFetcher, UpstreamError, UpstreamErrorKind};
use crate::extractors::html::{parse_html, title_from_file_name};
use crate::services::url_normalizer::parse_http_url;
use crate::types::CandidateResult;
use async_trait::async_trait;
use primsrc_common::{Error, Result};
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, CONTENT_TYPE};
use reqwest::redirect::Policy;
use reqwest::Client;
use std::time::Duration;

const DEFAULT_TIMEOUT_SECS: u64 = 20;
const CONNECT_TIMEOUT_SECS: u64 = 5;
const MAX_REDIRECTS: usize = 10;

/// Desktop browser UA; several press rooms refuse obvious bots
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) \
    AppleWebKit/537.36 (KHTML, like Gecko) Chrome/121.0.0.0 Safari/537.36";

/// HTTP page fetcher
pub struct HttpPageFetcher {
    client: Client,
}

impl HttpPageFetcher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
            .redirect(Policy::limited(MAX_REDIRECTS))
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for HttpPageFetcher {
    async fn fetch(&self, url: &str) -> std::result::Result<CandidateResult, UpstreamError> {
        let parsed = parse_http_url(url)
            .ok_or_else(|| UpstreamError::new(UpstreamErrorKind::Other, format!("not an http(s) URL: {}", url)))?;

        let started = std::time::Instant::now();
        let response = self
            .client
            .get(parsed)
            .header(ACCEPT, "text/html,application/xhtml+xml,application/pdf;q=0.9,*/*;q=0.8")
            .header(ACCEPT_LANGUAGE, "ca,es;q=0.9,en;q=0.8")
            .send()
            .await?;

        let status_code = response.status().as_u16();
        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let mut candidate = CandidateResult {
            requested_url: url.to_string(),
            final_url,
            status_code,
            content_type,
            page_title: None,
            page_date: None,
            text: String::new(),
        };

        if candidate.is_pdf() {
            candidate.page_title = title_from_file_name(&candidate.final_url);
        } else {
            let body = response.text().await?;
            let page = parse_html(&body);
            candidate.page_title = page.title;
            candidate.page_date = page.date;
            candidate.text = page.text;
        }

        tracing::debug!(
            url,
            final_url = %candidate.final_url,
            status = status_code,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Fetched candidate page"
        );

        Ok(candidate)
    }
}
