//! Test helper utilities
//!
//! In-memory search and fetch collaborators with call counters, plus
//! fixtures for the waterfall tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use primsrc_resolver::types::DateRange;
use primsrc_resolver::{
    ArticleContext, CandidateResult, PageFetcher, ResolverConfig, RetryPolicy, SearchHit, SearchProvider,
    SourceRegistry, UpstreamError, WaterfallController,
};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

static LOGGING: Once = Once::new();

/// Route test logs through the test writer (RUST_LOG to see them)
pub fn init_test_logging() {
    LOGGING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Resolver config with millisecond backoff
pub fn fast_config() -> ResolverConfig {
    ResolverConfig {
        retry: RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
        },
        ..ResolverConfig::default()
    }
}

// ============================================================================
// Search
// ============================================================================

/// Search double: the first rule whose needle appears in the query answers
pub struct MockSearchProvider {
    rules: Vec<(String, Vec<SearchHit>)>,
    failing_rules: Vec<(String, UpstreamError)>,
    default_hits: Vec<SearchHit>,
    failure: Option<UpstreamError>,
    delay: Option<Duration>,
    calls: Mutex<Vec<String>>,
}

impl MockSearchProvider {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            failing_rules: Vec::new(),
            default_hits: Vec::new(),
            failure: None,
            delay: None,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on(mut self, needle: &str, urls: &[&str]) -> Self {
        self.rules
            .push((needle.to_string(), urls.iter().map(|u| SearchHit::new(*u)).collect()));
        self
    }

    pub fn default_hits(mut self, urls: &[&str]) -> Self {
        self.default_hits = urls.iter().map(|u| SearchHit::new(*u)).collect();
        self
    }

    /// Every call fails with `error`
    pub fn failing(mut self, error: UpstreamError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Queries containing `needle` fail with `error`; checked before `on` rules
    pub fn fail_on(mut self, needle: &str, error: UpstreamError) -> Self {
        self.failing_rules.push((needle.to_string(), error));
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl SearchProvider for MockSearchProvider {
    async fn search(&self, query: &str, _date_hint: Option<DateRange>) -> Result<Vec<SearchHit>, UpstreamError> {
        self.calls.lock().unwrap().push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if let Some((_, error)) = self
            .failing_rules
            .iter()
            .find(|(needle, _)| query.contains(needle.as_str()))
        {
            return Err(error.clone());
        }
        Ok(self
            .rules
            .iter()
            .find(|(needle, _)| query.contains(needle.as_str()))
            .map(|(_, hits)| hits.clone())
            .unwrap_or_else(|| self.default_hits.clone()))
    }

    fn name(&self) -> &str {
        "mock_search"
    }
}

// ============================================================================
// Fetch
// ============================================================================

/// Fetch double: known URLs return their page, unknown ones a 404
pub struct MockPageFetcher {
    pages: HashMap<String, CandidateResult>,
    failure: Option<UpstreamError>,
    unreachable: HashSet<String>,
    calls: Mutex<Vec<String>>,
}

impl MockPageFetcher {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            failure: None,
            unreachable: HashSet::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn page(mut self, page: CandidateResult) -> Self {
        self.pages.insert(page.requested_url.clone(), page);
        self
    }

    /// Every fetch fails with `error`
    pub fn failing(mut self, error: UpstreamError) -> Self {
        self.failure = Some(error);
        self
    }

    /// Fetches of `url` fail with a connection error
    pub fn unreachable(mut self, url: &str) -> Self {
        self.unreachable.insert(url.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl PageFetcher for MockPageFetcher {
    async fn fetch(&self, url: &str) -> Result<CandidateResult, UpstreamError> {
        self.calls.lock().unwrap().push(url.to_string());
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        if self.unreachable.contains(url) {
            return Err(UpstreamError::connection(format!("{} unreachable", url)));
        }
        Ok(self.pages.get(url).cloned().unwrap_or_else(|| CandidateResult {
            requested_url: url.to_string(),
            final_url: url.to_string(),
            status_code: 404,
            content_type: Some("text/html".to_string()),
            page_title: Some("Not Found".to_string()),
            page_date: None,
            text: "Not Found".to_string(),
        }))
    }
}

/// 200 HTML page at `url`
pub fn html_page(url: &str, title: &str, date: Option<NaiveDate>, text: &str) -> CandidateResult {
    CandidateResult {
        requested_url: url.to_string(),
        final_url: url.to_string(),
        status_code: 200,
        content_type: Some("text/html; charset=utf-8".to_string()),
        page_title: Some(title.to_string()),
        page_date: date,
        text: text.to_string(),
    }
}

pub fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn controller(
    search: &Arc<MockSearchProvider>,
    pages: &Arc<MockPageFetcher>,
    registry: &Arc<SourceRegistry>,
    config: ResolverConfig,
) -> WaterfallController {
    WaterfallController::new(search.clone(), pages.clone(), registry.clone(), config)
}

// ============================================================================
// Fixtures: Govern festive-calendar press release
// ============================================================================

pub const GOVERN_TITLE: &str = "Govern aprova calendari festes laborals per l'any 2026";
pub const GOVERN_PUBLISHER: &str = "Govern de la Generalitat";
pub const GOVERN_OLD_URL: &str =
    "https://govern.cat/gov/notes-premsa/445831/govern-aprova-calendari-festes-laborals-lany-2026";
pub const GOVERN_NEW_URL: &str =
    "https://govern.cat/gov/notes-premsa/691002/govern-aprova-calendari-festes-laborals-lany-2026";

pub const GOVERN_BODY: &str = "El Govern de la Generalitat ha aprovat el calendari de festes laborals \
per a l'any 2026 a Catalunya. Les festes laborals seran dotze, amb el dilluns de Pasqua Florida, \
la revetlla de Sant Joan i la Diada Nacional de Catalunya. Els municipis podran fixar dues festes locals.";

pub const GOVERN_PAGE_TEXT: &str = "El Govern de la Generalitat aprova el calendari de festes laborals \
per a l'any 2026 a Catalunya. El calendari fixa dotze festes laborals: el dilluns de Pasqua Florida, \
la revetlla de Sant Joan, la Diada Nacional de Catalunya i Sant Esteve. Cada municipi podrà fixar \
dues festes locals addicionals, que proposarà el ple de l'ajuntament.";

pub fn govern_article() -> ArticleContext {
    ArticleContext::new(GOVERN_TITLE, GOVERN_PUBLISHER)
        .with_id("article-2025-11-10-festes")
        .with_body(GOVERN_BODY)
        .with_date(ymd(2025, 11, 10))
        .with_language("ca")
}

/// The two numeric-ID siblings: stale 2023 page and the current one
pub fn govern_fetcher() -> MockPageFetcher {
    MockPageFetcher::new()
        .page(html_page(
            GOVERN_OLD_URL,
            "El Govern aprova el calendari de festes laborals per a l'any 2026",
            Some(ymd(2023, 11, 2)),
            GOVERN_PAGE_TEXT,
        ))
        .page(html_page(
            GOVERN_NEW_URL,
            "El Govern aprova el calendari de festes laborals per a l'any 2026",
            Some(ymd(2025, 11, 10)),
            GOVERN_PAGE_TEXT,
        ))
}
