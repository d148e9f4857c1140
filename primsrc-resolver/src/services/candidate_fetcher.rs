//! Candidate fetcher: one query → search hits → fetched pages
//!
//! Search and fetch calls go through the retry wrapper. Pages for one query
//! are fetched concurrently but returned in search-result order, so the
//! caller's choice stays deterministic.

use super::url_normalizer::{candidate_variants, normalize_url};
use super::{PageFetcher, SearchProvider};
use crate::config::{ResolverConfig, RetryPolicy};
use crate::types::{CandidateQuery, CandidateResult, DateRange, SearchHit};
use crate::utils::retry::{with_retry, RetryExhausted};
use futures::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of fetching one search hit
#[derive(Debug, Clone)]
pub enum FetchedCandidate {
    /// Page fetched (any HTTP status)
    Page(CandidateResult),
    /// Fetch failed for good, variants included
    Failed { url: String, error: RetryExhausted },
    /// Search returned something that is not an http(s) URL
    InvalidUrl { url: String },
}

impl FetchedCandidate {
    pub fn url(&self) -> &str {
        match self {
            Self::Page(page) => &page.requested_url,
            Self::Failed { url, .. } | Self::InvalidUrl { url } => url,
        }
    }

    /// Failed at transport level (timeout/connection) after retries
    pub fn is_transport_failure(&self) -> bool {
        matches!(self, Self::Failed { error, .. } if error.is_transient())
    }
}

/// Everything fetched for one query
#[derive(Debug, Clone)]
pub struct QueryCandidates {
    pub query: CandidateQuery,
    /// Hits returned by the search service, before dedupe
    pub hit_count: usize,
    pub candidates: Vec<FetchedCandidate>,
}

/// Search + fetch boundary used by the waterfall
pub struct CandidateFetcher {
    search: Arc<dyn SearchProvider>,
    fetcher: Arc<dyn PageFetcher>,
    retry: RetryPolicy,
    max_candidates_per_query: usize,
    fetch_concurrency: usize,
}

impl CandidateFetcher {
    pub fn new(search: Arc<dyn SearchProvider>, fetcher: Arc<dyn PageFetcher>, config: &ResolverConfig) -> Self {
        Self {
            search,
            fetcher,
            retry: config.retry.clone(),
            max_candidates_per_query: config.max_candidates_per_query.max(1),
            fetch_concurrency: config.fetch_concurrency.max(1),
        }
    }

    /// Run the search for one query, with retries
    pub async fn search(
        &self,
        query: &CandidateQuery,
        date_hint: Option<DateRange>,
    ) -> Result<Vec<SearchHit>, RetryExhausted> {
        let service = self.search.name().to_string();
        with_retry(&service, &self.retry, || self.search.search(&query.text, date_hint)).await
    }

    /// Search, then fetch up to `max_candidates_per_query` hits not yet seen
    /// in this run
    ///
    /// `seen` holds normalised URLs already handled by earlier queries.
    pub async fn run_query(
        &self,
        query: &CandidateQuery,
        date_hint: Option<DateRange>,
        seen: &mut HashSet<String>,
    ) -> Result<QueryCandidates, RetryExhausted> {
        let hits = self.search(query, date_hint).await?;
        let hit_count = hits.len();

        let mut targets: Vec<Result<String, String>> = Vec::new();
        for hit in hits {
            if targets.len() >= self.max_candidates_per_query {
                break;
            }
            match normalize_url(&hit.url) {
                Some(normalized) => {
                    if seen.insert(normalized.clone()) {
                        targets.push(Ok(normalized));
                    }
                }
                None => targets.push(Err(hit.url)),
            }
        }

        let candidates = stream::iter(targets)
            .map(|target| async move {
                match target {
                    Ok(url) => self.fetch_with_variants(&url).await,
                    Err(url) => FetchedCandidate::InvalidUrl { url },
                }
            })
            .buffered(self.fetch_concurrency)
            .collect::<Vec<_>>()
            .await;

        tracing::debug!(
            query = %query.text,
            tier = query.tier,
            hits = hit_count,
            fetched = candidates.len(),
            "Query candidates fetched"
        );

        Ok(QueryCandidates {
            query: query.clone(),
            hit_count,
            candidates,
        })
    }

    /// Fetch one URL; on failure or an error status, try its variants
    ///
    /// The first variant answering with a success status replaces the
    /// candidate. Otherwise the original outcome is kept.
    pub async fn fetch_with_variants(&self, url: &str) -> FetchedCandidate {
        let primary = self.fetch_once(url).await;
        let needs_fallback = match &primary {
            FetchedCandidate::Page(page) => page.status_code >= 400,
            _ => true,
        };
        if !needs_fallback {
            return primary;
        }

        for variant in candidate_variants(url) {
            if let FetchedCandidate::Page(page) = self.fetch_once(&variant).await {
                if (200..400).contains(&page.status_code) {
                    tracing::debug!(url, variant = %variant, "Using URL variant for candidate");
                    return FetchedCandidate::Page(page);
                }
            }
        }
        primary
    }

    async fn fetch_once(&self, url: &str) -> FetchedCandidate {
        let service = self.fetcher.name().to_string();
        match with_retry(&service, &self.retry, || self.fetcher.fetch(url)).await {
            Ok(page) => FetchedCandidate::Page(page),
            Err(error) => {
                tracing::debug!(url, error = %error.last_error, "Candidate fetch failed");
                FetchedCandidate::Failed {
                    url: url.to_string(),
                    error,
                }
            }
        }
    }
}
