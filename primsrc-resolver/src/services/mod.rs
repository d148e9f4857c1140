//! External collaborator boundary
//!
//! The engine consumes two services: a web search/grounding service and an
//! HTTP page fetcher. Both sit behind traits so the waterfall can be driven
//! by the reqwest-backed clients in production and by in-memory doubles in
//! tests.

pub mod candidate_fetcher;
pub mod grounded_search_client;
pub mod http_fetcher;
pub mod url_normalizer;

pub use candidate_fetcher::{CandidateFetcher, FetchedCandidate, QueryCandidates};
pub use grounded_search_client::GroundedSearchClient;
pub use http_fetcher::HttpPageFetcher;

use crate::types::{CandidateResult, DateRange, SearchHit};
use async_trait::async_trait;
use std::fmt;

/// Failure category reported by a collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamErrorKind {
    Timeout,
    Connection,
    /// Non-success HTTP status from the service itself
    Status(u16),
    /// Response arrived but could not be decoded
    Parse,
    Other,
}

/// Error from a search or fetch collaborator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamError {
    pub kind: UpstreamErrorKind,
    pub message: String,
}

impl UpstreamError {
    pub fn new(kind: UpstreamErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Timeout, message)
    }

    pub fn connection(message: impl Into<String>) -> Self {
        Self::new(UpstreamErrorKind::Connection, message)
    }

    /// Timeout/connection-class failures worth retrying
    ///
    /// Rate limiting and gateway errors count as transient; other statuses
    /// and parse failures do not.
    pub fn is_transient(&self) -> bool {
        match self.kind {
            UpstreamErrorKind::Timeout | UpstreamErrorKind::Connection => true,
            UpstreamErrorKind::Status(code) => matches!(code, 429 | 502 | 503 | 504),
            UpstreamErrorKind::Parse | UpstreamErrorKind::Other => false,
        }
    }
}

impl fmt::Display for UpstreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            UpstreamErrorKind::Timeout => write!(f, "timeout: {}", self.message),
            UpstreamErrorKind::Connection => write!(f, "connection failed: {}", self.message),
            UpstreamErrorKind::Status(code) => write!(f, "HTTP {}: {}", code, self.message),
            UpstreamErrorKind::Parse => write!(f, "unparseable response: {}", self.message),
            UpstreamErrorKind::Other => write!(f, "{}", self.message),
        }
    }
}

impl std::error::Error for UpstreamError {}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            UpstreamErrorKind::Timeout
        } else if err.is_connect() {
            UpstreamErrorKind::Connection
        } else if let Some(status) = err.status() {
            UpstreamErrorKind::Status(status.as_u16())
        } else if err.is_decode() || err.is_body() {
            UpstreamErrorKind::Parse
        } else {
            UpstreamErrorKind::Other
        };
        Self::new(kind, err.to_string())
    }
}

/// Web search / grounding service
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Run one query, returning candidate URLs in service order
    async fn search(
        &self,
        query: &str,
        date_hint: Option<DateRange>,
    ) -> Result<Vec<SearchHit>, UpstreamError>;

    /// Name used in logs and `UpstreamUnavailable` errors
    fn name(&self) -> &str {
        "search"
    }
}

/// HTTP fetcher
///
/// Must follow redirects and report the post-redirect URL. A non-2xx status
/// is a successful fetch carrying that status, not an error.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<CandidateResult, UpstreamError>;

    fn name(&self) -> &str {
        "fetch"
    }
}
