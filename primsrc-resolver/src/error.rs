//! Error types for primsrc-resolver
//!
//! Only infrastructure failures are errors. "Nothing relevant was found" is
//! the `NotFound` variant of [`crate::types::ResolutionResult`], and content
//! problems with a candidate are recorded as validation issues.

use crate::services::UpstreamError;
use thiserror::Error;

/// Resolution error
#[derive(Debug, Error)]
pub enum ResolveError {
    /// Search or fetch service still failing after every retry
    #[error("{service} unavailable after {attempts} attempt(s): {last_error}")]
    UpstreamUnavailable {
        service: String,
        attempts: u32,
        last_error: UpstreamError,
    },

    /// The article cannot be resolved at all (e.g. empty title and publisher)
    #[error("Invalid article: {0}")]
    InvalidArticle(String),

    /// Registry store failure
    #[error("Registry error: {0}")]
    Registry(#[from] primsrc_common::Error),
}

impl ResolveError {
    /// True for errors a caller may retry later
    pub fn is_retryable(&self) -> bool {
        matches!(self, ResolveError::UpstreamUnavailable { .. })
    }
}

/// Result type for resolution operations
pub type ResolveResult<T> = Result<T, ResolveError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::UpstreamErrorKind;

    #[test]
    fn test_upstream_unavailable_is_retryable() {
        let err = ResolveError::UpstreamUnavailable {
            service: "search".to_string(),
            attempts: 3,
            last_error: UpstreamError::new(UpstreamErrorKind::Timeout, "deadline exceeded"),
        };
        assert!(err.is_retryable());
        assert!(err.to_string().contains("after 3 attempt(s)"));
    }

    #[test]
    fn test_invalid_article_not_retryable() {
        assert!(!ResolveError::InvalidArticle("empty".to_string()).is_retryable());
    }
}
