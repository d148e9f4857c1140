//! Resolver policy configuration
//!
//! Every heuristic threshold lives here so it can be tuned per deployment
//! from the `[resolver]` table of the TOML file.

use primsrc_common::config::TomlConfig;
use primsrc_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry/backoff policy for external calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    /// Delay after the first failure; doubles on each further failure
    pub base_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 5000,
        }
    }
}

impl RetryPolicy {
    /// Backoff after `failed_attempt` (1-based): 5s, 10s, 20s, ...
    pub fn delay_after(&self, failed_attempt: u32) -> Duration {
        let exp = failed_attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.base_delay_ms.saturating_mul(1u64 << exp))
    }
}

/// Thresholds used by the candidate validator
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationPolicy {
    pub min_content_score: f32,
    pub min_title_score: f32,
    pub title_warning_score: f32,
    pub date_window_days: i64,
    pub short_content_chars: usize,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        ResolverConfig::default().validation_policy()
    }
}

/// Resolver configuration (`[resolver]` table)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Minimum content/keyword overlap for acceptance
    pub min_content_score: f32,
    /// Minimum title similarity for acceptance
    pub min_title_score: f32,
    /// Title similarity below which a mismatch warning is recorded
    pub title_warning_score: f32,
    /// Page date further than this from the article date is a warning
    pub date_window_days: i64,
    /// Extracted text shorter than this is a warning
    pub short_content_chars: usize,
    /// Cap on planned queries in tiers 1-6
    pub max_queries: usize,
    /// Cap on second-pass fallback queries (tier 7); 0 disables them
    pub max_fallback_queries: usize,
    /// Alternates returned beside the primary
    pub max_alternates: usize,
    /// Search hits fetched per query
    pub max_candidates_per_query: usize,
    /// Parallel page fetches within one query
    pub fetch_concurrency: usize,
    /// Overall per-article budget; `None` disables it
    pub time_budget_secs: Option<u64>,
    /// Title similarity needed for a registry fast-path hit
    pub registry_match_threshold: f32,
    /// Combined-score gap under which same-tier candidates count as tied
    pub tie_margin: f32,
    /// Minimum spacing between search service calls
    pub search_min_interval_ms: u64,
    /// Record the scraped article URL as a `news` source when nothing is found
    pub record_news_fallback: bool,
    /// Ceiling on SQLite lock retries
    pub max_lock_wait_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            min_content_score: 0.2,
            min_title_score: 0.4,
            title_warning_score: 0.3,
            date_window_days: 7,
            short_content_chars: 200,
            max_queries: 15,
            max_fallback_queries: 8,
            max_alternates: 2,
            max_candidates_per_query: 5,
            fetch_concurrency: 4,
            time_budget_secs: None,
            registry_match_threshold: 0.9,
            tie_margin: 0.05,
            search_min_interval_ms: 2000,
            record_news_fallback: true,
            max_lock_wait_ms: 5000,
            retry: RetryPolicy::default(),
        }
    }
}

impl ResolverConfig {
    /// Parse the `[resolver]` table of a loaded TOML config
    pub fn from_toml(toml_config: &TomlConfig) -> Result<Self> {
        let config: ResolverConfig = toml::Value::Table(toml_config.resolver.clone())
            .try_into()
            .map_err(|e| Error::Config(format!("Invalid [resolver] section: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make resolution meaningless
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("min_content_score", self.min_content_score),
            ("min_title_score", self.min_title_score),
            ("title_warning_score", self.title_warning_score),
            ("registry_match_threshold", self.registry_match_threshold),
            ("tie_margin", self.tie_margin),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{} must be within 0.0-1.0, got {}", name, value)));
            }
        }
        if self.date_window_days < 0 {
            return Err(Error::Config("date_window_days must not be negative".to_string()));
        }
        if self.max_queries == 0 {
            return Err(Error::Config("max_queries must be at least 1".to_string()));
        }
        if self.max_candidates_per_query == 0 || self.fetch_concurrency == 0 {
            return Err(Error::Config(
                "max_candidates_per_query and fetch_concurrency must be at least 1".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config("retry.max_attempts must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Thresholds handed to the validator
    pub fn validation_policy(&self) -> ValidationPolicy {
        ValidationPolicy {
            min_content_score: self.min_content_score,
            min_title_score: self.min_title_score,
            title_warning_score: self.title_warning_score,
            date_window_days: self.date_window_days,
            short_content_chars: self.short_content_chars,
        }
    }

    pub fn time_budget(&self) -> Option<Duration> {
        self.time_budget_secs.map(Duration::from_secs)
    }
}
