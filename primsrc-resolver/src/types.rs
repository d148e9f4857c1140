//! Shared types and data contracts between the resolver stages
//!
//! Flow: `ArticleContext` → `Entities` → `CandidateQuery` list →
//! `SearchHit` → `CandidateResult` → `ValidationOutcome` → `ResolutionResult`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Input
// ============================================================================

/// Article metadata a primary source is looked up for
///
/// Built once per resolution request and only read afterwards.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArticleContext {
    /// Caller's identifier, used for registry references
    pub article_id: Option<String>,
    pub title: String,
    pub publisher: String,
    /// Body text or snippet
    pub body: String,
    pub published: Option<NaiveDate>,
    /// Keywords the source is expected to contain
    pub expected_keywords: Vec<String>,
    /// URL of the scraped (secondary) article
    pub source_url: Option<String>,
    /// Kind of document the article is based on ("report", "survey", ...)
    pub artifact_type: Option<String>,
    /// Short topic phrase from upstream analysis
    pub core_topic: Option<String>,
    /// Key claims pulled out upstream, most important first
    pub key_claims: Vec<String>,
    /// ISO 639-1 code when known
    pub language: Option<String>,
    /// Input file name, recorded with registry references
    pub filename: Option<String>,
}

impl ArticleContext {
    pub fn new(title: impl Into<String>, publisher: impl Into<String>) -> Self {
        Self {
            title: title.into().trim().to_string(),
            publisher: publisher.into().trim().to_string(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.article_id = Some(id.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.published = Some(date);
        self
    }

    pub fn with_expected_keywords(mut self, keywords: Vec<String>) -> Self {
        self.expected_keywords = keywords;
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    pub fn with_artifact_type(mut self, artifact: impl Into<String>) -> Self {
        self.artifact_type = Some(artifact.into());
        self
    }

    pub fn with_core_topic(mut self, topic: impl Into<String>) -> Self {
        self.core_topic = Some(topic.into());
        self
    }

    pub fn with_key_claims(mut self, claims: Vec<String>) -> Self {
        self.key_claims = claims;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    /// Identifier used in registry references ("unknown" when absent)
    pub fn reference_id(&self) -> String {
        self.article_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

// ============================================================================
// Entity extraction
// ============================================================================

/// Structured signals pulled out of an article
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Entities {
    /// Bare years and "month year" phrases
    pub dates: Vec<String>,
    /// Percentages and magnitude expressions
    pub numbers: Vec<String>,
    pub locations: Vec<String>,
    pub organizations: Vec<String>,
    /// Inferred or supplied language code
    pub language: Option<String>,
}

impl Entities {
    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
            && self.numbers.is_empty()
            && self.locations.is_empty()
            && self.organizations.is_empty()
    }
}

// ============================================================================
// Queries
// ============================================================================

/// What kind of evidence a query targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryClass {
    ExactTitle,
    PublisherDoctype,
    DomainPattern,
    SourceDomain,
    ArtifactType,
    ClaimSnippet,
    NumericData,
    /// Broad second-pass searches: official domains, topic, web archive
    Fallback,
}

impl QueryClass {
    /// Priority tier: 1 is most specific
    pub fn tier(self) -> u8 {
        match self {
            Self::ExactTitle => 1,
            Self::PublisherDoctype | Self::DomainPattern => 2,
            Self::SourceDomain => 3,
            Self::ArtifactType => 4,
            Self::ClaimSnippet => 5,
            Self::NumericData => 6,
            Self::Fallback => 7,
        }
    }
}

/// One planned search
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateQuery {
    pub text: String,
    pub tier: u8,
    pub class: QueryClass,
}

impl CandidateQuery {
    pub fn new(text: impl Into<String>, class: QueryClass) -> Self {
        Self {
            text: text.into(),
            tier: class.tier(),
            class,
        }
    }
}

/// Optional date range passed to the search service
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    /// Window of `days` either side of `center`
    pub fn around(center: NaiveDate, days: i64) -> Self {
        let span = chrono::Duration::days(days.max(0));
        Self {
            from: center - span,
            to: center + span,
        }
    }
}

// ============================================================================
// Candidates
// ============================================================================

/// One search result, not yet fetched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub title: Option<String>,
    pub snippet: Option<String>,
}

impl SearchHit {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            title: None,
            snippet: None,
        }
    }
}

/// A fetched candidate page
///
/// Consumed by the validator and dropped unless it becomes the chosen source.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateResult {
    pub requested_url: String,
    /// Post-redirect URL
    pub final_url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub page_title: Option<String>,
    pub page_date: Option<NaiveDate>,
    /// Cleaned page text used for scoring
    pub text: String,
}

impl CandidateResult {
    pub fn is_pdf(&self) -> bool {
        self.content_type
            .as_deref()
            .map(|ct| ct.to_ascii_lowercase().contains("pdf"))
            .unwrap_or(false)
            || self.final_url.to_ascii_lowercase().ends_with(".pdf")
    }
}

// ============================================================================
// Validation
// ============================================================================

/// Hard failure: the candidate can never be accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationIssue {
    InvalidUrl { reason: String },
    HttpStatus { status: u16 },
    SocialMediaBlocked { status: u16 },
    GenericPage { path: String },
    Unavailable { signature: String },
    Malformed { reason: String },
    FetchFailed { message: String },
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidUrl { reason } => write!(f, "Invalid URL: {}", reason),
            Self::HttpStatus { status } => write!(f, "HTTP {} response", status),
            Self::SocialMediaBlocked { status } => write!(
                f,
                "Social media URL blocked (HTTP {}); find the official press release instead",
                status
            ),
            Self::GenericPage { path } => {
                write!(f, "Homepage or generic page, not a specific document: '{}'", path)
            }
            Self::Unavailable { signature } => {
                write!(f, "Page shows a removal/unavailable message: '{}'", signature)
            }
            Self::Malformed { reason } => write!(f, "Malformed candidate: {}", reason),
            Self::FetchFailed { message } => write!(f, "Fetch failed: {}", message),
        }
    }
}

/// Soft concern: recorded, but the candidate may still be accepted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ValidationWarning {
    LowContentMatch { score: f32 },
    TitleMismatch { score: f32 },
    MissingTitle,
    DateOutsideWindow {
        page_date: NaiveDate,
        article_date: NaiveDate,
        days: i64,
    },
    NumericIdMismatch {
        sibling_url: String,
        own_id: String,
        sibling_id: String,
    },
    RedirectedToDifferentId { from: String, to: String },
    MissingKeywords { keywords: Vec<String> },
    ShortContent { chars: usize },
    UnscoredDocument { content_type: String },
}

impl fmt::Display for ValidationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LowContentMatch { score } => write!(f, "Low content match (score: {:.2})", score),
            Self::TitleMismatch { score } => write!(f, "Title mismatch (score: {:.2})", score),
            Self::MissingTitle => write!(f, "No page title could be extracted"),
            Self::DateOutsideWindow {
                page_date,
                article_date,
                days,
            } => write!(
                f,
                "Page date {} is {} days from article date {}",
                page_date, days, article_date
            ),
            Self::NumericIdMismatch {
                sibling_url,
                own_id,
                sibling_id,
            } => write!(
                f,
                "Numeric ID mismatch: {} vs {} in sibling {}",
                own_id, sibling_id, sibling_url
            ),
            Self::RedirectedToDifferentId { from, to } => {
                write!(f, "URL redirected to different article ID: {} -> {}", from, to)
            }
            Self::MissingKeywords { keywords } => {
                write!(f, "Missing expected keywords: {}", keywords.join(", "))
            }
            Self::ShortContent { chars } => write!(
                f,
                "Very short content ({} chars), may be a navigation page",
                chars
            ),
            Self::UnscoredDocument { content_type } => {
                write!(f, "{} document, content not scored", content_type)
            }
        }
    }
}

/// Verdict on one candidate
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationOutcome {
    pub requested_url: String,
    pub url: String,
    pub status_code: Option<u16>,
    pub is_valid: bool,
    pub content_match_score: f32,
    pub title_match_score: f32,
    pub issues: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationWarning>,
    pub page_title: Option<String>,
    pub page_date: Option<NaiveDate>,
    /// Lost a numeric-ID sibling comparison
    pub downgraded: bool,
}

impl ValidationOutcome {
    /// Outcome for a candidate that could not be fetched or parsed at all
    pub fn rejected(url: impl Into<String>, issue: ValidationIssue) -> Self {
        let url = url.into();
        Self {
            requested_url: url.clone(),
            url,
            status_code: None,
            is_valid: false,
            content_match_score: 0.0,
            title_match_score: 0.0,
            issues: vec![issue],
            warnings: Vec::new(),
            page_title: None,
            page_date: None,
            downgraded: false,
        }
    }

    /// Strongest single match signal
    pub fn combined_score(&self) -> f32 {
        self.content_match_score.max(self.title_match_score)
    }

    pub fn has_id_mismatch(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, ValidationWarning::NumericIdMismatch { .. }))
    }
}

// ============================================================================
// Output
// ============================================================================

/// Valid runner-up returned beside the primary source
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alternate {
    pub url: String,
    pub content_match_score: f32,
    pub title_match_score: f32,
    pub warnings: Vec<ValidationWarning>,
}

impl From<&ValidationOutcome> for Alternate {
    fn from(outcome: &ValidationOutcome) -> Self {
        Self {
            url: outcome.url.clone(),
            content_match_score: outcome.content_match_score,
            title_match_score: outcome.title_match_score,
            warnings: outcome.warnings.clone(),
        }
    }
}

/// Why a run produced no primary source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundReason {
    /// Every tier ran and every candidate failed validation
    NoValidCandidate,
    /// The caller's time budget ran out before all tiers ran
    TimedOut,
}

/// Result handed to the article-writing stage
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResolutionResult {
    Found {
        run_id: Uuid,
        primary_url: String,
        /// Tier that produced the source; `None` for a registry hit
        tier: Option<u8>,
        from_registry: bool,
        alternates: Vec<Alternate>,
        confidence_notes: Vec<String>,
    },
    NotFound {
        run_id: Uuid,
        attempted_tiers: usize,
        planned_tiers: usize,
        reason: NotFoundReason,
        /// Secondary (news) URL recorded in place of a primary source
        fallback_url: Option<String>,
    },
}

impl ResolutionResult {
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found { .. })
    }

    pub fn primary_url(&self) -> Option<&str> {
        match self {
            Self::Found { primary_url, .. } => Some(primary_url),
            Self::NotFound { .. } => None,
        }
    }

    pub fn run_id(&self) -> Uuid {
        match self {
            Self::Found { run_id, .. } | Self::NotFound { run_id, .. } => *run_id,
        }
    }
}
