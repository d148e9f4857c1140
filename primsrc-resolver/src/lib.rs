//! # primsrc-resolver
//!
//! Source resolution and validation engine: given a news article, find the
//! official primary source (press release, government notice, report PDF)
//! it is based on.
//!
//! **Components:**
//! - `extractors` - entity extraction from the article, HTML parsing of
//!   fetched pages
//! - `planner` - tiered search query planning
//! - `services` - search and fetch collaborators, URL normalisation
//! - `validators` - per-candidate scoring, numeric-ID sibling analysis
//! - `registry` - persistent source registry (fast path, audit)
//! - `workflow` - the tier waterfall
//!
//! The single entry point is [`WaterfallController::resolve`].

pub mod config;
pub mod error;
pub mod extractors;
pub mod planner;
pub mod registry;
pub mod services;
pub mod types;
pub mod utils;
pub mod validators;
pub mod workflow;

pub use config::{ResolverConfig, RetryPolicy, ValidationPolicy};
pub use error::{ResolveError, ResolveResult};
pub use registry::{RegistryEntry, RegistryFilter, SourceRegistry, SourceType};
pub use services::{PageFetcher, SearchProvider, UpstreamError, UpstreamErrorKind};
pub use types::{
    Alternate, ArticleContext, CandidateResult, NotFoundReason, ResolutionResult, SearchHit, ValidationIssue,
    ValidationOutcome, ValidationWarning,
};
pub use workflow::{WaterfallController, WaterfallState};
