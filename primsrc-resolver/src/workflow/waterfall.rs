//! Waterfall controller
//!
//! PENDING → for each tier: QUERYING → VALIDATING → (ACCEPTED | NEXT_TIER)
//! → EXHAUSTED.
//!
//! Tiers and the queries within a tier run sequentially; only page fetches
//! for a single query run concurrently. A tier's pool of outcomes is
//! complete before a candidate is chosen, so the choice never depends on
//! fetch timing.

use crate::config::ResolverConfig;
use crate::error::{ResolveError, ResolveResult};
use crate::extractors::extract_entities;
use crate::planner::{plan_queries, QueryPlan};
use crate::registry::{SourceRegistry, SourceType, SqliteRegistryStore};
use crate::services::{
    CandidateFetcher, FetchedCandidate, GroundedSearchClient, HttpPageFetcher, PageFetcher, SearchProvider,
};
use crate::types::{
    Alternate, ArticleContext, CandidateQuery, DateRange, NotFoundReason, ResolutionResult, ValidationOutcome,
};
use crate::utils::retry::RetryExhausted;
use crate::validators::{analyze_siblings, validate_fetched};
use primsrc_common::config::{registry_db_path, resolve_data_folder, TomlConfig};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Controller state for one resolution run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WaterfallState {
    Pending,
    /// Search + fetch for the current tier's queries
    Querying,
    /// Scoring the current tier's candidates
    Validating,
    /// Terminal: a primary source was chosen
    Accepted,
    /// Current tier produced nothing valid
    NextTier,
    /// Terminal: nothing valid after every tier (or the time budget ran out)
    Exhausted,
}

impl WaterfallState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Accepted | Self::Exhausted)
    }
}

/// State tracker for a single run; logs every transition
struct RunState {
    run_id: Uuid,
    state: WaterfallState,
}

impl RunState {
    fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            state: WaterfallState::Pending,
        }
    }

    fn transition_to(&mut self, new_state: WaterfallState) {
        tracing::trace!(
            run_id = %self.run_id,
            from = ?self.state,
            to = ?new_state,
            "Waterfall state transition"
        );
        self.state = new_state;
    }
}

/// Infrastructure failures seen across one run
///
/// A dead candidate host or a query the search service rejects is only
/// recorded; the run carries on. The run is an outage when no search call
/// succeeded, or when candidates were found but every one of them failed
/// at transport level.
#[derive(Default)]
struct FailureTally {
    searches_ok: usize,
    search_failure: Option<RetryExhausted>,
    reachable_candidates: usize,
    transport_failure: Option<RetryExhausted>,
}

impl FailureTally {
    fn record_candidates(&mut self, candidates: &[FetchedCandidate]) {
        for candidate in candidates {
            match candidate {
                FetchedCandidate::Failed { error, .. } if candidate.is_transport_failure() => {
                    self.transport_failure.get_or_insert_with(|| error.clone());
                }
                _ => self.reachable_candidates += 1,
            }
        }
    }

    fn outage(self) -> Option<RetryExhausted> {
        if self.searches_ok == 0 {
            if let Some(failure) = self.search_failure {
                return Some(failure);
            }
        }
        if self.reachable_candidates == 0 {
            return self.transport_failure;
        }
        None
    }
}

/// Outcome of running one tier
enum TierOutcome {
    Accepted(ResolutionResult),
    Rejected,
    TimedOut,
}

/// Resolves articles to primary sources
pub struct WaterfallController {
    fetcher: CandidateFetcher,
    registry: Arc<SourceRegistry>,
    config: ResolverConfig,
}

impl WaterfallController {
    pub fn new(
        search: Arc<dyn SearchProvider>,
        pages: Arc<dyn PageFetcher>,
        registry: Arc<SourceRegistry>,
        config: ResolverConfig,
    ) -> Self {
        Self {
            fetcher: CandidateFetcher::new(search, pages, &config),
            registry,
            config,
        }
    }

    /// Production wiring: grounded search, reqwest fetcher, SQLite registry
    /// under the resolved data folder
    pub async fn from_config(toml_config: &TomlConfig, data_folder: Option<&Path>) -> ResolveResult<Self> {
        let config = ResolverConfig::from_toml(toml_config)?;
        let search = GroundedSearchClient::from_config(toml_config, &config)?;
        let pages = HttpPageFetcher::new()?;

        let db_path = registry_db_path(&resolve_data_folder(data_folder, toml_config));
        let store = SqliteRegistryStore::open(&db_path, config.max_lock_wait_ms).await?;
        let registry = SourceRegistry::new(Arc::new(store), config.registry_match_threshold);

        tracing::info!(registry = %db_path.display(), "Resolver initialised");
        Ok(Self::new(Arc::new(search), Arc::new(pages), Arc::new(registry), config))
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SourceRegistry> {
        &self.registry
    }

    /// Queries `resolve` would run for `article`, in order
    pub fn plan(&self, article: &ArticleContext) -> QueryPlan {
        let entities = extract_entities(article);
        plan_queries(article, &entities, self.config.max_queries, self.config.max_fallback_queries)
    }

    /// Resolve one article to its primary source
    ///
    /// "Nothing found" is `Ok(ResolutionResult::NotFound)`. Errors are
    /// reserved for collaborators that stayed down after retries, registry
    /// failures, and articles with neither title nor publisher.
    pub async fn resolve(&self, article: &ArticleContext) -> ResolveResult<ResolutionResult> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("resolve", %run_id, article = %article.reference_id());
        self.run(article, run_id).instrument(span).await
    }

    async fn run(&self, article: &ArticleContext, run_id: Uuid) -> ResolveResult<ResolutionResult> {
        if article.title.trim().is_empty() && article.publisher.trim().is_empty() {
            return Err(ResolveError::InvalidArticle(
                "article has neither title nor publisher".to_string(),
            ));
        }

        let started = Instant::now();
        let deadline = self.config.time_budget().map(|budget| started + budget);
        let mut state = RunState::new(run_id);

        if let Some(entry) = self.registry.lookup(article, self.config.date_window_days).await? {
            let entry = self
                .registry
                .record_use(&entry.url, SourceType::Primary, entry.page_title.clone(), article, Some(run_id))
                .await?;
            state.transition_to(WaterfallState::Accepted);
            tracing::info!(url = %entry.url, usage_count = entry.usage_count, "Registry fast-path hit");
            return Ok(ResolutionResult::Found {
                run_id,
                primary_url: entry.url,
                tier: None,
                from_registry: true,
                alternates: Vec::new(),
                confidence_notes: vec![format!("Reused registered source (used {} times)", entry.usage_count)],
            });
        }

        let plan = self.plan(article);
        let tiers = plan.tiers();
        tracing::info!(queries = plan.len(), tiers = tiers.len(), "Query plan ready");

        let date_hint = article
            .published
            .map(|date| DateRange::around(date, self.config.date_window_days));
        let mut seen = HashSet::new();
        let mut failures = FailureTally::default();
        let mut attempted = 0;

        for &tier in &tiers {
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return self.not_found(article, run_id, attempted, tiers.len(), NotFoundReason::TimedOut, &mut state).await;
            }
            attempted += 1;

            let queries: Vec<&CandidateQuery> = plan.tier(tier).collect();
            match self
                .run_tier(article, run_id, tier, &queries, date_hint, deadline, &mut seen, &mut failures, &mut state)
                .await?
            {
                TierOutcome::Accepted(result) => {
                    tracing::info!(
                        tier,
                        url = result.primary_url().unwrap_or_default(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "Primary source found"
                    );
                    return Ok(result);
                }
                TierOutcome::Rejected => state.transition_to(WaterfallState::NextTier),
                TierOutcome::TimedOut => {
                    return self.not_found(article, run_id, attempted, tiers.len(), NotFoundReason::TimedOut, &mut state).await;
                }
            }
        }

        if let Some(outage) = failures.outage() {
            tracing::error!(
                service = %outage.service,
                attempts = outage.attempts,
                error = %outage.last_error,
                "Every upstream call in the run failed"
            );
            return Err(outage.into());
        }

        self.not_found(article, run_id, attempted, tiers.len(), NotFoundReason::NoValidCandidate, &mut state)
            .await
    }

    /// Run one tier's queries until one leaves a valid candidate in the pool
    ///
    /// Only a search service that stays down through its transient retries
    /// aborts the run here; other failures go into `failures`.
    #[allow(clippy::too_many_arguments)]
    async fn run_tier(
        &self,
        article: &ArticleContext,
        run_id: Uuid,
        tier: u8,
        queries: &[&CandidateQuery],
        date_hint: Option<DateRange>,
        deadline: Option<Instant>,
        seen: &mut HashSet<String>,
        failures: &mut FailureTally,
        state: &mut RunState,
    ) -> ResolveResult<TierOutcome> {
        let policy = self.config.validation_policy();
        let mut pool: Vec<ValidationOutcome> = Vec::new();

        for query in queries {
            state.transition_to(WaterfallState::Querying);
            tracing::debug!(tier, query = %query.text, "Running query");

            let call = self.fetcher.run_query(query, date_hint, seen);
            let fetched = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, call).await {
                    Ok(fetched) => fetched,
                    Err(_) => {
                        tracing::warn!(tier, query = %query.text, "Time budget exhausted mid-query");
                        return Ok(TierOutcome::TimedOut);
                    }
                },
                None => call.await,
            };
            let fetched = match fetched {
                Ok(fetched) => {
                    failures.searches_ok += 1;
                    fetched
                }
                Err(exhausted) if exhausted.is_transient() => return Err(exhausted.into()),
                Err(exhausted) => {
                    tracing::warn!(
                        tier,
                        query = %query.text,
                        error = %exhausted.last_error,
                        "Search rejected query, moving on"
                    );
                    failures.search_failure.get_or_insert(exhausted);
                    continue;
                }
            };
            failures.record_candidates(&fetched.candidates);

            state.transition_to(WaterfallState::Validating);
            for candidate in &fetched.candidates {
                let outcome = validate_fetched(candidate, article, &policy);
                tracing::debug!(
                    tier,
                    url = %outcome.url,
                    valid = outcome.is_valid,
                    content = outcome.content_match_score,
                    title = outcome.title_match_score,
                    issues = outcome.issues.len(),
                    warnings = outcome.warnings.len(),
                    "Candidate validated"
                );
                pool.push(outcome);
            }

            if pool.iter().any(|o| o.is_valid) {
                break;
            }
        }

        analyze_siblings(&mut pool, article.published, self.config.date_window_days);

        let Some(chosen) = choose_candidate(&pool, self.config.tie_margin) else {
            tracing::debug!(tier, candidates = pool.len(), "No valid candidate in tier");
            return Ok(TierOutcome::Rejected);
        };

        let alternates: Vec<Alternate> = ranked_valid(&pool)
            .into_iter()
            .filter(|&i| i != chosen)
            .take(self.config.max_alternates)
            .map(|i| Alternate::from(&pool[i]))
            .collect();

        let primary = &pool[chosen];
        let confidence_notes: Vec<String> = primary.warnings.iter().map(ToString::to_string).collect();

        self.registry
            .record_use(&primary.url, SourceType::Primary, primary.page_title.clone(), article, Some(run_id))
            .await?;
        state.transition_to(WaterfallState::Accepted);

        Ok(TierOutcome::Accepted(ResolutionResult::Found {
            run_id,
            primary_url: primary.url.clone(),
            tier: Some(tier),
            from_registry: false,
            alternates,
            confidence_notes,
        }))
    }

    async fn not_found(
        &self,
        article: &ArticleContext,
        run_id: Uuid,
        attempted_tiers: usize,
        planned_tiers: usize,
        reason: NotFoundReason,
        state: &mut RunState,
    ) -> ResolveResult<ResolutionResult> {
        state.transition_to(WaterfallState::Exhausted);

        let mut fallback_url = None;
        if self.config.record_news_fallback {
            if let Some(source_url) = article.source_url.as_deref() {
                match self
                    .registry
                    .record_use(source_url, SourceType::News, None, article, Some(run_id))
                    .await
                {
                    Ok(entry) => fallback_url = Some(entry.url),
                    Err(primsrc_common::Error::InvalidInput(message)) => {
                        tracing::warn!(url = source_url, %message, "Skipping news fallback");
                    }
                    Err(err) => return Err(err.into()),
                }
            }
        }

        tracing::info!(attempted_tiers, planned_tiers, ?reason, "No primary source found");
        Ok(ResolutionResult::NotFound {
            run_id,
            attempted_tiers,
            planned_tiers,
            reason,
            fallback_url,
        })
    }
}

/// Valid candidates in preference order: non-downgraded first, result order
/// within each group
fn ranked_valid(pool: &[ValidationOutcome]) -> Vec<usize> {
    let (mut preferred, downgraded): (Vec<usize>, Vec<usize>) =
        (0..pool.len()).filter(|&i| pool[i].is_valid).partition(|&i| !pool[i].downgraded);
    preferred.extend(downgraded);
    preferred
}

/// Pick the tier's primary source
///
/// The first ranked candidate wins unless others sit within `tie_margin` of
/// its combined score; among those, higher content score wins, then the
/// more recent page date, then result order.
pub(crate) fn choose_candidate(pool: &[ValidationOutcome], tie_margin: f32) -> Option<usize> {
    let ranked = ranked_valid(pool);
    let &first = ranked.first()?;
    let anchor = &pool[first];

    ranked
        .into_iter()
        .filter(|&i| {
            let candidate = &pool[i];
            candidate.downgraded == anchor.downgraded
                && (candidate.combined_score() - anchor.combined_score()).abs() <= tie_margin
        })
        .min_by(|&a, &b| compare_tied(&pool[a], &pool[b]).then(a.cmp(&b)))
}

/// `Less` means `a` is preferred
fn compare_tied(a: &ValidationOutcome, b: &ValidationOutcome) -> Ordering {
    b.content_match_score
        .total_cmp(&a.content_match_score)
        .then_with(|| b.page_date.cmp(&a.page_date))
}
