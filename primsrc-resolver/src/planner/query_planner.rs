//! Query planner: article + entities → tiered search queries
//!
//! Tiers, most specific first:
//! 1. exact title (optionally with a date)
//! 2. publisher + document type phrasings, publisher domain patterns
//! 3. source domain restricted to press sections
//! 4. artifact type + publisher + location
//! 5. publisher + quoted claim
//! 6. publisher + numeric facts
//! 7. fallback: official domains, publisher + topic, web archive
//!
//! Tiers 1-6 share `max_queries`; the fallback tier has its own cap so it
//! is never crowded out by a long primary plan.
//!
//! Output depends only on the input: no randomness, no clock.

use super::domain_patterns::patterns_for;
use crate::services::url_normalizer::domain_of;
use crate::types::{ArticleContext, CandidateQuery, Entities, QueryClass};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Queries this short are too vague to send
const MIN_QUERY_CHARS: usize = 11;
const DOMAIN_PATTERN_TITLE_CHARS: usize = 50;
const SITE_TITLE_CHARS: usize = 80;
const CLAIM_CHARS: usize = 100;
const MAX_DOMAIN_PATTERNS: usize = 3;
const FALLBACK_TITLE_CHARS: usize = 60;
const FALLBACK_TOPIC_CHARS: usize = 80;
const ARCHIVE_TITLE_CHARS: usize = 80;

/// Official domains searched when the publisher is a Catalan institution
const OFFICIAL_DOMAINS: &[&str] = &["gencat.cat", "govern.cat", "ajuntament.barcelona.cat"];
const OFFICIAL_PUBLISHER_KEYWORDS: &[&str] = &["generalitat", "govern", "ajuntament"];

/// Artifact types that are usually published as PDF
const PDF_ARTIFACTS: &[&str] = &["survey", "barometer", "report", "study", "informe", "estudi", "estudio", "enquesta"];

static SENTENCE_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[.!?]+(?:\s+|$)|\n+").expect("valid sentence regex"));

/// Ordered, deduplicated query list
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryPlan {
    queries: Vec<CandidateQuery>,
}

impl QueryPlan {
    pub fn queries(&self) -> &[CandidateQuery] {
        &self.queries
    }

    pub fn len(&self) -> usize {
        self.queries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Distinct tiers present, ascending
    pub fn tiers(&self) -> Vec<u8> {
        let mut tiers: Vec<u8> = self.queries.iter().map(|q| q.tier).collect();
        tiers.sort_unstable();
        tiers.dedup();
        tiers
    }

    /// Queries of one tier, in insertion order
    pub fn tier(&self, tier: u8) -> impl Iterator<Item = &CandidateQuery> {
        self.queries.iter().filter(move |q| q.tier == tier)
    }
}

/// Accumulates queries, dropping repeats and too-short strings
struct PlanBuilder {
    queries: Vec<CandidateQuery>,
    seen: HashSet<String>,
}

impl PlanBuilder {
    fn new() -> Self {
        Self {
            queries: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Builder that also skips anything already in `existing`
    fn after(existing: &[CandidateQuery]) -> Self {
        Self {
            queries: Vec::new(),
            seen: existing.iter().map(|q| q.text.clone()).collect(),
        }
    }

    fn push(&mut self, text: impl AsRef<str>, class: QueryClass) {
        let text = collapse_spaces(text.as_ref());
        if text.chars().count() < MIN_QUERY_CHARS || !self.seen.insert(text.clone()) {
            return;
        }
        self.queries.push(CandidateQuery::new(text, class));
    }
}

/// Build the query plan for an article
pub fn plan_queries(
    article: &ArticleContext,
    entities: &Entities,
    max_queries: usize,
    max_fallback_queries: usize,
) -> QueryPlan {
    let title = article.title.replace('"', "").trim().to_string();
    let publisher = article.publisher.trim();
    let language = entities.language.as_deref().unwrap_or("");
    let location = entities.locations.first().map(String::as_str).unwrap_or("");
    let mut plan = PlanBuilder::new();

    // Tier 1: exact title
    if !title.is_empty() {
        plan.push(format!("\"{}\"", title), QueryClass::ExactTitle);
        let title_lower = title.to_lowercase();
        for date in entities.dates.iter().filter(|d| !title_lower.contains(d.as_str())).take(2) {
            plan.push(format!("\"{}\" {}", title, date), QueryClass::ExactTitle);
        }
        plan.push(&title, QueryClass::ExactTitle);
    }

    // Tier 2: publisher + document type, publisher domain patterns
    if !publisher.is_empty() {
        let local_phrasings: &[&str] = match language {
            "ca" => &["comunicat oficial", "nota de premsa", "declaració oficial", "roda de premsa"],
            "es" => &["comunicado oficial", "nota de prensa", "declaración oficial", "rueda de prensa"],
            _ => &[],
        };
        for phrasing in local_phrasings.iter().chain(&["press release statement", "official announcement"]) {
            plan.push(format!("{} {}", publisher, phrasing), QueryClass::PublisherDoctype);
        }

        if !title.is_empty() {
            let short_title = truncate_chars(&title, DOMAIN_PATTERN_TITLE_CHARS);
            for pattern in patterns_for(publisher, article.artifact_type.as_deref())
                .into_iter()
                .take(MAX_DOMAIN_PATTERNS)
            {
                plan.push(format!("{} \"{}\"", pattern, short_title), QueryClass::DomainPattern);
            }
        }
    }

    // Tier 3: source domain, press sections only
    if let Some(domain) = article.source_url.as_deref().and_then(domain_of) {
        if !title.is_empty() {
            let site_title = truncate_chars(&title, SITE_TITLE_CHARS);
            plan.push(
                format!("site:{} {} (premsa OR prensa OR press OR noticia OR comunicat)", domain, site_title),
                QueryClass::SourceDomain,
            );
            plan.push(
                format!("site:{} {} -home -index -about -associacio -contacte", domain, site_title),
                QueryClass::SourceDomain,
            );
        }
    }

    // Tier 4: artifact type
    if let Some(artifact) = article.artifact_type.as_deref().map(str::trim).filter(|a| !a.is_empty()) {
        plan.push(format!("{} {} {}", artifact, publisher, location), QueryClass::ArtifactType);
        let artifact_lower = artifact.to_lowercase();
        if PDF_ARTIFACTS.iter().any(|a| artifact_lower.contains(a)) {
            plan.push(format!("{} {} filetype:pdf", artifact, publisher), QueryClass::ArtifactType);
        }
    }

    // Tier 5: quoted claim
    if !publisher.is_empty() {
        if let Some(claim) = claim_snippet(article) {
            let claim = truncate_chars(&claim.replace('"', ""), CLAIM_CHARS);
            plan.push(format!("{} \"{}\"", publisher, claim), QueryClass::ClaimSnippet);
        }
    }

    // Tier 6: numeric facts
    if !publisher.is_empty() && !entities.numbers.is_empty() {
        let numbers = entities.numbers.iter().take(2).cloned().collect::<Vec<_>>().join(" ");
        plan.push(format!("{} {} {}", publisher, numbers, location), QueryClass::NumericData);
    }

    let mut queries = plan.queries;
    queries.truncate(max_queries);

    let mut fallback = fallback_queries(article, &title, &queries);
    fallback.truncate(max_fallback_queries);
    queries.extend(fallback);
    QueryPlan { queries }
}

/// Tier 7: broad second-pass searches, skipping anything already planned
fn fallback_queries(article: &ArticleContext, title: &str, planned: &[CandidateQuery]) -> Vec<CandidateQuery> {
    let publisher = article.publisher.trim();
    let topic = article.core_topic.as_deref().map(str::trim).filter(|t| !t.is_empty());
    let mut plan = PlanBuilder::after(planned);

    let publisher_lower = publisher.to_lowercase();
    let official = OFFICIAL_PUBLISHER_KEYWORDS.iter().any(|k| publisher_lower.contains(k));
    if official && !title.is_empty() {
        let short_title = truncate_chars(title, FALLBACK_TITLE_CHARS);
        for domain in OFFICIAL_DOMAINS {
            plan.push(format!("site:{} \"{}\"", domain, short_title), QueryClass::Fallback);
            if let Some(topic) = topic {
                plan.push(
                    format!("site:{} {}", domain, truncate_chars(topic, FALLBACK_TOPIC_CHARS)),
                    QueryClass::Fallback,
                );
            }
        }
    }

    if let Some(topic) = topic.filter(|_| !publisher.is_empty()) {
        let long_topic = truncate_chars(topic, FALLBACK_TOPIC_CHARS);
        let short_topic = truncate_chars(topic, FALLBACK_TITLE_CHARS);
        plan.push(format!("\"{}\" {} filetype:pdf", publisher, long_topic), QueryClass::Fallback);
        plan.push(format!("\"{}\" comunicat {}", publisher, short_topic), QueryClass::Fallback);
        plan.push(format!("\"{}\" press release {}", publisher, short_topic), QueryClass::Fallback);
    }

    if !title.is_empty() {
        plan.push(
            format!("site:web.archive.org {}", truncate_chars(title, ARCHIVE_TITLE_CHARS)),
            QueryClass::Fallback,
        );
    }
    plan.queries
}

/// First supplied key claim, else the first body sentence with a digit,
/// else the first body sentence
pub fn claim_snippet(article: &ArticleContext) -> Option<String> {
    if let Some(claim) = article.key_claims.iter().map(|c| c.trim()).find(|c| !c.is_empty()) {
        return Some(claim.to_string());
    }

    let sentences: Vec<&str> = SENTENCE_SPLIT_RE
        .split(&article.body)
        .map(str::trim)
        .filter(|s| s.chars().count() >= MIN_QUERY_CHARS)
        .collect();
    sentences
        .iter()
        .find(|s| s.chars().any(|c| c.is_ascii_digit()))
        .or_else(|| sentences.first())
        .map(|s| s.to_string())
}

fn truncate_chars(text: &str, max: usize) -> String {
    text.chars().take(max).collect::<String>().trim_end().to_string()
}

fn collapse_spaces(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::extract_entities;
    use chrono::NaiveDate;

    fn govern_article() -> ArticleContext {
        ArticleContext::new(
            "Govern aprova calendari festes laborals per l'any 2026",
            "Govern de la Generalitat",
        )
        .with_date(NaiveDate::from_ymd_opt(2025, 11, 10).unwrap())
    }

    fn plan(article: &ArticleContext) -> QueryPlan {
        plan_queries(article, &extract_entities(article), 15, 8)
    }

    #[test]
    fn test_tier_one_starts_with_exact_title() {
        let plan = plan(&govern_article());
        let first = &plan.queries()[0];
        assert_eq!(first.text, "\"Govern aprova calendari festes laborals per l'any 2026\"");
        assert_eq!(first.tier, 1);
        assert_eq!(first.class, QueryClass::ExactTitle);
        assert_eq!(plan.queries()[1].text, "Govern aprova calendari festes laborals per l'any 2026");
    }

    #[test]
    fn test_catalan_phrasings_and_domain_patterns() {
        let plan = plan(&govern_article());
        let texts: Vec<&str> = plan.queries().iter().map(|q| q.text.as_str()).collect();
        assert!(texts.contains(&"Govern de la Generalitat nota de premsa"));
        assert!(texts.contains(&"Govern de la Generalitat press release statement"));
        assert!(texts
            .iter()
            .any(|t| t.starts_with("site:govern.cat/ca/noticies \"Govern aprova")));
        assert_eq!(plan.tiers(), vec![1, 2, 7]);
    }

    #[test]
    fn test_plan_is_deterministic() {
        let article = govern_article()
            .with_body("El Govern ha aprovat 12 festius. La mesura afecta 3 milions de treballadors.")
            .with_source_url("https://www.elperiodic.cat/noticia/123");
        assert_eq!(plan(&article), plan(&article));
    }

    #[test]
    fn test_all_tiers_present_for_rich_article() {
        let article = ArticleContext::new("Baròmetre d'opinió política de tardor", "Centre d'Estudis d'Opinió")
            .with_body("El suport a la independència baixa fins al 38% a Catalunya. Es van fer 2000 entrevistes.")
            .with_source_url("https://www.ara.cat/politica/barometre_1_123.html")
            .with_artifact_type("barometer");
        let plan = plan(&article);
        assert_eq!(plan.tiers(), vec![1, 2, 3, 4, 5, 6, 7]);
        assert!(plan.queries().iter().any(|q| q.text == "barometer Centre d'Estudis d'Opinió filetype:pdf"));
        assert!(plan
            .tier(5)
            .any(|q| q.text == "Centre d'Estudis d'Opinió \"El suport a la independència baixa fins al 38% a Catalunya\""));
        assert!(plan.tier(6).any(|q| q.text.starts_with("Centre d'Estudis d'Opinió 38%")));
    }

    #[test]
    fn test_no_duplicates_and_cap() {
        let article = govern_article().with_source_url("https://govern.cat/x");
        let plan = plan_queries(&article, &extract_entities(&article), 5, 0);
        assert_eq!(plan.len(), 5);
        let mut texts: Vec<&str> = plan.queries().iter().map(|q| q.text.as_str()).collect();
        texts.sort_unstable();
        texts.dedup();
        assert_eq!(texts.len(), 5);
    }

    #[test]
    fn test_title_and_publisher_alone_still_plan() {
        let article = ArticleContext::new("Nova llei d'habitatge", "Parlament");
        let entities = Entities::default();
        let plan = plan_queries(&article, &entities, 15, 8);
        assert!(!plan.is_empty());
        assert!(plan.tiers().contains(&1));
        assert!(plan.tiers().contains(&2));
    }

    #[test]
    fn test_fallback_tier_for_government_publisher() {
        let article = govern_article().with_core_topic("calendari laboral 2026");
        let plan = plan(&article);
        let fallback: Vec<&str> = plan.tier(7).map(|q| q.text.as_str()).collect();

        assert_eq!(
            fallback,
            vec![
                "site:gencat.cat \"Govern aprova calendari festes laborals per l'any 2026\"",
                "site:gencat.cat calendari laboral 2026",
                "site:govern.cat \"Govern aprova calendari festes laborals per l'any 2026\"",
                "site:govern.cat calendari laboral 2026",
                "site:ajuntament.barcelona.cat \"Govern aprova calendari festes laborals per l'any 2026\"",
                "site:ajuntament.barcelona.cat calendari laboral 2026",
                "\"Govern de la Generalitat\" calendari laboral 2026 filetype:pdf",
                "\"Govern de la Generalitat\" comunicat calendari laboral 2026",
            ]
        );
        assert_eq!(plan.queries().last().map(|q| q.class), Some(QueryClass::Fallback));
    }

    #[test]
    fn test_fallback_ends_with_web_archive() {
        let article = ArticleContext::new("Informe anual de la Sindicatura de Comptes", "Sindicatura de Comptes");
        let plan = plan(&article);
        let fallback: Vec<&str> = plan.tier(7).map(|q| q.text.as_str()).collect();
        assert_eq!(
            fallback,
            vec!["site:web.archive.org Informe anual de la Sindicatura de Comptes"]
        );
    }

    #[test]
    fn test_fallback_has_its_own_cap() {
        let article = govern_article().with_core_topic("calendari laboral 2026");
        let entities = extract_entities(&article);
        assert_eq!(plan_queries(&article, &entities, 3, 0).len(), 3);
        let plan = plan_queries(&article, &entities, 3, 2);
        assert_eq!(plan.len(), 5);
        assert_eq!(plan.tier(7).count(), 2);
    }

    #[test]
    fn test_claim_snippet_prefers_key_claims_then_numeric_sentence() {
        let article = ArticleContext::new("t", "p")
            .with_body("Primera frase sense xifres. La taxa arriba al 12% aquest any.");
        assert_eq!(claim_snippet(&article).as_deref(), Some("La taxa arriba al 12% aquest any"));

        let article = article.with_key_claims(vec!["  ".to_string(), "Claim explícit".to_string()]);
        assert_eq!(claim_snippet(&article).as_deref(), Some("Claim explícit"));

        assert_eq!(claim_snippet(&ArticleContext::new("t", "p")), None);
    }
}
