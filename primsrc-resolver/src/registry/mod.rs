//! Source registry
//!
//! Persistent record of every URL the engine has chosen, keyed by
//! normalised URL: first/last seen, usage count, referencing articles, and
//! the article titles that resolved to it (match keys, used by the
//! resolver's fast path).
//!
//! `SourceRegistry` owns all writes. It serialises read-modify-write
//! updates in-process, and each store makes a single update atomic on its
//! own, so two resolutions choosing the same URL never lose an increment.

pub mod audit;
pub mod memory_store;
pub mod sqlite_store;

pub use audit::{AuditReport, AuditStatus, EntryAudit};
pub use memory_store::MemoryRegistryStore;
pub use sqlite_store::SqliteRegistryStore;

use crate::services::url_normalizer::{domain_of, normalize_url};
use crate::types::ArticleContext;
use crate::validators::similarity::title_similarity;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use primsrc_common::time::days_between;
use primsrc_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Kind of source a registry entry records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Primary,
    /// Secondary news article recorded when no primary source was found
    News,
    Other,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::News => "news",
            Self::Other => "other",
        }
    }

    /// Type kept when an existing entry is recorded again: primary is never
    /// demoted, otherwise the newer type wins
    pub fn merge(existing: SourceType, incoming: SourceType) -> SourceType {
        if existing == SourceType::Primary {
            SourceType::Primary
        } else {
            incoming
        }
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "primary" => Ok(Self::Primary),
            "news" => Ok(Self::News),
            "other" => Ok(Self::Other),
            other => Err(Error::InvalidInput(format!("Unknown source type: {}", other))),
        }
    }
}

/// One article that used a source
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArticleReference {
    pub article_id: String,
    pub run_id: Option<Uuid>,
    pub filename: Option<String>,
    pub article_date: Option<NaiveDate>,
}

impl ArticleReference {
    pub fn for_article(article: &ArticleContext, run_id: Option<Uuid>) -> Self {
        Self {
            article_id: article.reference_id(),
            run_id,
            filename: article.filename.clone(),
            article_date: article.published,
        }
    }
}

/// Persistent registry record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistryEntry {
    /// Normalised URL (unique key)
    pub url: String,
    pub source_type: SourceType,
    pub domain: String,
    pub page_title: Option<String>,
    pub first_seen: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub usage_count: i64,
    /// In insertion order, one per article id
    pub references: Vec<ArticleReference>,
    /// Normalised article titles that resolved to this URL
    pub match_keys: Vec<String>,
}

impl RegistryEntry {
    pub fn article_ids(&self) -> Vec<&str> {
        self.references.iter().map(|r| r.article_id.as_str()).collect()
    }
}

/// One use of a source, as handed to a store
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUse {
    /// Already normalised
    pub url: String,
    pub domain: String,
    pub source_type: SourceType,
    pub page_title: Option<String>,
    pub reference: ArticleReference,
    pub match_key: Option<String>,
}

/// Query over registry entries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RegistryFilter {
    /// Substring match against the entry domain
    pub domain: Option<String>,
    pub source_type: Option<SourceType>,
}

impl RegistryFilter {
    pub fn domain(domain: impl Into<String>) -> Self {
        Self {
            domain: Some(domain.into().to_lowercase()),
            source_type: None,
        }
    }

    pub fn source_type(source_type: SourceType) -> Self {
        Self {
            domain: None,
            source_type: Some(source_type),
        }
    }

    pub fn matches(&self, entry: &RegistryEntry) -> bool {
        self.domain
            .as_deref()
            .map_or(true, |d| entry.domain.contains(&d.to_lowercase()))
            && self.source_type.map_or(true, |t| entry.source_type == t)
    }
}

/// Storage backend for the registry
///
/// `record_use` must be atomic per call: insert the entry or bump
/// `usage_count` and `last_seen`, then add the reference and match key if
/// new.
#[async_trait]
pub trait RegistryStore: Send + Sync {
    async fn get(&self, url: &str) -> Result<Option<RegistryEntry>>;

    async fn record_use(&self, source_use: &SourceUse, now: DateTime<Utc>) -> Result<RegistryEntry>;

    /// Entries matching the filter, ordered by URL
    async fn find(&self, filter: &RegistryFilter) -> Result<Vec<RegistryEntry>>;

    /// Entries whose match keys include `match_key`, ordered by URL
    async fn find_by_match_key(&self, match_key: &str) -> Result<Vec<RegistryEntry>>;

    /// Delete entries; returns how many existed
    async fn remove(&self, urls: &[String]) -> Result<usize>;
}

/// Normalised form of an article title used as a match key
pub fn match_key(title: &str) -> String {
    title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Registry front end used by the resolver
pub struct SourceRegistry {
    store: Arc<dyn RegistryStore>,
    write_lock: Mutex<()>,
    match_threshold: f32,
}

impl SourceRegistry {
    pub fn new(store: Arc<dyn RegistryStore>, match_threshold: f32) -> Self {
        Self {
            store,
            write_lock: Mutex::new(()),
            match_threshold,
        }
    }

    /// In-memory registry (tests, dry runs)
    pub fn in_memory(match_threshold: f32) -> Self {
        Self::new(Arc::new(MemoryRegistryStore::new()), match_threshold)
    }

    pub async fn get(&self, url: &str) -> Result<Option<RegistryEntry>> {
        let key = normalize_url(url).unwrap_or_else(|| url.trim().to_string());
        self.store.get(&key).await
    }

    pub async fn find(&self, filter: &RegistryFilter) -> Result<Vec<RegistryEntry>> {
        self.store.find(filter).await
    }

    /// Record that `url` was chosen for `article`
    ///
    /// Creates the entry on first use; afterwards bumps `usage_count` and
    /// `last_seen` and merges the reference.
    pub async fn record_use(
        &self,
        url: &str,
        source_type: SourceType,
        page_title: Option<String>,
        article: &ArticleContext,
        run_id: Option<Uuid>,
    ) -> Result<RegistryEntry> {
        let normalized = normalize_url(url)
            .ok_or_else(|| Error::InvalidInput(format!("Cannot register non-http URL: {}", url)))?;
        let domain = domain_of(&normalized).unwrap_or_default();
        let key = match_key(&article.title);

        let source_use = SourceUse {
            url: normalized,
            domain,
            source_type,
            page_title,
            reference: ArticleReference::for_article(article, run_id),
            match_key: (!key.is_empty() && source_type == SourceType::Primary).then_some(key),
        };

        let _guard = self.write_lock.lock().await;
        let entry = self.store.record_use(&source_use, primsrc_common::time::now()).await?;
        tracing::debug!(
            url = %entry.url,
            source_type = %entry.source_type,
            usage_count = entry.usage_count,
            "Registry entry updated"
        );
        Ok(entry)
    }

    /// Fast-path lookup: a primary entry already chosen for this article
    ///
    /// Exact match-key hits win; otherwise the best primary entry whose page
    /// title or a match key is at least `match_threshold` similar to the
    /// article title. Ties go to higher usage, then URL order.
    ///
    /// Recurring releases differ only in a year or a figure, so a title
    /// only counts when its numbers equal the article title's. When the
    /// article is dated, an entry whose dated references all fall outside
    /// `date_window_days` of it is skipped.
    pub async fn lookup(&self, article: &ArticleContext, date_window_days: i64) -> Result<Option<RegistryEntry>> {
        let key = match_key(&article.title);
        if key.is_empty() {
            return Ok(None);
        }
        let usable = |entry: &RegistryEntry| {
            entry.source_type == SourceType::Primary && referenced_near(entry, article.published, date_window_days)
        };

        let exact = self.store.find_by_match_key(&key).await?;
        if let Some(entry) = best_by_usage(exact.into_iter().filter(|e| usable(e))) {
            return Ok(Some(entry));
        }

        let wanted_numbers = numeric_tokens(&key);
        let primaries = self.store.find(&RegistryFilter::source_type(SourceType::Primary)).await?;
        let mut best: Option<(f32, RegistryEntry)> = None;
        for entry in primaries.into_iter().filter(|e| usable(e)) {
            let score = entry
                .page_title
                .iter()
                .map(|t| (numeric_tokens(t), title_similarity(&article.title, t)))
                .chain(entry.match_keys.iter().map(|k| (numeric_tokens(k), title_similarity(&key, k))))
                .filter(|(numbers, _)| *numbers == wanted_numbers)
                .map(|(_, score)| score)
                .fold(0.0f32, f32::max);
            if score < self.match_threshold {
                continue;
            }
            let better = match &best {
                None => true,
                Some((best_score, best_entry)) => {
                    score > *best_score || (score == *best_score && entry.usage_count > best_entry.usage_count)
                }
            };
            if better {
                best = Some((score, entry));
            }
        }
        Ok(best.map(|(_, entry)| entry))
    }

    /// Delete entries (explicit maintenance only)
    pub async fn remove(&self, urls: &[String]) -> Result<usize> {
        let normalized: Vec<String> = urls
            .iter()
            .map(|u| normalize_url(u).unwrap_or_else(|| u.trim().to_string()))
            .collect();
        let _guard = self.write_lock.lock().await;
        let removed = self.store.remove(&normalized).await?;
        tracing::info!(requested = urls.len(), removed, "Removed registry entries");
        Ok(removed)
    }
}

/// Digit runs in a title ("2026", "12")
fn numeric_tokens(text: &str) -> BTreeSet<&str> {
    text.split(|c: char| !c.is_ascii_digit())
        .filter(|run| !run.is_empty())
        .collect()
}

/// True unless both sides are dated and no reference is within the window
fn referenced_near(entry: &RegistryEntry, published: Option<NaiveDate>, window_days: i64) -> bool {
    let Some(published) = published else {
        return true;
    };
    let mut dates = entry.references.iter().filter_map(|r| r.article_date).peekable();
    if dates.peek().is_none() {
        return true;
    }
    dates.any(|date| days_between(date, published) <= window_days)
}

fn best_by_usage(entries: impl Iterator<Item = RegistryEntry>) -> Option<RegistryEntry> {
    entries.fold(None, |best: Option<RegistryEntry>, entry| match best {
        Some(b) if b.usage_count >= entry.usage_count => Some(b),
        _ => Some(entry),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article(title: &str, id: &str) -> ArticleContext {
        ArticleContext::new(title, "Govern de la Generalitat").with_id(id)
    }

    #[test]
    fn test_match_key_normalises_punctuation_and_case() {
        assert_eq!(
            match_key("  Govern aprova: calendari, festes (2026)! "),
            "govern aprova calendari festes 2026"
        );
    }

    #[test]
    fn test_source_type_merge_never_demotes_primary() {
        assert_eq!(SourceType::merge(SourceType::Primary, SourceType::News), SourceType::Primary);
        assert_eq!(SourceType::merge(SourceType::News, SourceType::Primary), SourceType::Primary);
        assert_eq!(SourceType::merge(SourceType::Other, SourceType::News), SourceType::News);
        assert_eq!("news".parse::<SourceType>().unwrap(), SourceType::News);
        assert!("blog".parse::<SourceType>().is_err());
    }

    #[tokio::test]
    async fn test_record_use_normalises_and_counts() {
        let registry = SourceRegistry::in_memory(0.9);
        let a = article("Govern aprova calendari", "a-1");

        let first = registry
            .record_use("http://Govern.cat/nota/691002/?utm_source=x", SourceType::Primary, None, &a, None)
            .await
            .unwrap();
        assert_eq!(first.url, "https://govern.cat/nota/691002");
        assert_eq!(first.usage_count, 1);
        assert_eq!(first.domain, "govern.cat");

        let second = registry
            .record_use("https://govern.cat/nota/691002", SourceType::Primary, None, &a, None)
            .await
            .unwrap();
        assert_eq!(second.usage_count, 2);
        assert_eq!(second.references.len(), 1);
        assert_eq!(second.first_seen, first.first_seen);
    }

    #[tokio::test]
    async fn test_lookup_exact_and_fuzzy() {
        let registry = SourceRegistry::in_memory(0.9);
        registry
            .record_use(
                "https://govern.cat/nota/691002",
                SourceType::Primary,
                Some("Govern aprova el calendari de festes laborals 2026".to_string()),
                &article("Govern aprova calendari festes laborals 2026", "a-1"),
                None,
            )
            .await
            .unwrap();

        let exact = registry
            .lookup(&article("Govern aprova calendari, festes laborals 2026", "a-2"), 7)
            .await
            .unwrap();
        assert_eq!(exact.unwrap().url, "https://govern.cat/nota/691002");

        let fuzzy = registry
            .lookup(&article("Govern aprova calendari festes laboral 2026", "a-3"), 7)
            .await
            .unwrap();
        assert!(fuzzy.is_some());

        let miss = registry.lookup(&article("Pressupostos 2026", "a-4"), 7).await.unwrap();
        assert!(miss.is_none());
    }

    #[tokio::test]
    async fn test_lookup_requires_same_numbers() {
        let registry = SourceRegistry::in_memory(0.9);
        registry
            .record_use(
                "https://govern.cat/nota/691002",
                SourceType::Primary,
                Some("Govern aprova calendari festes laborals per l'any 2026".to_string()),
                &article("Govern aprova calendari festes laborals per l'any 2026", "a-1"),
                None,
            )
            .await
            .unwrap();

        let next_year = article("Govern aprova calendari festes laborals per l'any 2027", "a-2");
        assert!(registry.lookup(&next_year, 7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_lookup_skips_entries_referenced_outside_window() {
        let registry = SourceRegistry::in_memory(0.9);
        let title = "Calendari escolar aprovat pel Departament d'Educació";
        registry
            .record_use(
                "https://educacio.gencat.cat/ca/actualitat/calendari-escolar",
                SourceType::Primary,
                None,
                &article(title, "a-1").with_date(NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()),
                None,
            )
            .await
            .unwrap();

        let same_week = article(title, "a-2").with_date(NaiveDate::from_ymd_opt(2025, 6, 4).unwrap());
        assert!(registry.lookup(&same_week, 7).await.unwrap().is_some());

        let next_year = article(title, "a-3").with_date(NaiveDate::from_ymd_opt(2026, 6, 1).unwrap());
        assert!(registry.lookup(&next_year, 7).await.unwrap().is_none());

        let undated = article(title, "a-4");
        assert!(registry.lookup(&undated, 7).await.unwrap().is_some());
    }

    #[test]
    fn test_numeric_tokens() {
        let tokens = numeric_tokens("govern aprova 12 festes per l any 2026");
        assert_eq!(tokens.into_iter().collect::<Vec<_>>(), vec!["12", "2026"]);
    }

    #[tokio::test]
    async fn test_news_entries_never_hit_fast_path() {
        let registry = SourceRegistry::in_memory(0.9);
        let a = article("Govern aprova calendari festes laborals 2026", "a-1");
        registry
            .record_use("https://diari.cat/noticia/1", SourceType::News, None, &a, None)
            .await
            .unwrap();
        assert!(registry.lookup(&a, 7).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_non_http_url_rejected() {
        let registry = SourceRegistry::in_memory(0.9);
        let err = registry
            .record_use("mailto:x@y.z", SourceType::Primary, None, &article("t", "a"), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
