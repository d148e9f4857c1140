//! SQLite-backed registry store
//!
//! One row per normalised URL in `source_registry`; references and match
//! keys in child tables. `record_use` runs as one transaction built on an
//! `INSERT ... ON CONFLICT DO UPDATE`, so concurrent writers (including
//! other processes sharing the file) never lose an increment. Lock
//! contention is retried with backoff.

use super::{ArticleReference, RegistryEntry, RegistryFilter, RegistryStore, SourceUse};
use crate::utils::retry::retry_on_lock;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use primsrc_common::db::init_database;
use primsrc_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::path::Path;
use uuid::Uuid;

const ENTRY_COLUMNS: &str = "url, source_type, domain, page_title, first_seen, last_seen, usage_count";

/// Registry store on an SQLite pool
pub struct SqliteRegistryStore {
    pool: SqlitePool,
    max_lock_wait_ms: u64,
}

impl SqliteRegistryStore {
    pub fn new(pool: SqlitePool, max_lock_wait_ms: u64) -> Self {
        Self { pool, max_lock_wait_ms }
    }

    /// Open (creating and migrating if needed) the registry database file
    pub async fn open(path: &Path, max_lock_wait_ms: u64) -> Result<Self> {
        let pool = init_database(path).await?;
        Ok(Self::new(pool, max_lock_wait_ms))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn record_use_once(&self, source_use: &SourceUse, now: DateTime<Utc>) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO source_registry
                (url, source_type, domain, page_title, first_seen, last_seen, usage_count)
            VALUES (?, ?, ?, ?, ?, ?, 1)
            ON CONFLICT(url) DO UPDATE SET
                usage_count = source_registry.usage_count + 1,
                last_seen = excluded.last_seen,
                source_type = CASE
                    WHEN source_registry.source_type = 'primary' THEN 'primary'
                    ELSE excluded.source_type
                END,
                page_title = COALESCE(excluded.page_title, source_registry.page_title)
            "#,
        )
        .bind(&source_use.url)
        .bind(source_use.source_type.as_str())
        .bind(&source_use.domain)
        .bind(&source_use.page_title)
        .bind(now)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        let reference = &source_use.reference;
        sqlx::query(
            r#"
            INSERT OR IGNORE INTO source_references
                (url, article_id, run_id, filename, article_date, added_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&source_use.url)
        .bind(&reference.article_id)
        .bind(reference.run_id.map(|id| id.to_string()))
        .bind(&reference.filename)
        .bind(reference.article_date)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if let Some(key) = &source_use.match_key {
            sqlx::query("INSERT OR IGNORE INTO source_match_keys (url, match_key) VALUES (?, ?)")
                .bind(&source_use.url)
                .bind(key)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn load_details(&self, row: SqliteRow) -> Result<RegistryEntry> {
        let url: String = row.try_get("url")?;
        let source_type: String = row.try_get("source_type")?;

        let reference_rows = sqlx::query(
            r#"
            SELECT article_id, run_id, filename, article_date
            FROM source_references
            WHERE url = ?
            ORDER BY id
            "#,
        )
        .bind(&url)
        .fetch_all(&self.pool)
        .await?;

        let references = reference_rows
            .into_iter()
            .map(|r| -> Result<ArticleReference> {
                let run_id: Option<String> = r.try_get("run_id")?;
                Ok(ArticleReference {
                    article_id: r.try_get("article_id")?,
                    run_id: run_id.and_then(|id| Uuid::parse_str(&id).ok()),
                    filename: r.try_get("filename")?,
                    article_date: r.try_get::<Option<NaiveDate>, _>("article_date")?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let match_keys: Vec<String> =
            sqlx::query_scalar("SELECT match_key FROM source_match_keys WHERE url = ? ORDER BY match_key")
                .bind(&url)
                .fetch_all(&self.pool)
                .await?;

        Ok(RegistryEntry {
            source_type: source_type.parse()?,
            domain: row.try_get("domain")?,
            page_title: row.try_get("page_title")?,
            first_seen: row.try_get("first_seen")?,
            last_seen: row.try_get("last_seen")?,
            usage_count: row.try_get("usage_count")?,
            references,
            match_keys,
            url,
        })
    }

    async fn load_all(&self, rows: Vec<SqliteRow>) -> Result<Vec<RegistryEntry>> {
        let mut entries = Vec::with_capacity(rows.len());
        for row in rows {
            entries.push(self.load_details(row).await?);
        }
        Ok(entries)
    }
}

#[async_trait]
impl RegistryStore for SqliteRegistryStore {
    async fn get(&self, url: &str) -> Result<Option<RegistryEntry>> {
        let row = sqlx::query(&format!("SELECT {} FROM source_registry WHERE url = ?", ENTRY_COLUMNS))
            .bind(url)
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.load_details(row).await?)),
            None => Ok(None),
        }
    }

    async fn record_use(&self, source_use: &SourceUse, now: DateTime<Utc>) -> Result<RegistryEntry> {
        retry_on_lock("registry record_use", self.max_lock_wait_ms, || {
            self.record_use_once(source_use, now)
        })
        .await?;

        self.get(&source_use.url).await?.ok_or_else(|| {
            primsrc_common::Error::Internal(format!("Registry entry vanished after upsert: {}", source_use.url))
        })
    }

    async fn find(&self, filter: &RegistryFilter) -> Result<Vec<RegistryEntry>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {}
            FROM source_registry
            WHERE (?1 IS NULL OR domain LIKE '%' || ?1 || '%')
              AND (?2 IS NULL OR source_type = ?2)
            ORDER BY url
            "#,
            ENTRY_COLUMNS
        ))
        .bind(filter.domain.as_deref().map(str::to_lowercase))
        .bind(filter.source_type.map(|t| t.as_str()))
        .fetch_all(&self.pool)
        .await?;

        self.load_all(rows).await
    }

    async fn find_by_match_key(&self, match_key: &str) -> Result<Vec<RegistryEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT r.url, r.source_type, r.domain, r.page_title, r.first_seen, r.last_seen, r.usage_count
            FROM source_registry r
            JOIN source_match_keys k ON k.url = r.url
            WHERE k.match_key = ?
            ORDER BY r.url
            "#,
        )
        .bind(match_key)
        .fetch_all(&self.pool)
        .await?;

        self.load_all(rows).await
    }

    async fn remove(&self, urls: &[String]) -> Result<usize> {
        retry_on_lock("registry remove", self.max_lock_wait_ms, || async move {
            let mut tx = self.pool.begin().await?;
            let mut removed = 0usize;
            for url in urls {
                sqlx::query("DELETE FROM source_references WHERE url = ?")
                    .bind(url)
                    .execute(&mut *tx)
                    .await?;
                sqlx::query("DELETE FROM source_match_keys WHERE url = ?")
                    .bind(url)
                    .execute(&mut *tx)
                    .await?;
                let result = sqlx::query("DELETE FROM source_registry WHERE url = ?")
                    .bind(url)
                    .execute(&mut *tx)
                    .await?;
                removed += result.rows_affected() as usize;
            }
            tx.commit().await?;
            Ok::<_, primsrc_common::Error>(removed)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SourceType;
    use primsrc_common::db::init_memory_database;

    async fn store() -> SqliteRegistryStore {
        SqliteRegistryStore::new(init_memory_database().await.unwrap(), 1000)
    }

    fn source_use(url: &str, article_id: &str, source_type: SourceType) -> SourceUse {
        SourceUse {
            url: url.to_string(),
            domain: "govern.cat".to_string(),
            source_type,
            page_title: Some("Calendari".to_string()),
            reference: ArticleReference {
                article_id: article_id.to_string(),
                run_id: Some(Uuid::nil()),
                filename: Some("article.json".to_string()),
                article_date: NaiveDate::from_ymd_opt(2025, 11, 10),
            },
            match_key: Some("govern aprova calendari".to_string()),
        }
    }

    #[tokio::test]
    async fn test_insert_then_update() {
        let store = store().await;
        let url = "https://govern.cat/nota/691002";

        let first = store
            .record_use(&source_use(url, "a-1", SourceType::Primary), Utc::now())
            .await
            .unwrap();
        assert_eq!(first.usage_count, 1);
        assert_eq!(first.references.len(), 1);
        assert_eq!(first.references[0].run_id, Some(Uuid::nil()));
        assert_eq!(first.references[0].article_date, NaiveDate::from_ymd_opt(2025, 11, 10));
        assert_eq!(first.match_keys, vec!["govern aprova calendari".to_string()]);

        let second = store
            .record_use(&source_use(url, "a-2", SourceType::News), Utc::now())
            .await
            .unwrap();
        assert_eq!(second.usage_count, 2);
        assert_eq!(second.article_ids(), vec!["a-1", "a-2"]);
        assert_eq!(second.source_type, SourceType::Primary);
        assert_eq!(second.first_seen, first.first_seen);
        assert!(second.last_seen >= first.last_seen);
    }

    #[tokio::test]
    async fn test_same_article_counts_again_without_duplicate_reference() {
        let store = store().await;
        let url = "https://govern.cat/nota/691002";
        store.record_use(&source_use(url, "a-1", SourceType::Primary), Utc::now()).await.unwrap();
        let again = store.record_use(&source_use(url, "a-1", SourceType::Primary), Utc::now()).await.unwrap();
        assert_eq!(again.usage_count, 2);
        assert_eq!(again.references.len(), 1);
    }

    #[tokio::test]
    async fn test_find_by_domain_type_and_key() {
        let store = store().await;
        store
            .record_use(&source_use("https://govern.cat/a", "a-1", SourceType::Primary), Utc::now())
            .await
            .unwrap();
        let mut news = source_use("https://diari.cat/b", "a-2", SourceType::News);
        news.domain = "diari.cat".to_string();
        news.match_key = None;
        store.record_use(&news, Utc::now()).await.unwrap();

        let govern = store.find(&RegistryFilter::domain("GOVERN")).await.unwrap();
        assert_eq!(govern.len(), 1);
        assert_eq!(govern[0].url, "https://govern.cat/a");

        let news_only = store.find(&RegistryFilter::source_type(SourceType::News)).await.unwrap();
        assert_eq!(news_only.len(), 1);
        assert_eq!(news_only[0].url, "https://diari.cat/b");

        assert_eq!(store.find(&RegistryFilter::default()).await.unwrap().len(), 2);

        let keyed = store.find_by_match_key("govern aprova calendari").await.unwrap();
        assert_eq!(keyed.len(), 1);
    }

    #[tokio::test]
    async fn test_remove() {
        let store = store().await;
        store
            .record_use(&source_use("https://govern.cat/a", "a-1", SourceType::Primary), Utc::now())
            .await
            .unwrap();

        let removed = store
            .remove(&["https://govern.cat/a".to_string(), "https://govern.cat/missing".to_string()])
            .await
            .unwrap();
        assert_eq!(removed, 1);
        assert!(store.get("https://govern.cat/a").await.unwrap().is_none());
        assert!(store.find_by_match_key("govern aprova calendari").await.unwrap().is_empty());
    }
}
