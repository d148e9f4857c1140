//! In-memory registry store

use super::{RegistryEntry, RegistryFilter, RegistryStore, SourceType, SourceUse};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use primsrc_common::Result;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Registry store backed by a mutex-guarded map
///
/// Nothing survives the process; used by tests and dry runs.
#[derive(Default)]
pub struct MemoryRegistryStore {
    entries: Mutex<BTreeMap<String, RegistryEntry>>,
}

impl MemoryRegistryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryStore for MemoryRegistryStore {
    async fn get(&self, url: &str) -> Result<Option<RegistryEntry>> {
        Ok(self.entries.lock().await.get(url).cloned())
    }

    async fn record_use(&self, source_use: &SourceUse, now: DateTime<Utc>) -> Result<RegistryEntry> {
        let mut entries = self.entries.lock().await;
        let entry = entries
            .entry(source_use.url.clone())
            .and_modify(|entry| {
                entry.usage_count += 1;
                entry.last_seen = now;
                entry.source_type = SourceType::merge(entry.source_type, source_use.source_type);
                if source_use.page_title.is_some() {
                    entry.page_title = source_use.page_title.clone();
                }
            })
            .or_insert_with(|| RegistryEntry {
                url: source_use.url.clone(),
                source_type: source_use.source_type,
                domain: source_use.domain.clone(),
                page_title: source_use.page_title.clone(),
                first_seen: now,
                last_seen: now,
                usage_count: 1,
                references: Vec::new(),
                match_keys: Vec::new(),
            });

        let article_id = &source_use.reference.article_id;
        if !entry.references.iter().any(|r| &r.article_id == article_id) {
            entry.references.push(source_use.reference.clone());
        }
        if let Some(key) = &source_use.match_key {
            if !entry.match_keys.contains(key) {
                entry.match_keys.push(key.clone());
            }
        }
        Ok(entry.clone())
    }

    async fn find(&self, filter: &RegistryFilter) -> Result<Vec<RegistryEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .values()
            .filter(|entry| filter.matches(entry))
            .cloned()
            .collect())
    }

    async fn find_by_match_key(&self, match_key: &str) -> Result<Vec<RegistryEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .values()
            .filter(|entry| entry.match_keys.iter().any(|k| k == match_key))
            .cloned()
            .collect())
    }

    async fn remove(&self, urls: &[String]) -> Result<usize> {
        let mut entries = self.entries.lock().await;
        Ok(urls.iter().filter(|url| entries.remove(url.as_str()).is_some()).count())
    }
}
