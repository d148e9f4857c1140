//! Source registry on SQLite: persistence and concurrent updates

use primsrc_resolver::registry::{SqliteRegistryStore, SourceType};
use primsrc_resolver::{ArticleContext, RegistryFilter, SourceRegistry};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::task::JoinSet;

const URL: &str = "https://govern.cat/gov/notes-premsa/691002/govern-aprova-calendari-festes-laborals-lany-2026";

async fn open_registry(dir: &TempDir) -> Arc<SourceRegistry> {
    let store = SqliteRegistryStore::open(&dir.path().join("registry.db"), 10_000)
        .await
        .unwrap();
    Arc::new(SourceRegistry::new(Arc::new(store), 0.9))
}

fn article(id: usize) -> ArticleContext {
    ArticleContext::new("Govern aprova calendari festes laborals per l'any 2026", "Govern de la Generalitat")
        .with_id(format!("article-{}", id))
}

#[tokio::test]
async fn test_entries_survive_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let registry = open_registry(&dir).await;
        registry
            .record_use(URL, SourceType::Primary, Some("Calendari 2026".to_string()), &article(1), None)
            .await
            .unwrap();
    }

    let registry = open_registry(&dir).await;
    let entry = registry.get(URL).await.unwrap().expect("entry persisted");
    assert_eq!(entry.usage_count, 1);
    assert_eq!(entry.page_title.as_deref(), Some("Calendari 2026"));
    assert_eq!(entry.domain, "govern.cat");

    let hit = registry.lookup(&article(2), 7).await.unwrap();
    assert_eq!(hit.map(|e| e.url), Some(URL.to_string()));
}

#[tokio::test]
async fn test_concurrent_updates_lose_no_increment() {
    let dir = TempDir::new().unwrap();
    // Two registries on separate pools behave like two processes sharing the file
    let registries = [open_registry(&dir).await, open_registry(&dir).await];

    let mut join_set = JoinSet::new();
    for i in 0..20 {
        let registry = Arc::clone(&registries[i % 2]);
        join_set.spawn(async move {
            registry
                .record_use(URL, SourceType::Primary, None, &article(i), None)
                .await
                .map(|entry| entry.usage_count)
        });
    }

    let mut counts = Vec::new();
    while let Some(result) = join_set.join_next().await {
        counts.push(result.expect("task panicked").expect("record_use failed"));
    }

    let entry = registries[0].get(URL).await.unwrap().unwrap();
    assert_eq!(entry.usage_count, 20);
    assert_eq!(entry.references.len(), 20);
    assert_eq!(counts.iter().max(), Some(&20));
}

#[tokio::test]
async fn test_find_and_remove() {
    let dir = TempDir::new().unwrap();
    let registry = open_registry(&dir).await;

    registry
        .record_use(URL, SourceType::Primary, None, &article(1), None)
        .await
        .unwrap();
    registry
        .record_use("https://www.diari.cat/societat/festes-2026", SourceType::News, None, &article(1), None)
        .await
        .unwrap();

    let primaries = registry
        .find(&RegistryFilter::source_type(SourceType::Primary))
        .await
        .unwrap();
    assert_eq!(primaries.len(), 1);

    let by_domain = registry.find(&RegistryFilter::domain("diari.cat")).await.unwrap();
    assert_eq!(by_domain.len(), 1);
    assert_eq!(by_domain[0].source_type, SourceType::News);

    let removed = registry.remove(&[URL.to_string()]).await.unwrap();
    assert_eq!(removed, 1);
    assert!(registry.get(URL).await.unwrap().is_none());
    assert_eq!(registry.find(&RegistryFilter::default()).await.unwrap().len(), 1);
}
