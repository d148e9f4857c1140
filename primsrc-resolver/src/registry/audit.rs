//! Registry audit
//!
//! Explicit maintenance pass: re-fetch registered URLs and report which
//! ones still resolve to a specific, reachable page. Never runs as part of
//! resolution and never modifies the registry; removing stale entries is a
//! separate call to [`SourceRegistry::remove`].

use super::{RegistryFilter, SourceRegistry};
use crate::config::RetryPolicy;
use crate::services::url_normalizer::{normalize_url, path_of};
use crate::services::PageFetcher;
use crate::utils::retry::with_retry;
use crate::validators::is_generic_path;
use primsrc_common::Result;
use serde::Serialize;

/// Audit verdict for one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum AuditStatus {
    Ok,
    /// Still reachable, but not cleanly (non-200 success, redirect elsewhere)
    Warning(String),
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryAudit {
    pub url: String,
    pub status: AuditStatus,
    pub final_url: Option<String>,
    pub status_code: Option<u16>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AuditReport {
    pub entries: Vec<EntryAudit>,
}

impl AuditReport {
    pub fn ok_count(&self) -> usize {
        self.count(|s| matches!(s, AuditStatus::Ok))
    }

    pub fn warning_count(&self) -> usize {
        self.count(|s| matches!(s, AuditStatus::Warning(_)))
    }

    pub fn invalid_count(&self) -> usize {
        self.count(|s| matches!(s, AuditStatus::Invalid(_)))
    }

    /// URLs judged invalid, ready to hand to `remove`
    pub fn invalid_urls(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|e| matches!(e.status, AuditStatus::Invalid(_)))
            .map(|e| e.url.clone())
            .collect()
    }

    fn count(&self, predicate: impl Fn(&AuditStatus) -> bool) -> usize {
        self.entries.iter().filter(|e| predicate(&e.status)).count()
    }
}

/// Classify one fetched entry
pub fn classify(url: &str, final_url: &str, status_code: u16) -> AuditStatus {
    if status_code >= 400 {
        return AuditStatus::Invalid(format!("HTTP {}", status_code));
    }

    let final_path = path_of(final_url);
    if is_generic_path(&final_path) {
        return AuditStatus::Invalid(format!("resolves to a generic page ({})", final_url));
    }

    let final_normalized = normalize_url(final_url).unwrap_or_else(|| final_url.to_string());
    if final_normalized != url {
        return AuditStatus::Warning(format!("redirects to {}", final_normalized));
    }
    if status_code != 200 {
        return AuditStatus::Warning(format!("HTTP {}", status_code));
    }
    AuditStatus::Ok
}

impl SourceRegistry {
    /// Re-fetch every entry matching `filter`, one at a time
    ///
    /// Fetch failures (after retries) are reported as `Invalid`; only
    /// registry read errors abort the audit.
    pub async fn audit(
        &self,
        fetcher: &dyn PageFetcher,
        filter: &RegistryFilter,
        retry: &RetryPolicy,
    ) -> Result<AuditReport> {
        let entries = self.find(filter).await?;
        tracing::info!(entries = entries.len(), "Starting registry audit");

        let mut report = AuditReport::default();
        for entry in entries {
            let fetched = with_retry(fetcher.name(), retry, || fetcher.fetch(&entry.url)).await;
            let audit = match fetched {
                Ok(page) => EntryAudit {
                    status: classify(&entry.url, &page.final_url, page.status_code),
                    final_url: Some(page.final_url),
                    status_code: Some(page.status_code),
                    url: entry.url,
                },
                Err(exhausted) => EntryAudit {
                    status: AuditStatus::Invalid(format!("fetch failed: {}", exhausted.last_error)),
                    final_url: None,
                    status_code: None,
                    url: entry.url,
                },
            };

            if audit.status != AuditStatus::Ok {
                tracing::warn!(url = %audit.url, status = ?audit.status, "Registry entry failed audit");
            }
            report.entries.push(audit);
        }

        tracing::info!(
            ok = report.ok_count(),
            warnings = report.warning_count(),
            invalid = report.invalid_count(),
            "Registry audit complete"
        );
        Ok(report)
    }
}
