//! Candidate validation: one fetched page scored against one article
//!
//! Pure function of (candidate, article, thresholds). Hard problems go to
//! `issues` and make the candidate invalid; soft concerns go to `warnings`.
//! Nothing here returns an error.

use super::generic_page::is_generic_path;
use super::similarity::{content_overlap, missing_keywords, title_similarity};
use crate::config::ValidationPolicy;
use crate::extractors::html::title_from_file_name;
use crate::services::url_normalizer::{numeric_ids, parse_http_url};
use crate::services::FetchedCandidate;
use crate::types::{ArticleContext, CandidateResult, ValidationIssue, ValidationOutcome, ValidationWarning};
use primsrc_common::time::days_between;

/// Leading characters of page text checked for removal notices
const SIGNATURE_SCAN_CHARS: usize = 1000;

/// Expected keywords listed in a warning
const MAX_LISTED_KEYWORDS: usize = 3;

/// Phrases that mean the page no longer carries the document
const ERROR_SIGNATURES: &[&str] = &[
    "no longer available",
    "no longer exists",
    "content not found",
    "content has been removed",
    "document not found",
    "page not found",
    "404 not found",
    "error 404",
    "unpublished",
    "access denied",
    "artículo no disponible",
    "la noticia ya no está disponible",
    "ha sido despublicada",
    "página no encontrada",
    "pagina no encontrada",
    "no s'ha trobat",
    "la pàgina no existeix",
    "contingut no disponible",
];

/// Hosts that answer 401/403 to anonymous fetches
const SOCIAL_HOSTS: &[&str] = &["twitter.com", "x.com", "facebook.com", "instagram.com"];

fn is_social_host(host: &str) -> bool {
    SOCIAL_HOSTS
        .iter()
        .any(|social| host == *social || host.ends_with(&format!(".{}", social)))
}

/// Turn a fetch outcome into a validation outcome
pub fn validate_fetched(
    fetched: &FetchedCandidate,
    article: &ArticleContext,
    policy: &ValidationPolicy,
) -> ValidationOutcome {
    match fetched {
        FetchedCandidate::Page(page) => validate(page, article, policy),
        FetchedCandidate::Failed { url, error } => ValidationOutcome::rejected(
            url.clone(),
            ValidationIssue::FetchFailed {
                message: format!("{} after {} attempt(s)", error.last_error, error.attempts),
            },
        ),
        FetchedCandidate::InvalidUrl { url } => ValidationOutcome::rejected(
            url.clone(),
            ValidationIssue::InvalidUrl {
                reason: "not an absolute http(s) URL".to_string(),
            },
        ),
    }
}

/// Score a fetched candidate against the article
pub fn validate(candidate: &CandidateResult, article: &ArticleContext, policy: &ValidationPolicy) -> ValidationOutcome {
    let mut outcome = ValidationOutcome {
        requested_url: candidate.requested_url.clone(),
        url: candidate.final_url.clone(),
        status_code: Some(candidate.status_code),
        is_valid: false,
        content_match_score: 0.0,
        title_match_score: 0.0,
        issues: Vec::new(),
        warnings: Vec::new(),
        page_title: candidate.page_title.clone(),
        page_date: candidate.page_date,
        downgraded: false,
    };

    let Some(final_url) = parse_http_url(&candidate.final_url) else {
        outcome.issues.push(ValidationIssue::InvalidUrl {
            reason: format!("unparseable final URL '{}'", candidate.final_url),
        });
        return outcome;
    };

    // Generic pages short-circuit before any scoring
    if is_generic_path(final_url.path()) {
        outcome.issues.push(ValidationIssue::GenericPage {
            path: final_url.path().to_string(),
        });
        return outcome;
    }

    if candidate.status_code != 200 {
        let host = final_url.host_str().unwrap_or_default().to_ascii_lowercase();
        let issue = if matches!(candidate.status_code, 401 | 403) && is_social_host(&host) {
            ValidationIssue::SocialMediaBlocked {
                status: candidate.status_code,
            }
        } else {
            ValidationIssue::HttpStatus {
                status: candidate.status_code,
            }
        };
        outcome.issues.push(issue);
        return outcome;
    }

    check_redirect_ids(candidate, &mut outcome);

    if candidate.is_pdf() {
        score_pdf(candidate, article, policy, &mut outcome);
    } else {
        score_html(candidate, article, policy, &mut outcome);
    }
    if !outcome.issues.is_empty() {
        return outcome;
    }

    check_date(candidate, article, policy, &mut outcome);

    outcome.is_valid = outcome.issues.is_empty()
        && (outcome.content_match_score >= policy.min_content_score
            || outcome.title_match_score >= policy.min_title_score);
    outcome
}

fn check_redirect_ids(candidate: &CandidateResult, outcome: &mut ValidationOutcome) {
    if candidate.requested_url == candidate.final_url {
        return;
    }
    let requested = numeric_ids(&candidate.requested_url);
    let landed = numeric_ids(&candidate.final_url);
    if let (Some(from), Some(to)) = (requested.first(), landed.first()) {
        if requested != landed {
            outcome.warnings.push(ValidationWarning::RedirectedToDifferentId {
                from: from.clone(),
                to: to.clone(),
            });
        }
    }
}

/// PDFs are scored on the file-name title only
fn score_pdf(candidate: &CandidateResult, article: &ArticleContext, policy: &ValidationPolicy, outcome: &mut ValidationOutcome) {
    let title = candidate
        .page_title
        .clone()
        .or_else(|| title_from_file_name(&candidate.final_url));
    score_title(title.as_deref(), article, policy, outcome);
    outcome.page_title = title;
    outcome.warnings.push(ValidationWarning::UnscoredDocument {
        content_type: "PDF".to_string(),
    });
}

fn score_html(candidate: &CandidateResult, article: &ArticleContext, policy: &ValidationPolicy, outcome: &mut ValidationOutcome) {
    let text = candidate.text.trim();
    if text.is_empty() {
        outcome.issues.push(ValidationIssue::Malformed {
            reason: "no extractable content".to_string(),
        });
        return;
    }

    let head: String = text.chars().take(SIGNATURE_SCAN_CHARS).collect::<String>().to_lowercase();
    if let Some(signature) = ERROR_SIGNATURES.iter().find(|sig| head.contains(*sig)) {
        outcome.issues.push(ValidationIssue::Unavailable {
            signature: signature.to_string(),
        });
        return;
    }

    let chars = text.chars().count();
    if chars < policy.short_content_chars {
        outcome.warnings.push(ValidationWarning::ShortContent { chars });
    }

    score_title(candidate.page_title.as_deref(), article, policy, outcome);

    let article_text = format!("{} {}", article.title, article.body);
    outcome.content_match_score = content_overlap(&article_text, text);
    if outcome.content_match_score < policy.min_content_score {
        outcome.warnings.push(ValidationWarning::LowContentMatch {
            score: outcome.content_match_score,
        });
    }

    let missing = missing_keywords(&article.expected_keywords, text);
    if !missing.is_empty() {
        outcome.warnings.push(ValidationWarning::MissingKeywords {
            keywords: missing.into_iter().take(MAX_LISTED_KEYWORDS).collect(),
        });
    }
}

fn score_title(page_title: Option<&str>, article: &ArticleContext, policy: &ValidationPolicy, outcome: &mut ValidationOutcome) {
    match page_title.filter(|t| !t.trim().is_empty()) {
        Some(title) => {
            outcome.title_match_score = title_similarity(&article.title, title);
            if outcome.title_match_score < policy.title_warning_score {
                outcome.warnings.push(ValidationWarning::TitleMismatch {
                    score: outcome.title_match_score,
                });
            }
        }
        None => outcome.warnings.push(ValidationWarning::MissingTitle),
    }
}

fn check_date(candidate: &CandidateResult, article: &ArticleContext, policy: &ValidationPolicy, outcome: &mut ValidationOutcome) {
    if let (Some(page_date), Some(article_date)) = (candidate.page_date, article.published) {
        let days = days_between(page_date, article_date);
        if days > policy.date_window_days {
            outcome.warnings.push(ValidationWarning::DateOutsideWindow {
                page_date,
                article_date,
                days,
            });
        }
    }
}
