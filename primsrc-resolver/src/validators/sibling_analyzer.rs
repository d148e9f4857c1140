//! Numeric-ID sibling analysis
//!
//! Press rooms often publish the same slug under several numeric IDs
//! (`/notes-premsa/445831/slug` and `/notes-premsa/691002/slug`), one of
//! them stale. Two candidates are siblings when host and path match except
//! for exactly one segment, and that segment is numeric in both.
//!
//! Within a sibling pair the candidate dated inside the article's window
//! is preferred; the other gets a `NumericIdMismatch` warning and is
//! marked `downgraded`. Neither is discarded. Without a date preference
//! both carry the warning and neither is downgraded.

use crate::services::url_normalizer::parse_http_url;
use crate::types::{ValidationOutcome, ValidationWarning};
use chrono::NaiveDate;
use primsrc_common::time::days_between;

/// IDs of `a` and `b` when they are numeric-ID siblings
pub fn numeric_siblings(a: &str, b: &str) -> Option<(String, String)> {
    let (a, b) = (parse_http_url(a)?, parse_http_url(b)?);
    if !a.host_str()?.eq_ignore_ascii_case(b.host_str()?) {
        return None;
    }

    let a_segments: Vec<&str> = a.path().trim_end_matches('/').split('/').collect();
    let b_segments: Vec<&str> = b.path().trim_end_matches('/').split('/').collect();
    if a_segments.len() != b_segments.len() {
        return None;
    }

    let mut differing = a_segments
        .iter()
        .zip(&b_segments)
        .filter(|(x, y)| !x.eq_ignore_ascii_case(y));
    let (&a_id, &b_id) = differing.next()?;
    if differing.next().is_some() {
        return None;
    }

    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|c| c.is_ascii_digit());
    (numeric(a_id) && numeric(b_id)).then(|| (a_id.to_string(), b_id.to_string()))
}

fn within_window(date: Option<NaiveDate>, article_date: NaiveDate, window_days: i64) -> bool {
    date.map(|d| days_between(d, article_date) <= window_days)
        .unwrap_or(false)
}

/// Flag sibling pairs among `outcomes`
///
/// Only candidates that were actually fetched (have a status) take part.
/// Returns the number of sibling pairs found.
pub fn analyze_siblings(
    outcomes: &mut [ValidationOutcome],
    article_date: Option<NaiveDate>,
    window_days: i64,
) -> usize {
    let mut pairs = 0;

    for i in 0..outcomes.len() {
        for j in (i + 1)..outcomes.len() {
            if outcomes[i].status_code.is_none() || outcomes[j].status_code.is_none() {
                continue;
            }
            let Some((i_id, j_id)) = numeric_siblings(&outcomes[i].url, &outcomes[j].url) else {
                continue;
            };
            pairs += 1;

            let (i_in, j_in) = match article_date {
                Some(date) => (
                    within_window(outcomes[i].page_date, date, window_days),
                    within_window(outcomes[j].page_date, date, window_days),
                ),
                None => (false, false),
            };

            let i_warning = ValidationWarning::NumericIdMismatch {
                sibling_url: outcomes[j].url.clone(),
                own_id: i_id.clone(),
                sibling_id: j_id.clone(),
            };
            let j_warning = ValidationWarning::NumericIdMismatch {
                sibling_url: outcomes[i].url.clone(),
                own_id: j_id,
                sibling_id: i_id,
            };

            match (i_in, j_in) {
                (true, false) => {
                    outcomes[j].warnings.push(j_warning);
                    outcomes[j].downgraded = true;
                }
                (false, true) => {
                    outcomes[i].warnings.push(i_warning);
                    outcomes[i].downgraded = true;
                }
                _ => {
                    outcomes[i].warnings.push(i_warning);
                    outcomes[j].warnings.push(j_warning);
                }
            }

            tracing::debug!(
                first = %outcomes[i].url,
                second = %outcomes[j].url,
                first_in_window = i_in,
                second_in_window = j_in,
                "Numeric-ID siblings detected"
            );
        }
    }

    pairs
}
