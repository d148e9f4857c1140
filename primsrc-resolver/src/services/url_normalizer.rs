//! URL normalisation and candidate URL variants
//!
//! The normalised form is the registry key and the dedupe key for
//! candidates within a run.

use once_cell::sync::Lazy;
use regex::Regex;
use url::Url;

/// Query parameters that only carry tracking state
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "yclid", "igshid"];

/// Path segment led by a long number (article/press-release ID)
static NUMERIC_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{5,})(?:[-_.]|$)").expect("valid numeric id regex"));

fn is_tracking_param(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    lower.starts_with("utm_") || TRACKING_PARAMS.contains(&lower.as_str())
}

/// Parse an absolute http(s) URL, tolerating surrounding whitespace and a
/// `view-source:` prefix
pub fn parse_http_url(raw: &str) -> Option<Url> {
    let trimmed = raw.trim();
    let trimmed = trimmed.strip_prefix("view-source:").unwrap_or(trimmed);
    let url = Url::parse(trimmed).ok()?;
    match url.scheme() {
        "http" | "https" if url.host_str().is_some() => Some(url),
        _ => None,
    }
}

/// Canonical form of a URL
///
/// https scheme, lowercase host, no fragment, no tracking parameters, no
/// trailing slash except on the root path. Returns `None` for anything that
/// is not an absolute http(s) URL.
pub fn normalize_url(raw: &str) -> Option<String> {
    let mut url = parse_http_url(raw)?;

    if url.scheme() == "http" {
        url.set_scheme("https").ok()?;
    }
    url.set_fragment(None);

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if kept.is_empty() {
        url.set_query(None);
    } else if url.query_pairs().count() != kept.len() {
        url.query_pairs_mut().clear().extend_pairs(kept.iter());
    }

    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    Some(url.to_string())
}

/// Registrable-ish domain: lowercase host without a leading `www.`
pub fn domain_of(raw: &str) -> Option<String> {
    let url = parse_http_url(raw)?;
    let host = url.host_str()?.to_ascii_lowercase();
    Some(host.strip_prefix("www.").unwrap_or(&host).to_string())
}

/// URL path, or an empty string when unparseable
pub fn path_of(raw: &str) -> String {
    parse_http_url(raw)
        .map(|url| url.path().to_string())
        .unwrap_or_default()
}

/// Numeric IDs of five or more digits appearing as path segments
pub fn numeric_ids(raw: &str) -> Vec<String> {
    path_of(raw)
        .split('/')
        .filter_map(|segment| NUMERIC_ID_RE.captures(segment))
        .map(|caps| caps[1].to_string())
        .collect()
}

/// Target of a news-aggregator redirect wrapper, if `raw` is one
pub fn unwrap_news_redirect(raw: &str) -> Option<String> {
    let url = parse_http_url(raw)?;
    if !url.host_str()?.contains("news.google.com") {
        return None;
    }
    for key in ["url", "q", "u"] {
        if let Some((_, value)) = url.query_pairs().find(|(k, _)| k == key) {
            if parse_http_url(&value).is_some() {
                return Some(value.into_owned());
            }
        }
    }
    None
}

/// Non-AMP forms of an AMP URL
pub fn amp_variants(raw: &str) -> Vec<String> {
    let Some(url) = parse_http_url(raw) else {
        return Vec::new();
    };
    let path = url.path().to_string();
    let mut paths = Vec::new();

    if let Some(stripped) = path.strip_suffix("/amp") {
        paths.push(stripped.to_string());
    }
    if let Some(stripped) = path.strip_suffix("/amp/") {
        paths.push(stripped.to_string());
    }
    if path.contains("/amp/") {
        paths.push(path.replacen("/amp/", "/", 1));
    }

    let mut variants: Vec<String> = paths
        .into_iter()
        .map(|p| {
            let mut variant = url.clone();
            variant.set_path(if p.is_empty() { "/" } else { &p });
            variant.to_string()
        })
        .collect();

    if url.query_pairs().any(|(k, _)| k == "amp") {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "amp")
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        let mut variant = url.clone();
        if kept.is_empty() {
            variant.set_query(None);
        } else {
            variant.query_pairs_mut().clear().extend_pairs(kept.iter());
        }
        variants.push(variant.to_string());
    }

    variants
}

/// Desktop-host forms of a mobile URL (`m.`, `mobile.`)
pub fn mobile_variants(raw: &str) -> Vec<String> {
    let Some(url) = parse_http_url(raw) else {
        return Vec::new();
    };
    let Some(host) = url.host_str().map(str::to_string) else {
        return Vec::new();
    };

    ["m.", "mobile."]
        .iter()
        .filter_map(|prefix| host.strip_prefix(prefix))
        .filter_map(|desktop| {
            let mut variant = url.clone();
            variant.set_host(Some(desktop)).ok()?;
            Some(variant.to_string())
        })
        .collect()
}

/// Fallback URLs to try when a candidate cannot be fetched
///
/// Order: unwrapped redirect target, AMP variants, mobile variants. The
/// candidate itself is never included.
pub fn candidate_variants(raw: &str) -> Vec<String> {
    let own = normalize_url(raw);
    let mut variants: Vec<String> = Vec::new();

    let sources = unwrap_news_redirect(raw)
        .into_iter()
        .chain(amp_variants(raw))
        .chain(mobile_variants(raw));

    for variant in sources {
        let Some(normalized) = normalize_url(&variant) else {
            continue;
        };
        if Some(&normalized) != own.as_ref() && !variants.contains(&normalized) {
            variants.push(normalized);
        }
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_tracking_and_fragment() {
        let normalized =
            normalize_url("  http://WWW.Govern.cat/gov/notes-premsa/691002/?utm_source=x&id=3&fbclid=abc#top ")
                .unwrap();
        assert_eq!(normalized, "https://www.govern.cat/gov/notes-premsa/691002?id=3");
    }

    #[test]
    fn test_normalize_keeps_root_slash() {
        assert_eq!(normalize_url("https://example.org").unwrap(), "https://example.org/");
        assert_eq!(normalize_url("view-source:https://example.org/a/").unwrap(), "https://example.org/a");
    }

    #[test]
    fn test_normalize_rejects_non_http() {
        assert!(normalize_url("ftp://example.org/file").is_none());
        assert!(normalize_url("not a url").is_none());
        assert!(normalize_url("").is_none());
    }

    #[test]
    fn test_domain_strips_www() {
        assert_eq!(domain_of("https://www.Govern.cat/x").unwrap(), "govern.cat");
        assert_eq!(domain_of("https://ceo.gencat.cat/").unwrap(), "ceo.gencat.cat");
    }

    #[test]
    fn test_numeric_ids() {
        let ids = numeric_ids("https://govern.cat/gov/notes-premsa/445831/govern-aprova");
        assert_eq!(ids, vec!["445831".to_string()]);
        assert!(numeric_ids("https://govern.cat/2025/11/slug").is_empty());
    }

    #[test]
    fn test_unwrap_news_redirect() {
        let wrapped = "https://news.google.com/articles?url=https://govern.cat/nota/123456";
        assert_eq!(unwrap_news_redirect(wrapped).unwrap(), "https://govern.cat/nota/123456");
        assert!(unwrap_news_redirect("https://govern.cat/nota").is_none());
    }

    #[test]
    fn test_amp_and_mobile_variants() {
        assert_eq!(
            amp_variants("https://diari.cat/noticia/amp"),
            vec!["https://diari.cat/noticia".to_string()]
        );
        assert_eq!(
            amp_variants("https://diari.cat/amp/noticia"),
            vec!["https://diari.cat/noticia".to_string()]
        );
        assert_eq!(
            amp_variants("https://diari.cat/noticia?amp=1"),
            vec!["https://diari.cat/noticia".to_string()]
        );
        assert_eq!(
            mobile_variants("https://m.diari.cat/noticia"),
            vec!["https://diari.cat/noticia".to_string()]
        );
    }

    #[test]
    fn test_candidate_variants_excludes_self() {
        assert!(candidate_variants("https://diari.cat/noticia").is_empty());
        let variants = candidate_variants("https://m.diari.cat/noticia/amp");
        assert_eq!(
            variants,
            vec![
                "https://m.diari.cat/noticia".to_string(),
                "https://diari.cat/noticia/amp".to_string(),
            ]
        );
    }
}
