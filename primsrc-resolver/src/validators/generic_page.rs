//! Homepage / generic-page detection
//!
//! A primary source is a specific document. Site roots, language roots,
//! index pages, and about/contact pages never qualify.

use once_cell::sync::Lazy;
use regex::Regex;

/// Paths (lowercase, no trailing slash) that are generic wherever they appear
/// at the end of a path
const GENERIC_SUFFIXES: &[&str] = &[
    "/index",
    "/home",
    "/inici",
    "/inicio",
    "/about",
    "/about-us",
    "/qui-som",
    "/quienes-somos",
    "/nosotros",
    "/associacio",
    "/asociacion",
    "/contact",
    "/contacte",
    "/contacto",
    "/default.aspx",
];

/// Bare language root such as `/ca` or `/en-gb`
static LANGUAGE_ROOT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^/[a-z]{2}(?:[-_][a-z]{2})?$").expect("valid language root regex"));

/// Last path segment is an index/home document (`index.html`, `home.php`)
static INDEX_DOCUMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(?:index|home|default)\.[a-z0-9]{2,5}$").expect("valid index document regex"));

/// True when the URL path points at a homepage or generic page
///
/// Comparison is case-insensitive after trimming trailing slashes.
pub fn is_generic_path(path: &str) -> bool {
    let path = path.to_lowercase();
    let path = path.trim_end_matches('/');

    if path.is_empty() {
        return true;
    }
    if LANGUAGE_ROOT_RE.is_match(path) || INDEX_DOCUMENT_RE.is_match(path) {
        return true;
    }
    GENERIC_SUFFIXES.iter().any(|suffix| path.ends_with(suffix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roots_are_generic() {
        assert!(is_generic_path(""));
        assert!(is_generic_path("/"));
        assert!(is_generic_path("//"));
    }

    #[test]
    fn test_language_roots_are_generic() {
        assert!(is_generic_path("/en/"));
        assert!(is_generic_path("/ES"));
        assert!(is_generic_path("/ca"));
        assert!(is_generic_path("/en-gb/"));
    }

    #[test]
    fn test_generic_suffixes() {
        assert!(is_generic_path("/Index"));
        assert!(is_generic_path("/home/"));
        assert!(is_generic_path("/ca/about"));
        assert!(is_generic_path("/entitat/qui-som"));
        assert!(is_generic_path("/index.html"));
        assert!(is_generic_path("/ca/home.php"));
    }

    #[test]
    fn test_specific_documents_are_not_generic() {
        assert!(!is_generic_path("/gov/notes-premsa/691002/govern-aprova-calendari"));
        assert!(!is_generic_path("/ca/noticies/2025/11/festes-laborals"));
        assert!(!is_generic_path("/docs/barometre-2025.pdf"));
        assert!(!is_generic_path("/about-the-2026-budget-report"));
        assert!(!is_generic_path("/cat"));
    }
}
