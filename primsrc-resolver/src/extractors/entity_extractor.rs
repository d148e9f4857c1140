//! Entity extraction from article metadata
//!
//! Pure text analysis: dates, numeric facts, locations, organisations, and
//! a language guess. Nothing here fails; missing signals come back as empty
//! lists and only make the planned queries less specific.

use crate::types::{ArticleContext, Entities};
use once_cell::sync::Lazy;
use regex::Regex;

/// Cap per entity list
const MAX_PER_KIND: usize = 4;

/// Month names recognised in "month year" dates (ca, es, en)
const MONTHS: &[&str] = &[
    "gener", "febrer", "març", "abril", "maig", "juny", "juliol", "agost", "setembre", "octubre",
    "novembre", "desembre", "enero", "febrero", "marzo", "mayo", "junio", "julio", "agosto",
    "septiembre", "noviembre", "diciembre", "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];

/// Place names looked for in title and body
const LOCATIONS: &[&str] = &[
    "barcelona",
    "catalunya",
    "catalonia",
    "cataluña",
    "badalona",
    "tarragona",
    "lleida",
    "girona",
    "sabadell",
    "terrassa",
    "l'hospitalet",
    "madrid",
    "espanya",
    "españa",
    "spain",
];

/// Function words per language, used for the language guess
const LANGUAGE_MARKERS: &[(&str, &[&str])] = &[
    (
        "ca",
        &["els", "amb", "per", "aquest", "aquesta", "també", "dels", "però", "són", "seva", "seu", "al", "als", "any"],
    ),
    (
        "es",
        &["los", "con", "para", "por", "este", "esta", "también", "pero", "son", "sus", "las", "año", "y", "el"],
    ),
    (
        "en",
        &["the", "and", "with", "for", "this", "that", "are", "from", "was", "has", "have", "of"],
    ),
];

static YEAR_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b((?:19|20)\d{2})\b").expect("valid year regex"));
static MONTH_YEAR_RE: Lazy<Regex> = Lazy::new(|| {
    let months = MONTHS.join("|");
    Regex::new(&format!(r"(?i)\b({months})\s+(?:de\s+|d'|of\s+)?((?:19|20)\d{{2}})\b"))
        .expect("valid month-year regex")
});
static PERCENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)\s?%").expect("valid percentage regex"));
static MAGNITUDE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(\d+(?:[.,]\d+)*)\s*(milions?|millions?|millones|milers|miles|thousands?|units?|unitats|unidades|euros?|persones|personas|people)\b",
    )
    .expect("valid magnitude regex")
});
static ORG_SPAN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\p{Lu}\p{L}+(?:\s+(?:(?:de|del|dels|de la|la|les|i|y|of|the|for)\s+)?\p{Lu}\p{L}+)+")
        .expect("valid organisation regex")
});
static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\p{L}+").expect("valid word regex"));

/// Extract entities from an article
pub fn extract_entities(article: &ArticleContext) -> Entities {
    let sources = [article.title.as_str(), article.body.as_str()];

    Entities {
        dates: extract_dates(&sources),
        numbers: extract_numbers(&sources),
        locations: extract_locations(&sources),
        organizations: extract_organizations(article),
        language: article
            .language
            .as_deref()
            .map(|lang| lang.trim().to_ascii_lowercase())
            .filter(|lang| !lang.is_empty())
            .or_else(|| guess_language(&format!("{} {}", article.title, article.body))),
    }
}

fn push_unique(list: &mut Vec<String>, value: String) {
    if list.len() < MAX_PER_KIND && !list.contains(&value) {
        list.push(value);
    }
}

/// "month year" phrases first, then bare years
fn extract_dates(sources: &[&str]) -> Vec<String> {
    let mut dates = Vec::new();
    for text in sources {
        for caps in MONTH_YEAR_RE.captures_iter(text) {
            push_unique(&mut dates, format!("{} {}", caps[1].to_lowercase(), &caps[2]));
        }
    }
    for text in sources {
        for caps in YEAR_RE.captures_iter(text) {
            let year = caps[1].to_string();
            if !dates.iter().any(|d| d.ends_with(&year)) {
                push_unique(&mut dates, year);
            }
        }
    }
    dates
}

/// Percentages and magnitude expressions, title first
fn extract_numbers(sources: &[&str]) -> Vec<String> {
    let mut numbers = Vec::new();
    for text in sources {
        for m in PERCENT_RE.find_iter(text) {
            push_unique(&mut numbers, m.as_str().replace(' ', ""));
        }
        for caps in MAGNITUDE_RE.captures_iter(text) {
            push_unique(&mut numbers, format!("{} {}", &caps[1], caps[2].to_lowercase()));
        }
    }
    numbers
}

fn extract_locations(sources: &[&str]) -> Vec<String> {
    let haystack = sources.join(" ").to_lowercase();
    let words: Vec<&str> = haystack
        .split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .filter(|w| !w.is_empty())
        .collect();

    LOCATIONS
        .iter()
        .filter(|loc| words.contains(loc))
        .take(MAX_PER_KIND)
        .map(|loc| loc.to_string())
        .collect()
}

/// Publisher, else capitalised multi-word spans in the title
fn extract_organizations(article: &ArticleContext) -> Vec<String> {
    let publisher = article.publisher.trim();
    if !publisher.is_empty() {
        return vec![publisher.to_string()];
    }
    let mut orgs = Vec::new();
    for m in ORG_SPAN_RE.find_iter(&article.title) {
        push_unique(&mut orgs, m.as_str().to_string());
    }
    orgs
}

/// Guess `ca`/`es`/`en` from function-word frequency
///
/// Returns `None` when no marker words appear or the top two languages tie.
pub fn guess_language(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = WORD_RE.find_iter(&lower).map(|m| m.as_str()).collect();
    if words.is_empty() {
        return None;
    }

    let mut scores: Vec<(&str, usize)> = LANGUAGE_MARKERS
        .iter()
        .map(|(lang, markers)| (*lang, words.iter().filter(|w| markers.contains(w)).count()))
        .collect();
    scores.sort_by(|a, b| b.1.cmp(&a.1));

    match scores.as_slice() {
        [(lang, top), rest @ ..] if *top > 0 && rest.first().map_or(true, |(_, n)| n < top) => {
            Some(lang.to_string())
        }
        _ => None,
    }
}
