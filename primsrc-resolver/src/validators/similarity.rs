//! Title similarity and key-term overlap scoring

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Terms kept per text, in order of first appearance
pub const MAX_KEY_TERMS: usize = 50;

/// Function words (ca/es/en) that carry no topic signal
const STOPWORDS: &[&str] = &[
    // ca
    "aquest", "aquesta", "aquests", "aquestes", "mateix", "mateixa", "tots", "totes", "altres", "entre",
    "però", "també", "dels", "amb", "sobre", "fins", "perquè", "quan", "seva", "seus", "seves", "això",
    "aquí", "molt", "més", "encara", "havia", "hauria", "serà", "està", "estan", "poden", "segons",
    "durant", "després", "abans", "contra", "cada",
    // es
    "para", "este", "esta", "estos", "estas", "desde", "hasta", "como", "pero", "porque", "todas",
    "todos", "otros", "otras", "también", "cuando", "donde", "según", "sido", "está", "están",
    "puede", "pueden", "será", "había", "mismo", "misma", "muy", "tras", "ante", "bajo", "cada",
    // en
    "that", "this", "with", "from", "have", "been", "were", "which", "their", "there", "about",
    "would", "could", "should", "into", "than", "then", "they", "them", "also", "after", "before",
    "will", "more", "most", "other", "such", "only", "over", "some", "what", "when", "where", "while",
];

static TERM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[a-zàáèéíïòóúüçñ·]{4,}").expect("valid term regex"));
static STOPWORD_SET: Lazy<HashSet<&'static str>> = Lazy::new(|| STOPWORDS.iter().copied().collect());

/// Sequence similarity of two titles (0-1), case-insensitive
///
/// Empty input on either side scores 0.
pub fn title_similarity(a: &str, b: &str) -> f32 {
    let a = normalize(a);
    let b = normalize(b);
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    strsim::normalized_levenshtein(&a, &b) as f32
}

fn normalize(text: &str) -> String {
    text.to_lowercase().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Salient terms: words of four or more letters minus stopwords, first
/// [`MAX_KEY_TERMS`] distinct ones
pub fn key_terms(text: &str) -> HashSet<String> {
    let lower = text.to_lowercase();
    let mut ordered: Vec<&str> = Vec::new();
    for m in TERM_RE.find_iter(&lower) {
        let term = m.as_str().trim_matches('·');
        if term.chars().count() < 4 || STOPWORD_SET.contains(term) || ordered.contains(&term) {
            continue;
        }
        ordered.push(term);
        if ordered.len() >= MAX_KEY_TERMS {
            break;
        }
    }
    ordered.into_iter().map(str::to_string).collect()
}

/// Shared terms over the size of the larger term set (0-1)
///
/// A short text sharing one word with a long page stays near zero.
pub fn term_overlap(a: &HashSet<String>, b: &HashSet<String>) -> f32 {
    let larger = a.len().max(b.len());
    if larger == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / larger as f32
}

/// Key-term overlap between article text and page text
pub fn content_overlap(article_text: &str, page_text: &str) -> f32 {
    term_overlap(&key_terms(article_text), &key_terms(page_text))
}

/// Keywords not present (case-insensitive substring) in the text
pub fn missing_keywords(keywords: &[String], text: &str) -> Vec<String> {
    let lower = text.to_lowercase();
    keywords
        .iter()
        .map(|k| k.trim())
        .filter(|k| !k.is_empty() && !lower.contains(&k.to_lowercase()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SPORTS_REPORT: &str = "El Joventut de Badalona guanya el derbi contra el Barça al Palau \
        Olímpic. Els aficionats van omplir les grades per veure un partit intens, amb triples decisius, rebots \
        ofensius i una defensa agressiva. L'entrenador va destacar l'esforç col·lectiu de la plantilla, mentre el \
        base verd-i-negre signava vint punts i set assistències en una nit rodona per al club.";

    #[test]
    fn test_identical_titles_score_one() {
        assert_eq!(title_similarity("Govern aprova", "  govern   APROVA "), 1.0);
    }

    #[test]
    fn test_near_titles_score_high() {
        let score = title_similarity(
            "Govern aprova calendari festes laborals per l'any 2026",
            "El Govern aprova el calendari de festes laborals per a l'any 2026",
        );
        assert!(score > 0.7, "score was {}", score);
    }

    #[test]
    fn test_unrelated_titles_score_low() {
        let score = title_similarity("Govern aprova calendari festes laborals", "Resultats de la lliga de futbol");
        assert!(score < 0.4, "score was {}", score);
        assert_eq!(title_similarity("", "anything"), 0.0);
    }

    #[test]
    fn test_key_terms_drop_short_words_and_stopwords() {
        let terms = key_terms("El Govern també aprova aquest calendari de festes per a 2026");
        assert!(terms.contains("govern"));
        assert!(terms.contains("calendari"));
        assert!(terms.contains("festes"));
        assert!(!terms.contains("també"));
        assert!(!terms.contains("aquest"));
        assert!(!terms.contains("per"));
    }

    #[test]
    fn test_overlap_measured_against_larger_set() {
        let overlap = content_overlap(
            "calendari festes laborals",
            "calendari festes laborals catalunya generalitat treballadors",
        );
        assert_eq!(overlap, 0.5);
        assert_eq!(content_overlap("", "calendari festes"), 0.0);
    }

    #[test]
    fn test_one_shared_word_with_long_page_scores_low() {
        let overlap = content_overlap("Pressupostos municipals Badalona", SPORTS_REPORT);
        assert!(overlap < 0.05, "overlap was {}", overlap);
    }

    #[test]
    fn test_missing_keywords() {
        let missing = missing_keywords(
            &["Calendari".to_string(), "festius".to_string(), " ".to_string()],
            "El calendari laboral",
        );
        assert_eq!(missing, vec!["festius".to_string()]);
    }
}
