//! HTML page extraction: title, publication date, and scoring text
//!
//! Regex-based and tolerant: malformed markup yields `None`/empty fields,
//! never an error.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;

/// Upper bound on extracted text used for scoring (characters)
pub const MAX_TEXT_CHARS: usize = 8000;

/// Meta tags checked for a publication date, in priority order
const DATE_META_KEYS: &[&str] = &[
    "article:published_time",
    "publish_date",
    "date",
    "og:updated_time",
    "dc.date",
    "dcterms.date",
];

/// Elements whose content never counts as page text
const NOISE_ELEMENTS: &[&str] = &["script", "style", "nav", "header", "footer", "noscript"];

static H1_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<h1\b[^>]*>(.*?)</h1>").expect("valid h1 regex"));
static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<title\b[^>]*>(.*?)</title>").expect("valid title regex"));
static META_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<meta\b[^>]*>").expect("valid meta regex"));
static ATTR_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)([a-z][a-z0-9:_.-]*)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid attr regex")
});
static TIME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)<time\b[^>]*\bdatetime\s*=\s*["']([^"']+)["']"#).expect("valid time regex")
});
static COMMENT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("valid comment regex"));
static NOISE_RES: Lazy<Vec<Regex>> = Lazy::new(|| {
    NOISE_ELEMENTS
        .iter()
        .map(|tag| Regex::new(&format!(r"(?is)<{tag}\b.*?</{tag}\s*>")).expect("valid noise regex"))
        .collect()
});
static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid tag regex"));
static WS_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));
static ENTITY_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(#[0-9]{1,7}|#[xX][0-9a-fA-F]{1,6}|[a-zA-Z]{2,8});").expect("valid entity regex"));
static ISO_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})-(\d{2})-(\d{2})").expect("valid iso date regex"));
static DMY_DATE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})[/.](\d{1,2})[/.](\d{4})\b").expect("valid dmy date regex"));

/// Fields pulled out of one HTML page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedPage {
    pub title: Option<String>,
    pub date: Option<NaiveDate>,
    pub text: String,
}

/// Parse title, date, and scoring text out of raw HTML
pub fn parse_html(html: &str) -> ParsedPage {
    ParsedPage {
        title: extract_title(html),
        date: extract_date(html),
        text: extract_text(html),
    }
}

/// First `<h1>`, else `<title>`
pub fn extract_title(html: &str) -> Option<String> {
    [&*H1_RE, &*TITLE_RE]
        .iter()
        .filter_map(|re| re.captures(html))
        .map(|caps| clean_fragment(&caps[1]))
        .find(|title| !title.is_empty())
}

/// Publication date from meta tags, else the first `<time datetime>`
pub fn extract_date(html: &str) -> Option<NaiveDate> {
    let metas: Vec<(String, String)> = META_RE
        .find_iter(html)
        .filter_map(|tag| {
            let mut key = None;
            let mut content = None;
            for caps in ATTR_RE.captures_iter(tag.as_str()) {
                let name = caps[1].to_ascii_lowercase();
                let value = caps.get(2).or_else(|| caps.get(3))?.as_str().to_string();
                match name.as_str() {
                    "property" | "name" | "itemprop" => key = Some(value.to_ascii_lowercase()),
                    "content" => content = Some(value),
                    _ => {}
                }
            }
            Some((key?, content?))
        })
        .collect();

    for wanted in DATE_META_KEYS {
        if let Some(date) = metas
            .iter()
            .filter(|(key, _)| key == wanted)
            .find_map(|(_, content)| parse_date(content))
        {
            return Some(date);
        }
    }

    TIME_RE
        .captures_iter(html)
        .find_map(|caps| parse_date(&caps[1]))
}

/// Parse `YYYY-MM-DD...` or `DD/MM/YYYY` out of a date-ish string
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    if let Some(caps) = ISO_DATE_RE.captures(value) {
        let (y, m, d) = (caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?);
        return NaiveDate::from_ymd_opt(y, m, d);
    }
    let caps = DMY_DATE_RE.captures(value)?;
    let (d, m, y) = (caps[1].parse().ok()?, caps[2].parse().ok()?, caps[3].parse().ok()?);
    NaiveDate::from_ymd_opt(y, m, d)
}

/// Visible text with navigation/script noise removed, capped at
/// [`MAX_TEXT_CHARS`]
pub fn extract_text(html: &str) -> String {
    let mut stripped = COMMENT_RE.replace_all(html, " ").into_owned();
    for re in NOISE_RES.iter() {
        stripped = re.replace_all(&stripped, " ").into_owned();
    }
    let text = clean_fragment(&stripped);
    text.chars().take(MAX_TEXT_CHARS).collect()
}

/// Human-readable title from a document URL's file name
///
/// `.../2025_barometre-opinio-politica.pdf` → `2025 barometre opinio politica`
pub fn title_from_file_name(url: &str) -> Option<String> {
    let last = url
        .split(['?', '#'])
        .next()?
        .trim_end_matches('/')
        .rsplit('/')
        .next()?;
    let stem = last.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(last);
    let title = WS_RE
        .replace_all(&stem.replace(['-', '_', '+'], " "), " ")
        .trim()
        .to_string();
    (!title.is_empty()).then_some(title)
}

/// Strip tags, decode entities, collapse whitespace
fn clean_fragment(fragment: &str) -> String {
    let no_tags = TAG_RE.replace_all(fragment, " ");
    let decoded = decode_entities(&no_tags);
    WS_RE.replace_all(&decoded, " ").trim().to_string()
}

fn decode_entities(text: &str) -> String {
    ENTITY_RE
        .replace_all(text, |caps: &regex::Captures| {
            let entity = &caps[1];
            let decoded = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
            } else if let Some(dec) = entity.strip_prefix('#') {
                dec.parse::<u32>().ok().and_then(char::from_u32)
            } else {
                named_entity(entity)
            };
            decoded.map(String::from).unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn named_entity(name: &str) -> Option<char> {
    Some(match name {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        "middot" => '·',
        "rsquo" | "lsquo" => '\'',
        "ldquo" | "rdquo" | "laquo" | "raquo" => '"',
        "ndash" | "mdash" => '-',
        "agrave" => 'à',
        "aacute" => 'á',
        "egrave" => 'è',
        "eacute" => 'é',
        "iacute" => 'í',
        "iuml" => 'ï',
        "ograve" => 'ò',
        "oacute" => 'ó',
        "uacute" => 'ú',
        "uuml" => 'ü',
        "ccedil" => 'ç',
        "ntilde" => 'ñ',
        "Agrave" => 'À',
        "Eacute" => 'É',
        "Egrave" => 'È',
        "Ccedil" => 'Ç',
        "Ntilde" => 'Ñ',
        _ => return None,
    })
}
