//! Text extractors: article entities and fetched-page fields

pub mod entity_extractor;
pub mod html;

pub use entity_extractor::{extract_entities, guess_language};
pub use html::{parse_html, ParsedPage};
