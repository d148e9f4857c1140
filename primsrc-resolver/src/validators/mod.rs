//! Candidate validation
//!
//! `candidate_validator` scores one candidate; `sibling_analyzer` compares
//! candidates of the same tier with each other.

pub mod candidate_validator;
pub mod generic_page;
pub mod sibling_analyzer;
pub mod similarity;

pub use candidate_validator::{validate, validate_fetched};
pub use generic_page::is_generic_path;
pub use sibling_analyzer::analyze_siblings;
pub use similarity::title_similarity;
