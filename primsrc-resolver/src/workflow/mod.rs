//! Resolution workflow
//!
//! The waterfall controller drives one article through the registry fast
//! path and then the planned query tiers, most specific first, stopping at
//! the first tier that yields a valid candidate.

pub mod waterfall;

pub use waterfall::{WaterfallController, WaterfallState};
