//! Query planning

pub mod domain_patterns;
pub mod query_planner;

pub use query_planner::{claim_snippet, plan_queries, QueryPlan};
