//! # primsrc common library
//!
//! Shared code for the primary-source resolution workspace:
//! - Error type and result alias
//! - TOML configuration loading and atomic write-back
//! - Logging initialisation
//! - SQLite pool initialisation and schema migrations
//! - Timestamp helpers

pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod time;

pub use error::{Error, Result};
