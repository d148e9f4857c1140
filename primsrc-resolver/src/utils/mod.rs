//! Shared helpers

pub mod retry;

pub use retry::{retry_on_lock, with_retry, RetryExhausted};
