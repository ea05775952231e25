//! Utility functions and helpers.
//!
//! Environment variable handling and bounded polling.

pub mod env;
pub mod retry;

pub use env::{get_env_with_prefix, parse_env_with_prefix};
pub use retry::{RetryExhausted, poll_until};
