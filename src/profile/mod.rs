//! Application profile resolution.

mod resolver;
mod types;

pub use resolver::ProfileResolver;
pub use types::{Profile, initials};
