//! HTTP client for the workspace backend.

mod http;

pub use http::HttpWorkspaceApi;
