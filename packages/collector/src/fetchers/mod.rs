//! Fetcher implementations and media handling.

pub mod http;
pub mod media;

pub use http::HttpFetcher;
