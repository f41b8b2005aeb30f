//! Extraction: templates, backend calls with retry, and response parsing.

pub mod client;
pub mod parse;
pub mod template;

pub use client::{ExtractionClient, RetryPolicy};
pub use template::{load_template, ExtractionTemplate};
