//! Extraction backend implementations.

pub mod gemini;
pub mod rate_limited;

pub use gemini::GeminiBackend;
pub use rate_limited::RateLimitedBackend;
