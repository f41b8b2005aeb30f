//! Extraction backend trait - the AI capability seam.

use async_trait::async_trait;

use crate::error::BackendError;
use crate::types::FetchedContent;

/// Raw model output from one extraction call.
#[derive(Debug, Clone)]
pub struct BackendResponse {
    /// Text produced by the model
    pub text: String,

    /// Serving model version reported by the API
    pub model_version: String,
}

impl BackendResponse {
    /// Create a new backend response.
    pub fn new(text: impl Into<String>, model_version: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            model_version: model_version.into(),
        }
    }
}

/// Backend trait for structured extraction over fetched content.
///
/// One call, no retries - retry policy lives in the extraction client, which
/// decides from the [`BackendError`] classification whether to try again.
///
/// Implementations:
/// - `GeminiBackend` - Google Gemini generateContent
/// - `RateLimitedBackend` - wraps any backend with a requests-per-second cap
/// - `MockBackend` - scripted responses for tests
#[async_trait]
pub trait ExtractionBackend: Send + Sync {
    /// Run the extraction template against one item's fetched content.
    async fn extract(
        &self,
        content: &FetchedContent,
        template: &str,
    ) -> Result<BackendResponse, BackendError>;

    /// Get the backend name (for logging/debugging).
    fn name(&self) -> &str {
        "unknown"
    }
}
