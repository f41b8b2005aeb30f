//! Gemini extraction backend.
//!
//! Sends the rendered instruction plus the fetched payload to the Gemini
//! `generateContent` API. HTML goes as inline page text, images and PDFs as
//! inline binary parts.

use async_trait::async_trait;
use gemini_client::{
    GeminiClient, GeminiError, GenerateContentRequest, GenerationConfig, Part,
};
use tracing::{debug, warn};

use crate::error::BackendError;
use crate::traits::{BackendResponse, ExtractionBackend};
use crate::types::{FetchedContent, MediaPayload};

// Near-deterministic sampling; table extraction wants repeatable output.
const TEMPERATURE: f32 = 0.05;
const TOP_P: f32 = 0.1;
const TOP_K: i32 = 1;
const MAX_OUTPUT_TOKENS: u32 = 8192;

/// Ceiling on API error text carried into run records.
const MAX_ERROR_CHARS: usize = 500;

/// Extraction backend over the Gemini REST API.
pub struct GeminiBackend {
    client: GeminiClient,
    model: String,
}

impl GeminiBackend {
    pub fn new(client: GeminiClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ExtractionBackend for GeminiBackend {
    async fn extract(
        &self,
        content: &FetchedContent,
        instruction: &str,
    ) -> Result<BackendResponse, BackendError> {
        let request = build_request(content, instruction);
        let response = self
            .client
            .generate_content(&self.model, &request)
            .await
            .map_err(map_gemini_error)?;

        if let Some(reason) = response
            .candidates
            .first()
            .and_then(|c| c.finish_reason.as_deref())
        {
            if reason != "STOP" {
                warn!(
                    url = %content.item.source_url,
                    finish_reason = reason,
                    "gemini finished abnormally"
                );
            }
        }

        let model_version = response
            .model_version
            .clone()
            .unwrap_or_else(|| self.model.clone());
        let text = response.text();
        debug!(
            url = %content.item.source_url,
            kind = %content.payload.kind(),
            response_chars = text.len(),
            "gemini extraction response"
        );

        Ok(BackendResponse::new(text, model_version))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

fn build_request(content: &FetchedContent, instruction: &str) -> GenerateContentRequest {
    let parts = match &content.payload {
        MediaPayload::Html { text, .. } => {
            vec![Part::text(format!("{instruction}\n\nPAGE_TEXT:\n{text}"))]
        }
        MediaPayload::Image { data, mime } => vec![
            Part::text(instruction.to_string()),
            Part::inline_bytes(mime.as_str(), data),
        ],
        MediaPayload::Document { data, .. } => vec![
            Part::text(instruction.to_string()),
            Part::inline_bytes("application/pdf", data),
        ],
    };

    GenerateContentRequest::from_parts(parts).generation_config(
        GenerationConfig::default()
            .temperature(TEMPERATURE)
            .top_p(TOP_P)
            .top_k(TOP_K)
            .max_output_tokens(MAX_OUTPUT_TOKENS),
    )
}

fn map_gemini_error(e: GeminiError) -> BackendError {
    match e {
        GeminiError::Api {
            status: 429,
            message,
        } => BackendError::RateLimited(clip(&message)),
        GeminiError::Api {
            status: 401 | 403,
            message,
        } => BackendError::Auth(clip(&message)),
        GeminiError::Api { status, message } if status >= 500 => {
            BackendError::Unavailable(format!("HTTP {status}: {}", clip(&message)))
        }
        GeminiError::Api { status, message } => {
            BackendError::InvalidRequest(format!("HTTP {status}: {}", clip(&message)))
        }
        GeminiError::Network(msg) if msg.contains("timed out") || msg.contains("timeout") => {
            BackendError::Timeout(msg)
        }
        GeminiError::Network(msg) => BackendError::Network(msg),
        // A 2xx body that fails to parse is a service-side malfunction
        GeminiError::Parse(msg) => BackendError::Unavailable(format!("unusable response: {msg}")),
        GeminiError::Config(msg) => BackendError::InvalidRequest(msg),
    }
}

fn clip(s: &str) -> String {
    if s.len() <= MAX_ERROR_CHARS {
        return s.to_string();
    }
    let mut end = MAX_ERROR_CHARS;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &s[..end])
}
