//! Gemini API request and response types.
//!
//! Field names follow the REST API's camelCase JSON convention.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};

// =============================================================================
// Request
// =============================================================================

/// Content generation request.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    /// Conversation contents (single-turn requests use one entry)
    pub contents: Vec<Content>,

    /// Sampling and length parameters
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    /// Create a single-turn request from a list of parts.
    pub fn from_parts(parts: Vec<Part>) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts,
            }],
            generation_config: None,
        }
    }

    /// Set the generation config.
    pub fn generation_config(mut self, config: GenerationConfig) -> Self {
        self.generation_config = Some(config);
        self
    }
}

/// A piece of conversation content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    /// "user" or "model"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default)]
    pub parts: Vec<Part>,
}

/// One part of a content entry: plain text or inline binary data.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    /// Create a text part.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            text: Some(content.into()),
            inline_data: None,
        }
    }

    /// Create an inline-data part from raw bytes (base64-encoded on the wire).
    pub fn inline_bytes(mime_type: impl Into<String>, data: &[u8]) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: STANDARD.encode(data),
            }),
        }
    }
}

/// Base64-encoded media payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    /// MIME type, e.g. "image/jpeg" or "application/pdf"
    pub mime_type: String,

    /// Base64-encoded bytes
    pub data: String,
}

/// Sampling and output-length parameters.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<u32>,
}

impl GenerationConfig {
    /// Set temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Set nucleus sampling threshold.
    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    /// Set top-k sampling.
    pub fn top_k(mut self, top_k: i32) -> Self {
        self.top_k = Some(top_k);
        self
    }

    /// Set the output token ceiling.
    pub fn max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = Some(max_output_tokens);
        self
    }
}

// =============================================================================
// Response
// =============================================================================

/// Content generation response.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,

    /// Serving model version (e.g. "gemini-2.5-flash-lite")
    #[serde(default)]
    pub model_version: Option<String>,

    #[serde(default)]
    pub usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate's parts.
    ///
    /// Empty string when the response carries no text (e.g. safety-blocked).
    pub fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default()
    }
}

/// One generated candidate.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,

    /// "STOP", "MAX_TOKENS", "SAFETY", ...
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Token usage statistics.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(default)]
    pub prompt_token_count: Option<u32>,

    #[serde(default)]
    pub candidates_token_count: Option<u32>,

    #[serde(default)]
    pub total_token_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_serializes_camel_case() {
        let request = GenerateContentRequest::from_parts(vec![Part::text("hello")])
            .generation_config(
                GenerationConfig::default()
                    .temperature(0.05)
                    .top_p(0.1)
                    .top_k(1)
                    .max_output_tokens(8192),
            );

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hello");
        let config = &json["generationConfig"];
        // f32 values widen to f64 in serde_json, so compare with tolerance
        assert!((config["temperature"].as_f64().unwrap() - 0.05).abs() < 1e-6);
        assert!((config["topP"].as_f64().unwrap() - 0.1).abs() < 1e-6);
        assert_eq!(config["topK"], 1);
        assert_eq!(config["maxOutputTokens"], 8192);
    }

    #[test]
    fn test_inline_bytes_base64() {
        let part = Part::inline_bytes("image/png", b"abc");
        let inline = part.inline_data.unwrap();
        assert_eq!(inline.mime_type, "image/png");
        assert_eq!(inline.data, "YWJj");
    }

    #[test]
    fn test_response_text_concatenates_parts() {
        let json = serde_json::json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{"text": "first"}, {"text": " second"}]
                },
                "finishReason": "STOP"
            }],
            "modelVersion": "gemini-2.5-flash-lite",
            "usageMetadata": {"promptTokenCount": 10, "totalTokenCount": 25}
        });

        let response: GenerateContentResponse = serde_json::from_value(json).unwrap();
        assert_eq!(response.text(), "first second");
        assert_eq!(
            response.model_version.as_deref(),
            Some("gemini-2.5-flash-lite")
        );
    }

    #[test]
    fn test_response_without_candidates() {
        let response: GenerateContentResponse =
            serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(response.candidates.is_empty());
        assert_eq!(response.text(), "");
    }
}
