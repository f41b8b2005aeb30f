//! Extraction client: template rendering, bounded retry, response parsing,
//! and envelope composition into full schema rows.

use std::time::Duration;

use chrono::Utc;
use tracing::warn;

use crate::error::ExtractError;
use crate::extract::parse;
use crate::extract::template::ExtractionTemplate;
use crate::traits::{BackendResponse, ExtractionBackend};
use crate::types::{jst_now_iso, ExtractionResult, FetchedContent, JobMode, RunParams, WorkItem};

/// Bounded retry policy for transient backend failures.
///
/// Exponential backoff (`base * 2^(attempt-1)`, clamped at `max_delay`) plus
/// uniform jitter in `[0, base/2]`. Permanent failures are never retried.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Attempt ceiling, first call included
    pub max_attempts: u32,

    /// Base backoff delay
    pub base_delay: Duration,

    /// Backoff clamp
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        }
    }
}

impl RetryPolicy {
    /// Build the policy from run parameters.
    pub fn from_params(params: &RunParams) -> Self {
        Self {
            max_attempts: params.max_attempts,
            base_delay: params.retry_base_delay,
            max_delay: params.retry_max_delay,
        }
    }

    /// Delay before the retry that follows `attempt` (1-based).
    fn delay_after(&self, attempt: u32) -> Duration {
        let exp = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        let capped = exp.min(self.max_delay);
        let half_base_ms = (self.base_delay.as_millis() / 2) as u64;
        capped + Duration::from_millis(fastrand::u64(0..=half_base_ms))
    }
}

/// Drives one item's extraction: renders the template, calls the backend
/// with bounded retry, parses the response, and composes rows in the mode's
/// full column order.
pub struct ExtractionClient<B> {
    backend: B,
    template: ExtractionTemplate,
    policy: RetryPolicy,
}

impl<B: ExtractionBackend> ExtractionClient<B> {
    /// Create a client with the default retry policy.
    pub fn new(backend: B, template: ExtractionTemplate) -> Self {
        Self {
            backend,
            template,
            policy: RetryPolicy::default(),
        }
    }

    /// Set a custom retry policy.
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn mode(&self) -> JobMode {
        self.template.mode()
    }

    /// Extract structured rows for one item's fetched content.
    pub async fn extract(&self, content: &FetchedContent) -> Result<ExtractionResult, ExtractError> {
        let response = self.call_with_retry(content).await?;
        if response.text.trim().is_empty() {
            return Err(ExtractError::EmptyResponse);
        }

        let mode = self.template.mode();
        let payload_rows = parse::parse_rows(mode, &response.text);
        if payload_rows.is_empty() {
            return Err(ExtractError::Parse {
                detail: format!(
                    "no valid rows in {} chars of backend text",
                    response.text.len()
                ),
            });
        }

        let rows = compose_rows(mode, &content.item, payload_rows, &response.model_version);
        Ok(ExtractionResult {
            item: content.item.clone(),
            rows,
            model_version: response.model_version,
            extracted_at: Utc::now(),
        })
    }

    async fn call_with_retry(
        &self,
        content: &FetchedContent,
    ) -> Result<BackendResponse, ExtractError> {
        let instruction = self.template.render(&content.item);
        let mut attempt = 1u32;

        loop {
            match self.backend.extract(content, &instruction).await {
                Ok(response) => return Ok(response),
                Err(e) if !e.is_transient() => return Err(ExtractError::Backend(e)),
                Err(e) => {
                    if attempt >= self.policy.max_attempts {
                        return Err(ExtractError::Exhausted { attempts: attempt, last: e });
                    }
                    let delay = self.policy.delay_after(attempt);
                    warn!(
                        url = %content.item.source_url,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient backend failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

/// Wrap payload rows in the mode's envelope columns: facility id, sequence
/// where the schema has one, timestamps, model version, and source address.
fn compose_rows(
    mode: JobMode,
    item: &WorkItem,
    payload: Vec<Vec<String>>,
    model_version: &str,
) -> Vec<Vec<String>> {
    let now = jst_now_iso();
    payload
        .into_iter()
        .enumerate()
        .map(|(i, fields)| match mode {
            JobMode::UrlCollect => {
                let mut row = Vec::with_capacity(6);
                row.push(item.facility_id.clone());
                row.push(item.source_url.clone());
                row.extend(fields);
                row.push(now.clone());
                row.push(model_version.to_string());
                row
            }
            JobMode::DoctorInfo => {
                let mut row = Vec::with_capacity(11);
                row.push(item.facility_id.clone());
                row.push(format!("{}_{:05}", item.facility_id, i + 1));
                row.extend(fields);
                row.push(now.clone());
                row.push(model_version.to_string());
                row.push(item.source_url.clone());
                row
            }
            JobMode::Outpatient => {
                let mut row = Vec::with_capacity(14);
                row.push(item.facility_id.clone());
                row.extend(fields);
                row.push(item.source_url.clone());
                row.push(now.clone());
                row.push(model_version.to_string());
                row
            }
        })
        .collect()
}
