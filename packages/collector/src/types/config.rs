//! Run configuration: job mode and the immutable parameter set.
//!
//! `RunParams` is constructed once (from the environment or a builder chain)
//! and handed to the coordinator; nothing mutates or re-reads configuration
//! after startup.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// The three extraction modes, each bound to its own template and output
/// schema for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobMode {
    /// Classify facility page URLs by page type
    UrlCollect,
    /// Extract specialist-physician rosters
    DoctorInfo,
    /// Extract outpatient consultation schedules
    Outpatient,
}

impl JobMode {
    /// Stable label used in paths, filenames, and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobMode::UrlCollect => "url_collect",
            JobMode::DoctorInfo => "doctor_info",
            JobMode::Outpatient => "outpatient",
        }
    }

    /// Output schema column order for this mode (tab-delimited header).
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            JobMode::UrlCollect => &[
                "facility_id",
                "url",
                "page_type",
                "confidence_score",
                "output_datetime",
                "model_version",
            ],
            JobMode::DoctorInfo => &[
                "facility_id",
                "sequence",
                "department",
                "name",
                "position",
                "specialty",
                "license",
                "other",
                "output_datetime",
                "model_version",
                "source_url",
            ],
            JobMode::Outpatient => &[
                "facility_id",
                "facility_name",
                "department",
                "day_of_week",
                "first_or_followup",
                "physician_name",
                "position",
                "charge_week",
                "charge_date",
                "specialty",
                "update_date",
                "source_url",
                "output_datetime",
                "model_version",
            ],
        }
    }

    /// Number of model-produced fields per row, before envelope columns
    /// (facility id, sequence, timestamps) are added.
    pub fn payload_arity(&self) -> usize {
        match self {
            JobMode::UrlCollect => 2,
            JobMode::DoctorInfo => 6,
            JobMode::Outpatient => 10,
        }
    }

    /// All modes, in declaration order.
    pub fn all() -> [JobMode; 3] {
        [JobMode::UrlCollect, JobMode::DoctorInfo, JobMode::Outpatient]
    }
}

impl FromStr for JobMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "url_collect" => Ok(JobMode::UrlCollect),
            "doctor_info" => Ok(JobMode::DoctorInfo),
            "outpatient" => Ok(JobMode::Outpatient),
            other => Err(ConfigError::UnknownMode(other.to_string())),
        }
    }
}

impl std::fmt::Display for JobMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable parameters for one shard execution.
#[derive(Debug, Clone)]
pub struct RunParams {
    /// Extraction mode, fixed for the run
    pub mode: JobMode,

    /// This shard's index, `0 <= shard_index < shard_count`
    pub shard_index: usize,

    /// Total number of parallel shards
    pub shard_count: usize,

    /// Maximum in-flight items within the shard
    pub max_concurrency: usize,

    /// Backend attempt ceiling (first call included)
    pub max_attempts: u32,

    /// Base delay for exponential backoff
    pub retry_base_delay: Duration,

    /// Backoff clamp
    pub retry_max_delay: Duration,

    /// HTML character ceiling after preprocessing
    pub max_content_chars: usize,

    /// Raw HTML byte ceiling, rejected before decoding
    pub max_html_bytes: usize,

    /// Image byte ceiling; oversized images are downscaled first
    pub max_image_bytes: usize,

    /// PDF byte ceiling
    pub max_pdf_bytes: usize,

    /// PDF page ceiling
    pub max_pdf_pages: usize,

    /// Per-request HTTP timeout
    pub request_timeout: Duration,

    /// Backend call timeout
    pub backend_timeout: Duration,

    /// Backend model identifier
    pub model: String,

    /// Backend API key; absent when running against mocks
    pub api_key: Option<SecretString>,

    /// Optional backend requests-per-second cap
    pub backend_rps: Option<u32>,

    /// Wall-clock budget for the shard; items not started before it
    /// elapses stay pending
    pub deadline: Option<Duration>,

    /// Root directory for inputs, templates, ledger, and sinks
    pub data_dir: PathBuf,

    /// Failure-rate warning threshold in the final report
    pub failure_alert_threshold: f64,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            mode: JobMode::UrlCollect,
            shard_index: 0,
            shard_count: 1,
            max_concurrency: 5,
            max_attempts: 3,
            retry_base_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(10),
            max_content_chars: 30_000,
            max_html_bytes: 5 * 1024 * 1024,
            max_image_bytes: 20 * 1024 * 1024,
            max_pdf_bytes: 50 * 1024 * 1024,
            max_pdf_pages: 10,
            request_timeout: Duration::from_secs(30),
            backend_timeout: Duration::from_secs(120),
            model: "gemini-2.5-flash-lite".to_string(),
            api_key: None,
            backend_rps: None,
            deadline: None,
            data_dir: PathBuf::from("data"),
            failure_alert_threshold: 0.15,
        }
    }
}

impl RunParams {
    /// Create params with default values for the given mode.
    pub fn new(mode: JobMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    /// Read parameters from the environment.
    ///
    /// `JOB_TYPE` is required; everything else falls back to defaults.
    /// Shard coordinates come from `TASK_INDEX`/`TASK_COUNT` (or the Cloud
    /// Run `CLOUD_RUN_TASK_INDEX`/`CLOUD_RUN_TASK_COUNT` pair when set).
    pub fn from_env() -> Result<Self, ConfigError> {
        let mode_raw = std::env::var("JOB_TYPE").map_err(|_| ConfigError::MissingEnv {
            name: "JOB_TYPE".to_string(),
        })?;
        let mode: JobMode = mode_raw.parse()?;

        let defaults = RunParams::default();
        let params = Self {
            mode,
            shard_index: env_or("TASK_INDEX", env_or("CLOUD_RUN_TASK_INDEX", 0)?)?,
            shard_count: env_or("TASK_COUNT", env_or("CLOUD_RUN_TASK_COUNT", 1)?)?,
            max_concurrency: env_or("MAX_CONCURRENT_REQUESTS", defaults.max_concurrency)?,
            max_attempts: env_or("MAX_RETRIES", defaults.max_attempts)?,
            retry_base_delay: Duration::from_millis(env_or("RETRY_DELAY_MS", 1000u64)?),
            retry_max_delay: defaults.retry_max_delay,
            max_content_chars: env_or("MAX_CONTENT_LENGTH", defaults.max_content_chars)?,
            max_html_bytes: defaults.max_html_bytes,
            max_image_bytes: defaults.max_image_bytes,
            max_pdf_bytes: defaults.max_pdf_bytes,
            max_pdf_pages: defaults.max_pdf_pages,
            request_timeout: Duration::from_secs(env_or("REQUEST_TIMEOUT", 30u64)?),
            backend_timeout: Duration::from_secs(env_or("AI_TIMEOUT", 120u64)?),
            model: std::env::var("AI_MODEL").unwrap_or(defaults.model),
            api_key: std::env::var("GEMINI_API_KEY")
                .ok()
                .map(SecretString::from),
            backend_rps: std::env::var("BACKEND_RPS")
                .ok()
                .map(|v| {
                    v.parse().map_err(|_| ConfigError::InvalidEnv {
                        name: "BACKEND_RPS".to_string(),
                        value: v.clone(),
                    })
                })
                .transpose()?,
            deadline: std::env::var("DEADLINE_SECS")
                .ok()
                .map(|v| {
                    v.parse::<u64>()
                        .map(Duration::from_secs)
                        .map_err(|_| ConfigError::InvalidEnv {
                            name: "DEADLINE_SECS".to_string(),
                            value: v.clone(),
                        })
                })
                .transpose()?,
            data_dir: PathBuf::from(
                std::env::var("DATA_DIR").unwrap_or_else(|_| "data".to_string()),
            ),
            failure_alert_threshold: env_or(
                "FAILURE_ALERT_THRESHOLD",
                defaults.failure_alert_threshold,
            )?,
        };

        params.validate()?;
        Ok(params)
    }

    /// Check shard coordinates and processing limits.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.shard_count == 0 || self.shard_index >= self.shard_count {
            return Err(ConfigError::InvalidShard {
                index: self.shard_index,
                count: self.shard_count,
            });
        }
        if self.max_concurrency == 0 {
            return Err(ConfigError::InvalidEnv {
                name: "MAX_CONCURRENT_REQUESTS".to_string(),
                value: "0".to_string(),
            });
        }
        if self.max_attempts == 0 {
            return Err(ConfigError::InvalidEnv {
                name: "MAX_RETRIES".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Set shard coordinates.
    pub fn with_shard(mut self, index: usize, count: usize) -> Self {
        self.shard_index = index;
        self.shard_count = count;
        self
    }

    /// Set the in-shard concurrency limit.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.max_concurrency = limit;
        self
    }

    /// Set the backend attempt ceiling.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the wall-clock deadline.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set the data directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the backend model.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set the backend API key.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(SecretString::from(key.into()));
        self
    }

    /// Cap backend calls at the given requests per second.
    pub fn with_backend_rps(mut self, rps: u32) -> Self {
        self.backend_rps = Some(rps);
        self
    }
}

fn env_or<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
{
    match std::env::var(name) {
        Ok(value) => value.parse().map_err(|_| ConfigError::InvalidEnv {
            name: name.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_labels_round_trip() {
        for mode in JobMode::all() {
            let parsed: JobMode = mode.as_str().parse().unwrap();
            assert_eq!(parsed, mode);
        }
        assert!("doctor_info_validation".parse::<JobMode>().is_err());
    }

    #[test]
    fn test_mode_schemas() {
        assert_eq!(JobMode::UrlCollect.columns().len(), 6);
        assert_eq!(JobMode::DoctorInfo.columns().len(), 11);
        assert_eq!(JobMode::Outpatient.columns().len(), 14);
        assert_eq!(JobMode::UrlCollect.payload_arity(), 2);
        assert_eq!(JobMode::DoctorInfo.payload_arity(), 6);
        assert_eq!(JobMode::Outpatient.payload_arity(), 10);
    }

    #[test]
    fn test_params_defaults() {
        let params = RunParams::default();
        assert_eq!(params.max_concurrency, 5);
        assert_eq!(params.max_attempts, 3);
        assert_eq!(params.max_content_chars, 30_000);
        assert_eq!(params.model, "gemini-2.5-flash-lite");
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_params_validation() {
        let bad_index = RunParams::default().with_shard(3, 3);
        assert!(matches!(
            bad_index.validate(),
            Err(ConfigError::InvalidShard { index: 3, count: 3 })
        ));

        let zero_count = RunParams::default().with_shard(0, 0);
        assert!(zero_count.validate().is_err());

        let zero_concurrency = RunParams::default().with_max_concurrency(0);
        assert!(zero_concurrency.validate().is_err());
    }

    #[test]
    fn test_builder_chain() {
        let params = RunParams::new(JobMode::DoctorInfo)
            .with_shard(2, 8)
            .with_max_concurrency(10)
            .with_deadline(Duration::from_secs(600))
            .with_data_dir("/tmp/run");

        assert_eq!(params.mode, JobMode::DoctorInfo);
        assert_eq!(params.shard_index, 2);
        assert_eq!(params.shard_count, 8);
        assert_eq!(params.max_concurrency, 10);
        assert_eq!(params.deadline, Some(Duration::from_secs(600)));
        assert_eq!(params.data_dir, PathBuf::from("/tmp/run"));
    }
}
