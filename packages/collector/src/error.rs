//! Typed errors for the collector library.
//!
//! Uses `thiserror` for library errors (not `anyhow`) to keep the
//! item-scoped / fatal split explicit: [`ItemError`] values are recorded in
//! the progress ledger and processing continues, while [`RunError`] values
//! abort the shard.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fatal configuration problems detected before any item starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Shard coordinates out of range
    #[error("invalid shard parameters: index {index} of {count}")]
    InvalidShard { index: usize, count: usize },

    /// Required environment variable missing
    #[error("{name} not set")]
    MissingEnv { name: String },

    /// Environment variable present but unparseable
    #[error("invalid value for {name}: {value}")]
    InvalidEnv { name: String, value: String },

    /// Mode selector not one of the known job modes
    #[error("unknown job mode: {0}")]
    UnknownMode(String),

    /// Work list unreadable or malformed at the file level
    #[error("work list error: {0}")]
    WorkList(String),

    /// Extraction template unreadable
    #[error("template error: {0}")]
    Template(String),
}

/// Errors raised while fetching a work item's content.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection-level failure (DNS, refused, reset)
    #[error("network error fetching {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Request exceeded the configured timeout
    #[error("timeout fetching {url}")]
    Timeout { url: String },

    /// Address could not be parsed
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Payload over a ceiling even after truncation/downscale; `size` and
    /// `limit` are bytes for byte ceilings, pages for the page ceiling
    #[error("content too large at {url}: {size} (limit {limit})")]
    TooLarge { url: String, size: usize, limit: usize },

    /// Content signature not recognized as HTML, image, or PDF
    #[error("unsupported content at {url}: {detail}")]
    Unsupported { url: String, detail: String },
}

/// Classified failures from the extraction backend.
///
/// The variant set is the retry predicate: [`BackendError::is_transient`]
/// decides whether the extraction client retries or gives up immediately.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Backend throttled the request (retryable)
    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Server-side failure, 5xx class (retryable)
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    /// Connection to the backend failed (retryable)
    #[error("backend network error: {0}")]
    Network(String),

    /// Backend call exceeded its timeout (retryable)
    #[error("backend timeout: {0}")]
    Timeout(String),

    /// Credentials rejected (not retryable)
    #[error("authentication rejected: {0}")]
    Auth(String),

    /// Request permanently invalid (not retryable)
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl BackendError {
    /// Whether a retry may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            BackendError::RateLimited(_)
                | BackendError::Unavailable(_)
                | BackendError::Network(_)
                | BackendError::Timeout(_)
        )
    }
}

/// Errors raised while extracting structured rows from fetched content.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// Non-retryable backend failure, returned without retry
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),

    /// Retry ceiling reached; carries the last underlying cause
    #[error("extraction failed after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: BackendError },

    /// Backend returned no usable text
    #[error("empty response from backend")]
    EmptyResponse,

    /// Backend text could not be parsed into the expected row shape
    #[error("cannot parse backend response: {detail}")]
    Parse { detail: String },
}

/// Item-scoped error caught at the coordinator boundary.
///
/// Converted into a `failure` progress entry; never aborts the shard.
#[derive(Debug, Error)]
pub enum ItemError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Extract(#[from] ExtractError),
}

impl ItemError {
    /// Classification recorded in the ledger and failure statistics.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            ItemError::Fetch(e) => match e {
                FetchError::Network { .. } => FailureKind::Connection,
                FetchError::Timeout { .. } => FailureKind::Timeout,
                FetchError::InvalidUrl { .. } => FailureKind::Unsupported,
                FetchError::TooLarge { .. } => FailureKind::TooLarge,
                FetchError::Unsupported { .. } => FailureKind::Unsupported,
            },
            ItemError::Extract(e) => match e {
                ExtractError::Backend(b) => FailureKind::from_backend(b),
                ExtractError::Exhausted { last, .. } => FailureKind::from_backend(last),
                ExtractError::EmptyResponse => FailureKind::EmptyResponse,
                ExtractError::Parse { .. } => FailureKind::Parse,
            },
        }
    }
}

/// Failure classification persisted in progress entries and aggregated in
/// the shard report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Connection,
    Timeout,
    RateLimit,
    Api,
    EmptyResponse,
    Parse,
    TooLarge,
    Unsupported,
    /// Catch-all when reading a ledger written by a build with more kinds.
    #[serde(other)]
    Unknown,
}

impl FailureKind {
    fn from_backend(error: &BackendError) -> Self {
        match error {
            BackendError::RateLimited(_) => FailureKind::RateLimit,
            BackendError::Unavailable(_) => FailureKind::Api,
            BackendError::Network(_) => FailureKind::Connection,
            BackendError::Timeout(_) => FailureKind::Timeout,
            BackendError::Auth(_) => FailureKind::Api,
            BackendError::InvalidRequest(_) => FailureKind::Api,
        }
    }

    /// Stable label used in logs and the ledger.
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Connection => "connection",
            FailureKind::Timeout => "timeout",
            FailureKind::RateLimit => "rate_limit",
            FailureKind::Api => "api",
            FailureKind::EmptyResponse => "empty_response",
            FailureKind::Parse => "parse",
            FailureKind::TooLarge => "too_large",
            FailureKind::Unsupported => "unsupported",
            FailureKind::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Progress ledger I/O failure (fatal).
#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("ledger write failed: {0}")]
    Write(#[source] std::io::Error),

    #[error("ledger read failed: {0}")]
    Read(#[source] std::io::Error),
}

/// Output sink I/O failure (fatal).
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink create failed at {path}: {source}")]
    Create {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sink write failed: {0}")]
    Write(#[source] std::io::Error),
}

/// Fatal shard-level errors: the run aborts and propagates to the caller.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("progress ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("output sink error: {0}")]
    Sink(#[from] SinkError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_transience() {
        assert!(BackendError::RateLimited("429".into()).is_transient());
        assert!(BackendError::Unavailable("503".into()).is_transient());
        assert!(BackendError::Network("reset".into()).is_transient());
        assert!(BackendError::Timeout("deadline".into()).is_transient());
        assert!(!BackendError::Auth("401".into()).is_transient());
        assert!(!BackendError::InvalidRequest("400".into()).is_transient());
    }

    #[test]
    fn test_failure_kind_classification() {
        let fetch: ItemError = FetchError::Timeout {
            url: "https://example.com".into(),
        }
        .into();
        assert_eq!(fetch.failure_kind(), FailureKind::Timeout);

        let too_large: ItemError = FetchError::TooLarge {
            url: "https://example.com/a.png".into(),
            size: 30_000_000,
            limit: 20_971_520,
        }
        .into();
        assert_eq!(too_large.failure_kind(), FailureKind::TooLarge);

        let exhausted: ItemError = ExtractError::Exhausted {
            attempts: 3,
            last: BackendError::RateLimited("quota".into()),
        }
        .into();
        assert_eq!(exhausted.failure_kind(), FailureKind::RateLimit);

        let parse: ItemError = ExtractError::Parse {
            detail: "no rows".into(),
        }
        .into();
        assert_eq!(parse.failure_kind(), FailureKind::Parse);
    }

    #[test]
    fn test_failure_kind_serde_labels() {
        let json = serde_json::to_string(&FailureKind::RateLimit).unwrap();
        assert_eq!(json, "\"rate_limit\"");
        let back: FailureKind = serde_json::from_str("\"empty_response\"").unwrap();
        assert_eq!(back, FailureKind::EmptyResponse);
    }
}
