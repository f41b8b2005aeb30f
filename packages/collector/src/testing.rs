//! Testing utilities including mock implementations.
//!
//! These are useful for testing run logic without making real network or
//! model calls.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use crate::error::{BackendError, FetchError};
use crate::traits::{BackendResponse, ExtractionBackend, Fetcher};
use crate::types::{FetchedContent, MediaPayload, WorkItem};

/// A mock fetcher for testing.
///
/// Returns predefined page text without making network requests.
#[derive(Default)]
pub struct MockFetcher {
    /// Predefined page text by URL
    pages: Arc<RwLock<HashMap<String, String>>>,

    /// URLs that should fail with a network error
    fail_urls: Arc<RwLock<Vec<String>>>,

    /// Simulated per-fetch latency
    delay: Option<std::time::Duration>,

    /// URLs fetched, in call order
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a predefined page.
    pub fn with_page(self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.pages.write().unwrap().insert(url.into(), text.into());
        self
    }

    /// Mark a URL as failing.
    pub fn fail_url(self, url: impl Into<String>) -> Self {
        self.fail_urls.write().unwrap().push(url.into());
        self
    }

    /// Make every fetch take `delay` before resolving.
    pub fn with_delay(mut self, delay: std::time::Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Get all URLs fetched so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl Fetcher for MockFetcher {
    async fn fetch(&self, item: &WorkItem) -> Result<FetchedContent, FetchError> {
        self.calls.write().unwrap().push(item.source_url.clone());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_urls.read().unwrap().contains(&item.source_url) {
            return Err(FetchError::Network {
                url: item.source_url.clone(),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::ConnectionRefused,
                    "Mock connection refused",
                )),
            });
        }

        match self.pages.read().unwrap().get(&item.source_url) {
            Some(text) => Ok(FetchedContent::new(
                item.clone(),
                MediaPayload::Html {
                    text: text.clone(),
                    truncated: false,
                },
            )),
            None => Err(FetchError::Unsupported {
                url: item.source_url.clone(),
                detail: "no predefined page".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A mock extraction backend for testing.
///
/// Returns deterministic, configurable response text. Failures can be
/// scripted per URL or for the first N calls.
pub struct MockBackend {
    /// Predefined response text by URL
    responses: Arc<RwLock<HashMap<String, String>>>,

    /// Response text for URLs without a predefined entry
    default_response: Arc<RwLock<Option<String>>>,

    /// URLs that should always fail
    fail_urls: Arc<RwLock<Vec<String>>>,

    /// Remaining calls that should fail before responses resume
    fail_remaining: AtomicUsize,

    /// Error produced by scripted failures
    error_factory: Box<dyn Fn() -> BackendError + Send + Sync>,

    model_version: String,

    /// URLs extracted, in call order
    calls: Arc<RwLock<Vec<String>>>,
}

impl Default for MockBackend {
    fn default() -> Self {
        Self {
            responses: Arc::default(),
            default_response: Arc::default(),
            fail_urls: Arc::default(),
            fail_remaining: AtomicUsize::new(0),
            error_factory: Box::new(|| BackendError::Unavailable("mock outage".to_string())),
            model_version: "mock-extractor-001".to_string(),
            calls: Arc::default(),
        }
    }
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the response text returned for every URL without its own entry.
    pub fn with_response(self, text: impl Into<String>) -> Self {
        *self.default_response.write().unwrap() = Some(text.into());
        self
    }

    /// Add a predefined response for one URL.
    pub fn with_response_for(self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.responses.write().unwrap().insert(url.into(), text.into());
        self
    }

    /// Mark a URL as always failing.
    pub fn fail_url(self, url: impl Into<String>) -> Self {
        self.fail_urls.write().unwrap().push(url.into());
        self
    }

    /// Fail the first `n` calls with errors from `factory`, then succeed.
    pub fn failing_times(
        self,
        n: usize,
        factory: impl Fn() -> BackendError + Send + Sync + 'static,
    ) -> Self {
        self.fail_remaining.store(n, Ordering::SeqCst);
        Self {
            error_factory: Box::new(factory),
            ..self
        }
    }

    pub fn with_model_version(mut self, version: impl Into<String>) -> Self {
        self.model_version = version.into();
        self
    }

    /// Get all URLs extracted so far.
    pub fn calls(&self) -> Vec<String> {
        self.calls.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.read().unwrap().len()
    }
}

#[async_trait]
impl ExtractionBackend for MockBackend {
    async fn extract(
        &self,
        content: &FetchedContent,
        _instruction: &str,
    ) -> Result<BackendResponse, BackendError> {
        let url = content.item.source_url.clone();
        self.calls.write().unwrap().push(url.clone());

        let scripted = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if scripted || self.fail_urls.read().unwrap().contains(&url) {
            return Err((self.error_factory)());
        }

        let text = self
            .responses
            .read()
            .unwrap()
            .get(&url)
            .cloned()
            .or_else(|| self.default_response.read().unwrap().clone())
            .unwrap_or_default();

        Ok(BackendResponse::new(text, self.model_version.clone()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
