//! Rate-limited backend wrapper.
//!
//! Wraps any ExtractionBackend with request rate limiting using the
//! governor crate.

use std::num::NonZeroU32;
use std::sync::Arc;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};

use crate::error::BackendError;
use crate::traits::{BackendResponse, ExtractionBackend};
use crate::types::FetchedContent;

type DefaultRateLimiter = RateLimiter<
    governor::state::NotKeyed,
    governor::state::InMemoryState,
    governor::clock::DefaultClock,
>;

/// A backend wrapper that enforces a request rate.
///
/// Shares one limiter across all concurrent in-flight items, so the whole
/// task respects the quota regardless of concurrency.
pub struct RateLimitedBackend<B: ExtractionBackend> {
    inner: B,
    limiter: Arc<DefaultRateLimiter>,
}

impl<B: ExtractionBackend> RateLimitedBackend<B> {
    /// Wrap `backend` with a sustained requests-per-second limit.
    pub fn new(backend: B, requests_per_second: u32) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(requests_per_second).expect("requests_per_second must be > 0"),
        );
        Self {
            inner: backend,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Wrap with a sustained rate and burst allowance.
    pub fn with_burst(backend: B, requests_per_second: u32, burst: u32) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(requests_per_second).expect("requests_per_second must be > 0"),
        )
        .allow_burst(NonZeroU32::new(burst).expect("burst must be > 0"));

        Self {
            inner: backend,
            limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    async fn wait_for_permit(&self) {
        self.limiter.until_ready().await;
    }
}

#[async_trait]
impl<B: ExtractionBackend> ExtractionBackend for RateLimitedBackend<B> {
    async fn extract(
        &self,
        content: &FetchedContent,
        instruction: &str,
    ) -> Result<BackendResponse, BackendError> {
        self.wait_for_permit().await;
        self.inner.extract(content, instruction).await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
