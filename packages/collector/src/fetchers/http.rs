//! HTTP(S) content fetcher.

use async_trait::async_trait;
use tracing::{debug, warn};
use url::Url;

use crate::error::FetchError;
use crate::fetchers::media::{self, SniffedKind};
use crate::traits::Fetcher;
use crate::types::{FetchedContent, MediaPayload, RunParams, WorkItem};

/// Browser-like agent string; some facility sites refuse default clients.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Production fetcher: retrieves a work item's address over HTTP(S),
/// classifies the payload, and enforces the size ceilings.
///
/// Plain `http://` addresses first attempt an `https://` upgrade and fall
/// back to the original scheme when the upgrade fails.
pub struct HttpFetcher {
    client: reqwest::Client,
    max_html_bytes: usize,
    max_content_chars: usize,
    max_image_bytes: usize,
    max_pdf_bytes: usize,
    max_pdf_pages: usize,
}

impl HttpFetcher {
    /// Create a fetcher configured from the run parameters.
    pub fn new(params: &RunParams) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(params.request_timeout)
                .user_agent(USER_AGENT)
                .build()
                .expect("Failed to create HTTP client"),
            max_html_bytes: params.max_html_bytes,
            max_content_chars: params.max_content_chars,
            max_image_bytes: params.max_image_bytes,
            max_pdf_bytes: params.max_pdf_bytes,
            max_pdf_pages: params.max_pdf_pages,
        }
    }

    /// Set a custom HTTP client.
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// GET with an https upgrade attempt for plain-http addresses.
    async fn get_with_upgrade(&self, url: &str) -> Result<FetchedBody, FetchError> {
        if let Some(upgraded) = https_upgrade(url) {
            match self.get(&upgraded).await {
                Ok(body) => return Ok(body),
                Err(e) => {
                    debug!(url = %url, error = %e, "https upgrade failed, using original scheme");
                }
            }
        }
        self.get(url).await
    }

    async fn get(&self, url: &str) -> Result<FetchedBody, FetchError> {
        let response = self.client.get(url).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "HTTP request failed");
            request_error(url, e)
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Network {
                url: url.to_string(),
                source: format!("HTTP {status}").into(),
            });
        }

        let final_url = response.url().to_string();
        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response
            .bytes()
            .await
            .map_err(|e| request_error(url, e))?
            .to_vec();

        Ok(FetchedBody {
            bytes,
            content_type,
            final_url,
        })
    }
}

struct FetchedBody {
    bytes: Vec<u8>,
    content_type: Option<String>,
    final_url: String,
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, item: &WorkItem) -> Result<FetchedContent, FetchError> {
        let url = &item.source_url;
        Url::parse(url).map_err(|_| FetchError::InvalidUrl { url: url.clone() })?;

        let body = self.get_with_upgrade(url).await?;
        debug!(
            url = %body.final_url,
            bytes = body.bytes.len(),
            content_type = body.content_type.as_deref().unwrap_or("-"),
            "fetched"
        );

        let payload = match media::sniff_media(body.content_type.as_deref(), &body.bytes) {
            Some(SniffedKind::Html) => {
                let (text, truncated) =
                    media::prepare_html(url, &body.bytes, self.max_html_bytes, self.max_content_chars)?;
                MediaPayload::Html { text, truncated }
            }
            Some(SniffedKind::Image(mime)) => {
                let (data, mime) =
                    media::prepare_image(url, body.bytes, mime, self.max_image_bytes)?;
                MediaPayload::Image { data, mime }
            }
            Some(SniffedKind::Pdf) => {
                let (data, page_count) =
                    media::prepare_document(url, body.bytes, self.max_pdf_bytes, self.max_pdf_pages)?;
                MediaPayload::Document { data, page_count }
            }
            None => {
                return Err(FetchError::Unsupported {
                    url: url.clone(),
                    detail: "unrecognized content signature".to_string(),
                })
            }
        };

        Ok(FetchedContent::new(item.clone(), payload))
    }

    fn name(&self) -> &str {
        "http"
    }
}

/// The https form of a plain-http address, `None` when no upgrade applies.
fn https_upgrade(url: &str) -> Option<String> {
    url.strip_prefix("http://")
        .map(|rest| format!("https://{rest}"))
}

fn request_error(url: &str, error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            source: Box::new(error),
        }
    }
}
