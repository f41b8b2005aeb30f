//! Core data model: work items, fetched content, extraction results, and
//! progress entries.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FailureKind, ItemError};

/// One (facility identifier, source address) pair to fetch and extract.
///
/// Immutable once assigned to a shard. Pairs need not be unique across the
/// input; each occurrence is processed independently.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItem {
    pub facility_id: String,
    pub source_url: String,
}

impl WorkItem {
    pub fn new(facility_id: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            facility_id: facility_id.into(),
            source_url: source_url.into(),
        }
    }
}

/// Classified content type of a fetched resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Html,
    Image,
    Document,
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            MediaKind::Html => "html",
            MediaKind::Image => "image",
            MediaKind::Document => "document",
        };
        f.write_str(label)
    }
}

/// Fetched payload, already normalized and within the configured ceilings.
#[derive(Debug, Clone)]
pub enum MediaPayload {
    /// Preprocessed page text (tags stripped, whitespace collapsed)
    Html { text: String, truncated: bool },
    /// Raster image, downscaled if the original was over the byte ceiling
    Image { data: Vec<u8>, mime: String },
    /// PDF document within the page and byte ceilings
    Document { data: Vec<u8>, page_count: usize },
}

impl MediaPayload {
    pub fn kind(&self) -> MediaKind {
        match self {
            MediaPayload::Html { .. } => MediaKind::Html,
            MediaPayload::Image { .. } => MediaKind::Image,
            MediaPayload::Document { .. } => MediaKind::Document,
        }
    }
}

/// Output of the content fetcher, consumed by the extraction client within
/// the same item's processing and then discarded.
#[derive(Debug, Clone)]
pub struct FetchedContent {
    pub item: WorkItem,
    pub payload: MediaPayload,
    /// Size of the payload as returned (post-truncation/downscale)
    pub size_bytes: usize,
    pub fetched_at: DateTime<Utc>,
}

impl FetchedContent {
    pub fn new(item: WorkItem, payload: MediaPayload) -> Self {
        let size_bytes = match &payload {
            MediaPayload::Html { text, .. } => text.len(),
            MediaPayload::Image { data, .. } => data.len(),
            MediaPayload::Document { data, .. } => data.len(),
        };
        Self {
            item,
            payload,
            size_bytes,
            fetched_at: Utc::now(),
        }
    }
}

/// Structured rows extracted for one work item, already in the mode's full
/// column order.
#[derive(Debug, Clone)]
pub struct ExtractionResult {
    pub item: WorkItem,
    pub rows: Vec<Vec<String>>,
    pub model_version: String,
    pub extracted_at: DateTime<Utc>,
}

/// Terminal outcome of one item attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    Failure,
}

/// One ledger line: the attempt record for a single work item.
///
/// Append-only; never mutated after being written. Corrections are made by
/// appending a newer entry, and readers take the most recent entry per item
/// as authoritative.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub facility_id: String,
    pub source_url: String,
    pub outcome: Outcome,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<FailureKind>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,

    pub timestamp: DateTime<Utc>,
}

impl ProgressEntry {
    /// Entry for a successfully processed item.
    pub fn success(item: &WorkItem) -> Self {
        Self {
            facility_id: item.facility_id.clone(),
            source_url: item.source_url.clone(),
            outcome: Outcome::Success,
            error_kind: None,
            error_detail: None,
            timestamp: Utc::now(),
        }
    }

    /// Entry for a failed item, carrying the classified cause.
    pub fn failure(item: &WorkItem, error: &ItemError) -> Self {
        Self {
            facility_id: item.facility_id.clone(),
            source_url: item.source_url.clone(),
            outcome: Outcome::Failure,
            error_kind: Some(error.failure_kind()),
            error_detail: Some(error.to_string()),
            timestamp: Utc::now(),
        }
    }

    /// The work item this entry belongs to.
    pub fn work_item(&self) -> WorkItem {
        WorkItem::new(self.facility_id.clone(), self.source_url.clone())
    }
}

/// Timestamps in output rows and sink filenames use JST, matching the
/// upstream data conventions.
pub fn jst_now() -> DateTime<FixedOffset> {
    // +09:00 is a valid fixed offset
    let jst = FixedOffset::east_opt(9 * 3600).unwrap();
    Utc::now().with_timezone(&jst)
}

/// JST timestamp in ISO-8601 for the `output_datetime` column.
pub fn jst_now_iso() -> String {
    jst_now().format("%Y-%m-%dT%H:%M:%S+09:00").to_string()
}

/// Compact JST timestamp used in sink filenames.
pub fn jst_file_timestamp() -> String {
    jst_now().format("%Y%m%d_%H%M%S").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FetchError;

    #[test]
    fn test_fetched_content_size() {
        let item = WorkItem::new("H001", "https://example.com");
        let content = FetchedContent::new(
            item,
            MediaPayload::Html {
                text: "hello".to_string(),
                truncated: false,
            },
        );
        assert_eq!(content.size_bytes, 5);
        assert_eq!(content.payload.kind(), MediaKind::Html);
    }

    #[test]
    fn test_progress_entry_failure_carries_kind() {
        let item = WorkItem::new("H002", "https://example.com/big.png");
        let error: ItemError = FetchError::TooLarge {
            url: item.source_url.clone(),
            size: 100,
            limit: 10,
        }
        .into();

        let entry = ProgressEntry::failure(&item, &error);
        assert_eq!(entry.outcome, Outcome::Failure);
        assert_eq!(entry.error_kind, Some(FailureKind::TooLarge));
        assert!(entry.error_detail.as_ref().unwrap().contains("too large"));
        assert_eq!(entry.work_item(), item);
    }

    #[test]
    fn test_progress_entry_json_shape() {
        let item = WorkItem::new("H003", "https://example.com/a");
        let entry = ProgressEntry::success(&item);
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["facility_id"], "H003");
        assert_eq!(json["outcome"], "success");
        // success entries carry no error fields at all
        assert!(json.get("error_kind").is_none());
        assert!(json.get("error_detail").is_none());
    }

    #[test]
    fn test_jst_iso_offset_suffix() {
        let iso = jst_now_iso();
        assert!(iso.ends_with("+09:00"));
    }
}
