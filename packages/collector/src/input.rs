//! Work-list input parsing.
//!
//! The input is a CSV with a header row naming at least `fac_id_unif` and
//! `URL`. Parsing happens once, before partitioning; anything wrong at the
//! file level is fatal.

use std::collections::HashSet;

use tracing::{info, warn};

use crate::error::ConfigError;
use crate::types::WorkItem;

const ID_COLUMN: &str = "fac_id_unif";
const URL_COLUMN: &str = "URL";

/// Parses the facility work list from CSV text.
///
/// Rows with an empty id or url are dropped, exact `(id, url)` duplicates are
/// dropped, and only `http://` / `https://` addresses are kept. A lowercase
/// `url` header is tolerated. Returns [`ConfigError::WorkList`] when the
/// header is missing a required column.
pub fn parse_work_list(text: &str) -> Result<Vec<WorkItem>, ConfigError> {
    // A UTF-8 BOM would otherwise stick to the first header cell.
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);

    let mut lines = text.lines();
    let header_line = lines
        .next()
        .ok_or_else(|| ConfigError::WorkList("input is empty".into()))?;

    let header = split_csv_record(header_line);
    let id_col = header
        .iter()
        .position(|h| h.trim() == ID_COLUMN)
        .ok_or_else(|| ConfigError::WorkList(format!("missing required column {ID_COLUMN}")))?;
    let url_col = header
        .iter()
        .position(|h| {
            let cell = h.trim();
            cell == URL_COLUMN || cell == "url"
        })
        .ok_or_else(|| ConfigError::WorkList(format!("missing required column {URL_COLUMN}")))?;

    let mut items = Vec::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut total = 0usize;
    let mut dropped_empty = 0usize;
    let mut dropped_scheme = 0usize;
    let mut dropped_duplicate = 0usize;

    for line in lines {
        if line.trim().is_empty() {
            continue;
        }
        total += 1;

        let fields = split_csv_record(line);
        let facility_id = fields.get(id_col).map(|f| f.trim()).unwrap_or_default();
        let url = fields.get(url_col).map(|f| f.trim()).unwrap_or_default();

        if facility_id.is_empty() || url.is_empty() {
            dropped_empty += 1;
            continue;
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            dropped_scheme += 1;
            continue;
        }
        if !seen.insert((facility_id.to_string(), url.to_string())) {
            dropped_duplicate += 1;
            continue;
        }

        items.push(WorkItem::new(facility_id, url));
    }

    info!(
        total,
        kept = items.len(),
        dropped_empty,
        dropped_scheme,
        dropped_duplicate,
        "work list validated"
    );
    if items.is_empty() {
        warn!("work list contains no usable rows");
    }

    Ok(items)
}

/// Splits one CSV record, honoring double-quoted fields with `""` escapes.
fn split_csv_record(line: &str) -> Vec<String> {
    let line = line.strip_suffix('\r').unwrap_or(line);

    let mut fields = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    chars.next();
                    field.push('"');
                } else {
                    in_quotes = false;
                }
            }
            '"' if field.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut field)),
            _ => field.push(c),
        }
    }
    fields.push(field);
    fields
}
