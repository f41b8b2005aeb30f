//! Media classification and normalization.
//!
//! Pure helpers shared by fetcher implementations: payload sniffing, HTML
//! preprocessing, image downscaling, and PDF page counting. Everything here
//! enforces the configured ceilings so downstream code never sees oversized
//! content.

use tracing::debug;

use crate::error::FetchError;

/// Longest allowed image edge in pixels; larger images are downscaled.
pub const MAX_IMAGE_EDGE: u32 = 3072;

/// JPEG quality used when re-encoding downscaled images.
const JPEG_QUALITY: u8 = 85;

/// Media class decided from the response headers and payload signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SniffedKind {
    Html,
    Image(&'static str),
    Pdf,
}

/// Classify a payload from its `Content-Type` header, falling back to magic
/// bytes, then to a markup heuristic. `None` means unsupported.
pub fn sniff_media(content_type: Option<&str>, body: &[u8]) -> Option<SniffedKind> {
    if let Some(ct) = content_type {
        let ct = ct.to_ascii_lowercase();
        if ct.contains("text/html") || ct.contains("application/xhtml") {
            return Some(SniffedKind::Html);
        }
        if ct.contains("application/pdf") {
            return Some(SniffedKind::Pdf);
        }
        if ct.contains("image/png") {
            return Some(SniffedKind::Image("image/png"));
        }
        if ct.contains("image/jpeg") || ct.contains("image/jpg") {
            return Some(SniffedKind::Image("image/jpeg"));
        }
        if ct.contains("image/gif") {
            return Some(SniffedKind::Image("image/gif"));
        }
        if ct.contains("image/webp") {
            return Some(SniffedKind::Image("image/webp"));
        }
        // Plain text goes through the text pipeline; tag stripping is a no-op.
        if ct.contains("text/plain") {
            return Some(SniffedKind::Html);
        }
    }

    if body.starts_with(b"%PDF-") {
        return Some(SniffedKind::Pdf);
    }
    if body.starts_with(&[0x89, b'P', b'N', b'G']) {
        return Some(SniffedKind::Image("image/png"));
    }
    if body.starts_with(&[0xFF, 0xD8, 0xFF]) {
        return Some(SniffedKind::Image("image/jpeg"));
    }
    if body.starts_with(b"GIF87a") || body.starts_with(b"GIF89a") {
        return Some(SniffedKind::Image("image/gif"));
    }
    if body.len() >= 12 && &body[0..4] == b"RIFF" && &body[8..12] == b"WEBP" {
        return Some(SniffedKind::Image("image/webp"));
    }
    if looks_like_markup(body) {
        return Some(SniffedKind::Html);
    }
    None
}

fn looks_like_markup(body: &[u8]) -> bool {
    let head = &body[..body.len().min(1024)];
    String::from_utf8_lossy(head).trim_start().starts_with('<')
}

/// Decode, preprocess, and bound an HTML payload.
///
/// The raw body is rejected above `max_bytes` before decoding; the
/// preprocessed text is clamped to `max_chars` with the truncation flagged.
pub fn prepare_html(
    url: &str,
    body: &[u8],
    max_bytes: usize,
    max_chars: usize,
) -> Result<(String, bool), FetchError> {
    if body.len() > max_bytes {
        return Err(FetchError::TooLarge {
            url: url.to_string(),
            size: body.len(),
            limit: max_bytes,
        });
    }

    let html = String::from_utf8_lossy(body);
    let (text, truncated) = preprocess_html(&html, max_chars);
    if text.is_empty() {
        return Err(FetchError::Unsupported {
            url: url.to_string(),
            detail: "no text content after preprocessing".to_string(),
        });
    }
    Ok((text, truncated))
}

/// Strip markup down to visible text and clamp it to `max_chars`.
pub fn preprocess_html(html: &str, max_chars: usize) -> (String, bool) {
    let mut text = html.to_string();

    // Remove non-content blocks before stripping tags
    let script_pattern = regex::Regex::new(r"(?is)<script[^>]*>.*?</script>").unwrap();
    let style_pattern = regex::Regex::new(r"(?is)<style[^>]*>.*?</style>").unwrap();
    let noscript_pattern = regex::Regex::new(r"(?is)<noscript[^>]*>.*?</noscript>").unwrap();
    let comment_pattern = regex::Regex::new(r"(?s)<!--.*?-->").unwrap();
    text = script_pattern.replace_all(&text, " ").to_string();
    text = style_pattern.replace_all(&text, " ").to_string();
    text = noscript_pattern.replace_all(&text, " ").to_string();
    text = comment_pattern.replace_all(&text, " ").to_string();

    // Remaining tags become separators so adjacent cells don't fuse
    let tag_pattern = regex::Regex::new(r"<[^>]+>").unwrap();
    text = tag_pattern.replace_all(&text, " ").to_string();

    // Decode common entities
    text = text
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'");

    let whitespace_pattern = regex::Regex::new(r"\s+").unwrap();
    let text = whitespace_pattern.replace_all(&text, " ").trim().to_string();

    clamp_chars(text, max_chars)
}

fn clamp_chars(text: String, max_chars: usize) -> (String, bool) {
    if text.chars().count() <= max_chars {
        (text, false)
    } else {
        (text.chars().take(max_chars).collect(), true)
    }
}

/// Bound an image payload, downscaling when it is over the byte ceiling or
/// its longest edge exceeds [`MAX_IMAGE_EDGE`].
///
/// Downscaled images are re-encoded as JPEG. A payload still above the
/// ceiling afterwards, or one that cannot be decoded for shrinking, is
/// rejected as too large.
pub fn prepare_image(
    url: &str,
    data: Vec<u8>,
    mime: &str,
    max_bytes: usize,
) -> Result<(Vec<u8>, String), FetchError> {
    let size = data.len();
    let decoded = image::load_from_memory(&data).ok();
    let over_edge = decoded
        .as_ref()
        .map(|img| img.width().max(img.height()) > MAX_IMAGE_EDGE)
        .unwrap_or(false);

    if size <= max_bytes && !over_edge {
        return Ok((data, mime.to_string()));
    }

    let img = match decoded {
        Some(img) => img,
        None => {
            return Err(FetchError::TooLarge {
                url: url.to_string(),
                size,
                limit: max_bytes,
            })
        }
    };

    let img = if over_edge {
        img.thumbnail(MAX_IMAGE_EDGE, MAX_IMAGE_EDGE)
    } else {
        img
    };

    let mut encoded = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut encoded, JPEG_QUALITY);
    img.to_rgb8()
        .write_with_encoder(encoder)
        .map_err(|e| FetchError::Unsupported {
            url: url.to_string(),
            detail: format!("image re-encode failed: {e}"),
        })?;

    if encoded.len() > max_bytes {
        return Err(FetchError::TooLarge {
            url: url.to_string(),
            size: encoded.len(),
            limit: max_bytes,
        });
    }

    debug!(url = %url, before = size, after = encoded.len(), "image downscaled");
    Ok((encoded, "image/jpeg".to_string()))
}

/// Bound a PDF payload by bytes and page count.
///
/// Pages are not rendered; the document travels to the backend as-is, so
/// both ceilings are enforced up front.
pub fn prepare_document(
    url: &str,
    data: Vec<u8>,
    max_bytes: usize,
    max_pages: usize,
) -> Result<(Vec<u8>, usize), FetchError> {
    if data.len() > max_bytes {
        return Err(FetchError::TooLarge {
            url: url.to_string(),
            size: data.len(),
            limit: max_bytes,
        });
    }

    let page_count = pdf_page_count(&data);
    if page_count == 0 {
        return Err(FetchError::Unsupported {
            url: url.to_string(),
            detail: "no pages found in PDF".to_string(),
        });
    }
    if page_count > max_pages {
        return Err(FetchError::TooLarge {
            url: url.to_string(),
            size: page_count,
            limit: max_pages,
        });
    }

    Ok((data, page_count))
}

/// Count page objects in a PDF by scanning for `/Type /Page` markers.
///
/// Structural scan only, no rendering. `/Pages` tree nodes do not match the
/// word boundary. Documents that keep their page objects inside compressed
/// object streams expose no markers; for those the page-tree `/Count` value
/// is used instead.
pub fn pdf_page_count(data: &[u8]) -> usize {
    let page_pattern = regex::bytes::Regex::new(r"(?-u)/Type\s*/Page\b").unwrap();
    let count = page_pattern.find_iter(data).count();
    if count > 0 {
        return count;
    }

    let count_pattern = regex::bytes::Regex::new(r"(?-u)/Count\s+(\d+)").unwrap();
    count_pattern
        .captures_iter(data)
        .filter_map(|caps| {
            let digits = caps.get(1)?;
            std::str::from_utf8(digits.as_bytes()).ok()?.parse().ok()
        })
        .max()
        .unwrap_or(0)
}
