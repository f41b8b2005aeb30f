//! Backend response parsing.
//!
//! Models are asked for tab-delimited rows but drift in practice: Markdown
//! code fences, an echoed header row, comma delimiters, missing trailing
//! fields, placeholder rows. Parsing normalizes all of that into rows of
//! exactly the mode's payload arity and drops rows that carry no data.

use tracing::debug;

use crate::types::JobMode;

/// Classification codes accepted in `url_collect` mode.
pub const VALID_PAGE_TYPES: [&str; 4] = ["s", "g_txt", "g_img", "g_pdf"];

/// Row values that mean "nothing found" in a physician name column.
const NAME_PLACEHOLDERS: [&str; 5] = ["N/A", "なし", "-", "該当なし", "不明"];

/// Known header cell values; a roster row whose name or department equals
/// one of these is an echoed header fragment, not data.
const HEADER_VALUES: [&str; 12] = [
    "department",
    "name",
    "position",
    "specialty",
    "licence",
    "others",
    "診療科",
    "名前",
    "役職",
    "専門",
    "資格",
    "その他",
];

/// Parse backend text into payload rows for `mode`.
///
/// Every returned row has exactly `mode.payload_arity()` cleaned fields.
/// An empty result from non-empty text means no line survived validation;
/// the caller decides whether that is a parse failure.
pub fn parse_rows(mode: JobMode, text: &str) -> Vec<Vec<String>> {
    let body = strip_code_fences(text);
    let lines: Vec<&str> = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    if lines.is_empty() {
        return Vec::new();
    }

    // An echoed header also marks the end of any preamble chatter.
    let start = match lines.iter().position(|line| is_header_line(mode, line)) {
        Some(i) => {
            debug!(mode = %mode, line = lines[i], "header row skipped");
            i + 1
        }
        None => 0,
    };

    let arity = mode.payload_arity();
    let mut rows = Vec::new();

    for line in &lines[start..] {
        let mut fields = split_record(line);
        if fields.len() < min_fields(mode) {
            continue;
        }
        fields.truncate(arity);
        while fields.len() < arity {
            fields.push(String::new());
        }

        let mut fields: Vec<String> = fields.iter().map(|f| clean_field(f)).collect();
        if !validate_row(mode, &mut fields) {
            continue;
        }

        rows.push(fields);
    }

    debug!(mode = %mode, rows = rows.len(), lines = lines.len(), "response parsed");
    rows
}

/// Remove Markdown code fences; if the fences wrapped the entire answer,
/// keep the original text instead.
fn strip_code_fences(text: &str) -> String {
    let fence_pattern = regex::Regex::new(r"(?s)```[^`]*```").unwrap();
    let stripped = fence_pattern.replace_all(text, "").trim().to_string();
    if stripped.is_empty() {
        // The fences held the whole payload; unwrap them instead.
        let marker_pattern = regex::Regex::new(r"```[a-zA-Z]*").unwrap();
        marker_pattern.replace_all(text, "").trim().to_string()
    } else {
        stripped
    }
}

/// Tab-delimited when any tab is present, comma-delimited otherwise.
fn split_record(line: &str) -> Vec<String> {
    let delimiter = if line.contains('\t') { '\t' } else { ',' };
    line.split(delimiter).map(|f| f.to_string()).collect()
}

/// Strip surrounding whitespace, quotes, and parentheses from one field.
fn clean_field(field: &str) -> String {
    field
        .trim_matches(|c: char| c.is_whitespace() || "\"'()（）".contains(c))
        .to_string()
}

fn min_fields(mode: JobMode) -> usize {
    match mode {
        JobMode::UrlCollect => 1,
        JobMode::DoctorInfo => 2,
        JobMode::Outpatient => 5,
    }
}

fn is_header_line(mode: JobMode, line: &str) -> bool {
    let lower = line.to_lowercase();
    let tokens: &[&str] = match mode {
        JobMode::UrlCollect => &["page_type", "type", "confidence"],
        JobMode::DoctorInfo => &[
            "department",
            "name",
            "position",
            "specialty",
            "licence",
            "診療科",
            "名前",
            "役職",
            "専門",
        ],
        JobMode::Outpatient => &[
            "facility_name",
            "department",
            "day_of_week",
            "physician",
            "診療科",
            "曜日",
            "医師名",
        ],
    };
    tokens.iter().filter(|t| lower.contains(*t)).count() >= 2
}

/// Mode-specific row validation; may patch fields in place.
fn validate_row(mode: JobMode, fields: &mut [String]) -> bool {
    match mode {
        JobMode::UrlCollect => {
            // fields: [page_type, confidence_score]
            VALID_PAGE_TYPES.contains(&fields[0].as_str())
        }
        JobMode::DoctorInfo => {
            // fields: [department, name, position, specialty, license, other]
            if fields[0].is_empty() {
                fields[0] = "診療科".to_string();
            }
            let name = &fields[1];
            if name.chars().count() < 2 {
                return false;
            }
            if NAME_PLACEHOLDERS.contains(&name.as_str()) {
                return false;
            }
            let name_lower = name.to_lowercase();
            let dep_lower = fields[0].to_lowercase();
            !HEADER_VALUES.contains(&name_lower.as_str())
                && !HEADER_VALUES.contains(&dep_lower.as_str())
        }
        JobMode::Outpatient => {
            // fields: [facility_name, department, day_of_week, first_or_followup,
            //          physician_name, position, charge_week, charge_date,
            //          specialty, update_date]
            // Closure markers ("-", "休診") are real schedule data and stay.
            !fields[1].is_empty() && !fields[4].is_empty()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_fence_stripped() {
        let text = "```tsv\n内科\t山田太郎\t部長\t\t\t\n```";
        let rows = parse_rows(JobMode::DoctorInfo, text);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][0], "内科");
        assert_eq!(rows[0][1], "山田太郎");
    }

    #[test]
    fn test_prose_outside_fence_is_dropped_with_fence() {
        let text = "Here are the results:\n```\nshould vanish\n```\n内科\t山田太郎";
        let rows = parse_rows(JobMode::DoctorInfo, text);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_header_row_skipped() {
        let text = "department\tname\tposition\tspecialty\tlicence\tothers\n\
                    外科\t佐藤花子\t医長\t消化器外科\t\t";
        let rows = parse_rows(JobMode::DoctorInfo, text);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0][1], "佐藤花子");
    }

    #[test]
    fn test_preamble_before_header_is_skipped() {
        let text = "以下の通りです。\n診療科\t名前\t役職\n内科\t山田太郎\t";
        let rows = parse_rows(JobMode::DoctorInfo, text);
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn test_comma_fallback_and_padding() {
        let rows = parse_rows(JobMode::DoctorInfo, "内科,山田太郎,部長");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].len(), 6);
        assert_eq!(rows[0][2], "部長");
        assert_eq!(rows[0][5], "");
    }

    #[test]
    fn test_placeholder_names_dropped() {
        for placeholder in ["N/A", "なし", "-", "該当なし", "不明"] {
            let text = format!("内科\t{placeholder}\t\t\t\t");
            assert!(parse_rows(JobMode::DoctorInfo, &text).is_empty());
        }
    }

    #[test]
    fn test_short_name_dropped() {
        assert!(parse_rows(JobMode::DoctorInfo, "内科\t山\t\t\t\t").is_empty());
    }

    #[test]
    fn test_empty_department_defaults() {
        let rows = parse_rows(JobMode::DoctorInfo, "\t山田太郎\t\t\t\t");
        assert_eq!(rows[0][0], "診療科");
    }

    #[test]
    fn test_quotes_and_parens_cleaned() {
        let rows = parse_rows(JobMode::DoctorInfo, "\"内科\"\t(山田太郎)\t（部長）\t\t\t");
        assert_eq!(rows[0][0], "内科");
        assert_eq!(rows[0][1], "山田太郎");
        assert_eq!(rows[0][2], "部長");
    }

    #[test]
    fn test_url_mode_validates_page_type() {
        let rows = parse_rows(JobMode::UrlCollect, "s\t0.92");
        assert_eq!(rows, vec![vec!["s".to_string(), "0.92".to_string()]]);

        assert!(parse_rows(JobMode::UrlCollect, "banana\t0.92").is_empty());
    }

    #[test]
    fn test_url_mode_pads_missing_confidence() {
        let rows = parse_rows(JobMode::UrlCollect, "g_pdf");
        assert_eq!(rows, vec![vec!["g_pdf".to_string(), String::new()]]);
    }

    #[test]
    fn test_outpatient_requires_department_and_name() {
        let ok = "中央病院\t内科\t月\t初診\t山田太郎\t部長\t\t\t\t";
        assert_eq!(parse_rows(JobMode::Outpatient, ok).len(), 1);

        let closure = "中央病院\t内科\t月\t初診\t-\t\t\t\t\t";
        assert_eq!(parse_rows(JobMode::Outpatient, closure).len(), 1);

        let no_dep = "中央病院\t\t月\t初診\t山田太郎\t\t\t\t\t";
        assert!(parse_rows(JobMode::Outpatient, no_dep).is_empty());
    }

    #[test]
    fn test_empty_text_yields_no_rows() {
        assert!(parse_rows(JobMode::DoctorInfo, "").is_empty());
        assert!(parse_rows(JobMode::DoctorInfo, "   \n  ").is_empty());
    }
}
