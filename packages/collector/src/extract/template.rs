//! Extraction templates.
//!
//! One template per mode, chosen at shard start and immutable for the run.
//! Production templates live in the task store; the built-in fallbacks exist
//! so a run works end-to-end without one.

use tracing::warn;

use crate::error::ConfigError;
use crate::traits::TaskStore;
use crate::types::{JobMode, WorkItem};

/// Mode-specific instruction template for the extraction backend.
#[derive(Debug, Clone)]
pub struct ExtractionTemplate {
    mode: JobMode,
    text: String,
}

impl ExtractionTemplate {
    /// Create a template from externally supplied text.
    pub fn new(mode: JobMode, text: impl Into<String>) -> Self {
        Self {
            mode,
            text: text.into(),
        }
    }

    /// The built-in fallback template for a mode.
    pub fn fallback(mode: JobMode) -> Self {
        let text = match mode {
            JobMode::UrlCollect => {
                "医療機関サイトのページを分類してください。\n\
                 分類コード: s=専門医・医師一覧, g_txt=外来担当医表(テキスト), \
                 g_img=外来担当医表(画像), g_pdf=外来担当医表(PDF)\n\
                 出力形式(タブ区切り1行、ヘッダーなし): page_type\tconfidence_score\n\
                 confidence_score は 0 から 1 の数値。どの分類にも該当しない場合は何も出力しないでください。"
            }
            JobMode::DoctorInfo => {
                "医療機関ページから常勤医師の情報を抽出し、医師1人につき1行のタブ区切りで出力してください。\n\
                 出力形式: department\tname\tposition\tspecialty\tlicence\tothers\n\
                 ヘッダー行は出力しないでください。ページに記載のない項目は空欄にしてください。\n\
                 推測で補完しないでください。"
            }
            JobMode::Outpatient => {
                "外来担当医表から担当医の割当てを抽出し、1コマにつき1行のタブ区切りで出力してください。\n\
                 出力形式: facility_name\tdepartment\tday_of_week\tfirst_or_followup\t\
                 physician_name\tposition\tcharge_week\tcharge_date\tspecialty\tupdate_date\n\
                 休診のコマは physician_name を「-」としてください。ヘッダー行は出力しないでください。"
            }
        };
        Self::new(mode, text)
    }

    pub fn mode(&self) -> JobMode {
        self.mode
    }

    /// Render the instruction block for one work item.
    ///
    /// A `{url}` placeholder is substituted when the template carries one;
    /// otherwise the item's address is appended so the model always sees it.
    pub fn render(&self, item: &WorkItem) -> String {
        if self.text.contains("{url}") {
            self.text.replace("{url}", &item.source_url)
        } else {
            format!("{}\n\nURL: {}", self.text, item.source_url)
        }
    }
}

/// The run's template: the store's copy when present, the built-in fallback
/// otherwise.
pub async fn load_template(
    store: &dyn TaskStore,
    mode: JobMode,
) -> Result<ExtractionTemplate, ConfigError> {
    match store.read_template(mode).await? {
        Some(text) => Ok(ExtractionTemplate::new(mode, text)),
        None => {
            warn!(mode = %mode, "no template in store, using built-in fallback");
            Ok(ExtractionTemplate::fallback(mode))
        }
    }
}
