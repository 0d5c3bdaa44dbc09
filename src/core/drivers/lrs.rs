use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::super::credentials::SheetsCredentials;
use super::super::errors::ImportError;
use super::super::models::{InterviewStatus, Source};
use super::super::sheets::SheetsClient;
use super::{rows_from_csv, Field, RawRow, RecordDraft, SourceDriver};

const SPREADSHEET_ID: &str = "1mGpl2LzdXZlrKYXatWdAKQrI5SsagjTEen58xtjDNms";
const WORKSHEET_GID: u64 = 127001815;
const RESUME_COLUMN: &str = "履歷";

// The LRS tracker uses Traditional Chinese column headers.
const FIELD_MAPPING: &[(&str, Field)] = &[
    ("編號", Field::SourceId),
    ("名字", Field::FullName),
    ("作答email", Field::Email),
    ("履歷", Field::ResumeFile),
    ("補充說明By LRS", Field::RecruiterNotes),
    ("測驗結果", Field::TestUrl),
    ("筆試分數", Field::TestScore),
    ("是否約面", Field::InterviewStatus),
    ("補充說明 By集雅", Field::HrNotes),
];

pub struct LrsDriver {
    sheets: SheetsClient,
    credentials: Option<SheetsCredentials>,
    hyperlinks: OnceCell<HashMap<usize, String>>,
}

impl LrsDriver {
    pub fn new(client: reqwest::Client, credentials: Option<SheetsCredentials>) -> Self {
        Self {
            sheets: SheetsClient::new(client),
            credentials,
            hyperlinks: OnceCell::new(),
        }
    }

    async fn hyperlinks(&self, column: &str) -> &HashMap<usize, String> {
        self.hyperlinks
            .get_or_init(|| async {
                let Some(credentials) = self.credentials.as_ref() else {
                    debug!("no spreadsheet credentials; using literal cell values");
                    return HashMap::new();
                };

                match self
                    .sheets
                    .fetch_hyperlinks(
                        &credentials.access_token,
                        SPREADSHEET_ID,
                        WORKSHEET_GID,
                        column,
                    )
                    .await
                {
                    Ok(links) => links,
                    Err(err) => {
                        warn!(error = %err, "hyperlink lookup failed; using literal cell values");
                        HashMap::new()
                    }
                }
            })
            .await
    }
}

#[async_trait]
impl SourceDriver for LrsDriver {
    fn source(&self) -> Source {
        Source::Lrs
    }

    fn field_mapping(&self) -> &'static [(&'static str, Field)] {
        FIELD_MAPPING
    }

    fn resume_file_header(&self) -> Option<&'static str> {
        Some(RESUME_COLUMN)
    }

    async fn fetch_rows(&self) -> Result<Vec<RawRow>, ImportError> {
        let text = self
            .sheets
            .fetch_csv(SPREADSHEET_ID, WORKSHEET_GID)
            .await
            .map_err(|err| ImportError::SourceFetch {
                source_name: "lrs",
                message: err.to_string(),
            })?;

        rows_from_csv(&text).map_err(|err| ImportError::SourceFetch {
            source_name: "lrs",
            message: err.to_string(),
        })
    }

    async fn resolve_link(&self, row: &RawRow, column: &str) -> Option<String> {
        self.hyperlinks(column).await.get(&row.index()).cloned()
    }

    fn apply_transforms(&self, draft: &mut RecordDraft) {
        if let Some(raw) = draft.interview_status_raw.take() {
            draft.interview_status = Some(parse_interview_status(&raw));
        }
    }
}

fn parse_interview_status(raw: &str) -> InterviewStatus {
    match raw.trim() {
        "是" | "約面" | "YES" | "yes" => InterviewStatus::Scheduled,
        "否" | "NO" | "no" => InterviewStatus::NotScheduled,
        _ => InterviewStatus::Pending,
    }
}
