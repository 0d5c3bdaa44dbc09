use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use super::super::credentials::SheetsCredentials;
use super::super::errors::ImportError;
use super::super::models::{InterviewStatus, Source};
use super::super::sheets::SheetsClient;
use super::{rows_from_csv, Field, RawRow, RecordDraft, SourceDriver};

const SPREADSHEET_ID: &str = "1hinp7M0dyMdL6bnoq4hRv4iHuwa9CuZzd8Xs8pdwoOo";
const WORKSHEET_GID: u64 = 341040725;
const RESUME_COLUMN: &str = "履歷";

const INTERVIEW_BACKUP_KEY: &str = "interview_status_2";

// Mixed Chinese/English headers; the sheet carries the interview column
// twice, so the duplicate surfaces under the deduped `是否約面.1` name.
const FIELD_MAPPING: &[(&str, Field)] = &[
    ("名字", Field::FullName),
    ("email", Field::Email),
    ("分數", Field::TestScore),
    ("測驗結果", Field::TestUrl),
    ("履歷", Field::ResumeFile),
    ("是否約面", Field::InterviewStatus),
    ("是否約面.1", Field::Extra(INTERVIEW_BACKUP_KEY)),
    ("職缺", Field::PositionApplied),
    ("補充說明", Field::RecruiterNotes),
    ("Comment", Field::HrNotes),
    ("FROM", Field::SourceId),
];

pub struct CakeDriver {
    sheets: SheetsClient,
    credentials: Option<SheetsCredentials>,
    hyperlinks: OnceCell<HashMap<usize, String>>,
}

impl CakeDriver {
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
impl SourceDriver for CakeDriver {
    fn source(&self) -> Source {
        Source::Cake
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
                source_name: "cake",
                message: err.to_string(),
            })?;

        rows_from_csv(&text).map_err(|err| ImportError::SourceFetch {
            source_name: "cake",
            message: err.to_string(),
        })
    }

    async fn resolve_link(&self, row: &RawRow, column: &str) -> Option<String> {
        self.hyperlinks(column).await.get(&row.index()).cloned()
    }

    fn apply_transforms(&self, draft: &mut RecordDraft) {
        // Scores come through as percentage strings ("69%").
        if let Some(raw) = draft.test_score_raw.take() {
            let trimmed = raw.trim();
            draft.test_score_raw = Some(trimmed.strip_suffix('%').unwrap_or(trimmed).to_string());
        }

        // Two interview columns exist; the first non-empty one wins.
        let status_raw = draft
            .interview_status_raw
            .take()
            .or_else(|| draft.extra.remove(INTERVIEW_BACKUP_KEY));
        if let Some(raw) = status_raw {
            draft.interview_status = Some(parse_interview_status(&raw));
        }
        draft.extra.remove(INTERVIEW_BACKUP_KEY);
    }
}

fn parse_interview_status(raw: &str) -> InterviewStatus {
    match raw.trim().to_lowercase().as_str() {
        "true" | "yes" | "是" | "約面" => InterviewStatus::Scheduled,
        "false" | "no" | "否" => InterviewStatus::NotScheduled,
        _ => InterviewStatus::Pending,
    }
}
