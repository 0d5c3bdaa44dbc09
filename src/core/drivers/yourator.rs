use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use once_cell::sync::Lazy;
use regex::Regex;

use super::super::errors::ImportError;
use super::super::models::{ApplicationStatus, Source};
use super::super::xlsx;
use super::{parse_datetime, rows_from_table, Field, RawRow, RecordDraft, SourceDriver};

pub const DEFAULT_FILE_PATH: &str = "./yourator.xlsx";

static PHONE_FORMATTING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[\s\-\(\)\.]").unwrap());

// Excel serial dates count days from this epoch.
const EXCEL_EPOCH: (i32, u32, u32) = (1899, 12, 30);

// Job-board export headers, Traditional Chinese throughout.
const FIELD_MAPPING: &[(&str, Field)] = &[
    ("投遞編號", Field::SourceId),
    ("求職者姓名", Field::FullName),
    ("求職者信箱", Field::Email),
    ("求職者電話", Field::Phone),
    ("職位名稱", Field::PositionApplied),
    ("投遞時間", Field::ApplicationDate),
    ("投遞狀態", Field::ApplicationStatus),
    ("履歷連結", Field::ResumeFile),
    ("簡介", Field::RecruiterNotes),
    ("學歷一", Field::TechnicalNotes),
    ("工作經歷一", Field::HrNotes),
];

pub struct YouratorDriver {
    file_path: PathBuf,
}

impl YouratorDriver {
    pub fn new(file_path: Option<PathBuf>) -> Self {
        Self {
            file_path: file_path.unwrap_or_else(|| PathBuf::from(DEFAULT_FILE_PATH)),
        }
    }
}

#[async_trait]
impl SourceDriver for YouratorDriver {
    fn source(&self) -> Source {
        Source::Yourator
    }

    fn field_mapping(&self) -> &'static [(&'static str, Field)] {
        FIELD_MAPPING
    }

    async fn fetch_rows(&self) -> Result<Vec<RawRow>, ImportError> {
        if !self.file_path.exists() {
            return Err(ImportError::SourceFileNotFound(self.file_path.clone()));
        }

        let table =
            xlsx::read_first_worksheet(&self.file_path).map_err(|err| ImportError::SourceFetch {
                source_name: "yourator",
                message: err.to_string(),
            })?;

        Ok(rows_from_table(&table))
    }

    fn apply_transforms(&self, draft: &mut RecordDraft) {
        if let Some(raw) = draft.application_status_raw.take() {
            draft.application_status = Some(parse_application_status(&raw));
        }

        if let Some(raw) = draft.application_date_raw.take() {
            draft.application_date = parse_datetime(&raw).or_else(|| parse_excel_serial(&raw));
        }

        if let Some(raw) = draft.phone.take() {
            draft.phone = normalize_phone(&raw);
        }
    }
}

fn parse_application_status(raw: &str) -> ApplicationStatus {
    match raw.trim().to_lowercase().as_str() {
        "待審核" | "pending" | "submitted" => ApplicationStatus::Applied,
        "審核中" | "reviewing" | "screening" => ApplicationStatus::Screening,
        "面試" | "interview" | "interviewing" => ApplicationStatus::Interview,
        "錄取" | "hired" | "accepted" => ApplicationStatus::Hired,
        "拒絕" | "rejected" | "declined" => ApplicationStatus::Rejected,
        _ => ApplicationStatus::Applied,
    }
}

/// Worksheets that store the submission time as a date-formatted number hand
/// us the raw serial; convert it back to a timestamp.
fn parse_excel_serial(raw: &str) -> Option<NaiveDateTime> {
    let serial = raw.trim().parse::<f64>().ok()?;
    if !(1.0..=100_000.0).contains(&serial) {
        return None;
    }

    let (year, month, day) = EXCEL_EPOCH;
    let epoch = chrono::NaiveDate::from_ymd_opt(year, month, day)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    epoch.checked_add_signed(chrono::Duration::seconds(seconds))
}

/// Prefer a full E.164 parse (TW numbers are the common case for this
/// source); otherwise just strip the usual formatting characters.
fn normalize_phone(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(parsed) = phonenumber::parse(Some(phonenumber::country::Id::TW), trimmed) {
        if phonenumber::is_valid(&parsed) {
            return Some(parsed.format().mode(phonenumber::Mode::E164).to_string());
        }
    }

    let cleaned = PHONE_FORMATTING_RE.replace_all(trimmed, "").into_owned();
    (!cleaned.is_empty()).then_some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::ApplicationStatus;

    fn table() -> Vec<Vec<String>> {
        let rows = [
            vec![
                "投遞編號",
                "求職者姓名",
                "求職者信箱",
                "求職者電話",
                "職位名稱",
                "投遞時間",
                "投遞狀態",
                "履歷連結",
            ],
            vec![
                "y-1001",
                "陳小明",
                "ming.chen@example.com",
                "(09) 1234-5678",
                "後端工程師",
                "2025-05-05 16:38:29",
                "待審核",
                "https://yourator.example.com/resume/1001",
            ],
            vec![
                "y-1002",
                "林美玲",
                "mei.lin@example.com",
                "",
                "資料工程師",
                "45782",
                "錄取",
                "mei_lin.pdf",
            ],
        ];

        rows.iter()
            .map(|row| row.iter().map(|cell| cell.to_string()).collect())
            .collect()
    }

    fn driver() -> YouratorDriver {
        YouratorDriver::new(None)
    }

    #[tokio::test]
    async fn maps_export_headers_and_status_vocabulary() {
        let rows = rows_from_table(&table());
        let record = driver().to_record(&rows[0]).await.unwrap().record;

        assert_eq!(record.source, Source::Yourator);
        assert_eq!(record.source_id.as_deref(), Some("y-1001"));
        assert_eq!(record.full_name.as_deref(), Some("陳小明"));
        assert_eq!(record.application_status, Some(ApplicationStatus::Applied));
        assert_eq!(
            record.application_date.map(|d| d.to_string()).as_deref(),
            Some("2025-05-05 16:38:29")
        );
        assert_eq!(
            record.resume_file.as_deref(),
            Some("https://yourator.example.com/resume/1001")
        );
    }

    #[tokio::test]
    async fn serial_dates_and_chinese_statuses_convert() {
        let rows = rows_from_table(&table());
        let record = driver().to_record(&rows[1]).await.unwrap().record;

        assert_eq!(record.application_status, Some(ApplicationStatus::Hired));
        assert_eq!(
            record.application_date.map(|d| d.to_string()).as_deref(),
            Some("2025-05-05 00:00:00")
        );
    }

    #[test]
    fn normalize_phone_strips_formatting_when_not_parseable() {
        assert_eq!(
            normalize_phone("(02) 1234-567"),
            Some("021234567".to_string())
        );
        assert_eq!(normalize_phone("   "), None);
    }

    #[test]
    fn normalize_phone_formats_valid_taiwanese_mobiles() {
        let normalized = normalize_phone("0912 345 678").unwrap();
        assert!(normalized == "+886912345678" || normalized == "0912345678");
    }

    #[test]
    fn excel_serial_round_trips_a_known_date() {
        assert_eq!(
            parse_excel_serial("45782").map(|d| d.to_string()).as_deref(),
            Some("2025-05-05 00:00:00")
        );
        assert_eq!(parse_excel_serial("not-a-number"), None);
        assert_eq!(parse_excel_serial("12000000"), None);
    }

    #[tokio::test]
    async fn missing_file_is_a_fatal_fetch_error() {
        let driver = YouratorDriver::new(Some(PathBuf::from("/nonexistent/yourator.xlsx")));
        let err = driver.fetch_rows().await.unwrap_err();
        assert!(matches!(err, ImportError::SourceFileNotFound(_)));
    }
}
