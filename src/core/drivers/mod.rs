pub mod cake;
pub mod csv_file;
pub mod lrs;
pub mod yourator;

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDateTime;

use super::errors::ImportError;
use super::models::{ApplicationStatus, InterviewStatus, ResumeRecord, Source};
use super::validate::Defect;

/// Canonical record field a source column can map to. `Extra` keeps
/// source-specific columns that have no canonical slot but are still worth
/// carrying (the cake sheet's backup interview column, for instance).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    SourceId,
    FullName,
    Email,
    Phone,
    ResumeFile,
    PositionApplied,
    ApplicationDate,
    TestScore,
    TestUrl,
    InterviewStatus,
    ApplicationStatus,
    RecruiterNotes,
    HrNotes,
    TechnicalNotes,
    Skills,
    YearsExperience,
    Extra(&'static str),
}

/// One raw row from a source: header name to cell text, plus the 0-based
/// data-row index within the source (headers excluded).
#[derive(Debug, Clone)]
pub struct RawRow {
    index: usize,
    cells: HashMap<String, String>,
}

impl RawRow {
    pub fn new(index: usize, headers: &[String], values: &[String]) -> Self {
        let cells = headers
            .iter()
            .zip(values.iter())
            .map(|(header, value)| (header.clone(), value.clone()))
            .collect();
        Self { index, cells }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Trimmed cell value for a header; empty cells read as absent.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells
            .get(header)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.cells.values().all(|v| v.trim().is_empty())
    }
}

/// Disambiguate repeated header names the way dataframe readers do:
/// `header`, `header.1`, `header.2`, … The cake sheet ships a duplicated
/// interview column that the field table addresses as `是否約面.1`.
pub fn dedupe_headers(raw: &[String]) -> Vec<String> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    raw.iter()
        .map(|header| {
            let seen = counts.entry(header.as_str()).or_insert(0);
            let name = if *seen == 0 {
                header.clone()
            } else {
                format!("{header}.{seen}")
            };
            *seen += 1;
            name
        })
        .collect()
}

/// Parse CSV text (local file contents or a spreadsheet CSV export) into raw
/// rows. Fully blank lines are dropped; blank cells survive as empty values.
pub fn rows_from_csv(text: &str) -> Result<Vec<RawRow>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(|h| h.trim().to_string()).collect();
    let headers = dedupe_headers(&headers);

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let values: Vec<String> = record.iter().map(|v| v.to_string()).collect();
        let row = RawRow::new(rows.len(), &headers, &values);
        rows.push(row);
    }

    Ok(rows)
}

/// Convert a dense table (first row headers) into raw rows, dropping fully
/// blank trailing rows the way spreadsheet exports tend to produce them.
pub fn rows_from_table(table: &[Vec<String>]) -> Vec<RawRow> {
    let Some((header_row, data_rows)) = table.split_first() else {
        return Vec::new();
    };

    let headers = dedupe_headers(header_row);

    let mut rows = Vec::new();
    for values in data_rows {
        let row = RawRow::new(rows.len(), &headers, values);
        if row.is_empty() {
            continue;
        }
        rows.push(row);
    }

    rows
}

/// Mutable staging area between a raw row and a finished record. Drivers get
/// one chance to rewrite raw values (percent scores, status vocabularies) or
/// set typed fields directly before `build` runs the generic conversions.
#[derive(Debug)]
pub struct RecordDraft {
    pub source: Source,
    pub row_index: usize,
    pub source_id: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub resume_file: Option<String>,
    pub position_applied: Option<String>,
    pub application_date: Option<NaiveDateTime>,
    pub application_date_raw: Option<String>,
    pub test_score_raw: Option<String>,
    pub test_url: Option<String>,
    pub interview_status: Option<InterviewStatus>,
    pub interview_status_raw: Option<String>,
    pub application_status: Option<ApplicationStatus>,
    pub application_status_raw: Option<String>,
    pub recruiter_notes: Option<String>,
    pub hr_notes: Option<String>,
    pub technical_notes: Option<String>,
    pub skills: Option<String>,
    pub years_experience_raw: Option<String>,
    pub extra: std::collections::BTreeMap<String, String>,
}

impl RecordDraft {
    pub fn from_row(source: Source, row: &RawRow, mapping: &[(&'static str, Field)]) -> Self {
        let mut draft = Self {
            source,
            row_index: row.index(),
            source_id: None,
            full_name: None,
            email: None,
            phone: None,
            resume_file: None,
            position_applied: None,
            application_date: None,
            application_date_raw: None,
            test_score_raw: None,
            test_url: None,
            interview_status: None,
            interview_status_raw: None,
            application_status: None,
            application_status_raw: None,
            recruiter_notes: None,
            hr_notes: None,
            technical_notes: None,
            skills: None,
            years_experience_raw: None,
            extra: Default::default(),
        };

        for (header, field) in mapping {
            let Some(value) = row.get(header) else {
                continue;
            };
            draft.assign(*field, value.to_string());
        }

        draft
    }

    fn assign(&mut self, field: Field, value: String) {
        match field {
            Field::SourceId => self.source_id = Some(value),
            Field::FullName => self.full_name = Some(value),
            Field::Email => self.email = Some(value),
            Field::Phone => self.phone = Some(value),
            Field::ResumeFile => self.resume_file = Some(value),
            Field::PositionApplied => self.position_applied = Some(value),
            Field::ApplicationDate => self.application_date_raw = Some(value),
            Field::TestScore => self.test_score_raw = Some(value),
            Field::TestUrl => self.test_url = Some(value),
            Field::InterviewStatus => self.interview_status_raw = Some(value),
            Field::ApplicationStatus => self.application_status_raw = Some(value),
            Field::RecruiterNotes => self.recruiter_notes = Some(value),
            Field::HrNotes => self.hr_notes = Some(value),
            Field::TechnicalNotes => self.technical_notes = Some(value),
            Field::Skills => self.skills = Some(value),
            Field::YearsExperience => self.years_experience_raw = Some(value),
            Field::Extra(name) => {
                self.extra.insert(name.to_string(), value);
            }
        }
    }

    /// Finish the draft: parse the remaining raw values into their typed
    /// slots, collecting a defect per field that would not convert. Rejects
    /// the row only when no identifying content survived the mapping.
    pub fn build(mut self) -> Result<Converted, ImportError> {
        let mut defects = Vec::new();

        let test_score = match self.test_score_raw.take() {
            Some(raw) => match raw.trim().parse::<f64>() {
                Ok(score) => Some(score),
                Err(_) => {
                    defects.push(Defect::new("test_score", format!("not a number: {raw}")));
                    None
                }
            },
            None => None,
        };

        let years_experience = match self.years_experience_raw.take() {
            Some(raw) => match raw.trim().parse::<i64>() {
                Ok(years) => Some(years),
                Err(_) => {
                    defects.push(Defect::new(
                        "years_experience",
                        format!("not a number: {raw}"),
                    ));
                    None
                }
            },
            None => None,
        };

        let application_date = self.application_date.take().or_else(|| {
            self.application_date_raw
                .take()
                .and_then(|raw| parse_datetime(&raw))
        });

        let interview_status = self.interview_status.take().or_else(|| {
            self.interview_status_raw
                .take()
                .and_then(|raw| InterviewStatus::parse(&raw))
        });

        let application_status = self.application_status.take().or_else(|| {
            self.application_status_raw
                .take()
                .and_then(|raw| ApplicationStatus::parse(&raw))
        });

        let record = ResumeRecord {
            source: self.source,
            source_id: self.source_id,
            full_name: self.full_name,
            email: self.email,
            phone: self.phone,
            resume_file: self.resume_file,
            position_applied: self.position_applied,
            application_date,
            test_score,
            test_url: self.test_url,
            interview_status,
            application_status,
            recruiter_notes: self.recruiter_notes,
            hr_notes: self.hr_notes,
            technical_notes: self.technical_notes,
            skills: self.skills,
            years_experience,
            extra: self.extra,
        };

        let has_identity = [
            record.source_id.as_deref(),
            record.full_name.as_deref(),
            record.email.as_deref(),
            record.resume_file.as_deref(),
        ]
        .iter()
        .any(|v| v.map(str::trim).filter(|s| !s.is_empty()).is_some());

        if !has_identity {
            return Err(ImportError::EmptyRow {
                row: self.row_index,
            });
        }

        Ok(Converted { record, defects })
    }
}

/// A converted row: the record plus whatever conversion defects it picked up
/// on the way. Defective fields are dropped to `None`; the record itself is
/// still persisted.
#[derive(Debug)]
pub struct Converted {
    pub record: ResumeRecord,
    pub defects: Vec<Defect>,
}

pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let trimmed = raw.trim();
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S")
        .ok()
        .or_else(|| {
            chrono::NaiveDate::parse_from_str(trimmed, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })
}

/// Source-specific adapter turning raw rows into normalized records.
///
/// `fetch_rows` failures abort the whole import for the source; `to_record`
/// failures are collected per row; `resolve_link` is best-effort and must
/// never fail the import.
#[async_trait]
pub trait SourceDriver: Send + Sync {
    fn source(&self) -> Source;

    /// Fixed table mapping this source's column headers to record fields.
    /// Headers absent from the table are ignored.
    fn field_mapping(&self) -> &'static [(&'static str, Field)];

    /// Header of the column whose hyperlink target should be resolved, for
    /// drivers that support resolution.
    fn resume_file_header(&self) -> Option<&'static str> {
        None
    }

    async fn fetch_rows(&self) -> Result<Vec<RawRow>, ImportError>;

    /// Look up the true hyperlink behind a displayed cell value. `None` on
    /// any failure; the caller falls back to the literal cell text.
    async fn resolve_link(&self, _row: &RawRow, _column: &str) -> Option<String> {
        None
    }

    /// Source-specific fixups applied between header mapping and the generic
    /// conversions in `RecordDraft::build`.
    fn apply_transforms(&self, _draft: &mut RecordDraft) {}

    async fn to_record(&self, row: &RawRow) -> Result<Converted, ImportError> {
        let mut draft = RecordDraft::from_row(self.source(), row, self.field_mapping());

        if let Some(column) = self.resume_file_header() {
            if let Some(url) = self.resolve_link(row, column).await {
                draft.resume_file = Some(url);
            }
        }

        self.apply_transforms(&mut draft);
        draft.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct PlainDriver;

    const PLAIN_MAPPING: &[(&str, Field)] = &[
        ("name", Field::FullName),
        ("email", Field::Email),
        ("resume", Field::ResumeFile),
        ("score", Field::TestScore),
    ];

    #[async_trait]
    impl SourceDriver for PlainDriver {
        fn source(&self) -> Source {
            Source::Csv
        }

        fn field_mapping(&self) -> &'static [(&'static str, Field)] {
            PLAIN_MAPPING
        }

        async fn fetch_rows(&self) -> Result<Vec<RawRow>, ImportError> {
            Ok(rows_from_csv("name,email\nJohn Doe,john@example.com").unwrap())
        }
    }

    #[test]
    fn dedupe_headers_numbers_repeats() {
        let raw: Vec<String> = ["是否約面", "職缺", "是否約面", "是否約面"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert_eq!(
            dedupe_headers(&raw),
            vec!["是否約面", "職缺", "是否約面.1", "是否約面.2"]
        );
    }

    #[test]
    fn rows_from_csv_exposes_trimmed_cells() {
        let rows = rows_from_csv("name,email\n John Doe ,john@example.com\n,\n").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("name"), Some("John Doe"));
        assert_eq!(rows[0].get("email"), Some("john@example.com"));
        assert_eq!(rows[0].get("missing"), None);
        assert!(rows[1].is_empty());
    }

    #[test]
    fn rows_from_table_skips_blank_rows_and_keeps_indexes() {
        let table = vec![
            vec!["name".to_string(), "email".to_string()],
            vec!["Alice".to_string(), "a@x.com".to_string()],
            vec![String::new(), String::new()],
            vec!["Bob".to_string(), "b@x.com".to_string()],
        ];

        let rows = rows_from_table(&table);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("name"), Some("Alice"));
        assert_eq!(rows[1].index(), 1);
        assert_eq!(rows[1].get("name"), Some("Bob"));
    }

    #[tokio::test]
    async fn to_record_maps_headers_and_ignores_unknown_columns() {
        let rows =
            rows_from_csv("name,email,unknown\nJohn Doe,john@example.com,ignored").unwrap();
        let converted = PlainDriver.to_record(&rows[0]).await.unwrap();

        assert!(converted.defects.is_empty());
        assert_eq!(converted.record.full_name.as_deref(), Some("John Doe"));
        assert_eq!(converted.record.email.as_deref(), Some("john@example.com"));
        assert!(converted.record.extra.is_empty());
    }

    #[tokio::test]
    async fn unparseable_score_is_a_conversion_defect_not_a_failure() {
        let rows = rows_from_csv("name,score\nJohn Doe,ninety").unwrap();
        let converted = PlainDriver.to_record(&rows[0]).await.unwrap();

        assert_eq!(converted.record.test_score, None);
        assert_eq!(converted.defects.len(), 1);
        assert_eq!(converted.defects[0].field, "test_score");
    }

    #[tokio::test]
    async fn row_without_identifying_content_is_rejected() {
        let rows = rows_from_csv("name,email,unknown\n,,still-here").unwrap();
        let err = PlainDriver.to_record(&rows[0]).await.unwrap_err();
        assert!(matches!(err, ImportError::EmptyRow { row: 0 }));
    }

    #[test]
    fn parse_datetime_accepts_date_only_values() {
        assert_eq!(
            parse_datetime("2025-05-05 16:38:29").unwrap().to_string(),
            "2025-05-05 16:38:29"
        );
        assert_eq!(
            parse_datetime("2025-05-05").unwrap().to_string(),
            "2025-05-05 00:00:00"
        );
        assert_eq!(parse_datetime("05/05/2025"), None);
    }
}
