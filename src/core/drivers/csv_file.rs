use std::path::PathBuf;

use async_trait::async_trait;

use super::super::errors::ImportError;
use super::super::models::Source;
use super::{rows_from_csv, Field, RawRow, SourceDriver};

// Plain CSV files use english headers; common synonyms are accepted.
const FIELD_MAPPING: &[(&str, Field)] = &[
    ("id", Field::SourceId),
    ("name", Field::FullName),
    ("full_name", Field::FullName),
    ("email", Field::Email),
    ("phone", Field::Phone),
    ("resume", Field::ResumeFile),
    ("resume_file", Field::ResumeFile),
    ("position", Field::PositionApplied),
    ("position_applied", Field::PositionApplied),
    ("test_score", Field::TestScore),
    ("test_url", Field::TestUrl),
    ("interview_status", Field::InterviewStatus),
    ("application_status", Field::ApplicationStatus),
    ("recruiter_notes", Field::RecruiterNotes),
    ("hr_notes", Field::HrNotes),
    ("technical_notes", Field::TechnicalNotes),
    ("skills", Field::Skills),
    ("experience", Field::YearsExperience),
    ("years_experience", Field::YearsExperience),
];

pub struct CsvDriver {
    file_path: PathBuf,
}

impl CsvDriver {
    pub fn new(file_path: PathBuf) -> Self {
        Self { file_path }
    }

    pub fn file_path(&self) -> &PathBuf {
        &self.file_path
    }
}

#[async_trait]
impl SourceDriver for CsvDriver {
    fn source(&self) -> Source {
        Source::Csv
    }

    fn field_mapping(&self) -> &'static [(&'static str, Field)] {
        FIELD_MAPPING
    }

    async fn fetch_rows(&self) -> Result<Vec<RawRow>, ImportError> {
        if !self.file_path.exists() {
            return Err(ImportError::SourceFileNotFound(self.file_path.clone()));
        }

        let text = tokio::fs::read_to_string(&self.file_path).await?;
        rows_from_csv(&text).map_err(|err| ImportError::SourceFetch {
            source_name: "csv",
            message: err.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::core::models::InterviewStatus;

    #[tokio::test]
    async fn reads_local_file_and_maps_synonyms() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("candidates.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        writeln!(file, "id,name,email,resume,experience,interview_status").unwrap();
        writeln!(
            file,
            "7,Alice Wang,alice@example.com,alice.pdf,4,scheduled"
        )
        .unwrap();

        let driver = CsvDriver::new(path);
        let rows = driver.fetch_rows().await.unwrap();
        assert_eq!(rows.len(), 1);

        let record = driver.to_record(&rows[0]).await.unwrap().record;
        assert_eq!(record.source, Source::Csv);
        assert_eq!(record.source_id.as_deref(), Some("7"));
        assert_eq!(record.full_name.as_deref(), Some("Alice Wang"));
        assert_eq!(record.resume_file.as_deref(), Some("alice.pdf"));
        assert_eq!(record.years_experience, Some(4));
        assert_eq!(record.interview_status, Some(InterviewStatus::Scheduled));
    }

    #[tokio::test]
    async fn missing_file_is_a_fatal_fetch_error() {
        let driver = CsvDriver::new(PathBuf::from("/nonexistent/candidates.csv"));
        let err = driver.fetch_rows().await.unwrap_err();
        assert!(matches!(err, ImportError::SourceFileNotFound(_)));
    }
}
