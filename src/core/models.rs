use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::ImportError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Lrs,
    Cake,
    Yourator,
    Csv,
}

impl Source {
    pub const ALL: [Source; 4] = [Source::Lrs, Source::Cake, Source::Yourator, Source::Csv];

    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Lrs => "lrs",
            Source::Cake => "cake",
            Source::Yourator => "yourator",
            Source::Csv => "csv",
        }
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Source {
    type Err = ImportError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "lrs" => Ok(Source::Lrs),
            "cake" => Ok(Source::Cake),
            "yourator" => Ok(Source::Yourator),
            "csv" => Ok(Source::Csv),
            other => Err(ImportError::UnknownSource {
                name: other.to_string(),
                available: Source::ALL
                    .iter()
                    .map(|s| s.as_str())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    Scheduled,
    Completed,
    Cancelled,
    Pending,
    NotScheduled,
}

impl InterviewStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStatus::Scheduled => "scheduled",
            InterviewStatus::Completed => "completed",
            InterviewStatus::Cancelled => "cancelled",
            InterviewStatus::Pending => "pending",
            InterviewStatus::NotScheduled => "not_scheduled",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "scheduled" => Some(InterviewStatus::Scheduled),
            "completed" => Some(InterviewStatus::Completed),
            "cancelled" => Some(InterviewStatus::Cancelled),
            "pending" => Some(InterviewStatus::Pending),
            "not_scheduled" => Some(InterviewStatus::NotScheduled),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicationStatus {
    Applied,
    Screening,
    Interview,
    Offer,
    Rejected,
    Hired,
    Withdrawn,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Applied => "applied",
            ApplicationStatus::Screening => "screening",
            ApplicationStatus::Interview => "interview",
            ApplicationStatus::Offer => "offer",
            ApplicationStatus::Rejected => "rejected",
            ApplicationStatus::Hired => "hired",
            ApplicationStatus::Withdrawn => "withdrawn",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "applied" => Some(ApplicationStatus::Applied),
            "screening" => Some(ApplicationStatus::Screening),
            "interview" => Some(ApplicationStatus::Interview),
            "offer" => Some(ApplicationStatus::Offer),
            "rejected" => Some(ApplicationStatus::Rejected),
            "hired" => Some(ApplicationStatus::Hired),
            "withdrawn" => Some(ApplicationStatus::Withdrawn),
            _ => None,
        }
    }
}

/// Normalized candidate entry produced by a source driver. Immutable after
/// construction; consumed once by validation and once by persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeRecord {
    pub source: Source,
    pub source_id: Option<String>,
    pub full_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Resolved URL or bare filename; resolution state is implicit in whether
    /// the value parses as an http(s) URL.
    pub resume_file: Option<String>,
    pub position_applied: Option<String>,
    pub application_date: Option<NaiveDateTime>,
    pub test_score: Option<f64>,
    pub test_url: Option<String>,
    pub interview_status: Option<InterviewStatus>,
    pub application_status: Option<ApplicationStatus>,
    pub recruiter_notes: Option<String>,
    pub hr_notes: Option<String>,
    pub technical_notes: Option<String>,
    pub skills: Option<String>,
    pub years_experience: Option<i64>,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

impl ResumeRecord {
    pub fn empty(source: Source) -> Self {
        Self {
            source,
            source_id: None,
            full_name: None,
            email: None,
            phone: None,
            resume_file: None,
            position_applied: None,
            application_date: None,
            test_score: None,
            test_url: None,
            interview_status: None,
            application_status: None,
            recruiter_notes: None,
            hr_notes: None,
            technical_notes: None,
            skills: None,
            years_experience: None,
            extra: BTreeMap::new(),
        }
    }

    /// Stable upsert key: source plus the first available identifying field,
    /// preferring the source's own id, then the lowercased email, then the
    /// candidate name, then the resume file reference. Construction rejects
    /// rows where all four are absent, so the key is always populated.
    pub fn natural_key(&self) -> String {
        let discriminator = non_empty(self.source_id.as_deref())
            .map(|v| format!("id:{v}"))
            .or_else(|| non_empty(self.email.as_deref()).map(|v| format!("email:{}", v.to_lowercase())))
            .or_else(|| non_empty(self.full_name.as_deref()).map(|v| format!("name:{v}")))
            .or_else(|| non_empty(self.resume_file.as_deref()).map(|v| format!("file:{v}")))
            .unwrap_or_default();

        format!("{}:{}", self.source.as_str(), discriminator)
    }

    pub fn resume_file_url(&self) -> Option<url::Url> {
        let reference = non_empty(self.resume_file.as_deref())?;
        let parsed = url::Url::parse(reference).ok()?;
        matches!(parsed.scheme(), "http" | "https").then_some(parsed)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStage {
    Started,
    Fetching,
    Converting,
    Validating,
    Persisting,
    Completed,
    Failed,
}

/// One defect attributed to a specific row of the source, either from
/// conversion or from validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowDefect {
    pub row_index: usize,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub source: Source,
    pub stage: RunStage,
    pub total_rows: usize,
    pub imported: usize,
    pub failed_rows: usize,
    pub backed_up: usize,
    pub defects: Vec<RowDefect>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ImportSummary {
    pub fn new(source: Source) -> Self {
        Self {
            source,
            stage: RunStage::Started,
            total_rows: 0,
            imported: 0,
            failed_rows: 0,
            backed_up: 0,
            defects: Vec::new(),
            started_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn rows_with_defects(&self) -> usize {
        let mut rows: Vec<usize> = self.defects.iter().map(|d| d.row_index).collect();
        rows.sort_unstable();
        rows.dedup();
        rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_round_trips_known_names() {
        for source in Source::ALL {
            assert_eq!(source.as_str().parse::<Source>().unwrap(), source);
        }
    }

    #[test]
    fn unknown_source_lists_available_names() {
        let err = "linkedin".parse::<Source>().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("unknown source 'linkedin'"));
        assert!(message.contains("lrs"));
        assert!(message.contains("yourator"));
    }

    #[test]
    fn natural_key_prefers_source_id_over_email_and_name() {
        let mut record = ResumeRecord::empty(Source::Lrs);
        record.source_id = Some("42".to_string());
        record.full_name = Some("張三".to_string());
        record.email = Some("Zhang.San@Example.com".to_string());
        record.resume_file = Some("zhang_san.pdf".to_string());

        assert_eq!(record.natural_key(), "lrs:id:42");

        record.source_id = None;
        assert_eq!(record.natural_key(), "lrs:email:zhang.san@example.com");

        record.email = Some("   ".to_string());
        assert_eq!(record.natural_key(), "lrs:name:張三");

        record.full_name = None;
        assert_eq!(record.natural_key(), "lrs:file:zhang_san.pdf");
    }

    #[test]
    fn resume_file_url_rejects_bare_filenames() {
        let mut record = ResumeRecord::empty(Source::Csv);
        record.full_name = Some("Alice".to_string());
        record.resume_file = Some("alice.pdf".to_string());

        assert!(record.resume_file_url().is_none());

        record.resume_file = Some("https://drive.google.com/file/d/abc/view".to_string());
        assert!(record.resume_file_url().is_some());
    }
}
