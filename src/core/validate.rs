use once_cell::sync::Lazy;
use regex::Regex;

use super::models::ResumeRecord;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").unwrap());

const TEST_SCORE_MIN: f64 = 0.0;
const TEST_SCORE_MAX: f64 = 100.0;

/// One violated rule on a single field.
#[derive(Debug, Clone, PartialEq)]
pub struct Defect {
    pub field: &'static str,
    pub message: String,
}

impl Defect {
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Screen a record against the per-field rules. Advisory only: the import
/// pipeline reports defects but still persists the record. Never mutates the
/// record and always returns (an empty list means fully valid).
pub fn validate(record: &ResumeRecord) -> Vec<Defect> {
    let mut defects = Vec::new();

    if is_blank(record.full_name.as_deref()) {
        defects.push(Defect::new("full_name", "required field is missing"));
    }

    if is_blank(record.resume_file.as_deref()) {
        defects.push(Defect::new("resume_file", "required field is missing"));
    }

    if let Some(email) = record.email.as_deref().map(str::trim) {
        if !email.is_empty() && !EMAIL_RE.is_match(email) {
            defects.push(Defect::new("email", format!("invalid email format: {email}")));
        }
    }

    if let Some(score) = record.test_score {
        if !(TEST_SCORE_MIN..=TEST_SCORE_MAX).contains(&score) {
            defects.push(Defect::new(
                "test_score",
                format!("score {score} is outside {TEST_SCORE_MIN}-{TEST_SCORE_MAX}"),
            ));
        }
    }

    if let Some(years) = record.years_experience {
        if years < 0 {
            defects.push(Defect::new(
                "years_experience",
                format!("{years} years of experience is negative"),
            ));
        }
    }

    defects
}

fn is_blank(value: Option<&str>) -> bool {
    value.map(str::trim).filter(|v| !v.is_empty()).is_none()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::Source;

    fn complete_record() -> ResumeRecord {
        let mut record = ResumeRecord::empty(Source::Csv);
        record.full_name = Some("Alice Wang".to_string());
        record.email = Some("alice@example.com".to_string());
        record.resume_file = Some("alice.pdf".to_string());
        record.test_score = Some(85.0);
        record
    }

    #[test]
    fn valid_record_has_no_defects() {
        assert!(validate(&complete_record()).is_empty());
    }

    #[test]
    fn missing_name_reports_exactly_one_defect_naming_the_field() {
        let mut record = complete_record();
        record.full_name = Some("   ".to_string());

        let defects = validate(&record);
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].field, "full_name");
    }

    #[test]
    fn malformed_email_is_a_defect_but_empty_email_is_not() {
        let mut record = complete_record();
        record.email = Some("not-an-address".to_string());
        let defects = validate(&record);
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].field, "email");

        record.email = None;
        assert!(validate(&record).is_empty());

        record.email = Some(String::new());
        assert!(validate(&record).is_empty());
    }

    #[test]
    fn out_of_range_score_is_a_defect() {
        let mut record = complete_record();
        record.test_score = Some(105.0);
        let defects = validate(&record);
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].field, "test_score");

        record.test_score = Some(-1.0);
        assert_eq!(validate(&record).len(), 1);

        record.test_score = Some(0.0);
        assert!(validate(&record).is_empty());
        record.test_score = Some(100.0);
        assert!(validate(&record).is_empty());
    }

    #[test]
    fn negative_experience_is_a_defect() {
        let mut record = complete_record();
        record.years_experience = Some(-2);
        let defects = validate(&record);
        assert_eq!(defects.len(), 1);
        assert_eq!(defects[0].field, "years_experience");
    }

    #[test]
    fn defects_accumulate_across_fields() {
        let mut record = ResumeRecord::empty(Source::Csv);
        record.email = Some("bad".to_string());

        let fields: Vec<&str> = validate(&record).iter().map(|d| d.field).collect();
        assert_eq!(fields, vec!["full_name", "resume_file", "email"]);
    }
}
