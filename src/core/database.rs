use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{named_params, Connection};

use super::errors::ImportError;
use super::models::{ApplicationStatus, InterviewStatus, ResumeRecord, Source};

const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const SCHEMA: &str = "\
CREATE TABLE IF NOT EXISTS resumes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    natural_key TEXT NOT NULL UNIQUE,
    source TEXT NOT NULL,
    source_id TEXT,
    full_name TEXT,
    email TEXT,
    phone TEXT,
    resume_file TEXT,
    position_applied TEXT,
    application_date TEXT,
    test_score REAL,
    test_url TEXT,
    interview_status TEXT,
    application_status TEXT,
    recruiter_notes TEXT,
    hr_notes TEXT,
    technical_notes TEXT,
    skills TEXT,
    years_experience INTEGER,
    extra TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_resumes_source ON resumes(source);
";

/// A record as it exists in the store, with its row id and write timestamps.
#[derive(Debug, Clone)]
pub struct StoredResume {
    pub id: i64,
    pub record: ResumeRecord,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

pub struct ResumeDatabase {
    conn: Connection,
    path: PathBuf,
}

impl ResumeDatabase {
    /// Open (or create) the database file and ensure the schema exists.
    /// Failure here is fatal for the run.
    pub fn open(path: &Path) -> Result<Self, ImportError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            path: path.to_path_buf(),
        })
    }

    /// Throwaway store for validation-only runs.
    pub fn open_in_memory() -> Result<Self, ImportError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn,
            path: PathBuf::from(":memory:"),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or update one record, keyed by its natural key, and return the
    /// stored row id. Re-importing an unchanged source updates rows in place
    /// instead of duplicating them; `created_at` survives updates.
    pub fn upsert(&self, record: &ResumeRecord) -> Result<i64, ImportError> {
        let natural_key = record.natural_key();
        let now = Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO resumes (
                natural_key, source, source_id, full_name, email, phone,
                resume_file, position_applied, application_date, test_score,
                test_url, interview_status, application_status, recruiter_notes,
                hr_notes, technical_notes, skills, years_experience, extra,
                created_at, updated_at
            ) VALUES (
                :natural_key, :source, :source_id, :full_name, :email, :phone,
                :resume_file, :position_applied, :application_date, :test_score,
                :test_url, :interview_status, :application_status, :recruiter_notes,
                :hr_notes, :technical_notes, :skills, :years_experience, :extra,
                :now, :now
            )
            ON CONFLICT(natural_key) DO UPDATE SET
                source_id = excluded.source_id,
                full_name = excluded.full_name,
                email = excluded.email,
                phone = excluded.phone,
                resume_file = excluded.resume_file,
                position_applied = excluded.position_applied,
                application_date = excluded.application_date,
                test_score = excluded.test_score,
                test_url = excluded.test_url,
                interview_status = excluded.interview_status,
                application_status = excluded.application_status,
                recruiter_notes = excluded.recruiter_notes,
                hr_notes = excluded.hr_notes,
                technical_notes = excluded.technical_notes,
                skills = excluded.skills,
                years_experience = excluded.years_experience,
                extra = excluded.extra,
                updated_at = excluded.updated_at",
            named_params! {
                ":natural_key": natural_key,
                ":source": record.source.as_str(),
                ":source_id": record.source_id,
                ":full_name": record.full_name,
                ":email": record.email,
                ":phone": record.phone,
                ":resume_file": record.resume_file,
                ":position_applied": record.position_applied,
                ":application_date": record
                    .application_date
                    .map(|d| d.format(DATE_FORMAT).to_string()),
                ":test_score": record.test_score,
                ":test_url": record.test_url,
                ":interview_status": record.interview_status.map(|s| s.as_str()),
                ":application_status": record.application_status.map(|s| s.as_str()),
                ":recruiter_notes": record.recruiter_notes,
                ":hr_notes": record.hr_notes,
                ":technical_notes": record.technical_notes,
                ":skills": record.skills,
                ":years_experience": record.years_experience,
                ":extra": serde_json::to_string(&record.extra).unwrap_or_default(),
                ":now": now,
            },
        )?;

        let id = self.conn.query_row(
            "SELECT id FROM resumes WHERE natural_key = ?1",
            [&natural_key],
            |row| row.get(0),
        )?;

        Ok(id)
    }

    pub fn get_resumes(
        &self,
        limit: Option<usize>,
        source: Option<Source>,
    ) -> Result<Vec<StoredResume>, ImportError> {
        let source_name = source.map(|s| s.as_str());
        // LIMIT -1 means "no limit" to SQLite.
        let limit = limit.map(|l| l as i64).unwrap_or(-1);

        let mut statement = self.conn.prepare(
            "SELECT id, source, source_id, full_name, email, phone, resume_file,
                    position_applied, application_date, test_score, test_url,
                    interview_status, application_status, recruiter_notes, hr_notes,
                    technical_notes, skills, years_experience, extra, created_at,
                    updated_at
             FROM resumes
             WHERE ?1 IS NULL OR source = ?1
             ORDER BY id
             LIMIT ?2",
        )?;
        let rows = statement.query_map(rusqlite::params![source_name, limit], read_stored_resume)?;

        let mut resumes = Vec::new();
        for row in rows {
            resumes.push(row?);
        }

        Ok(resumes)
    }

    pub fn count_resumes(&self, source: Option<Source>) -> Result<i64, ImportError> {
        let count = match source {
            Some(source) => self.conn.query_row(
                "SELECT COUNT(*) FROM resumes WHERE source = ?1",
                [source.as_str()],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM resumes", [], |row| row.get(0))?,
        };

        Ok(count)
    }
}

pub fn database_exists(path: &Path) -> bool {
    path.exists()
}

fn read_stored_resume(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredResume> {
    let source_text: String = row.get(1)?;
    let source = source_text.parse::<Source>().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(err))
    })?;

    let mut record = ResumeRecord::empty(source);
    record.source_id = row.get(2)?;
    record.full_name = row.get(3)?;
    record.email = row.get(4)?;
    record.phone = row.get(5)?;
    record.resume_file = row.get(6)?;
    record.position_applied = row.get(7)?;
    record.application_date = row
        .get::<_, Option<String>>(8)?
        .and_then(|text| NaiveDateTime::parse_from_str(&text, DATE_FORMAT).ok());
    record.test_score = row.get(9)?;
    record.test_url = row.get(10)?;
    record.interview_status = row
        .get::<_, Option<String>>(11)?
        .and_then(|text| InterviewStatus::parse(&text));
    record.application_status = row
        .get::<_, Option<String>>(12)?
        .and_then(|text| ApplicationStatus::parse(&text));
    record.recruiter_notes = row.get(13)?;
    record.hr_notes = row.get(14)?;
    record.technical_notes = row.get(15)?;
    record.skills = row.get(16)?;
    record.years_experience = row.get(17)?;
    record.extra = row
        .get::<_, Option<String>>(18)?
        .and_then(|text| serde_json::from_str::<BTreeMap<String, String>>(&text).ok())
        .unwrap_or_default();

    Ok(StoredResume {
        id: row.get(0)?,
        record,
        created_at: parse_timestamp(row, 19)?,
        updated_at: parse_timestamp(row, 20)?,
    })
}

fn parse_timestamp(row: &rusqlite::Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let text: String = row.get(index)?;
    DateTime::parse_from_rfc3339(&text)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|err| {
            rusqlite::Error::FromSqlConversionFailure(
                index,
                rusqlite::types::Type::Text,
                Box::new(err),
            )
        })
}
