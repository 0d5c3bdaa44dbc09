use std::path::PathBuf;

use chrono::Utc;
use tracing::{info, warn};

use super::backup::BackupStore;
use super::database::ResumeDatabase;
use super::drivers::SourceDriver;
use super::errors::ImportError;
use super::models::{ImportSummary, RowDefect, RunStage};
use super::validate;

#[derive(Debug, Default)]
pub struct RunOptions {
    /// Suppress the advisory validation pass.
    pub skip_validation: bool,
    /// Fetch, convert, and validate without touching the store or the
    /// backup tree.
    pub validate_only: bool,
    /// Directory to resolve bare resume filenames against (the directory of
    /// the imported file, for file-backed sources).
    pub source_dir: Option<PathBuf>,
}

/// Orchestrates one import run: fetch → convert → validate → persist, with
/// the file backup hanging off each successful write. Rows are processed one
/// at a time; only fetch and store-connection failures abort the run.
pub struct ImportService {
    database: ResumeDatabase,
    backup: BackupStore,
}

impl ImportService {
    pub fn new(database: ResumeDatabase, backup: BackupStore) -> Self {
        Self { database, backup }
    }

    pub fn database(&self) -> &ResumeDatabase {
        &self.database
    }

    pub async fn run(
        &self,
        driver: &dyn SourceDriver,
        options: &RunOptions,
    ) -> Result<ImportSummary, ImportError> {
        let mut summary = ImportSummary::new(driver.source());

        summary.stage = RunStage::Fetching;
        let rows = match driver.fetch_rows().await {
            Ok(rows) => rows,
            Err(err) => {
                summary.stage = RunStage::Failed;
                return Err(err);
            }
        };
        summary.total_rows = rows.len();
        info!(source = %summary.source, rows = rows.len(), "fetched source rows");

        for row in &rows {
            summary.stage = RunStage::Converting;
            let converted = match driver.to_record(row).await {
                Ok(converted) => converted,
                Err(err) => {
                    warn!(row = row.index(), error = %err, "row conversion failed");
                    summary.failed_rows += 1;
                    summary.defects.push(RowDefect {
                        row_index: row.index(),
                        field: "row".to_string(),
                        message: err.to_string(),
                    });
                    continue;
                }
            };

            for defect in &converted.defects {
                summary.defects.push(RowDefect {
                    row_index: row.index(),
                    field: defect.field.to_string(),
                    message: defect.message.clone(),
                });
            }

            if !options.skip_validation {
                summary.stage = RunStage::Validating;
                for defect in validate::validate(&converted.record) {
                    summary.defects.push(RowDefect {
                        row_index: row.index(),
                        field: defect.field.to_string(),
                        message: defect.message,
                    });
                }
            }

            if options.validate_only {
                continue;
            }

            summary.stage = RunStage::Persisting;
            match self.database.upsert(&converted.record) {
                Ok(_) => summary.imported += 1,
                Err(err) => {
                    warn!(row = row.index(), error = %err, "failed to persist row");
                    summary.failed_rows += 1;
                    continue;
                }
            }

            match self
                .backup
                .backup(&converted.record, options.source_dir.as_deref())
                .await
            {
                Ok(Some(path)) => {
                    summary.backed_up += 1;
                    info!(row = row.index(), path = %path.display(), "resume file backed up");
                }
                Ok(None) => {}
                Err(err) => {
                    warn!(row = row.index(), error = %err, "resume file backup failed");
                }
            }
        }

        summary.stage = RunStage::Completed;
        summary.completed_at = Some(Utc::now());
        info!(
            source = %summary.source,
            imported = summary.imported,
            defects = summary.defects.len(),
            failed = summary.failed_rows,
            "import run completed"
        );

        Ok(summary)
    }
}
