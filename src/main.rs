use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use resume_intake::core::backup::BackupStore;
use resume_intake::core::credentials;
use resume_intake::core::database::{self, ResumeDatabase};
use resume_intake::core::factory::{self, DriverOptions};
use resume_intake::core::models::{ImportSummary, Source};
use resume_intake::core::service::{ImportService, RunOptions};

const USER_AGENT: &str = concat!("resume-intake/", env!("CARGO_PKG_VERSION"));
const MAX_PRINTED_DEFECTS: usize = 10;

#[derive(Debug, Parser)]
#[command(
    name = "resume-intake",
    about = "Import resume data from various sources into a local SQLite store",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Import resume data from a source (lrs, cake, yourator, csv)
    ImportResume {
        /// Source to import from
        source: String,

        /// Path to the source file (csv and yourator sources)
        #[arg(long)]
        file_path: Option<PathBuf>,

        /// Path to the SQLite database file
        #[arg(long, env = "RESUME_INTAKE_DB_PATH", default_value = "resume.db")]
        db_path: PathBuf,

        /// Root directory for resume file backups
        #[arg(long, env = "RESUME_INTAKE_BACKUP_DIR", default_value = "backup")]
        backup_dir: PathBuf,

        /// Skip data validation
        #[arg(long)]
        skip_validation: bool,
    },

    /// Display resume data from the database
    ShowData {
        /// Path to the SQLite database file
        #[arg(long, env = "RESUME_INTAKE_DB_PATH", default_value = "resume.db")]
        db_path: PathBuf,

        /// Number of rows to display
        #[arg(long, default_value_t = 10)]
        limit: usize,

        /// Filter by source (lrs, cake, yourator, csv)
        #[arg(long)]
        source: Option<String>,
    },

    /// Validate source data without importing it
    ValidateData {
        /// Source to validate
        source: String,

        /// Path to the source file (csv and yourator sources)
        #[arg(long)]
        file_path: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("resume_intake=warn")),
        )
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::ImportResume {
            source,
            file_path,
            db_path,
            backup_dir,
            skip_validation,
        } => import_resume(&source, file_path, &db_path, backup_dir, skip_validation).await,
        Command::ShowData {
            db_path,
            limit,
            source,
        } => show_data(&db_path, limit, source),
        Command::ValidateData { source, file_path } => validate_data(&source, file_path).await,
    }
}

async fn import_resume(
    source: &str,
    file_path: Option<PathBuf>,
    db_path: &Path,
    backup_dir: PathBuf,
    skip_validation: bool,
) -> anyhow::Result<()> {
    let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
    let credentials = credentials::discover();

    let driver = factory::create(
        source,
        client.clone(),
        DriverOptions {
            file_path: file_path.clone(),
            credentials,
        },
    )?;

    let database = ResumeDatabase::open(db_path)?;
    let service = ImportService::new(database, BackupStore::new(backup_dir, client));

    let options = RunOptions {
        skip_validation,
        validate_only: false,
        source_dir: file_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf),
    };

    println!("Importing data from {}...", driver.source());
    let summary = service.run(driver.as_ref(), &options).await?;
    print_summary(&summary);

    let shown_path = db_path.canonicalize().unwrap_or_else(|_| db_path.to_path_buf());
    println!("Database saved to: {}", shown_path.display());
    Ok(())
}

async fn validate_data(source: &str, file_path: Option<PathBuf>) -> anyhow::Result<()> {
    let client = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
    let credentials = credentials::discover();

    let driver = factory::create(
        source,
        client.clone(),
        DriverOptions {
            file_path: file_path.clone(),
            credentials,
        },
    )?;

    let database = ResumeDatabase::open_in_memory()?;
    let service = ImportService::new(
        database,
        BackupStore::new(PathBuf::from("backup"), client),
    );

    let options = RunOptions {
        skip_validation: false,
        validate_only: true,
        source_dir: file_path
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf),
    };

    println!("Validating data from {}...", driver.source());
    let summary = service.run(driver.as_ref(), &options).await?;

    println!();
    println!("Validation summary:");
    println!("  Total rows: {}", summary.total_rows);
    println!("  Rows with defects: {}", summary.rows_with_defects());
    println!("  Rows failed outright: {}", summary.failed_rows);

    if summary.defects.is_empty() {
        println!("All data is valid.");
    } else {
        println!("Defects:");
        for defect in &summary.defects {
            println!(
                "  row {}: {} - {}",
                defect.row_index, defect.field, defect.message
            );
        }
    }

    Ok(())
}

fn show_data(db_path: &Path, limit: usize, source: Option<String>) -> anyhow::Result<()> {
    if !database::database_exists(db_path) {
        anyhow::bail!("database file not found: {}", db_path.display());
    }

    let source = source.map(|name| name.parse::<Source>()).transpose()?;

    let database = ResumeDatabase::open(db_path)?;
    let resumes = database.get_resumes(Some(limit), source)?;
    let total = database.count_resumes(source)?;

    let filter_note = source
        .map(|s| format!(" (filtered by source: {s})"))
        .unwrap_or_default();

    if resumes.is_empty() {
        println!("No resume records found in the database{filter_note}.");
        return Ok(());
    }

    println!(
        "Showing first {} of {} resume records{}:",
        resumes.len(),
        total,
        filter_note
    );
    println!("{}", "-".repeat(80));

    for (number, stored) in resumes.iter().enumerate() {
        let record = &stored.record;
        println!("Record {}:", number + 1);
        println!("  ID: {}", stored.id);
        println!("  Name: {}", display(&record.full_name));
        println!("  Email: {}", display(&record.email));
        println!("  Phone: {}", display(&record.phone));
        println!("  Resume File: {}", display(&record.resume_file));
        println!("  Position Applied: {}", display(&record.position_applied));
        println!(
            "  Test Score: {}",
            record
                .test_score
                .map(|v| v.to_string())
                .unwrap_or_else(|| "-".to_string())
        );
        println!(
            "  Interview Status: {}",
            record
                .interview_status
                .map(|v| v.as_str().to_string())
                .unwrap_or_else(|| "-".to_string())
        );
        println!(
            "  Application Status: {}",
            record
                .application_status
                .map(|v| v.as_str().to_string())
                .unwrap_or_else(|| "-".to_string())
        );
        println!("  Source: {}", record.source);
        println!("  Created: {}", stored.created_at.to_rfc3339());
        if let Some(notes) = record.recruiter_notes.as_deref() {
            println!("  Recruiter Notes: {notes}");
        }
        if let Some(notes) = record.hr_notes.as_deref() {
            println!("  HR Notes: {notes}");
        }
        println!("{}", "-".repeat(80));
    }

    Ok(())
}

fn print_summary(summary: &ImportSummary) {
    println!(
        "Processed {} rows from {}: {} imported, {} failed, {} resume files backed up.",
        summary.total_rows, summary.source, summary.imported, summary.failed_rows, summary.backed_up
    );

    if summary.defects.is_empty() {
        return;
    }

    println!(
        "Found {} defects across {} rows:",
        summary.defects.len(),
        summary.rows_with_defects()
    );
    for defect in summary.defects.iter().take(MAX_PRINTED_DEFECTS) {
        println!(
            "  row {}: {} - {}",
            defect.row_index, defect.field, defect.message
        );
    }
    if summary.defects.len() > MAX_PRINTED_DEFECTS {
        println!(
            "  ... and {} more defects",
            summary.defects.len() - MAX_PRINTED_DEFECTS
        );
    }
}

fn display(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("-")
}
