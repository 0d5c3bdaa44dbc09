use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("unknown source '{name}'. Available sources: {available}")]
    UnknownSource { name: String, available: String },
    #[error("failed to fetch rows from {source_name}: {message}")]
    SourceFetch { source_name: &'static str, message: String },
    #[error("source file not found: {}", .0.display())]
    SourceFileNotFound(PathBuf),
    #[error("Google API request failed with status {status}: {body}")]
    GoogleApi { status: u16, body: String },
    #[error("row {row} has no identifying content")]
    EmptyRow { row: usize },
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("database error: {0}")]
    Store(#[from] rusqlite::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
