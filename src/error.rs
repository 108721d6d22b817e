use std::io;
use std::path::PathBuf;

use chrono::NaiveDate;
use thiserror::Error;

use crate::config::ColumnRule;

/// Failures that abort a report run. Row-level anomalies (bad dates, blank
/// technicians) never surface here; they are counted in `LoadReport`.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error("source '{}' is unreadable: {reason}", .path.display())]
    SourceUnreadable { path: PathBuf, reason: String },
    #[error("sheet '{}' has {found} columns, expected {expected}", .path.display())]
    SchemaMismatch {
        path: PathBuf,
        found: usize,
        expected: ColumnRule,
    },
    #[error("invalid date range: {start} is after {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },
    #[error("report generation is locked")]
    Locked,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

impl ReportError {
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ReportError::SourceUnreadable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}
