//! File import audit models.

use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::FromRow;

/// Final status of a file import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportStatus {
    Success,
    Partial,
    Failed,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Partial => "PARTIAL",
            Self::Failed => "FAILED",
        }
    }
}

/// Outcome of a single file import, reported back to the user.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub status: ImportStatus,
    pub total_records: usize,
    pub imported: u64,
    pub duplicates: u64,
    pub failed: usize,
    pub duration: std::time::Duration,
    /// Row-numbered parse and batch errors. Truncated for display, not here.
    pub errors: Vec<String>,
}

/// One row of the import history table.
#[derive(Debug, Clone, FromRow)]
pub struct ImportLogRow {
    pub import_id: i32,
    pub source_name: String,
    pub filename: String,
    pub file_size_bytes: Option<i64>,
    pub records_total: i32,
    pub records_imported: i32,
    pub records_failed: i32,
    pub records_duplicate: i32,
    pub import_status: String,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<NaiveDateTime>,
    pub imported_by: Option<String>,
}

/// Aggregate import statistics for the recon dashboard.
#[derive(Debug, Clone, Default, FromRow)]
pub struct ImportStats {
    pub total_imports: i64,
    pub total_records_imported: Option<i64>,
    pub total_records_failed: Option<i64>,
    pub total_duplicates: Option<i64>,
    pub successful_imports: i64,
    pub failed_imports: i64,
    pub last_import: Option<NaiveDateTime>,
}
