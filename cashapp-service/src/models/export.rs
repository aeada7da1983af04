//! Export audit models (Autobank/Globes consumers write these tables;
//! the app only displays them).

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

#[derive(Debug, Clone, FromRow)]
pub struct ExportAuditRow {
    pub id: i32,
    pub timestamp: DateTime<Utc>,
    pub bank: Option<String>,
    pub iban: Option<String>,
    pub destination: Option<String>,
    pub export_format: Option<String>,
    pub closingdate: Option<NaiveDate>,
    pub filename: Option<String>,
    pub record_count: Option<i32>,
    pub success: bool,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ExportConfigRow {
    pub id: i32,
    pub enabled: bool,
    pub bank: String,
    pub iban: String,
    pub exportformat: Option<String>,
    pub exportformatversion: Option<String>,
    pub destination: Option<String>,
    pub outputpath: Option<String>,
    pub fileprefix: Option<String>,
    pub fileextension: Option<String>,
    pub includedate: bool,
    pub dateformat: Option<String>,
    pub createdat: DateTime<Utc>,
    pub updatedat: DateTime<Utc>,
}

/// Success/failure tallies for the export status header.
#[derive(Debug, Clone, Default, FromRow)]
pub struct ExportStatusCounts {
    pub success_count: Option<i64>,
    pub success_no_tx_count: Option<i64>,
    pub failed_count: Option<i64>,
}
