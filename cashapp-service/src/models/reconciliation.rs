//! Daily balance reconciliation models.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

/// Classification of one (iban, day) cell of the reconciliation grid.
///
/// Exactly one status applies per cell; missing data is a valid outcome,
/// not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AuditStatus {
    MissingOpening,
    MissingClosing,
    PerfectMatch,
    MinorDiff,
    MajorDiff,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MissingOpening => "MISSING_OPENING",
            Self::MissingClosing => "MISSING_CLOSING",
            Self::PerfectMatch => "PERFECT_MATCH",
            Self::MinorDiff => "MINOR_DIFF",
            Self::MajorDiff => "MAJOR_DIFF",
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Self::MissingOpening | Self::MissingClosing)
    }
}

/// One row of the detailed reconciliation report.
#[derive(Debug, Clone)]
pub struct DailyAudit {
    pub iban: String,
    pub owner_name: String,
    pub day: NaiveDate,
    pub status: AuditStatus,
    pub currency: String,
    pub opening_balance: Decimal,
    pub sum_transactions: Decimal,
    pub transaction_count: i64,
    pub pos_tx_sum: Decimal,
    pub pos_tx_count: i64,
    pub neg_tx_sum: Decimal,
    pub neg_tx_count: i64,
    pub closing_balance: Decimal,
    pub expected_closing: Decimal,
    pub difference: Decimal,
}

/// Headline counts over a reconciliation report.
#[derive(Debug, Clone, Default)]
pub struct ReconciliationReportSummary {
    pub total_rows: usize,
    pub perfect_matches: usize,
    pub minor_diffs: usize,
    pub major_diffs: usize,
    pub missing_data: usize,
    pub match_percentage: f64,
}

impl ReconciliationReportSummary {
    pub fn from_rows(rows: &[DailyAudit]) -> Self {
        let total_rows = rows.len();
        let perfect_matches = rows
            .iter()
            .filter(|r| r.status == AuditStatus::PerfectMatch)
            .count();
        let minor_diffs = rows
            .iter()
            .filter(|r| r.status == AuditStatus::MinorDiff)
            .count();
        let major_diffs = rows
            .iter()
            .filter(|r| r.status == AuditStatus::MajorDiff)
            .count();
        let missing_data = rows.iter().filter(|r| r.status.is_missing()).count();
        let match_percentage = if total_rows > 0 {
            (perfect_matches as f64 / total_rows as f64 * 1000.0).round() / 10.0
        } else {
            0.0
        };

        Self {
            total_rows,
            perfect_matches,
            minor_diffs,
            major_diffs,
            missing_data,
            match_percentage,
        }
    }
}
