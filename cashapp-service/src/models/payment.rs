//! Worldline payment models (Recon side).

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::FromRow;

/// A Worldline payment record, keyed by (id, paydate).
///
/// Ingested from semicolon-delimited CSV exports; re-importing an existing
/// (id, paydate) pair is a no-op.
#[derive(Debug, Clone, Default, Serialize, FromRow)]
pub struct WorldlinePayment {
    pub id: String,
    pub ref_code: Option<String>,
    pub order_ref: Option<String>,
    pub status: Option<String>,
    pub lib: Option<String>,
    pub accept_code: Option<String>,
    pub paydate: NaiveDate,
    pub cie: Option<String>,
    pub facname: Option<String>,
    pub country: Option<String>,
    pub total: Option<Decimal>,
    pub currency: Option<String>,
    pub method: Option<String>,
    pub brand: Option<String>,
    pub card: Option<String>,
    pub expdate: Option<String>,
    pub uid: Option<String>,
    pub action: Option<String>,
    pub ticket: Option<String>,
    pub description: Option<String>,
    pub ship: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub merchref: Option<String>,
    pub refid: Option<String>,
    pub batchref: Option<String>,
    pub owner: Option<String>,
    pub alias: Option<String>,
    pub fraud_type: Option<String>,
    pub paydatetime: Option<NaiveDateTime>,
    pub orderdatetime: Option<NaiveDateTime>,
    pub subbrand: Option<String>,
    pub source_file: Option<String>,
}

/// Subset of payment columns shown in the payments table.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaymentListRow {
    pub id: String,
    pub ref_code: Option<String>,
    pub order_ref: Option<String>,
    pub status: Option<String>,
    pub paydate: NaiveDate,
    pub facname: Option<String>,
    pub country: Option<String>,
    pub total: Option<Decimal>,
    pub currency: Option<String>,
    pub brand: Option<String>,
    pub merchref: Option<String>,
    pub owner: Option<String>,
}

/// Filters for the payments list. `search` takes precedence over the rest.
#[derive(Debug, Clone, Default)]
pub struct PaymentFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub brand: Option<String>,
    pub merchref: Option<String>,
    pub ref_code: Option<String>,
    pub status: Option<String>,
    pub payment_id: Option<String>,
    pub order_ref: Option<String>,
    pub owner: Option<String>,
    pub country: Option<String>,
    pub amount_min: Option<Decimal>,
    pub amount_max: Option<Decimal>,
}

/// Dashboard headline statistics over a trailing window.
#[derive(Debug, Clone, Default, FromRow)]
pub struct DashboardStats {
    pub total_transactions: i64,
    pub days_with_data: i64,
    pub unique_brands: i64,
    pub unique_merchants: i64,
    pub total_amount: Option<Decimal>,
    pub avg_amount: Option<Decimal>,
    pub earliest_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct DailyVolumeRow {
    pub date: NaiveDate,
    pub transaction_count: i64,
    pub total_amount: Option<Decimal>,
    pub avg_amount: Option<Decimal>,
    pub unique_brands: i64,
    pub unique_merchants: i64,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BrandBreakdownRow {
    pub brand: String,
    pub transaction_count: i64,
    pub total_amount: Option<Decimal>,
    pub avg_amount: Option<Decimal>,
    pub days_active: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct MerchantBreakdownRow {
    pub merchref: String,
    pub transaction_count: i64,
    pub total_amount: Option<Decimal>,
    pub avg_amount: Option<Decimal>,
    pub first_transaction: Option<NaiveDate>,
    pub last_transaction: Option<NaiveDate>,
}

#[derive(Debug, Clone, FromRow)]
pub struct CountryBreakdownRow {
    pub country: String,
    pub transaction_count: i64,
    pub total_amount: Option<Decimal>,
    pub avg_amount: Option<Decimal>,
}

#[derive(Debug, Clone, Default, FromRow)]
pub struct DataDateRange {
    pub earliest_date: Option<NaiveDate>,
    pub latest_date: Option<NaiveDate>,
    pub unique_dates: i64,
}

/// Match/exception counts for the reconciliation screen.
#[derive(Debug, Clone, Default, FromRow)]
pub struct ReconciliationSummary {
    pub total_worldline: i64,
    pub total_matched: i64,
    pub open_exceptions: i64,
    pub resolved_exceptions: i64,
}

#[derive(Debug, Clone, FromRow)]
pub struct UnmatchedPaymentRow {
    pub id: String,
    pub ref_code: Option<String>,
    pub paydate: NaiveDate,
    pub total: Option<Decimal>,
    pub brand: Option<String>,
    pub merchref: Option<String>,
    pub owner: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct ReconciliationExceptionRow {
    pub exception_id: i32,
    pub source_name: String,
    pub record_id: String,
    pub exception_type: String,
    pub exception_date: NaiveDate,
    pub status: String,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A registered upstream data source (settings screen).
#[derive(Debug, Clone, FromRow)]
pub struct DataSourceRow {
    pub source_id: i32,
    pub source_name: String,
    pub source_type: Option<String>,
    pub is_active: bool,
}

/// Partition name + on-disk size (settings screen).
#[derive(Debug, Clone, FromRow)]
pub struct PartitionInfoRow {
    pub tablename: String,
    pub size: String,
}
